//! Adaptive decision engine
//!
//! Runs the per-symbol decision cycle (classify, select mode, score, size)
//! against injected collaborators and feeds trade outcomes back into the
//! shared learning state.

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod summary;
pub mod worker;


pub use collaborators::Collaborators;
pub use config::EngineConfig;
pub use engine::{Decision, DecisionEngine};
pub use summary::{ModeWeights, PerformanceSummary, SymbolSummary};
pub use worker::{spawn_learning_worker, LearningHandle};

pub use decision_core::{DecisionError, DecisionId, DecisionMetrics, MarketProfile};
pub use learning_feedback::{OutcomeUpdate, TradeOutcome};
pub use position_sizer::SizingDecision;
