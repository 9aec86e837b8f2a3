//! Learning Feedback Loop
//!
//! Matches trade outcomes to the decisions that produced them, folds them
//! into the (mode, state) performance table with an EWMA, nudges the
//! per-mode fusion weights and periodically refits the win-probability
//! calibration table from the experience ring.

pub mod config;
pub mod feedback;
pub mod record;

pub use config::LearningConfig;
pub use feedback::{
    LearningFeedbackLoop, LearningPassReport, OutcomeUpdate, PendingDecision, TradeOutcome,
};
pub use record::update_record;
