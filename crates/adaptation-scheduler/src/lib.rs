//! Adaptation Scheduler
//!
//! Decides when a symbol's classification cycle and the global learning
//! pass are due, and tracks where each symbol is in its decision cycle.

pub mod phase;
pub mod scheduler;

pub use phase::CyclePhase;
pub use scheduler::{AdaptationScheduler, CycleSchedule, OverrideReason, SchedulerConfig};
