//! Shared vocabulary for the adaptive FX decision engine: market states,
//! decision modes, per-cycle metrics, collaborator traits and the
//! configuration values every component validates against.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod performance;
pub mod ring_buffer;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use performance::{PerformanceEntry, PerformanceTable};
pub use ring_buffer::ExperienceBuffer;
pub use traits::*;
pub use types::*;
