//! Mode Selector
//!
//! Picks the operating decision mode for a symbol from its market state,
//! adapting toward better-performing alternates once they have enough
//! trades behind them, with two-cycle hysteresis against thrashing.

pub mod preferences;
pub mod selector;

pub use preferences::{mode_preferences, ModePreference};
pub use selector::{ModeSelection, ModeSelector, ModeSelectorConfig, ModeState};
