//! Signal Fusion
//!
//! Fuses the technical signal, ML prediction and sentiment into one
//! opportunity score per decision mode, runs the dynamic filters and
//! derives confidence, win probability and expected reward.

pub mod calibration;
pub mod filters;
pub mod profiles;
pub mod scorer;
pub mod weights;

pub use calibration::{
    prior_win_probability, CalibrationBin, CalibrationSample, CalibrationStats, CalibrationTable,
};
pub use filters::{
    CorrelationFilter, DynamicFilter, FilterContext, LiquidityFilter, SentimentAlignmentFilter,
    VolatilityFilter,
};
pub use profiles::{mode_profile, ModeProfile};
pub use scorer::{FusionConfig, FusionInputs, SignalFusionScorer};
pub use weights::WeightStore;
