use decision_core::{DecisionMode, FusionWeights};
use serde::{Deserialize, Serialize};

/// Static per-mode parameters of the scorer and sizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub mode: DecisionMode,
    /// Starting weights before any learning
    pub default_weights: FusionWeights,
    pub ml_enabled: bool,
    /// Volatility level above which the mode does not trade
    pub volatility_ceiling: f64,
    /// Liquidity level below which the mode does not trade
    pub min_liquidity: f64,
    /// Independent agreeing sources wanted before full confidence
    pub required_confirmations: u32,
    /// Target reward per unit risked
    pub reward_risk_ratio: f64,
    /// Scales the base position size
    pub risk_multiplier: f64,
}

pub fn mode_profile(mode: DecisionMode) -> ModeProfile {
    let profile = |weights: (f64, f64, f64),
                   ml_enabled: bool,
                   volatility_ceiling: f64,
                   min_liquidity: f64,
                   required_confirmations: u32,
                   reward_risk_ratio: f64,
                   risk_multiplier: f64| ModeProfile {
        mode,
        default_weights: FusionWeights::new(weights.0, weights.1, weights.2),
        ml_enabled,
        volatility_ceiling,
        min_liquidity,
        required_confirmations,
        reward_risk_ratio,
        risk_multiplier,
    };

    match mode {
        DecisionMode::Conservative => profile((0.6, 0.2, 0.2), true, 55.0, 40.0, 3, 1.5, 0.5),
        DecisionMode::Moderate => profile((0.5, 0.25, 0.25), true, 65.0, 35.0, 2, 1.8, 0.75),
        DecisionMode::Aggressive => profile((0.5, 0.3, 0.2), true, 80.0, 30.0, 1, 2.2, 1.0),
        DecisionMode::Scalping => profile((0.7, 0.1, 0.2), false, 60.0, 60.0, 1, 1.2, 0.6),
        DecisionMode::Swing => profile((0.5, 0.3, 0.2), true, 70.0, 30.0, 3, 2.5, 0.8),
        DecisionMode::TrendFollowing => profile((0.6, 0.2, 0.2), true, 70.0, 30.0, 2, 2.0, 0.9),
        DecisionMode::MeanReversion => profile((0.5, 0.2, 0.3), true, 60.0, 35.0, 2, 1.5, 0.7),
        DecisionMode::BreakoutHunter => profile((0.6, 0.25, 0.15), true, 85.0, 45.0, 2, 2.5, 0.8),
        DecisionMode::NewsTrader => profile((0.3, 0.2, 0.5), true, 90.0, 40.0, 1, 2.0, 0.6),
        DecisionMode::MLDriven => profile((0.2, 0.65, 0.15), true, 70.0, 30.0, 2, 2.0, 0.8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        for mode in DecisionMode::ALL {
            let w = mode_profile(mode).default_weights;
            assert!((w.technical + w.ml + w.sentiment - 1.0).abs() < 1e-9, "{}", mode);
        }
    }

    #[test]
    fn test_scalping_needs_fewer_confirmations_than_swing() {
        assert!(
            mode_profile(DecisionMode::Scalping).required_confirmations
                < mode_profile(DecisionMode::Swing).required_confirmations
        );
    }

    #[test]
    fn test_ml_driven_weights_ml_heaviest() {
        let w = mode_profile(DecisionMode::MLDriven).default_weights;
        assert!(w.ml > w.technical && w.ml > w.sentiment);
        assert!(!mode_profile(DecisionMode::Scalping).ml_enabled);
    }
}
