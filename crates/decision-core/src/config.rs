use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{DecisionError, DecisionMode};

/// Reject NaN and infinite values. Range checks written as comparisons
/// let NaN through, so every `validate` runs this first.
pub fn ensure_finite(fields: &[(&str, f64)]) -> Result<(), DecisionError> {
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(DecisionError::invalid_config(format!(
            "{} must be finite, got {}",
            name, value
        ))),
        None => Ok(()),
    }
}

/// Switches for optional parts of the decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub ml_enabled: bool,
    pub sentiment_enabled: bool,
    pub adaptive_weights: bool,
    pub adaptive_mode_selection: bool,
    pub regime_override: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            ml_enabled: true,
            sentiment_enabled: true,
            adaptive_weights: true,
            adaptive_mode_selection: true,
            regime_override: true,
        }
    }
}

/// Per-symbol adaptive settings. Mutated only by the scheduler and the
/// learning loop; operator updates go through `validate` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub primary_mode: DecisionMode,
    pub fallback_mode: DecisionMode,
    /// 0 to 100
    pub mode_confidence: f64,
    /// EWMA alpha for performance updates, (0, 1]
    pub adaptation_speed: f64,
    pub toggles: FeatureToggles,
    pub last_adaptation: Option<DateTime<Utc>>,
    pub adaptation_period_secs: i64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            primary_mode: DecisionMode::Conservative,
            fallback_mode: DecisionMode::Conservative,
            mode_confidence: 0.0,
            adaptation_speed: 0.1,
            toggles: FeatureToggles::default(),
            last_adaptation: None,
            adaptation_period_secs: 300,
        }
    }
}

impl AdaptiveConfig {
    pub fn adaptation_period(&self) -> Duration {
        Duration::seconds(self.adaptation_period_secs)
    }

    pub fn validate(&self) -> Result<(), DecisionError> {
        ensure_finite(&[
            ("adaptation_speed", self.adaptation_speed),
            ("mode_confidence", self.mode_confidence),
        ])?;
        if !(self.adaptation_speed > 0.0 && self.adaptation_speed <= 1.0) {
            return Err(DecisionError::invalid_config(format!(
                "adaptation_speed must be in (0, 1], got {}",
                self.adaptation_speed
            )));
        }
        if !(0.0..=100.0).contains(&self.mode_confidence) {
            return Err(DecisionError::invalid_config(format!(
                "mode_confidence must be in [0, 100], got {}",
                self.mode_confidence
            )));
        }
        if self.adaptation_period_secs <= 0 {
            return Err(DecisionError::invalid_config(
                "adaptation_period_secs must be positive",
            ));
        }
        Ok(())
    }
}

/// External risk limits, all as fractions of equity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub min_risk_per_trade: f64,
    pub max_risk_per_trade: f64,
    pub max_portfolio_risk: f64,
    /// Drawdown (%) at which sizing drops to zero
    pub drawdown_limit_percent: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_risk_per_trade: 0.0025,
            max_risk_per_trade: 0.02,
            max_portfolio_risk: 0.06,
            drawdown_limit_percent: 20.0,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), DecisionError> {
        ensure_finite(&[
            ("min_risk_per_trade", self.min_risk_per_trade),
            ("max_risk_per_trade", self.max_risk_per_trade),
            ("max_portfolio_risk", self.max_portfolio_risk),
            ("drawdown_limit_percent", self.drawdown_limit_percent),
        ])?;
        if self.max_risk_per_trade <= 0.0 || self.max_risk_per_trade > 1.0 {
            return Err(DecisionError::invalid_config(
                "max_risk_per_trade must be between 0 and 1",
            ));
        }
        if self.min_risk_per_trade < 0.0 || self.min_risk_per_trade > self.max_risk_per_trade {
            return Err(DecisionError::invalid_config(
                "min_risk_per_trade must be >= 0 and <= max_risk_per_trade",
            ));
        }
        if self.max_portfolio_risk < self.max_risk_per_trade || self.max_portfolio_risk > 1.0 {
            return Err(DecisionError::invalid_config(
                "max_portfolio_risk must be >= max_risk_per_trade and <= 1",
            ));
        }
        if self.drawdown_limit_percent <= 0.0 {
            return Err(DecisionError::invalid_config(
                "drawdown_limit_percent must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_adaptive_config_is_valid() {
        assert!(AdaptiveConfig::default().validate().is_ok());
        assert!(RiskLimits::default().validate().is_ok());
    }

    #[test]
    fn test_adaptation_speed_bounds() {
        let mut config = AdaptiveConfig::default();
        config.adaptation_speed = 0.0;
        assert!(matches!(
            config.validate(),
            Err(DecisionError::InvalidConfiguration(_))
        ));
        config.adaptation_speed = 1.5;
        assert!(config.validate().is_err());
        config.adaptation_speed = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_risk_limits_ordering() {
        let limits = RiskLimits {
            min_risk_per_trade: 0.05,
            max_risk_per_trade: 0.02,
            ..Default::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_non_finite_limits_rejected() {
        for bad in [f64::NAN, f64::INFINITY] {
            let limits = RiskLimits {
                min_risk_per_trade: bad,
                ..Default::default()
            };
            assert!(matches!(
                limits.validate(),
                Err(DecisionError::InvalidConfiguration(_))
            ));

            let limits = RiskLimits {
                drawdown_limit_percent: bad,
                ..Default::default()
            };
            assert!(limits.validate().is_err());
        }

        let config = AdaptiveConfig {
            mode_confidence: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
