use std::env;
use std::fmt::Display;
use std::str::FromStr;

use adaptation_scheduler::SchedulerConfig;
use decision_core::{AdaptiveConfig, DecisionError, RiskLimits, Timeframe};
use learning_feedback::LearningConfig;
use market_state_classifier::ClassifierConfig;
use mode_selector::ModeSelectorConfig;
use serde::{Deserialize, Serialize};
use signal_fusion::FusionConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub mode_selector: ModeSelectorConfig,
    pub fusion: FusionConfig,
    pub risk_limits: RiskLimits,
    pub learning: LearningConfig,
    pub scheduler: SchedulerConfig,

    /// Starting adaptive config for every new symbol
    pub adaptive: AdaptiveConfig,

    /// Horizon requested from the ML predictor
    pub ml_horizon: Timeframe,

    /// Outcomes buffered for the background learning worker
    pub learning_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            mode_selector: ModeSelectorConfig::default(),
            fusion: FusionConfig::default(),
            risk_limits: RiskLimits::default(),
            learning: LearningConfig::default(),
            scheduler: SchedulerConfig::default(),
            adaptive: AdaptiveConfig::default(),
            ml_horizon: Timeframe::Hour1,
            learning_queue_capacity: 256,
        }
    }
}

/// Parsed environment variable, or `default` when unset.
fn var_or<T>(key: &str, default: T) -> Result<T, DecisionError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| DecisionError::invalid_config(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables. Values are validated
    /// before being returned.
    pub fn from_env() -> Result<Self, DecisionError> {
        let d = Self::default();

        let config = Self {
            classifier: ClassifierConfig {
                stability_epsilon: var_or("STABILITY_EPSILON", d.classifier.stability_epsilon)?,
                min_components: var_or("MIN_COMPONENTS", d.classifier.min_components)?,
                ..d.classifier
            },
            mode_selector: ModeSelectorConfig {
                min_samples: var_or("MODE_MIN_SAMPLES", d.mode_selector.min_samples)?,
                switch_margin: var_or("MODE_SWITCH_MARGIN", d.mode_selector.switch_margin)?,
                confirm_cycles: var_or("MODE_CONFIRM_CYCLES", d.mode_selector.confirm_cycles)?,
                ..d.mode_selector
            },
            fusion: FusionConfig {
                max_correlation_exposure: var_or(
                    "MAX_CORRELATION_EXPOSURE",
                    d.fusion.max_correlation_exposure,
                )?,
                sentiment_floor: var_or("SENTIMENT_FLOOR", d.fusion.sentiment_floor)?,
                ..d.fusion
            },
            risk_limits: RiskLimits {
                min_risk_per_trade: var_or("MIN_RISK_PER_TRADE", d.risk_limits.min_risk_per_trade)?,
                max_risk_per_trade: var_or("MAX_RISK_PER_TRADE", d.risk_limits.max_risk_per_trade)?,
                max_portfolio_risk: var_or("MAX_PORTFOLIO_RISK", d.risk_limits.max_portfolio_risk)?,
                drawdown_limit_percent: var_or(
                    "DRAWDOWN_LIMIT_PERCENT",
                    d.risk_limits.drawdown_limit_percent,
                )?,
            },
            learning: LearningConfig {
                experience_capacity: var_or("EXPERIENCE_CAPACITY", d.learning.experience_capacity)?,
                weight_learning_rate: var_or(
                    "WEIGHT_LEARNING_RATE",
                    d.learning.weight_learning_rate,
                )?,
                ..d.learning
            },
            scheduler: SchedulerConfig {
                learning_period_secs: var_or(
                    "LEARNING_PERIOD_SECS",
                    d.scheduler.learning_period_secs,
                )?,
                ..d.scheduler
            },
            adaptive: AdaptiveConfig {
                adaptation_speed: var_or("ADAPTATION_SPEED", d.adaptive.adaptation_speed)?,
                adaptation_period_secs: var_or(
                    "ADAPTATION_PERIOD_SECS",
                    d.adaptive.adaptation_period_secs,
                )?,
                toggles: decision_core::FeatureToggles {
                    ml_enabled: var_or("ML_ENABLED", d.adaptive.toggles.ml_enabled)?,
                    sentiment_enabled: var_or(
                        "SENTIMENT_ENABLED",
                        d.adaptive.toggles.sentiment_enabled,
                    )?,
                    adaptive_weights: var_or("ADAPTIVE_WEIGHTS", d.adaptive.toggles.adaptive_weights)?,
                    adaptive_mode_selection: var_or(
                        "ADAPTIVE_MODE_SELECTION",
                        d.adaptive.toggles.adaptive_mode_selection,
                    )?,
                    regime_override: var_or("REGIME_OVERRIDE", d.adaptive.toggles.regime_override)?,
                },
                ..d.adaptive
            },
            ml_horizon: var_or("ML_HORIZON", d.ml_horizon)?,
            learning_queue_capacity: var_or(
                "LEARNING_QUEUE_CAPACITY",
                d.learning_queue_capacity,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DecisionError> {
        self.classifier.validate()?;
        self.mode_selector.validate()?;
        self.fusion.validate()?;
        self.risk_limits.validate()?;
        self.learning.validate()?;
        self.scheduler.validate()?;
        self.adaptive.validate()?;
        if self.learning_queue_capacity == 0 {
            return Err(DecisionError::invalid_config(
                "learning_queue_capacity must be positive",
            ));
        }
        Ok(())
    }
}
