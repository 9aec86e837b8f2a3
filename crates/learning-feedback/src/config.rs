use decision_core::{ensure_finite, DecisionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Experience ring capacity
    pub experience_capacity: usize,

    /// Decisions awaiting an outcome before the oldest is dropped
    pub max_pending: usize,

    /// Step size of the weight nudge
    pub weight_learning_rate: f64,

    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            experience_capacity: 1000,
            max_pending: 10_000,
            weight_learning_rate: 0.05,
            min_weight: 0.05,
            max_weight: 3.0,
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> Result<(), DecisionError> {
        if self.experience_capacity == 0 || self.max_pending == 0 {
            return Err(DecisionError::invalid_config(
                "experience_capacity and max_pending must be positive",
            ));
        }
        ensure_finite(&[
            ("weight_learning_rate", self.weight_learning_rate),
            ("min_weight", self.min_weight),
            ("max_weight", self.max_weight),
        ])?;
        if !(0.0..=1.0).contains(&self.weight_learning_rate) {
            return Err(DecisionError::invalid_config(
                "weight_learning_rate must be in [0, 1]",
            ));
        }
        if self.min_weight <= 0.0 || self.min_weight > self.max_weight {
            return Err(DecisionError::invalid_config(
                "weight bounds must satisfy 0 < min_weight <= max_weight",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LearningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_non_finite_weight_bounds_rejected() {
        let config = LearningConfig {
            min_weight: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DecisionError::InvalidConfiguration(_))
        ));

        let config = LearningConfig {
            max_weight: f64::INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
