use std::collections::HashMap;

use decision_core::{DecisionMode, FusionWeights, SignalSource};
use serde::{Deserialize, Serialize};

use crate::profiles::mode_profile;

/// Per-mode fusion weights, seeded from the mode profiles and nudged by
/// trade outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightStore {
    weights: HashMap<DecisionMode, FusionWeights>,
}

impl Default for WeightStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightStore {
    pub fn new() -> Self {
        let weights = DecisionMode::ALL
            .iter()
            .map(|mode| (*mode, mode_profile(*mode).default_weights))
            .collect();
        Self { weights }
    }

    pub fn get(&self, mode: DecisionMode) -> FusionWeights {
        self.weights
            .get(&mode)
            .copied()
            .unwrap_or_else(|| mode_profile(mode).default_weights)
    }

    pub fn set(&mut self, mode: DecisionMode, weights: FusionWeights) {
        self.weights.insert(mode, weights);
    }

    /// Reinforce (`reward_sign > 0`) or decay (`< 0`) each source in
    /// proportion to its share of the fused score, clamped to `bounds`.
    pub fn nudge(
        &mut self,
        mode: DecisionMode,
        shares: [f64; 3],
        reward_sign: f64,
        learning_rate: f64,
        bounds: (f64, f64),
    ) -> FusionWeights {
        let mut weights = self.get(mode);
        if reward_sign == 0.0 {
            return weights;
        }

        for (source, share) in SignalSource::ALL.iter().zip(shares) {
            let w = weights.get(*source);
            let nudged = w * (1.0 + reward_sign.signum() * learning_rate * share);
            weights.set(*source, nudged.clamp(bounds.0, bounds.1));
        }

        self.weights.insert(mode, weights);
        weights
    }

    /// All weights in mode order
    pub fn snapshot(&self) -> Vec<(DecisionMode, FusionWeights)> {
        DecisionMode::ALL
            .iter()
            .map(|mode| (*mode, self.get(*mode)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_seeded_from_profiles() {
        let store = WeightStore::new();
        let w = store.get(DecisionMode::TrendFollowing);
        assert_relative_eq!(w.technical, 0.6);
        assert_eq!(store.snapshot().len(), DecisionMode::ALL.len());
    }

    #[test]
    fn test_nudge_direction_and_size() {
        let mut store = WeightStore::new();
        let up = store.nudge(DecisionMode::TrendFollowing, [0.6, 0.2, 0.2], 1.0, 0.05, (0.05, 3.0));
        assert_relative_eq!(up.technical, 0.6 * 1.03, epsilon = 1e-12);
        assert_relative_eq!(up.ml, 0.2 * 1.01, epsilon = 1e-12);

        let down = store.nudge(DecisionMode::Swing, [0.5, 0.3, 0.2], -1.0, 0.05, (0.05, 3.0));
        assert!(down.technical < 0.5);
    }

    #[test]
    fn test_zero_reward_leaves_weights() {
        let mut store = WeightStore::new();
        let before = store.get(DecisionMode::Moderate);
        let after = store.nudge(DecisionMode::Moderate, [0.5, 0.25, 0.25], 0.0, 0.05, (0.05, 3.0));
        assert_eq!(before, after);
    }

    #[test]
    fn test_nudge_is_bounded() {
        let mut store = WeightStore::new();
        for _ in 0..10_000 {
            store.nudge(DecisionMode::MLDriven, [0.1, 0.8, 0.1], 1.0, 0.05, (0.05, 3.0));
        }
        let w = store.get(DecisionMode::MLDriven);
        assert!(w.ml <= 3.0);

        for _ in 0..10_000 {
            store.nudge(DecisionMode::MLDriven, [0.1, 0.8, 0.1], -1.0, 0.05, (0.05, 3.0));
        }
        assert!(store.get(DecisionMode::MLDriven).ml >= 0.05);
    }
}
