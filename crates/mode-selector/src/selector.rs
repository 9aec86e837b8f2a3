use decision_core::adaptive::clamp_score;
use decision_core::{
    ensure_finite, DecisionError, DecisionMode, MarketProfile, PerformanceTable,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::preferences::mode_preferences;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSelectorConfig {
    /// Trades a (mode, state) record needs before it can drive adaptation
    pub min_samples: u64,

    /// Points an alternate must beat the preferred mode by
    pub switch_margin: f64,

    /// Consecutive cycles a new mode must stay preferred before committing
    pub confirm_cycles: u32,

    /// Penalty per point of drawdown in the risk-adjusted score
    pub drawdown_weight: f64,

    /// Confidence points per point of winning margin
    pub confidence_scale: f64,
}

impl Default for ModeSelectorConfig {
    fn default() -> Self {
        Self {
            min_samples: 20,
            switch_margin: 0.5,
            confirm_cycles: 2,
            drawdown_weight: 0.5,
            confidence_scale: 20.0,
        }
    }
}

impl ModeSelectorConfig {
    pub fn validate(&self) -> Result<(), DecisionError> {
        ensure_finite(&[
            ("switch_margin", self.switch_margin),
            ("drawdown_weight", self.drawdown_weight),
            ("confidence_scale", self.confidence_scale),
        ])?;
        if self.switch_margin < 0.0 {
            return Err(DecisionError::invalid_config("switch_margin must be >= 0"));
        }
        if self.confirm_cycles == 0 {
            return Err(DecisionError::invalid_config("confirm_cycles must be >= 1"));
        }
        if self.drawdown_weight < 0.0 || self.confidence_scale <= 0.0 {
            return Err(DecisionError::invalid_config(
                "drawdown_weight must be >= 0 and confidence_scale > 0",
            ));
        }
        Ok(())
    }
}

/// Per-symbol hysteresis state carried between cycles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeState {
    pub active: Option<DecisionMode>,
    pub pending: Option<DecisionMode>,
    pub pending_cycles: u32,
}

/// Outcome of one selection cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSelection {
    /// Mode in force after this cycle
    pub mode: DecisionMode,
    /// Mode the scoreboard preferred this cycle
    pub desired: DecisionMode,
    pub runner_up: Option<DecisionMode>,
    /// 0 to 100
    pub mode_confidence: f64,
    pub switched: bool,
    pub next_state: ModeState,
    pub reasoning: String,
}

pub struct ModeSelector {
    config: ModeSelectorConfig,
}

impl ModeSelector {
    pub fn new(config: ModeSelectorConfig) -> Result<Self, DecisionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModeSelectorConfig {
        &self.config
    }

    /// Select the mode for this cycle.
    ///
    /// `regime_break` commits a changed mode immediately; otherwise the new
    /// mode has to win `confirm_cycles` cycles in a row.
    pub fn select(
        &self,
        profile: &MarketProfile,
        performance: &PerformanceTable,
        current: &ModeState,
        regime_break: bool,
        adaptive: bool,
    ) -> ModeSelection {
        let (desired, runner_up, margin) = self.rank(profile, performance, adaptive);

        let (mode, switched, next_state) = match current.active {
            None => (
                desired,
                true,
                ModeState {
                    active: Some(desired),
                    ..Default::default()
                },
            ),
            Some(active) if active == desired => (
                active,
                false,
                ModeState {
                    active: Some(active),
                    ..Default::default()
                },
            ),
            Some(active) => {
                let cycles = if current.pending == Some(desired) {
                    current.pending_cycles + 1
                } else {
                    1
                };

                if regime_break || cycles >= self.config.confirm_cycles {
                    info!(
                        symbol = %profile.symbol,
                        from = %active,
                        to = %desired,
                        regime_break,
                        "committing mode switch"
                    );
                    (
                        desired,
                        true,
                        ModeState {
                            active: Some(desired),
                            ..Default::default()
                        },
                    )
                } else {
                    debug!(
                        symbol = %profile.symbol,
                        active = %active,
                        pending = %desired,
                        cycles,
                        "mode switch pending confirmation"
                    );
                    (
                        active,
                        false,
                        ModeState {
                            active: Some(active),
                            pending: Some(desired),
                            pending_cycles: cycles,
                        },
                    )
                }
            }
        };

        // A mode held by hysteresis did not win this cycle's scoreboard
        let mode_confidence = if mode == desired {
            clamp_score(margin * self.config.confidence_scale)
        } else {
            0.0
        };

        let reasoning = format!(
            "{} for {} (desired: {}, margin: {:.2}, {})",
            mode.name(),
            profile.current_state.name(),
            desired.name(),
            margin,
            if switched {
                "switched"
            } else if next_state.pending.is_some() {
                "switch pending"
            } else {
                "held"
            }
        );

        ModeSelection {
            mode,
            desired,
            runner_up,
            mode_confidence,
            switched,
            next_state,
            reasoning,
        }
    }

    /// Scoreboard winner, runner-up and winning margin in points.
    ///
    /// The statically preferred mode enters with a bonus of `switch_margin`,
    /// so an alternate only wins by beating it by more than that.
    fn rank(
        &self,
        profile: &MarketProfile,
        performance: &PerformanceTable,
        adaptive: bool,
    ) -> (DecisionMode, Option<DecisionMode>, f64) {
        let state = profile.current_state;
        let pref = mode_preferences(state);

        let sampled_score = |mode: DecisionMode| {
            performance
                .get(mode, state)
                .filter(|r| r.trade_count >= self.config.min_samples)
                .map(|r| r.risk_adjusted(self.config.drawdown_weight))
        };

        let preferred_raw = sampled_score(pref.preferred).unwrap_or(0.0);
        let mut board = vec![(pref.preferred, preferred_raw + self.config.switch_margin)];
        if adaptive {
            board.extend(
                pref.alternates
                    .iter()
                    .filter_map(|mode| sampled_score(*mode).map(|score| (*mode, score))),
            );
        }

        // Stable sort: ties go to the preferred mode, then table order
        board.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (winner, winner_score) = board[0];
        let (runner_up, runner_up_score) = match board.get(1) {
            Some((mode, score)) => (Some(*mode), *score),
            None => (pref.alternates.first().copied(), preferred_raw),
        };

        (winner, runner_up, (winner_score - runner_up_score).max(0.0))
    }
}

impl Default for ModeSelector {
    fn default() -> Self {
        Self {
            config: ModeSelectorConfig::default(),
        }
    }
}
