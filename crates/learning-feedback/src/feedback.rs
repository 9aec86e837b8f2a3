use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use decision_core::{
    DecisionError, DecisionId, DecisionMode, ExperienceBuffer, ExperienceEntry, FeatureSnapshot,
    FusionWeights, MarketState, PerformanceRecord, PerformanceTable,
};
use serde::{Deserialize, Serialize};
use signal_fusion::{CalibrationSample, CalibrationStats, CalibrationTable, WeightStore};
use tracing::{debug, info, warn};

use crate::config::LearningConfig;
use crate::record::update_record;

/// A traded decision waiting for its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub decision_id: DecisionId,
    pub symbol: String,
    pub mode: DecisionMode,
    pub state: MarketState,
    pub features: FeatureSnapshot,
    /// EWMA alpha of the deciding symbol at decision time
    pub adaptation_speed: f64,
    pub decided_at: DateTime<Utc>,
}

/// Realized result of a trade, fractions of equity (0.01 = 1 %)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub decision_id: DecisionId,
    pub realized_return: f64,
    pub max_drawdown: f64,
}

/// What one recorded outcome changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeUpdate {
    pub decision_id: DecisionId,
    pub symbol: String,
    pub mode: DecisionMode,
    pub state: MarketState,
    pub record: PerformanceRecord,
    pub weights: FusionWeights,
    /// Entry pushed out of the experience ring, if it was full
    pub evicted: Option<DecisionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPassReport {
    pub samples: usize,
    pub outcomes_since_last_pass: u64,
    pub stats: CalibrationStats,
    pub ran_at: DateTime<Utc>,
}

/// Process-lifetime learning state shared by every symbol
pub struct LearningFeedbackLoop {
    config: LearningConfig,
    performance: PerformanceTable,
    experience: ExperienceBuffer<ExperienceEntry>,
    weights: WeightStore,
    calibration: CalibrationTable,
    pending: BTreeMap<DecisionId, PendingDecision>,
    outcomes_recorded: u64,
    outcomes_since_pass: u64,
    pending_dropped: u64,
    last_pass: Option<DateTime<Utc>>,
}

impl LearningFeedbackLoop {
    pub fn new(config: LearningConfig) -> Result<Self, DecisionError> {
        config.validate()?;
        let experience = ExperienceBuffer::new(config.experience_capacity)?;
        Ok(Self {
            config,
            performance: PerformanceTable::new(),
            experience,
            weights: WeightStore::new(),
            calibration: CalibrationTable::default(),
            pending: BTreeMap::new(),
            outcomes_recorded: 0,
            outcomes_since_pass: 0,
            pending_dropped: 0,
            last_pass: None,
        })
    }

    /// Remember a traded decision so its outcome can be matched later.
    pub fn register(&mut self, decision: PendingDecision) {
        if self.pending.len() >= self.config.max_pending {
            if let Some((oldest, _)) = self.pending.pop_first() {
                self.pending_dropped += 1;
                warn!(decision_id = %oldest, "pending decisions full, dropping oldest");
            }
        }
        self.pending.insert(decision.decision_id, decision);
    }

    /// Fold an outcome into the performance table, experience ring and
    /// fusion weights.
    pub fn record_outcome(
        &mut self,
        outcome: TradeOutcome,
        now: DateTime<Utc>,
    ) -> Result<OutcomeUpdate, DecisionError> {
        let pending = self
            .pending
            .remove(&outcome.decision_id)
            .ok_or(DecisionError::UnknownDecision(outcome.decision_id))?;

        let return_percent = outcome.realized_return * 100.0;
        let holding_secs = (now - pending.decided_at).num_milliseconds().max(0) as f64 / 1000.0;

        let record = self.performance.entry(pending.mode, pending.state);
        update_record(
            record,
            return_percent,
            outcome.max_drawdown * 100.0,
            holding_secs,
            pending.adaptation_speed,
            now,
        );
        let record = record.clone();

        let reward_sign = if outcome.realized_return > 0.0 {
            1.0
        } else if outcome.realized_return < 0.0 {
            -1.0
        } else {
            0.0
        };
        let weights = match pending.features.contributions {
            Some(contributions) => {
                let current = self.weights.get(pending.mode);
                self.weights.nudge(
                    pending.mode,
                    contributions.shares(&current),
                    reward_sign,
                    self.config.weight_learning_rate,
                    (self.config.min_weight, self.config.max_weight),
                )
            }
            None => self.weights.get(pending.mode),
        };

        let evicted = self
            .experience
            .push(ExperienceEntry {
                decision_id: pending.decision_id,
                symbol: pending.symbol.clone(),
                features: pending.features,
                chosen_mode: pending.mode,
                chosen_state: pending.state,
                realized_reward: outcome.realized_return,
                recorded_at: now,
            })
            .map(|entry| entry.decision_id);

        self.outcomes_recorded += 1;
        self.outcomes_since_pass += 1;

        debug!(
            decision_id = %pending.decision_id,
            symbol = %pending.symbol,
            mode = %pending.mode,
            state = %pending.state,
            return_percent,
            trades = record.trade_count,
            "outcome recorded"
        );

        Ok(OutcomeUpdate {
            decision_id: pending.decision_id,
            symbol: pending.symbol,
            mode: pending.mode,
            state: pending.state,
            record,
            weights,
            evicted,
        })
    }

    /// Refit the calibration table from the experience ring.
    pub fn run_learning_pass(&mut self, now: DateTime<Utc>) -> LearningPassReport {
        let samples: Vec<CalibrationSample> = self
            .experience
            .iter()
            .map(|entry| CalibrationSample {
                confidence: entry.features.confidence_level,
                predicted: entry.features.win_probability,
                won: entry.realized_reward > 0.0,
            })
            .collect();

        self.calibration = CalibrationTable::fit(&samples);
        let report = LearningPassReport {
            samples: samples.len(),
            outcomes_since_last_pass: self.outcomes_since_pass,
            stats: self.calibration.stats().clone(),
            ran_at: now,
        };
        self.outcomes_since_pass = 0;
        self.last_pass = Some(now);

        info!(
            samples = report.samples,
            ece = report.stats.ece,
            brier = report.stats.brier_score,
            "learning pass complete"
        );
        report
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn performance(&self) -> &PerformanceTable {
        &self.performance
    }

    pub fn weights(&self) -> &WeightStore {
        &self.weights
    }

    pub fn mode_weights(&self, mode: DecisionMode) -> FusionWeights {
        self.weights.get(mode)
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub fn experience(&self) -> &ExperienceBuffer<ExperienceEntry> {
        &self.experience
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_dropped(&self) -> u64 {
        self.pending_dropped
    }

    pub fn is_pending(&self, id: DecisionId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn outcomes_recorded(&self) -> u64 {
        self.outcomes_recorded
    }

    pub fn outcomes_since_pass(&self) -> u64 {
        self.outcomes_since_pass
    }

    pub fn last_pass(&self) -> Option<DateTime<Utc>> {
        self.last_pass
    }
}
