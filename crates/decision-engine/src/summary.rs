use chrono::{DateTime, Utc};
use decision_core::{DecisionMode, FusionWeights, MarketState, PerformanceEntry};
use serde::{Deserialize, Serialize};
use signal_fusion::{CalibrationBin, CalibrationStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeWeights {
    pub mode: DecisionMode,
    pub weights: FusionWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub state: Option<MarketState>,
    pub mode: DecisionMode,
    pub mode_confidence: f64,
    pub last_adaptation: Option<DateTime<Utc>>,
}

/// Read-only snapshot of the engine's learning state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub generated_at: DateTime<Utc>,
    pub records: Vec<PerformanceEntry>,
    pub total_trades: u64,
    pub experience_len: usize,
    pub experience_capacity: usize,
    pub experience_evicted: u64,
    pub pending_decisions: usize,
    pub outcomes_recorded: u64,
    pub weights: Vec<ModeWeights>,
    pub calibration: CalibrationStats,
    pub calibration_bins: Vec<CalibrationBin>,
    pub last_learning_pass: Option<DateTime<Utc>>,
    pub symbols: Vec<SymbolSummary>,
}
