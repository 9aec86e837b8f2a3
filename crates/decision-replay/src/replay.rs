use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use decision_core::{
    AnalyzerReading, Direction, MarketAnalyzer, MarketComponent, MlPrediction, MlPredictor,
    PortfolioGate, PositionValidation, SentimentAnalyzer, SentimentReading, TechnicalSignal,
    TechnicalSignalSource, Timeframe,
};
use serde::{Deserialize, Serialize};

/// Analyzer scores for one step. Absent fields model an analyzer that
/// produced nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub trend: Option<f64>,
    pub volatility: Option<f64>,
    pub liquidity: Option<f64>,
    pub seasonality: Option<f64>,
}

/// Trade result fed back after the step's decision, if it traded
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecordedOutcome {
    pub realized_return: f64,
    #[serde(default)]
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayStep {
    pub at: DateTime<Utc>,
    pub symbol: String,
    #[serde(default)]
    pub components: ComponentScores,
    #[serde(default)]
    pub signal: Option<TechnicalSignal>,
    #[serde(default)]
    pub ml: Option<MlPrediction>,
    #[serde(default)]
    pub sentiment: Option<SentimentReading>,
    #[serde(default)]
    pub session_transition: bool,
    #[serde(default)]
    pub drawdown_percent: f64,
    #[serde(default)]
    pub correlation_exposure: Option<f64>,
    #[serde(default)]
    pub outcome: Option<RecordedOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFile {
    pub steps: Vec<ReplayStep>,
}

impl ReplayFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading replay file {}", path.display()))?;
        let replay: ReplayFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing replay file {}", path.display()))?;
        Ok(replay)
    }
}

/// Serves the current replay step to the engine as every collaborator
pub struct ReplayFeed {
    current: Mutex<Option<ReplayStep>>,
    max_position: f64,
}

impl ReplayFeed {
    pub fn new(max_position: f64) -> Self {
        Self {
            current: Mutex::new(None),
            max_position,
        }
    }

    pub fn load_step(&self, step: &ReplayStep) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(step.clone());
    }

    fn with_step<T>(&self, symbol: &str, f: impl FnOnce(&ReplayStep) -> Option<T>) -> Option<T> {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current
            .as_ref()
            .filter(|step| step.symbol == symbol)
            .and_then(f)
    }
}

impl TechnicalSignalSource for ReplayFeed {
    fn signal(&self, symbol: &str) -> Option<TechnicalSignal> {
        self.with_step(symbol, |step| step.signal.clone())
    }
}

impl MlPredictor for ReplayFeed {
    fn predict(&self, symbol: &str, _horizon: Timeframe) -> Option<MlPrediction> {
        self.with_step(symbol, |step| step.ml)
    }
}

impl SentimentAnalyzer for ReplayFeed {
    fn sentiment(&self, symbol: &str) -> Option<SentimentReading> {
        self.with_step(symbol, |step| step.sentiment)
    }
}

impl MarketAnalyzer for ReplayFeed {
    fn reading(&self, symbol: &str, component: MarketComponent) -> Option<AnalyzerReading> {
        self.with_step(symbol, |step| {
            let scores = &step.components;
            match component {
                MarketComponent::Trend => scores.trend,
                MarketComponent::Volatility => scores.volatility,
                MarketComponent::Liquidity => scores.liquidity,
                MarketComponent::Seasonality => scores.seasonality,
            }
            .map(AnalyzerReading::new)
        })
    }

    fn in_session_transition(&self, symbol: &str, _now: DateTime<Utc>) -> bool {
        self.with_step(symbol, |step| Some(step.session_transition))
            .unwrap_or(false)
    }
}

impl PortfolioGate for ReplayFeed {
    fn validate_position(&self, _symbol: &str, proposed_fraction: f64) -> PositionValidation {
        PositionValidation {
            accepted: proposed_fraction > 0.0,
            max_allowed: self.max_position,
        }
    }

    fn current_drawdown(&self) -> f64 {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.as_ref().map(|s| s.drawdown_percent).unwrap_or(0.0)
    }

    fn correlation_exposure(&self, symbol: &str, _direction: Direction) -> Option<f64> {
        self.with_step(symbol, |step| step.correlation_exposure)
    }
}
