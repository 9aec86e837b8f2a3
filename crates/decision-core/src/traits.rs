use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::{
    AnalyzerReading, Direction, MarketComponent, MlPrediction, PositionValidation,
    SentimentReading, TechnicalSignal, Timeframe,
};

/// Source of directional technical signals
pub trait TechnicalSignalSource: Send + Sync {
    fn signal(&self, symbol: &str) -> Option<TechnicalSignal>;
}

/// ML price/direction predictor
pub trait MlPredictor: Send + Sync {
    fn predict(&self, symbol: &str, horizon: Timeframe) -> Option<MlPrediction>;
}

/// News and sentiment analyzer
pub trait SentimentAnalyzer: Send + Sync {
    fn sentiment(&self, symbol: &str) -> Option<SentimentReading>;
}

/// Trend, volatility, liquidity and seasonality analyzers behind one seam
pub trait MarketAnalyzer: Send + Sync {
    fn reading(&self, symbol: &str, component: MarketComponent) -> Option<AnalyzerReading>;

    /// Whether `now` falls inside a trading-session hand-over for the symbol.
    fn in_session_transition(&self, _symbol: &str, _now: DateTime<Utc>) -> bool {
        false
    }
}

/// Portfolio and risk bookkeeping owned by the host
pub trait PortfolioGate: Send + Sync {
    fn validate_position(&self, symbol: &str, proposed_fraction: f64) -> PositionValidation;

    /// Current equity drawdown from peak, in percent
    fn current_drawdown(&self) -> f64;

    /// Correlated exposure the new position would add to, 0 to 100
    fn correlation_exposure(&self, symbol: &str, direction: Direction) -> Option<f64>;

    /// Fraction of equity already at risk in open positions
    fn open_risk(&self) -> f64 {
        0.0
    }
}

/// Time source, injectable so cadence and holding times are testable
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
