use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete classification of current market behaviour for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketState {
    /// Directional up-move with contained volatility
    TrendingBull,

    /// Directional down-move with contained volatility
    TrendingBear,

    /// Sideways market, no trend and moderate volatility
    RangeBound,

    /// Volatility spike, wide swings
    HighVolatility,

    /// Quiet tape, tight ranges
    LowVolatility,

    /// Trend emerging out of compression
    Breakout,

    /// Trend direction flipped since the previous cycle
    Reversal,

    /// Price action dominated by a news release
    NewsImpact,

    /// Trading session hand-over (e.g. London open)
    SessionTransition,

    /// Nothing matches well enough, or too little data
    Uncertain,
}

impl MarketState {
    pub const ALL: [MarketState; 10] = [
        MarketState::TrendingBull,
        MarketState::TrendingBear,
        MarketState::RangeBound,
        MarketState::HighVolatility,
        MarketState::LowVolatility,
        MarketState::Breakout,
        MarketState::Reversal,
        MarketState::NewsImpact,
        MarketState::SessionTransition,
        MarketState::Uncertain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketState::TrendingBull => "Trending Bull",
            MarketState::TrendingBear => "Trending Bear",
            MarketState::RangeBound => "Range Bound",
            MarketState::HighVolatility => "High Volatility",
            MarketState::LowVolatility => "Low Volatility",
            MarketState::Breakout => "Breakout",
            MarketState::Reversal => "Reversal",
            MarketState::NewsImpact => "News Impact",
            MarketState::SessionTransition => "Session Transition",
            MarketState::Uncertain => "Uncertain",
        }
    }

    /// States that signal an abrupt regime change.
    pub fn is_disruptive(&self) -> bool {
        matches!(
            self,
            MarketState::Reversal | MarketState::NewsImpact | MarketState::HighVolatility
        )
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operating strategy family for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DecisionMode {
    Conservative,
    Moderate,
    Aggressive,
    Scalping,
    Swing,
    TrendFollowing,
    MeanReversion,
    BreakoutHunter,
    NewsTrader,
    MLDriven,
}

impl DecisionMode {
    pub const ALL: [DecisionMode; 10] = [
        DecisionMode::Conservative,
        DecisionMode::Moderate,
        DecisionMode::Aggressive,
        DecisionMode::Scalping,
        DecisionMode::Swing,
        DecisionMode::TrendFollowing,
        DecisionMode::MeanReversion,
        DecisionMode::BreakoutHunter,
        DecisionMode::NewsTrader,
        DecisionMode::MLDriven,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DecisionMode::Conservative => "Conservative",
            DecisionMode::Moderate => "Moderate",
            DecisionMode::Aggressive => "Aggressive",
            DecisionMode::Scalping => "Scalping",
            DecisionMode::Swing => "Swing",
            DecisionMode::TrendFollowing => "Trend Following",
            DecisionMode::MeanReversion => "Mean Reversion",
            DecisionMode::BreakoutHunter => "Breakout Hunter",
            DecisionMode::NewsTrader => "News Trader",
            DecisionMode::MLDriven => "ML Driven",
        }
    }
}

impl fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trade direction proposed by the technical-signal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1.0 for Buy, -1.0 for Sell
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    /// Whether a signed value points the same way (zero counts as agreeing).
    pub fn agrees_with(&self, value: f64) -> bool {
        value * self.sign() >= 0.0
    }
}

/// Horizon requested from the ML predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Day1,
}

impl FromStr for Timeframe {
    type Err = crate::DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::Minute1),
            "5m" | "5min" => Ok(Timeframe::Minute5),
            "15m" | "15min" => Ok(Timeframe::Minute15),
            "30m" | "30min" => Ok(Timeframe::Minute30),
            "1h" | "1hour" => Ok(Timeframe::Hour1),
            "4h" | "4hour" => Ok(Timeframe::Hour4),
            "1d" | "daily" => Ok(Timeframe::Day1),
            other => Err(crate::DecisionError::invalid_config(format!(
                "unknown timeframe '{}'",
                other
            ))),
        }
    }
}

/// Output of the technical-signal collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub direction: Direction,
    /// Raw strength, 0 to 100
    pub strength: f64,
    #[serde(default)]
    pub contributing_indicators: Vec<String>,
}

/// Output of the ML predictor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    /// Signed prediction (positive = up)
    pub value: f64,
    /// 0 to 100
    pub confidence: f64,
}

/// Output of the sentiment analyzer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// 0 (bearish) to 100 (bullish), 50 neutral
    pub score: f64,
    /// How strongly news currently drives price, 0 to 100
    #[serde(default)]
    pub news_impact: f64,
    #[serde(default)]
    pub high_impact_news: bool,
}

/// A normalized reading from a volatility/trend/liquidity/seasonality analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerReading {
    /// 0 to 100, 50 neutral
    pub score: f64,
    /// Analyzer's own regime tag, informational
    #[serde(default)]
    pub regime: Option<String>,
}

impl AnalyzerReading {
    pub fn new(score: f64) -> Self {
        Self { score, regime: None }
    }
}

/// Market analyzers the classifier reads one score from each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketComponent {
    Trend,
    Volatility,
    Liquidity,
    Seasonality,
}

/// Answer of the portfolio/risk collaborator to a proposed position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionValidation {
    pub accepted: bool,
    /// Largest fraction of equity the portfolio would accept
    pub max_allowed: f64,
}

/// Raw component scores fed to the classifier. `None` marks a collaborator
/// that produced nothing this cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInputs {
    pub trend: Option<f64>,
    pub volatility: Option<f64>,
    pub liquidity: Option<f64>,
    pub sentiment: Option<f64>,
    pub seasonal: Option<f64>,
    #[serde(default)]
    pub news_impact: Option<f64>,
    #[serde(default)]
    pub is_session_transition: bool,
    #[serde(default)]
    pub is_high_impact_news: bool,
}

impl ComponentInputs {
    pub const COMPONENT_COUNT: usize = 5;

    /// Number of the five core components that are present.
    pub fn available_count(&self) -> usize {
        [
            self.trend,
            self.volatility,
            self.liquidity,
            self.sentiment,
            self.seasonal,
        ]
        .iter()
        .filter(|c| c.is_some())
        .count()
    }

    pub fn is_complete(&self) -> bool {
        self.available_count() == Self::COMPONENT_COUNT
    }
}

/// Per-symbol classification result, rebuilt every classification cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketProfile {
    pub symbol: String,
    pub current_state: MarketState,
    pub previous_state: Option<MarketState>,
    /// 0 to 100
    pub state_confidence: f64,
    /// Effective trend, 0 to 100 (50 flat)
    pub trend_strength: f64,
    pub volatility_level: f64,
    pub liquidity_level: f64,
    pub sentiment_score: f64,
    pub news_impact_level: f64,
    pub timestamp: DateTime<Utc>,
    pub is_session_transition: bool,
    pub is_high_impact_news: bool,
    /// Set when one or more components were missing and defaulted
    pub reduced_confidence: bool,
    pub missing_components: usize,
    pub reasoning: String,
}

impl MarketProfile {
    /// A stable state turned into Reversal, NewsImpact or HighVolatility.
    pub fn is_regime_break(&self) -> bool {
        match self.previous_state {
            Some(prev) => !prev.is_disruptive() && self.current_state.is_disruptive(),
            None => false,
        }
    }

    pub fn state_changed(&self) -> bool {
        self.previous_state
            .map(|prev| prev != self.current_state)
            .unwrap_or(false)
    }
}

/// Identifier handed back with every decision so outcomes can be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DecisionId(pub u64);

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D-{:08}", self.0)
    }
}

/// Signal sources fused by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalSource {
    Technical,
    Ml,
    Sentiment,
}

impl SignalSource {
    pub const ALL: [SignalSource; 3] = [
        SignalSource::Technical,
        SignalSource::Ml,
        SignalSource::Sentiment,
    ];
}

/// Per-mode weights of the three fused sources. Adapted by the learning loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub technical: f64,
    pub ml: f64,
    pub sentiment: f64,
}

impl FusionWeights {
    pub const fn new(technical: f64, ml: f64, sentiment: f64) -> Self {
        Self {
            technical,
            ml,
            sentiment,
        }
    }

    pub fn get(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::Technical => self.technical,
            SignalSource::Ml => self.ml,
            SignalSource::Sentiment => self.sentiment,
        }
    }

    pub fn set(&mut self, source: SignalSource, value: f64) {
        match source {
            SignalSource::Technical => self.technical = value,
            SignalSource::Ml => self.ml = value,
            SignalSource::Sentiment => self.sentiment = value,
        }
    }
}

/// Component values (0-100) that went into the opportunity score. `ml` is
/// `None` when ML was disabled for the mode or produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceContributions {
    pub technical: f64,
    pub ml: Option<f64>,
    pub sentiment: f64,
}

impl SourceContributions {
    pub fn component(&self, source: SignalSource) -> Option<f64> {
        match source {
            SignalSource::Technical => Some(self.technical),
            SignalSource::Ml => self.ml,
            SignalSource::Sentiment => Some(self.sentiment),
        }
    }

    /// Share of each source in the weighted sum, in `SignalSource::ALL` order.
    pub fn shares(&self, weights: &FusionWeights) -> [f64; 3] {
        let parts: Vec<f64> = SignalSource::ALL
            .iter()
            .map(|s| {
                self.component(*s)
                    .map(|c| c * weights.get(*s))
                    .unwrap_or(0.0)
            })
            .collect();
        let total: f64 = parts.iter().sum();
        if total <= f64::EPSILON {
            return [0.0; 3];
        }
        [parts[0] / total, parts[1] / total, parts[2] / total]
    }
}

/// Dynamic filters in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Volatility,
    Liquidity,
    Correlation,
    SentimentAlignment,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Volatility => "volatility",
            FilterKind::Liquidity => "liquidity",
            FilterKind::Correlation => "correlation",
            FilterKind::SentimentAlignment => "sentiment_alignment",
        }
    }
}

/// Result of one dynamic filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterVerdict {
    pub kind: FilterKind,
    pub passed: bool,
    /// Distance from the rejection boundary, 0 (on it) to 1 (far)
    pub margin: f64,
    pub note: String,
}

/// Fused, scored decision for one request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMetrics {
    pub direction: Option<Direction>,
    pub signal_strength: f64,
    pub risk_level: f64,
    pub opportunity_score: f64,
    /// 0 to 100
    pub confidence_level: f64,
    /// In R multiples
    pub expected_reward: f64,
    pub max_drawdown_risk: f64,
    /// 0 to 1
    pub win_probability: f64,
    pub required_confirmations: u32,
    pub agreeing_sources: u32,
    pub passes_dynamic_filters: bool,
    pub filter_verdicts: Vec<FilterVerdict>,
    pub contributions: Option<SourceContributions>,
    pub reduced_confidence: bool,
    pub reasoning: String,
}

impl DecisionMetrics {
    /// Zero-confidence, filter-rejected metrics: the worst case of any cycle.
    pub fn no_trade(reasoning: impl Into<String>, required_confirmations: u32) -> Self {
        Self {
            direction: None,
            signal_strength: 0.0,
            risk_level: 0.0,
            opportunity_score: 0.0,
            confidence_level: 0.0,
            expected_reward: 0.0,
            max_drawdown_risk: 0.0,
            win_probability: 0.0,
            required_confirmations,
            agreeing_sources: 0,
            passes_dynamic_filters: false,
            filter_verdicts: Vec::new(),
            contributions: None,
            reduced_confidence: true,
            reasoning: reasoning.into(),
        }
    }

    pub fn first_rejection(&self) -> Option<&FilterVerdict> {
        self.filter_verdicts.iter().find(|v| !v.passed)
    }
}

/// Running statistics for one (mode, state) pair. Units are percent points
/// for profitability and drawdown, seconds for holding time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// EWMA of the win indicator, 0 to 1
    pub accuracy: f64,
    /// EWMA of realized return (%)
    pub profitability: f64,
    pub trade_count: u64,
    /// EWMA holding time (seconds)
    pub avg_holding_time: f64,
    /// EWMA of max drawdown during trade (%)
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    /// EWMA variance of returns, backs the Sharpe estimate
    pub return_variance: f64,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for PerformanceRecord {
    fn default() -> Self {
        Self {
            accuracy: 0.0,
            profitability: 0.0,
            trade_count: 0,
            avg_holding_time: 0.0,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            return_variance: 0.0,
            last_update: None,
        }
    }
}

impl PerformanceRecord {
    /// Profitability net of a drawdown penalty.
    pub fn risk_adjusted(&self, drawdown_weight: f64) -> f64 {
        self.profitability - drawdown_weight * self.max_drawdown
    }
}

/// What the engine knew when it made a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub trend_strength: f64,
    pub volatility_level: f64,
    pub liquidity_level: f64,
    pub sentiment_score: f64,
    pub opportunity_score: f64,
    pub confidence_level: f64,
    pub win_probability: f64,
    pub contributions: Option<SourceContributions>,
}

/// One recorded (decision, outcome) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub decision_id: DecisionId,
    pub symbol: String,
    pub features: FeatureSnapshot,
    pub chosen_mode: DecisionMode,
    pub chosen_state: MarketState,
    /// Realized return as a fraction
    pub realized_reward: f64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(prev: Option<MarketState>, current: MarketState) -> MarketProfile {
        MarketProfile {
            symbol: "EURUSD".to_string(),
            current_state: current,
            previous_state: prev,
            state_confidence: 50.0,
            trend_strength: 50.0,
            volatility_level: 50.0,
            liquidity_level: 50.0,
            sentiment_score: 50.0,
            news_impact_level: 0.0,
            timestamp: Utc::now(),
            is_session_transition: false,
            is_high_impact_news: false,
            reduced_confidence: false,
            missing_components: 0,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_regime_break_requires_stable_previous_state() {
        assert!(profile(Some(MarketState::RangeBound), MarketState::NewsImpact).is_regime_break());
        assert!(!profile(Some(MarketState::Reversal), MarketState::NewsImpact).is_regime_break());
        assert!(!profile(None, MarketState::HighVolatility).is_regime_break());
        assert!(!profile(Some(MarketState::RangeBound), MarketState::TrendingBull).is_regime_break());
    }

    #[test]
    fn test_available_count() {
        let inputs = ComponentInputs {
            trend: Some(60.0),
            volatility: None,
            liquidity: Some(40.0),
            ..Default::default()
        };
        assert_eq!(inputs.available_count(), 2);
        assert!(!inputs.is_complete());
    }

    #[test]
    fn test_contribution_shares() {
        let contributions = SourceContributions {
            technical: 70.0,
            ml: None,
            sentiment: 30.0,
        };
        let shares = contributions.shares(&FusionWeights::new(1.0, 1.0, 1.0));
        assert!((shares[0] - 0.7).abs() < 1e-9);
        assert_eq!(shares[1], 0.0);
        assert!((shares[2] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("4h".parse::<Timeframe>(), Ok(Timeframe::Hour4));
        assert_eq!("15MIN".parse::<Timeframe>(), Ok(Timeframe::Minute15));
        assert!("2w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_direction_agreement() {
        assert!(Direction::Buy.agrees_with(0.4));
        assert!(Direction::Buy.agrees_with(0.0));
        assert!(!Direction::Sell.agrees_with(0.4));
    }
}
