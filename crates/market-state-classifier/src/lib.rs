use chrono::{DateTime, Utc};
use decision_core::adaptive::{clamp_score, ramp_down, ramp_up, NEUTRAL};
use decision_core::{ensure_finite, ComponentInputs, DecisionError, MarketProfile, MarketState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Weights of the inputs blended into the effective trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    pub trend: f64,
    pub sentiment: f64,
    pub seasonal: f64,
}

impl Default for ClassifierWeights {
    fn default() -> Self {
        Self {
            trend: 0.70,
            sentiment: 0.15,
            seasonal: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub weights: ClassifierWeights,

    /// Score band inside which the previous state is kept
    pub stability_epsilon: f64,

    /// Fewer available components than this yields `Uncertain`
    pub min_components: usize,

    /// Baseline score of `Uncertain`; anything weaker loses to it
    pub uncertain_floor: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights: ClassifierWeights::default(),
            stability_epsilon: 0.05,
            min_components: 3,
            uncertain_floor: 0.20,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), DecisionError> {
        let w = &self.weights;
        ensure_finite(&[
            ("weights.trend", w.trend),
            ("weights.sentiment", w.sentiment),
            ("weights.seasonal", w.seasonal),
            ("stability_epsilon", self.stability_epsilon),
            ("uncertain_floor", self.uncertain_floor),
        ])?;
        if w.trend < 0.0 || w.sentiment < 0.0 || w.seasonal < 0.0 {
            return Err(DecisionError::invalid_config("classifier weights must be >= 0"));
        }
        if w.trend + w.sentiment + w.seasonal <= 0.0 {
            return Err(DecisionError::invalid_config("classifier weights must not all be zero"));
        }
        if !(0.0..1.0).contains(&self.stability_epsilon) {
            return Err(DecisionError::invalid_config("stability_epsilon must be in [0, 1)"));
        }
        if self.min_components > ComponentInputs::COMPONENT_COUNT {
            return Err(DecisionError::invalid_config(format!(
                "min_components cannot exceed {}",
                ComponentInputs::COMPONENT_COUNT
            )));
        }
        Ok(())
    }
}

/// Component levels after neutral substitution and trend blending
#[derive(Debug, Clone, Copy)]
struct Levels {
    trend: f64,
    volatility: f64,
    liquidity: f64,
    sentiment: f64,
    news_impact: f64,
}

/// Maps component scores onto a single `MarketState` with a confidence.
pub struct MarketStateClassifier {
    config: ClassifierConfig,
}

impl MarketStateClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, DecisionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one symbol. Pure: the returned profile replaces the old one
    /// wholesale.
    pub fn classify(
        &self,
        symbol: &str,
        inputs: &ComponentInputs,
        previous: Option<&MarketProfile>,
        now: DateTime<Utc>,
    ) -> MarketProfile {
        let available = inputs.available_count();
        let missing = ComponentInputs::COMPONENT_COUNT - available;
        let levels = self.levels(inputs);
        let previous_state = previous.map(|p| p.current_state);

        if available < self.config.min_components {
            debug!(symbol, available, "too few components, classifying as uncertain");
            return self.build_profile(
                symbol,
                MarketState::Uncertain,
                0.0,
                previous_state,
                &levels,
                inputs,
                missing,
                now,
                format!(
                    "Uncertain: only {} of {} components available",
                    available,
                    ComponentInputs::COMPONENT_COUNT
                ),
            );
        }

        let scores = self.signature_scores(&levels, inputs, previous);

        // Stable sort keeps declaration order on exact ties
        let mut ranked = scores.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let (mut winner, mut winner_score) = ranked[0];

        if let Some(prev) = previous_state {
            if prev != winner {
                let prev_score = score_of(&scores, prev);
                if winner_score - prev_score <= self.config.stability_epsilon {
                    debug!(
                        symbol,
                        kept = %prev,
                        challenger = %winner,
                        "within stability band, keeping previous state"
                    );
                    winner = prev;
                    winner_score = prev_score;
                }
            }
        }

        let runner_up = scores
            .iter()
            .filter(|(state, _)| *state != winner)
            .map(|(_, score)| *score)
            .fold(0.0, f64::max);

        let mut confidence = clamp_score((winner_score - runner_up) * 100.0);
        if missing > 0 {
            confidence *= available as f64 / ComponentInputs::COMPONENT_COUNT as f64;
        }

        let reasoning = format!(
            "{} (trend: {:.1}, volatility: {:.1}, liquidity: {:.1}, sentiment: {:.1}, match: {:.2} vs {:.2}{})",
            winner.name(),
            levels.trend,
            levels.volatility,
            levels.liquidity,
            levels.sentiment,
            winner_score,
            runner_up,
            if missing > 0 {
                format!(", {} component(s) missing", missing)
            } else {
                String::new()
            }
        );

        self.build_profile(
            symbol,
            winner,
            confidence,
            previous_state,
            &levels,
            inputs,
            missing,
            now,
            reasoning,
        )
    }

    fn levels(&self, inputs: &ComponentInputs) -> Levels {
        let trend = inputs.trend.map(clamp_score).unwrap_or(NEUTRAL);
        let sentiment = inputs.sentiment.map(clamp_score).unwrap_or(NEUTRAL);
        let seasonal = inputs.seasonal.map(clamp_score).unwrap_or(NEUTRAL);

        let w = &self.config.weights;
        let total = w.trend + w.sentiment + w.seasonal;
        let effective_trend = (w.trend * trend + w.sentiment * sentiment + w.seasonal * seasonal) / total;

        Levels {
            trend: effective_trend,
            volatility: inputs.volatility.map(clamp_score).unwrap_or(NEUTRAL),
            liquidity: inputs.liquidity.map(clamp_score).unwrap_or(NEUTRAL),
            sentiment,
            news_impact: inputs.news_impact.map(clamp_score).unwrap_or(0.0),
        }
    }

    /// Signature match for every state, in `MarketState::ALL` order.
    fn signature_scores(
        &self,
        levels: &Levels,
        inputs: &ComponentInputs,
        previous: Option<&MarketProfile>,
    ) -> Vec<(MarketState, f64)> {
        let trend = levels.trend;
        let vol = levels.volatility;
        let dev = (trend - NEUTRAL).abs();

        let reversal = match previous {
            Some(prev) => {
                let prev_dev = prev.trend_strength - NEUTRAL;
                let cur_dev = trend - NEUTRAL;
                if prev_dev * cur_dev < 0.0 {
                    ramp_up(prev_dev.abs().min(cur_dev.abs()), 10.0, 25.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        // A fresh flip is a reversal before it is a trend
        let trend_damping = 1.0 - 0.5 * reversal;

        let news_pressure = if inputs.is_high_impact_news {
            ramp_up(levels.news_impact, 50.0, 80.0).max(0.6)
        } else {
            0.8 * ramp_up(levels.news_impact, 70.0, 95.0)
        };
        // Quiet-market signatures fade while news drives price
        let calm_damping = 1.0 - 0.5 * news_pressure;

        let from_compression = matches!(
            previous.map(|p| p.current_state),
            Some(MarketState::RangeBound) | Some(MarketState::LowVolatility)
        );

        MarketState::ALL
            .iter()
            .map(|state| {
                let score = match state {
                    MarketState::TrendingBull => {
                        ramp_up(trend, 55.0, 75.0).min(ramp_down(vol, 60.0, 80.0)) * trend_damping
                    }
                    MarketState::TrendingBear => {
                        ramp_down(trend, 25.0, 45.0).min(ramp_down(vol, 60.0, 80.0)) * trend_damping
                    }
                    MarketState::RangeBound => {
                        ramp_down(dev, 5.0, 15.0).min(ramp_down(vol, 45.0, 65.0)) * calm_damping
                    }
                    MarketState::HighVolatility => ramp_up(vol, 65.0, 85.0),
                    MarketState::LowVolatility => {
                        ramp_down(vol, 15.0, 30.0).min(ramp_down(dev, 10.0, 20.0)) * calm_damping
                    }
                    MarketState::Breakout => {
                        let raw = ramp_up(dev, 15.0, 30.0)
                            .min(ramp_up(vol, 50.0, 65.0))
                            .min(ramp_down(vol, 80.0, 90.0))
                            .min(ramp_up(levels.liquidity, 50.0, 70.0));
                        if from_compression {
                            raw
                        } else {
                            raw * 0.5
                        }
                    }
                    MarketState::Reversal => reversal,
                    MarketState::NewsImpact => news_pressure,
                    MarketState::SessionTransition => {
                        if inputs.is_session_transition {
                            0.55
                        } else {
                            0.0
                        }
                    }
                    MarketState::Uncertain => self.config.uncertain_floor,
                };
                (*state, score)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn build_profile(
        &self,
        symbol: &str,
        state: MarketState,
        confidence: f64,
        previous_state: Option<MarketState>,
        levels: &Levels,
        inputs: &ComponentInputs,
        missing: usize,
        now: DateTime<Utc>,
        reasoning: String,
    ) -> MarketProfile {
        MarketProfile {
            symbol: symbol.to_string(),
            current_state: state,
            previous_state,
            state_confidence: clamp_score(confidence),
            trend_strength: levels.trend,
            volatility_level: levels.volatility,
            liquidity_level: levels.liquidity,
            sentiment_score: levels.sentiment,
            news_impact_level: levels.news_impact,
            timestamp: now,
            is_session_transition: inputs.is_session_transition,
            is_high_impact_news: inputs.is_high_impact_news,
            reduced_confidence: missing > 0,
            missing_components: missing,
            reasoning,
        }
    }
}

impl Default for MarketStateClassifier {
    fn default() -> Self {
        Self {
            config: ClassifierConfig::default(),
        }
    }
}

fn score_of(scores: &[(MarketState, f64)], state: MarketState) -> f64 {
    scores
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, score)| *score)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn full_inputs(trend: f64, volatility: f64, liquidity: f64) -> ComponentInputs {
        ComponentInputs {
            trend: Some(trend),
            volatility: Some(volatility),
            liquidity: Some(liquidity),
            sentiment: Some(50.0),
            seasonal: Some(50.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_uptrend_detection() {
        let classifier = MarketStateClassifier::default();
        let inputs = ComponentInputs {
            trend: Some(80.0),
            volatility: Some(30.0),
            liquidity: Some(60.0),
            sentiment: Some(60.0),
            seasonal: Some(55.0),
            ..Default::default()
        };

        let profile = classifier.classify("EURUSD", &inputs, None, Utc::now());

        // effective trend = 0.7*80 + 0.15*60 + 0.15*55 = 73.25
        assert_eq!(profile.current_state, MarketState::TrendingBull);
        assert_relative_eq!(profile.trend_strength, 73.25, epsilon = 1e-9);
        // bull match 0.9125 vs uncertain floor 0.20
        assert_relative_eq!(profile.state_confidence, 71.25, epsilon = 1e-6);
        assert!(!profile.reduced_confidence);
    }

    #[test]
    fn test_downtrend_detection() {
        let classifier = MarketStateClassifier::default();
        let profile = classifier.classify("GBPUSD", &full_inputs(10.0, 30.0, 60.0), None, Utc::now());
        assert_eq!(profile.current_state, MarketState::TrendingBear);
    }

    #[test]
    fn test_high_volatility_detection() {
        let classifier = MarketStateClassifier::default();
        let profile = classifier.classify("USDJPY", &full_inputs(50.0, 92.0, 60.0), None, Utc::now());
        assert_eq!(profile.current_state, MarketState::HighVolatility);
    }

    #[test]
    fn test_news_impact_from_range() {
        let classifier = MarketStateClassifier::default();
        let range = classifier.classify("EURUSD", &full_inputs(50.0, 40.0, 60.0), None, Utc::now());
        assert_eq!(range.current_state, MarketState::RangeBound);

        let mut inputs = full_inputs(50.0, 40.0, 60.0);
        inputs.is_high_impact_news = true;
        inputs.news_impact = Some(90.0);
        let news = classifier.classify("EURUSD", &inputs, Some(&range), Utc::now());

        assert_eq!(news.current_state, MarketState::NewsImpact);
        assert_eq!(news.previous_state, Some(MarketState::RangeBound));
        assert!(news.is_regime_break());
    }

    #[test]
    fn test_trend_flip_is_reversal_first() {
        let classifier = MarketStateClassifier::default();
        let bull = classifier.classify("EURUSD", &full_inputs(90.0, 30.0, 60.0), None, Utc::now());
        assert_eq!(bull.current_state, MarketState::TrendingBull);

        let flipped = classifier.classify("EURUSD", &full_inputs(10.0, 30.0, 60.0), Some(&bull), Utc::now());
        assert_eq!(flipped.current_state, MarketState::Reversal);

        let settled = classifier.classify("EURUSD", &full_inputs(10.0, 30.0, 60.0), Some(&flipped), Utc::now());
        assert_eq!(settled.current_state, MarketState::TrendingBear);
    }

    #[test]
    fn test_stability_bias_keeps_previous_state() {
        let classifier = MarketStateClassifier::default();
        // RangeBound 1.0 vs LowVolatility ~0.967: inside the 0.05 band
        let inputs = full_inputs(50.0, 15.5, 60.0);

        let fresh = classifier.classify("AUDUSD", &inputs, None, Utc::now());
        assert_eq!(fresh.current_state, MarketState::RangeBound);

        let mut previous = fresh.clone();
        previous.current_state = MarketState::LowVolatility;
        let sticky = classifier.classify("AUDUSD", &inputs, Some(&previous), Utc::now());
        assert_eq!(sticky.current_state, MarketState::LowVolatility);
        assert_eq!(sticky.state_confidence, 0.0);
    }

    #[test]
    fn test_missing_components_reduce_confidence() {
        let classifier = MarketStateClassifier::default();
        let inputs = ComponentInputs {
            trend: Some(80.0),
            volatility: Some(30.0),
            liquidity: Some(60.0),
            ..Default::default()
        };

        let profile = classifier.classify("EURUSD", &inputs, None, Utc::now());

        // effective trend 71 -> bull 0.8; (0.8 - 0.2) * 100 * 3/5
        assert_eq!(profile.current_state, MarketState::TrendingBull);
        assert!(profile.reduced_confidence);
        assert_eq!(profile.missing_components, 2);
        assert_relative_eq!(profile.state_confidence, 36.0, epsilon = 1e-6);
    }

    #[test]
    fn test_insufficient_components() {
        let classifier = MarketStateClassifier::default();
        let profile = classifier.classify("EURUSD", &ComponentInputs::default(), None, Utc::now());

        assert_eq!(profile.current_state, MarketState::Uncertain);
        assert_eq!(profile.state_confidence, 0.0);
        assert_eq!(profile.missing_components, 5);
    }

    #[test]
    fn test_confidence_bounds_over_grid() {
        let classifier = MarketStateClassifier::default();
        let grid = [-50.0, 0.0, 12.5, 37.0, 50.0, 63.0, 88.0, 100.0, 250.0];
        let mut previous: Option<MarketProfile> = None;

        for &trend in &grid {
            for &vol in &grid {
                for &liq in &grid {
                    let mut inputs = full_inputs(trend, vol, liq);
                    inputs.is_session_transition = liq > 60.0;
                    let profile = classifier.classify("EURUSD", &inputs, previous.as_ref(), Utc::now());
                    assert!((0.0..=100.0).contains(&profile.state_confidence));
                    assert!((0.0..=100.0).contains(&profile.trend_strength));
                    previous = Some(profile);
                }
            }
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClassifierConfig {
            min_components: 9,
            ..Default::default()
        };
        assert!(MarketStateClassifier::new(config).is_err());
    }

    #[test]
    fn test_nan_weights_rejected() {
        let config = ClassifierConfig {
            weights: ClassifierWeights {
                sentiment: f64::NAN,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            MarketStateClassifier::new(config),
            Err(DecisionError::InvalidConfiguration(_))
        ));
    }
}
