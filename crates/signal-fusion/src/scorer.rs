use std::sync::Arc;

use decision_core::adaptive::{clamp_score, clamp_unit, NEUTRAL};
use decision_core::{
    ensure_finite, DecisionError, DecisionMetrics, DecisionMode, Direction, FilterVerdict,
    FusionWeights, MlPrediction, PortfolioGate, SignalSource, SourceContributions,
    TechnicalSignal,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::{prior_win_probability, CalibrationTable};
use crate::filters::{
    CorrelationFilter, DynamicFilter, FilterContext, LiquidityFilter, SentimentAlignmentFilter,
    VolatilityFilter,
};
use crate::profiles::mode_profile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Correlated exposure above which the correlation filter rejects
    pub max_correlation_exposure: f64,

    /// Aligned sentiment below which the alignment filter rejects
    pub sentiment_floor: f64,

    /// Aligned sentiment counted as an agreeing source
    pub sentiment_agreement: f64,

    /// ML confidence counted as an agreeing source
    pub ml_agreement: f64,

    /// Filter margins below this reduce confidence
    pub thin_margin: f64,

    /// Confidence reduction for a filter passed exactly on its boundary
    pub thin_margin_penalty: f64,

    /// Standard deviation (confidence points) of the prior win curve
    pub prior_spread: f64,

    /// Trades a calibration bin needs before it is trusted
    pub calibration_min_samples: usize,

    /// Weight of the empirical win rate against the prior
    pub calibration_blend: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            max_correlation_exposure: 70.0,
            sentiment_floor: 25.0,
            sentiment_agreement: 55.0,
            ml_agreement: 50.0,
            thin_margin: 0.10,
            thin_margin_penalty: 0.2,
            prior_spread: 25.0,
            calibration_min_samples: 10,
            calibration_blend: 0.5,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), DecisionError> {
        ensure_finite(&[("prior_spread", self.prior_spread)])?;
        let scores = [
            ("max_correlation_exposure", self.max_correlation_exposure),
            ("sentiment_floor", self.sentiment_floor),
            ("sentiment_agreement", self.sentiment_agreement),
            ("ml_agreement", self.ml_agreement),
        ];
        for (name, value) in scores {
            if !(0.0..=100.0).contains(&value) {
                return Err(DecisionError::invalid_config(format!(
                    "{} must be in [0, 100], got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.thin_margin)
            || !(0.0..=1.0).contains(&self.thin_margin_penalty)
            || !(0.0..=1.0).contains(&self.calibration_blend)
        {
            return Err(DecisionError::invalid_config(
                "thin_margin, thin_margin_penalty and calibration_blend must be in [0, 1]",
            ));
        }
        if self.prior_spread <= 0.0 {
            return Err(DecisionError::invalid_config("prior_spread must be positive"));
        }
        Ok(())
    }
}

/// Collaborator readings for one scoring call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionInputs {
    pub signal: Option<TechnicalSignal>,
    /// `None` when the predictor failed or ML is switched off
    pub ml: Option<MlPrediction>,
    /// Sentiment score, 0 (bearish) to 100 (bullish)
    pub sentiment: Option<f64>,
    pub volatility: f64,
    pub liquidity: f64,
    /// Carried through from a classification that ran on partial data
    pub reduced_confidence: bool,
}

pub struct SignalFusionScorer {
    config: FusionConfig,
    filters: Vec<Box<dyn DynamicFilter>>,
}

impl SignalFusionScorer {
    /// Scorer with the standard filter chain. The correlation filter asks
    /// `portfolio`, if given.
    pub fn new(
        config: FusionConfig,
        portfolio: Option<Arc<dyn PortfolioGate>>,
    ) -> Result<Self, DecisionError> {
        let filters: Vec<Box<dyn DynamicFilter>> = vec![
            Box::new(VolatilityFilter),
            Box::new(LiquidityFilter),
            Box::new(CorrelationFilter::new(portfolio, config.max_correlation_exposure)),
            Box::new(SentimentAlignmentFilter::new(config.sentiment_floor)),
        ];
        Self::with_filters(config, filters)
    }

    /// Scorer with a custom filter chain, evaluated in the given order.
    pub fn with_filters(
        config: FusionConfig,
        filters: Vec<Box<dyn DynamicFilter>>,
    ) -> Result<Self, DecisionError> {
        config.validate()?;
        Ok(Self { config, filters })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Score one candidate trade for `mode`. Pure: identical inputs and
    /// weights give identical metrics.
    pub fn score(
        &self,
        symbol: &str,
        mode: DecisionMode,
        inputs: &FusionInputs,
        weights: &FusionWeights,
        calibration: Option<&CalibrationTable>,
    ) -> DecisionMetrics {
        let profile = mode_profile(mode);

        let Some(signal) = inputs.signal.as_ref() else {
            debug!(symbol, mode = %mode, "no technical signal, skipping filters");
            return DecisionMetrics::no_trade(
                format!("{}: no technical signal", mode.name()),
                profile.required_confirmations,
            );
        };
        let direction = signal.direction;

        let contributions = SourceContributions {
            technical: clamp_score(signal.strength),
            ml: if profile.ml_enabled {
                inputs.ml.map(|p| ml_component(direction, &p))
            } else {
                None
            },
            sentiment: inputs
                .sentiment
                .map(|s| aligned_sentiment(direction, s))
                .unwrap_or(NEUTRAL),
        };

        let opportunity_score = fuse(&contributions, weights);
        let mut confidence = opportunity_score;

        let ctx = FilterContext {
            symbol,
            direction,
            profile: &profile,
            volatility: clamp_score(inputs.volatility),
            liquidity: clamp_score(inputs.liquidity),
            aligned_sentiment: contributions.sentiment,
        };

        let mut verdicts: Vec<FilterVerdict> = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let verdict = filter.evaluate(&ctx);
            let passed = verdict.passed;
            if passed && verdict.margin < self.config.thin_margin && self.config.thin_margin > 0.0 {
                let shortfall = 1.0 - verdict.margin / self.config.thin_margin;
                confidence *= 1.0 - self.config.thin_margin_penalty * shortfall;
            }
            verdicts.push(verdict);
            if !passed {
                break;
            }
        }
        let passes_dynamic_filters = verdicts.iter().all(|v| v.passed);

        let agreeing_sources = 1
            + u32::from(
                contributions
                    .ml
                    .map(|c| c >= self.config.ml_agreement && c > 0.0)
                    .unwrap_or(false),
            )
            + u32::from(contributions.sentiment >= self.config.sentiment_agreement);
        if agreeing_sources < profile.required_confirmations {
            confidence *= agreeing_sources as f64 / profile.required_confirmations as f64;
        }
        let confidence_level = clamp_score(confidence);

        let prior = prior_win_probability(confidence_level, self.config.prior_spread);
        let win_probability = clamp_unit(
            match calibration.and_then(|table| {
                table.empirical_win_rate(confidence_level, self.config.calibration_min_samples)
            }) {
                Some(empirical) => {
                    (1.0 - self.config.calibration_blend) * prior
                        + self.config.calibration_blend * empirical
                }
                None => prior,
            },
        );

        let expected_reward =
            win_probability * profile.reward_risk_ratio - (1.0 - win_probability);
        let risk_level = ctx.volatility;

        let reasoning = match verdicts.iter().find(|v| !v.passed) {
            Some(rejection) => format!(
                "{} {:?} rejected by {} filter ({}); opportunity {:.1}",
                mode.name(),
                direction,
                rejection.kind.name(),
                rejection.note,
                opportunity_score
            ),
            None => format!(
                "{} {:?}: opportunity {:.1}, confidence {:.1}, {}/{} sources agree, P(win) {:.2}",
                mode.name(),
                direction,
                opportunity_score,
                confidence_level,
                agreeing_sources,
                profile.required_confirmations,
                win_probability
            ),
        };

        debug!(
            symbol,
            mode = %mode,
            opportunity = opportunity_score,
            confidence = confidence_level,
            passes = passes_dynamic_filters,
            "signal fused"
        );

        DecisionMetrics {
            direction: Some(direction),
            signal_strength: contributions.technical,
            risk_level,
            opportunity_score,
            confidence_level,
            expected_reward,
            max_drawdown_risk: risk_level * (1.0 - win_probability),
            win_probability,
            required_confirmations: profile.required_confirmations,
            agreeing_sources,
            passes_dynamic_filters,
            filter_verdicts: verdicts,
            contributions: Some(contributions),
            reduced_confidence: inputs.reduced_confidence,
            reasoning,
        }
    }
}

/// ML confidence when its prediction points the signal's way, else 0.
fn ml_component(direction: Direction, prediction: &MlPrediction) -> f64 {
    if direction.agrees_with(prediction.value) {
        clamp_score(prediction.confidence)
    } else {
        0.0
    }
}

fn aligned_sentiment(direction: Direction, sentiment: f64) -> f64 {
    let sentiment = clamp_score(sentiment);
    match direction {
        Direction::Buy => sentiment,
        Direction::Sell => 100.0 - sentiment,
    }
}

/// Weighted mean of the available components.
fn fuse(contributions: &SourceContributions, weights: &FusionWeights) -> f64 {
    let (sum, total_weight) = SignalSource::ALL
        .iter()
        .filter_map(|s| contributions.component(*s).map(|c| (c, weights.get(*s))))
        .fold((0.0, 0.0), |(sum, tw), (c, w)| (sum + c * w, tw + w));

    if total_weight <= f64::EPSILON {
        return contributions.technical;
    }
    clamp_score(sum / total_weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationSample;
    use approx::assert_relative_eq;
    use decision_core::FilterKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFilter(Arc<AtomicUsize>);

    impl DynamicFilter for CountingFilter {
        fn kind(&self) -> FilterKind {
            FilterKind::Volatility
        }

        fn evaluate(&self, _ctx: &FilterContext<'_>) -> FilterVerdict {
            self.0.fetch_add(1, Ordering::SeqCst);
            FilterVerdict {
                kind: FilterKind::Volatility,
                passed: true,
                margin: 1.0,
                note: String::new(),
            }
        }
    }

    fn scenario(volatility: f64) -> FusionInputs {
        FusionInputs {
            signal: Some(TechnicalSignal {
                direction: Direction::Buy,
                strength: 70.0,
                contributing_indicators: vec!["ema_cross".to_string()],
            }),
            ml: Some(MlPrediction {
                value: 0.4,
                confidence: 60.0,
            }),
            sentiment: Some(65.0),
            volatility,
            liquidity: 60.0,
            reduced_confidence: false,
        }
    }

    fn scorer() -> SignalFusionScorer {
        SignalFusionScorer::new(FusionConfig::default(), None).unwrap()
    }

    fn weights(mode: DecisionMode) -> FusionWeights {
        mode_profile(mode).default_weights
    }

    #[test]
    fn test_trend_following_scenario() {
        let mode = DecisionMode::TrendFollowing;
        let metrics = scorer().score("EURUSD", mode, &scenario(30.0), &weights(mode), None);

        // 0.6 * 70 + 0.2 * 60 + 0.2 * 65
        assert_relative_eq!(metrics.opportunity_score, 67.0, epsilon = 1e-9);
        assert_relative_eq!(metrics.confidence_level, 67.0, epsilon = 1e-9);
        assert!(metrics.passes_dynamic_filters);
        assert_eq!(metrics.agreeing_sources, 3);
        assert_eq!(metrics.filter_verdicts.len(), 4);
        assert!(metrics.win_probability > 0.74 && metrics.win_probability < 0.76);
        assert!(metrics.expected_reward > 1.0);
    }

    #[test]
    fn test_volatility_above_ceiling_rejects() {
        let mode = DecisionMode::TrendFollowing;
        let metrics = scorer().score("EURUSD", mode, &scenario(85.0), &weights(mode), None);

        assert!(!metrics.passes_dynamic_filters);
        assert_relative_eq!(metrics.opportunity_score, 67.0, epsilon = 1e-9);
        assert_eq!(metrics.filter_verdicts.len(), 1);
        assert_eq!(
            metrics.first_rejection().map(|v| v.kind),
            Some(FilterKind::Volatility)
        );
    }

    #[test]
    fn test_no_signal_invokes_no_filters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scorer = SignalFusionScorer::with_filters(
            FusionConfig::default(),
            vec![Box::new(CountingFilter(calls.clone()))],
        )
        .unwrap();

        let inputs = FusionInputs {
            signal: None,
            ..scenario(30.0)
        };
        let mode = DecisionMode::Moderate;
        let metrics = scorer.score("EURUSD", mode, &inputs, &weights(mode), None);

        assert_eq!(metrics.confidence_level, 0.0);
        assert!(!metrics.passes_dynamic_filters);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        scorer.score("EURUSD", mode, &scenario(30.0), &weights(mode), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disagreeing_ml_contributes_zero() {
        let mode = DecisionMode::TrendFollowing;
        let mut inputs = scenario(30.0);
        inputs.ml = Some(MlPrediction {
            value: -0.4,
            confidence: 90.0,
        });
        let metrics = scorer().score("EURUSD", mode, &inputs, &weights(mode), None);

        assert_eq!(metrics.contributions.and_then(|c| c.ml), Some(0.0));
        // 0.6 * 70 + 0 + 0.2 * 65
        assert_relative_eq!(metrics.opportunity_score, 55.0, epsilon = 1e-9);
        assert_eq!(metrics.agreeing_sources, 2);
    }

    #[test]
    fn test_ml_disabled_mode_ignores_prediction() {
        let mode = DecisionMode::Scalping;
        let mut inputs = scenario(30.0);
        inputs.liquidity = 80.0;
        let metrics = scorer().score("EURUSD", mode, &inputs, &weights(mode), None);

        assert_eq!(metrics.contributions.and_then(|c| c.ml), None);
        // (0.7 * 70 + 0.2 * 65) / 0.9
        assert_relative_eq!(metrics.opportunity_score, 62.0 / 0.9, epsilon = 1e-9);
    }

    #[test]
    fn test_sell_uses_inverted_sentiment() {
        let mode = DecisionMode::Moderate;
        let mut inputs = scenario(30.0);
        inputs.signal = Some(TechnicalSignal {
            direction: Direction::Sell,
            strength: 70.0,
            contributing_indicators: Vec::new(),
        });
        inputs.sentiment = Some(90.0);

        let metrics = scorer().score("EURUSD", mode, &inputs, &weights(mode), None);
        assert!(!metrics.passes_dynamic_filters);
        assert_eq!(
            metrics.first_rejection().map(|v| v.kind),
            Some(FilterKind::SentimentAlignment)
        );
    }

    #[test]
    fn test_thin_margin_reduces_confidence() {
        let mode = DecisionMode::TrendFollowing;
        let comfortable = scorer().score("EURUSD", mode, &scenario(30.0), &weights(mode), None);
        let tight = scorer().score("EURUSD", mode, &scenario(69.0), &weights(mode), None);

        assert!(tight.passes_dynamic_filters);
        assert!(tight.confidence_level < comfortable.confidence_level);
        assert!(tight.confidence_level >= comfortable.confidence_level * 0.8);
    }

    #[test]
    fn test_missing_confirmations_scale_confidence() {
        let mode = DecisionMode::Conservative;
        let mut inputs = scenario(30.0);
        inputs.ml = None;
        inputs.sentiment = None;
        let metrics = scorer().score("EURUSD", mode, &inputs, &weights(mode), None);

        assert_eq!(metrics.agreeing_sources, 1);
        // (0.6 * 70 + 0.2 * 50) / 0.8 = 65, then 1/3 of it
        assert_relative_eq!(metrics.confidence_level, 65.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_calibration_blend() {
        let mode = DecisionMode::TrendFollowing;
        let samples: Vec<_> = (0..20)
            .map(|_| CalibrationSample {
                confidence: 67.0,
                predicted: 0.75,
                won: false,
            })
            .collect();
        let table = CalibrationTable::fit(&samples);

        let metrics = scorer().score("EURUSD", mode, &scenario(30.0), &weights(mode), Some(&table));
        let prior = prior_win_probability(67.0, 25.0);
        assert_relative_eq!(metrics.win_probability, prior * 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let mode = DecisionMode::Swing;
        let a = scorer().score("EURUSD", mode, &scenario(40.0), &weights(mode), None);
        let b = scorer().score("EURUSD", mode, &scenario(40.0), &weights(mode), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_confidence_bounds() {
        let scorer = scorer();
        for mode in DecisionMode::ALL {
            for strength in [0.0, 50.0, 100.0, 250.0, -20.0] {
                for sentiment in [0.0, 50.0, 100.0] {
                    let mut inputs = scenario(50.0);
                    inputs.signal = Some(TechnicalSignal {
                        direction: Direction::Buy,
                        strength,
                        contributing_indicators: Vec::new(),
                    });
                    inputs.sentiment = Some(sentiment);
                    let m = scorer.score("EURUSD", mode, &inputs, &weights(mode), None);
                    assert!((0.0..=100.0).contains(&m.confidence_level));
                    assert!((0.0..=1.0).contains(&m.win_probability));
                }
            }
        }
    }
}
