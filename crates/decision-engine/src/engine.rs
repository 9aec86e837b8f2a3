use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use adaptation_scheduler::{AdaptationScheduler, CycleSchedule};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use decision_core::{
    AdaptiveConfig, ComponentInputs, DecisionError, DecisionId, DecisionMetrics, DecisionMode,
    FeatureSnapshot, FeatureToggles, MarketComponent, MarketProfile, MarketState,
    SentimentReading,
};
use learning_feedback::{
    LearningFeedbackLoop, LearningPassReport, OutcomeUpdate, PendingDecision, TradeOutcome,
};
use market_state_classifier::MarketStateClassifier;
use mode_selector::{mode_preferences, ModeSelector, ModeState};
use position_sizer::{DrawdownContext, RiskAdjustedSizer, SizingDecision};
use serde::{Deserialize, Serialize};
use signal_fusion::{mode_profile, FusionInputs, SignalFusionScorer};
use tracing::{debug, info, info_span, warn};

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::summary::{ModeWeights, PerformanceSummary, SymbolSummary};

/// Result of one `make_decision` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub symbol: String,
    pub state: MarketState,
    pub state_confidence: f64,
    pub mode: DecisionMode,
    pub mode_confidence: f64,
    /// Whether this call ran a fresh classification
    pub classified: bool,
    pub metrics: DecisionMetrics,
    pub sizing: SizingDecision,
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    pub fn position_fraction(&self) -> f64 {
        self.sizing.fraction()
    }
}

/// Everything the engine keeps per symbol between cycles
#[derive(Debug, Clone)]
struct SymbolState {
    profile: Option<MarketProfile>,
    adaptive: AdaptiveConfig,
    mode_state: ModeState,
    schedule: CycleSchedule,
}

impl SymbolState {
    fn new(adaptive: AdaptiveConfig) -> Self {
        Self {
            profile: None,
            adaptive,
            mode_state: ModeState::default(),
            schedule: CycleSchedule::default(),
        }
    }
}

/// Recover the guard from a poisoned lock; state behind it is always
/// written whole.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct DecisionEngine {
    config: EngineConfig,
    collaborators: Collaborators,
    classifier: MarketStateClassifier,
    selector: ModeSelector,
    scorer: SignalFusionScorer,
    sizer: RiskAdjustedSizer,
    scheduler: AdaptationScheduler,
    learning: Mutex<LearningFeedbackLoop>,
    symbols: DashMap<String, Arc<Mutex<SymbolState>>>,
    next_id: AtomicU64,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, DecisionError> {
        config.validate()?;

        let classifier = MarketStateClassifier::new(config.classifier.clone())?;
        let selector = ModeSelector::new(config.mode_selector.clone())?;
        let scorer = SignalFusionScorer::new(
            config.fusion.clone(),
            Some(collaborators.portfolio.clone()),
        )?;
        let sizer = RiskAdjustedSizer::new(config.risk_limits)?;
        let scheduler = AdaptationScheduler::new(config.scheduler.clone())?;
        let learning = LearningFeedbackLoop::new(config.learning.clone())?;

        info!(
            experience_capacity = config.learning.experience_capacity,
            adaptation_period_secs = config.adaptive.adaptation_period_secs,
            "decision engine ready"
        );

        Ok(Self {
            config,
            collaborators,
            classifier,
            selector,
            scorer,
            sizer,
            scheduler,
            learning: Mutex::new(learning),
            symbols: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot(&self, symbol: &str) -> Arc<Mutex<SymbolState>> {
        self.symbols
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SymbolState::new(self.config.adaptive.clone()))))
            .value()
            .clone()
    }

    /// Run one decision cycle for `symbol`. Never fails: the worst outcome
    /// is a zero-confidence, filter-rejected decision.
    pub fn make_decision(&self, symbol: &str) -> Decision {
        let id = DecisionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let span = info_span!("decision_cycle", symbol, decision_id = %id);
        let _enter = span.enter();

        let now = self.collaborators.clock.now();
        let slot = self.slot(symbol);
        // Serializes overlapping calls for the same symbol
        let mut state = lock(&slot);
        let toggles = state.adaptive.toggles;

        let (inputs, sentiment) = self.gather(symbol, &toggles, now);

        if toggles.regime_override {
            let cached = state.profile.as_ref().map(|p| p.current_state);
            if let Some(reason) = self.scheduler.early_override(
                &mut state.schedule,
                cached,
                inputs.volatility,
                inputs.is_high_impact_news,
            ) {
                debug!(%reason, "early classification requested");
            }
        }

        let classify = state.profile.is_none()
            || state
                .schedule
                .should_run_cycle(state.adaptive.adaptation_period(), now);
        state.schedule.advance(classify);

        let profile = match state.profile.clone().filter(|_| !classify) {
            Some(profile) => profile,
            None => self.classify_and_select(symbol, &mut state, &inputs, toggles, now),
        };

        let mode = state.adaptive.primary_mode;
        let params = mode_profile(mode);

        let signal = self.collaborators.technical.signal(symbol);
        let ml = if toggles.ml_enabled && params.ml_enabled {
            self.collaborators
                .ml
                .as_ref()
                .and_then(|ml| ml.predict(symbol, self.config.ml_horizon))
        } else {
            None
        };

        let fusion_inputs = FusionInputs {
            signal,
            ml,
            sentiment: sentiment.map(|s| s.score),
            volatility: inputs.volatility.unwrap_or(profile.volatility_level),
            liquidity: inputs.liquidity.unwrap_or(profile.liquidity_level),
            reduced_confidence: profile.reduced_confidence || !inputs.is_complete(),
        };

        let (weights, calibration) = {
            let learning = lock(&self.learning);
            let weights = if toggles.adaptive_weights {
                learning.mode_weights(mode)
            } else {
                params.default_weights
            };
            (weights, learning.calibration().clone())
        };

        let metrics = self
            .scorer
            .score(symbol, mode, &fusion_inputs, &weights, Some(&calibration));
        state.schedule.advance(classify);

        let portfolio = &self.collaborators.portfolio;
        let context = DrawdownContext {
            drawdown_percent: portfolio.current_drawdown(),
            open_risk: portfolio.open_risk(),
        };
        let mut sizing = self
            .sizer
            .size(&metrics, params.risk_multiplier, &context);
        if let SizingDecision::Trade { fraction } = sizing {
            let validation = portfolio.validate_position(symbol, fraction);
            sizing = self.sizer.apply_validation(sizing, &validation);
        }
        state.schedule.advance(classify);

        if sizing.is_trade() {
            lock(&self.learning).register(PendingDecision {
                decision_id: id,
                symbol: symbol.to_string(),
                mode,
                state: profile.current_state,
                features: FeatureSnapshot {
                    trend_strength: profile.trend_strength,
                    volatility_level: fusion_inputs.volatility,
                    liquidity_level: fusion_inputs.liquidity,
                    sentiment_score: profile.sentiment_score,
                    opportunity_score: metrics.opportunity_score,
                    confidence_level: metrics.confidence_level,
                    win_probability: metrics.win_probability,
                    contributions: metrics.contributions,
                },
                adaptation_speed: state.adaptive.adaptation_speed,
                decided_at: now,
            });
        }
        state.schedule.advance(classify);

        match &sizing {
            SizingDecision::Trade { fraction } => info!(
                state = %profile.current_state,
                mode = %mode,
                confidence = metrics.confidence_level,
                fraction,
                "trade"
            ),
            SizingDecision::NoTrade { reason } => debug!(
                state = %profile.current_state,
                mode = %mode,
                confidence = metrics.confidence_level,
                reason = %reason,
                "no trade"
            ),
        }

        Decision {
            id,
            symbol: symbol.to_string(),
            state: profile.current_state,
            state_confidence: profile.state_confidence,
            mode,
            mode_confidence: state.adaptive.mode_confidence,
            classified: classify,
            metrics,
            sizing,
            decided_at: now,
        }
    }

    /// Classifying and ModeSelecting phases. Replaces the cached profile
    /// wholesale and updates the symbol's adaptive config.
    fn classify_and_select(
        &self,
        symbol: &str,
        state: &mut SymbolState,
        inputs: &ComponentInputs,
        toggles: FeatureToggles,
        now: DateTime<Utc>,
    ) -> MarketProfile {
        let profile = self
            .classifier
            .classify(symbol, inputs, state.profile.as_ref(), now);
        state.schedule.mark_cycle_run(now);

        let regime_break = toggles.regime_override && profile.is_regime_break();
        if toggles.regime_override {
            if let Some(reason) = self.scheduler.classified_override(&profile) {
                state.schedule.raise_override(reason);
            }
        }
        state.schedule.advance(true);

        let selection = {
            let learning = lock(&self.learning);
            self.selector.select(
                &profile,
                learning.performance(),
                &state.mode_state,
                regime_break,
                toggles.adaptive_mode_selection,
            )
        };

        if selection.switched {
            info!(
                state = %profile.current_state,
                mode = %selection.mode,
                mode_confidence = selection.mode_confidence,
                "mode selected"
            );
        }

        state.mode_state = selection.next_state;
        state.adaptive.primary_mode = selection.mode;
        state.adaptive.fallback_mode = mode_preferences(profile.current_state).preferred;
        state.adaptive.mode_confidence = selection.mode_confidence;
        state.adaptive.last_adaptation = Some(now);
        state.profile = Some(profile.clone());
        state.schedule.advance(true);

        profile
    }

    /// Read every collaborator once. Missing readings stay `None`; the
    /// classifier substitutes neutral values for them.
    fn gather(
        &self,
        symbol: &str,
        toggles: &FeatureToggles,
        now: DateTime<Utc>,
    ) -> (ComponentInputs, Option<SentimentReading>) {
        let market = &self.collaborators.market;
        let score = |component| market.reading(symbol, component).map(|r| r.score);

        let sentiment = if toggles.sentiment_enabled {
            self.collaborators
                .sentiment
                .as_ref()
                .and_then(|s| s.sentiment(symbol))
        } else {
            None
        };

        let inputs = ComponentInputs {
            trend: score(MarketComponent::Trend),
            volatility: score(MarketComponent::Volatility),
            liquidity: score(MarketComponent::Liquidity),
            sentiment: sentiment.map(|s| s.score),
            seasonal: score(MarketComponent::Seasonality),
            news_impact: sentiment.map(|s| s.news_impact),
            is_session_transition: market.in_session_transition(symbol, now),
            is_high_impact_news: sentiment.map(|s| s.high_impact_news).unwrap_or(false),
        };

        if !inputs.is_complete() {
            debug!(
                available = inputs.available_count(),
                "collaborator data missing, substituting neutral values"
            );
        }
        (inputs, sentiment)
    }

    /// Feed a trade outcome back into the learning state.
    pub fn record_outcome(
        &self,
        decision_id: DecisionId,
        realized_return: f64,
        max_drawdown: f64,
    ) -> Result<OutcomeUpdate, DecisionError> {
        self.apply_outcome(TradeOutcome {
            decision_id,
            realized_return,
            max_drawdown,
        })
    }

    pub fn apply_outcome(&self, outcome: TradeOutcome) -> Result<OutcomeUpdate, DecisionError> {
        let now = self.collaborators.clock.now();
        let mut learning = lock(&self.learning);
        let update = learning.record_outcome(outcome, now)?;

        if self.scheduler.should_run_learning_pass(
            learning.last_pass(),
            learning.outcomes_since_pass(),
            now,
        ) {
            learning.run_learning_pass(now);
        }
        Ok(update)
    }

    /// Run the batch learning pass if its period has elapsed and new
    /// outcomes arrived since the last one.
    pub fn run_learning_pass_if_due(&self) -> Option<LearningPassReport> {
        let now = self.collaborators.clock.now();
        let mut learning = lock(&self.learning);
        if self.scheduler.should_run_learning_pass(
            learning.last_pass(),
            learning.outcomes_since_pass(),
            now,
        ) {
            Some(learning.run_learning_pass(now))
        } else {
            None
        }
    }

    pub fn market_profile(&self, symbol: &str) -> Option<MarketProfile> {
        let slot = self.symbols.get(symbol).map(|e| e.value().clone())?;
        let state = lock(&slot);
        state.profile.clone()
    }

    pub fn adaptive_config(&self, symbol: &str) -> Option<AdaptiveConfig> {
        let slot = self.symbols.get(symbol).map(|e| e.value().clone())?;
        let state = lock(&slot);
        Some(state.adaptive.clone())
    }

    /// Operator update of a symbol's adaptive config. An invalid config is
    /// rejected and the last known good one stays in force.
    pub fn update_adaptive_config(
        &self,
        symbol: &str,
        config: AdaptiveConfig,
    ) -> Result<(), DecisionError> {
        if let Err(e) = config.validate() {
            warn!(symbol, error = %e, "rejected adaptive config, keeping last known good");
            return Err(e);
        }

        let slot = self.slot(symbol);
        let mut state = lock(&slot);
        if state
            .mode_state
            .active
            .is_some_and(|active| active != config.primary_mode)
        {
            state.mode_state = ModeState {
                active: Some(config.primary_mode),
                ..Default::default()
            };
        }
        info!(
            symbol,
            mode = %config.primary_mode,
            adaptation_speed = config.adaptation_speed,
            "adaptive config updated"
        );
        state.adaptive = config;
        Ok(())
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        let now = self.collaborators.clock.now();

        // Learning lock is released before any symbol lock is taken
        let mut summary = {
            let learning = lock(&self.learning);
            let performance = learning.performance();
            let experience = learning.experience();
            PerformanceSummary {
                generated_at: now,
                records: performance.entries(),
                total_trades: performance.total_trades(),
                experience_len: experience.len(),
                experience_capacity: experience.capacity(),
                experience_evicted: experience.evicted_count(),
                pending_decisions: learning.pending_count(),
                outcomes_recorded: learning.outcomes_recorded(),
                weights: learning
                    .weights()
                    .snapshot()
                    .into_iter()
                    .map(|(mode, weights)| ModeWeights { mode, weights })
                    .collect(),
                calibration: learning.calibration().stats().clone(),
                calibration_bins: learning.calibration().bins().to_vec(),
                last_learning_pass: learning.last_pass(),
                symbols: Vec::new(),
            }
        };

        let slots: Vec<(String, Arc<Mutex<SymbolState>>)> = self
            .symbols
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        summary.symbols = slots
            .into_iter()
            .map(|(symbol, slot)| {
                let state = lock(&slot);
                SymbolSummary {
                    symbol,
                    state: state.profile.as_ref().map(|p| p.current_state),
                    mode: state.adaptive.primary_mode,
                    mode_confidence: state.adaptive.mode_confidence,
                    last_adaptation: state.adaptive.last_adaptation,
                }
            })
            .collect();
        summary.symbols.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        summary
    }
}
