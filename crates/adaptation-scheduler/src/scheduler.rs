use std::fmt;

use chrono::{DateTime, Duration, Utc};
use decision_core::{ensure_finite, DecisionError, MarketProfile, MarketState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::phase::CyclePhase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum time between learning passes
    pub learning_period_secs: i64,

    /// Volatility reading that forces an early classification
    pub volatility_override_level: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_period_secs: 1800,
            volatility_override_level: 80.0,
        }
    }
}

impl SchedulerConfig {
    pub fn learning_period(&self) -> Duration {
        Duration::seconds(self.learning_period_secs)
    }

    pub fn validate(&self) -> Result<(), DecisionError> {
        if self.learning_period_secs <= 0 {
            return Err(DecisionError::invalid_config(
                "learning_period_secs must be positive",
            ));
        }
        ensure_finite(&[("volatility_override_level", self.volatility_override_level)])?;
        if !(0.0..=100.0).contains(&self.volatility_override_level) {
            return Err(DecisionError::invalid_config(
                "volatility_override_level must be in [0, 100]",
            ));
        }
        Ok(())
    }
}

/// Why a classification cycle was pulled forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideReason {
    /// The last classification moved from a stable into a disruptive state
    RegimeBreak,
    VolatilitySpike,
    HighImpactNews,
}

impl fmt::Display for OverrideReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverrideReason::RegimeBreak => "regime break",
            OverrideReason::VolatilitySpike => "volatility spike",
            OverrideReason::HighImpactNews => "high-impact news",
        };
        f.write_str(s)
    }
}

/// Per-symbol cadence state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSchedule {
    pub last_cycle: Option<DateTime<Utc>>,
    pub pending_override: Option<OverrideReason>,
    pub phase: CyclePhase,
    /// Set while an early condition persists; it re-arms once it clears
    #[serde(default)]
    pub early_latched: bool,
}

impl CycleSchedule {
    /// Whether the classification cycle is due: never run, period elapsed,
    /// or an override is pending.
    pub fn should_run_cycle(&self, period: Duration, now: DateTime<Utc>) -> bool {
        if self.pending_override.is_some() {
            return true;
        }
        match self.last_cycle {
            Some(last) => now - last >= period,
            None => true,
        }
    }

    pub fn raise_override(&mut self, reason: OverrideReason) {
        if self.pending_override.is_none() {
            self.pending_override = Some(reason);
        }
    }

    /// Record a completed classification, consuming any override.
    pub fn mark_cycle_run(&mut self, now: DateTime<Utc>) {
        self.last_cycle = Some(now);
        self.pending_override = None;
    }

    /// Move to the next phase of the decision cycle.
    pub fn advance(&mut self, classify: bool) -> CyclePhase {
        self.phase = self.phase.successor(classify);
        self.phase
    }
}

pub struct AdaptationScheduler {
    config: SchedulerConfig,
}

impl Default for AdaptationScheduler {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }
}

impl AdaptationScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, DecisionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// A learning pass is due when the period has elapsed since the last
    /// one and at least one outcome arrived in between.
    pub fn should_run_learning_pass(
        &self,
        last_pass: Option<DateTime<Utc>>,
        outcomes_since_pass: u64,
        now: DateTime<Utc>,
    ) -> bool {
        if outcomes_since_pass == 0 {
            return false;
        }
        match last_pass {
            Some(last) => now - last >= self.config.learning_period(),
            None => true,
        }
    }

    /// Override raised by a fresh classification.
    pub fn classified_override(&self, profile: &MarketProfile) -> Option<OverrideReason> {
        if profile.is_regime_break() {
            info!(
                symbol = %profile.symbol,
                from = ?profile.previous_state,
                to = %profile.current_state,
                "regime break"
            );
            Some(OverrideReason::RegimeBreak)
        } else {
            None
        }
    }

    /// Volatility spike or high-impact news in the latest readings.
    pub fn early_condition(
        &self,
        volatility: Option<f64>,
        high_impact_news: bool,
    ) -> Option<OverrideReason> {
        if volatility.is_some_and(|v| v >= self.config.volatility_override_level) {
            return Some(OverrideReason::VolatilitySpike);
        }
        if high_impact_news {
            return Some(OverrideReason::HighImpactNews);
        }
        None
    }

    /// Cheap check run on every decision against the cached state.
    ///
    /// Fires once per onset of an early condition, and only while the cached
    /// state is stable. A condition that persists does not fire again until
    /// it has cleared. A firing is raised as the pending override.
    pub fn early_override(
        &self,
        schedule: &mut CycleSchedule,
        cached_state: Option<MarketState>,
        volatility: Option<f64>,
        high_impact_news: bool,
    ) -> Option<OverrideReason> {
        let Some(reason) = self.early_condition(volatility, high_impact_news) else {
            schedule.early_latched = false;
            return None;
        };
        if schedule.early_latched {
            return None;
        }
        schedule.early_latched = true;

        let cached = cached_state?;
        if cached.is_disruptive() {
            return None;
        }
        schedule.raise_override(reason);
        Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(previous: Option<MarketState>, current: MarketState) -> MarketProfile {
        MarketProfile {
            symbol: "GBPUSD".to_string(),
            current_state: current,
            previous_state: previous,
            state_confidence: 60.0,
            trend_strength: 50.0,
            volatility_level: 40.0,
            liquidity_level: 60.0,
            sentiment_score: 50.0,
            news_impact_level: 85.0,
            timestamp: Utc::now(),
            is_session_transition: false,
            is_high_impact_news: true,
            reduced_confidence: false,
            missing_components: 0,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_cadence() {
        let t0 = Utc::now();
        let period = Duration::minutes(5);
        let mut schedule = CycleSchedule::default();
        assert!(schedule.should_run_cycle(period, t0));

        schedule.mark_cycle_run(t0);
        assert!(!schedule.should_run_cycle(period, t0 + Duration::minutes(2)));
        assert!(schedule.should_run_cycle(period, t0 + Duration::minutes(5)));
    }

    #[test]
    fn test_range_to_news_overrides_cadence() {
        let scheduler = AdaptationScheduler::default();
        let t0 = Utc::now();
        let period = Duration::minutes(5);
        let mut schedule = CycleSchedule::default();
        schedule.mark_cycle_run(t0);

        let reason = scheduler.classified_override(&profile(
            Some(MarketState::RangeBound),
            MarketState::NewsImpact,
        ));
        assert_eq!(reason, Some(OverrideReason::RegimeBreak));
        schedule.raise_override(OverrideReason::RegimeBreak);

        assert!(schedule.should_run_cycle(period, t0 + Duration::seconds(10)));
        schedule.mark_cycle_run(t0 + Duration::seconds(10));
        assert!(!schedule.should_run_cycle(period, t0 + Duration::seconds(20)));
    }

    #[test]
    fn test_early_override_only_from_stable_state() {
        let scheduler = AdaptationScheduler::default();
        let fire = |cached, volatility, news| {
            let mut schedule = CycleSchedule::default();
            let fired = scheduler.early_override(&mut schedule, cached, volatility, news);
            assert_eq!(schedule.pending_override, fired);
            fired
        };

        assert_eq!(
            fire(Some(MarketState::RangeBound), Some(40.0), true),
            Some(OverrideReason::HighImpactNews)
        );
        assert_eq!(
            fire(Some(MarketState::TrendingBull), Some(85.0), false),
            Some(OverrideReason::VolatilitySpike)
        );
        assert_eq!(fire(Some(MarketState::NewsImpact), Some(85.0), true), None);
        assert_eq!(fire(None, Some(85.0), true), None);
        assert_eq!(fire(Some(MarketState::RangeBound), Some(40.0), false), None);
    }

    #[test]
    fn test_early_override_fires_once_per_onset() {
        let scheduler = AdaptationScheduler::default();
        let cached = Some(MarketState::TrendingBull);
        let mut schedule = CycleSchedule::default();

        assert_eq!(
            scheduler.early_override(&mut schedule, cached, Some(30.0), true),
            Some(OverrideReason::HighImpactNews)
        );
        schedule.mark_cycle_run(Utc::now());

        // Persisting news does not keep forcing classifications
        for _ in 0..3 {
            assert_eq!(scheduler.early_override(&mut schedule, cached, Some(30.0), true), None);
            assert!(schedule.pending_override.is_none());
        }

        // Cleared, then a fresh spike fires again
        assert_eq!(scheduler.early_override(&mut schedule, cached, Some(30.0), false), None);
        assert!(!schedule.early_latched);
        assert_eq!(
            scheduler.early_override(&mut schedule, cached, Some(90.0), false),
            Some(OverrideReason::VolatilitySpike)
        );
    }

    #[test]
    fn test_no_override_without_break() {
        let scheduler = AdaptationScheduler::default();
        assert!(scheduler
            .classified_override(&profile(Some(MarketState::Reversal), MarketState::NewsImpact))
            .is_none());
        assert!(scheduler
            .classified_override(&profile(None, MarketState::NewsImpact))
            .is_none());
    }

    #[test]
    fn test_learning_pass_needs_new_outcomes() {
        let scheduler = AdaptationScheduler::default();
        let t0 = Utc::now();
        assert!(!scheduler.should_run_learning_pass(None, 0, t0));
        assert!(scheduler.should_run_learning_pass(None, 1, t0));
        assert!(!scheduler.should_run_learning_pass(Some(t0), 5, t0 + Duration::minutes(10)));
        assert!(scheduler.should_run_learning_pass(Some(t0), 5, t0 + Duration::minutes(30)));
        assert!(!scheduler.should_run_learning_pass(Some(t0), 0, t0 + Duration::hours(2)));
    }

    #[test]
    fn test_first_override_reason_wins() {
        let mut schedule = CycleSchedule::default();
        schedule.raise_override(OverrideReason::HighImpactNews);
        schedule.raise_override(OverrideReason::RegimeBreak);
        assert_eq!(schedule.pending_override, Some(OverrideReason::HighImpactNews));
    }
}
