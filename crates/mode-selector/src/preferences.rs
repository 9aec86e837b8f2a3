use decision_core::{DecisionMode, MarketState};

/// Statically configured mode ranking for one market state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePreference {
    pub preferred: DecisionMode,
    /// Ranked, best first
    pub alternates: &'static [DecisionMode],
}

impl ModePreference {
    /// Preferred followed by alternates
    pub fn candidates(&self) -> impl Iterator<Item = DecisionMode> + '_ {
        std::iter::once(self.preferred).chain(self.alternates.iter().copied())
    }
}

/// Get the preferred mode and ranked alternates for a market state
pub fn mode_preferences(state: MarketState) -> ModePreference {
    use DecisionMode::*;

    let pref = |preferred: DecisionMode, alternates: &'static [DecisionMode]| ModePreference {
        preferred,
        alternates,
    };

    match state {
        MarketState::TrendingBull => pref(TrendFollowing, &[Swing, Aggressive, MLDriven]),
        MarketState::TrendingBear => pref(TrendFollowing, &[Swing, Conservative, MLDriven]),
        MarketState::RangeBound => pref(MeanReversion, &[Scalping, Moderate]),
        MarketState::HighVolatility => pref(Conservative, &[Scalping, Moderate]),
        MarketState::LowVolatility => pref(Scalping, &[MeanReversion, Moderate]),
        MarketState::Breakout => pref(BreakoutHunter, &[Aggressive, TrendFollowing]),
        MarketState::Reversal => pref(MeanReversion, &[Conservative, Swing]),
        MarketState::NewsImpact => pref(NewsTrader, &[Conservative, Scalping]),
        MarketState::SessionTransition => pref(Conservative, &[Moderate]),
        MarketState::Uncertain => pref(Conservative, &[Moderate]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_has_distinct_candidates() {
        for state in MarketState::ALL {
            let pref = mode_preferences(state);
            let candidates: Vec<_> = pref.candidates().collect();
            assert!(!pref.alternates.is_empty());
            for (i, mode) in candidates.iter().enumerate() {
                assert!(!candidates[i + 1..].contains(mode), "{:?} repeats for {:?}", mode, state);
            }
        }
    }

    #[test]
    fn test_trend_states_prefer_trend_following() {
        assert_eq!(
            mode_preferences(MarketState::TrendingBull).preferred,
            DecisionMode::TrendFollowing
        );
        assert_eq!(
            mode_preferences(MarketState::NewsImpact).preferred,
            DecisionMode::NewsTrader
        );
    }
}
