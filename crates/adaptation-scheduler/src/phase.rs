use std::fmt;

use serde::{Deserialize, Serialize};

/// Step of one symbol's decision cycle. Linear, with `Done` looping back
/// to `Idle`; there is no terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CyclePhase {
    #[default]
    Idle,
    Classifying,
    ModeSelecting,
    Scoring,
    Sizing,
    Done,
}

impl CyclePhase {
    /// Next phase. From `Idle`, a cycle that is not due for classification
    /// goes straight to `Scoring` with the cached profile and mode.
    pub fn successor(self, classify: bool) -> CyclePhase {
        match self {
            CyclePhase::Idle if classify => CyclePhase::Classifying,
            CyclePhase::Idle => CyclePhase::Scoring,
            CyclePhase::Classifying => CyclePhase::ModeSelecting,
            CyclePhase::ModeSelecting => CyclePhase::Scoring,
            CyclePhase::Scoring => CyclePhase::Sizing,
            CyclePhase::Sizing => CyclePhase::Done,
            CyclePhase::Done => CyclePhase::Idle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Classifying => "classifying",
            CyclePhase::ModeSelecting => "mode_selecting",
            CyclePhase::Scoring => "scoring",
            CyclePhase::Sizing => "sizing",
            CyclePhase::Done => "done",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(classify: bool) -> Vec<CyclePhase> {
        let mut phase = CyclePhase::Idle;
        let mut seen = vec![phase];
        loop {
            phase = phase.successor(classify);
            seen.push(phase);
            if phase == CyclePhase::Idle {
                return seen;
            }
        }
    }

    #[test]
    fn test_full_cycle() {
        assert_eq!(
            walk(true),
            vec![
                CyclePhase::Idle,
                CyclePhase::Classifying,
                CyclePhase::ModeSelecting,
                CyclePhase::Scoring,
                CyclePhase::Sizing,
                CyclePhase::Done,
                CyclePhase::Idle,
            ]
        );
    }

    #[test]
    fn test_cached_cycle_skips_classification() {
        assert_eq!(
            walk(false),
            vec![
                CyclePhase::Idle,
                CyclePhase::Scoring,
                CyclePhase::Sizing,
                CyclePhase::Done,
                CyclePhase::Idle,
            ]
        );
    }

    #[test]
    fn test_done_always_returns_to_idle() {
        assert_eq!(CyclePhase::Done.successor(true), CyclePhase::Idle);
        assert_eq!(CyclePhase::Done.successor(false), CyclePhase::Idle);
        assert_eq!(CyclePhase::Idle.successor(false), CyclePhase::Scoring);
    }
}
