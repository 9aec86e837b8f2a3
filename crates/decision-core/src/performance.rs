use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{DecisionMode, MarketState, PerformanceRecord};

/// Flattened row of the performance table, for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub mode: DecisionMode,
    pub state: MarketState,
    pub record: PerformanceRecord,
}

/// Performance statistics keyed by (mode, state). Process-lifetime; never
/// reset by the engine itself.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTable {
    records: HashMap<(DecisionMode, MarketState), PerformanceRecord>,
}

impl PerformanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mode: DecisionMode, state: MarketState) -> Option<&PerformanceRecord> {
        self.records.get(&(mode, state))
    }

    /// Record for the pair, created empty on first touch
    pub fn entry(&mut self, mode: DecisionMode, state: MarketState) -> &mut PerformanceRecord {
        self.records.entry((mode, state)).or_default()
    }

    /// Replace a record wholesale (used by tests and operator tooling)
    pub fn insert(&mut self, mode: DecisionMode, state: MarketState, record: PerformanceRecord) {
        self.records.insert((mode, state), record);
    }

    /// Trade count for the pair, 0 when unseen
    pub fn sample_count(&self, mode: DecisionMode, state: MarketState) -> u64 {
        self.get(mode, state).map(|r| r.trade_count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_trades(&self) -> u64 {
        self.records.values().map(|r| r.trade_count).sum()
    }

    /// All rows sorted by (mode, state) so reports are stable
    pub fn entries(&self) -> Vec<PerformanceEntry> {
        let mut entries: Vec<PerformanceEntry> = self
            .records
            .iter()
            .map(|((mode, state), record)| PerformanceEntry {
                mode: *mode,
                state: *state,
                record: record.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (a.mode, a.state).cmp(&(b.mode, b.state)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creates_default_record() {
        let mut table = PerformanceTable::new();
        assert_eq!(table.sample_count(DecisionMode::Swing, MarketState::TrendingBull), 0);

        table.entry(DecisionMode::Swing, MarketState::TrendingBull).trade_count = 3;
        table.entry(DecisionMode::Conservative, MarketState::Uncertain).trade_count = 2;

        assert_eq!(table.sample_count(DecisionMode::Swing, MarketState::TrendingBull), 3);
        assert_eq!(table.total_trades(), 5);

        let entries = table.entries();
        assert_eq!(entries[0].mode, DecisionMode::Conservative);
        assert_eq!(entries[1].mode, DecisionMode::Swing);
    }
}
