//! Per-tick accepted-submission counters.

use fastfeed_types::{Tick, UPDATE_HISTORY_TICKS};
use serde::{Deserialize, Serialize};

/// Ring of submission counts for the most recent ticks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateHistory {
    slots: Vec<(Tick, u64)>,
}

impl Default for UpdateHistory {
    fn default() -> Self {
        Self {
            slots: vec![(0, 0); UPDATE_HISTORY_TICKS as usize],
        }
    }
}

impl UpdateHistory {
    /// Number of ticks retained.
    pub fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }

    /// Start counting for `tick`, discarding the tick that shared its slot.
    pub fn open(&mut self, tick: Tick) {
        let slot = self.slot(tick);
        self.slots[slot] = (tick, 0);
    }

    /// Count one accepted submission in `tick`.
    pub fn record(&mut self, tick: Tick) {
        let slot = self.slot(tick);
        match &mut self.slots[slot] {
            (recorded, count) if *recorded == tick => *count += 1,
            entry => *entry = (tick, 1),
        }
    }

    /// Submissions accepted in `tick`; zero once the slot is reused.
    pub fn count(&self, tick: Tick) -> u64 {
        match self.slots[self.slot(tick)] {
            (recorded, count) if recorded == tick => count,
            _ => 0,
        }
    }

    /// Counts for `current` and the `window − 1` ticks before it, newest
    /// first. Ticks before zero are skipped.
    pub fn recent(&self, current: Tick, window: u64) -> Vec<u64> {
        (0..window)
            .map_while(|back| current.checked_sub(back))
            .map(|tick| self.count(tick))
            .collect()
    }

    fn slot(&self, tick: Tick) -> usize {
        (tick % self.slots.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut h = UpdateHistory::default();
        h.open(5);
        h.record(5);
        h.record(5);
        assert_eq!(h.count(5), 2);
        assert_eq!(h.count(6), 0);
    }

    #[test]
    fn test_slot_reuse_resets() {
        let mut h = UpdateHistory::default();
        h.open(3);
        h.record(3);
        h.open(3 + UPDATE_HISTORY_TICKS);
        assert_eq!(h.count(3), 0);
        assert_eq!(h.count(3 + UPDATE_HISTORY_TICKS), 0);
        h.record(3 + UPDATE_HISTORY_TICKS);
        assert_eq!(h.count(3 + UPDATE_HISTORY_TICKS), 1);
    }

    #[test]
    fn test_recent_newest_first() {
        let mut h = UpdateHistory::default();
        for tick in 0..4 {
            h.open(tick);
            for _ in 0..tick {
                h.record(tick);
            }
        }
        assert_eq!(h.recent(3, 3), vec![3, 2, 1]);
        assert_eq!(h.recent(1, 5), vec![1, 0]);
    }
}
