//! Score cutoffs and sortition weights.
//!
//! ## Formulas
//!
//! ```text
//! cutoff = floor(modulus × expected_sample_size / 2^12)
//! weight = ceil(provider_weight × 2^12 / total_weight)
//! ```
//!
//! A replicate wins with probability `cutoff / modulus`, i.e.
//! `expected_sample_size / 4096`. With the weights summing to roughly 4096
//! replicates, the expected number of winners per round is the expected
//! sample size.

use fastfeed_fpa::wide::saturating_u256;
use fastfeed_fpa::{SampleSize, U256};
use fastfeed_types::{Tick, VIRTUAL_PROVIDER_BITS};
use serde::{Deserialize, Serialize};

use crate::{Result, SortitionError, SORTITION_MODULUS};

/// The score cutoff for `expected_sample_size`, saturating at
/// [`U256::MAX`].
pub fn score_cutoff(expected_sample_size: SampleSize) -> U256 {
    let shift = (VIRTUAL_PROVIDER_BITS + SampleSize::FRACTIONAL_BITS) as usize;
    saturating_u256(SORTITION_MODULUS.full_mul(U256::from(expected_sample_size.raw())) >> shift)
}

/// Number of replicates a provider holds: its weight share of the registry
/// scaled to 4096, rounded up.
///
/// # Errors
///
/// - [`SortitionError::ZeroTotalWeight`] if `total_weight` is zero
/// - [`SortitionError::WeightExceedsTotal`] if `weight > total_weight`
pub fn sortition_weight(weight: u64, total_weight: u64) -> Result<u64> {
    if total_weight == 0 {
        return Err(SortitionError::ZeroTotalWeight);
    }
    if weight > total_weight {
        return Err(SortitionError::WeightExceedsTotal {
            weight,
            total: total_weight,
        });
    }
    let scaled = u128::from(weight) << VIRTUAL_PROVIDER_BITS;
    Ok(scaled.div_ceil(u128::from(total_weight)) as u64)
}

/// Ring of the cutoffs in force when each recent round opened.
///
/// Holds `window + 1` slots; slot `tick % (window + 1)` stores the cutoff
/// together with its tick, so an overwritten slot is never mistaken for an
/// older round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffHistory {
    slots: Vec<Option<(Tick, U256)>>,
}

impl CutoffHistory {
    /// Create an empty history for a submission window of `window` ticks.
    pub fn new(window: u64) -> Self {
        Self {
            slots: vec![None; window as usize + 1],
        }
    }

    /// Submission window this history covers.
    pub fn window(&self) -> u64 {
        self.slots.len() as u64 - 1
    }

    /// Record the cutoff for the round opening at `tick`.
    pub fn record(&mut self, tick: Tick, cutoff: U256) {
        let slot = self.slot(tick);
        self.slots[slot] = Some((tick, cutoff));
    }

    /// The cutoff recorded for `tick`, if still retained.
    pub fn get(&self, tick: Tick) -> Option<U256> {
        match self.slots[self.slot(tick)] {
            Some((recorded, cutoff)) if recorded == tick => Some(cutoff),
            _ => None,
        }
    }

    /// The cutoff recorded for `tick`.
    ///
    /// # Errors
    ///
    /// - [`SortitionError::CutoffUnavailable`] if the slot was never written
    ///   or has been reused by a later round
    pub fn require(&self, tick: Tick) -> Result<U256> {
        self.get(tick)
            .ok_or(SortitionError::CutoffUnavailable { tick })
    }

    /// Rebuild the ring for a new window, keeping every retained cutoff
    /// that still fits.
    pub fn resize(&mut self, window: u64) {
        let mut entries: Vec<(Tick, U256)> = self.slots.iter().flatten().copied().collect();
        entries.sort_by_key(|(tick, _)| *tick);
        let mut resized = Self::new(window);
        for (tick, cutoff) in entries {
            resized.record(tick, cutoff);
        }
        *self = resized;
    }

    fn slot(&self, tick: Tick) -> usize {
        (tick % self.slots.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_full_sample_is_modulus() {
        let s = SampleSize::from_int(4096).expect("in range");
        assert_eq!(score_cutoff(s), SORTITION_MODULUS);
    }

    #[test]
    fn test_cutoff_scales_linearly() {
        let half = score_cutoff(SampleSize::from_int(2048).expect("in range"));
        let full = score_cutoff(SampleSize::from_int(4096).expect("in range"));
        // The modulus is odd, so halving floors away its low bit.
        let doubled = half << 1usize;
        assert_eq!(full.checked_sub(doubled), Some(U256::one()));
    }

    #[test]
    fn test_cutoff_zero_sample() {
        assert!(score_cutoff(SampleSize::ZERO).is_zero());
    }

    #[test]
    fn test_cutoff_large_sample_exceeds_modulus() {
        let s = SampleSize::from_int(60_000).expect("in range");
        assert!(score_cutoff(s) > SORTITION_MODULUS);
    }

    #[test]
    fn test_sortition_weight_rounds_up() {
        assert_eq!(sortition_weight(500, 1000).expect("valid"), 2048);
        assert_eq!(sortition_weight(1, 3).expect("valid"), 1366);
        assert_eq!(sortition_weight(1000, 1000).expect("valid"), 4096);
        assert_eq!(sortition_weight(0, 1000).expect("valid"), 0);
    }

    #[test]
    fn test_sortition_weight_errors() {
        assert_eq!(sortition_weight(1, 0), Err(SortitionError::ZeroTotalWeight));
        assert_eq!(
            sortition_weight(11, 10),
            Err(SortitionError::WeightExceedsTotal {
                weight: 11,
                total: 10
            })
        );
    }

    #[test]
    fn test_history_detects_overwritten_slots() {
        let mut h = CutoffHistory::new(3);
        for tick in 0..6 {
            h.record(tick, U256::from(u128::from(tick) + 100));
        }
        assert_eq!(h.get(5), Some(U256::from(105u128)));
        assert_eq!(h.get(2), Some(U256::from(102u128)));
        // Tick 1 shared a slot with tick 5.
        assert_eq!(h.get(1), None);
        assert_eq!(h.require(1), Err(SortitionError::CutoffUnavailable { tick: 1 }));
        assert_eq!(h.get(9), None);
    }

    #[test]
    fn test_history_resize_keeps_recent() {
        let mut h = CutoffHistory::new(4);
        for tick in 10..15 {
            h.record(tick, U256::from(u128::from(tick)));
        }
        h.resize(2);
        assert_eq!(h.window(), 2);
        assert_eq!(h.get(14), Some(U256::from(14u128)));
        assert_eq!(h.get(12), Some(U256::from(12u128)));
        assert_eq!(h.get(11), None);

        h.resize(6);
        assert_eq!(h.get(12), Some(U256::from(12u128)));
        assert_eq!(h.get(14), Some(U256::from(14u128)));
    }
}
