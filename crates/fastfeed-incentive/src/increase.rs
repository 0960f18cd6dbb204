//! Live incentive aggregates and their decaying ledgers.
//!
//! Three parallel ledgers hold one slot per tick of the incentive duration.
//! An increase is added both to the live aggregate and to the slot under the
//! cursor. [`IncreaseManager::tick`] moves the cursor one slot forward and
//! subtracts whatever that slot held, which is exactly what was booked
//! `duration` ticks earlier.
//!
//! ## Invariant
//!
//! ```text
//! aggregate = base + Σ ledger slots
//! ```
//!
//! where `base` is the value last set by [`IncreaseManager::reset`].

use fastfeed_fpa::{Fee, Range, SampleSize};
use serde::{Deserialize, Serialize};

use crate::{IncentiveError, Result};

/// Live sample size, range and excess pool with their expiry ledgers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncreaseManager {
    sample_size: SampleSize,
    range: Range,
    excess_offer_value: Fee,
    sample_increases: Vec<SampleSize>,
    range_increases: Vec<Range>,
    excess_increases: Vec<Fee>,
    cursor: usize,
}

impl IncreaseManager {
    /// Start from base values with empty ledgers of `duration` slots.
    ///
    /// # Errors
    ///
    /// - [`IncentiveError::ZeroDuration`] if `duration` is zero
    pub fn new(sample_size: SampleSize, range: Range, duration: usize) -> Result<Self> {
        if duration == 0 {
            return Err(IncentiveError::ZeroDuration);
        }
        Ok(Self {
            sample_size,
            range,
            excess_offer_value: Fee::ZERO,
            sample_increases: vec![SampleSize::ZERO; duration],
            range_increases: vec![Range::ZERO; duration],
            excess_increases: vec![Fee::ZERO; duration],
            cursor: 0,
        })
    }

    /// Discard every in-flight increase and restart from base values.
    pub fn reset(&mut self, sample_size: SampleSize, range: Range, duration: usize) -> Result<()> {
        *self = Self::new(sample_size, range, duration)?;
        Ok(())
    }

    /// Ledger length in ticks.
    pub fn duration(&self) -> usize {
        self.sample_increases.len()
    }

    /// Live expected sample size.
    pub fn sample_size(&self) -> SampleSize {
        self.sample_size
    }

    /// Live range.
    pub fn range(&self) -> Range {
        self.range
    }

    /// Live excess offer pool.
    pub fn excess_offer_value(&self) -> Fee {
        self.excess_offer_value
    }

    /// Expire the slot booked `duration` ticks ago.
    ///
    /// # Errors
    ///
    /// - [`IncentiveError::Fpa`] if a slot exceeds its aggregate, which only
    ///   happens if the ledgers were corrupted
    pub fn tick(&mut self) -> Result<()> {
        let next = (self.cursor + 1) % self.duration();
        let sample_size = self.sample_size.checked_sub(self.sample_increases[next])?;
        let range = self.range.checked_sub(self.range_increases[next])?;
        let excess = self
            .excess_offer_value
            .checked_sub(self.excess_increases[next])?;

        self.sample_size = sample_size;
        self.range = range;
        self.excess_offer_value = excess;
        self.sample_increases[next] = SampleSize::ZERO;
        self.range_increases[next] = Range::ZERO;
        self.excess_increases[next] = Fee::ZERO;
        self.cursor = next;
        Ok(())
    }

    /// Add `excess` to the pool and return the pool size afterwards.
    ///
    /// Nothing is written; pair with [`IncreaseManager::record`].
    pub fn excess_after(&self, excess: Fee) -> Result<Fee> {
        Ok(self.excess_offer_value.checked_add(excess)?)
    }

    /// Book one offer's increases into the live aggregates and the current
    /// slot. Every sum is checked before any is written.
    ///
    /// # Errors
    ///
    /// - [`IncentiveError::Fpa`] if an aggregate or slot leaves its guard
    pub fn record(&mut self, sample: SampleSize, range: Range, excess: Fee) -> Result<()> {
        let c = self.cursor;
        let sample_size = self.sample_size.checked_add(sample)?;
        let live_range = self.range.checked_add(range)?;
        let excess_offer_value = self.excess_offer_value.checked_add(excess)?;
        let slot_sample = self.sample_increases[c].checked_add(sample)?;
        let slot_range = self.range_increases[c].checked_add(range)?;
        let slot_excess = self.excess_increases[c].checked_add(excess)?;

        self.sample_size = sample_size;
        self.range = live_range;
        self.excess_offer_value = excess_offer_value;
        self.sample_increases[c] = slot_sample;
        self.range_increases[c] = slot_range;
        self.excess_increases[c] = slot_excess;
        Ok(())
    }

    /// Sum of sample-size increases still in force.
    pub fn pending_sample_increase(&self) -> SampleSize {
        SampleSize::from_raw(self.sample_increases.iter().map(|s| s.raw()).sum())
    }

    /// Sum of range increases still in force.
    pub fn pending_range_increase(&self) -> Range {
        Range::from_raw(self.range_increases.iter().map(|r| r.raw()).sum())
    }
}
