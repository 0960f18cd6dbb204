//! Validation of external price snapshots used to reset feeds.
//!
//! A reset overwrites a stored feed from a slower, authoritative price
//! source. The snapshot must be positive and recent; hosts default the
//! accepted age to [`fastfeed_types::MAX_FEED_AGE_ROUNDS`] voting rounds.

use fastfeed_fpa::Scale;
use serde::{Deserialize, Serialize};

use crate::decimals::adjust_decimals;
use crate::packed::{Feed, FeedStore};
use crate::{Result, StoreError};

/// A price read from the authoritative source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Unscaled value; `value / 10^decimals` is the price.
    pub value: i64,
    /// Decimal places in `value`.
    pub decimals: i8,
    /// Voting round the value was finalized in.
    pub voting_round: u64,
}

impl PriceSnapshot {
    /// Whether the snapshot is more than `max_age` rounds behind
    /// `current_round`.
    pub fn is_stale(&self, current_round: u64, max_age: u64) -> bool {
        current_round.saturating_sub(self.voting_round) > max_age
    }

    /// Check the snapshot is usable for a reset and return its value as an
    /// unsigned magnitude.
    ///
    /// # Errors
    ///
    /// - [`StoreError::StaleSnapshot`] if older than `max_age` rounds
    /// - [`StoreError::NonPositiveValue`] if the value is zero or negative
    pub fn validate(&self, current_round: u64, max_age: u64) -> Result<u64> {
        if self.is_stale(current_round, max_age) {
            tracing::warn!(
                snapshot_round = self.voting_round,
                current_round,
                max_age,
                "stale price snapshot"
            );
            return Err(StoreError::StaleSnapshot {
                snapshot_round: self.voting_round,
                current_round,
                max_age,
            });
        }
        u64::try_from(self.value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or(StoreError::NonPositiveValue(self.value))
    }
}

/// Overwrite feed `index` from `snapshot`, normalized for `base_scale`.
///
/// # Errors
///
/// Any error from [`PriceSnapshot::validate`], [`adjust_decimals`] or the
/// store's bounds check. The store is untouched on error.
pub fn reset_feed(
    store: &mut FeedStore,
    index: u32,
    snapshot: &PriceSnapshot,
    current_round: u64,
    max_age: u64,
    base_scale: Scale,
) -> Result<Feed> {
    store.get(index)?;
    let value = snapshot.validate(current_round, max_age)?;
    let (magnitude, decimals) = adjust_decimals(value, snapshot.decimals, base_scale)?;
    store.set(index, magnitude, decimals)?;
    tracing::debug!(index, magnitude, decimals, "feed reset");
    Ok(Feed {
        index,
        magnitude,
        decimals,
    })
}
