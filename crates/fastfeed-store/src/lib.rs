//! # fastfeed-store
//!
//! Packed feed store and delta merge engine.
//!
//! Feed values are kept as a 29-bit magnitude plus a decimals count
//! (`value = magnitude / 10^decimals`), packed eight magnitudes to a 256-bit
//! word with a parallel byte array of decimals. Accepted submissions do not
//! touch the store directly: their delta batches queue in a bounded backlog
//! and are merged once per tick.
//!
//! ## Modules
//!
//! - [`packed`] — Packed magnitude/decimals arrays behind a typed accessor
//! - [`delta`] — 2-bit delta codes and delta batches
//! - [`backlog`] — Bounded circular backlog of unmerged batches
//! - [`decimals`] — Magnitude/decimals normalization
//! - [`merge`] — Word-wise backlog merge and bulk rescale
//! - [`snapshot`] — Validation of external price snapshots used for resets

pub mod backlog;
pub mod decimals;
pub mod delta;
pub mod merge;
pub mod packed;
pub mod snapshot;

pub use backlog::DeltaBacklog;
pub use decimals::adjust_decimals;
pub use delta::{DeltaBatch, DeltaCode};
pub use merge::{merge_backlog, rescale_all, MergeReport};
pub use packed::{Feed, FeedStore};
pub use snapshot::{reset_feed, PriceSnapshot};

/// Error types for feed store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A packed read or write addressed a feed outside the store.
    #[error("feed index {index} out of range (store holds {len} feeds)")]
    IndexOutOfRange {
        /// The rejected index.
        index: u32,
        /// Number of feeds in the store.
        len: usize,
    },

    /// Every backlog slot holds an unmerged batch.
    #[error("delta backlog full: {capacity} unmerged batches")]
    BacklogFull {
        /// Backlog capacity in batches.
        capacity: usize,
    },

    /// The value cannot be brought under the magnitude budget.
    #[error("magnitude {value} cannot be normalized (decimals {decimals})")]
    MagnitudeOverflow {
        /// The value that did not fit.
        value: u64,
        /// Decimals at the point normalization gave up.
        decimals: i8,
    },

    /// A price snapshot carried a zero or negative value.
    #[error("non-positive feed value: {0}")]
    NonPositiveValue(i64),

    /// A price snapshot is too old to reset a feed from.
    #[error(
        "stale price snapshot: round {snapshot_round}, current {current_round}, max age {max_age}"
    )]
    StaleSnapshot {
        /// Voting round the snapshot was produced in.
        snapshot_round: u64,
        /// Current voting round.
        current_round: u64,
        /// Maximum accepted age in rounds.
        max_age: u64,
    },
}

/// Convenience result type for feed store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
