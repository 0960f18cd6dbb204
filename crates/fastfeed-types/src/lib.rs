//! # fastfeed-types
//!
//! Shared domain types and protocol constants used across the fastfeed
//! workspace.

pub mod ids;

pub use ids::{FeedId, ProviderIdentity};

/// Common type aliases.
pub type Hash = [u8; 32];
pub type Bytes = Vec<u8>;

/// A round of the host ledger. The protocol's only unit of time.
pub type Tick = u64;

/// Number of virtual providers that provider weights and the expected
/// sample size are normalized against (`2^12`).
pub const VIRTUAL_PROVIDER_BITS: u32 = 12;

/// `2^VIRTUAL_PROVIDER_BITS`.
pub const VIRTUAL_PROVIDER_UNITS: u64 = 1 << VIRTUAL_PROVIDER_BITS;

/// Capacity of the pending delta backlog, in batches.
pub const BACKLOG_CAPACITY: usize = 1000;

/// Ticks of per-tick submission counts kept for introspection.
pub const UPDATE_HISTORY_TICKS: u64 = 100;

/// Extra ticks past the submission window for which dedup sets are kept.
pub const DEDUP_RETENTION_MARGIN: u64 = 100;

/// Largest accepted submission window, in ticks.
pub const MAX_SUBMISSION_WINDOW: u64 = 100;

/// A price snapshot older than this many voting rounds cannot reset a feed.
pub const MAX_FEED_AGE_ROUNDS: u64 = 20;

/// Feed magnitudes are kept below `2^MAGNITUDE_BITS`.
pub const MAGNITUDE_BITS: u32 = 29;
