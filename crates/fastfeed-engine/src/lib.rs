//! # fastfeed-engine
//!
//! The fast-update engine: a single owner for the feed store, the delta
//! backlog, the incentive market and the admission state, driven by one
//! [`FastUpdater::tick`] per round and fed by
//! [`FastUpdater::submit_updates`].
//!
//! ## Modules
//!
//! - [`config`] — Engine configuration (TOML)
//! - [`collaborators`] — Traits for the host's registry, feed configuration and price source
//! - [`in_memory`] — In-memory host for tests and local runs
//! - [`submission`] — Signed update submissions
//! - [`history`] — Per-tick accepted-submission counters
//! - [`atomic`] — Stage-and-commit wrapper for multi-step operations
//! - [`updater`] — The `FastUpdater` facade

pub mod atomic;
pub mod collaborators;
pub mod config;
pub mod history;
pub mod in_memory;
pub mod submission;
pub mod updater;

pub use collaborators::{FeedConfiguration, Host, PriceSource, ProviderRegistry, RegisteredProvider};
pub use config::EngineConfig;
pub use in_memory::InMemoryHost;
pub use submission::Submission;
pub use updater::{CoreState, FastUpdater, FeedSnapshot, SubmissionReceipt, TickReport};

use fastfeed_fpa::FpaError;
use fastfeed_incentive::IncentiveError;
use fastfeed_sortition::SortitionError;
use fastfeed_store::StoreError;
use fastfeed_types::{FeedId, ProviderIdentity, Tick};

/// Broad class of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A submission was refused.
    Admission,
    /// An incentive offer or parameter was refused.
    Incentive,
    /// A bound or capacity was exceeded.
    Capacity,
    /// Configuration or governance input was invalid.
    Configuration,
}

/// Error types for engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The submission's round has not opened yet.
    #[error("submission window for round {round} not open (current tick {current})")]
    WindowNotOpen {
        /// Round targeted by the submission.
        round: Tick,
        /// Current tick.
        current: Tick,
    },

    /// The submission's round is no longer accepting updates.
    #[error("submission window for round {round} closed (current tick {current}, window {window})")]
    WindowClosed {
        /// Round targeted by the submission.
        round: Tick,
        /// Current tick.
        current: Tick,
        /// Submission window in ticks.
        window: u64,
    },

    /// The delta batch is longer than the feed count allows.
    #[error("delta batch of {bytes} bytes too large for {feeds} feeds")]
    OversizedBatch {
        /// Encoded batch length.
        bytes: usize,
        /// Number of configured feeds.
        feeds: usize,
    },

    /// The submission signature does not verify.
    #[error("invalid submission signature")]
    InvalidSignature,

    /// The signer is not registered for the round's epoch.
    #[error("provider {identity:?} not registered in epoch {epoch}")]
    UnregisteredProvider {
        /// Identity derived from the signing key.
        identity: ProviderIdentity,
        /// Epoch looked up.
        epoch: u64,
    },

    /// This replicate already submitted for this round.
    #[error("duplicate submission for round {round}, replicate {replicate}")]
    DuplicateSubmission {
        /// Round targeted.
        round: Tick,
        /// Replicate index.
        replicate: u64,
    },

    /// The replicate index is not below the provider's weight.
    #[error("replicate {replicate} out of range for weight {weight}")]
    ReplicateOutOfRange {
        /// Replicate index claimed.
        replicate: u64,
        /// Provider's sortition weight.
        weight: u64,
    },

    /// The sortition credential does not prove a win.
    #[error("sortition proof invalid")]
    InvalidSortitionProof,

    /// `tick` was called for a round other than the next one.
    #[error("tick out of order: expected round {expected}, got {got}")]
    TickOutOfOrder {
        /// The only round accepted next.
        expected: Tick,
        /// The round passed in.
        got: Tick,
    },

    /// A cutoff was requested for a tick outside the retained window.
    #[error("no score cutoff for tick {tick} (current tick {current})")]
    CutoffOutsideWindow {
        /// Requested tick.
        tick: Tick,
        /// Current tick.
        current: Tick,
    },

    /// An update history query reached past the retained ticks.
    #[error("update history window {requested} exceeds {max} ticks")]
    HistoryWindowTooLarge {
        /// Ticks asked for.
        requested: u64,
        /// Ticks retained.
        max: u64,
    },

    /// A submission window outside `1..=max`.
    #[error("submission window {window} outside 1..={max}")]
    SubmissionWindowOutOfRange {
        /// Window asked for.
        window: u64,
        /// Largest accepted window.
        max: u64,
    },

    /// The feed id at an index is already stored at another index.
    #[error("feed {feed_id} at index {index} already stored at index {existing}")]
    FeedIdCollision {
        /// The duplicated id.
        feed_id: FeedId,
        /// Index being reset.
        index: u32,
        /// Index already holding the id.
        existing: u32,
    },

    /// No feed is configured at the index.
    #[error("no feed configured at index {index}")]
    UnconfiguredFeed {
        /// The index asked for.
        index: u32,
    },

    /// The configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Feed store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Incentive market error.
    #[error("incentive error: {0}")]
    Incentive(#[from] IncentiveError),

    /// Sortition error.
    #[error("sortition error: {0}")]
    Sortition(#[from] SortitionError),

    /// Fixed-point error.
    #[error("fixed-point error: {0}")]
    Fpa(#[from] FpaError),
}

impl EngineError {
    /// Classify the error.
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::WindowNotOpen { .. }
            | Self::WindowClosed { .. }
            | Self::OversizedBatch { .. }
            | Self::InvalidSignature
            | Self::UnregisteredProvider { .. }
            | Self::DuplicateSubmission { .. }
            | Self::ReplicateOutOfRange { .. }
            | Self::InvalidSortitionProof
            | Self::Sortition(SortitionError::CutoffUnavailable { .. }) => FaultKind::Admission,

            Self::TickOutOfOrder { .. }
            | Self::CutoffOutsideWindow { .. }
            | Self::HistoryWindowTooLarge { .. } => FaultKind::Capacity,

            Self::SubmissionWindowOutOfRange { .. }
            | Self::FeedIdCollision { .. }
            | Self::UnconfiguredFeed { .. }
            | Self::Config(_) => FaultKind::Configuration,

            Self::Store(e) => match e {
                StoreError::IndexOutOfRange { .. }
                | StoreError::BacklogFull { .. }
                | StoreError::MagnitudeOverflow { .. } => FaultKind::Capacity,
                StoreError::NonPositiveValue(_) | StoreError::StaleSnapshot { .. } => {
                    FaultKind::Configuration
                }
            },

            Self::Incentive(e) => match e {
                IncentiveError::PrecisionBelowFloor | IncentiveError::ZeroDuration => {
                    FaultKind::Configuration
                }
                IncentiveError::InsufficientContribution { .. }
                | IncentiveError::RangeNotBelowSampleSize
                | IncentiveError::Fpa(_) => FaultKind::Incentive,
            },

            Self::Sortition(_) => FaultKind::Configuration,

            Self::Fpa(_) => FaultKind::Incentive,
        }
    }
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kinds() {
        assert_eq!(EngineError::InvalidSignature.kind(), FaultKind::Admission);
        assert_eq!(
            EngineError::TickOutOfOrder {
                expected: 2,
                got: 3
            }
            .kind(),
            FaultKind::Capacity
        );
        assert_eq!(
            EngineError::from(StoreError::BacklogFull { capacity: 1 }).kind(),
            FaultKind::Capacity
        );
        assert_eq!(
            EngineError::from(StoreError::NonPositiveValue(0)).kind(),
            FaultKind::Configuration
        );
        assert_eq!(
            EngineError::from(IncentiveError::RangeNotBelowSampleSize).kind(),
            FaultKind::Incentive
        );
        assert_eq!(
            EngineError::from(IncentiveError::PrecisionBelowFloor).kind(),
            FaultKind::Configuration
        );
        assert_eq!(
            EngineError::from(StoreError::MagnitudeOverflow {
                value: 1 << 30,
                decimals: i8::MIN
            })
            .kind(),
            FaultKind::Capacity
        );
        assert_eq!(
            EngineError::from(SortitionError::CutoffUnavailable { tick: 3 }).kind(),
            FaultKind::Admission
        );
    }
}
