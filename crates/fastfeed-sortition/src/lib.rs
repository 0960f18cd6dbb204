//! # fastfeed-sortition
//!
//! Weighted random admission for fast updates.
//!
//! Each registered provider holds `weight` replicates per round, where the
//! weight is its share of the registry scaled to 4096 virtual providers. A
//! replicate may submit when its pseudorandom score for the round falls at
//! or below the round's cutoff. The cutoff is chosen so that, across all
//! providers, the expected number of winning replicates equals the expected
//! sample size.
//!
//! ## Modules
//!
//! - [`cutoff`] — Score cutoff, sortition weight and the cutoff history ring
//! - [`verifier`] — Credential verification and the signature-derived verifier
//! - [`dedup`] — Per-round sets of accepted submission hashes

pub mod cutoff;
pub mod dedup;
pub mod verifier;

pub use cutoff::{score_cutoff, sortition_weight, CutoffHistory};
pub use dedup::{submission_hash, DedupSet};
pub use verifier::{SignatureSortition, SortitionCredential, SortitionState, SortitionVerifier};

use fastfeed_fpa::U256;

/// Order of the BN254 scalar field. Sortition scores are uniform below it.
pub const SORTITION_MODULUS: U256 = U256([
    0x43e1_f593_f000_0001,
    0x2833_e848_79b9_7091,
    0xb850_45b6_8181_585d,
    0x3064_4e72_e131_a029,
]);

/// Error types for sortition operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortitionError {
    /// The registry reported a total weight of zero.
    #[error("total provider weight is zero")]
    ZeroTotalWeight,

    /// A provider's weight exceeds the registry total.
    #[error("provider weight {weight} exceeds total {total}")]
    WeightExceedsTotal {
        /// The provider's weight.
        weight: u64,
        /// The registry total.
        total: u64,
    },

    /// No cutoff is retained for the requested tick.
    #[error("no score cutoff retained for tick {tick}")]
    CutoffUnavailable {
        /// The requested tick.
        tick: u64,
    },
}

/// Convenience result type for sortition operations.
pub type Result<T> = std::result::Result<T, SortitionError>;
