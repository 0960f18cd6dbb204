//! # fastfeed-incentive
//!
//! Incentive market for the fast-update protocol.
//!
//! Anyone may pay to temporarily raise the protocol's expected sample size
//! (how many virtual providers are drawn per round) and its range (how far
//! each update may move a feed). Every increase is booked into a per-tick
//! ledger slot and expires automatically `duration` ticks later.
//!
//! ## Modules
//!
//! - [`increase`] — Live aggregates and their decaying per-tick ledgers
//! - [`market`] — Offer pricing, governance parameters, precision and scale

pub mod increase;
pub mod market;

pub use increase::IncreaseManager;
pub use market::{IncentiveMarket, IncentiveOffer, OfferReceipt};

use fastfeed_fpa::FpaError;

/// Error types for incentive operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IncentiveError {
    /// The payment does not cover the requested range increase.
    #[error("insufficient contribution to pay for range increase: offered {offered}, cost {cost}")]
    InsufficientContribution {
        /// Contribution accepted after clamping.
        offered: u128,
        /// Price of the accepted range increase.
        cost: u128,
    },

    /// The range would reach or exceed the sample size.
    #[error("range must stay below sample size")]
    RangeNotBelowSampleSize,

    /// `range / sample_size` is below the minimum precision.
    #[error("precision below floor of 2^-25")]
    PrecisionBelowFloor,

    /// An incentive duration of zero ticks.
    #[error("incentive duration must be at least one tick")]
    ZeroDuration,

    /// Fixed-point guard violation.
    #[error("fixed-point error: {0}")]
    Fpa(#[from] FpaError),
}

/// Convenience result type for incentive operations.
pub type Result<T> = std::result::Result<T, IncentiveError>;
