//! # fastfeed-fpa
//!
//! Fixed-point arithmetic for the fast-update protocol.
//!
//! Every protocol quantity that carries a fractional part (sample sizes,
//! ranges, precisions, scales) or that must never silently wrap (fees) is a
//! distinct newtype over `u128`. Each type fixes its number of fractional
//! bits and a guard bound; arithmetic that leaves the guard fails with an
//! [`FpaError`] instead of saturating or wrapping.
//!
//! ## Modules
//!
//! - [`wide`] — `primitive-types` integers, word lanes and exact 128×128-bit products
//! - [`fixed`] — `SampleSize`, `Range`, `Fee`, `Precision`, `Scale`

pub mod fixed;
pub mod wide;

pub use fixed::{Fee, Precision, Range, SampleSize, Scale, PRECISION_FLOOR};
pub use wide::{Lanes, U256, U512};

/// Error types for fixed-point arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FpaError {
    /// The result exceeds the type's guard bound.
    #[error("{kind} overflow")]
    Overflow {
        /// Name of the fixed-point type.
        kind: &'static str,
    },

    /// Subtraction would go below zero.
    #[error("{kind} underflow")]
    Underflow {
        /// Name of the fixed-point type.
        kind: &'static str,
    },

    /// Division by a zero value.
    #[error("{kind} division by zero")]
    DivisionByZero {
        /// Name of the fixed-point type.
        kind: &'static str,
    },
}

/// Convenience result type for fixed-point operations.
pub type Result<T> = std::result::Result<T, FpaError>;
