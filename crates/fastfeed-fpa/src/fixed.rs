//! Fixed-point scalar types.
//!
//! | type         | fractional bits | guard                 |
//! |--------------|-----------------|-----------------------|
//! | [`SampleSize`] | 32            | `< 2^16` whole units  |
//! | [`Range`]      | 32            | `< 2^16` whole units  |
//! | [`Fee`]        | 0             | `< 2^120`             |
//! | [`Precision`]  | 64            | `≤ 1.0`               |
//! | [`Scale`]      | 64            | `< 2.0`               |
//!
//! Additions and subtractions never saturate: an out-of-guard result is an
//! [`FpaError`]. Multiplication and division go through an exact 256-bit
//! intermediate (see [`crate::wide`]) and then rescale to the receiver's
//! fractional convention.

use serde::{Deserialize, Serialize};

use crate::wide::{mul_div, mul_shr};
use crate::{FpaError, Result};

macro_rules! fixed_point {
    (
        $(#[$meta:meta])*
        $name:ident, fractional_bits = $frac:expr, bound = $bound:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u128);

        impl $name {
            /// Number of fractional bits in the raw representation.
            pub const FRACTIONAL_BITS: u32 = $frac;

            /// Exclusive upper bound on the raw representation.
            pub const BOUND: u128 = $bound;

            /// Zero.
            pub const ZERO: Self = Self(0);

            /// One whole unit.
            pub const ONE: Self = Self(1u128 << $frac);

            /// Wrap a raw fixed-point value without checking the guard.
            pub const fn from_raw(raw: u128) -> Self {
                Self(raw)
            }

            /// The raw fixed-point value.
            pub const fn raw(self) -> u128 {
                self.0
            }

            /// Whole units, converted exactly.
            pub fn from_int(units: u64) -> Result<Self> {
                Self(u128::from(units) << $frac).checked()
            }

            /// Whole part, rounded down.
            pub fn to_int(self) -> u128 {
                self.0 >> $frac
            }

            /// Approximate value for diagnostics only.
            pub fn to_f64(self) -> f64 {
                self.0 as f64 / (1u128 << $frac) as f64
            }

            /// Whether the value lies within the type's guard.
            pub fn check(self) -> bool {
                self.0 < Self::BOUND
            }

            fn checked(self) -> Result<Self> {
                if self.check() {
                    Ok(self)
                } else {
                    Err(FpaError::Overflow {
                        kind: stringify!($name),
                    })
                }
            }

            /// `self + rhs`, rejecting results outside the guard.
            pub fn checked_add(self, rhs: Self) -> Result<Self> {
                self.0
                    .checked_add(rhs.0)
                    .map(Self)
                    .ok_or(FpaError::Overflow {
                        kind: stringify!($name),
                    })?
                    .checked()
            }

            /// `self − rhs`, rejecting negative results.
            pub fn checked_sub(self, rhs: Self) -> Result<Self> {
                self.0
                    .checked_sub(rhs.0)
                    .map(Self)
                    .ok_or(FpaError::Underflow {
                        kind: stringify!($name),
                    })
            }

            /// `self × rhs` in this type's convention.
            pub fn checked_mul(self, rhs: Self) -> Result<Self> {
                mul_shr(self.0, rhs.0, $frac)
                    .map(Self)
                    .ok_or(FpaError::Overflow {
                        kind: stringify!($name),
                    })?
                    .checked()
            }

            /// `self ÷ rhs` in this type's convention.
            pub fn checked_div(self, rhs: Self) -> Result<Self> {
                if rhs.0 == 0 {
                    return Err(FpaError::DivisionByZero {
                        kind: stringify!($name),
                    });
                }
                mul_div(self.0, 1u128 << $frac, rhs.0)
                    .map(Self)
                    .ok_or(FpaError::Overflow {
                        kind: stringify!($name),
                    })?
                    .checked()
            }

            /// Ratio `self / denominator` as a [`Precision`]; must not exceed one.
            pub fn frac(self, denominator: Self) -> Result<Precision> {
                if denominator.0 == 0 {
                    return Err(FpaError::DivisionByZero {
                        kind: stringify!($name),
                    });
                }
                mul_div(self.0, Precision::ONE.0, denominator.0)
                    .map(Precision)
                    .ok_or(FpaError::Overflow { kind: "Precision" })?
                    .checked()
            }

            /// Scale by a fraction in `[0, 1]`, rounding down.
            pub fn mul_precision(self, p: Precision) -> Result<Self> {
                mul_shr(self.0, p.0, Precision::FRACTIONAL_BITS)
                    .map(Self)
                    .ok_or(FpaError::Overflow {
                        kind: stringify!($name),
                    })?
                    .checked()
            }
        }
    };
}

fixed_point!(
    /// Expected number of virtual providers selected per round.
    SampleSize, fractional_bits = 32, bound = 1u128 << (16 + 32)
);

fixed_point!(
    /// Permitted variation per round, in the same units as [`SampleSize`].
    Range, fractional_bits = 32, bound = 1u128 << (16 + 32)
);

fixed_point!(
    /// A payment amount in base currency units.
    Fee, fractional_bits = 0, bound = 1u128 << 120
);

fixed_point!(
    /// A ratio in `[0, 1]`.
    Precision, fractional_bits = 64, bound = (1u128 << 64) + 1
);

fixed_point!(
    /// A multiplier in `[1, 2)`.
    Scale, fractional_bits = 64, bound = 2u128 << 64
);

/// Lowest precision (`range / sample_size`) accepted on a settings change:
/// `2^-25`.
pub const PRECISION_FLOOR: Precision = Precision::from_raw(1u128 << (64 - 25));

impl Fee {
    /// Cost of `range` units at `self` per unit.
    pub fn mul_range(self, range: Range) -> Result<Fee> {
        mul_shr(self.0, range.0, Range::FRACTIONAL_BITS)
            .map(Fee)
            .ok_or(FpaError::Overflow { kind: "Fee" })?
            .checked()
    }
}

impl Range {
    /// `range / sample_size`. Both share one fractional convention, so this
    /// is the protocol precision.
    pub fn precision(self, sample_size: SampleSize) -> Result<Precision> {
        if sample_size.0 == 0 {
            return Err(FpaError::DivisionByZero { kind: "SampleSize" });
        }
        mul_div(self.0, Precision::ONE.0, sample_size.0)
            .map(Precision)
            .ok_or(FpaError::Overflow { kind: "Precision" })?
            .checked()
    }
}

impl Scale {
    /// `1 + precision`.
    pub fn from_precision(p: Precision) -> Result<Scale> {
        Scale::ONE.checked_add(Scale(p.0))
    }

    /// The fractional excess over one, i.e. `self − 1`.
    pub fn excess(self) -> Precision {
        Precision(self.0.saturating_sub(Scale::ONE.0))
    }
}
