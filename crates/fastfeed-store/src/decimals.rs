//! Magnitude/decimals normalization.
//!
//! Two invariants are maintained for every stored feed:
//!
//! 1. The magnitude stays below `2^29`, leaving three bits of headroom in its
//!    32-bit lane for multiplies between normalizations.
//! 2. One multiply by the scale moves the magnitude by at least `8` (three
//!    resolvable bits), so small deltas are not rounded away.
//!
//! Both are restored by trading a factor of ten between magnitude and
//! decimals.

use fastfeed_fpa::Scale;
use fastfeed_types::MAGNITUDE_BITS;

use crate::{Result, StoreError};

/// Exclusive upper bound on a normalized magnitude.
pub const MAGNITUDE_LIMIT: u64 = 1 << MAGNITUDE_BITS;

/// Smallest per-multiply change a normalized magnitude must resolve.
pub const MIN_RESOLVABLE_DELTA: u128 = 8;

/// Normalize `(value, decimals)` for `scale`.
///
/// Returns the new magnitude and decimals. A zero value is returned
/// unchanged.
///
/// # Errors
///
/// - [`StoreError::MagnitudeOverflow`] if `value` cannot be brought below
///   [`MAGNITUDE_LIMIT`] before decimals run out
pub fn adjust_decimals(value: u64, decimals: i8, scale: Scale) -> Result<(u32, i8)> {
    if value == 0 {
        return Ok((0, decimals));
    }

    let (mut value, mut decimals) = shed_excess_digits(value, decimals);
    if value >= MAGNITUDE_LIMIT {
        return Err(StoreError::MagnitudeOverflow { value, decimals });
    }

    while multiply_delta(value, scale) < MIN_RESOLVABLE_DELTA
        && value * 10 < MAGNITUDE_LIMIT
        && decimals < i8::MAX
    {
        value *= 10;
        decimals += 1;
    }

    Ok((value as u32, decimals))
}

/// Divide by ten until the value is below [`MAGNITUDE_LIMIT`] or decimals
/// can go no lower.
pub(crate) fn shed_excess_digits(mut value: u64, mut decimals: i8) -> (u64, i8) {
    while value >= MAGNITUDE_LIMIT && decimals > i8::MIN {
        value /= 10;
        decimals -= 1;
    }
    (value, decimals)
}

/// The change one multiply by `scale` makes to `value`.
fn multiply_delta(value: u64, scale: Scale) -> u128 {
    (u128::from(value) * scale.excess().raw()) >> Scale::FRACTIONAL_BITS
}
