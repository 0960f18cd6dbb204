//! Wide-integer helpers on top of `primitive-types`.
//!
//! [`U256`] backs sortition scores and cutoffs (below a ~2^254 prime) and
//! the packed feed words of the store, which view it as eight 32-bit
//! [`Lanes`]. [`mul_shr`] and [`mul_div`] form the exact 256-bit product of
//! two `u128` values before shifting or dividing back down; every fixed-point
//! multiplication and division in [`crate::fixed`] rescales through them.

pub use primitive_types::{U256, U512};

/// Number of 32-bit lanes in one [`U256`].
pub const LANES: usize = 8;

/// Access to the eight 32-bit lanes of a word. Lane 0 is the least
/// significant.
pub trait Lanes {
    fn lane(&self, index: usize) -> u32;
    fn set_lane(&mut self, index: usize, value: u32);
}

impl Lanes for U256 {
    fn lane(&self, index: usize) -> u32 {
        (self.0[(index / 2) % 4] >> ((index % 2) * 32)) as u32
    }

    fn set_lane(&mut self, index: usize, value: u32) {
        let shift = (index % 2) * 32;
        let limb = &mut self.0[(index / 2) % 4];
        *limb = (*limb & !(u64::from(u32::MAX) << shift)) | (u64::from(value) << shift);
    }
}

/// Narrow a wide value to `U256`, saturating at [`U256::MAX`].
pub fn saturating_u256(value: U512) -> U256 {
    U256::try_from(value).unwrap_or(U256::MAX)
}

fn product(a: u128, b: u128) -> U512 {
    U256::from(a).full_mul(U256::from(b))
}

fn to_u128(value: U512) -> Option<u128> {
    (value.bits() <= 128).then(|| value.low_u128())
}

/// `floor(a × b / 2^shift)`, or `None` if the result does not fit in `u128`.
pub fn mul_shr(a: u128, b: u128, shift: u32) -> Option<u128> {
    to_u128(product(a, b) >> shift as usize)
}

/// `floor(a × b / d)`, or `None` if `d == 0` or the quotient overflows.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    product(a, b).checked_div(U512::from(d)).and_then(to_u128)
}
