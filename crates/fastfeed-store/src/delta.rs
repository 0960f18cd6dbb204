//! Delta codes and delta batches.
//!
//! A delta batch carries one 2-bit code per feed, in ascending feed order,
//! four codes per byte with the first feed in the most significant pair:
//!
//! ```text
//! byte k:  [feed 4k][feed 4k+1][feed 4k+2][feed 4k+3]
//!           bits 7-6  bits 5-4   bits 3-2   bits 1-0
//! ```
//!
//! Feeds past the end of the batch implicitly carry [`DeltaCode::None`].

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Number of 2-bit codes packed into one byte.
pub const CODES_PER_BYTE: usize = 4;

/// A requested adjustment for one feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeltaCode {
    /// Leave the feed unchanged.
    None = 0,
    /// Multiply the feed by the current scale.
    Multiply = 1,
    /// Unassigned; merges as a no-op.
    Reserved = 2,
    /// Divide the feed by the current scale.
    Divide = 3,
}

impl DeltaCode {
    /// Decode the low two bits of `bits`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::None,
            1 => Self::Multiply,
            2 => Self::Reserved,
            _ => Self::Divide,
        }
    }
}

/// One accepted submission's adjustments, packed four codes per byte.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeltaBatch {
    #[serde_as(as = "serde_with::hex::Hex")]
    bytes: Vec<u8>,
}

impl DeltaBatch {
    /// Wrap already-packed bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Pack a sequence of codes, one per feed starting at index 0.
    pub fn from_codes(codes: &[DeltaCode]) -> Self {
        let mut bytes = vec![0u8; codes.len().div_ceil(CODES_PER_BYTE)];
        for (i, code) in codes.iter().enumerate() {
            bytes[i / CODES_PER_BYTE] |= (*code as u8) << Self::shift(i);
        }
        Self { bytes }
    }

    /// The packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the packed encoding in bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Number of codes the encoding has room for.
    pub fn code_count(&self) -> usize {
        self.bytes.len() * CODES_PER_BYTE
    }

    /// Whether the batch carries no codes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The code for `feed`, or [`DeltaCode::None`] past the end.
    pub fn code(&self, feed: usize) -> DeltaCode {
        match self.bytes.get(feed / CODES_PER_BYTE) {
            Some(byte) => DeltaCode::from_bits(byte >> Self::shift(feed)),
            None => DeltaCode::None,
        }
    }

    /// Whether any code in `range` is not [`DeltaCode::None`].
    pub fn touches(&self, range: std::ops::Range<usize>) -> bool {
        range.into_iter().any(|i| self.code(i) != DeltaCode::None)
    }

    fn shift(feed: usize) -> u32 {
        (6 - 2 * (feed % CODES_PER_BYTE)) as u32
    }
}
