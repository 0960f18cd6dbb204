//! Feed and provider identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Length of a feed identifier in bytes: one category byte plus a 20-byte
/// name.
pub const FEED_ID_LEN: usize = 21;

/// Errors constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Feed name longer than the 20 bytes available.
    #[error("feed name too long: {len} bytes (max 20)")]
    NameTooLong {
        /// Byte length of the rejected name.
        len: usize,
    },
}

/// A feed identifier: `category || name`, the name right-padded with zeros.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeedId(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; FEED_ID_LEN]);

impl FeedId {
    /// Build a feed id from a category byte and an ASCII name such as
    /// `"BTC/USD"`.
    pub fn new(category: u8, name: &str) -> Result<Self, IdError> {
        let bytes = name.as_bytes();
        if bytes.len() > FEED_ID_LEN - 1 {
            return Err(IdError::NameTooLong { len: bytes.len() });
        }
        let mut id = [0u8; FEED_ID_LEN];
        id[0] = category;
        id[1..1 + bytes.len()].copy_from_slice(bytes);
        Ok(Self(id))
    }

    /// The category byte.
    pub fn category(&self) -> u8 {
        self.0[0]
    }

    /// The name with zero padding stripped, if it is valid UTF-8.
    pub fn name(&self) -> Option<&str> {
        let raw = &self.0[1..];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        std::str::from_utf8(&raw[..end]).ok()
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}:{}", self.category(), name),
            None => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedId({self})")
    }
}

/// A provider identity: the BLAKE3 hash of the provider's submission key.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderIdentity(#[serde_as(as = "serde_with::hex::Hex")] pub [u8; 32]);

impl fmt::Debug for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderIdentity({})", hex::encode(&self.0[..8]))
    }
}
