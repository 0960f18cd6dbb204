//! # fastfeed-crypto
//!
//! Hashing and signatures for the fast-update protocol.
//!
//! There is one suite and no negotiation: BLAKE3 in key-derivation mode for
//! every protocol digest, Ed25519 for submission signatures and for the
//! bundled sortition proofs.
//!
//! ## Modules
//!
//! - [`blake3`] — Hashing domains and field framing
//! - [`ed25519`] — Provider keys, strict verification and identities

pub mod blake3;
pub mod ed25519;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The signature does not verify under the key, or is non-canonical.
    #[error("signature verification failed")]
    SignatureVerification,

    /// A key or signature of the wrong size.
    #[error("wrong byte length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Bytes of the right size that do not decode, such as a point off the
    /// curve.
    #[error("malformed input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
