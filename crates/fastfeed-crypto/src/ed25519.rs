//! Ed25519 keys for provider submissions.
//!
//! Providers sign every submission with an Ed25519 key. The registry knows a
//! provider by [`derive_identity`] of that key. The bundled sortition
//! verifier uses Ed25519 signatures as its credential proofs, so signing is
//! deterministic (RFC 8032) and verification is strict: one message has one
//! accepted signature encoding.
//!
//! Public keys and signatures serialize as lowercase hex strings.

use std::fmt;

use ed25519_dalek::Signer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CryptoError, Result};

/// A provider's private signing key. The backend wipes it on drop.
#[derive(Clone)]
pub struct SigningKey(ed25519_dalek::SigningKey);

/// A provider's public key, as held by the registry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

/// A signing key together with its public half.
#[derive(Clone)]
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl SigningKey {
    /// A fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// The key whose RFC 8032 seed is `seed`.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// The public half.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign `message`. The same key and message always give the same
    /// signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }
}

impl VerifyingKey {
    /// Decode a compressed point, rejecting encodings that are not on the
    /// curve.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| CryptoError::InvalidInput(e.to_string()))
    }

    /// Like [`VerifyingKey::from_bytes`], for a slice of any length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(&fixed(bytes)?)
    }

    /// The compressed point.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Strictly verify `signature` over `message`.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::SignatureVerification`] for a wrong, malleated or
    ///   small-order signature
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.0
            .verify_strict(message, &signature.0)
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

impl Signature {
    /// Wrap 64 raw bytes. Validity is only checked by
    /// [`VerifyingKey::verify`].
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }

    /// Like [`Signature::from_bytes`], for a slice of any length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_bytes(&fixed(bytes)?))
    }

    /// The raw `R || s` encoding.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

impl KeyPair {
    /// A fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate())
    }

    /// The keypair for a fixed seed. Tests and local tools use this for
    /// reproducible providers.
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }
}

/// Derive a provider identity from its submission-signing key.
///
/// `identity = BLAKE3::derive_key("fastfeed v1 provider-identity", public_key)`
pub fn derive_identity(public_key: &VerifyingKey) -> [u8; 32] {
    crate::blake3::derive_key(
        crate::blake3::Domain::ProviderIdentity,
        public_key.as_bytes(),
    )
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
        expected: N,
        actual: bytes.len(),
    })
}

fn decode_hex<'de, D: Deserializer<'de>, const N: usize>(deserializer: D) -> std::result::Result<[u8; N], D::Error> {
    let text = String::deserialize(deserializer)?;
    let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
    fixed(&bytes).map_err(serde::de::Error::custom)
}

impl Serialize for VerifyingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.as_bytes()))
    }
}

impl<'de> Deserialize<'de> for VerifyingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let bytes: [u8; 32] = decode_hex(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let bytes: [u8; 64] = decode_hex(deserializer)?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(&self.as_bytes()[..8]))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.to_bytes()[..8]))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(public: {:?})", self.verifying_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc8032_vector() {
        let seed = hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
            .expect("valid hex");
        let kp = KeyPair::from_bytes(&fixed(&seed).expect("32 bytes"));
        assert_eq!(
            hex::encode(kp.verifying_key.as_bytes()),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
        let sig = kp.signing_key.sign(b"");
        assert_eq!(
            hex::encode(&sig.to_bytes()[..8]),
            "e5564300c360ac72"
        );
        kp.verifying_key.verify(b"", &sig).expect("valid");
    }

    #[test]
    fn test_other_message_or_key_rejected() {
        let alice = KeyPair::from_bytes(&[1u8; 32]);
        let bob = KeyPair::from_bytes(&[2u8; 32]);
        let sig = alice.signing_key.sign(b"round 5 deltas");
        assert!(matches!(
            alice.verifying_key.verify(b"round 6 deltas", &sig),
            Err(CryptoError::SignatureVerification)
        ));
        assert!(bob.verifying_key.verify(b"round 5 deltas", &sig).is_err());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let kp = KeyPair::from_bytes(&[7u8; 32]);
        assert_eq!(kp.signing_key.sign(b"same"), kp.signing_key.sign(b"same"));
        assert_eq!(KeyPair::from_bytes(&[7u8; 32]).verifying_key, kp.verifying_key);
    }

    #[test]
    fn test_slice_lengths_checked() {
        assert!(matches!(
            VerifyingKey::from_slice(&[0u8; 31]),
            Err(CryptoError::InvalidKeyLength { expected: 32, actual: 31 })
        ));
        assert!(matches!(
            Signature::from_slice(&[0u8; 65]),
            Err(CryptoError::InvalidKeyLength { expected: 64, actual: 65 })
        ));
    }

    #[test]
    fn test_hex_serde() {
        let kp = KeyPair::from_bytes(&[3u8; 32]);
        let json = serde_json::to_string(&kp.verifying_key).expect("serialize");
        assert_eq!(json, format!("\"{}\"", hex::encode(kp.verifying_key.as_bytes())));
        let back: VerifyingKey = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, kp.verifying_key);

        let sig = kp.signing_key.sign(b"m");
        let back: Signature =
            serde_json::from_str(&serde_json::to_string(&sig).expect("serialize")).expect("deserialize");
        assert_eq!(back, sig);

        assert!(serde_json::from_str::<Signature>("\"abcd\"").is_err());
        assert!(serde_json::from_str::<VerifyingKey>("\"zz\"").is_err());
    }

    #[test]
    fn test_identity_is_domain_separated() {
        let kp = KeyPair::from_bytes(&[42u8; 32]);
        let id = derive_identity(&kp.verifying_key);
        assert_ne!(id, crate::blake3::hash(kp.verifying_key.as_bytes()));
        assert_ne!(id, derive_identity(&KeyPair::from_bytes(&[43u8; 32]).verifying_key));
    }
}
