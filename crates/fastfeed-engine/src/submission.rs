//! Signed update submissions.
//!
//! ## Signing message
//!
//! ```text
//! message = BLAKE3::derive_key(
//!     "fastfeed v1 submission-message",
//!     LE64(round) || LE32(len) || proof || LE64(replicate) || LE32(len) || deltas,
//! )
//! ```
//!
//! The provider identity is derived from the signing key carried in the
//! submission.

use fastfeed_crypto::blake3::{self, Domain};
use fastfeed_crypto::ed25519::{derive_identity, Signature, SigningKey, VerifyingKey};
use fastfeed_sortition::SortitionCredential;
use fastfeed_store::DeltaBatch;
use fastfeed_types::{Hash, ProviderIdentity, Tick};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// One provider's update for one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Round the credential was drawn for.
    pub round: Tick,
    /// Sortition credential for one replicate.
    pub credential: SortitionCredential,
    /// Per-feed delta codes.
    pub deltas: DeltaBatch,
    /// Key that signed the submission.
    pub signer: VerifyingKey,
    /// Signature over [`Submission::signing_message`].
    pub signature: Signature,
}

impl Submission {
    /// Build and sign a submission.
    pub fn sign(
        key: &SigningKey,
        round: Tick,
        credential: SortitionCredential,
        deltas: DeltaBatch,
    ) -> Self {
        let message = Self::signing_message(round, &credential, &deltas);
        Self {
            round,
            credential,
            deltas,
            signer: key.verifying_key(),
            signature: key.sign(&message),
        }
    }

    /// The digest a provider signs.
    pub fn signing_message(round: Tick, credential: &SortitionCredential, deltas: &DeltaBatch) -> Hash {
        let mut material = round.to_le_bytes().to_vec();
        material.extend_from_slice(&blake3::encode_multi_field(&[credential.proof.as_slice()]));
        material.extend_from_slice(&credential.replicate.to_le_bytes());
        material.extend_from_slice(&blake3::encode_multi_field(&[deltas.as_bytes()]));
        blake3::derive_key(Domain::SubmissionMessage, &material)
    }

    /// Verify the signature and return the signer's identity.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidSignature`] if the signature does not verify
    pub fn verify_signature(&self) -> Result<ProviderIdentity> {
        let message = Self::signing_message(self.round, &self.credential, &self.deltas);
        self.signer
            .verify(&message, &self.signature)
            .map_err(|_| EngineError::InvalidSignature)?;
        Ok(ProviderIdentity(derive_identity(&self.signer)))
    }
}
