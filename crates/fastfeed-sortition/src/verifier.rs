//! Sortition credentials and their verification.
//!
//! The admission engine treats the credential scheme as a black box behind
//! [`SortitionVerifier`]: given the round's seed, the round, the provider's
//! key, a replicate index and the cutoff, the verifier decides whether the
//! credential proves that replicate's score is at or below the cutoff.
//!
//! ## Bundled scheme
//!
//! [`SignatureSortition`] derives credentials from Ed25519 signatures:
//!
//! ```text
//! input = BLAKE3::derive_key("fastfeed v1 sortition-input", seed || round || replicate)
//! proof = Ed25519::sign(provider_key, input)
//! score = BLAKE3::derive_key("fastfeed v1 sortition-score", proof), reduced below the modulus
//! ```
//!
//! Ed25519 signatures are deterministic, so a key has exactly one proof per
//! input and cannot grind for a better score. The scheme is not a VRF: a
//! proof is only unique for well-behaved signers, and hosts needing that
//! guarantee plug in their own verifier.

use fastfeed_crypto::blake3::{self, Domain};
use fastfeed_crypto::ed25519::{Signature, SigningKey, VerifyingKey};
use fastfeed_fpa::U256;
use fastfeed_types::{Hash, Tick};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::SORTITION_MODULUS;

/// Everything a verifier needs to judge one credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortitionState {
    /// Seed of the epoch the round belongs to.
    pub base_seed: Hash,
    /// Round the submission targets.
    pub round: Tick,
    /// Cutoff in force when the round opened.
    pub score_cutoff: U256,
    /// Replicates the provider holds this round.
    pub weight: u64,
    /// The provider's key.
    pub public_key: VerifyingKey,
}

/// A claimed sortition win for one replicate.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortitionCredential {
    /// Replicate index, below the provider's weight.
    pub replicate: u64,
    /// Scheme-specific proof bytes.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub proof: Vec<u8>,
}

/// A sortition credential scheme.
pub trait SortitionVerifier {
    /// Whether `credential` proves a win for `state`.
    fn verify(&self, state: &SortitionState, credential: &SortitionCredential) -> bool;
}

/// Credentials derived from deterministic Ed25519 signatures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignatureSortition;

impl SignatureSortition {
    /// The message a provider signs for one replicate.
    pub fn input(seed: &Hash, round: Tick, replicate: u64) -> Hash {
        blake3::digest_fields(
            Domain::SortitionInput,
            &[seed, &round.to_le_bytes(), &replicate.to_le_bytes()],
        )
    }

    /// Produce the credential for one replicate. It wins only if its
    /// [`score`](Self::score) is at or below the round's cutoff.
    pub fn prove(key: &SigningKey, seed: &Hash, round: Tick, replicate: u64) -> SortitionCredential {
        let proof = key.sign(&Self::input(seed, round, replicate));
        SortitionCredential {
            replicate,
            proof: proof.to_bytes().to_vec(),
        }
    }

    /// Score of a proof, uniform below [`SORTITION_MODULUS`].
    pub fn score(proof: &[u8]) -> U256 {
        let digest = blake3::derive_key(Domain::SortitionScore, proof);
        let masked = U256::from_big_endian(&digest) & (U256::MAX >> 2usize);
        masked.checked_sub(SORTITION_MODULUS).unwrap_or(masked)
    }

    /// Every winning credential among the first `weight` replicates.
    pub fn winning_credentials(
        key: &SigningKey,
        seed: &Hash,
        round: Tick,
        weight: u64,
        cutoff: &U256,
    ) -> Vec<SortitionCredential> {
        (0..weight)
            .map(|replicate| Self::prove(key, seed, round, replicate))
            .filter(|c| Self::score(&c.proof) <= *cutoff)
            .collect()
    }
}

impl SortitionVerifier for SignatureSortition {
    fn verify(&self, state: &SortitionState, credential: &SortitionCredential) -> bool {
        if credential.replicate >= state.weight {
            return false;
        }
        let Ok(signature) = Signature::from_slice(&credential.proof) else {
            return false;
        };
        let input = Self::input(&state.base_seed, state.round, credential.replicate);
        if state.public_key.verify(&input, &signature).is_err() {
            tracing::debug!(round = state.round, "sortition proof signature invalid");
            return false;
        }
        Self::score(&credential.proof) <= state.score_cutoff
    }
}
