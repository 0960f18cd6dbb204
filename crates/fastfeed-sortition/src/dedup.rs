//! Per-round sets of accepted submission hashes.
//!
//! A replicate may submit at most once per round:
//!
//! ```text
//! hash = BLAKE3::derive_key("fastfeed v1 submission-dedup", public_key || round || replicate)
//! ```
//!
//! Sets are keyed by round and dropped once the round falls out of the
//! retention horizon.

use std::collections::{BTreeMap, HashSet};

use fastfeed_crypto::blake3::{self, Domain};
use fastfeed_crypto::ed25519::VerifyingKey;
use fastfeed_types::{Hash, Tick};
use serde::{Deserialize, Serialize};

/// Dedup hash of one replicate's submission for one round.
pub fn submission_hash(public_key: &VerifyingKey, round: Tick, replicate: u64) -> Hash {
    blake3::digest_fields(
        Domain::SubmissionDedup,
        &[public_key.as_bytes(), &round.to_le_bytes(), &replicate.to_le_bytes()],
    )
}

/// Accepted submission hashes, grouped by round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupSet {
    rounds: BTreeMap<Tick, HashSet<Hash>>,
}

impl DedupSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `hash` was already accepted for `round`.
    pub fn contains(&self, round: Tick, hash: &Hash) -> bool {
        self.rounds.get(&round).is_some_and(|set| set.contains(hash))
    }

    /// Record `hash` for `round`. Returns `false` if it was already present.
    pub fn insert(&mut self, round: Tick, hash: Hash) -> bool {
        self.rounds.entry(round).or_default().insert(hash)
    }

    /// Number of hashes accepted for `round`.
    pub fn round_len(&self, round: Tick) -> usize {
        self.rounds.get(&round).map_or(0, HashSet::len)
    }

    /// Number of rounds with at least one accepted hash.
    pub fn retained_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Drop every round before `oldest_retained`. Returns how many rounds
    /// were dropped.
    pub fn prune_before(&mut self, oldest_retained: Tick) -> usize {
        let kept = self.rounds.split_off(&oldest_retained);
        let dropped = self.rounds.len();
        self.rounds = kept;
        if dropped > 0 {
            tracing::trace!(dropped, oldest_retained, "pruned dedup rounds");
        }
        dropped
    }
}
