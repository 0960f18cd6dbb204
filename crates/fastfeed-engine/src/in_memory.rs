//! In-memory host.
//!
//! Implements every collaborator trait over plain maps so the engine can run
//! without a ledger. Registrations apply to every epoch; epochs are fixed
//! runs of `epoch_length` rounds.

use std::collections::HashMap;

use fastfeed_crypto::blake3::{self, Domain};
use fastfeed_crypto::ed25519::{derive_identity, VerifyingKey};
use fastfeed_store::PriceSnapshot;
use fastfeed_types::{FeedId, Hash, ProviderIdentity, Tick};

use crate::collaborators::{FeedConfiguration, PriceSource, ProviderRegistry, RegisteredProvider};

/// A host backed by in-memory tables.
#[derive(Clone, Debug)]
pub struct InMemoryHost {
    feeds: Vec<Option<FeedId>>,
    providers: HashMap<ProviderIdentity, (VerifyingKey, u64)>,
    prices: HashMap<FeedId, PriceSnapshot>,
    epoch_length: u64,
    voting_round: u64,
}

impl InMemoryHost {
    /// Create an empty host with epochs of `epoch_length` rounds.
    pub fn new(epoch_length: u64) -> Self {
        Self {
            feeds: Vec::new(),
            providers: HashMap::new(),
            prices: HashMap::new(),
            epoch_length: epoch_length.max(1),
            voting_round: 0,
        }
    }

    /// Append a feed slot and return its index.
    pub fn add_feed(&mut self, feed_id: FeedId) -> u32 {
        self.feeds.push(Some(feed_id));
        (self.feeds.len() - 1) as u32
    }

    /// Point `index` at a different feed id, growing the table if needed.
    pub fn set_feed(&mut self, index: u32, feed_id: Option<FeedId>) {
        let i = index as usize;
        if i >= self.feeds.len() {
            self.feeds.resize(i + 1, None);
        }
        self.feeds[i] = feed_id;
    }

    /// Register a provider key with `weight`. Returns its identity.
    pub fn register(&mut self, key: VerifyingKey, weight: u64) -> ProviderIdentity {
        let identity = ProviderIdentity(derive_identity(&key));
        self.providers.insert(identity, (key, weight));
        identity
    }

    /// Publish a price for `feed_id`.
    pub fn set_price(&mut self, feed_id: FeedId, value: i64, decimals: i8, voting_round: u64) {
        self.prices.insert(
            feed_id,
            PriceSnapshot {
                value,
                decimals,
                voting_round,
            },
        );
    }

    /// Move the price source to `round`.
    pub fn set_voting_round(&mut self, round: u64) {
        self.voting_round = round;
    }

    fn total_weight(&self) -> u64 {
        self.providers.values().map(|(_, w)| *w).sum()
    }
}

impl FeedConfiguration for InMemoryHost {
    fn feed_id(&self, index: u32) -> Option<FeedId> {
        self.feeds.get(index as usize).copied().flatten()
    }

    fn feed_ids(&self) -> Vec<Option<FeedId>> {
        self.feeds.clone()
    }

    fn number_of_feeds(&self) -> usize {
        self.feeds.len()
    }
}

impl ProviderRegistry for InMemoryHost {
    fn public_key_and_normalized_weight(
        &self,
        _epoch: u64,
        identity: &ProviderIdentity,
    ) -> Option<RegisteredProvider> {
        self.providers
            .get(identity)
            .map(|(key, weight)| RegisteredProvider {
                public_key: *key,
                weight: *weight,
                total_weight: self.total_weight(),
            })
    }

    fn epoch_of(&self, round: Tick) -> u64 {
        round / self.epoch_length
    }

    fn seed_for_epoch(&self, epoch: u64) -> Hash {
        blake3::derive_key(Domain::EpochSeed, &epoch.to_le_bytes())
    }
}

impl PriceSource for InMemoryHost {
    fn current_feed(&self, feed_id: &FeedId) -> Option<PriceSnapshot> {
        self.prices.get(feed_id).copied()
    }

    fn current_voting_round(&self) -> u64 {
        self.voting_round
    }
}
