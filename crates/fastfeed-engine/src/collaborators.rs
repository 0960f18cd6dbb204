//! Interfaces to the host's collaborators.
//!
//! The engine owns its own state but reads three things from the host: the
//! feed configuration (which feed id lives at which index), the provider
//! registry (keys, weights, epochs and seeds) and an authoritative price
//! source for resets. All calls are synchronous and fail-fast.

use fastfeed_crypto::ed25519::VerifyingKey;
use fastfeed_store::PriceSnapshot;
use fastfeed_types::{FeedId, Hash, ProviderIdentity, Tick};

/// A provider's registration for one epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredProvider {
    /// Key the provider signs sortition proofs with.
    pub public_key: VerifyingKey,
    /// The provider's weight.
    pub weight: u64,
    /// Sum of all registered weights in the epoch.
    pub total_weight: u64,
}

/// Which feed lives at which store index.
pub trait FeedConfiguration {
    /// Feed id configured at `index`, if any.
    fn feed_id(&self, index: u32) -> Option<FeedId>;

    /// Every configured feed id, indexed by store position.
    fn feed_ids(&self) -> Vec<Option<FeedId>>;

    /// Number of configured feed slots.
    fn number_of_feeds(&self) -> usize;
}

/// Registered providers and per-epoch randomness.
pub trait ProviderRegistry {
    /// Registration of `identity` in `epoch`, if registered.
    fn public_key_and_normalized_weight(
        &self,
        epoch: u64,
        identity: &ProviderIdentity,
    ) -> Option<RegisteredProvider>;

    /// Epoch `round` belongs to.
    fn epoch_of(&self, round: Tick) -> u64;

    /// Sortition seed for `epoch`.
    fn seed_for_epoch(&self, epoch: u64) -> Hash;
}

/// Authoritative prices used to reset feeds.
pub trait PriceSource {
    /// Latest finalized price for `feed_id`, if any.
    fn current_feed(&self, feed_id: &FeedId) -> Option<PriceSnapshot>;

    /// Current voting round of the price source.
    fn current_voting_round(&self) -> u64;
}

/// Everything the engine needs from its host.
pub trait Host: FeedConfiguration + ProviderRegistry + PriceSource {}

impl<T: FeedConfiguration + ProviderRegistry + PriceSource> Host for T {}
