//! Integration test crate for the fastfeed engine.
//!
//! The library holds the harness shared by the tests under `tests/`: a host
//! with named feeds and weighted providers, and a helper that draws a winning
//! sortition credential and signs a submission with it.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p fastfeed-integration-tests
//! ```
//!
//! Set `RUST_LOG=debug` to see the engine's admission decisions.

use fastfeed_crypto::ed25519::{derive_identity, KeyPair};
use fastfeed_engine::{
    EngineConfig, EngineError, FastUpdater, InMemoryHost, ProviderRegistry, Submission,
};
use fastfeed_sortition::{sortition_weight, SignatureSortition};
use fastfeed_store::{DeltaBatch, DeltaCode};
use fastfeed_types::{FeedId, ProviderIdentity, Tick};
use tracing_subscriber::EnvFilter;

/// The engine as the tests drive it.
pub type Updater = FastUpdater<InMemoryHost, SignatureSortition>;

/// Rounds per registry epoch in the test host.
pub const EPOCH_LENGTH: u64 = 50;

/// Decimals of every price the test host publishes.
pub const PRICE_DECIMALS: i8 = 4;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A deterministic provider key.
pub fn provider(seed: u8) -> KeyPair {
    KeyPair::from_bytes(&[seed; 32])
}

/// Identity the registry assigns to `keys`.
pub fn identity(keys: &KeyPair) -> ProviderIdentity {
    ProviderIdentity(derive_identity(&keys.verifying_key))
}

/// Price published for the `i`th feed of [`host`].
pub fn price(i: usize) -> i64 {
    1_000_000 * (i as i64 + 1)
}

/// A host with one feed per name (priced by [`price`] at voting round 0)
/// and the given providers registered.
pub fn host(feeds: &[&str], providers: &[(&KeyPair, u64)]) -> InMemoryHost {
    let mut host = InMemoryHost::new(EPOCH_LENGTH);
    for (i, name) in feeds.iter().enumerate() {
        if let Ok(id) = FeedId::new(1, name) {
            host.add_feed(id);
            host.set_price(id, price(i), PRICE_DECIMALS, 0);
        }
    }
    for (keys, weight) in providers {
        host.register(keys.verifying_key, *weight);
    }
    host
}

/// Start an engine over `host` with the bundled signature sortition.
pub fn updater(config: EngineConfig, host: InMemoryHost, start: Tick) -> Result<Updater, EngineError> {
    FastUpdater::new(config, host, SignatureSortition, start)
}

/// Sign a submission for `round` using the `nth` winning replicate of
/// `keys`. `None` if the provider is unregistered or has fewer wins.
pub fn winning_submission(
    updater: &Updater,
    keys: &KeyPair,
    round: Tick,
    nth: usize,
    codes: &[DeltaCode],
) -> Result<Option<Submission>, EngineError> {
    let host = updater.host();
    let epoch = host.epoch_of(round);
    let Some(registered) = host.public_key_and_normalized_weight(epoch, &identity(keys)) else {
        return Ok(None);
    };
    let weight = sortition_weight(registered.weight, registered.total_weight)?;
    let cutoff = updater.block_score_cutoff(round)?;
    let seed = host.seed_for_epoch(epoch);

    Ok(
        SignatureSortition::winning_credentials(&keys.signing_key, &seed, round, weight, &cutoff)
            .into_iter()
            .nth(nth)
            .map(|credential| {
                Submission::sign(&keys.signing_key, round, credential, DeltaBatch::from_codes(codes))
            }),
    )
}

/// A batch with `code` for feed `index` and no change elsewhere.
pub fn codes_for(index: usize, code: DeltaCode) -> Vec<DeltaCode> {
    let mut codes = vec![DeltaCode::None; index + 1];
    codes[index] = code;
    codes
}
