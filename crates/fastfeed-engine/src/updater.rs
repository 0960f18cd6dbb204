//! The fast-update engine facade.
//!
//! [`FastUpdater`] owns every piece of protocol state in one [`CoreState`]
//! and exposes the operations the host calls: submissions, the per-round
//! tick, reads, incentive offers and governance.
//!
//! ## Tick order
//!
//! 1. Merge the pending backlog at the scale in force
//! 2. Advance the current tick
//! 3. Expire incentives booked `duration` ticks ago
//! 4. Rescale every feed to the base scale if the epoch changed
//! 5. Recompute the scale
//! 6. Record the cutoff for the round now opening
//! 7. Prune dedup sets past the retention horizon
//! 8. Open the round's submission counter
//!
//! Multi-step operations run through [`atomically`]; submissions run every
//! check before their first write.

use fastfeed_fpa::{Fee, Precision, Range, SampleSize, Scale, U256};
use fastfeed_incentive::{IncentiveMarket, IncentiveOffer, OfferReceipt};
use fastfeed_sortition::{
    score_cutoff, sortition_weight, submission_hash, CutoffHistory, DedupSet, SortitionState,
    SortitionVerifier,
};
use fastfeed_store::{
    merge_backlog, rescale_all, reset_feed, DeltaBacklog, Feed, FeedStore, MergeReport, StoreError,
};
use fastfeed_types::{FeedId, Hash, ProviderIdentity, Tick, DEDUP_RETENTION_MARGIN};
use serde::{Deserialize, Serialize};

use crate::atomic::atomically;
use crate::collaborators::Host;
use crate::config::{check_submission_window, EngineConfig};
use crate::history::UpdateHistory;
use crate::submission::Submission;
use crate::{EngineError, Result};

/// All mutable protocol state. Serializable so a host can persist it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreState {
    current_tick: Tick,
    timestamp: u64,
    epoch: u64,
    submission_window: u64,
    scale: Scale,
    store: FeedStore,
    feed_ids: Vec<Option<FeedId>>,
    backlog: DeltaBacklog,
    market: IncentiveMarket,
    cutoffs: CutoffHistory,
    dedup: DedupSet,
    history: UpdateHistory,
}

impl CoreState {
    /// The packed feed store.
    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    /// The pending delta backlog.
    pub fn backlog(&self) -> &DeltaBacklog {
        &self.backlog
    }

    /// The incentive market.
    pub fn market(&self) -> &IncentiveMarket {
        &self.market
    }

    /// Accepted submission hashes by round.
    pub fn dedup(&self) -> &DedupSet {
        &self.dedup
    }

    /// Feed id recorded at each index by its last reset.
    pub fn feed_ids(&self) -> &[Option<FeedId>] {
        &self.feed_ids
    }
}

/// Outcome of an accepted submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Round the submission targeted.
    pub round: Tick,
    /// Replicate that won.
    pub replicate: u64,
    /// Identity of the signer.
    pub identity: ProviderIdentity,
    /// Backlog sequence number of the delta batch.
    pub sequence: u64,
    /// Tick the submission arrived in.
    pub tick: Tick,
}

/// Outcome of one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// The new current tick.
    pub round: Tick,
    /// What the backlog merge did.
    pub merged: MergeReport,
    /// Cutoff recorded for the round.
    pub cutoff: U256,
    /// Scale in force until the next tick.
    pub scale: Scale,
    /// Feeds rescaled by an epoch change, if one happened.
    pub rescaled: Option<usize>,
}

/// Feed values as read by [`FastUpdater::fetch_current_feeds`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    /// Magnitudes, in request order.
    pub values: Vec<u32>,
    /// Decimals, in request order.
    pub decimals: Vec<i8>,
    /// Timestamp of the current tick.
    pub timestamp: u64,
}

/// A submission that passed every check, ready to commit.
struct Admission {
    identity: ProviderIdentity,
    hash: Hash,
}

/// The fast-update engine.
pub struct FastUpdater<H, V> {
    config: EngineConfig,
    host: H,
    verifier: V,
    state: CoreState,
}

impl<H: Host, V: SortitionVerifier> FastUpdater<H, V> {
    /// Start an engine at `start_tick`, with the cutoff for that round
    /// already recorded.
    ///
    /// # Errors
    ///
    /// Any error from [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, host: H, verifier: V, start_tick: Tick) -> Result<Self> {
        config.validate()?;
        let market = IncentiveMarket::new(
            config.incentive.sample_size()?,
            config.incentive.range()?,
            config.incentive.duration,
            config.incentive.increase_limit()?,
            config.incentive.price(),
        )?;
        let scale = market.scale()?;
        let mut cutoffs = CutoffHistory::new(config.window.submission_window);
        cutoffs.record(start_tick, score_cutoff(market.expected_sample_size()));
        let mut history = UpdateHistory::default();
        history.open(start_tick);
        let feeds = host.number_of_feeds();

        let state = CoreState {
            current_tick: start_tick,
            timestamp: 0,
            epoch: host.epoch_of(start_tick),
            submission_window: config.window.submission_window,
            scale,
            store: FeedStore::new(feeds),
            feed_ids: vec![None; feeds],
            backlog: DeltaBacklog::with_capacity(config.feeds.backlog_capacity),
            market,
            cutoffs,
            dedup: DedupSet::new(),
            history,
        };
        tracing::info!(start_tick, feeds, "fast updater started");
        Ok(Self {
            config,
            host,
            verifier,
            state,
        })
    }

    /// Resume from a persisted state.
    pub fn from_state(config: EngineConfig, host: H, verifier: V, state: CoreState) -> Self {
        Self {
            config,
            host,
            verifier,
            state,
        }
    }

    /// Check a submission and, if it passes, queue its delta batch.
    ///
    /// # Errors
    ///
    /// Every [`crate::FaultKind::Admission`] error, plus
    /// [`StoreError::BacklogFull`] if the backlog holds no free slot.
    pub fn submit_updates(&mut self, submission: &Submission) -> Result<SubmissionReceipt> {
        let admission = match self.admit(submission) {
            Ok(admission) => admission,
            Err(e) => {
                tracing::debug!(
                    round = submission.round,
                    replicate = submission.credential.replicate,
                    error = %e,
                    "submission rejected"
                );
                return Err(e);
            }
        };

        let state = &mut self.state;
        state.dedup.insert(submission.round, admission.hash);
        let sequence = state.backlog.push(submission.deltas.clone())?;
        state.history.record(state.current_tick);

        tracing::debug!(
            round = submission.round,
            replicate = submission.credential.replicate,
            identity = %hex::encode(&admission.identity.0[..8]),
            sequence,
            "submission accepted"
        );
        Ok(SubmissionReceipt {
            round: submission.round,
            replicate: submission.credential.replicate,
            identity: admission.identity,
            sequence,
            tick: state.current_tick,
        })
    }

    fn admit(&self, submission: &Submission) -> Result<Admission> {
        let state = &self.state;
        let current = state.current_tick;
        let round = submission.round;
        let window = state.submission_window;

        if current < round {
            return Err(EngineError::WindowNotOpen { round, current });
        }
        if current >= round.saturating_add(window) {
            return Err(EngineError::WindowClosed {
                round,
                current,
                window,
            });
        }

        let feeds = self.host.number_of_feeds();
        if submission.deltas.byte_len().saturating_mul(4) > feeds.saturating_mul(8) {
            return Err(EngineError::OversizedBatch {
                bytes: submission.deltas.byte_len(),
                feeds,
            });
        }

        let identity = submission.verify_signature()?;
        let epoch = self.host.epoch_of(round);
        let provider = self
            .host
            .public_key_and_normalized_weight(epoch, &identity)
            .ok_or(EngineError::UnregisteredProvider { identity, epoch })?;
        let weight = sortition_weight(provider.weight, provider.total_weight)?;

        let replicate = submission.credential.replicate;
        let hash = submission_hash(&provider.public_key, round, replicate);
        if state.dedup.contains(round, &hash) {
            return Err(EngineError::DuplicateSubmission { round, replicate });
        }

        let score_cutoff = state.cutoffs.require(round)?;
        if replicate >= weight {
            return Err(EngineError::ReplicateOutOfRange { replicate, weight });
        }
        let sortition = SortitionState {
            base_seed: self.host.seed_for_epoch(epoch),
            round,
            score_cutoff,
            weight,
            public_key: provider.public_key,
        };
        if !self.verifier.verify(&sortition, &submission.credential) {
            return Err(EngineError::InvalidSortitionProof);
        }

        if state.backlog.is_full() {
            tracing::warn!(
                capacity = state.backlog.capacity(),
                "backlog full of unmerged batches"
            );
            return Err(StoreError::BacklogFull {
                capacity: state.backlog.capacity(),
            }
            .into());
        }

        Ok(Admission { identity, hash })
    }

    /// Close the current tick and open `round`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TickOutOfOrder`] unless `round` is the current tick
    ///   plus one
    /// - Any incentive or store error from the steps listed in the module
    ///   docs; the state is then unchanged
    pub fn tick(&mut self, round: Tick, timestamp: u64) -> Result<TickReport> {
        let expected = self.state.current_tick.saturating_add(1);
        if round != expected {
            tracing::warn!(expected, got = round, "tick out of order");
            return Err(EngineError::TickOutOfOrder {
                expected,
                got: round,
            });
        }

        let host = &self.host;
        let report = atomically(&mut self.state, |s| {
            let merged = merge_backlog(&mut s.store, &mut s.backlog, s.scale)?;
            s.current_tick = round;
            s.timestamp = timestamp;
            s.market.tick()?;
            sync_feed_count(s, host);

            let epoch = host.epoch_of(round);
            let rescaled = if epoch != s.epoch {
                s.epoch = epoch;
                Some(rescale_all(&mut s.store, s.market.base_scale()?)?)
            } else {
                None
            };

            s.scale = s.market.scale()?;
            let cutoff = score_cutoff(s.market.expected_sample_size());
            s.cutoffs.record(round, cutoff);
            s.dedup
                .prune_before(round.saturating_sub(s.submission_window + DEDUP_RETENTION_MARGIN));
            s.history.open(round);

            Ok::<_, EngineError>(TickReport {
                round,
                merged,
                cutoff,
                scale: s.scale,
                rescaled,
            })
        })?;

        tracing::info!(
            round,
            merged_batches = report.merged.batches,
            adjustments = report.merged.adjustments,
            scale = report.scale.to_f64(),
            rescaled = report.rescaled,
            "tick"
        );
        Ok(report)
    }

    /// Merge the pending backlog, then read `indices`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfRange`] for an unknown index; nothing is
    ///   merged in that case
    /// - [`StoreError::MagnitudeOverflow`] if a pending delta cannot be
    ///   merged; the backlog stays pending
    pub fn fetch_current_feeds(&mut self, indices: &[u32]) -> Result<FeedSnapshot> {
        for &index in indices {
            self.state.store.get(index)?;
        }
        merge_backlog(&mut self.state.store, &mut self.state.backlog, self.state.scale)?;
        let feeds = self.state.store.get_many(indices)?;
        Ok(FeedSnapshot {
            values: feeds.iter().map(|f| f.magnitude).collect(),
            decimals: feeds.iter().map(|f| f.decimals).collect(),
            timestamp: self.state.timestamp,
        })
    }

    /// Buy a temporary range and sample-size increase. The new scale takes
    /// effect at the next tick.
    ///
    /// The market checks the whole offer before booking it, so a rejected
    /// offer leaves the state untouched.
    pub fn offer_incentive(&mut self, offer: &IncentiveOffer) -> Result<OfferReceipt> {
        Ok(self.state.market.request_increase(offer)?)
    }

    /// Reset `indices` from the price source, normalized to the base scale.
    /// Pending deltas are merged into the old values first.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UnconfiguredFeed`] if an index has no feed id or no
    ///   price
    /// - [`EngineError::FeedIdCollision`] if the id is already stored at
    ///   another index
    /// - [`StoreError::StaleSnapshot`] or [`StoreError::NonPositiveValue`]
    ///   for an unusable price
    pub fn reset_feeds(&mut self, indices: &[u32]) -> Result<Vec<Feed>> {
        let host = &self.host;
        let max_age = self.config.feeds.max_feed_age_rounds;
        let feeds = atomically(&mut self.state, |s| {
            merge_backlog(&mut s.store, &mut s.backlog, s.scale)?;
            sync_feed_count(s, host);
            let base_scale = s.market.base_scale()?;
            let voting_round = host.current_voting_round();

            let mut feeds = Vec::with_capacity(indices.len());
            for &index in indices {
                let feed_id = host
                    .feed_id(index)
                    .ok_or(EngineError::UnconfiguredFeed { index })?;
                if let Some(existing) = s
                    .feed_ids
                    .iter()
                    .position(|id| *id == Some(feed_id))
                    .filter(|&j| j != index as usize)
                {
                    return Err(EngineError::FeedIdCollision {
                        feed_id,
                        index,
                        existing: existing as u32,
                    });
                }
                let snapshot = host
                    .current_feed(&feed_id)
                    .ok_or(EngineError::UnconfiguredFeed { index })?;
                let feed = reset_feed(&mut s.store, index, &snapshot, voting_round, max_age, base_scale)?;
                s.feed_ids[index as usize] = Some(feed_id);
                feeds.push(feed);
            }
            Ok(feeds)
        })?;
        tracing::info!(count = feeds.len(), "feeds reset");
        Ok(feeds)
    }

    /// Zero `indices` and forget their feed ids.
    pub fn remove_feeds(&mut self, indices: &[u32]) -> Result<()> {
        atomically(&mut self.state, |s| {
            for &index in indices {
                s.store.clear(index)?;
                if let Some(id) = s.feed_ids.get_mut(index as usize) {
                    *id = None;
                }
            }
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(count = indices.len(), "feeds removed");
        Ok(())
    }

    /// Indices where the host's feed configuration and the stored feed ids
    /// disagree: feeds added or moved since their last
    /// [`reset_feeds`](Self::reset_feeds), and feeds dropped from the
    /// configuration but not yet passed to [`remove_feeds`](Self::remove_feeds).
    pub fn feed_changes(&self) -> Vec<u32> {
        let configured = self.host.feed_ids();
        let stored = &self.state.feed_ids;
        (0..configured.len().max(stored.len()))
            .filter(|&i| configured.get(i).copied().flatten() != stored.get(i).copied().flatten())
            .map(|i| i as u32)
            .collect()
    }

    /// Renormalize every stored feed to the base scale.
    pub fn rescale_all(&mut self) -> Result<usize> {
        atomically(&mut self.state, |s| {
            Ok(rescale_all(&mut s.store, s.market.base_scale()?)?)
        })
    }

    /// Change the submission window, keeping retained cutoffs that fit.
    ///
    /// Widening does not reopen rounds whose cutoff was already dropped:
    /// submissions for them fail with
    /// [`fastfeed_sortition::SortitionError::CutoffUnavailable`],
    /// an admission fault.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SubmissionWindowOutOfRange`] outside `1..=100`
    pub fn set_submission_window(&mut self, window: u64) -> Result<()> {
        check_submission_window(window)?;
        self.state.cutoffs.resize(window);
        self.state.submission_window = window;
        tracing::info!(window, "submission window set");
        Ok(())
    }

    /// Set the largest sample-size increase one offer can buy.
    pub fn set_sample_increase_limit(&mut self, limit: SampleSize) {
        self.state.market.set_sample_increase_limit(limit);
    }

    /// Set the price of one unit of range.
    pub fn set_range_increase_price(&mut self, price: Fee) {
        self.state.market.set_range_increase_price(price);
    }

    /// Replace the base incentive parameters, discarding in-flight
    /// incentives.
    pub fn set_incentive_parameters(
        &mut self,
        sample_size: SampleSize,
        range: Range,
        duration: usize,
    ) -> Result<()> {
        Ok(self
            .state
            .market
            .set_incentive_parameters(sample_size, range, duration)?)
    }

    /// Cutoff of the round opened by the current tick.
    pub fn current_score_cutoff(&self) -> Result<U256> {
        self.block_score_cutoff(self.state.current_tick)
    }

    /// Cutoff of the round opened at `tick`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::CutoffOutsideWindow`] if `tick` is in the future or
    ///   older than the submission window
    pub fn block_score_cutoff(&self, tick: Tick) -> Result<U256> {
        let current = self.state.current_tick;
        let outside = EngineError::CutoffOutsideWindow { tick, current };
        if tick > current || current - tick > self.state.submission_window {
            return Err(outside);
        }
        self.state.cutoffs.get(tick).ok_or(outside)
    }

    /// Accepted submissions in each of the last `window_size` ticks, newest
    /// first.
    ///
    /// # Errors
    ///
    /// - [`EngineError::HistoryWindowTooLarge`] above 100 ticks
    pub fn number_of_updates(&self, window_size: u64) -> Result<Vec<u64>> {
        let max = self.state.history.capacity();
        if window_size > max {
            return Err(EngineError::HistoryWindowTooLarge {
                requested: window_size,
                max,
            });
        }
        Ok(self.state.history.recent(self.state.current_tick, window_size))
    }

    /// Accepted submissions that arrived in `tick`.
    pub fn number_of_updates_in_tick(&self, tick: Tick) -> Result<u64> {
        let max = self.state.history.capacity();
        let current = self.state.current_tick;
        if tick > current || current - tick >= max {
            return Err(EngineError::HistoryWindowTooLarge {
                requested: current.abs_diff(tick) + 1,
                max,
            });
        }
        Ok(self.state.history.count(tick))
    }

    /// Live expected sample size.
    pub fn expected_sample_size(&self) -> SampleSize {
        self.state.market.expected_sample_size()
    }

    /// Live range.
    pub fn range(&self) -> Range {
        self.state.market.range()
    }

    /// Live `range / sample_size`.
    pub fn precision(&self) -> Result<Precision> {
        Ok(self.state.market.precision()?)
    }

    /// Scale used by the next merge.
    pub fn scale(&self) -> Scale {
        self.state.scale
    }

    /// Scale from the base parameters alone.
    pub fn base_scale(&self) -> Result<Scale> {
        Ok(self.state.market.base_scale()?)
    }

    /// Live excess offer pool.
    pub fn excess_offer_value(&self) -> Fee {
        self.state.market.excess_offer_value()
    }

    /// Current tick.
    pub fn current_tick(&self) -> Tick {
        self.state.current_tick
    }

    /// Timestamp passed to the last tick.
    pub fn timestamp(&self) -> u64 {
        self.state.timestamp
    }

    /// Unmerged delta batches.
    pub fn pending_batches(&self) -> usize {
        self.state.backlog.pending_len()
    }

    /// Submission window in ticks.
    pub fn submission_window(&self) -> u64 {
        self.state.submission_window
    }

    /// Feeds the store can address.
    pub fn number_of_feeds(&self) -> usize {
        self.state.store.len()
    }

    /// The full protocol state.
    pub fn state(&self) -> &CoreState {
        &self.state
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably. Configuration changes are picked up at the next
    /// tick or reset.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

/// Grow the store to the host's feed count.
fn sync_feed_count<H: Host>(state: &mut CoreState, host: &H) {
    let feeds = host.number_of_feeds();
    state.store.ensure_len(feeds);
    if state.feed_ids.len() < feeds {
        state.feed_ids.resize(feeds, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FeedConfiguration;
    use crate::in_memory::InMemoryHost;
    use fastfeed_crypto::ed25519::KeyPair;
    use fastfeed_sortition::SortitionCredential;
    use fastfeed_store::{DeltaBatch, DeltaCode};

    /// Accepts every credential whose replicate is below the weight.
    struct AcceptAll;

    impl SortitionVerifier for AcceptAll {
        fn verify(&self, state: &SortitionState, credential: &SortitionCredential) -> bool {
            credential.replicate < state.weight
        }
    }

    /// Rejects every credential.
    struct RejectAll;

    impl SortitionVerifier for RejectAll {
        fn verify(&self, _: &SortitionState, _: &SortitionCredential) -> bool {
            false
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::from_toml_str(
            r#"
            [window]
            submission_window = 4

            [incentive]
            base_sample_size = 100
            base_range = 10
            duration = 3
            sample_increase_limit = 50
            range_increase_price = 100

            [feeds]
            backlog_capacity = 3
            "#,
        )
        .expect("valid config")
    }

    fn host_with_feeds(n: u8) -> InMemoryHost {
        let mut host = InMemoryHost::new(1000);
        for i in 0..n {
            let id = FeedId::new(1, &format!("F{i}/USD")).expect("short name");
            host.add_feed(id);
            host.set_price(id, 1_000_000 + i64::from(i), 4, 0);
        }
        host
    }

    fn engine<V: SortitionVerifier>(verifier: V) -> (FastUpdater<InMemoryHost, V>, KeyPair) {
        let mut host = host_with_feeds(4);
        let kp = KeyPair::from_bytes(&[1u8; 32]);
        host.register(kp.verifying_key, 500);
        host.register(KeyPair::from_bytes(&[2u8; 32]).verifying_key, 500);
        let updater = FastUpdater::new(config(), host, verifier, 0).expect("engine");
        (updater, kp)
    }

    fn submission(kp: &KeyPair, round: Tick, replicate: u64, codes: &[DeltaCode]) -> Submission {
        let credential = SortitionCredential {
            replicate,
            proof: Vec::new(),
        };
        Submission::sign(&kp.signing_key, round, credential, DeltaBatch::from_codes(codes))
    }

    #[test]
    fn test_tick_must_advance_by_one() {
        let (mut u, _) = engine(AcceptAll);
        assert_eq!(
            u.tick(2, 0),
            Err(EngineError::TickOutOfOrder {
                expected: 1,
                got: 2
            })
        );
        u.tick(1, 10).expect("next round");
        assert_eq!(u.current_tick(), 1);
        assert_eq!(u.timestamp(), 10);
        assert!(u.tick(1, 20).is_err());
    }

    #[test]
    fn test_window_boundaries() {
        let (mut u, kp) = engine(AcceptAll);
        for t in 1..=3 {
            u.tick(t, t).expect("tick");
        }
        // Round 3 is open at tick 3; round 4 is not yet open.
        assert!(matches!(
            u.submit_updates(&submission(&kp, 4, 0, &[DeltaCode::Multiply])),
            Err(EngineError::WindowNotOpen { round: 4, current: 3 })
        ));
        u.submit_updates(&submission(&kp, 3, 0, &[DeltaCode::Multiply]))
            .expect("open");
        // Round 0 was open for ticks 0..=3.
        u.submit_updates(&submission(&kp, 0, 0, &[DeltaCode::Multiply]))
            .expect("last open tick");
        u.tick(4, 4).expect("tick");
        assert!(matches!(
            u.submit_updates(&submission(&kp, 0, 1, &[DeltaCode::Multiply])),
            Err(EngineError::WindowClosed { round: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_rejected_without_effect() {
        let (mut u, kp) = engine(AcceptAll);
        let s = submission(&kp, 0, 7, &[DeltaCode::Multiply]);
        u.submit_updates(&s).expect("first");
        let before = u.state().clone();
        let err = u.submit_updates(&s).expect_err("duplicate");
        assert_eq!(
            err,
            EngineError::DuplicateSubmission {
                round: 0,
                replicate: 7
            }
        );
        assert_eq!(u.state(), &before);
        // Another replicate of the same provider is independent.
        u.submit_updates(&submission(&kp, 0, 8, &[DeltaCode::Multiply]))
            .expect("other replicate");
    }

    #[test]
    fn test_duplicate_ignores_batch_contents() {
        let (mut u, kp) = engine(AcceptAll);
        u.submit_updates(&submission(&kp, 0, 7, &[DeltaCode::Multiply]))
            .expect("first");
        let pending = u.pending_batches();
        let resigned = submission(&kp, 0, 7, &[DeltaCode::None, DeltaCode::Divide]);
        assert_eq!(
            u.submit_updates(&resigned),
            Err(EngineError::DuplicateSubmission {
                round: 0,
                replicate: 7
            })
        );
        assert_eq!(u.pending_batches(), pending);
    }

    #[test]
    fn test_oversized_batch() {
        let (mut u, kp) = engine(AcceptAll);
        // Four feeds allow eight bytes of codes.
        let codes = vec![DeltaCode::Multiply; 36];
        assert!(matches!(
            u.submit_updates(&submission(&kp, 0, 0, &codes)),
            Err(EngineError::OversizedBatch { bytes: 9, feeds: 4 })
        ));
        let codes = vec![DeltaCode::Multiply; 32];
        u.submit_updates(&submission(&kp, 0, 0, &codes))
            .expect("eight bytes fit");
    }

    #[test]
    fn test_unregistered_and_bad_signature() {
        let (mut u, _) = engine(AcceptAll);
        let stranger = KeyPair::from_bytes(&[9u8; 32]);
        let err = u
            .submit_updates(&submission(&stranger, 0, 0, &[]))
            .expect_err("unregistered");
        assert!(matches!(err, EngineError::UnregisteredProvider { epoch: 0, .. }));

        let (mut u, kp) = engine(AcceptAll);
        let mut s = submission(&kp, 0, 0, &[DeltaCode::Divide]);
        s.deltas = DeltaBatch::from_codes(&[DeltaCode::Multiply]);
        assert_eq!(u.submit_updates(&s), Err(EngineError::InvalidSignature));
    }

    #[test]
    fn test_replicate_and_proof_checks() {
        let (mut u, kp) = engine(AcceptAll);
        // 500 of 1000 weight is 2048 replicates.
        assert_eq!(
            u.submit_updates(&submission(&kp, 0, 2048, &[])),
            Err(EngineError::ReplicateOutOfRange {
                replicate: 2048,
                weight: 2048
            })
        );

        let (mut u, kp) = engine(RejectAll);
        assert_eq!(
            u.submit_updates(&submission(&kp, 0, 0, &[])),
            Err(EngineError::InvalidSortitionProof)
        );
    }

    #[test]
    fn test_backlog_full() {
        let (mut u, kp) = engine(AcceptAll);
        for replicate in 0..3 {
            u.submit_updates(&submission(&kp, 0, replicate, &[DeltaCode::Multiply]))
                .expect("room");
        }
        let err = u
            .submit_updates(&submission(&kp, 0, 3, &[DeltaCode::Multiply]))
            .expect_err("full");
        assert_eq!(err.kind(), crate::FaultKind::Capacity);
        assert!(!u.state().dedup().contains(
            0,
            &submission_hash(&kp.verifying_key, 0, 3)
        ));
        u.tick(1, 1).expect("tick merges");
        assert_eq!(u.pending_batches(), 0);
    }

    #[test]
    fn test_submission_merged_at_tick() {
        let (mut u, kp) = engine(AcceptAll);
        u.reset_feeds(&[0, 1]).expect("reset");
        let before = u.fetch_current_feeds(&[0, 1]).expect("read");

        u.submit_updates(&submission(&kp, 0, 0, &[DeltaCode::Multiply, DeltaCode::Divide]))
            .expect("accepted");
        assert_eq!(u.pending_batches(), 1);
        let report = u.tick(1, 1).expect("tick");
        assert_eq!(report.merged.batches, 1);
        assert_eq!(report.merged.adjustments, 2);

        let after = u.fetch_current_feeds(&[0, 1]).expect("read");
        assert!(after.values[0] > before.values[0]);
        assert!(after.values[1] < before.values[1]);
        assert_eq!(after.timestamp, 1);
    }

    #[test]
    fn test_fetch_merges_pending() {
        let (mut u, kp) = engine(AcceptAll);
        u.reset_feeds(&[0]).expect("reset");
        let before = u.state().store().get(0).expect("in range");
        u.submit_updates(&submission(&kp, 0, 0, &[DeltaCode::Multiply]))
            .expect("accepted");
        let read = u.fetch_current_feeds(&[0]).expect("read");
        assert!(read.values[0] > before.magnitude);
        assert_eq!(u.pending_batches(), 0);
        assert!(u.fetch_current_feeds(&[0, 99]).is_err());
    }

    #[test]
    fn test_reset_feeds_errors() {
        let (mut u, _) = engine(AcceptAll);
        assert_eq!(
            u.reset_feeds(&[0, 9]),
            Err(EngineError::UnconfiguredFeed { index: 9 })
        );
        // Nothing from the failed batch was committed.
        assert!(u.state().store().get(0).expect("in range").is_empty());

        u.reset_feeds(&[0]).expect("reset");
        let id = u.host().feed_id(0).expect("configured");
        u.host_mut().set_feed(2, Some(id));
        assert!(matches!(
            u.reset_feeds(&[2]),
            Err(EngineError::FeedIdCollision {
                index: 2,
                existing: 0,
                ..
            })
        ));

        u.host_mut().set_voting_round(100);
        assert!(matches!(
            u.reset_feeds(&[1]),
            Err(EngineError::Store(StoreError::StaleSnapshot { .. }))
        ));
    }

    #[test]
    fn test_remove_feeds() {
        let (mut u, _) = engine(AcceptAll);
        u.reset_feeds(&[0, 1]).expect("reset");
        u.remove_feeds(&[1]).expect("remove");
        assert!(u.state().store().get(1).expect("in range").is_empty());
        assert_eq!(u.state().feed_ids()[1], None);
        assert!(u.remove_feeds(&[0, 50]).is_err());
        assert!(!u.state().store().get(0).expect("in range").is_empty());
    }

    #[test]
    fn test_offer_takes_effect_next_tick() {
        let (mut u, _) = engine(AcceptAll);
        // 15 / 200 after the offer, down from 10 / 100.
        u.set_sample_increase_limit(SampleSize::from_int(100).expect("in range"));
        let scale = u.scale();
        let offer = IncentiveOffer {
            payment: Fee::from_raw(1000),
            range_increase: Range::from_int(5).expect("in range"),
            range_limit: Range::from_int(1000).expect("in range"),
        };
        let receipt = u.offer_incentive(&offer).expect("accepted");
        assert_eq!(receipt.range_cost, Fee::from_raw(500));
        assert_eq!(u.range(), Range::from_int(15).expect("in range"));
        assert_eq!(u.expected_sample_size(), SampleSize::from_int(200).expect("in range"));
        assert_eq!(u.scale(), scale);

        let report = u.tick(1, 1).expect("tick");
        assert!(report.scale < scale);
        assert_eq!(report.scale, u.scale());
        assert!(report.cutoff > u.block_score_cutoff(0).expect("retained"));
    }

    #[test]
    fn test_offer_with_unchanged_precision_keeps_scale() {
        // The default limit of 50 moves 10 / 100 to 15 / 150.
        let (mut u, _) = engine(AcceptAll);
        let scale = u.scale();
        let offer = IncentiveOffer {
            payment: Fee::from_raw(1000),
            range_increase: Range::from_int(5).expect("in range"),
            range_limit: Range::from_int(1000).expect("in range"),
        };
        u.offer_incentive(&offer).expect("accepted");
        assert_eq!(u.expected_sample_size(), SampleSize::from_int(150).expect("in range"));
        let report = u.tick(1, 1).expect("tick");
        assert_eq!(report.scale, scale);
        assert_eq!(report.cutoff, score_cutoff(u.expected_sample_size()));
    }

    #[test]
    fn test_failed_offer_has_no_effect() {
        let (mut u, _) = engine(AcceptAll);
        let before = u.state().clone();
        let offer = IncentiveOffer {
            payment: Fee::from_raw(10),
            range_increase: Range::from_int(5).expect("in range"),
            range_limit: Range::from_int(1000).expect("in range"),
        };
        assert!(u.offer_incentive(&offer).is_err());
        assert_eq!(u.state(), &before);
    }

    #[test]
    fn test_cutoff_introspection() {
        let (mut u, _) = engine(AcceptAll);
        for t in 1..=6 {
            u.tick(t, t).expect("tick");
        }
        assert_eq!(
            u.current_score_cutoff().expect("current"),
            score_cutoff(u.expected_sample_size())
        );
        assert!(u.block_score_cutoff(2).is_ok());
        assert_eq!(
            u.block_score_cutoff(1),
            Err(EngineError::CutoffOutsideWindow {
                tick: 1,
                current: 6
            })
        );
        assert!(u.block_score_cutoff(7).is_err());
    }

    #[test]
    fn test_update_counts() {
        let (mut u, kp) = engine(AcceptAll);
        u.submit_updates(&submission(&kp, 0, 0, &[])).expect("accepted");
        u.tick(1, 1).expect("tick");
        u.submit_updates(&submission(&kp, 0, 1, &[])).expect("accepted");
        u.submit_updates(&submission(&kp, 1, 0, &[])).expect("accepted");
        assert_eq!(u.number_of_updates(2).expect("in range"), vec![2, 1]);
        assert_eq!(u.number_of_updates_in_tick(0).expect("retained"), 1);
        assert!(matches!(
            u.number_of_updates(101),
            Err(EngineError::HistoryWindowTooLarge { requested: 101, max: 100 })
        ));
    }

    #[test]
    fn test_set_submission_window() {
        let (mut u, _) = engine(AcceptAll);
        assert!(u.set_submission_window(0).is_err());
        assert!(u.set_submission_window(101).is_err());
        u.set_submission_window(8).expect("valid");
        assert_eq!(u.submission_window(), 8);
        assert!(u.current_score_cutoff().is_ok());
    }

    #[test]
    fn test_widened_window_does_not_reopen_dropped_rounds() {
        let (mut u, kp) = engine(AcceptAll);
        for t in 1..=10 {
            u.tick(t, t).expect("tick");
        }
        u.set_submission_window(10).expect("valid");

        let before = u.state().clone();
        let err = u
            .submit_updates(&submission(&kp, 3, 0, &[]))
            .expect_err("cutoff for round 3 was dropped");
        assert_eq!(
            err,
            EngineError::Sortition(fastfeed_sortition::SortitionError::CutoffUnavailable {
                tick: 3
            })
        );
        assert_eq!(err.kind(), crate::FaultKind::Admission);
        assert_eq!(u.state(), &before);

        // Round 6 was still inside the old window.
        u.submit_updates(&submission(&kp, 6, 0, &[])).expect("retained");
    }

    #[test]
    fn test_feed_changes() {
        let (mut u, _) = engine(AcceptAll);
        assert_eq!(u.feed_changes(), vec![0, 1, 2, 3]);
        u.reset_feeds(&[0, 1]).expect("reset");
        assert_eq!(u.feed_changes(), vec![2, 3]);

        u.host_mut().set_feed(0, None);
        assert_eq!(u.feed_changes(), vec![0, 2, 3]);
        u.remove_feeds(&[0]).expect("remove");
        assert_eq!(u.feed_changes(), vec![2, 3]);
    }

    #[test]
    fn test_incentive_parameters_validated() {
        let (mut u, _) = engine(AcceptAll);
        let sample = SampleSize::from_int(10).expect("in range");
        let before = u.state().clone();
        let err = u
            .set_incentive_parameters(sample, Range::from_int(10).expect("in range"), 3)
            .expect_err("range not below sample");
        assert_eq!(err.kind(), crate::FaultKind::Incentive);
        assert_eq!(u.state(), &before);
        u.set_incentive_parameters(sample, Range::from_int(1).expect("in range"), 3)
            .expect("valid");
        assert_eq!(u.expected_sample_size(), sample);
    }

    #[test]
    fn test_state_persists_through_serde() {
        let (mut u, kp) = engine(AcceptAll);
        u.reset_feeds(&[0]).expect("reset");
        u.submit_updates(&submission(&kp, 0, 0, &[DeltaCode::Multiply]))
            .expect("accepted");
        let json = serde_json::to_string(u.state()).expect("serialize");
        let state: CoreState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(&state, u.state());

        let mut resumed = FastUpdater::from_state(config(), u.host().clone(), AcceptAll, state);
        assert_eq!(resumed.pending_batches(), 1);
        resumed.tick(1, 1).expect("tick");
        u.tick(1, 1).expect("tick");
        assert_eq!(resumed.state(), u.state());
    }
}
