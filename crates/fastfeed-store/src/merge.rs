//! Word-wise backlog merge and bulk rescale.
//!
//! The merge walks the store one packed word at a time. Each word is
//! unpacked once, every pending batch is applied to its eight lanes in
//! backlog order, and the word is packed back. Words no pending batch
//! touches are skipped without unpacking.

use fastfeed_fpa::wide::LANES;
use fastfeed_fpa::Scale;

use crate::backlog::DeltaBacklog;
use crate::decimals::{adjust_decimals, shed_excess_digits, MAGNITUDE_LIMIT};
use crate::delta::{DeltaBatch, DeltaCode};
use crate::packed::FeedStore;
use crate::{Result, StoreError};

/// Summary of one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Batches retired from the backlog.
    pub batches: usize,
    /// Multiply or divide codes applied to stored feeds.
    pub adjustments: usize,
    /// Packed words rewritten.
    pub words: usize,
}

/// Apply every pending batch in `backlog` to `store` at `scale`, then retire
/// the batches.
///
/// Codes addressing feeds past the end of the store are ignored. Every
/// touched word is computed before the first one is written back.
///
/// # Errors
///
/// - [`StoreError::MagnitudeOverflow`] if a multiply leaves a feed that
///   cannot be brought under the magnitude limit; the store and backlog are
///   then unchanged, and the feed must be removed before merging can resume
pub fn merge_backlog(
    store: &mut FeedStore,
    backlog: &mut DeltaBacklog,
    scale: Scale,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    if backlog.is_empty() {
        return Ok(report);
    }

    let batches: Vec<&DeltaBatch> = backlog.pending().collect();
    let mut merged = Vec::new();
    for word in 0..store.word_count() {
        let lanes = word * LANES..(word + 1) * LANES;
        if !batches.iter().any(|b| b.touches(lanes.clone())) {
            continue;
        }

        let (mut magnitudes, mut decimals) = store.load_word(word);
        let mut changed = 0;
        for batch in &batches {
            for lane in 0..LANES {
                let code = batch.code(word * LANES + lane);
                if apply_code(&mut magnitudes[lane], &mut decimals[lane], code, scale)? {
                    changed += 1;
                }
            }
        }
        tracing::trace!(word, adjustments = changed, "merged packed word");
        report.adjustments += changed;
        merged.push((word, magnitudes, decimals));
    }

    report.words = merged.len();
    for (word, magnitudes, decimals) in &merged {
        store.store_word(*word, magnitudes, decimals);
    }
    report.batches = backlog.retire_all();
    tracing::debug!(
        batches = report.batches,
        words = report.words,
        adjustments = report.adjustments,
        "merged delta backlog"
    );
    Ok(report)
}

/// Apply one delta code to one feed. Returns whether a multiply or divide
/// was applied; empty feeds are never changed. On error the feed is left
/// as it was.
///
/// # Errors
///
/// - [`StoreError::MagnitudeOverflow`] if the result stays at or above
///   [`MAGNITUDE_LIMIT`] with no decimals left to shed
pub fn apply_code(magnitude: &mut u32, decimals: &mut i8, code: DeltaCode, scale: Scale) -> Result<bool> {
    if *magnitude == 0 {
        return Ok(false);
    }
    let (value, d) = match code {
        DeltaCode::None | DeltaCode::Reserved => return Ok(false),
        DeltaCode::Multiply => {
            let product = (u128::from(*magnitude) * scale.raw()) >> Scale::FRACTIONAL_BITS;
            shed_excess_digits(clamp_u64(product), *decimals)
        }
        DeltaCode::Divide => {
            let Some(quotient) = (u128::from(*magnitude) << Scale::FRACTIONAL_BITS).checked_div(scale.raw())
            else {
                return Ok(false);
            };
            (clamp_u64(quotient), *decimals)
        }
    };
    if value >= MAGNITUDE_LIMIT {
        tracing::warn!(value, decimals = d, "feed magnitude cannot be normalized");
        return Err(StoreError::MagnitudeOverflow { value, decimals: d });
    }
    *magnitude = value as u32;
    *decimals = d;
    Ok(true)
}

// Anything this large is rejected against the magnitude limit anyway.
fn clamp_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Renormalize every non-empty feed for `scale`. Returns how many feeds
/// changed.
///
/// # Errors
///
/// - [`StoreError::MagnitudeOverflow`] if a stored feed cannot be
///   normalized; the store is left partially rescaled, so callers stage it
pub fn rescale_all(store: &mut FeedStore, scale: Scale) -> Result<usize> {
    let mut changed = 0;
    for word in 0..store.word_count() {
        let (mut magnitudes, mut decimals) = store.load_word(word);
        let mut dirty = false;
        for lane in 0..LANES {
            if magnitudes[lane] == 0 {
                continue;
            }
            let (m, d) = adjust_decimals(u64::from(magnitudes[lane]), decimals[lane], scale)?;
            if (m, d) != (magnitudes[lane], decimals[lane]) {
                magnitudes[lane] = m;
                decimals[lane] = d;
                dirty = true;
                changed += 1;
            }
        }
        if dirty {
            store.store_word(word, &magnitudes, &decimals);
        }
    }
    tracing::info!(changed, "rescaled feed store");
    Ok(changed)
}
