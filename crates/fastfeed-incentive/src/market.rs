//! Offer pricing and governance parameters.
//!
//! An offer buys range at a fixed price per unit. Whatever is left of the
//! payment after that ("excess") joins a decaying pool, and the offer
//! receives the share of the sample-size increase limit that its excess
//! represents within the pool:
//!
//! ```text
//! sample_increase = excess / (pool + excess) × sample_increase_limit
//! ```
//!
//! An offer into an empty pool claims the whole limit; the same excess buys
//! less once the pool has filled up.

use fastfeed_fpa::wide::mul_div;
use fastfeed_fpa::{Fee, FpaError, Precision, Range, SampleSize, Scale, PRECISION_FLOOR};
use serde::{Deserialize, Serialize};

use crate::increase::IncreaseManager;
use crate::{IncentiveError, Result};

/// A request to buy a temporary range and sample-size increase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentiveOffer {
    /// Amount paid.
    pub payment: Fee,
    /// Range increase asked for.
    pub range_increase: Range,
    /// The offer is clamped so the live range never exceeds this.
    pub range_limit: Range,
}

/// Outcome of an accepted offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReceipt {
    /// Part of the payment consumed, after pro-rating for clamping.
    pub accepted_contribution: Fee,
    /// Range increase granted.
    pub accepted_range_increase: Range,
    /// Price paid for the range increase.
    pub range_cost: Fee,
    /// Contribution left after the range cost, added to the pool.
    pub excess: Fee,
    /// Sample-size increase granted.
    pub sample_size_increase: SampleSize,
    /// Payment not consumed, returned to the offerer.
    pub refund: Fee,
}

/// The incentive market: live parameters, base parameters and pricing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentiveMarket {
    increases: IncreaseManager,
    base_sample_size: SampleSize,
    base_range: Range,
    sample_increase_limit: SampleSize,
    range_increase_price: Fee,
}

impl IncentiveMarket {
    /// Create a market from governance base parameters.
    ///
    /// # Errors
    ///
    /// Same as [`IncentiveMarket::set_incentive_parameters`].
    pub fn new(
        sample_size: SampleSize,
        range: Range,
        duration: usize,
        sample_increase_limit: SampleSize,
        range_increase_price: Fee,
    ) -> Result<Self> {
        check_precision(sample_size, range)?;
        Ok(Self {
            increases: IncreaseManager::new(sample_size, range, duration)?,
            base_sample_size: sample_size,
            base_range: range,
            sample_increase_limit,
            range_increase_price,
        })
    }

    /// Advance the decay window by one tick.
    pub fn tick(&mut self) -> Result<()> {
        self.increases.tick()
    }

    /// Price an offer and book its increases.
    ///
    /// The range increase is clamped to `offer.range_limit`, and the
    /// contribution pro-rated to match. Nothing is written unless every check
    /// passes.
    ///
    /// # Errors
    ///
    /// - [`IncentiveError::RangeNotBelowSampleSize`] if the new range would
    ///   reach the sample size
    /// - [`IncentiveError::InsufficientContribution`] if the contribution
    ///   does not cover the range
    /// - [`IncentiveError::Fpa`] if a total leaves its guard
    pub fn request_increase(&mut self, offer: &IncentiveOffer) -> Result<OfferReceipt> {
        let range = self.increases.range();
        let sample_size = self.increases.sample_size();

        let headroom = offer.range_limit.checked_sub(range).unwrap_or(Range::ZERO);
        let (accepted_contribution, accepted_range_increase) = if offer.range_increase > headroom {
            let contribution = mul_div(
                offer.payment.raw(),
                headroom.raw(),
                offer.range_increase.raw(),
            )
            .ok_or(FpaError::Overflow { kind: "Fee" })?;
            (Fee::from_raw(contribution), headroom)
        } else {
            (offer.payment, offer.range_increase)
        };

        let new_range = range.checked_add(accepted_range_increase)?;
        if new_range.raw() >= sample_size.raw() {
            return Err(IncentiveError::RangeNotBelowSampleSize);
        }

        let range_cost = self.range_increase_price.mul_range(accepted_range_increase)?;
        if accepted_contribution < range_cost {
            return Err(IncentiveError::InsufficientContribution {
                offered: accepted_contribution.raw(),
                cost: range_cost.raw(),
            });
        }

        let excess = accepted_contribution.checked_sub(range_cost)?;
        let pool = self.increases.excess_after(excess)?;
        let sample_size_increase = if pool == Fee::ZERO {
            SampleSize::ZERO
        } else {
            self.sample_increase_limit.mul_precision(excess.frac(pool)?)?
        };

        let refund = offer.payment.checked_sub(accepted_contribution)?;
        self.increases
            .record(sample_size_increase, accepted_range_increase, excess)?;

        let receipt = OfferReceipt {
            accepted_contribution,
            accepted_range_increase,
            range_cost,
            excess,
            sample_size_increase,
            refund,
        };
        tracing::info!(
            contribution = %receipt.accepted_contribution.raw(),
            range_increase = receipt.accepted_range_increase.to_f64(),
            sample_increase = receipt.sample_size_increase.to_f64(),
            refund = %receipt.refund.raw(),
            "incentive offer accepted"
        );
        Ok(receipt)
    }

    /// Set the maximum sample-size increase a single offer can buy.
    pub fn set_sample_increase_limit(&mut self, limit: SampleSize) {
        tracing::info!(limit = limit.to_f64(), "sample increase limit set");
        self.sample_increase_limit = limit;
    }

    /// Set the price of one unit of range.
    pub fn set_range_increase_price(&mut self, price: Fee) {
        tracing::info!(price = %price.raw(), "range increase price set");
        self.range_increase_price = price;
    }

    /// Replace the base parameters and discard every in-flight increase.
    ///
    /// # Errors
    ///
    /// - [`IncentiveError::RangeNotBelowSampleSize`] if `range ≥ sample_size`
    /// - [`IncentiveError::PrecisionBelowFloor`] if `range / sample_size < 2^-25`
    /// - [`IncentiveError::ZeroDuration`] if `duration` is zero
    pub fn set_incentive_parameters(
        &mut self,
        sample_size: SampleSize,
        range: Range,
        duration: usize,
    ) -> Result<()> {
        check_precision(sample_size, range)?;
        self.increases.reset(sample_size, range, duration)?;
        self.base_sample_size = sample_size;
        self.base_range = range;
        tracing::info!(
            sample_size = sample_size.to_f64(),
            range = range.to_f64(),
            duration,
            "incentive parameters reset"
        );
        Ok(())
    }

    /// Live expected sample size.
    pub fn expected_sample_size(&self) -> SampleSize {
        self.increases.sample_size()
    }

    /// Live range.
    pub fn range(&self) -> Range {
        self.increases.range()
    }

    /// Live excess offer pool.
    pub fn excess_offer_value(&self) -> Fee {
        self.increases.excess_offer_value()
    }

    /// Incentive duration in ticks.
    pub fn duration(&self) -> usize {
        self.increases.duration()
    }

    /// Price of one unit of range.
    pub fn range_increase_price(&self) -> Fee {
        self.range_increase_price
    }

    /// Maximum sample-size increase per offer.
    pub fn sample_increase_limit(&self) -> SampleSize {
        self.sample_increase_limit
    }

    /// Base sample size set by governance.
    pub fn base_sample_size(&self) -> SampleSize {
        self.base_sample_size
    }

    /// Base range set by governance.
    pub fn base_range(&self) -> Range {
        self.base_range
    }

    /// Live `range / sample_size`.
    pub fn precision(&self) -> Result<Precision> {
        Ok(self.range().precision(self.expected_sample_size())?)
    }

    /// Live `1 + range / sample_size`.
    pub fn scale(&self) -> Result<Scale> {
        Ok(Scale::from_precision(self.precision()?)?)
    }

    /// `1 + base_range / base_sample_size`, ignoring incentives.
    pub fn base_scale(&self) -> Result<Scale> {
        let p = self.base_range.precision(self.base_sample_size)?;
        Ok(Scale::from_precision(p)?)
    }

    /// The underlying ledgers.
    pub fn increases(&self) -> &IncreaseManager {
        &self.increases
    }
}

fn check_precision(sample_size: SampleSize, range: Range) -> Result<()> {
    if range.raw() >= sample_size.raw() {
        return Err(IncentiveError::RangeNotBelowSampleSize);
    }
    if range.precision(sample_size)? < PRECISION_FLOOR {
        return Err(IncentiveError::PrecisionBelowFloor);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(n: u64) -> SampleSize {
        SampleSize::from_int(n).expect("in range")
    }

    fn range(n: u64) -> Range {
        Range::from_int(n).expect("in range")
    }

    fn market() -> IncentiveMarket {
        IncentiveMarket::new(sample(100), range(10), 8, sample(1000), Fee::from_raw(100))
            .expect("valid parameters")
    }

    fn offer(payment: u128, range_increase: u64, range_limit: u64) -> IncentiveOffer {
        IncentiveOffer {
            payment: Fee::from_raw(payment),
            range_increase: range(range_increase),
            // Limits may sit above the range guard; they are only compared.
            range_limit: Range::from_raw(u128::from(range_limit) << Range::FRACTIONAL_BITS),
        }
    }

    #[test]
    fn test_first_offer_claims_full_limit() {
        let mut m = market();
        let receipt = m
            .request_increase(&offer(1000, 5, 1_000_000))
            .expect("accepted");
        assert_eq!(receipt.range_cost, Fee::from_raw(500));
        assert_eq!(receipt.excess, Fee::from_raw(500));
        assert_eq!(receipt.sample_size_increase, sample(1000));
        assert_eq!(receipt.accepted_range_increase, range(5));
        assert_eq!(receipt.refund, Fee::ZERO);
        assert_eq!(m.range(), range(15));
        assert_eq!(m.expected_sample_size(), sample(1100));
        assert_eq!(m.excess_offer_value(), Fee::from_raw(500));
    }

    #[test]
    fn test_insufficient_contribution() {
        let mut m = market();
        let before = m.clone();
        assert_eq!(
            m.request_increase(&offer(499, 5, 60_000)),
            Err(IncentiveError::InsufficientContribution {
                offered: 499,
                cost: 500
            })
        );
        assert_eq!(m, before);
    }

    #[test]
    fn test_range_must_stay_below_sample_size() {
        let mut m = market();
        let before = m.clone();
        assert_eq!(
            m.request_increase(&offer(100_000, 90, 60_000)),
            Err(IncentiveError::RangeNotBelowSampleSize)
        );
        assert_eq!(m, before);
    }

    #[test]
    fn test_clamped_offer_pro_rates_contribution() {
        let mut m = market();
        // Only 2 of the 4 requested units fit under the limit of 12.
        let receipt = m.request_increase(&offer(1000, 4, 12)).expect("accepted");
        assert_eq!(receipt.accepted_range_increase, range(2));
        assert_eq!(receipt.accepted_contribution, Fee::from_raw(500));
        assert_eq!(receipt.refund, Fee::from_raw(500));
        assert_eq!(receipt.range_cost, Fee::from_raw(200));
        assert_eq!(m.range(), range(12));
    }

    #[test]
    fn test_limit_already_reached_buys_no_range() {
        let mut m = market();
        let receipt = m.request_increase(&offer(1000, 4, 5)).expect("accepted");
        assert_eq!(receipt.accepted_range_increase, Range::ZERO);
        assert_eq!(receipt.accepted_contribution, Fee::ZERO);
        assert_eq!(receipt.sample_size_increase, SampleSize::ZERO);
        assert_eq!(receipt.refund, Fee::from_raw(1000));
    }

    #[test]
    fn test_offer_decays_back() {
        let mut m = market();
        m.request_increase(&offer(1000, 5, 60_000)).expect("accepted");
        for _ in 0..m.duration() {
            m.tick().expect("tick");
        }
        assert_eq!(m.expected_sample_size(), sample(100));
        assert_eq!(m.range(), range(10));
        assert_eq!(m.excess_offer_value(), Fee::ZERO);
    }

    #[test]
    fn test_second_offer_gets_diminished_share() {
        let mut m = market();
        m.request_increase(&offer(1000, 5, 60_000)).expect("accepted");
        let receipt = m.request_increase(&offer(500, 0, 60_000)).expect("accepted");
        // 500 of a 1000 pool buys half the limit.
        assert_eq!(receipt.sample_size_increase, sample(500));
    }

    #[test]
    fn test_in_flight_offer_survives_json() {
        let mut m = market();
        m.request_increase(&offer(1000, 5, 60_000)).expect("accepted");
        m.tick().expect("tick");

        let json = serde_json::to_string(&m).expect("serialize");
        let mut resumed: IncentiveMarket = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(resumed, m);

        for _ in 0..m.duration() {
            m.tick().expect("tick");
            resumed.tick().expect("tick");
            assert_eq!(resumed.expected_sample_size(), m.expected_sample_size());
        }
        assert_eq!(resumed.range(), range(10));
        assert_eq!(resumed, m);
    }

    #[test]
    fn test_parameters_enforce_precision() {
        let mut m = market();
        assert_eq!(
            m.set_incentive_parameters(sample(100), range(100), 8),
            Err(IncentiveError::RangeNotBelowSampleSize)
        );
        // 1 / 60_000 is above 2^-25; a raw range of one ulp is not.
        assert!(m.set_incentive_parameters(sample(60_000), range(1), 8).is_ok());
        assert_eq!(
            m.set_incentive_parameters(sample(60_000), Range::from_raw(1), 8),
            Err(IncentiveError::PrecisionBelowFloor)
        );
        assert_eq!(
            m.set_incentive_parameters(sample(100), range(10), 0),
            Err(IncentiveError::ZeroDuration)
        );
    }

    #[test]
    fn test_scale_and_base_scale() {
        let mut m = IncentiveMarket::new(sample(100), range(50), 4, sample(100), Fee::from_raw(1))
            .expect("valid parameters");
        assert_eq!(m.scale().expect("scale").raw(), 3u128 << 63);
        m.request_increase(&offer(10, 10, 60_000)).expect("accepted");
        assert!(m.scale().expect("scale") != m.base_scale().expect("scale"));
        assert_eq!(m.base_scale().expect("scale").raw(), 3u128 << 63);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn smaller_pool_never_buys_less(excess in 1u128..1_000_000, prior in 0u128..1_000_000) {
            // Same excess offered into an empty pool and into a pool holding
            // `prior` from an earlier offer.
            let mut empty = market();
            let mut filled = market();
            if prior > 0 {
                filled.request_increase(&offer(prior, 0, 60_000)).expect("accepted");
            }
            let a = empty.request_increase(&offer(excess, 0, 60_000)).expect("accepted");
            let b = filled.request_increase(&offer(excess, 0, 60_000)).expect("accepted");
            prop_assert!(a.sample_size_increase >= b.sample_size_increase);
        }

        #[test]
        fn range_stays_below_sample_size(offers in proptest::collection::vec((0u128..10_000, 0u64..40), 1..20)) {
            let mut m = market();
            for (payment, range_increase) in offers {
                let _ = m.request_increase(&offer(payment, range_increase, 60_000));
                prop_assert!(m.range() < Range::from_raw(m.expected_sample_size().raw()));
                m.tick().expect("tick");
            }
        }
    }
}
