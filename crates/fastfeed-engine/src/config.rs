//! Engine configuration.
//!
//! ```toml
//! [window]
//! submission_window = 10
//!
//! [incentive]
//! base_sample_size = 16
//! base_range = 1
//! duration = 8
//! sample_increase_limit = 5
//! range_increase_price = 1000
//!
//! [feeds]
//! backlog_capacity = 1000
//! max_feed_age_rounds = 20
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Sample sizes and ranges are given in whole virtual providers.

use std::path::Path;

use fastfeed_fpa::{Fee, Range, SampleSize};
use fastfeed_types::{BACKLOG_CAPACITY, MAX_FEED_AGE_ROUNDS, MAX_SUBMISSION_WINDOW};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Submission window settings.
    #[serde(default)]
    pub window: WindowConfig,
    /// Incentive market base parameters.
    #[serde(default)]
    pub incentive: IncentiveConfig,
    /// Feed store settings.
    #[serde(default)]
    pub feeds: FeedsConfig,
}

/// Submission window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Ticks a round stays open for submissions.
    #[serde(default = "default_submission_window")]
    pub submission_window: u64,
}

/// Incentive market configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentiveConfig {
    /// Expected sample size without incentives, in virtual providers.
    #[serde(default = "default_base_sample_size")]
    pub base_sample_size: u64,
    /// Range without incentives, in virtual providers.
    #[serde(default = "default_base_range")]
    pub base_range: u64,
    /// Ticks an incentive stays in force.
    #[serde(default = "default_duration")]
    pub duration: usize,
    /// Largest sample-size increase one offer can buy.
    #[serde(default = "default_sample_increase_limit")]
    pub sample_increase_limit: u64,
    /// Price of one unit of range.
    #[serde(default = "default_range_increase_price")]
    pub range_increase_price: u64,
}

/// Feed store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Unmerged delta batches held at most.
    #[serde(default = "default_backlog_capacity")]
    pub backlog_capacity: usize,
    /// Oldest price snapshot, in voting rounds, a reset accepts.
    #[serde(default = "default_max_feed_age_rounds")]
    pub max_feed_age_rounds: u64,
}

// Default value functions

fn default_submission_window() -> u64 {
    10
}

fn default_base_sample_size() -> u64 {
    16
}

fn default_base_range() -> u64 {
    1
}

fn default_duration() -> usize {
    8
}

fn default_sample_increase_limit() -> u64 {
    5
}

fn default_range_increase_price() -> u64 {
    1000
}

fn default_backlog_capacity() -> usize {
    BACKLOG_CAPACITY
}

fn default_max_feed_age_rounds() -> u64 {
    MAX_FEED_AGE_ROUNDS
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            submission_window: default_submission_window(),
        }
    }
}

impl Default for IncentiveConfig {
    fn default() -> Self {
        Self {
            base_sample_size: default_base_sample_size(),
            base_range: default_base_range(),
            duration: default_duration(),
            sample_increase_limit: default_sample_increase_limit(),
            range_increase_price: default_range_increase_price(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: default_backlog_capacity(),
            max_feed_age_rounds: default_max_feed_age_rounds(),
        }
    }
}

impl IncentiveConfig {
    /// Base sample size as a fixed-point value.
    pub fn sample_size(&self) -> Result<SampleSize> {
        Ok(SampleSize::from_int(self.base_sample_size)?)
    }

    /// Base range as a fixed-point value.
    pub fn range(&self) -> Result<Range> {
        Ok(Range::from_int(self.base_range)?)
    }

    /// Sample increase limit as a fixed-point value.
    pub fn increase_limit(&self) -> Result<SampleSize> {
        Ok(SampleSize::from_int(self.sample_increase_limit)?)
    }

    /// Range price as a fee.
    pub fn price(&self) -> Fee {
        Fee::from_raw(u128::from(self.range_increase_price))
    }
}

impl EngineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SubmissionWindowOutOfRange`] if the window is zero or
    ///   above 100 ticks
    /// - [`EngineError::Config`] if the backlog capacity is zero
    /// - [`EngineError::Fpa`] if a sample size or range exceeds its guard
    /// - [`EngineError::Incentive`] if the base precision rules fail or the
    ///   duration is zero
    pub fn validate(&self) -> Result<()> {
        check_submission_window(self.window.submission_window)?;
        if self.feeds.backlog_capacity == 0 {
            return Err(EngineError::Config(
                "backlog_capacity must be at least 1".to_string(),
            ));
        }
        // Building a market applies the precision and duration rules.
        fastfeed_incentive::IncentiveMarket::new(
            self.incentive.sample_size()?,
            self.incentive.range()?,
            self.incentive.duration,
            self.incentive.increase_limit()?,
            self.incentive.price(),
        )?;
        Ok(())
    }
}

pub(crate) fn check_submission_window(window: u64) -> Result<()> {
    if window == 0 || window > MAX_SUBMISSION_WINDOW {
        return Err(EngineError::SubmissionWindowOutOfRange {
            window,
            max: MAX_SUBMISSION_WINDOW,
        });
    }
    Ok(())
}
