//! Projection configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid config.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::projection::stage::Stage;

/// Largest accepted `lookback_days`.
pub const MAX_LOOKBACK_DAYS: u32 = 366;

/// Errors raised while loading or validating a [`ProjectionConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Global stage durations in days, used when a unit has no value of its own.
    pub default_durations: BTreeMap<Stage, u32>,

    /// Duration used when a stage has neither a unit value nor a global default.
    pub fallback_days: u32,

    /// Days before "today" to include in each timeline, flagged as past.
    pub lookback_days: u32,

    /// Offset applied to event timestamps to find their local calendar day.
    pub utc_offset_minutes: i32,

    /// Upper bound on unit timelines computed concurrently by the pipeline.
    pub max_parallel_units: usize,

    /// Timeout for each input collection fetch, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            default_durations: Stage::ALL.iter().map(|s| (*s, s.default_days())).collect(),
            fallback_days: 3,
            lookback_days: 0,
            utc_offset_minutes: 0,
            max_parallel_units: 4,
            fetch_timeout_secs: 30,
        }
    }
}

impl ProjectionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects values the pipeline cannot run with.
    ///
    /// Duration fields are never rejected: zero durations fall back at lookup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_units == 0 {
            return Err(ConfigError::Invalid(
                "max_parallel_units must be at least 1".to_string(),
            ));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn with_max_parallel_units(mut self, limit: usize) -> Self {
        self.max_parallel_units = limit;
        self
    }

    pub fn with_default_duration(mut self, stage: Stage, days: u32) -> Self {
        self.default_durations.insert(stage, days);
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Local calendar day of `ts`. An out-of-range offset is treated as UTC.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        match self.offset() {
            Some(offset) => ts.with_timezone(&offset).date_naive(),
            None => ts.date_naive(),
        }
    }
}
