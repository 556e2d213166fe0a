//! Duration and timestamp parsing
//!
//! Waits are specified by callers as raw millisecond counts or as human
//! strings ("30 seconds", "1 hour"). Parsing happens once at the call
//! boundary; internally every wait is an absolute epoch-ms deadline so that
//! sleeps and backoffs survive restarts unchanged.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

/// Error type for duration parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// Input did not match the accepted grammar
    #[error("invalid duration: {0}")]
    Invalid(String),
}

/// A wait length: raw milliseconds or a human string
///
/// Accepted strings match `<count> <unit>` with unit one of `second`,
/// `minute`, `hour`, `day` (optionally pluralized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    /// Millisecond count
    Millis(u64),

    /// Human-readable duration string
    Text(String),
}

impl From<u64> for DurationInput {
    fn from(millis: u64) -> Self {
        Self::Millis(millis)
    }
}

impl From<&str> for DurationInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for DurationInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s*(second|minute|hour|day)s?\s*$")
            .expect("duration pattern is valid")
    })
}

/// Convert a [`DurationInput`] into milliseconds
///
/// Zero is accepted here; operations with a positivity requirement (such as
/// `sleep`) enforce it themselves.
pub fn parse_duration(input: &DurationInput) -> Result<u64, DurationError> {
    match input {
        DurationInput::Millis(millis) => Ok(*millis),
        DurationInput::Text(text) => {
            let captures = duration_pattern()
                .captures(text)
                .ok_or_else(|| DurationError::Invalid(text.clone()))?;

            let count: u64 = captures[1]
                .parse()
                .map_err(|_| DurationError::Invalid(text.clone()))?;

            let multiplier = match &captures[2] {
                "second" => MILLIS_PER_SECOND,
                "minute" => MILLIS_PER_MINUTE,
                "hour" => MILLIS_PER_HOUR,
                "day" => MILLIS_PER_DAY,
                _ => return Err(DurationError::Invalid(text.clone())),
            };

            count
                .checked_mul(multiplier)
                .ok_or_else(|| DurationError::Invalid(text.clone()))
        }
    }
}

/// A `sleep_until` target: a datetime or a seconds-since-epoch numeric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SleepTarget {
    /// Absolute point in time
    DateTime(DateTime<Utc>),

    /// Seconds since the Unix epoch
    EpochSeconds(f64),
}

impl SleepTarget {
    /// The target as absolute epoch-milliseconds
    pub fn epoch_millis(&self) -> i64 {
        match self {
            Self::DateTime(when) => when.timestamp_millis(),
            Self::EpochSeconds(seconds) => (seconds * 1_000.0) as i64,
        }
    }
}

impl From<DateTime<Utc>> for SleepTarget {
    fn from(when: DateTime<Utc>) -> Self {
        Self::DateTime(when)
    }
}

impl From<f64> for SleepTarget {
    fn from(seconds: f64) -> Self {
        Self::EpochSeconds(seconds)
    }
}

impl From<u64> for SleepTarget {
    fn from(seconds: u64) -> Self {
        Self::EpochSeconds(seconds as f64)
    }
}

/// Current wall-clock time as epoch-milliseconds
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
