//! Retry policy implementation

use serde::{Deserialize, Serialize};

use crate::duration::{parse_duration, DurationError, DurationInput};

/// Backoff strategy between retry attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Every retry waits the base delay
    #[default]
    Constant,

    /// Retry `n` waits `delay * 2^(n-1)`
    Exponential,
}

/// Configuration for step retries
///
/// `limit` counts retries, not attempts: a limit of 2 allows three body
/// executions in total. Delays are deterministic (no jitter) so that backoff
/// timings are observable and checkpointed deadlines are reproducible.
///
/// # Example
///
/// ```ignore
/// use duramen::RetryPolicy;
///
/// let policy = RetryPolicy::exponential(5, "1 second");
///
/// // First retry after 1 second
/// // Second retry after 2 seconds
/// // Third retry after 4 seconds
/// // etc.
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    pub limit: u32,

    /// Base delay between attempts
    pub delay: DurationInput,

    /// Backoff strategy
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // One attempt, no retries
        Self {
            limit: 0,
            delay: DurationInput::Millis(1_000),
            backoff: Backoff::Constant,
        }
    }
}

impl RetryPolicy {
    /// Create a constant-backoff policy
    pub fn constant(limit: u32, delay: impl Into<DurationInput>) -> Self {
        Self {
            limit,
            delay: delay.into(),
            backoff: Backoff::Constant,
        }
    }

    /// Create an exponential-backoff policy
    pub fn exponential(limit: u32, delay: impl Into<DurationInput>) -> Self {
        Self {
            limit,
            delay: delay.into(),
            backoff: Backoff::Exponential,
        }
    }

    /// Set the retry limit
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the base delay
    pub fn with_delay(mut self, delay: impl Into<DurationInput>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Set the backoff strategy
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay in milliseconds before the given retry (1-based)
    pub fn delay_for_retry(&self, retry: u32) -> Result<u64, DurationError> {
        let base = parse_duration(&self.delay)?;

        Ok(match self.backoff {
            Backoff::Constant => base,
            Backoff::Exponential => {
                let exponent = retry.saturating_sub(1).min(63);
                base.saturating_mul(1u64 << exponent)
            }
        })
    }
}
