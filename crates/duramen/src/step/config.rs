//! Step execution options

use serde::{Deserialize, Serialize};

use crate::duration::DurationInput;
use crate::reliability::RetryPolicy;

/// Default `wait_for_event` timeout: 24 hours
pub const DEFAULT_EVENT_TIMEOUT_MS: u64 = 86_400_000;

/// Options for a `do`-style step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Retry policy; absent means a single attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetryPolicy>,

    /// Advisory execution timeout. Accepted for forward compatibility; the
    /// engine records the intent but does not enforce it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationInput>,
}

impl StepConfig {
    /// Set the retry policy
    pub fn with_retries(mut self, retries: RetryPolicy) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the advisory timeout
    pub fn with_timeout(mut self, timeout: impl Into<DurationInput>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}

/// Options for `wait_for_event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForEventOptions {
    /// Event type to wait for
    pub event_type: String,

    /// Wait timeout; absent means 24 hours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationInput>,
}

impl WaitForEventOptions {
    /// Wait for the given event type with the default timeout
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timeout: None,
        }
    }

    /// Set the wait timeout
    pub fn with_timeout(mut self, timeout: impl Into<DurationInput>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}
