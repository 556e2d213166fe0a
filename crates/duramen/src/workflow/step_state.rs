//! Step checkpoints

use serde::{Deserialize, Serialize};

/// Persisted outcome (or in-progress state) of one step of one instance
///
/// Keyed by `(instance_id, step_name)`. Step names are unique within an
/// instance, so a name reaching storage twice is the same step resuming.
/// Deadlines are absolute epoch-milliseconds: a sleeping or retrying step
/// picks up its original deadline after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepState {
    /// Just initialized
    Pending,

    /// Body is (re)executing
    Running {
        /// Retries performed so far (0 on the first attempt)
        retries: u32,
    },

    /// Waiting out a backoff delay before the next attempt
    Retrying {
        /// Absolute epoch-ms deadline of the backoff
        retry_end_time: i64,

        /// Retries performed so far
        retries: u32,
    },

    /// Terminal success
    Completed {
        /// The body's return value
        result: serde_json::Value,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        retries: Option<u32>,
    },

    /// Terminal failure after exhausting retries or a non-retryable error
    Failed {
        /// Normalized error message
        error: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        retries: Option<u32>,
    },

    /// Durable timer with its absolute deadline
    Sleeping {
        /// Absolute epoch-ms wake-up time
        sleep_end_time: i64,
    },

    /// Blocked on an external event
    WaitingForEvent {
        /// Event type being waited for
        wait_event_type: String,

        /// Wait timeout in milliseconds
        wait_timeout: u64,
    },
}

impl StepState {
    /// Terminal states replay their outcome; the body never runs again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
