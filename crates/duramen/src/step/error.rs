//! Step error surface

use serde::{Deserialize, Serialize};

use crate::duration::DurationError;
use crate::persistence::StoreError;

/// Error type for step failures
///
/// Two categories matter to the retry machinery: ordinary errors are
/// consumed by the retry loop until the limit is exhausted, while
/// non-retryable errors mark the step `failed` on first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling
    pub error_type: Option<String>,

    /// Whether this error is retryable
    ///
    /// Non-retryable errors immediately fail the step without further
    /// attempts.
    pub retryable: bool,

    /// Additional error details (for debugging)
    pub details: Option<serde_json::Value>,
}

impl StepError {
    /// Create a new retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
            details: None,
        }
    }

    /// Create a non-retryable error
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
            details: None,
        }
    }

    /// The error raised when a `wait_for_event` times out
    pub fn timeout() -> Self {
        Self {
            message: "Timeout".to_string(),
            error_type: Some("timeout".to_string()),
            retryable: false,
            details: None,
        }
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StepError {}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        Self::non_retryable(err.to_string()).with_type("storage")
    }
}

impl From<DurationError> for StepError {
    fn from(err: DurationError) -> Self {
        Self::non_retryable(err.to_string()).with_type("validation")
    }
}

impl From<serde_json::Error> for StepError {
    fn from(err: serde_json::Error) -> Self {
        Self::non_retryable(err.to_string()).with_type("serialization")
    }
}
