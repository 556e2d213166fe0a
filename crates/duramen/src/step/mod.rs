//! Step execution
//!
//! This module provides:
//! - [`StepExecutor`] - the checkpoint-aware object handed to user code
//! - [`StepConfig`] / [`WaitForEventOptions`] - per-step options
//! - [`StepError`] - the user-facing step error surface

mod config;
mod error;
mod executor;

pub use config::{StepConfig, WaitForEventOptions, DEFAULT_EVENT_TIMEOUT_MS};
pub use error::StepError;
pub use executor::StepExecutor;
