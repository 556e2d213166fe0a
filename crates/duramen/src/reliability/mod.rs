//! Reliability patterns for durable execution
//!
//! This module provides:
//! - [`RetryPolicy`] - Configurable retry with constant or exponential backoff

mod retry;

pub use retry::{Backoff, RetryPolicy};
