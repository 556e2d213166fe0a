//! Event delivery
//!
//! This module provides:
//! - [`EventRouter`] - one-shot in-process handoff to waiting steps

mod router;

pub use router::EventRouter;
