//! Persistence layer for durable execution
//!
//! This module provides:
//! - [`WorkflowStore`] trait for instance, checkpoint and event persistence
//! - [`InMemoryWorkflowStore`] reference implementation
//! - [`DisabledWorkflowStore`] quiescing store installed on shutdown

mod disabled;
mod memory;
mod store;

pub use disabled::DisabledWorkflowStore;
pub use memory::InMemoryWorkflowStore;
pub use store::{StoreError, WorkflowStore};
