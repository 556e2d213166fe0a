//! WorkflowStore trait definition

use async_trait::async_trait;

use crate::workflow::{InstancePatch, InstanceRecord, InstanceSummary, StepState};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Instance not found
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Backend error (I/O, database, ...)
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Store for instance records, step checkpoints and pending events
///
/// This trait defines the persistence contract for the engine.
/// Implementations must be thread-safe and support concurrent access; each
/// individual operation must be atomic. No multi-key transactions are
/// required: the engine is designed so every logical transition is a single
/// store call.
#[async_trait]
pub trait WorkflowStore: Send + Sync + 'static {
    // =========================================================================
    // Instance Operations
    // =========================================================================

    /// Write a full record for a new instance
    async fn save_instance(&self, id: &str, record: InstanceRecord) -> Result<(), StoreError>;

    /// Merge-patch an existing record
    ///
    /// Fails with [`StoreError::InstanceNotFound`] when the instance does not
    /// exist.
    async fn update_instance(&self, id: &str, patch: InstancePatch) -> Result<(), StoreError>;

    /// Load a full record
    ///
    /// Returns `None` when the instance is absent, and also when the stored
    /// record has no triggering event (the sentinel for invalid/deleted
    /// records).
    async fn load_instance(&self, id: &str) -> Result<Option<InstanceRecord>, StoreError>;

    /// Remove the record and all step checkpoints and pending events for the
    /// instance
    async fn delete_instance(&self, id: &str) -> Result<(), StoreError>;

    // =========================================================================
    // Step Checkpoint Operations
    // =========================================================================

    /// Upsert a step checkpoint
    async fn update_step_state(
        &self,
        id: &str,
        name: &str,
        state: StepState,
    ) -> Result<(), StoreError>;

    /// Load a step checkpoint
    async fn load_step_state(&self, id: &str, name: &str) -> Result<Option<StepState>, StoreError>;

    /// Remove every step checkpoint for the instance; the record itself is
    /// untouched
    async fn clear_step_states(&self, id: &str) -> Result<(), StoreError>;

    // =========================================================================
    // Listing Operations
    // =========================================================================

    /// `{id, status}` for every known instance
    async fn list_instance_summaries(&self) -> Result<Vec<InstanceSummary>, StoreError>;

    /// IDs of instances whose status is neither complete nor terminated
    async fn list_active_instances(&self) -> Result<Vec<String>, StoreError>;

    // =========================================================================
    // Pending Event Operations
    // =========================================================================

    /// Park an event payload for a future waiter
    ///
    /// First-wins: silently a no-op when an entry already exists for the
    /// `(instance, event type)` key.
    async fn save_pending_event(
        &self,
        id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Atomically return-and-remove the pending entry, if any
    async fn load_pending_event(
        &self,
        id: &str,
        event_type: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;
}
