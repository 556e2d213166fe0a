//! Never-completing store used as a shutdown latch

use async_trait::async_trait;

use super::store::{StoreError, WorkflowStore};
use crate::workflow::{InstancePatch, InstanceRecord, InstanceSummary, StepState};

/// A [`WorkflowStore`] whose every operation never completes
///
/// Installed by `WorkflowEngine::shutdown`: once it replaces the live store,
/// any in-flight step that reaches its next storage call stalls forever, so
/// no further user code runs and no partial state is written. The pending
/// futures are dropped with the runner tasks when the runtime shuts down.
pub struct DisabledWorkflowStore;

#[async_trait]
impl WorkflowStore for DisabledWorkflowStore {
    async fn save_instance(&self, _id: &str, _record: InstanceRecord) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn update_instance(&self, _id: &str, _patch: InstancePatch) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn load_instance(&self, _id: &str) -> Result<Option<InstanceRecord>, StoreError> {
        std::future::pending().await
    }

    async fn delete_instance(&self, _id: &str) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn update_step_state(
        &self,
        _id: &str,
        _name: &str,
        _state: StepState,
    ) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn load_step_state(
        &self,
        _id: &str,
        _name: &str,
    ) -> Result<Option<StepState>, StoreError> {
        std::future::pending().await
    }

    async fn clear_step_states(&self, _id: &str) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn list_instance_summaries(&self) -> Result<Vec<InstanceSummary>, StoreError> {
        std::future::pending().await
    }

    async fn list_active_instances(&self) -> Result<Vec<String>, StoreError> {
        std::future::pending().await
    }

    async fn save_pending_event(
        &self,
        _id: &str,
        _event_type: &str,
        _payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn load_pending_event(
        &self,
        _id: &str,
        _event_type: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        std::future::pending().await
    }
}
