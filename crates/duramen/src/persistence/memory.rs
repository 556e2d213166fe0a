//! In-memory implementation of WorkflowStore

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{StoreError, WorkflowStore};
use crate::workflow::{InstancePatch, InstanceRecord, InstanceSummary, StepState};

/// In-memory implementation of [`WorkflowStore`]
///
/// The reference backend: all data lives in process memory and is lost on
/// exit. Useful for tests and for workflows whose durability window is the
/// process lifetime.
///
/// # Example
///
/// ```
/// use duramen::InMemoryWorkflowStore;
///
/// let store = InMemoryWorkflowStore::new();
/// ```
pub struct InMemoryWorkflowStore {
    instances: RwLock<HashMap<String, InstanceRecord>>,
    steps: RwLock<HashMap<(String, String), StepState>>,
    pending_events: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl InMemoryWorkflowStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            steps: RwLock::new(HashMap::new()),
            pending_events: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored instances
    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Number of stored step checkpoints
    pub fn step_count(&self) -> usize {
        self.steps.read().len()
    }

    /// Number of parked pending events
    pub fn pending_event_count(&self) -> usize {
        self.pending_events.read().len()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.instances.write().clear();
        self.steps.write().clear();
        self.pending_events.write().clear();
    }
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save_instance(&self, id: &str, record: InstanceRecord) -> Result<(), StoreError> {
        self.instances.write().insert(id.to_string(), record);
        Ok(())
    }

    async fn update_instance(&self, id: &str, patch: InstancePatch) -> Result<(), StoreError> {
        let mut instances = self.instances.write();
        let record = instances
            .get_mut(id)
            .ok_or_else(|| StoreError::InstanceNotFound(id.to_string()))?;

        patch.merge_into(record);
        Ok(())
    }

    async fn load_instance(&self, id: &str) -> Result<Option<InstanceRecord>, StoreError> {
        let instances = self.instances.read();
        Ok(instances
            .get(id)
            .filter(|record| record.event.is_some())
            .cloned())
    }

    async fn delete_instance(&self, id: &str) -> Result<(), StoreError> {
        self.instances.write().remove(id);
        self.steps.write().retain(|(owner, _), _| owner != id);
        self.pending_events.write().retain(|(owner, _), _| owner != id);
        Ok(())
    }

    async fn update_step_state(
        &self,
        id: &str,
        name: &str,
        state: StepState,
    ) -> Result<(), StoreError> {
        self.steps
            .write()
            .insert((id.to_string(), name.to_string()), state);
        Ok(())
    }

    async fn load_step_state(&self, id: &str, name: &str) -> Result<Option<StepState>, StoreError> {
        let steps = self.steps.read();
        Ok(steps.get(&(id.to_string(), name.to_string())).cloned())
    }

    async fn clear_step_states(&self, id: &str) -> Result<(), StoreError> {
        self.steps.write().retain(|(owner, _), _| owner != id);
        Ok(())
    }

    async fn list_instance_summaries(&self) -> Result<Vec<InstanceSummary>, StoreError> {
        let instances = self.instances.read();
        Ok(instances
            .iter()
            .map(|(id, record)| InstanceSummary {
                id: id.clone(),
                status: record.status,
            })
            .collect())
    }

    async fn list_active_instances(&self) -> Result<Vec<String>, StoreError> {
        let instances = self.instances.read();
        Ok(instances
            .iter()
            .filter(|(_, record)| record.status.is_active())
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn save_pending_event(
        &self,
        id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.pending_events
            .write()
            .entry((id.to_string(), event_type.to_string()))
            .or_insert(payload);
        Ok(())
    }

    async fn load_pending_event(
        &self,
        id: &str,
        event_type: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self
            .pending_events
            .write()
            .remove(&(id.to_string(), event_type.to_string())))
    }
}
