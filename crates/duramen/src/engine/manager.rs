//! Workflow engine facade and instance handles

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::runner;
use super::shutdown::ShutdownLatch;
use crate::event::EventRouter;
use crate::persistence::{DisabledWorkflowStore, StoreError, WorkflowStore};
use crate::workflow::{InstanceEvent, InstancePatch, InstanceRecord, InstanceStatus, Workflow};

const INSTANCE_ID_LENGTH: usize = 16;

/// Errors from engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Instance not found
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Create was called with an ID that already exists
    #[error("instance already exists: {0}")]
    InstanceExists(String),

    /// Resume was called on an instance that is not paused
    #[error("instance {id} is {status}, expected paused")]
    NotPaused { id: String, status: InstanceStatus },

    /// The stored record has no triggering event to replay from
    #[error("instance {0} has no triggering event")]
    MissingEvent(String),
}

/// Options for creating an instance
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Instance ID; generated when absent
    pub id: Option<String>,

    /// Caller parameters, delivered as the triggering event's payload
    pub params: Option<serde_json::Value>,
}

impl CreateOptions {
    /// Create empty options (generated ID, null payload)
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-supplied instance ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the triggering payload
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// State shared by the engine, its runners and its step executors
pub(crate) struct EngineShared {
    pub(crate) workflow: Arc<dyn Workflow>,
    store: RwLock<Arc<dyn WorkflowStore>>,
    pub(crate) router: EventRouter,
    pub(crate) latch: ShutdownLatch,
    pub(crate) active: DashMap<String, DateTime<Utc>>,
}

impl EngineShared {
    /// Snapshot of the currently installed store
    ///
    /// Read per call rather than cached so that the shutdown swap to the
    /// disabled store is observed by every later storage access.
    pub(crate) fn store(&self) -> Arc<dyn WorkflowStore> {
        self.store.read().clone()
    }

    fn install_store(&self, store: Arc<dyn WorkflowStore>) {
        *self.store.write() = store;
    }

    /// Route an event to a live waiter, or park it for a future one
    pub(crate) async fn route_event(
        &self,
        id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        if self.router.deliver(id, event_type, payload.clone()) {
            return Ok(());
        }

        debug!(instance_id = id, event_type, "no live waiter, parking event");
        self.store().save_pending_event(id, event_type, payload).await
    }
}

/// Public facade of the durable execution engine
///
/// An engine binds one [`Workflow`] implementation to one store and manages
/// the instances created from it: spawning runners, recovering after a
/// restart, routing events, and shutting everything down.
///
/// # Example
///
/// ```ignore
/// use duramen::prelude::*;
///
/// let store = Arc::new(InMemoryWorkflowStore::new());
/// let engine = WorkflowEngine::with_store(OrderWorkflow, store.clone());
///
/// let handle = engine
///     .create(CreateOptions::new().with_params(json!({ "order_id": "o-42" })))
///     .await?;
///
/// handle.send_event("order-confirmed", json!({ "by": "ops" })).await?;
///
/// // after a process restart, with the same store:
/// let engine = WorkflowEngine::with_store(OrderWorkflow, store);
/// engine.recover().await?;
/// ```
#[derive(Clone)]
pub struct WorkflowEngine {
    shared: Arc<EngineShared>,
}

impl WorkflowEngine {
    /// Create an engine owning its store
    pub fn new(workflow: impl Workflow, store: impl WorkflowStore) -> Self {
        Self::with_store(workflow, Arc::new(store))
    }

    /// Create an engine over a shared store
    ///
    /// Sharing the `Arc` is how multiple engine generations (before and
    /// after a restart) see the same persisted state.
    pub fn with_store(workflow: impl Workflow, store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                workflow: Arc::new(workflow),
                store: RwLock::new(store),
                router: EventRouter::new(),
                latch: ShutdownLatch::new(),
                active: DashMap::new(),
            }),
        }
    }

    /// The currently installed store
    pub fn store(&self) -> Arc<dyn WorkflowStore> {
        self.shared.store()
    }

    /// IDs of instances with a live runner in this process
    pub fn active_instances(&self) -> Vec<String> {
        self.shared
            .active
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Create a new instance and start running it
    ///
    /// A missing ID is filled with a generated one; a caller-supplied ID that
    /// already exists is rejected.
    #[instrument(skip(self, options))]
    pub async fn create(&self, options: CreateOptions) -> Result<InstanceHandle, EngineError> {
        let id = options.id.unwrap_or_else(generate_instance_id);
        let store = self.shared.store();

        if store.load_instance(&id).await?.is_some() {
            return Err(EngineError::InstanceExists(id));
        }

        let event =
            InstanceEvent::new(id.as_str(), options.params.unwrap_or(serde_json::Value::Null));
        store.save_instance(&id, InstanceRecord::queued(event.clone())).await?;

        info!(instance_id = %id, "created workflow instance");
        runner::spawn(self.shared.clone(), id.clone(), event);

        Ok(self.handle(id))
    }

    /// Create many instances
    ///
    /// Order-preserving; each creation fails or succeeds independently.
    pub async fn create_batch(
        &self,
        batch: Vec<CreateOptions>,
    ) -> Vec<Result<InstanceHandle, EngineError>> {
        let mut handles = Vec::with_capacity(batch.len());
        for options in batch {
            handles.push(self.create(options).await);
        }
        handles
    }

    /// Get a handle to an existing instance
    pub async fn get(&self, id: &str) -> Result<InstanceHandle, EngineError> {
        self.shared
            .store()
            .load_instance(id)
            .await?
            .ok_or_else(|| EngineError::InstanceNotFound(id.to_string()))?;

        Ok(self.handle(id.to_string()))
    }

    /// Re-spawn runners for every recoverable instance
    ///
    /// Scans the active listing: paused instances are resumed, queued /
    /// running / waiting ones are replayed from their stored event, records
    /// without an event are skipped. Returns the number of runners spawned.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let store = self.shared.store();
        let ids = store.list_active_instances().await?;
        let mut recovered = 0;

        for id in ids {
            let Some(record) = store.load_instance(&id).await? else {
                debug!(instance_id = %id, "skipping record without event");
                continue;
            };
            let Some(event) = record.event else {
                continue;
            };

            match record.status {
                InstanceStatus::Paused => {
                    info!(instance_id = %id, "resuming paused instance");
                    store
                        .update_instance(&id, InstancePatch::status(InstanceStatus::Running))
                        .await?;
                    runner::spawn(self.shared.clone(), id, event);
                    recovered += 1;
                }
                InstanceStatus::Queued
                | InstanceStatus::Running
                | InstanceStatus::Waiting
                | InstanceStatus::WaitingForPause => {
                    info!(instance_id = %id, status = %record.status, "replaying instance");
                    runner::spawn(self.shared.clone(), id, event);
                    recovered += 1;
                }
                status => {
                    debug!(instance_id = %id, %status, "not recoverable, skipping");
                }
            }
        }

        info!(recovered, "recovery scan complete");
        Ok(recovered)
    }

    /// Send an external event to an instance
    pub async fn send_event(
        &self,
        id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.shared.route_event(id, event_type, payload).await?;
        Ok(())
    }

    /// Stop the engine
    ///
    /// Raises the shutdown latch and installs the disabled store. In-flight
    /// steps stall at their next suspension point; no further user code runs
    /// and no exceptions surface. Returns as soon as the swap is visible.
    pub fn shutdown(&self) {
        warn!("shutting down workflow engine");
        self.shared.latch.raise();
        self.shared.install_store(Arc::new(DisabledWorkflowStore));
    }

    fn handle(&self, id: String) -> InstanceHandle {
        InstanceHandle {
            id,
            shared: self.shared.clone(),
        }
    }
}

/// Handle to one workflow instance
#[derive(Clone)]
pub struct InstanceHandle {
    id: String,
    shared: Arc<EngineShared>,
}

impl InstanceHandle {
    /// The instance ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Load the full instance record
    pub async fn status(&self) -> Result<InstanceRecord, EngineError> {
        self.shared
            .store()
            .load_instance(&self.id)
            .await?
            .ok_or_else(|| EngineError::InstanceNotFound(self.id.clone()))
    }

    /// Suspend the instance
    ///
    /// Best-effort: a vanished instance is a no-op. A step body that is
    /// already executing finishes its current suspension; the pause takes
    /// effect at the step's next checkpoint interaction.
    pub async fn pause(&self) -> Result<(), EngineError> {
        let result = self
            .shared
            .store()
            .update_instance(&self.id, InstancePatch::status(InstanceStatus::Paused))
            .await;

        match result {
            Ok(()) => {
                info!(instance_id = %self.id, "paused instance");
                Ok(())
            }
            Err(StoreError::InstanceNotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Resume a paused instance
    ///
    /// Spawns a fresh runner from the stored event; replay skips completed
    /// steps.
    pub async fn resume(&self) -> Result<(), EngineError> {
        let record = self.status().await?;
        let event = record
            .event
            .ok_or_else(|| EngineError::MissingEvent(self.id.clone()))?;

        if record.status != InstanceStatus::Paused {
            return Err(EngineError::NotPaused {
                id: self.id.clone(),
                status: record.status,
            });
        }

        self.shared
            .store()
            .update_instance(&self.id, InstancePatch::status(InstanceStatus::Running))
            .await?;

        info!(instance_id = %self.id, "resumed instance");
        runner::spawn(self.shared.clone(), self.id.clone(), event);
        Ok(())
    }

    /// Terminate the instance
    pub async fn terminate(&self) -> Result<(), EngineError> {
        self.shared
            .store()
            .update_instance(&self.id, InstancePatch::status(InstanceStatus::Terminated))
            .await?;

        info!(instance_id = %self.id, "terminated instance");
        Ok(())
    }

    /// Restart the instance from scratch
    ///
    /// Wipes every step checkpoint and spawns a fresh runner from the
    /// original triggering event.
    pub async fn restart(&self) -> Result<(), EngineError> {
        let record = self.status().await?;
        let event = record
            .event
            .ok_or_else(|| EngineError::MissingEvent(self.id.clone()))?;

        let store = self.shared.store();
        store.clear_step_states(&self.id).await?;
        store
            .update_instance(&self.id, InstancePatch::status(InstanceStatus::Queued))
            .await?;

        info!(instance_id = %self.id, "restarted instance");
        runner::spawn(self.shared.clone(), self.id.clone(), event);
        Ok(())
    }

    /// Send an external event to this instance
    pub async fn send_event(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.shared
            .route_event(&self.id, event_type, payload)
            .await?;
        Ok(())
    }
}

/// Random, human-readable instance ID
///
/// Collision-free in practice within a process lifetime; callers needing
/// stable identity pass their own IDs.
fn generate_instance_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INSTANCE_ID_LENGTH)
        .map(char::from)
        .collect();

    format!("wf-{}", suffix.to_lowercase())
}
