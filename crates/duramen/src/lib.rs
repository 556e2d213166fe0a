//! # Duramen
//!
//! An embedded durable workflow execution engine: user procedures run
//! locally, with persistence, event delivery and crash/restart recovery.
//!
//! ## Features
//!
//! - **Step checkpointing**: every step's outcome is persisted, so replaying
//!   a procedure after a restart skips completed steps and resumes exactly
//!   where it stopped
//! - **Durable timers**: sleeps record absolute deadlines that survive
//!   restarts
//! - **Event delivery**: events sent before the workflow starts waiting are
//!   parked in storage and consumed by the next matching wait
//! - **Automatic retries**: constant or exponential backoff with persisted
//!   backoff deadlines
//! - **Pluggable storage**: a single store trait with an in-memory reference
//!   implementation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                          │
//! │  (create / get / recover / send_event / shutdown)            │
//! └─────────────────────────────────────────────────────────────┘
//!                │ spawns                        │ routes
//!                ▼                               ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────┐
//! │        instance runner        │  │       EventRouter        │
//! │  (drives Workflow::run once   │  │  (one-shot listeners or  │
//! │   per live instance)          │  │   parked pending events) │
//! └──────────────────────────────┘  └──────────────────────────┘
//!                │ checkpoints through
//!                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowStore                           │
//! │  (instance records, step checkpoints, pending events)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use duramen::prelude::*;
//!
//! struct PaymentWorkflow;
//!
//! #[async_trait]
//! impl Workflow for PaymentWorkflow {
//!     async fn run(
//!         &self,
//!         event: InstanceEvent,
//!         step: StepExecutor,
//!     ) -> Result<serde_json::Value, StepError> {
//!         let amount = event.payload["amount"].clone();
//!
//!         let charge_id: String = step
//!             .execute_with(
//!                 "charge",
//!                 StepConfig::default().with_retries(RetryPolicy::exponential(3, "1 second")),
//!                 || async { /* call the payment provider */ Ok("ch_1".to_string()) },
//!             )
//!             .await?;
//!
//!         step.sleep("settlement-delay", "1 hour").await?;
//!
//!         let receipt = step
//!             .wait_for_event("receipt", WaitForEventOptions::new("receipt-uploaded"))
//!             .await?;
//!
//!         Ok(serde_json::json!({ "charge": charge_id, "amount": amount, "receipt": receipt }))
//!     }
//! }
//!
//! let engine = WorkflowEngine::new(PaymentWorkflow, InMemoryWorkflowStore::new());
//! let handle = engine
//!     .create(CreateOptions::new().with_params(serde_json::json!({ "amount": 125 })))
//!     .await?;
//! ```

pub mod duration;
pub mod engine;
pub mod event;
pub mod persistence;
pub mod reliability;
pub mod step;
pub mod workflow;

/// Prelude for common imports
pub mod prelude {
    pub use crate::duration::{DurationInput, SleepTarget};
    pub use crate::engine::{CreateOptions, EngineError, InstanceHandle, WorkflowEngine};
    pub use crate::persistence::{InMemoryWorkflowStore, StoreError, WorkflowStore};
    pub use crate::reliability::{Backoff, RetryPolicy};
    pub use crate::step::{StepConfig, StepError, StepExecutor, WaitForEventOptions};
    pub use crate::workflow::{
        InstanceEvent, InstancePatch, InstanceRecord, InstanceStatus, InstanceSummary, StepState,
        Workflow,
    };
    pub use async_trait::async_trait;
}

// Re-export key types at crate root
pub use duration::{DurationError, DurationInput, SleepTarget};
pub use engine::{CreateOptions, EngineError, InstanceHandle, ShutdownLatch, WorkflowEngine};
pub use event::EventRouter;
pub use persistence::{DisabledWorkflowStore, InMemoryWorkflowStore, StoreError, WorkflowStore};
pub use reliability::{Backoff, RetryPolicy};
pub use step::{StepConfig, StepError, StepExecutor, WaitForEventOptions, DEFAULT_EVENT_TIMEOUT_MS};
pub use workflow::{
    InstanceEvent, InstancePatch, InstanceRecord, InstanceStatus, InstanceSummary, StepState,
    Workflow,
};
