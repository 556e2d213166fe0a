//! Workflow trait definition

use async_trait::async_trait;

use super::InstanceEvent;
use crate::step::{StepError, StepExecutor};

/// A workflow is a user procedure expressed as an ordered sequence of named steps
///
/// The engine drives `run` once per live instance. Inside `run`, every piece
/// of work goes through the [`StepExecutor`]: each step call checkpoints its
/// outcome, so replaying `run` after a crash skips already-completed steps
/// and resumes exactly where execution stopped.
///
/// # Replay safety
///
/// `run` may be invoked many times for the same instance. Code *between*
/// step calls must therefore be cheap and side-effect free; anything with an
/// observable effect belongs inside a step body. A crash between a body
/// completing and its checkpoint being written re-runs the body on recovery,
/// so bodies must be safe under retry.
///
/// # Example
///
/// ```ignore
/// use duramen::prelude::*;
///
/// struct OrderWorkflow;
///
/// #[async_trait]
/// impl Workflow for OrderWorkflow {
///     async fn run(
///         &self,
///         event: InstanceEvent,
///         step: StepExecutor,
///     ) -> Result<serde_json::Value, StepError> {
///         let charged: bool = step
///             .execute("charge", || async { Ok(true) })
///             .await?;
///
///         step.sleep("cooldown", "30 seconds").await?;
///
///         let receipt = step
///             .wait_for_event("confirmation", WaitForEventOptions::new("order-confirmed"))
///             .await?;
///
///         Ok(serde_json::json!({ "charged": charged, "receipt": receipt }))
///     }
/// }
/// ```
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    /// Execute the workflow for one instance
    ///
    /// `event` is the instance's triggering event (caller parameters,
    /// creation timestamp, instance ID). The return value becomes the
    /// instance's `output`; an escaped [`StepError`] becomes its `error`.
    async fn run(
        &self,
        event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError>;
}
