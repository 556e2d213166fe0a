//! Per-instance driver

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::manager::EngineShared;
use crate::step::StepExecutor;
use crate::workflow::{InstanceEvent, InstancePatch, InstanceStatus};

/// Spawn a runner task for one instance
///
/// The runner is deliberately dumb: replay safety lives entirely in the step
/// executor, so all it does is mark the instance running, invoke the user's
/// `run`, and record the terminal outcome. A runner replaying a recovered
/// instance is indistinguishable from a fresh one.
pub(crate) fn spawn(shared: Arc<EngineShared>, instance_id: String, event: InstanceEvent) {
    tokio::spawn(run_instance(shared, instance_id, event));
}

async fn run_instance(shared: Arc<EngineShared>, instance_id: String, event: InstanceEvent) {
    shared.active.insert(instance_id.clone(), Utc::now());

    if let Err(err) = shared
        .store()
        .update_instance(&instance_id, InstancePatch::status(InstanceStatus::Running))
        .await
    {
        error!(%instance_id, %err, "failed to mark instance running");
        shared.active.remove(&instance_id);
        return;
    }

    debug!(%instance_id, "invoking workflow");
    let step = StepExecutor::new(shared.clone(), instance_id.clone());
    let outcome = shared.workflow.run(event, step).await;

    let patch = match outcome {
        Ok(output) => {
            info!(%instance_id, "workflow complete");
            InstancePatch::status(InstanceStatus::Complete).with_output(output)
        }
        Err(err) => {
            warn!(%instance_id, error = %err.message, "workflow errored");
            InstancePatch::status(InstanceStatus::Errored).with_error(err.message)
        }
    };

    if let Err(err) = shared.store().update_instance(&instance_id, patch).await {
        error!(%instance_id, %err, "failed to record terminal status");
    }

    shared.active.remove(&instance_id);
}
