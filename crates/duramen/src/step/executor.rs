//! Step executor with checkpoint/replay support
//!
//! The `StepExecutor` is the object handed to user code. Every operation
//! follows the same protocol: consult the checkpoint, short-circuit if the
//! step already reached a terminal state, otherwise perform the work and
//! persist intermediate and final checkpoints. Replay after a restart is
//! therefore free: completed steps return their stored outcome without
//! re-running their bodies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::config::{StepConfig, WaitForEventOptions, DEFAULT_EVENT_TIMEOUT_MS};
use super::error::StepError;
use crate::duration::{now_millis, parse_duration, DurationInput, SleepTarget};
use crate::engine::EngineShared;
use crate::persistence::WorkflowStore;
use crate::workflow::{InstancePatch, InstanceStatus, StepState};

/// Executes named steps for one workflow instance
///
/// Cheap to clone; the handle carries the instance ID and a reference to the
/// engine's shared state (store, router, shutdown latch). Step names must be
/// unique within an instance: the same name reaching the executor twice is
/// the same step resuming.
#[derive(Clone)]
pub struct StepExecutor {
    shared: Arc<EngineShared>,
    instance_id: String,
}

impl StepExecutor {
    pub(crate) fn new(shared: Arc<EngineShared>, instance_id: String) -> Self {
        Self {
            shared,
            instance_id,
        }
    }

    /// ID of the instance this executor belongs to
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn store(&self) -> Arc<dyn WorkflowStore> {
        self.shared.store()
    }

    /// Run a work step with default options (single attempt, no retries)
    pub async fn execute<T, F, Fut>(&self, name: &str, body: F) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StepError>> + Send,
    {
        self.execute_with(name, StepConfig::default(), body).await
    }

    /// Run a work step
    ///
    /// The body executes at most `1 + limit` times across the whole life of
    /// the instance; once a `completed` or `failed` checkpoint exists, every
    /// later call (including replays after a restart) returns the stored
    /// outcome without invoking the body.
    pub async fn execute_with<T, F, Fut>(
        &self,
        name: &str,
        config: StepConfig,
        mut body: F,
    ) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StepError>> + Send,
    {
        let retry = config.retries.unwrap_or_default();

        self.halt_if_shutdown().await;
        let mut retries = match self.store().load_step_state(&self.instance_id, name).await? {
            Some(StepState::Completed { result, .. }) => {
                debug!(instance_id = %self.instance_id, step = name, "replaying completed step");
                return serde_json::from_value(result).map_err(|err| {
                    StepError::non_retryable(format!(
                        "failed to decode checkpointed result for step {name}: {err}"
                    ))
                });
            }
            Some(StepState::Failed { error, .. }) => {
                debug!(instance_id = %self.instance_id, step = name, "replaying failed step");
                return Err(StepError::non_retryable(error));
            }
            Some(StepState::Retrying {
                retry_end_time,
                retries,
            }) => {
                // resume a backoff that was in flight when the process died
                self.wait_until(retry_end_time).await;
                retries
            }
            Some(StepState::Running { retries }) => retries,
            _ => 0,
        };

        loop {
            self.checkpoint_gate().await?;
            self.store()
                .update_step_state(&self.instance_id, name, StepState::Running { retries })
                .await?;

            debug!(
                instance_id = %self.instance_id,
                step = name,
                attempt = retries + 1,
                "executing step body"
            );

            match body().await {
                Ok(value) => {
                    let result = serde_json::to_value(&value).map_err(|err| {
                        StepError::non_retryable(format!(
                            "failed to encode result for step {name}: {err}"
                        ))
                    })?;

                    self.checkpoint_gate().await?;
                    self.store()
                        .update_step_state(
                            &self.instance_id,
                            name,
                            StepState::Completed {
                                result,
                                retries: Some(retries),
                            },
                        )
                        .await?;

                    return Ok(value);
                }
                Err(err) => {
                    if !err.retryable || retries >= retry.limit {
                        warn!(
                            instance_id = %self.instance_id,
                            step = name,
                            error = %err.message,
                            retries,
                            "step failed"
                        );

                        self.checkpoint_gate().await?;
                        self.store()
                            .update_step_state(
                                &self.instance_id,
                                name,
                                StepState::Failed {
                                    error: err.message.clone(),
                                    retries: Some(retries),
                                },
                            )
                            .await?;

                        return Err(err);
                    }

                    retries += 1;
                    let delay_ms = retry.delay_for_retry(retries)?;
                    let retry_end_time = now_millis() + delay_ms as i64;

                    debug!(
                        instance_id = %self.instance_id,
                        step = name,
                        retries,
                        delay_ms,
                        "step failed, backing off"
                    );

                    self.checkpoint_gate().await?;
                    self.store()
                        .update_step_state(
                            &self.instance_id,
                            name,
                            StepState::Retrying {
                                retry_end_time,
                                retries,
                            },
                        )
                        .await?;

                    self.wait_until(retry_end_time).await;
                }
            }
        }
    }

    /// Durable sleep for a relative duration
    ///
    /// The absolute deadline is checkpointed, so a restart mid-sleep resumes
    /// the original deadline instead of restarting the clock.
    pub async fn sleep(
        &self,
        name: &str,
        duration: impl Into<DurationInput>,
    ) -> Result<(), StepError> {
        let millis = parse_duration(&duration.into())?;
        if millis == 0 {
            return Err(StepError::non_retryable(format!(
                "sleep duration for step {name} must be positive"
            ))
            .with_type("validation"));
        }

        self.sleep_to_deadline(name, || Ok(now_millis() + millis as i64))
            .await
    }

    /// Durable sleep until an absolute point in time
    ///
    /// Accepts a datetime or a seconds-since-epoch numeric. A target already
    /// in the past is rejected when the step first runs; on replay the
    /// recorded deadline is honored even if it has since passed.
    pub async fn sleep_until(
        &self,
        name: &str,
        target: impl Into<SleepTarget>,
    ) -> Result<(), StepError> {
        let end = target.into().epoch_millis();
        let step_name = name.to_string();

        self.sleep_to_deadline(name, move || {
            if end <= now_millis() {
                return Err(StepError::non_retryable(format!(
                    "sleep_until target for step {step_name} is in the past"
                ))
                .with_type("validation"));
            }
            Ok(end)
        })
        .await
    }

    async fn sleep_to_deadline(
        &self,
        name: &str,
        compute_end: impl FnOnce() -> Result<i64, StepError> + Send,
    ) -> Result<(), StepError> {
        self.halt_if_shutdown().await;
        let end = match self.store().load_step_state(&self.instance_id, name).await? {
            Some(StepState::Completed { .. }) => return Ok(()),
            Some(StepState::Sleeping { sleep_end_time }) => {
                debug!(instance_id = %self.instance_id, step = name, "resuming recorded sleep");
                sleep_end_time
            }
            _ => {
                let end = compute_end()?;
                self.checkpoint_gate().await?;
                self.store()
                    .update_step_state(
                        &self.instance_id,
                        name,
                        StepState::Sleeping {
                            sleep_end_time: end,
                        },
                    )
                    .await?;
                end
            }
        };

        self.wait_until(end).await;

        self.checkpoint_gate().await?;
        self.store()
            .update_step_state(
                &self.instance_id,
                name,
                StepState::Completed {
                    result: serde_json::Value::Null,
                    retries: None,
                },
            )
            .await?;

        Ok(())
    }

    /// Wait for an external event
    ///
    /// A pending event parked before this step started waiting is consumed
    /// immediately. Otherwise the step blocks on an in-process listener,
    /// bounded by the timeout (default 24 hours); expiry fails the step with
    /// a `Timeout` error.
    pub async fn wait_for_event(
        &self,
        name: &str,
        options: WaitForEventOptions,
    ) -> Result<serde_json::Value, StepError> {
        let timeout_ms = match &options.timeout {
            Some(timeout) => parse_duration(timeout)?,
            None => DEFAULT_EVENT_TIMEOUT_MS,
        };

        self.halt_if_shutdown().await;
        match self.store().load_step_state(&self.instance_id, name).await? {
            Some(StepState::Completed { result, .. }) => return Ok(result),
            Some(StepState::Failed { error, .. }) => return Err(StepError::non_retryable(error)),
            _ => {}
        }

        self.checkpoint_gate().await?;
        self.store()
            .update_step_state(
                &self.instance_id,
                name,
                StepState::WaitingForEvent {
                    wait_event_type: options.event_type.clone(),
                    wait_timeout: timeout_ms,
                },
            )
            .await?;

        let mut payload = self
            .store()
            .load_pending_event(&self.instance_id, &options.event_type)
            .await?;

        if payload.is_none() {
            let rx = self
                .shared
                .router
                .subscribe(&self.instance_id, &options.event_type);

            // a send can slip in between the pending check and the listener
            // registration; it would land in storage, so look once more
            payload = self
                .store()
                .load_pending_event(&self.instance_id, &options.event_type)
                .await?;

            if payload.is_some() {
                self.shared
                    .router
                    .unsubscribe(&self.instance_id, &options.event_type);
            } else {
                self.checkpoint_gate().await?;
                self.store()
                    .update_instance(
                        &self.instance_id,
                        InstancePatch::status(InstanceStatus::Waiting),
                    )
                    .await?;

                debug!(
                    instance_id = %self.instance_id,
                    step = name,
                    event_type = %options.event_type,
                    timeout_ms,
                    "waiting for event"
                );

                self.halt_if_shutdown().await;
                tokio::select! {
                    received = rx => {
                        payload = received.ok();
                    }
                    _ = sleep(Duration::from_millis(timeout_ms)) => {}
                }
                self.halt_if_shutdown().await;

                self.shared
                    .router
                    .unsubscribe(&self.instance_id, &options.event_type);
                self.leave_waiting().await?;
            }
        }

        match payload {
            Some(value) => {
                self.checkpoint_gate().await?;
                self.store()
                    .update_step_state(
                        &self.instance_id,
                        name,
                        StepState::Completed {
                            result: value.clone(),
                            retries: None,
                        },
                    )
                    .await?;

                Ok(value)
            }
            None => {
                warn!(
                    instance_id = %self.instance_id,
                    step = name,
                    event_type = %options.event_type,
                    "wait for event timed out"
                );

                self.checkpoint_gate().await?;
                self.store()
                    .update_step_state(
                        &self.instance_id,
                        name,
                        StepState::Failed {
                            error: "Timeout".to_string(),
                            retries: None,
                        },
                    )
                    .await?;

                Err(StepError::timeout())
            }
        }
    }

    /// Restore `running` after a wait, unless something else (pause,
    /// terminate) changed the status in the meantime
    async fn leave_waiting(&self) -> Result<(), StepError> {
        if let Some(record) = self.store().load_instance(&self.instance_id).await? {
            if record.status == InstanceStatus::Waiting {
                self.store()
                    .update_instance(
                        &self.instance_id,
                        InstancePatch::status(InstanceStatus::Running),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Sleep until an absolute epoch-ms deadline, honoring the shutdown latch
    /// on both sides of the timer
    async fn wait_until(&self, end: i64) {
        let remaining = end - now_millis();
        if remaining > 0 {
            self.halt_if_shutdown().await;
            sleep(Duration::from_millis(remaining as u64)).await;
            self.halt_if_shutdown().await;
        }
    }

    /// Park forever when the engine has been shut down
    async fn halt_if_shutdown(&self) {
        if self.shared.latch.is_raised() {
            debug!(instance_id = %self.instance_id, "engine halted, parking step");
            std::future::pending::<()>().await;
        }
    }

    /// Gate run before every checkpoint write
    ///
    /// Parks forever under shutdown, pause or termination; errors when the
    /// instance record has vanished.
    async fn checkpoint_gate(&self) -> Result<(), StepError> {
        self.halt_if_shutdown().await;

        match self.store().load_instance(&self.instance_id).await? {
            None => Err(StepError::non_retryable(format!(
                "instance {} no longer exists",
                self.instance_id
            ))),
            Some(record)
                if matches!(
                    record.status,
                    InstanceStatus::Paused | InstanceStatus::Terminated
                ) =>
            {
                debug!(
                    instance_id = %self.instance_id,
                    status = %record.status,
                    "instance suspended, parking step"
                );
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(_) => Ok(()),
        }
    }
}
