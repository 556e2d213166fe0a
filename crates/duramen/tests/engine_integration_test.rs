//! End-to-end tests for the workflow engine against the in-memory store
//!
//! Run with: cargo test -p duramen --test engine_integration_test

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use duramen::prelude::*;

/// Poll an instance until it reaches the expected status
async fn wait_for_status(
    handle: &InstanceHandle,
    expected: InstanceStatus,
    timeout: Duration,
) -> InstanceRecord {
    let deadline = Instant::now() + timeout;

    loop {
        let record = handle.status().await.expect("instance should exist");
        if record.status == expected {
            return record;
        }
        assert!(
            Instant::now() < deadline,
            "instance {} stuck in {:?} waiting for {:?}",
            handle.id(),
            record.status,
            expected
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================
// Scenario Workflows
// ============================================

/// Returns `payload.value * 2`
struct MultiplyWorkflow;

#[async_trait]
impl Workflow for MultiplyWorkflow {
    async fn run(
        &self,
        event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        let doubled: i64 = step
            .execute("double", || {
                let value = event.payload["value"].as_i64().unwrap_or(0);
                async move { Ok(value * 2) }
            })
            .await?;

        Ok(json!(doubled))
    }
}

/// Two computation steps separated by a durable sleep
struct SleepyMathWorkflow {
    first_step_runs: Arc<AtomicU32>,
}

#[async_trait]
impl Workflow for SleepyMathWorkflow {
    async fn run(
        &self,
        event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        let runs = self.first_step_runs.clone();
        let r1: i64 = step
            .execute("double", || {
                let value = event.payload["value"].as_i64().unwrap_or(0);
                runs.fetch_add(1, Ordering::SeqCst);
                async move { Ok(value * 2) }
            })
            .await?;

        step.sleep("pause-between", 200u64).await?;

        let r2: i64 = step.execute("add-ten", || async move { Ok(r1 + 10) }).await?;

        Ok(json!(r2))
    }
}

/// Fails twice, then succeeds; records the start time of every attempt
struct FlakyWorkflow {
    started: Instant,
    attempt_offsets_ms: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl Workflow for FlakyWorkflow {
    async fn run(
        &self,
        _event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        let started = self.started;
        let offsets = self.attempt_offsets_ms.clone();

        let result: String = step
            .execute_with(
                "flaky",
                StepConfig::default()
                    .with_retries(RetryPolicy::exponential(2, 50u64)),
                move || {
                    let offsets = offsets.clone();
                    async move {
                        let mut offsets = offsets.lock().unwrap();
                        offsets.push(started.elapsed().as_millis() as u64);
                        if offsets.len() < 3 {
                            return Err(StepError::retryable("transient failure"));
                        }
                        Ok("success".to_string())
                    }
                },
            )
            .await?;

        Ok(json!(result))
    }
}

/// Waits for an event that may have been sent before the wait began
struct LateWaiterWorkflow;

#[async_trait]
impl Workflow for LateWaiterWorkflow {
    async fn run(
        &self,
        _event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        // give the sender a head start so the event is parked before the wait
        step.sleep("head-start", 100u64).await?;

        step.wait_for_event("receive", WaitForEventOptions::new("test-event"))
            .await
    }
}

/// Waits for an event that never arrives
struct NeverWorkflow;

#[async_trait]
impl Workflow for NeverWorkflow {
    async fn run(
        &self,
        _event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        step.wait_for_event(
            "w1",
            WaitForEventOptions::new("never").with_timeout("1 second"),
        )
        .await
    }
}

/// Fails immediately with a non-retryable error
struct DoomedWorkflow {
    body_runs: Arc<AtomicU32>,
}

#[async_trait]
impl Workflow for DoomedWorkflow {
    async fn run(
        &self,
        _event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        let runs = self.body_runs.clone();

        step.execute_with(
            "doomed",
            StepConfig::default().with_retries(RetryPolicy::constant(5, 10u64)),
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
                async move { Err::<serde_json::Value, _>(StepError::non_retryable("Non-retryable error")) }
            },
        )
        .await
    }
}

/// Behavior switched by `payload.mode`: finish, fail, sleep or wait
struct ScenarioWorkflow;

#[async_trait]
impl Workflow for ScenarioWorkflow {
    async fn run(
        &self,
        event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        match event.payload["mode"].as_str().unwrap_or("finish") {
            "fail" => {
                step.execute("explode", || async {
                    Err::<serde_json::Value, _>(StepError::non_retryable("boom"))
                })
                .await
            }
            "sleep" => {
                step.sleep("long-nap", "1 hour").await?;
                Ok(json!("woke up"))
            }
            "wait" => {
                step.wait_for_event("signal", WaitForEventOptions::new("signal"))
                    .await
            }
            _ => Ok(json!("done")),
        }
    }
}

/// One counting step, used to observe replay and restart semantics
struct CountingWorkflow {
    body_runs: Arc<AtomicU32>,
}

#[async_trait]
impl Workflow for CountingWorkflow {
    async fn run(
        &self,
        event: InstanceEvent,
        step: StepExecutor,
    ) -> Result<serde_json::Value, StepError> {
        let runs = self.body_runs.clone();
        let value: i64 = step
            .execute("count", || {
                let value = event.payload["value"].as_i64().unwrap_or(0);
                runs.fetch_add(1, Ordering::SeqCst);
                async move { Ok(value + 1) }
            })
            .await?;

        Ok(json!(value))
    }
}

// ============================================
// Concrete Scenarios
// ============================================

#[test_log::test(tokio::test)]
async fn test_simple_multiply() {
    let engine = WorkflowEngine::new(MultiplyWorkflow, InMemoryWorkflowStore::new());

    let handle = engine
        .create(CreateOptions::new().with_params(json!({"value": 10})))
        .await
        .unwrap();

    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;
    assert_eq!(record.output, Some(json!(20)));
    assert!(record.error.is_none());
}

#[test_log::test(tokio::test)]
async fn test_recover_across_restart() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let first_step_runs = Arc::new(AtomicU32::new(0));

    let engine = WorkflowEngine::with_store(
        SleepyMathWorkflow {
            first_step_runs: first_step_runs.clone(),
        },
        store.clone(),
    );

    let handle = engine
        .create(
            CreateOptions::new()
                .with_id("wf-recover")
                .with_params(json!({"value": 5})),
        )
        .await
        .unwrap();

    // let the first step finish and the durable sleep begin, then pause
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.pause().await.unwrap();

    // a fresh engine generation over the same store, as after a process restart
    let recovered_engine = WorkflowEngine::with_store(
        SleepyMathWorkflow {
            first_step_runs: first_step_runs.clone(),
        },
        store.clone(),
    );
    let spawned = recovered_engine.recover().await.unwrap();
    assert_eq!(spawned, 1);

    let handle = recovered_engine.get("wf-recover").await.unwrap();
    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;

    assert_eq!(record.output, Some(json!(20)));
    // the completed first step replayed from its checkpoint, never re-ran
    assert_eq!(first_step_runs.load(Ordering::SeqCst), 1);
}

#[test_log::test(tokio::test)]
async fn test_exponential_backoff_timings() {
    let attempt_offsets_ms = Arc::new(Mutex::new(Vec::new()));
    let engine = WorkflowEngine::new(
        FlakyWorkflow {
            started: Instant::now(),
            attempt_offsets_ms: attempt_offsets_ms.clone(),
        },
        InMemoryWorkflowStore::new(),
    );

    let handle = engine.create(CreateOptions::new()).await.unwrap();
    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(3)).await;
    assert_eq!(record.output, Some(json!("success")));

    let offsets = attempt_offsets_ms.lock().unwrap();
    assert_eq!(offsets.len(), 3, "expected exactly three attempts");

    let first_gap = offsets[1] - offsets[0];
    let second_gap = offsets[2] - offsets[1];
    assert!(
        (45..=70).contains(&first_gap),
        "first backoff was {first_gap} ms"
    );
    assert!(
        (95..=120).contains(&second_gap),
        "second backoff was {second_gap} ms"
    );
}

#[test_log::test(tokio::test)]
async fn test_event_sent_before_wait_is_consumed() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::with_store(LateWaiterWorkflow, store.clone());

    let handle = engine.create(CreateOptions::new()).await.unwrap();

    // the workflow is still in its head-start sleep; the event gets parked
    handle.send_event("test-event", json!("early")).await.unwrap();

    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;
    assert_eq!(record.output, Some(json!("early")));
    assert_eq!(store.pending_event_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_wait_for_event_timeout() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::with_store(NeverWorkflow, store.clone());

    let handle = engine.create(CreateOptions::new()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let record = wait_for_status(&handle, InstanceStatus::Errored, Duration::from_secs(1)).await;

    let error = record.error.expect("errored instance records a message");
    assert!(error.contains("Timeout"), "error was {error:?}");

    let checkpoint = store.load_step_state(handle.id(), "w1").await.unwrap();
    assert!(
        matches!(checkpoint, Some(StepState::Failed { .. })),
        "checkpoint was {checkpoint:?}"
    );
}

#[test_log::test(tokio::test)]
async fn test_non_retryable_error_fails_immediately() {
    let body_runs = Arc::new(AtomicU32::new(0));
    let engine = WorkflowEngine::new(
        DoomedWorkflow {
            body_runs: body_runs.clone(),
        },
        InMemoryWorkflowStore::new(),
    );

    let handle = engine.create(CreateOptions::new()).await.unwrap();
    let record = wait_for_status(&handle, InstanceStatus::Errored, Duration::from_secs(2)).await;

    assert_eq!(record.error, Some("Non-retryable error".to_string()));
    assert_eq!(body_runs.load(Ordering::SeqCst), 1);
}

// ============================================
// Universal Invariants
// ============================================

#[test_log::test(tokio::test)]
async fn test_event_delivery_is_first_wins() {
    let engine = WorkflowEngine::new(LateWaiterWorkflow, InMemoryWorkflowStore::new());
    let handle = engine.create(CreateOptions::new()).await.unwrap();

    handle.send_event("test-event", json!("first")).await.unwrap();
    handle.send_event("test-event", json!("second")).await.unwrap();

    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;
    assert_eq!(record.output, Some(json!("first")));
}

#[test_log::test(tokio::test)]
async fn test_event_during_active_wait_leaves_no_pending_record() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::with_store(ScenarioWorkflow, store.clone());

    let handle = engine
        .create(CreateOptions::new().with_params(json!({"mode": "wait"})))
        .await
        .unwrap();

    // the wait registers its listener and parks the instance as waiting
    wait_for_status(&handle, InstanceStatus::Waiting, Duration::from_secs(2)).await;

    handle.send_event("signal", json!({"go": true})).await.unwrap();

    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;
    assert_eq!(record.output, Some(json!({"go": true})));
    assert_eq!(store.pending_event_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_restart_reruns_from_the_original_event() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let body_runs = Arc::new(AtomicU32::new(0));
    let engine = WorkflowEngine::with_store(
        CountingWorkflow {
            body_runs: body_runs.clone(),
        },
        store.clone(),
    );

    let handle = engine
        .create(CreateOptions::new().with_params(json!({"value": 41})))
        .await
        .unwrap();
    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;
    assert_eq!(record.output, Some(json!(42)));
    assert_eq!(body_runs.load(Ordering::SeqCst), 1);

    handle.restart().await.unwrap();
    let record = wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;

    // checkpoints were wiped, so the body ran again off the original event
    assert_eq!(record.output, Some(json!(42)));
    assert_eq!(body_runs.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn test_active_listing_matches_statuses() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::with_store(ScenarioWorkflow, store.clone());

    let finished = engine
        .create(
            CreateOptions::new()
                .with_id("wf-finished")
                .with_params(json!({"mode": "finish"})),
        )
        .await
        .unwrap();
    let failed = engine
        .create(
            CreateOptions::new()
                .with_id("wf-failed")
                .with_params(json!({"mode": "fail"})),
        )
        .await
        .unwrap();
    let sleeping = engine
        .create(
            CreateOptions::new()
                .with_id("wf-sleeping")
                .with_params(json!({"mode": "sleep"})),
        )
        .await
        .unwrap();
    let killed = engine
        .create(
            CreateOptions::new()
                .with_id("wf-killed")
                .with_params(json!({"mode": "sleep"})),
        )
        .await
        .unwrap();

    wait_for_status(&finished, InstanceStatus::Complete, Duration::from_secs(2)).await;
    wait_for_status(&failed, InstanceStatus::Errored, Duration::from_secs(2)).await;
    killed.terminate().await.unwrap();
    wait_for_status(&killed, InstanceStatus::Terminated, Duration::from_secs(2)).await;
    let _ = sleeping;

    let mut active = store.list_active_instances().await.unwrap();
    active.sort();
    assert_eq!(active, vec!["wf-failed", "wf-sleeping"]);

    assert_eq!(store.list_instance_summaries().await.unwrap().len(), 4);
}

#[test_log::test(tokio::test)]
async fn test_recover_skips_records_without_an_event() {
    let store = Arc::new(InMemoryWorkflowStore::new());

    // a corrupt record: active status but no triggering event
    store
        .save_instance(
            "wf-corrupt",
            InstanceRecord {
                status: InstanceStatus::Running,
                event: None,
                output: None,
                error: None,
            },
        )
        .await
        .unwrap();

    let engine = WorkflowEngine::with_store(MultiplyWorkflow, store.clone());
    let handle = engine
        .create(
            CreateOptions::new()
                .with_id("wf-valid")
                .with_params(json!({"value": 3})),
        )
        .await
        .unwrap();
    wait_for_status(&handle, InstanceStatus::Complete, Duration::from_secs(2)).await;

    // mark it active again so the scan picks it up
    store
        .update_instance("wf-valid", InstancePatch::status(InstanceStatus::Running))
        .await
        .unwrap();

    let recovered = engine.recover().await.unwrap();
    assert_eq!(recovered, 1);
}

#[test_log::test(tokio::test)]
async fn test_pause_is_observable_until_resume() {
    let engine = WorkflowEngine::new(ScenarioWorkflow, InMemoryWorkflowStore::new());

    let handle = engine
        .create(CreateOptions::new().with_params(json!({"mode": "sleep"})))
        .await
        .unwrap();

    wait_for_status(&handle, InstanceStatus::Running, Duration::from_secs(2)).await;
    handle.pause().await.unwrap();
    assert_eq!(handle.status().await.unwrap().status, InstanceStatus::Paused);

    // still paused after a beat; nothing overwrites it behind our back
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.status().await.unwrap().status, InstanceStatus::Paused);

    handle.resume().await.unwrap();
    wait_for_status(&handle, InstanceStatus::Running, Duration::from_secs(2)).await;
}

#[test_log::test(tokio::test)]
async fn test_shutdown_stalls_everything_silently() {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::with_store(ScenarioWorkflow, store.clone());

    let handle = engine
        .create(CreateOptions::new().with_params(json!({"mode": "wait"})))
        .await
        .unwrap();
    wait_for_status(&handle, InstanceStatus::Waiting, Duration::from_secs(2)).await;

    engine.shutdown();

    // the waiter's event arrives after shutdown; its checkpoint write stalls
    engine
        .send_event(handle.id(), "signal", json!("too late"))
        .await
        .ok();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let record = store.load_instance(handle.id()).await.unwrap().unwrap();
    assert_ne!(record.status, InstanceStatus::Complete);

    // new work never completes either: the disabled store swallows it
    let create_after_shutdown = tokio::time::timeout(
        Duration::from_millis(200),
        engine.create(CreateOptions::new()),
    )
    .await;
    assert!(create_after_shutdown.is_err(), "create should stall forever");
}
