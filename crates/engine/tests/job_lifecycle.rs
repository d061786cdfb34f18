//! Dispatch, result ingestion and recovery commands.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use common::harness;
use waveline_core::error::CoreError;
use waveline_core::job::ParameterOverrides;
use waveline_core::liveness::Termination;
use waveline_core::lock::LockStore;
use waveline_core::status::JobStatus;
use waveline_core::store::JobStore;
use waveline_core::types::JobKey;
use waveline_dispatch::{DispatchError, RawResponse, TransportFailure};
use waveline_engine::jobs::IngestOutcome;
use waveline_engine::EngineError;

#[tokio::test]
async fn run_locks_marks_in_progress_and_dispatches_with_callback() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service
        .reply_to_dispatch(Ok(RawResponse::new(202, r#"{"pid": 4321}"#)));

    let outcome = h.run(&key, None).await.unwrap();

    assert_eq!(outcome.job.status, JobStatus::InProgress);
    assert_eq!(outcome.job.parameters.as_ref().unwrap().secret, "***");
    assert_eq!(outcome.worker_pid, Some(4321));
    assert_eq!(
        outcome.callback_url,
        "http://coordinator.test/api/v1/webhooks/migration-result?source_id=A&target_id=1"
    );

    let lock = h.locks.find(&key).await.unwrap().unwrap();
    assert_eq!(lock.pid, Some(4321));
    assert_eq!(lock.current_stage.as_deref(), Some("dispatched"));

    let sent = h.service.requests.lock().unwrap()[0].clone();
    let body: serde_json::Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["secret"], "s3cr3t");
    assert_eq!(body["callback_url"], outcome.callback_url);
}

#[tokio::test]
async fn second_run_while_in_progress_is_rejected() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();

    let err = h.run(&key, None).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::AlreadyLocked { .. }));
    assert_eq!(h.service.dispatch_count(), 1);
}

#[tokio::test]
async fn concurrent_runs_on_one_key_have_a_single_winner() {
    let h = harness().await;
    let key = JobKey::new("A", 1);

    let (a, b) = tokio::join!(h.run(&key, None), h.run(&key, None));
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(h.locks.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn transport_failure_retries_three_times_and_rolls_back() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service
        .reply_to_dispatch(Err(TransportFailure("connection refused".into())));

    let err = h.run(&key, None).await.unwrap_err();

    assert_matches!(
        err,
        EngineError::Dispatch(DispatchError::Transport { attempts: 3, .. })
    );
    assert_eq!(h.service.dispatch_count(), 3);
    assert!(h.locks.find(&key).await.unwrap().is_none());
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn rejection_is_not_retried_and_leaves_job_pending() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service
        .reply_to_dispatch(Ok(RawResponse::new(400, "unknown site")));

    let err = h.run(&key, None).await.unwrap_err();

    assert_matches!(
        err,
        EngineError::Dispatch(DispatchError::Rejected { status: 400, .. })
    );
    assert_eq!(h.service.dispatch_count(), 1);
    assert!(h.locks.find(&key).await.unwrap().is_none());
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn abandoned_run_still_rolls_back_when_dispatch_fails() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service.set_latency(Duration::from_millis(50));
    h.service
        .reply_to_dispatch(Err(TransportFailure("connection reset".into())));

    // The caller gives up long before the three attempts are spent.
    let abandoned = tokio::time::timeout(Duration::from_millis(10), h.run(&key, None)).await;
    assert!(abandoned.is_err());

    let mut rolled_back = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let job = h.store.find(&key).await.unwrap().unwrap();
        if job.status == JobStatus::Pending && h.locks.find(&key).await.unwrap().is_none() {
            assert!(job.parameters.is_none());
            rolled_back = true;
            break;
        }
    }
    assert!(rolled_back, "lock or in_progress status left behind");
    assert_eq!(h.service.dispatch_count(), 3);

    h.service.set_latency(Duration::ZERO);
    h.service.reply_to_dispatch(Ok(RawResponse::new(202, "{}")));
    h.run(&key, None).await.unwrap();
}

#[tokio::test]
async fn failed_restart_restores_previous_parameters() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();
    h.webhook(json!({"source_id": "A", "target_id": 1, "status": "completed"}))
        .await
        .unwrap();
    h.service
        .reply_to_dispatch(Ok(RawResponse::new(422, "site not found")));

    let overrides = ParameterOverrides {
        site_id: Some("site-2".into()),
        ..Default::default()
    };
    let err = h.engine.jobs.restart(&key, overrides, false).await.unwrap_err();

    assert_matches!(err, EngineError::Dispatch(DispatchError::Rejected { status: 422, .. }));
    let job = h.store.find(&key).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.parameters.unwrap().site_id, "site-1");
    assert!(h.locks.find(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn webhook_success_completes_and_redelivery_is_a_no_op() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();

    let payload = json!({"source_id": "A", "target_id": 1, "status": "success"});
    let first = h.webhook(payload.clone()).await.unwrap();
    assert_matches!(first, IngestOutcome::Applied { ref job } if job.status == JobStatus::Completed);
    assert!(h.locks.find(&key).await.unwrap().is_none());

    let completed = h.store.find(&key).await.unwrap().unwrap();
    let second = h.webhook(payload).await.unwrap();
    assert_matches!(second, IngestOutcome::Duplicate { .. });

    let after = h.store.find(&key).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.updated_at, completed.updated_at);
    assert_eq!(after.result_hash, completed.result_hash);
}

#[tokio::test]
async fn different_terminal_result_is_kept_out_unless_forced() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();
    h.webhook(json!({"source_id": "A", "target_id": 1, "status": "completed"}))
        .await
        .unwrap();

    let late = h
        .webhook(json!({"source_id": "A", "target_id": 1, "status": "failed", "error_message": "boom"}))
        .await
        .unwrap();
    assert_matches!(late, IngestOutcome::Conflict { incoming: JobStatus::Error, .. });
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::Completed
    );

    let forced = h
        .webhook(json!({"source_id": "A", "target_id": 1, "status": "failed", "force": true}))
        .await
        .unwrap();
    assert_matches!(forced, IngestOutcome::Overridden { previous: JobStatus::Completed, .. });
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::Error
    );
}

#[tokio::test]
async fn webhook_without_target_is_rejected_without_side_effects() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();

    let err = h
        .webhook(json!({"source_id": "A", "status": "success"}))
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::InProgress
    );
    assert!(h.locks.find(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn webhook_for_unknown_job_is_a_correlation_failure() {
    let h = harness().await;
    let err = h
        .webhook(json!({"source_id": "ghost", "target_id": 9, "status": "success"}))
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Correlation(_)));
}

#[tokio::test]
async fn progress_report_refreshes_the_lock_stage() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();

    let outcome = h
        .webhook(json!({"source_id": "A", "target_id": 1, "status": "running", "stage": "copying pages"}))
        .await
        .unwrap();
    assert_matches!(outcome, IngestOutcome::Progress { ref stage } if stage == "copying pages");
    assert_eq!(
        h.locks.find(&key).await.unwrap().unwrap().current_stage.as_deref(),
        Some("copying pages")
    );
}

#[tokio::test]
async fn reset_clears_lock_and_result_and_allows_a_new_run() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();

    let job = h.engine.jobs.reset(&key).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.last_result.is_none());
    assert!(h.locks.find(&key).await.unwrap().is_none());

    h.run(&key, None).await.unwrap();
}

#[tokio::test]
async fn restart_reuses_stored_parameters_with_overrides() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();
    h.webhook(json!({"source_id": "A", "target_id": 1, "status": "error"}))
        .await
        .unwrap();

    let overrides = ParameterOverrides {
        page_slug: Some("pricing".into()),
        ..ParameterOverrides::default()
    };
    let outcome = h.engine.jobs.restart(&key, overrides, false).await.unwrap();
    let params = outcome.job.parameters.unwrap();
    assert_eq!(params.site_id, "site-1");
    assert_eq!(params.page_slug.as_deref(), Some("pricing"));
    assert_eq!(h.service.dispatch_count(), 2);
}

#[tokio::test]
async fn kill_signals_live_worker_and_fails_the_job() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service
        .reply_to_dispatch(Ok(RawResponse::new(202, r#"{"pid": 555}"#)));
    h.probe.set_alive(555, true);
    h.run(&key, None).await.unwrap();

    let report = h.engine.jobs.kill(&key, false).await.unwrap();

    assert_eq!(report.was_alive, Some(true));
    assert!(report.signal_sent);
    assert!(report.lock_released);
    assert_eq!(report.status, Some(JobStatus::Error));
    assert_eq!(
        h.probe.signals.lock().unwrap().as_slice(),
        &[(555, Termination::Graceful)]
    );
}

#[tokio::test]
async fn forced_kill_skips_the_probe() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service
        .reply_to_dispatch(Ok(RawResponse::new(202, r#"{"pid": 556}"#)));
    h.run(&key, None).await.unwrap();

    let report = h.engine.jobs.kill(&key, true).await.unwrap();
    assert_eq!(report.was_alive, None);
    assert_eq!(
        h.probe.signals.lock().unwrap().as_slice(),
        &[(556, Termination::Forced)]
    );
}

#[tokio::test]
async fn remove_lock_keeps_status() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();

    h.engine.jobs.remove_lock(&key).await.unwrap();
    assert!(h.locks.find(&key).await.unwrap().is_none());
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::InProgress
    );
    assert_matches!(
        h.engine.jobs.remove_lock(&key).await,
        Err(EngineError::Core(CoreError::NotFound { entity: "Lock", .. }))
    );
}

#[tokio::test]
async fn hard_reset_runs_every_step() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.service
        .reply_to_dispatch(Ok(RawResponse::new(202, r#"{"pid": 777}"#)));
    h.probe.set_alive(777, true);
    h.run(&key, None).await.unwrap();

    let artifacts = h.dir.path().join("artifacts").join("A-1");
    std::fs::create_dir_all(&artifacts).unwrap();
    std::fs::write(artifacts.join("page.html"), "<html/>").unwrap();

    let report = h.engine.jobs.hard_reset(&key).await.unwrap();

    assert!(report.success, "{report:?}");
    let steps: Vec<_> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(steps, ["remove_lock", "clear_artifacts", "kill", "reset_status"]);
    assert!(!artifacts.exists());
    assert!(h.locks.find(&key).await.unwrap().is_none());
    assert_eq!(
        h.probe.signals.lock().unwrap().as_slice(),
        &[(777, Termination::Forced)]
    );
    assert_eq!(
        h.store.find(&key).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn hard_reset_reports_a_failed_step_without_stopping() {
    let h = harness().await;
    let report = h.engine.jobs.hard_reset(&JobKey::new("A", 404)).await.unwrap();

    assert!(!report.success);
    let failed: Vec<_> = report
        .steps
        .iter()
        .filter(|s| !s.success)
        .map(|s| s.step)
        .collect();
    assert_eq!(failed, ["reset_status"]);
}

#[tokio::test]
async fn target_only_lookups_resolve_through_lock_then_job() {
    let h = harness().await;
    let key = JobKey::new("proj-uuid-1", 42);
    h.run(&key, None).await.unwrap();

    assert_eq!(h.engine.jobs.resolve_key(42, None).await.unwrap(), key);

    h.engine.jobs.remove_lock(&key).await.unwrap();
    assert_eq!(h.engine.jobs.resolve_key(42, None).await.unwrap(), key);

    assert_matches!(
        h.engine.jobs.resolve_key(43, None).await,
        Err(EngineError::Core(CoreError::Correlation(_)))
    );
}

#[tokio::test]
async fn poll_fallback_ingests_a_terminal_remote_status() {
    let h = harness().await;
    let key = JobKey::new("A", 1);
    h.run(&key, None).await.unwrap();
    h.service.reply_to_status(Ok(RawResponse::new(
        200,
        r#"{"status": "done", "target_domain": "a.example"}"#,
    )));

    let report = h.engine.correlator.poll(&key).await.unwrap();

    assert_eq!(report.status, Some(JobStatus::Completed));
    assert_matches!(report.ingested, Some(IngestOutcome::Applied { .. }));
    let job = h.store.find(&key).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.last_result.unwrap().target_domain.as_deref(),
        Some("a.example")
    );
}
