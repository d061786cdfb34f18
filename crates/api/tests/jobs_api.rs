//! Integration tests for the `/api/v1/jobs` endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{body_json, build_test_app, delete, get, post_empty, post_json, run_body};
use waveline_core::status::JobStatus;
use waveline_core::store::JobStore;
use waveline_core::types::JobKey;
use waveline_dispatch::{RawResponse, TransportFailure};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_returns_202_with_redacted_job_and_lock() {
    let app = build_test_app().await;

    let response = post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["job"]["status"], "in_progress");
    assert_eq!(json["data"]["job"]["parameters"]["secret"], "***");
    assert_eq!(json["data"]["lock"]["pid"], 4242);
    assert_eq!(json["data"]["worker_pid"], 4242);
    let callback = json["data"]["callback_url"].as_str().unwrap();
    assert!(callback.starts_with("http://coordinator.test/api/v1/webhooks/migration-result?"));
}

#[tokio::test]
async fn second_run_while_locked_is_409() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "ALREADY_LOCKED");
    assert_eq!(app.service.request_count(), 1);
}

#[tokio::test]
async fn run_with_invalid_source_id_is_400_without_side_effects() {
    let app = build_test_app().await;

    let response = post_json(&app, "/api/v1/jobs/run", run_body("../etc", 1)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(app.service.request_count(), 0);
}

#[tokio::test]
async fn rejected_dispatch_is_422_and_job_stays_pending() {
    let app = build_test_app().await;
    app.service
        .reply_to_dispatch(Ok(RawResponse::new(400, "bad site")));

    let response = post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "REJECTED_BY_REMOTE");
    assert_eq!(app.service.request_count(), 1);

    let job = app.store.find(&JobKey::new("A", 1)).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    let process = body_json(get(&app, "/api/v1/jobs/1/process?source_id=A").await).await;
    assert!(process["data"]["lock"].is_null());
}

#[tokio::test]
async fn unreachable_service_is_502_after_three_attempts() {
    let app = build_test_app().await;
    app.service
        .reply_to_dispatch(Err(TransportFailure("connection refused".into())));

    let response = post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "REMOTE_UNREACHABLE");
    assert_eq!(app.service.request_count(), 3);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_job_resolves_source_from_the_lock() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 7)).await;

    let response = get(&app, "/api/v1/jobs/7").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["source_id"], "A");
    assert_eq!(json["data"]["parameters"]["secret"], "***");
}

#[tokio::test]
async fn unknown_target_is_422() {
    let app = build_test_app().await;

    let response = get(&app, "/api/v1/jobs/99").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "CORRELATION_FAILED");
}

#[tokio::test]
async fn unknown_job_with_explicit_source_is_404() {
    let app = build_test_app().await;

    let response = get(&app, "/api/v1/jobs/99?source_id=A").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_by_status() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 2)).await;
    post_empty(&app, "/api/v1/jobs/2/reset-status").await;

    let json = body_json(get(&app, "/api/v1/jobs?status=in_progress").await).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["target_id"], 1);
    assert_eq!(jobs[0]["parameters"]["secret"], "***");
}

#[tokio::test]
async fn process_reports_lock_and_liveness() {
    let app = build_test_app().await;
    app.probe.set_alive(4242);
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let json = body_json(get(&app, "/api/v1/jobs/1/process").await).await;
    assert_eq!(json["data"]["status"], "in_progress");
    assert_eq!(json["data"]["pid"], 4242);
    assert_eq!(json["data"]["alive"], true);
    assert_eq!(json["data"]["stale"], false);
    assert_eq!(json["data"]["lock"]["current_stage"], "dispatched");
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_status_then_run_again() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = post_empty(&app, "/api/v1/jobs/1/reset-status?source_id=A").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "pending");

    let process = body_json(get(&app, "/api/v1/jobs/1/process?source_id=A").await).await;
    assert!(process["data"]["lock"].is_null());

    let rerun = post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    assert_eq!(rerun.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn kill_releases_lock_and_marks_error() {
    let app = build_test_app().await;
    app.probe.set_alive(4242);
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = post_empty(&app, "/api/v1/jobs/1/kill").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["was_alive"], true);
    assert_eq!(json["data"]["signal_sent"], true);
    assert_eq!(json["data"]["lock_released"], true);
    assert_eq!(json["data"]["status"], "error");
}

#[tokio::test]
async fn forced_kill_skips_the_probe() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = post_json(&app, "/api/v1/jobs/1/kill", json!({"force": true})).await;
    let json = body_json(response).await;
    assert!(json["data"]["was_alive"].is_null());
    assert_eq!(json["data"]["status"], "error");
}

#[tokio::test]
async fn delete_lock_keeps_status() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = delete(&app, "/api/v1/jobs/1/lock").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["key"]["source_id"], "A");

    let job = app.store.find(&JobKey::new("A", 1)).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::InProgress);

    let again = delete(&app, "/api/v1/jobs/1/lock?source_id=A").await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hard_reset_reports_every_step() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = post_empty(&app, "/api/v1/jobs/1/hard-reset").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["success"], true);
    let steps: Vec<_> = json["data"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(steps, ["remove_lock", "clear_artifacts", "kill", "reset_status"]);

    let job = app.store.find(&JobKey::new("A", 1)).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn restart_with_overrides_redispatches() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    post_json(
        &app,
        "/api/v1/webhooks/migration-result",
        json!({"source_id": "A", "target_id": 1, "status": "failed"}),
    )
    .await;

    let response = post_json(
        &app,
        "/api/v1/jobs/1/restart?source_id=A",
        json!({"page_slug": "home"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let job = app.store.find(&JobKey::new("A", 1)).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
    let parameters = job.parameters.unwrap();
    assert_eq!(parameters.page_slug.as_deref(), Some("home"));
    assert_eq!(parameters.site_id, "site-1");
}

#[tokio::test]
async fn restart_without_body_uses_stored_parameters() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    post_empty(&app, "/api/v1/jobs/1/reset-status?source_id=A").await;

    let response = post_empty(&app, "/api/v1/jobs/1/restart?source_id=A").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(app.service.request_count(), 2);
}

// ---------------------------------------------------------------------------
// Remote worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_updates_the_stage() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;

    let response = post_json(&app, "/api/v1/jobs/1/heartbeat", json!({"stage": "copying pages"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["current_stage"], "copying pages");
}

#[tokio::test]
async fn status_from_server_ingests_a_terminal_status() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    app.service.reply_to_status(Ok(RawResponse::new(
        200,
        r#"{"status": "completed", "result": {"target_domain": "a.example"}}"#,
    )));

    let response = get(&app, "/api/v1/jobs/1/status-from-server").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["remote_status"], "completed");
    assert_eq!(json["data"]["ingested"]["outcome"], "applied");

    let job = app.store.find(&JobKey::new("A", 1)).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.last_result.unwrap().target_domain.as_deref(),
        Some("a.example")
    );
}

#[tokio::test]
async fn status_from_server_unreachable_is_502() {
    let app = build_test_app().await;
    post_json(&app, "/api/v1/jobs/run", run_body("A", 1)).await;
    app.service
        .reply_to_status(Err(TransportFailure("timeout".into())));

    let response = get(&app, "/api/v1/jobs/1/status-from-server").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
