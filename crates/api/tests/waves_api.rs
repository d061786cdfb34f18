//! Integration tests for the `/api/v1/waves` endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{body_json, build_test_app, get, post_empty, post_json, TestApp};

const WEBHOOK: &str = "/api/v1/webhooks/migration-result";

async fn create_wave(app: &TestApp) -> String {
    let response = post_json(
        app,
        "/api/v1/waves",
        json!({
            "name": "april",
            "members": [
                {"source_id": "A", "target_id": 1},
                {"source_id": "A", "target_id": 2},
                {"source_id": "B", "target_id": 3},
            ],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().to_string()
}

fn overrides() -> serde_json::Value {
    json!({"site_id": "site-1", "secret": "s3cr3t"})
}

#[tokio::test]
async fn create_wave_starts_pending() {
    let app = build_test_app().await;
    let id = create_wave(&app).await;

    let json = body_json(get(&app, &format!("/api/v1/waves/{id}")).await).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["progress"], json!({"total": 3, "completed": 0, "failed": 0}));
}

#[tokio::test]
async fn empty_wave_is_rejected() {
    let app = build_test_app().await;

    let response = post_json(&app, "/api/v1/waves", json!({"name": "x", "members": []})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_wave_is_404() {
    let app = build_test_app().await;

    let response = get(&app, "/api/v1/waves/wave-20990101000000-zzzzzzzz").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn results_roll_up_into_the_wave() {
    let app = build_test_app().await;
    let id = create_wave(&app).await;

    let report = body_json(post_json(&app, &format!("/api/v1/waves/{id}/restart-all"), overrides()).await).await;
    assert_eq!(report["data"]["succeeded"], 3);
    assert_eq!(report["data"]["wave"]["status"], "in_progress");

    for (source, target, status) in [("A", 1, "success"), ("A", 2, "completed"), ("B", 3, "error")] {
        let response = post_json(
            &app,
            WEBHOOK,
            json!({"source_id": source, "target_id": target, "status": status}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let json = body_json(get(&app, &format!("/api/v1/waves/{id}")).await).await;
    assert_eq!(json["data"]["progress"], json!({"total": 3, "completed": 2, "failed": 1}));
    assert_eq!(json["data"]["status"], "completed");
}

#[tokio::test]
async fn restart_all_without_parameters_reports_per_member() {
    let app = build_test_app().await;
    let id = create_wave(&app).await;

    let response = post_empty(&app, &format!("/api/v1/waves/{id}/restart-all")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["requested"], 3);
    assert_eq!(json["data"]["failed"], 3);
    assert_eq!(json["data"]["members"][0]["success"], false);
    assert_eq!(app.service.request_count(), 0);
}

#[tokio::test]
async fn reset_status_returns_members_to_pending() {
    let app = build_test_app().await;
    let id = create_wave(&app).await;
    post_json(&app, &format!("/api/v1/waves/{id}/restart-all"), overrides()).await;

    let response = post_empty(&app, &format!("/api/v1/waves/{id}/reset-status")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["succeeded"], 3);
    assert_eq!(json["data"]["wave"]["status"], "pending");
    let process = body_json(get(&app, "/api/v1/jobs/1/process?source_id=A").await).await;
    assert!(process["data"]["lock"].is_null());
}
