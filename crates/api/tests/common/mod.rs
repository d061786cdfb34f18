//! Shared helpers for API integration tests.
//!
//! The app is wired exactly as in production except for the backends:
//! in-memory job store, temp-dir lock files, a scripted migration service
//! and a fake process table.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use waveline_api::config::ServerConfig;
use waveline_api::router::build_app_router;
use waveline_api::state::AppState;
use waveline_core::error::CoreError;
use waveline_core::liveness::{ProcessProbe, Termination};
use waveline_core::lock::FileLockStore;
use waveline_core::store::MemoryStore;
use waveline_dispatch::{
    HttpTransport, MigrationServiceApi, OutboundRequest, RawResponse, ResilientClient,
    RetryPolicy, TransportFailure,
};
use waveline_engine::{CoordinatorConfig, Engine, EngineContext};
use waveline_events::EventBus;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeProbe {
    alive: Mutex<HashSet<i32>>,
}

impl FakeProbe {
    pub fn set_alive(&self, pid: i32) {
        self.alive.lock().unwrap().insert(pid);
    }
}

impl ProcessProbe for FakeProbe {
    fn is_alive(&self, pid: i32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    fn terminate(&self, pid: i32, _mode: Termination) -> Result<bool, CoreError> {
        Ok(self.alive.lock().unwrap().remove(&pid))
    }
}

/// Migration service with one scripted reply for dispatches and one for
/// status polls.
pub struct FakeService {
    dispatch_reply: Mutex<Result<RawResponse, TransportFailure>>,
    status_reply: Mutex<Result<RawResponse, TransportFailure>>,
    pub requests: Mutex<Vec<OutboundRequest>>,
}

impl FakeService {
    pub fn reply_to_dispatch(&self, reply: Result<RawResponse, TransportFailure>) {
        *self.dispatch_reply.lock().unwrap() = reply;
    }

    pub fn reply_to_status(&self, reply: Result<RawResponse, TransportFailure>) {
        *self.status_reply.lock().unwrap() = reply;
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            dispatch_reply: Mutex::new(Ok(RawResponse::new(202, r#"{"pid": 4242}"#))),
            status_reply: Mutex::new(Ok(RawResponse::new(200, r#"{"status": "running"}"#))),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeService {
    async fn execute(&self, request: &OutboundRequest) -> Result<RawResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request.clone());
        if request.url.contains("/migrations/status") {
            self.status_reply.lock().unwrap().clone()
        } else {
            self.dispatch_reply.lock().unwrap().clone()
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub probe: Arc<FakeProbe>,
    pub service: Arc<FakeService>,
    pub dir: TempDir,
}

/// Build the full application router with all middleware layers.
pub async fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(FileLockStore::open(dir.path().join("locks")).await.unwrap());
    let probe = Arc::new(FakeProbe::default());
    let service = Arc::new(FakeService::default());

    let client = ResilientClient::new(service.clone(), RetryPolicy::fixed(3, Duration::ZERO));
    let remote = MigrationServiceApi::new(client, "http://migrator.test").unwrap();
    let engine = Engine::new(EngineContext {
        store: store.clone(),
        locks,
        probe: probe.clone(),
        remote,
        events: Arc::new(EventBus::default()),
        config: Arc::new(CoordinatorConfig {
            public_base_url: "http://coordinator.test".into(),
            artifact_dir: dir.path().join("artifacts"),
            ..CoordinatorConfig::default()
        }),
    });

    let config = test_config();
    let state = AppState {
        engine: engine.clone(),
        config: Arc::new(config.clone()),
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        engine,
        store,
        probe,
        service,
        dir,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post_empty(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Body of a valid `POST /api/v1/jobs/run`.
pub fn run_body(source_id: &str, target_id: i64) -> serde_json::Value {
    serde_json::json!({
        "source_id": source_id,
        "target_id": target_id,
        "site_id": "site-1",
        "secret": "s3cr3t",
    })
}
