//! Shared harness for engine integration tests.
//!
//! Wires a real [`Engine`] to an in-memory store, a temp-dir lock store, a
//! scripted migration service and a fake process table.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use waveline_core::error::CoreError;
use waveline_core::job::{DispatchParameters, JobListQuery, MigrationJob};
use waveline_core::liveness::{ProcessProbe, Termination};
use waveline_core::lock::{FileLockStore, LockRecord, LockStore};
use waveline_core::status::{JobStatus, WaveStatus};
use waveline_core::store::{JobStore, JobTransition, MemoryStore, WaveStore};
use waveline_core::types::{JobKey, TargetId};
use waveline_core::wave::{Wave, WaveProgress};
use waveline_core::webhook::{CallbackIdentity, WebhookPayload};
use waveline_dispatch::{
    HttpTransport, MigrationServiceApi, OutboundRequest, RawResponse, ResilientClient,
    RetryPolicy, TransportFailure,
};
use waveline_engine::jobs::{IngestOutcome, RunCommand, RunOutcome};
use waveline_engine::{CoordinatorConfig, Engine, EngineContext, EngineResult};
use waveline_events::EventBus;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Process table with a settable set of live pids. Records signals.
#[derive(Default)]
pub struct FakeProbe {
    alive: Mutex<HashSet<i32>>,
    pub signals: Mutex<Vec<(i32, Termination)>>,
}

impl FakeProbe {
    pub fn set_alive(&self, pid: i32, alive: bool) {
        let mut set = self.alive.lock().unwrap();
        if alive {
            set.insert(pid);
        } else {
            set.remove(&pid);
        }
    }
}

impl ProcessProbe for FakeProbe {
    fn is_alive(&self, pid: i32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    fn terminate(&self, pid: i32, mode: Termination) -> Result<bool, CoreError> {
        self.signals.lock().unwrap().push((pid, mode));
        Ok(self.alive.lock().unwrap().remove(&pid))
    }
}

/// Migration service answering every dispatch and every status call with
/// a configurable reply, optionally after a delay.
pub struct FakeService {
    dispatch_reply: Mutex<Result<RawResponse, TransportFailure>>,
    status_reply: Mutex<Result<RawResponse, TransportFailure>>,
    latency: Mutex<Duration>,
    pub requests: Mutex<Vec<OutboundRequest>>,
}

impl FakeService {
    fn new() -> Self {
        Self {
            dispatch_reply: Mutex::new(Ok(RawResponse::new(202, "{}"))),
            status_reply: Mutex::new(Ok(RawResponse::new(200, r#"{"status": "running"}"#))),
            latency: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold every reply for `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn reply_to_dispatch(&self, reply: Result<RawResponse, TransportFailure>) {
        *self.dispatch_reply.lock().unwrap() = reply;
    }

    pub fn reply_to_status(&self, reply: Result<RawResponse, TransportFailure>) {
        *self.status_reply.lock().unwrap() = reply;
    }

    pub fn dispatch_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.url.contains("/migrations/status"))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FakeService {
    async fn execute(&self, request: &OutboundRequest) -> Result<RawResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request.clone());
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if request.url.contains("/migrations/status") {
            self.status_reply.lock().unwrap().clone()
        } else {
            self.dispatch_reply.lock().unwrap().clone()
        }
    }
}

/// In-memory store whose wave operations can be switched to fail.
#[derive(Default)]
pub struct TestStore {
    inner: MemoryStore,
    waves_down: AtomicBool,
}

impl TestStore {
    pub fn fail_waves(&self, down: bool) {
        self.waves_down.store(down, Ordering::SeqCst);
    }

    fn check_waves(&self) -> Result<(), CoreError> {
        if self.waves_down.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("wave table unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for TestStore {
    async fn find(&self, key: &JobKey) -> Result<Option<MigrationJob>, CoreError> {
        self.inner.find(key).await
    }

    async fn find_latest_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<MigrationJob>, CoreError> {
        self.inner.find_latest_by_target(target_id).await
    }

    async fn find_many(&self, keys: &[JobKey]) -> Result<Vec<MigrationJob>, CoreError> {
        self.inner.find_many(keys).await
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<MigrationJob>, CoreError> {
        self.inner.list(query).await
    }

    async fn ensure(&self, key: &JobKey, wave_id: Option<&str>) -> Result<MigrationJob, CoreError> {
        self.inner.ensure(key, wave_id).await
    }

    async fn transition(
        &self,
        key: &JobKey,
        expected: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<MigrationJob>, CoreError> {
        self.inner.transition(key, expected, change).await
    }
}

#[async_trait]
impl WaveStore for TestStore {
    async fn create_wave(&self, wave: &Wave) -> Result<(), CoreError> {
        self.check_waves()?;
        self.inner.create_wave(wave).await
    }

    async fn find_wave(&self, id: &str) -> Result<Option<Wave>, CoreError> {
        self.check_waves()?;
        self.inner.find_wave(id).await
    }

    async fn save_progress(
        &self,
        id: &str,
        progress: WaveProgress,
        status: WaveStatus,
    ) -> Result<(), CoreError> {
        self.check_waves()?;
        self.inner.save_progress(id, progress, status).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<TestStore>,
    pub locks: Arc<FileLockStore>,
    pub probe: Arc<FakeProbe>,
    pub service: Arc<FakeService>,
    pub events: Arc<EventBus>,
    pub dir: TempDir,
}

pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(TestStore::default());
    let locks = Arc::new(FileLockStore::open(dir.path().join("locks")).await.unwrap());
    let probe = Arc::new(FakeProbe::default());
    let service = Arc::new(FakeService::new());
    let events = Arc::new(EventBus::default());

    let client = ResilientClient::new(service.clone(), RetryPolicy::fixed(3, Duration::ZERO));
    let remote = MigrationServiceApi::new(client, "http://migrator.test").unwrap();
    let config = CoordinatorConfig {
        sweep_interval: Duration::from_millis(50),
        stale_threshold: Duration::from_secs(600),
        public_base_url: "http://coordinator.test".into(),
        artifact_dir: dir.path().join("artifacts"),
    };

    let engine = Engine::new(EngineContext {
        store: store.clone(),
        locks: locks.clone(),
        probe: probe.clone(),
        remote,
        events: events.clone(),
        config: Arc::new(config),
    });

    Harness {
        engine,
        store,
        locks,
        probe,
        service,
        events,
        dir,
    }
}

pub fn params() -> DispatchParameters {
    DispatchParameters {
        site_id: "site-1".into(),
        secret: "s3cr3t".into(),
        workspace_id: None,
        page_slug: None,
        manual: false,
        quality_analysis: false,
    }
}

impl Harness {
    pub async fn run(&self, key: &JobKey, wave_id: Option<&str>) -> EngineResult<RunOutcome> {
        self.engine
            .jobs
            .run(RunCommand {
                key: key.clone(),
                parameters: params(),
                wave_id: wave_id.map(str::to_string),
                force: false,
            })
            .await
    }

    pub async fn webhook(&self, body: serde_json::Value) -> EngineResult<IngestOutcome> {
        let payload: WebhookPayload = serde_json::from_value(body).unwrap();
        self.engine
            .correlator
            .ingest_webhook(payload, &CallbackIdentity::default())
            .await
    }

    /// Replace the lock for `key` with one started `age_secs` ago.
    pub async fn backdate_lock(&self, key: &JobKey, age_secs: i64, pid: Option<i32>) {
        let _ = self.locks.release(key).await;
        let mut record = LockRecord::new(key.clone(), Utc::now() - chrono::Duration::seconds(age_secs));
        record.pid = pid;
        self.locks.acquire(record).await.unwrap();
    }
}
