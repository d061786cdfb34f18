//! Persistence traits for jobs and waves, plus an in-memory implementation.
//!
//! Every status change goes through [`JobStore::transition`], a
//! compare-and-set: it applies only while the current status is one of the
//! expected ones. Racing result channels (webhook, poll, monitor) therefore
//! resolve as "first terminal writer wins" without extra locking.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::job::{result_fingerprint, DispatchParameters, JobListQuery, MigrationJob, MigrationResult};
use crate::status::{JobStatus, WaveStatus};
use crate::types::{JobKey, TargetId};
use crate::wave::{Wave, WaveProgress};

/// What to do with `last_result` during a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultUpdate {
    Keep,
    Replace(MigrationResult),
    Clear,
}

/// What to do with the stored dispatch parameters during a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterUpdate {
    Keep,
    /// Overwrite, including back to "never dispatched" (`None`).
    Set(Option<DispatchParameters>),
}

/// A conditional status change.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTransition {
    pub to: JobStatus,
    pub result: ResultUpdate,
    pub parameters: ParameterUpdate,
}

impl JobTransition {
    pub fn to(status: JobStatus) -> Self {
        Self {
            to: status,
            result: ResultUpdate::Keep,
            parameters: ParameterUpdate::Keep,
        }
    }

    pub fn with_result(mut self, result: MigrationResult) -> Self {
        self.result = ResultUpdate::Replace(result);
        self
    }

    pub fn clearing_result(mut self) -> Self {
        self.result = ResultUpdate::Clear;
        self
    }

    pub fn with_parameters(mut self, parameters: DispatchParameters) -> Self {
        self.parameters = ParameterUpdate::Set(Some(parameters));
        self
    }

    /// Put back parameters captured before an earlier transition.
    pub fn restoring_parameters(mut self, parameters: Option<DispatchParameters>) -> Self {
        self.parameters = ParameterUpdate::Set(parameters);
        self
    }

    /// Apply to an in-memory record. Shared by stores that materialize the
    /// row before writing it back.
    pub fn apply_to(&self, job: &mut MigrationJob) {
        let now = Utc::now();
        job.status = self.to;
        job.updated_at = now;
        job.completed_at = if self.to.is_terminal() { Some(now) } else { None };
        match &self.result {
            ResultUpdate::Keep => {}
            ResultUpdate::Replace(result) => {
                job.result_hash = Some(result_fingerprint(self.to, result));
                job.last_result = Some(result.clone());
            }
            ResultUpdate::Clear => {
                job.result_hash = None;
                job.last_result = None;
            }
        }
        if let ParameterUpdate::Set(parameters) = &self.parameters {
            job.parameters = parameters.clone();
        }
    }
}

/// Job persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find(&self, key: &JobKey) -> Result<Option<MigrationJob>, CoreError>;

    /// Most recently updated job with this target id, whatever its source.
    async fn find_latest_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<MigrationJob>, CoreError>;

    /// Jobs for the given keys, in no particular order. Unknown keys are
    /// skipped.
    async fn find_many(&self, keys: &[JobKey]) -> Result<Vec<MigrationJob>, CoreError>;

    async fn list(&self, query: &JobListQuery) -> Result<Vec<MigrationJob>, CoreError>;

    /// Return the job, creating it as `pending` if absent. A given
    /// `wave_id` is attached to the job either way.
    async fn ensure(&self, key: &JobKey, wave_id: Option<&str>) -> Result<MigrationJob, CoreError>;

    /// Apply `change` only if the current status is in `expected`.
    ///
    /// Returns the updated job, or `None` when the job is missing or its
    /// status did not match.
    async fn transition(
        &self,
        key: &JobKey,
        expected: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<MigrationJob>, CoreError>;
}

/// Wave persistence.
#[async_trait]
pub trait WaveStore: Send + Sync {
    async fn create_wave(&self, wave: &Wave) -> Result<(), CoreError>;

    async fn find_wave(&self, id: &str) -> Result<Option<Wave>, CoreError>;

    async fn save_progress(
        &self,
        id: &str,
        progress: WaveProgress,
        status: WaveStatus,
    ) -> Result<(), CoreError>;
}

/// Everything the coordinator needs from persistence.
pub trait Store: JobStore + WaveStore {}

impl<T: JobStore + WaveStore> Store for T {}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. Used by tests and by `STORE_BACKEND=memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobKey, MigrationJob>>,
    waves: RwLock<HashMap<String, Wave>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn find(&self, key: &JobKey) -> Result<Option<MigrationJob>, CoreError> {
        Ok(self.jobs.read().await.get(key).cloned())
    }

    async fn find_latest_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<MigrationJob>, CoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.target_id == target_id)
            .max_by_key(|job| job.updated_at)
            .cloned())
    }

    async fn find_many(&self, keys: &[JobKey]) -> Result<Vec<MigrationJob>, CoreError> {
        let jobs = self.jobs.read().await;
        Ok(keys.iter().filter_map(|key| jobs.get(key).cloned()).collect())
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<MigrationJob>, CoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<MigrationJob> = jobs
            .values()
            .filter(|job| query.status.map_or(true, |s| job.status == s))
            .filter(|job| {
                query
                    .wave_id
                    .as_deref()
                    .map_or(true, |w| job.wave_id.as_deref() == Some(w))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn ensure(&self, key: &JobKey, wave_id: Option<&str>) -> Result<MigrationJob, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .entry(key.clone())
            .or_insert_with(|| MigrationJob::new(key, None, Utc::now()));
        if let Some(wave_id) = wave_id {
            job.wave_id = Some(wave_id.to_string());
        }
        Ok(job.clone())
    }

    async fn transition(
        &self,
        key: &JobKey,
        expected: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<MigrationJob>, CoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(key) else {
            return Ok(None);
        };
        if !expected.contains(&job.status) {
            return Ok(None);
        }
        change.apply_to(job);
        Ok(Some(job.clone()))
    }
}

#[async_trait]
impl WaveStore for MemoryStore {
    async fn create_wave(&self, wave: &Wave) -> Result<(), CoreError> {
        let mut waves = self.waves.write().await;
        if waves.contains_key(&wave.id) {
            return Err(CoreError::Conflict(format!("Wave {} already exists", wave.id)));
        }
        waves.insert(wave.id.clone(), wave.clone());
        Ok(())
    }

    async fn find_wave(&self, id: &str) -> Result<Option<Wave>, CoreError> {
        Ok(self.waves.read().await.get(id).cloned())
    }

    async fn save_progress(
        &self,
        id: &str,
        progress: WaveProgress,
        status: WaveStatus,
    ) -> Result<(), CoreError> {
        let mut waves = self.waves.write().await;
        let wave = waves.get_mut(id).ok_or_else(|| CoreError::NotFound {
            entity: "Wave",
            id: id.to_string(),
        })?;
        wave.progress = progress;
        wave.status = status;
        wave.updated_at = Utc::now();
        Ok(())
    }
}
