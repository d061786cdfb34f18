//! [`JobStore`] and [`WaveStore`] on PostgreSQL.
//!
//! Transitions lock the job row (`SELECT ... FOR UPDATE`), check the
//! expected statuses, apply the change in Rust and write the row back in
//! the same transaction. Concurrent result channels serialize on the row
//! lock and the loser sees the new status.

use async_trait::async_trait;
use waveline_core::error::CoreError;
use waveline_core::job::{JobListQuery, MigrationJob};
use waveline_core::status::{JobStatus, WaveStatus};
use waveline_core::store::{JobStore, JobTransition, WaveStore};
use waveline_core::types::{JobKey, TargetId};
use waveline_core::wave::{Wave, WaveProgress};

use crate::models::job::json_columns;
use crate::repositories::job_repo::JobUpdate;
use crate::repositories::wave_repo::NewWave;
use crate::repositories::{JobRepo, WaveRepo};
use crate::DbPool;

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn find(&self, key: &JobKey) -> Result<Option<MigrationJob>, CoreError> {
        JobRepo::find(&self.pool, &key.source_id, key.target_id)
            .await
            .map_err(CoreError::storage)?
            .map(MigrationJob::try_from)
            .transpose()
    }

    async fn find_latest_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<MigrationJob>, CoreError> {
        JobRepo::find_latest_by_target(&self.pool, target_id)
            .await
            .map_err(CoreError::storage)?
            .map(MigrationJob::try_from)
            .transpose()
    }

    async fn find_many(&self, keys: &[JobKey]) -> Result<Vec<MigrationJob>, CoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let source_ids: Vec<String> = keys.iter().map(|k| k.source_id.clone()).collect();
        let target_ids: Vec<TargetId> = keys.iter().map(|k| k.target_id).collect();
        JobRepo::find_many(&self.pool, &source_ids, &target_ids)
            .await
            .map_err(CoreError::storage)?
            .into_iter()
            .map(MigrationJob::try_from)
            .collect()
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<MigrationJob>, CoreError> {
        JobRepo::list(
            &self.pool,
            query.status.map(JobStatus::as_str),
            query.wave_id.as_deref(),
            query.limit(),
            query.offset(),
        )
        .await
        .map_err(CoreError::storage)?
        .into_iter()
        .map(MigrationJob::try_from)
        .collect()
    }

    async fn ensure(&self, key: &JobKey, wave_id: Option<&str>) -> Result<MigrationJob, CoreError> {
        let row = JobRepo::ensure(&self.pool, &key.source_id, key.target_id, wave_id)
            .await
            .map_err(CoreError::storage)?;
        MigrationJob::try_from(row)
    }

    async fn transition(
        &self,
        key: &JobKey,
        expected: &[JobStatus],
        change: JobTransition,
    ) -> Result<Option<MigrationJob>, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let Some(row) = JobRepo::find_for_update(&mut tx, &key.source_id, key.target_id)
            .await
            .map_err(CoreError::storage)?
        else {
            return Ok(None);
        };
        let mut job = MigrationJob::try_from(row)?;
        if !expected.contains(&job.status) {
            return Ok(None);
        }

        change.apply_to(&mut job);
        let (parameters, last_result) = json_columns(&job)?;
        let update = JobUpdate {
            status: job.status.as_str(),
            parameters: parameters.as_ref(),
            last_result: last_result.as_ref(),
            result_hash: job.result_hash.as_deref(),
            wave_id: job.wave_id.as_deref(),
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        };
        let row = JobRepo::update(&mut tx, &key.source_id, key.target_id, &update)
            .await
            .map_err(CoreError::storage)?;
        tx.commit().await.map_err(CoreError::storage)?;

        MigrationJob::try_from(row).map(Some)
    }
}

#[async_trait]
impl WaveStore for PgStore {
    async fn create_wave(&self, wave: &Wave) -> Result<(), CoreError> {
        let members = serde_json::to_value(&wave.members).map_err(CoreError::storage)?;
        let new = NewWave {
            id: &wave.id,
            name: &wave.name,
            members: &members,
            batch_size: wave.batch_size as i32,
            total: wave.progress.total as i32,
            status: wave.status.as_str(),
            created_at: wave.created_at,
        };
        match WaveRepo::create(&self.pool, &new)
            .await
            .map_err(CoreError::storage)?
        {
            Some(_) => Ok(()),
            None => Err(CoreError::Conflict(format!("Wave {} already exists", wave.id))),
        }
    }

    async fn find_wave(&self, id: &str) -> Result<Option<Wave>, CoreError> {
        WaveRepo::find(&self.pool, id)
            .await
            .map_err(CoreError::storage)?
            .map(Wave::try_from)
            .transpose()
    }

    async fn save_progress(
        &self,
        id: &str,
        progress: WaveProgress,
        status: WaveStatus,
    ) -> Result<(), CoreError> {
        let updated = WaveRepo::save_progress(
            &self.pool,
            id,
            progress.total as i32,
            progress.completed as i32,
            progress.failed as i32,
            status.as_str(),
        )
        .await
        .map_err(CoreError::storage)?;
        if !updated {
            return Err(CoreError::NotFound {
                entity: "Wave",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
