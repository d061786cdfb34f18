//! [`LockStore`] on the `job_locks` table.
//!
//! The primary key on `(source_id, target_id)` provides the mutual
//! exclusion; `INSERT ... ON CONFLICT DO NOTHING` is the atomic
//! create-if-absent.

use async_trait::async_trait;
use waveline_core::error::CoreError;
use waveline_core::lock::{LockRecord, LockStore, LockTouch};
use waveline_core::types::{JobKey, TargetId};

use crate::models::lock::LockRow;
use crate::repositories::LockRepo;
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct PgLockStore {
    pool: DbPool,
}

impl PgLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn lock_not_found(key: &JobKey) -> CoreError {
    CoreError::NotFound {
        entity: "Lock",
        id: key.to_string(),
    }
}

#[async_trait]
impl LockStore for PgLockStore {
    async fn acquire(&self, record: LockRecord) -> Result<LockRecord, CoreError> {
        let row = LockRow {
            source_id: record.key.source_id.clone(),
            target_id: record.key.target_id,
            pid: record.pid,
            started_at: record.started_at,
            last_check: record.last_check,
            current_stage: record.current_stage.clone(),
        };
        match LockRepo::try_insert(&self.pool, &row)
            .await
            .map_err(CoreError::storage)?
        {
            Some(row) => Ok(row.into()),
            None => Err(CoreError::AlreadyLocked { key: record.key }),
        }
    }

    async fn release(&self, key: &JobKey) -> Result<(), CoreError> {
        let deleted = LockRepo::delete(&self.pool, &key.source_id, key.target_id)
            .await
            .map_err(CoreError::storage)?;
        if deleted {
            Ok(())
        } else {
            Err(lock_not_found(key))
        }
    }

    async fn touch(&self, key: &JobKey, touch: LockTouch) -> Result<LockRecord, CoreError> {
        LockRepo::touch(
            &self.pool,
            &key.source_id,
            key.target_id,
            touch.last_check,
            touch.current_stage.as_deref(),
            touch.worker_pid,
        )
        .await
        .map_err(CoreError::storage)?
        .map(LockRecord::from)
        .ok_or_else(|| lock_not_found(key))
    }

    async fn find(&self, key: &JobKey) -> Result<Option<LockRecord>, CoreError> {
        Ok(LockRepo::find(&self.pool, &key.source_id, key.target_id)
            .await
            .map_err(CoreError::storage)?
            .map(LockRecord::from))
    }

    async fn list_all(&self) -> Result<Vec<LockRecord>, CoreError> {
        Ok(LockRepo::list_all(&self.pool)
            .await
            .map_err(CoreError::storage)?
            .into_iter()
            .map(LockRecord::from)
            .collect())
    }

    async fn find_by_target(&self, target_id: TargetId) -> Result<Option<LockRecord>, CoreError> {
        Ok(LockRepo::find_by_target(&self.pool, target_id)
            .await
            .map_err(CoreError::storage)?
            .map(LockRecord::from))
    }
}
