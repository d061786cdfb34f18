//! Repository for the `job_locks` table.

use sqlx::PgPool;
use waveline_core::types::TargetId;

use crate::models::lock::LockRow;

/// Column list for `job_locks` queries.
const COLUMNS: &str = "source_id, target_id, pid, started_at, last_check, current_stage";

pub struct LockRepo;

impl LockRepo {
    /// Insert unless a row for the key exists. `None` means it did.
    pub async fn try_insert(pool: &PgPool, row: &LockRow) -> Result<Option<LockRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_locks (source_id, target_id, pid, started_at, last_check, current_stage) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (source_id, target_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LockRow>(&query)
            .bind(&row.source_id)
            .bind(row.target_id)
            .bind(row.pid)
            .bind(row.started_at)
            .bind(row.last_check)
            .bind(&row.current_stage)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, source_id: &str, target_id: TargetId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM job_locks WHERE source_id = $1 AND target_id = $2")
            .bind(source_id)
            .bind(target_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the given fields, leaving `NULL` arguments untouched.
    pub async fn touch(
        pool: &PgPool,
        source_id: &str,
        target_id: TargetId,
        last_check: Option<chrono::DateTime<chrono::Utc>>,
        current_stage: Option<&str>,
        pid: Option<i32>,
    ) -> Result<Option<LockRow>, sqlx::Error> {
        let query = format!(
            "UPDATE job_locks \
             SET last_check = COALESCE($3, last_check), \
                 current_stage = COALESCE($4, current_stage), \
                 pid = COALESCE($5, pid) \
             WHERE source_id = $1 AND target_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LockRow>(&query)
            .bind(source_id)
            .bind(target_id)
            .bind(last_check)
            .bind(current_stage)
            .bind(pid)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        source_id: &str,
        target_id: TargetId,
    ) -> Result<Option<LockRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_locks WHERE source_id = $1 AND target_id = $2");
        sqlx::query_as::<_, LockRow>(&query)
            .bind(source_id)
            .bind(target_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_target(pool: &PgPool, target_id: TargetId) -> Result<Option<LockRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_locks WHERE target_id = $1 ORDER BY started_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, LockRow>(&query)
            .bind(target_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<LockRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_locks ORDER BY started_at ASC");
        sqlx::query_as::<_, LockRow>(&query).fetch_all(pool).await
    }
}
