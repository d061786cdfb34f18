//! Repository for the `migration_jobs` table.

use sqlx::{PgConnection, PgPool};
use waveline_core::types::TargetId;

use crate::models::job::JobRow;

/// Column list for `migration_jobs` queries.
const COLUMNS: &str = "\
    source_id, target_id, status, parameters, last_result, result_hash, \
    wave_id, created_at, updated_at, completed_at";

/// Values written back by [`JobRepo::update`].
pub struct JobUpdate<'a> {
    pub status: &'a str,
    pub parameters: Option<&'a serde_json::Value>,
    pub last_result: Option<&'a serde_json::Value>,
    pub result_hash: Option<&'a str>,
    pub wave_id: Option<&'a str>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct JobRepo;

impl JobRepo {
    pub async fn find(
        pool: &PgPool,
        source_id: &str,
        target_id: TargetId,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs WHERE source_id = $1 AND target_id = $2"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(source_id)
            .bind(target_id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the row for a compare-and-set inside a transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        source_id: &str,
        target_id: TargetId,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs \
             WHERE source_id = $1 AND target_id = $2 \
             FOR UPDATE"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(source_id)
            .bind(target_id)
            .fetch_optional(conn)
            .await
    }

    /// Most recently updated job for a target id, any source.
    pub async fn find_latest_by_target(
        pool: &PgPool,
        target_id: TargetId,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs \
             WHERE target_id = $1 \
             ORDER BY updated_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(target_id)
            .fetch_optional(pool)
            .await
    }

    /// Jobs whose keys appear in the parallel arrays.
    pub async fn find_many(
        pool: &PgPool,
        source_ids: &[String],
        target_ids: &[TargetId],
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs \
             WHERE (source_id, target_id) IN ( \
                 SELECT * FROM UNNEST($1::text[], $2::bigint[]) \
             )"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(source_ids)
            .bind(target_ids)
            .fetch_all(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<&str>,
        wave_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM migration_jobs \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR wave_id = $2) \
             ORDER BY updated_at DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(status)
            .bind(wave_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Insert as `pending` if absent; attach `wave_id` when given.
    pub async fn ensure(
        pool: &PgPool,
        source_id: &str,
        target_id: TargetId,
        wave_id: Option<&str>,
    ) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO migration_jobs (source_id, target_id, wave_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (source_id, target_id) DO UPDATE \
                 SET wave_id = COALESCE(EXCLUDED.wave_id, migration_jobs.wave_id) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(source_id)
            .bind(target_id)
            .bind(wave_id)
            .fetch_one(pool)
            .await
    }

    /// Overwrite the mutable columns of a row locked by
    /// [`find_for_update`](Self::find_for_update).
    pub async fn update(
        conn: &mut PgConnection,
        source_id: &str,
        target_id: TargetId,
        update: &JobUpdate<'_>,
    ) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "UPDATE migration_jobs \
             SET status = $3, parameters = $4, last_result = $5, result_hash = $6, \
                 wave_id = $7, updated_at = $8, completed_at = $9 \
             WHERE source_id = $1 AND target_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(source_id)
            .bind(target_id)
            .bind(update.status)
            .bind(update.parameters)
            .bind(update.last_result)
            .bind(update.result_hash)
            .bind(update.wave_id)
            .bind(update.updated_at)
            .bind(update.completed_at)
            .fetch_one(conn)
            .await
    }
}
