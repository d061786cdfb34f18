//! Repository for the `waves` table.

use sqlx::PgPool;

use crate::models::wave::WaveRow;

/// Column list for `waves` queries.
const COLUMNS: &str = "\
    id, name, members, batch_size, total, completed, failed, status, \
    created_at, updated_at";

/// Values for a new wave row.
pub struct NewWave<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub members: &'a serde_json::Value,
    pub batch_size: i32,
    pub total: i32,
    pub status: &'a str,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct WaveRepo;

impl WaveRepo {
    /// Insert a wave. Returns `None` when the id is already taken.
    pub async fn create(pool: &PgPool, wave: &NewWave<'_>) -> Result<Option<WaveRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO waves (id, name, members, batch_size, total, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WaveRow>(&query)
            .bind(wave.id)
            .bind(wave.name)
            .bind(wave.members)
            .bind(wave.batch_size)
            .bind(wave.total)
            .bind(wave.status)
            .bind(wave.created_at)
            .fetch_optional(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: &str) -> Result<Option<WaveRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM waves WHERE id = $1");
        sqlx::query_as::<_, WaveRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the rollup counters. Returns `false` if the wave is gone.
    pub async fn save_progress(
        pool: &PgPool,
        id: &str,
        total: i32,
        completed: i32,
        failed: i32,
        status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE waves \
             SET total = $2, completed = $3, failed = $4, status = $5, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(total)
        .bind(completed)
        .bind(failed)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
