//! Row model for the `migration_jobs` table.

use sqlx::FromRow;
use waveline_core::error::CoreError;
use waveline_core::job::{DispatchParameters, MigrationJob, MigrationResult};
use waveline_core::types::{TargetId, Timestamp};

/// A row from the `migration_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub source_id: String,
    pub target_id: TargetId,
    pub status: String,
    pub parameters: Option<serde_json::Value>,
    pub last_result: Option<serde_json::Value>,
    pub result_hash: Option<String>,
    pub wave_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for MigrationJob {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let parameters = row
            .parameters
            .map(serde_json::from_value::<DispatchParameters>)
            .transpose()
            .map_err(|e| {
                CoreError::storage(format!(
                    "Corrupt parameters for job {}/{}: {e}",
                    row.source_id, row.target_id
                ))
            })?;
        Ok(Self {
            status: row.status.parse()?,
            parameters,
            last_result: row.last_result.map(MigrationResult::from_value),
            result_hash: row.result_hash,
            wave_id: row.wave_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            source_id: row.source_id,
            target_id: row.target_id,
        })
    }
}

/// Serialize the JSONB columns of a job for writing.
pub fn json_columns(
    job: &MigrationJob,
) -> Result<(Option<serde_json::Value>, Option<serde_json::Value>), CoreError> {
    let parameters = job
        .parameters
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(CoreError::storage)?;
    let last_result = job.last_result.as_ref().map(MigrationResult::to_value);
    Ok((parameters, last_result))
}
