//! Row model for the `waves` table.

use sqlx::FromRow;
use waveline_core::error::CoreError;
use waveline_core::types::{JobKey, Timestamp};
use waveline_core::wave::{Wave, WaveProgress};

/// A row from the `waves` table. `members` is a JSON array of job keys.
#[derive(Debug, Clone, FromRow)]
pub struct WaveRow {
    pub id: String,
    pub name: String,
    pub members: serde_json::Value,
    pub batch_size: i32,
    pub total: i32,
    pub completed: i32,
    pub failed: i32,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<WaveRow> for Wave {
    type Error = CoreError;

    fn try_from(row: WaveRow) -> Result<Self, Self::Error> {
        let members: Vec<JobKey> = serde_json::from_value(row.members)
            .map_err(|e| CoreError::storage(format!("Corrupt members for wave {}: {e}", row.id)))?;
        Ok(Self {
            status: row.status.parse()?,
            name: row.name,
            members,
            batch_size: row.batch_size.max(1) as u32,
            progress: WaveProgress {
                total: row.total.max(0) as u32,
                completed: row.completed.max(0) as u32,
                failed: row.failed.max(0) as u32,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            id: row.id,
        })
    }
}
