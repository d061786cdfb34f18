//! Row model for the `job_locks` table.

use sqlx::FromRow;
use waveline_core::lock::LockRecord;
use waveline_core::types::{JobKey, TargetId, Timestamp};

/// A row from the `job_locks` table.
#[derive(Debug, Clone, FromRow)]
pub struct LockRow {
    pub source_id: String,
    pub target_id: TargetId,
    pub pid: Option<i32>,
    pub started_at: Timestamp,
    pub last_check: Timestamp,
    pub current_stage: Option<String>,
}

impl From<LockRow> for LockRecord {
    fn from(row: LockRow) -> Self {
        Self {
            key: JobKey::new(row.source_id, row.target_id),
            pid: row.pid,
            started_at: row.started_at,
            last_check: row.last_check,
            current_stage: row.current_stage,
        }
    }
}
