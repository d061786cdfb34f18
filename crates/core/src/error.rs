use crate::status::JobStatus;
use crate::types::JobKey;

/// Domain error taxonomy shared by every waveline crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A lock record already exists for the key, i.e. the job is running.
    #[error("Job {key} is already running")]
    AlreadyLocked { key: JobKey },

    /// A result or command could not be matched to a known job.
    #[error("Cannot correlate: {0}")]
    Correlation(String),

    /// A terminal result arrived that differs from the recorded one.
    #[error("Job {key} already finished as {recorded}; ignoring reported {incoming}")]
    ConflictingTerminalResult {
        key: JobKey,
        recorded: JobStatus,
        incoming: JobStatus,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a `NotFound` error on a job key.
    pub fn job_not_found(key: &JobKey) -> Self {
        Self::NotFound {
            entity: "Job",
            id: key.to_string(),
        }
    }

    /// Wrap any backend error as a storage error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}
