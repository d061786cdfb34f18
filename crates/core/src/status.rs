//! Job and wave status models.
//!
//! Statuses are stored as lowercase text (`pending`, `in_progress`,
//! `completed`, `error`). Remote services report a wider vocabulary which
//! [`JobStatus::from_reported`] folds onto these four values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Authoritative per-job status.
///
/// `pending -> in_progress -> {completed | error}`. Both terminal states can
/// only be left through an explicit reset (back to `pending`) or a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

/// Statuses a job may be (re)dispatched from without `force`.
pub const DISPATCHABLE: [JobStatus; 3] =
    [JobStatus::Pending, JobStatus::Completed, JobStatus::Error];

/// Every status; used for unconditional transitions.
pub const ANY_STATUS: [JobStatus; 4] = [
    JobStatus::Pending,
    JobStatus::InProgress,
    JobStatus::Completed,
    JobStatus::Error,
];

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Normalize a status string reported by the migration service.
    ///
    /// `success` and friends map to `completed`, `failed` and friends to
    /// `error`. Matching is case-insensitive. Unknown values yield `None`.
    pub fn from_reported(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "waiting" => Some(Self::Pending),
            "in_progress" | "in-progress" | "running" | "processing" | "started" => {
                Some(Self::InProgress)
            }
            "completed" | "complete" | "success" | "succeeded" | "done" => Some(Self::Completed),
            "error" | "failed" | "failure" | "errored" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    /// Strict parse of the stored representation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ANY_STATUS
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status '{s}'")))
    }
}

/// Derived wave status.
///
/// A wave is `completed` once every member is terminal, failed members
/// included. `Error` is never derived; it only exists so stored values
/// round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl WaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for WaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaveStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(CoreError::Validation(format!(
                "Unknown wave status '{other}'"
            ))),
        }
    }
}
