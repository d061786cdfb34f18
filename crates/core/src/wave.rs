//! Waves: fixed batches of jobs with rollup progress.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{JobStatus, WaveStatus};
use crate::types::{JobKey, Timestamp};

/// Prefix of every generated wave id.
pub const WAVE_ID_PREFIX: &str = "wave";

/// Length of the random suffix of a wave id.
const WAVE_ID_SUFFIX_LEN: usize = 8;

/// Upper bound on wave size.
pub const MAX_WAVE_MEMBERS: usize = 5_000;

/// Default number of members dispatched concurrently by a bulk restart.
pub const DEFAULT_BATCH_SIZE: u32 = 5;

fn wave_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^wave-\d{14}-[a-z0-9]{8}$").expect("wave id pattern is a valid regex")
    })
}

/// Generate a wave id: `wave-{YYYYMMDDHHMMSS}-{8 random [a-z0-9]}`.
///
/// Time-ordered and collision-improbable, not globally unique.
pub fn generate_wave_id(now: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(WAVE_ID_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{WAVE_ID_PREFIX}-{}-{suffix}", now.format("%Y%m%d%H%M%S"))
}

/// `true` if `token` has the shape of a generated wave id.
///
/// Webhook payloads carry an opaque correlation token; only tokens of this
/// shape are treated as wave references.
pub fn is_wave_id(token: &str) -> bool {
    wave_id_pattern().is_match(token)
}

/// Aggregate counters of a wave, always recounted from member statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveProgress {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
}

impl WaveProgress {
    /// Count member statuses. Members with no job record count as pending.
    pub fn tally<I>(total: usize, statuses: I) -> (Self, WaveStatus)
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let mut progress = Self {
            total: total as u32,
            ..Self::default()
        };
        let mut started = false;
        for status in statuses {
            match status {
                JobStatus::Completed => progress.completed += 1,
                JobStatus::Error => progress.failed += 1,
                JobStatus::InProgress => started = true,
                JobStatus::Pending => {}
            }
        }
        let status = progress.derive_status(started);
        (progress, status)
    }

    /// Number of members in a terminal state.
    pub fn finished(&self) -> u32 {
        self.completed + self.failed
    }

    /// `completed` iff every member is terminal (failures included);
    /// `in_progress` once anything has started or finished; else `pending`.
    pub fn derive_status(&self, any_in_progress: bool) -> WaveStatus {
        if self.total > 0 && self.finished() >= self.total {
            WaveStatus::Completed
        } else if any_in_progress || self.finished() > 0 {
            WaveStatus::InProgress
        } else {
            WaveStatus::Pending
        }
    }
}

/// A batch of jobs created in one go.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wave {
    pub id: String,
    pub name: String,
    /// Insertion order is dispatch order.
    pub members: Vec<JobKey>,
    pub batch_size: u32,
    pub progress: WaveProgress,
    pub status: WaveStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Wave {
    /// Build a new wave, validating and de-duplicating members while
    /// keeping their first-seen order.
    pub fn new(name: &str, members: Vec<JobKey>, batch_size: u32) -> Result<Self, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Wave name must not be empty".into()));
        }
        if members.is_empty() {
            return Err(CoreError::Validation(
                "A wave needs at least one member".into(),
            ));
        }
        if members.len() > MAX_WAVE_MEMBERS {
            return Err(CoreError::Validation(format!(
                "A wave may have at most {MAX_WAVE_MEMBERS} members"
            )));
        }
        if batch_size == 0 {
            return Err(CoreError::Validation("batch_size must be at least 1".into()));
        }

        let mut seen = HashSet::with_capacity(members.len());
        let mut ordered = Vec::with_capacity(members.len());
        for key in members {
            key.validate()?;
            if seen.insert(key.clone()) {
                ordered.push(key);
            }
        }

        let now = Utc::now();
        let (progress, status) = WaveProgress::tally(ordered.len(), std::iter::empty());
        Ok(Self {
            id: generate_wave_id(now),
            name: name.to_string(),
            members: ordered,
            batch_size,
            progress,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.members.contains(key)
    }
}
