use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Target ids are assigned by the destination platform and fit in BIGINT.
pub type TargetId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Maximum length of an external source id.
const MAX_SOURCE_ID_LEN: usize = 128;

/// Natural key of a migration job: external source id plus target id.
///
/// Neither half is globally unique on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub source_id: String,
    pub target_id: TargetId,
}

impl JobKey {
    pub fn new(source_id: impl Into<String>, target_id: TargetId) -> Self {
        Self {
            source_id: source_id.into(),
            target_id,
        }
    }

    /// Check that the key can be used as a lock file stem.
    ///
    /// The source id must be non-empty and contain only alphanumeric,
    /// hyphen, underscore or dot characters; the target id must be positive.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_id.is_empty() {
            return Err(CoreError::Validation("source_id must not be empty".into()));
        }
        if self.source_id.len() > MAX_SOURCE_ID_LEN {
            return Err(CoreError::Validation(format!(
                "source_id must not exceed {MAX_SOURCE_ID_LEN} characters"
            )));
        }
        if self.source_id.starts_with('.')
            || !self
                .source_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(CoreError::Validation(
                "source_id may only contain alphanumeric, hyphen, underscore, or dot characters"
                    .into(),
            ));
        }
        if self.target_id <= 0 {
            return Err(CoreError::Validation(
                "target_id must be a positive integer".into(),
            ));
        }
        Ok(())
    }

    /// File stem used for the lock record, `{source_id}-{target_id}`.
    pub fn stem(&self) -> String {
        format!("{}-{}", self.source_id, self.target_id)
    }

    /// Parse a `{source_id}-{target_id}` stem back into a key.
    ///
    /// Source ids may themselves contain hyphens (UUIDs), so the target id
    /// is taken from the last segment.
    pub fn from_stem(stem: &str) -> Option<Self> {
        let (source_id, target) = stem.rsplit_once('-')?;
        let target_id = target.parse::<TargetId>().ok()?;
        let key = Self::new(source_id, target_id);
        key.validate().ok().map(|()| key)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.target_id)
    }
}
