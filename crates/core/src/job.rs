//! The persisted migration job record.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::json_digest;
use crate::status::JobStatus;
use crate::types::{JobKey, TargetId, Timestamp};

/// Placeholder written over secrets in anything that leaves the process.
pub const REDACTED: &str = "***";

/// Parameters forwarded to the migration service on dispatch.
///
/// Persisted with the job so that a restart can re-dispatch with the same
/// (or selectively overridden) values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchParameters {
    pub site_id: String,
    pub secret: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub page_slug: Option<String>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub quality_analysis: bool,
}

impl DispatchParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.site_id.trim().is_empty() {
            return Err(CoreError::Validation("site_id must not be empty".into()));
        }
        if self.secret.is_empty() {
            return Err(CoreError::Validation("secret must not be empty".into()));
        }
        Ok(())
    }

    /// Copy with the secret replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        Self {
            secret: REDACTED.to_string(),
            ..self.clone()
        }
    }
}

/// Field-wise overrides applied on restart. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParameterOverrides {
    pub site_id: Option<String>,
    pub secret: Option<String>,
    pub workspace_id: Option<String>,
    pub page_slug: Option<String>,
    pub manual: Option<bool>,
    #[serde(alias = "quality")]
    pub quality_analysis: Option<bool>,
}

impl ParameterOverrides {
    /// Merge onto previously stored parameters.
    ///
    /// Without stored parameters the overrides must supply at least
    /// `site_id` and `secret`.
    pub fn apply(self, base: Option<DispatchParameters>) -> Result<DispatchParameters, CoreError> {
        let merged = match base {
            Some(base) => DispatchParameters {
                site_id: self.site_id.unwrap_or(base.site_id),
                secret: self.secret.unwrap_or(base.secret),
                workspace_id: self.workspace_id.or(base.workspace_id),
                page_slug: self.page_slug.or(base.page_slug),
                manual: self.manual.unwrap_or(base.manual),
                quality_analysis: self.quality_analysis.unwrap_or(base.quality_analysis),
            },
            None => DispatchParameters {
                site_id: self.site_id.ok_or_else(|| {
                    CoreError::Validation(
                        "No stored parameters; site_id is required to restart".into(),
                    )
                })?,
                secret: self.secret.ok_or_else(|| {
                    CoreError::Validation(
                        "No stored parameters; secret is required to restart".into(),
                    )
                })?,
                workspace_id: self.workspace_id,
                page_slug: self.page_slug,
                manual: self.manual.unwrap_or(false),
                quality_analysis: self.quality_analysis.unwrap_or(false),
            },
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Structured result reported by the migration service.
///
/// Known fields are typed; anything else the service sends is kept in
/// `extra` so nothing is lost on the way to storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MigrationResult {
    /// Synthetic failure result, used when the coordinator itself decides
    /// a job has failed (stale lock, kill).
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Build from an arbitrary JSON value. Non-objects are kept under
    /// `extra.raw`.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(_) => {
                serde_json::from_value(value.clone()).unwrap_or_else(|_| {
                    let mut extra = serde_json::Map::new();
                    extra.insert("raw".into(), value);
                    Self {
                        extra,
                        ..Self::default()
                    }
                })
            }
            serde_json::Value::Null => Self::default(),
            other => {
                let mut extra = serde_json::Map::new();
                extra.insert("raw".into(), other);
                Self {
                    extra,
                    ..Self::default()
                }
            }
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A migration job as stored by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationJob {
    pub source_id: String,
    pub target_id: TargetId,
    pub status: JobStatus,
    pub parameters: Option<DispatchParameters>,
    pub last_result: Option<MigrationResult>,
    /// Digest of `last_result` together with the status that carried it.
    pub result_hash: Option<String>,
    /// Weak back-reference to the wave this job was last batched into.
    pub wave_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl MigrationJob {
    /// A fresh `pending` job.
    pub fn new(key: &JobKey, wave_id: Option<String>, now: Timestamp) -> Self {
        Self {
            source_id: key.source_id.clone(),
            target_id: key.target_id,
            status: JobStatus::Pending,
            parameters: None,
            last_result: None,
            result_hash: None,
            wave_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.source_id.clone(), self.target_id)
    }

    /// Copy safe to hand to API clients.
    pub fn redacted(&self) -> Self {
        Self {
            parameters: self.parameters.as_ref().map(DispatchParameters::redacted),
            ..self.clone()
        }
    }
}

/// Fingerprint of a reported `(status, result)` pair.
pub fn result_fingerprint(status: JobStatus, result: &MigrationResult) -> String {
    json_digest(&serde_json::json!({
        "status": status.as_str(),
        "result": result.to_value(),
    }))
}

/// Filters for job listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub wave_id: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Default page size for job listing.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Maximum page size for job listing.
pub const MAX_LIST_LIMIT: i64 = 200;

impl JobListQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
