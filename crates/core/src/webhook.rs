//! Inbound result payloads from the migration service.
//!
//! The service reports completion by calling the callback URL handed out
//! at dispatch time. Identity can arrive in the body, in the callback
//! query string, or both; the body wins when both are present.

use serde::Deserialize;

use crate::error::CoreError;
use crate::job::{result_fingerprint, MigrationResult};
use crate::status::JobStatus;
use crate::types::{JobKey, TargetId};
use crate::wave::is_wave_id;

/// Raw webhook body, as lenient as the service's various versions require.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, alias = "sourceId", alias = "project_id", alias = "projectId")]
    pub source_id: Option<String>,
    #[serde(default, alias = "targetId")]
    pub target_id: Option<serde_json::Value>,
    #[serde(default, alias = "state")]
    pub status: Option<String>,
    /// Opaque correlation token; treated as a wave id only if it has the
    /// wave id shape.
    #[serde(
        default,
        alias = "waveId",
        alias = "correlation_token",
        alias = "token"
    )]
    pub wave_id: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Allows a terminal result to replace a different recorded one.
    #[serde(default, alias = "override")]
    pub force: bool,
    /// Everything else. Used as the result payload when `result` is absent.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Identity carried by the callback URL query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackIdentity {
    pub source_id: Option<String>,
    pub target_id: Option<TargetId>,
    pub wave_id: Option<String>,
}

/// A validated, normalized result ready for the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedResult {
    pub key: JobKey,
    pub status: JobStatus,
    pub wave_id: Option<String>,
    pub result: MigrationResult,
    pub force: bool,
}

impl ReportedResult {
    /// Fingerprint of `(status, result)`, stable across redeliveries.
    pub fn fingerprint(&self) -> String {
        result_fingerprint(self.status, &self.result)
    }
}

fn parse_target_id(value: &serde_json::Value) -> Result<TargetId, CoreError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<TargetId>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CoreError::Validation(format!("target_id '{value}' is not an integer")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl WebhookPayload {
    /// Validate and normalize. Missing identity or an unknown status is a
    /// validation error and must not mutate any state.
    pub fn normalize(self, callback: &CallbackIdentity) -> Result<ReportedResult, CoreError> {
        let source_id = non_empty(self.source_id)
            .or_else(|| non_empty(callback.source_id.clone()))
            .ok_or_else(|| CoreError::Validation("source_id is required".into()))?;

        let target_id = match &self.target_id {
            Some(serde_json::Value::Null) | None => callback
                .target_id
                .ok_or_else(|| CoreError::Validation("target_id is required".into()))?,
            Some(value) => parse_target_id(value)?,
        };

        let key = JobKey::new(source_id, target_id);
        key.validate()?;

        let raw_status = non_empty(self.status)
            .ok_or_else(|| CoreError::Validation("status is required".into()))?;
        let status = JobStatus::from_reported(&raw_status).ok_or_else(|| {
            CoreError::Validation(format!("Unrecognized status '{raw_status}'"))
        })?;
        if status == JobStatus::Pending {
            return Err(CoreError::Validation(
                "A result cannot report status 'pending'".into(),
            ));
        }

        let wave_id = non_empty(self.wave_id)
            .or_else(|| non_empty(callback.wave_id.clone()))
            .filter(|token| is_wave_id(token));

        let result = match self.result {
            Some(value) => MigrationResult::from_value(value),
            None => MigrationResult::from_value(serde_json::Value::Object(self.extra)),
        };

        Ok(ReportedResult {
            key,
            status,
            wave_id,
            result,
            force: self.force,
        })
    }
}
