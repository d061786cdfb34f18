//! Typed calls to the migration-execution service.
//!
//! Wraps the service's two endpoints on top of [`ResilientClient`]:
//! `POST {base}/migrations` to start a run and
//! `GET {base}/migrations/status` to poll it.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use waveline_core::job::DispatchParameters;
use waveline_core::status::JobStatus;
use waveline_core::types::{JobKey, TargetId};

use crate::client::ResilientClient;
use crate::error::DispatchError;
use crate::transport::RawResponse;

/// Path of the coordinator's result webhook, relative to its public base URL.
pub const WEBHOOK_PATH: &str = "/api/v1/webhooks/migration-result";

/// Body of `POST /migrations`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRequest {
    pub source_id: String,
    pub target_id: TargetId,
    pub site_id: String,
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_slug: Option<String>,
    pub manual: bool,
    pub quality_analysis: bool,
    pub callback_url: String,
}

impl DispatchRequest {
    pub fn new(key: &JobKey, parameters: &DispatchParameters, callback_url: String) -> Self {
        Self {
            source_id: key.source_id.clone(),
            target_id: key.target_id,
            site_id: parameters.site_id.clone(),
            secret: parameters.secret.clone(),
            workspace_id: parameters.workspace_id.clone(),
            page_slug: parameters.page_slug.clone(),
            manual: parameters.manual,
            quality_analysis: parameters.quality_analysis,
            callback_url,
        }
    }
}

/// What the service says after accepting a run. Both fields are optional;
/// an empty body is a valid acceptance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DispatchAccepted {
    /// Worker pid, when the service runs on this host.
    #[serde(default)]
    pub pid: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of the status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStatus {
    /// Raw status string as reported.
    pub status: String,
    /// Full body, used as the result payload on terminal statuses.
    pub body: serde_json::Value,
}

impl RemoteStatus {
    /// Normalized status, `None` if the service used an unknown word.
    pub fn job_status(&self) -> Option<JobStatus> {
        JobStatus::from_reported(&self.status)
    }
}

/// Client for one migration service deployment.
#[derive(Clone)]
pub struct MigrationServiceApi {
    client: ResilientClient,
    base_url: Url,
}

impl MigrationServiceApi {
    /// `base_url` is the service root, e.g. `http://migrator:8080`.
    pub fn new(client: ResilientClient, base_url: &str) -> Result<Self, DispatchError> {
        let base_url = parse_base(base_url)?;
        Ok(Self { client, base_url })
    }

    /// Start a migration run.
    pub async fn start_migration(
        &self,
        request: &DispatchRequest,
    ) -> Result<DispatchAccepted, DispatchError> {
        let url = self.endpoint("migrations")?;
        let response = self
            .client
            .send_json(Method::POST, url.as_str(), request)
            .await?;
        parse_accepted(&response)
    }

    /// Ask the service for the current state of a run.
    pub async fn fetch_status(&self, key: &JobKey) -> Result<RemoteStatus, DispatchError> {
        let mut url = self.endpoint("migrations/status")?;
        url.query_pairs_mut()
            .append_pair("source_id", &key.source_id)
            .append_pair("target_id", &key.target_id.to_string());

        let response = self.client.send(Method::GET, url.as_str(), None, None).await?;
        parse_status(&response)
    }

    // ---- private helpers ----

    fn endpoint(&self, path: &str) -> Result<Url, DispatchError> {
        self.base_url
            .join(path)
            .map_err(|e| DispatchError::InvalidUrl(format!("{}{path}: {e}", self.base_url)))
    }
}

/// Callback URL handed to the service so its result can be correlated
/// without a lookup.
pub fn build_callback_url(
    public_base: &str,
    key: &JobKey,
    wave_id: Option<&str>,
) -> Result<String, DispatchError> {
    // Relative join keeps any path prefix of the public base.
    let mut url = parse_base(public_base)?
        .join(WEBHOOK_PATH.trim_start_matches('/'))
        .map_err(|e| DispatchError::InvalidUrl(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("source_id", &key.source_id)
            .append_pair("target_id", &key.target_id.to_string());
        if let Some(wave_id) = wave_id {
            query.append_pair("wave_id", wave_id);
        }
    }
    Ok(url.into())
}

/// `Url::join` drops the last path segment unless the base ends in '/'.
fn parse_base(raw: &str) -> Result<Url, DispatchError> {
    let normalized = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| DispatchError::InvalidUrl(format!("{raw}: {e}")))
}

fn parse_accepted(response: &RawResponse) -> Result<DispatchAccepted, DispatchError> {
    if response.body.trim().is_empty() {
        return Ok(DispatchAccepted::default());
    }
    // Non-JSON acceptance bodies are kept as a message.
    match serde_json::from_str::<DispatchAccepted>(&response.body) {
        Ok(accepted) => Ok(accepted),
        Err(_) => Ok(DispatchAccepted {
            pid: None,
            message: Some(response.body.trim().to_string()),
        }),
    }
}

fn parse_status(response: &RawResponse) -> Result<RemoteStatus, DispatchError> {
    let body: serde_json::Value = serde_json::from_str(&response.body)
        .map_err(|e| DispatchError::Decode(format!("status response is not JSON: {e}")))?;
    let status = body
        .get("status")
        .or_else(|| body.get("state"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| DispatchError::Decode("status response has no 'status' field".into()))?
        .to_string();
    Ok(RemoteStatus { status, body })
}
