//! Webhook and poll result correlation.
//!
//! Both channels end in [`JobService::ingest_result`]. The wave recompute
//! that follows is secondary: its failure is logged and never turns a
//! persisted result into an error.

use serde::Serialize;

use waveline_core::job::MigrationResult;
use waveline_core::status::JobStatus;
use waveline_core::types::JobKey;
use waveline_core::webhook::{CallbackIdentity, ReportedResult, WebhookPayload};

use crate::error::EngineResult;
use crate::jobs::{IngestOutcome, JobService, ResultChannel};
use crate::waves::WaveAggregator;

/// Outcome of the poll fallback.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub key: JobKey,
    /// Status string as reported by the remote service.
    pub remote_status: String,
    /// Normalized status, if the remote used a known word.
    pub status: Option<JobStatus>,
    pub body: serde_json::Value,
    /// Set when the remote reported something the state machine acted on.
    pub ingested: Option<IngestOutcome>,
}

#[derive(Clone)]
pub struct ResultCorrelator {
    jobs: JobService,
    waves: WaveAggregator,
}

impl ResultCorrelator {
    pub fn new(jobs: JobService, waves: WaveAggregator) -> Self {
        Self { jobs, waves }
    }

    /// Validate a webhook body against its callback identity and ingest it.
    ///
    /// Validation failures are returned before anything is written.
    pub async fn ingest_webhook(
        &self,
        payload: WebhookPayload,
        identity: &CallbackIdentity,
    ) -> EngineResult<IngestOutcome> {
        let reported = payload.normalize(identity)?;
        self.ingest(&reported, ResultChannel::Webhook).await
    }

    pub async fn ingest(
        &self,
        reported: &ReportedResult,
        channel: ResultChannel,
    ) -> EngineResult<IngestOutcome> {
        let outcome = self.jobs.ingest_result(reported, channel).await?;

        let wave_id = reported
            .wave_id
            .clone()
            .or_else(|| outcome.job().and_then(|job| job.wave_id.clone()));
        if let Some(wave_id) = wave_id {
            if let Err(e) = self.waves.recompute(&wave_id).await {
                tracing::warn!(
                    source_id = %reported.key.source_id,
                    target_id = reported.key.target_id,
                    wave_id = %wave_id,
                    error = %e,
                    "Wave recompute after result failed",
                );
            }
        }
        Ok(outcome)
    }

    /// Ask the migration service for the job's status. Terminal and running
    /// statuses are fed through the state machine like a webhook.
    pub async fn poll(&self, key: &JobKey) -> EngineResult<PollReport> {
        let job = self.jobs.find(key).await?;
        let remote = self.jobs.context().remote.fetch_status(key).await?;
        let status = remote.job_status();

        let ingested = match status {
            Some(status @ (JobStatus::Completed | JobStatus::Error | JobStatus::InProgress)) => {
                let reported = ReportedResult {
                    key: key.clone(),
                    status,
                    wave_id: job.wave_id.clone(),
                    result: MigrationResult::from_value(result_body(&remote.body)),
                    force: false,
                };
                Some(self.ingest(&reported, ResultChannel::Poll).await?)
            }
            Some(JobStatus::Pending) | None => None,
        };

        Ok(PollReport {
            key: key.clone(),
            remote_status: remote.status,
            status,
            body: remote.body,
            ingested,
        })
    }
}

/// The result part of a status body: its `result` object when present,
/// otherwise the body without the status field.
fn result_body(body: &serde_json::Value) -> serde_json::Value {
    if let Some(result) = body.get("result") {
        return result.clone();
    }
    match body {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != "status" && k.as_str() != "state")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}
