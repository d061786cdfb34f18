//! Wave aggregation: batch creation, progress rollup and bulk commands.
//!
//! Progress is always recounted from member job statuses, never
//! incremented, so recomputation is idempotent and tolerant of
//! out-of-order or duplicated events.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use waveline_core::error::CoreError;
use waveline_core::job::ParameterOverrides;
use waveline_core::status::JobStatus;
use waveline_core::types::JobKey;
use waveline_core::wave::{Wave, WaveProgress, DEFAULT_BATCH_SIZE};
use waveline_events::EventBus;

use crate::error::EngineResult;
use crate::jobs::JobService;

/// Input of [`WaveAggregator::create_wave`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWave {
    pub name: String,
    pub members: Vec<JobKey>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

/// Input of [`WaveAggregator::restart_all`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestartAll {
    /// Subset to restart; all members when absent.
    #[serde(default)]
    pub members: Option<Vec<JobKey>>,
    #[serde(flatten)]
    pub overrides: ParameterOverrides,
    #[serde(default)]
    pub force: bool,
}

/// Per-member result of a bulk command.
#[derive(Debug, Clone, Serialize)]
pub struct MemberOutcome {
    pub key: JobKey,
    pub success: bool,
    pub status: Option<JobStatus>,
    pub error: Option<String>,
}

impl MemberOutcome {
    fn ok(key: JobKey, status: JobStatus) -> Self {
        Self {
            key,
            success: true,
            status: Some(status),
            error: None,
        }
    }

    fn failed(key: JobKey, error: impl ToString) -> Self {
        Self {
            key,
            success: false,
            status: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub wave: Wave,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub members: Vec<MemberOutcome>,
}

impl BulkReport {
    fn new(wave: Wave, members: Vec<MemberOutcome>) -> Self {
        let succeeded = members.iter().filter(|m| m.success).count();
        Self {
            wave,
            requested: members.len(),
            succeeded,
            failed: members.len() - succeeded,
            members,
        }
    }
}

/// Groups jobs into waves and keeps their rollup current.
#[derive(Clone)]
pub struct WaveAggregator {
    jobs: JobService,
}

impl WaveAggregator {
    pub fn new(jobs: JobService) -> Self {
        Self { jobs }
    }

    /// Create a wave. Member jobs are created as `pending` if they do not
    /// exist yet and get the wave attached as their back-reference.
    pub async fn create_wave(&self, input: CreateWave) -> EngineResult<Wave> {
        let store = &self.jobs.context().store;
        let wave = Wave::new(
            &input.name,
            input.members,
            input.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        )?;
        store.create_wave(&wave).await?;
        for key in &wave.members {
            store.ensure(key, Some(&wave.id)).await?;
        }

        tracing::info!(
            wave_id = %wave.id,
            name = %wave.name,
            members = wave.members.len(),
            batch_size = wave.batch_size,
            "Wave created",
        );
        self.recompute(&wave.id).await
    }

    /// Recount progress from member statuses and persist it.
    pub async fn recompute(&self, wave_id: &str) -> EngineResult<Wave> {
        let store = &self.jobs.context().store;
        let mut wave = store
            .find_wave(wave_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Wave",
                id: wave_id.to_string(),
            })?;

        let statuses: HashMap<JobKey, JobStatus> = store
            .find_many(&wave.members)
            .await?
            .into_iter()
            .map(|job| (job.key(), job.status))
            .collect();
        let (progress, status) = WaveProgress::tally(
            wave.members.len(),
            wave.members.iter().filter_map(|key| statuses.get(key).copied()),
        );

        if progress != wave.progress || status != wave.status {
            store.save_progress(&wave.id, progress, status).await?;
            tracing::debug!(
                wave_id = %wave.id,
                total = progress.total,
                completed = progress.completed,
                failed = progress.failed,
                status = %status,
                "Wave progress recomputed",
            );
        }
        wave.progress = progress;
        wave.status = status;
        Ok(wave)
    }

    /// Restart the selected members, `batch_size` at a time, in member
    /// order. Failures are reported per member and do not stop the batch.
    pub async fn restart_all(&self, wave_id: &str, input: RestartAll) -> EngineResult<BulkReport> {
        let wave = self.recompute(wave_id).await?;
        let RestartAll {
            members,
            overrides,
            force,
        } = input;
        let selected = members.unwrap_or_else(|| wave.members.clone());

        let outcomes: Vec<MemberOutcome> = stream::iter(selected)
            .map(|key| {
                let overrides = overrides.clone();
                let wave = &wave;
                async move {
                    if !wave.contains(&key) {
                        return MemberOutcome::failed(
                            key,
                            format!("Not a member of wave {}", wave.id),
                        );
                    }
                    match self.jobs.restart(&key, overrides, force).await {
                        Ok(outcome) => MemberOutcome::ok(key, outcome.job.status),
                        Err(e) => MemberOutcome::failed(key, e),
                    }
                }
            })
            .buffered(wave.batch_size.max(1) as usize)
            .collect()
            .await;

        let report = BulkReport::new(self.recompute(wave_id).await?, outcomes);
        tracing::info!(
            wave_id,
            requested = report.requested,
            succeeded = report.succeeded,
            failed = report.failed,
            "Wave restart finished",
        );
        Ok(report)
    }

    /// Reset every member to `pending` and recount.
    pub async fn reset_wave_status(&self, wave_id: &str) -> EngineResult<BulkReport> {
        let wave = self.recompute(wave_id).await?;

        let mut outcomes = Vec::with_capacity(wave.members.len());
        for key in &wave.members {
            outcomes.push(match self.jobs.reset(key).await {
                Ok(job) => MemberOutcome::ok(key.clone(), job.status),
                Err(e) => MemberOutcome::failed(key.clone(), e),
            });
        }

        let report = BulkReport::new(self.recompute(wave_id).await?, outcomes);
        tracing::info!(
            wave_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Wave reset",
        );
        Ok(report)
    }

    /// Recompute the wave of every job event that names one, until
    /// cancelled.
    pub async fn follow_events(&self, bus: &EventBus, cancel: CancellationToken) {
        let mut rx = bus.subscribe();
        tracing::info!("Wave event follower started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Wave event follower shutting down");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(event) => {
                        let Some(wave_id) = event.wave_id else { continue };
                        if let Err(e) = self.recompute(&wave_id).await {
                            tracing::warn!(
                                wave_id = %wave_id,
                                error = %e,
                                "Wave recompute after job event failed",
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Wave event follower lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }
}
