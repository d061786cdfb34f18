//! The job state machine.
//!
//! `pending -> in_progress -> {completed | error}`, with `reset` as the only
//! way back to `pending`. Every status change goes through the store's
//! compare-and-set, so whichever result channel (webhook, poll, monitor)
//! finalizes a job first wins and later arrivals become no-ops or logged
//! conflicts.

use chrono::Utc;
use serde::Serialize;

use waveline_core::error::CoreError;
use waveline_core::job::{
    DispatchParameters, JobListQuery, MigrationJob, MigrationResult, ParameterOverrides,
};
use waveline_core::liveness::Termination;
use waveline_core::lock::{LockRecord, LockTouch};
use waveline_core::status::{JobStatus, ANY_STATUS, DISPATCHABLE};
use waveline_core::store::JobTransition;
use waveline_core::types::{JobKey, TargetId, Timestamp};
use waveline_core::webhook::ReportedResult;
use waveline_dispatch::api::build_callback_url;
use waveline_dispatch::DispatchRequest;
use waveline_events::{JobEvent, JobEventKind};

use crate::context::EngineContext;
use crate::error::EngineResult;

/// Stage recorded on a lock while the dispatch call is in flight.
const STAGE_DISPATCHING: &str = "dispatching";

/// Stage recorded once the migration service accepted the run.
const STAGE_DISPATCHED: &str = "dispatched";

/// Stage recorded for progress reports that carry none.
const STAGE_RUNNING: &str = "running";

const KILLED_MESSAGE: &str = "Killed by operator";

// ---------------------------------------------------------------------------
// Commands and reports
// ---------------------------------------------------------------------------

/// Dispatch a job.
#[derive(Debug, Clone)]
pub struct RunCommand {
    pub key: JobKey,
    pub parameters: DispatchParameters,
    pub wave_id: Option<String>,
    /// Allow dispatch while the job is `in_progress`, replacing its lock.
    pub force: bool,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub job: MigrationJob,
    pub lock: LockRecord,
    pub callback_url: String,
    pub worker_pid: Option<i32>,
    pub message: Option<String>,
}

/// Which channel delivered a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultChannel {
    Webhook,
    Poll,
}

impl ResultChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poll => "poll",
        }
    }
}

/// What ingesting a result did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The job was `in_progress` and is now terminal.
    Applied { job: MigrationJob },
    /// An explicit override replaced a different terminal result.
    Overridden {
        job: MigrationJob,
        previous: JobStatus,
    },
    /// Same status as already recorded.
    Duplicate { job: MigrationJob },
    /// A different terminal status was already recorded and was kept.
    Conflict {
        job: MigrationJob,
        incoming: JobStatus,
    },
    /// Non-terminal progress report; the lock was refreshed.
    Progress { stage: String },
    /// Nothing to do, e.g. a late result for a job that was reset.
    Ignored { reason: String },
}

impl IngestOutcome {
    /// `true` if the stored status changed.
    pub fn changed_status(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::Overridden { .. })
    }

    pub fn job(&self) -> Option<&MigrationJob> {
        match self {
            Self::Applied { job }
            | Self::Overridden { job, .. }
            | Self::Duplicate { job }
            | Self::Conflict { job, .. } => Some(job),
            Self::Progress { .. } | Self::Ignored { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KillReport {
    pub key: JobKey,
    pub pid: Option<i32>,
    /// Liveness observed before signalling; `None` when not checked.
    pub was_alive: Option<bool>,
    pub signal_sent: bool,
    pub lock_released: bool,
    pub status: Option<JobStatus>,
}

/// One step of a composite recovery.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: &'static str,
    pub success: bool,
    pub message: String,
}

impl StepOutcome {
    fn ok(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            success: true,
            message: message.into(),
        }
    }

    fn failed(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HardResetReport {
    pub key: JobKey,
    pub success: bool,
    pub steps: Vec<StepOutcome>,
}

/// Lock and liveness introspection for one job.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub key: JobKey,
    pub status: Option<JobStatus>,
    pub lock: Option<LockRecord>,
    pub pid: Option<i32>,
    /// Signal probe result for local workers; `None` for remote ones.
    pub alive: Option<bool>,
    pub lock_age_secs: Option<i64>,
    pub silence_secs: Option<i64>,
    pub stale: bool,
}

/// Staleness rule shared by the monitor and introspection.
///
/// Local workers: process gone and lock older than the threshold.
/// Remote workers: no heartbeat or liveness refresh for longer than the
/// threshold.
pub fn is_stale(lock: &LockRecord, alive: Option<bool>, now: Timestamp, threshold_secs: i64) -> bool {
    match alive {
        Some(true) => false,
        Some(false) => lock.age_secs(now) > threshold_secs,
        None => lock.silence_secs(now) > threshold_secs,
    }
}

// ---------------------------------------------------------------------------
// JobService
// ---------------------------------------------------------------------------

/// Authoritative per-job transitions.
#[derive(Clone)]
pub struct JobService {
    ctx: EngineContext,
}

impl JobService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub async fn find(&self, key: &JobKey) -> EngineResult<MigrationJob> {
        Ok(self
            .ctx
            .store
            .find(key)
            .await?
            .ok_or_else(|| CoreError::job_not_found(key))?)
    }

    pub async fn list(&self, query: &JobListQuery) -> EngineResult<Vec<MigrationJob>> {
        Ok(self.ctx.store.list(query).await?)
    }

    /// Find the job key for a target id.
    ///
    /// An explicit source id wins. Otherwise the lock records are searched,
    /// then the most recent job row for the target.
    pub async fn resolve_key(
        &self,
        target_id: TargetId,
        source_id: Option<&str>,
    ) -> EngineResult<JobKey> {
        if let Some(source_id) = source_id.map(str::trim).filter(|s| !s.is_empty()) {
            let key = JobKey::new(source_id, target_id);
            key.validate()?;
            return Ok(key);
        }
        if target_id <= 0 {
            return Err(CoreError::Validation("target_id must be a positive integer".into()).into());
        }
        if let Some(lock) = self.ctx.locks.find_by_target(target_id).await? {
            return Ok(lock.key);
        }
        if let Some(job) = self.ctx.store.find_latest_by_target(target_id).await? {
            return Ok(job.key());
        }
        Err(CoreError::Correlation(format!(
            "No lock or job record for target {target_id}; cannot determine source_id"
        ))
        .into())
    }

    /// Acquire the lock, mark the job `in_progress` and dispatch it.
    ///
    /// If the dispatch call fails the lock is released and the job goes
    /// back to the status and parameters it had before. The work runs on
    /// its own task, so dropping the returned future (request timeout,
    /// client disconnect) never leaves a half-dispatched job behind.
    pub async fn run(&self, cmd: RunCommand) -> EngineResult<RunOutcome> {
        let service = self.clone();
        tokio::spawn(async move { service.dispatch(cmd).await })
            .await
            .map_err(|e| CoreError::Internal(format!("Dispatch task failed: {e}")))?
    }

    async fn dispatch(&self, cmd: RunCommand) -> EngineResult<RunOutcome> {
        let RunCommand {
            key,
            parameters,
            wave_id,
            force,
        } = cmd;
        key.validate()?;
        parameters.validate()?;

        let job = self.ctx.store.ensure(&key, wave_id.as_deref()).await?;
        if job.status == JobStatus::InProgress && !force {
            return Err(CoreError::AlreadyLocked { key }.into());
        }
        let callback_url =
            build_callback_url(&self.ctx.config.public_base_url, &key, job.wave_id.as_deref())?;

        if force && self.release_quietly(&key).await {
            tracing::warn!(
                source_id = %key.source_id,
                target_id = key.target_id,
                "Forced run replaced an existing lock",
            );
        }
        let lock = self
            .ctx
            .locks
            .acquire(LockRecord::new(key.clone(), Utc::now()).with_stage(STAGE_DISPATCHING))
            .await?;

        let (prior_status, prior_parameters) = (job.status, job.parameters);
        let expected: &[JobStatus] = if force { &ANY_STATUS } else { &DISPATCHABLE };
        let change = JobTransition::to(JobStatus::InProgress).with_parameters(parameters.clone());
        let Some(running) = self.ctx.store.transition(&key, expected, change).await? else {
            self.release_quietly(&key).await;
            return Err(CoreError::Conflict(format!(
                "Job {key} changed status while it was being dispatched"
            ))
            .into());
        };

        let request = DispatchRequest::new(&key, &parameters, callback_url.clone());
        let accepted = match self.ctx.remote.start_migration(&request).await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    error = %e,
                    "Dispatch failed, rolling back",
                );
                self.roll_back_dispatch(&key, prior_status, prior_parameters).await;
                return Err(e.into());
            }
        };

        let touch = LockTouch {
            worker_pid: accepted.pid,
            ..LockTouch::checked_now().stage(STAGE_DISPATCHED)
        };
        let lock = match self.ctx.locks.touch(&key, touch).await {
            Ok(updated) => updated,
            Err(e) => {
                // A result may already have arrived and released the lock.
                tracing::debug!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    error = %e,
                    "Could not record dispatch on lock",
                );
                lock
            }
        };

        tracing::info!(
            source_id = %key.source_id,
            target_id = key.target_id,
            wave_id = ?running.wave_id,
            worker_pid = ?accepted.pid,
            force,
            "Job dispatched",
        );
        self.publish(JobEventKind::Dispatched, &running);

        Ok(RunOutcome {
            job: running.redacted(),
            lock,
            callback_url,
            worker_pid: accepted.pid,
            message: accepted.message,
        })
    }

    /// Re-dispatch with stored parameters, selectively overridden.
    pub async fn restart(
        &self,
        key: &JobKey,
        overrides: ParameterOverrides,
        force: bool,
    ) -> EngineResult<RunOutcome> {
        let job = self.find(key).await?;
        let parameters = overrides.apply(job.parameters)?;
        self.run(RunCommand {
            key: key.clone(),
            parameters,
            wave_id: None,
            force,
        })
        .await
    }

    /// Stop the local worker if there is one, release the lock and force
    /// the job to `error`.
    ///
    /// Without `force` the process is probed first and only signalled
    /// (SIGTERM) when alive. With `force` it is sent SIGKILL unprobed.
    /// Terminal jobs keep their status.
    pub async fn kill(&self, key: &JobKey, force: bool) -> EngineResult<KillReport> {
        let job = self.ctx.store.find(key).await?;
        let lock = self.ctx.locks.find(key).await?;
        if job.is_none() && lock.is_none() {
            return Err(CoreError::job_not_found(key).into());
        }

        let pid = lock.as_ref().and_then(|lock| lock.pid);
        let mut was_alive = None;
        let mut signal_sent = false;
        if let Some(pid) = pid {
            if force {
                signal_sent = self.ctx.probe.terminate(pid, Termination::Forced)?;
            } else {
                let alive = self.ctx.probe.is_alive(pid);
                was_alive = Some(alive);
                if alive {
                    signal_sent = self.ctx.probe.terminate(pid, Termination::Graceful)?;
                }
            }
        }

        let lock_released = self.release_quietly(key).await;
        let change = JobTransition::to(JobStatus::Error)
            .with_result(MigrationResult::failure(KILLED_MESSAGE));
        let failed = self
            .ctx
            .store
            .transition(key, &[JobStatus::Pending, JobStatus::InProgress], change)
            .await?;
        if let Some(failed) = &failed {
            self.publish(JobEventKind::Failed, failed);
        }

        let status = failed
            .map(|job| job.status)
            .or_else(|| job.map(|job| job.status));
        tracing::info!(
            source_id = %key.source_id,
            target_id = key.target_id,
            pid = ?pid,
            signal_sent,
            lock_released,
            force,
            "Job killed",
        );
        Ok(KillReport {
            key: key.clone(),
            pid,
            was_alive,
            signal_sent,
            lock_released,
            status,
        })
    }

    /// Administrative unlock. The job status is left alone.
    pub async fn remove_lock(&self, key: &JobKey) -> EngineResult<LockRecord> {
        let lock = self
            .ctx
            .locks
            .find(key)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Lock",
                id: key.to_string(),
            })?;
        self.ctx.locks.release(key).await?;

        tracing::info!(
            source_id = %key.source_id,
            target_id = key.target_id,
            "Lock removed",
        );
        if let Some(job) = self.ctx.store.find(key).await? {
            self.publish(JobEventKind::LockRemoved, &job);
        }
        Ok(lock)
    }

    /// Force back to `pending`, dropping the lock and the last result.
    pub async fn reset(&self, key: &JobKey) -> EngineResult<MigrationJob> {
        self.release_quietly(key).await;
        let job = self
            .ctx
            .store
            .transition(key, &ANY_STATUS, JobTransition::to(JobStatus::Pending).clearing_result())
            .await?
            .ok_or_else(|| CoreError::job_not_found(key))?;

        tracing::info!(
            source_id = %key.source_id,
            target_id = key.target_id,
            "Job reset to pending",
        );
        self.publish(JobEventKind::Reset, &job);
        Ok(job.redacted())
    }

    /// Remove lock, clear artifacts, kill, reset. Every step runs whatever
    /// happened to the previous ones.
    pub async fn hard_reset(&self, key: &JobKey) -> EngineResult<HardResetReport> {
        key.validate()?;
        // The kill step needs the pid after the lock is gone.
        let snapshot = match self.ctx.locks.find(key).await {
            Ok(lock) => lock,
            Err(e) => {
                tracing::warn!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    error = %e,
                    "Could not read lock before hard reset",
                );
                None
            }
        };

        let mut steps = Vec::with_capacity(4);

        steps.push(match self.ctx.locks.release(key).await {
            Ok(()) => StepOutcome::ok("remove_lock", "Lock removed"),
            Err(CoreError::NotFound { .. }) => StepOutcome::ok("remove_lock", "No lock present"),
            Err(e) => StepOutcome::failed("remove_lock", e.to_string()),
        });

        let artifacts = self.ctx.config.artifact_dir.join(key.stem());
        steps.push(match tokio::fs::remove_dir_all(&artifacts).await {
            Ok(()) => StepOutcome::ok(
                "clear_artifacts",
                format!("Removed {}", artifacts.display()),
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                StepOutcome::ok("clear_artifacts", "No cached artifacts")
            }
            Err(e) => StepOutcome::failed("clear_artifacts", e.to_string()),
        });

        steps.push(match snapshot.and_then(|lock| lock.pid) {
            None => StepOutcome::ok("kill", "No local worker process"),
            Some(pid) => match self.ctx.probe.terminate(pid, Termination::Forced) {
                Ok(true) => StepOutcome::ok("kill", format!("Sent SIGKILL to {pid}")),
                Ok(false) => StepOutcome::ok("kill", format!("Process {pid} was not running")),
                Err(e) => StepOutcome::failed("kill", e.to_string()),
            },
        });

        let change = JobTransition::to(JobStatus::Pending).clearing_result();
        steps.push(match self.ctx.store.transition(key, &ANY_STATUS, change).await {
            Ok(Some(job)) => {
                self.publish(JobEventKind::Reset, &job);
                StepOutcome::ok("reset_status", "Status reset to pending")
            }
            Ok(None) => StepOutcome::failed("reset_status", format!("No job record for {key}")),
            Err(e) => StepOutcome::failed("reset_status", e.to_string()),
        });

        let success = steps.iter().all(|step| step.success);
        tracing::info!(
            source_id = %key.source_id,
            target_id = key.target_id,
            success,
            "Hard reset finished",
        );
        Ok(HardResetReport {
            key: key.clone(),
            success,
            steps,
        })
    }

    /// Apply a reported result.
    ///
    /// Terminal results only move `in_progress` jobs. A redelivery of the
    /// recorded status is a no-op; a different terminal status is logged
    /// and dropped. A report carrying an explicit override replaces any
    /// recorded result that is not byte-for-byte the same.
    pub async fn ingest_result(
        &self,
        reported: &ReportedResult,
        channel: ResultChannel,
    ) -> EngineResult<IngestOutcome> {
        let key = &reported.key;
        let Some(job) = self.ctx.store.find(key).await? else {
            return Err(CoreError::Correlation(format!("No job record for {key}")).into());
        };

        if reported.status == JobStatus::InProgress {
            return self.record_progress(&job, reported).await;
        }
        if reported.status == JobStatus::Pending {
            return Err(CoreError::Validation("A result cannot report status 'pending'".into()).into());
        }

        let change = JobTransition::to(reported.status).with_result(reported.result.clone());
        if let Some(updated) = self
            .ctx
            .store
            .transition(key, &[JobStatus::InProgress], change.clone())
            .await?
        {
            self.release_quietly(key).await;
            tracing::info!(
                source_id = %key.source_id,
                target_id = key.target_id,
                status = %updated.status,
                channel = channel.as_str(),
                "Result applied",
            );
            self.publish_result(&updated, channel, None);
            return Ok(IngestOutcome::Applied {
                job: updated.redacted(),
            });
        }

        let current = self.find(key).await?;
        if !current.status.is_terminal() {
            tracing::info!(
                source_id = %key.source_id,
                target_id = key.target_id,
                status = %current.status,
                channel = channel.as_str(),
                "Result for a job that is not running, ignored",
            );
            return Ok(IngestOutcome::Ignored {
                reason: format!("Job is {}, not in_progress", current.status),
            });
        }

        let fingerprint = reported.fingerprint();
        let same_payload = current.result_hash.as_deref() == Some(fingerprint.as_str());
        if current.status == reported.status && (same_payload || !reported.force) {
            tracing::debug!(
                source_id = %key.source_id,
                target_id = key.target_id,
                channel = channel.as_str(),
                same_payload,
                "Duplicate result delivery",
            );
            return Ok(IngestOutcome::Duplicate {
                job: current.redacted(),
            });
        }

        if reported.force {
            let terminal = [JobStatus::Completed, JobStatus::Error];
            if let Some(updated) = self.ctx.store.transition(key, &terminal, change).await? {
                self.release_quietly(key).await;
                tracing::warn!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    previous = %current.status,
                    status = %updated.status,
                    channel = channel.as_str(),
                    "Terminal result overridden",
                );
                self.publish_result(&updated, channel, Some(current.status));
                return Ok(IngestOutcome::Overridden {
                    job: updated.redacted(),
                    previous: current.status,
                });
            }
        }

        let conflict = CoreError::ConflictingTerminalResult {
            key: key.clone(),
            recorded: current.status,
            incoming: reported.status,
        };
        tracing::warn!(
            source_id = %key.source_id,
            target_id = key.target_id,
            channel = channel.as_str(),
            error = %conflict,
            "Conflicting terminal result, keeping the recorded one",
        );
        Ok(IngestOutcome::Conflict {
            job: current.redacted(),
            incoming: reported.status,
        })
    }

    /// Move an `in_progress` job to `error` and release its lock.
    ///
    /// The lock is released even when the job had already finished, so a
    /// leftover lock never outlives a stale verdict.
    pub async fn force_error(
        &self,
        key: &JobKey,
        message: &str,
    ) -> EngineResult<Option<MigrationJob>> {
        let change =
            JobTransition::to(JobStatus::Error).with_result(MigrationResult::failure(message));
        let failed = self
            .ctx
            .store
            .transition(key, &[JobStatus::InProgress], change)
            .await?;
        self.release_quietly(key).await;

        if let Some(job) = &failed {
            tracing::warn!(
                source_id = %key.source_id,
                target_id = key.target_id,
                reason = message,
                "Job forced to error",
            );
            self.publish(JobEventKind::Failed, job);
        }
        Ok(failed)
    }

    pub async fn process_info(&self, key: &JobKey) -> EngineResult<ProcessInfo> {
        let job = self.ctx.store.find(key).await?;
        let lock = self.ctx.locks.find(key).await?;
        if job.is_none() && lock.is_none() {
            return Err(CoreError::job_not_found(key).into());
        }

        let now = Utc::now();
        let pid = lock.as_ref().and_then(|lock| lock.pid);
        let alive = pid.map(|pid| self.ctx.probe.is_alive(pid));
        let threshold = self.ctx.config.stale_threshold_secs();
        Ok(ProcessInfo {
            key: key.clone(),
            status: job.map(|job| job.status),
            pid,
            alive,
            lock_age_secs: lock.as_ref().map(|lock| lock.age_secs(now)),
            silence_secs: lock.as_ref().map(|lock| lock.silence_secs(now)),
            stale: lock
                .as_ref()
                .is_some_and(|lock| is_stale(lock, alive, now, threshold)),
            lock,
        })
    }

    /// Liveness report from a remote worker.
    pub async fn heartbeat(&self, key: &JobKey, stage: Option<String>) -> EngineResult<LockRecord> {
        let mut touch = LockTouch::checked_now();
        touch.current_stage = stage;
        let lock = self.ctx.locks.touch(key, touch).await?;
        tracing::debug!(
            source_id = %key.source_id,
            target_id = key.target_id,
            stage = ?lock.current_stage,
            "Heartbeat",
        );
        Ok(lock)
    }

    // ---- private helpers ----

    async fn record_progress(
        &self,
        job: &MigrationJob,
        reported: &ReportedResult,
    ) -> EngineResult<IngestOutcome> {
        if job.status != JobStatus::InProgress {
            return Ok(IngestOutcome::Ignored {
                reason: format!("Progress report for a job that is {}", job.status),
            });
        }
        let stage = reported
            .result
            .extra
            .get("current_stage")
            .or_else(|| reported.result.extra.get("stage"))
            .and_then(|v| v.as_str())
            .unwrap_or(STAGE_RUNNING)
            .to_string();
        if let Err(e) = self
            .ctx
            .locks
            .touch(&reported.key, LockTouch::checked_now().stage(stage.clone()))
            .await
        {
            tracing::debug!(
                source_id = %reported.key.source_id,
                target_id = reported.key.target_id,
                error = %e,
                "Progress report without a lock",
            );
        }
        Ok(IngestOutcome::Progress { stage })
    }

    async fn roll_back_dispatch(
        &self,
        key: &JobKey,
        status: JobStatus,
        parameters: Option<DispatchParameters>,
    ) {
        self.release_quietly(key).await;
        let restore = JobTransition::to(status).restoring_parameters(parameters);
        if let Err(e) = self
            .ctx
            .store
            .transition(key, &[JobStatus::InProgress], restore)
            .await
        {
            tracing::error!(
                source_id = %key.source_id,
                target_id = key.target_id,
                error = %e,
                "Failed to restore status after dispatch failure",
            );
        }
    }

    /// Release the lock if present. Returns `true` if one was removed.
    async fn release_quietly(&self, key: &JobKey) -> bool {
        match self.ctx.locks.release(key).await {
            Ok(()) => true,
            Err(CoreError::NotFound { .. }) => false,
            Err(e) => {
                tracing::warn!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    error = %e,
                    "Failed to release lock",
                );
                false
            }
        }
    }

    fn publish_result(
        &self,
        job: &MigrationJob,
        channel: ResultChannel,
        previous: Option<JobStatus>,
    ) {
        let payload = serde_json::json!({
            "channel": channel.as_str(),
            "previous_status": previous,
        });
        self.ctx.events.publish(
            JobEvent::new(JobEventKind::for_status(job.status), job.key(), job.status)
                .with_wave(job.wave_id.clone())
                .with_payload(payload),
        );
    }

    fn publish(&self, kind: JobEventKind, job: &MigrationJob) {
        self.ctx
            .events
            .publish(JobEvent::new(kind, job.key(), job.status).with_wave(job.wave_id.clone()));
    }
}
