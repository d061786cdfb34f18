//! Background liveness sweep over all lock records.
//!
//! Each cycle: enumerate locks, probe local workers, refresh live ones,
//! and force stale ones to `error`. Remote workers (no pid) are judged by
//! silence since their last heartbeat and confirmed with one status poll
//! before being failed. Per-lock failures are logged and skipped.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use waveline_core::lock::{LockRecord, LockTouch};

use crate::correlator::ResultCorrelator;
use crate::error::EngineResult;
use crate::jobs::{is_stale, IngestOutcome, JobService};

/// What the sweep decided for one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Alive,
    Grace,
    ForcedError,
    ResolvedByPoll,
}

/// Counters of one sweep cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub alive: usize,
    pub grace: usize,
    pub forced_error: usize,
    pub resolved_by_poll: usize,
    pub errors: usize,
}

impl SweepReport {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Alive => self.alive += 1,
            Verdict::Grace => self.grace += 1,
            Verdict::ForcedError => self.forced_error += 1,
            Verdict::ResolvedByPoll => self.resolved_by_poll += 1,
        }
    }
}

/// Periodic reconciler of lock records against worker liveness.
pub struct LivenessMonitor {
    jobs: JobService,
    correlator: ResultCorrelator,
    /// Held for the duration of a sweep so cycles never overlap.
    sweeping: Mutex<()>,
}

impl LivenessMonitor {
    pub fn new(jobs: JobService, correlator: ResultCorrelator) -> Self {
        Self {
            jobs,
            correlator,
            sweeping: Mutex::new(()),
        }
    }

    fn interval(&self) -> Duration {
        self.jobs.context().config.sweep_interval
    }

    /// Run sweeps on a fixed interval until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(
            interval_secs = self.interval().as_secs(),
            stale_threshold_secs = self.jobs.context().config.stale_threshold_secs(),
            "Liveness monitor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Liveness monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(report) = self.sweep_once().await {
                        if report.forced_error > 0 || report.resolved_by_poll > 0 || report.errors > 0 {
                            tracing::info!(
                                examined = report.examined,
                                forced_error = report.forced_error,
                                resolved_by_poll = report.resolved_by_poll,
                                errors = report.errors,
                                "Liveness sweep reconciled locks",
                            );
                        }
                    }
                }
            }
        }
    }

    /// One sweep. Returns `None` if another sweep is still running.
    pub async fn sweep_once(&self) -> Option<SweepReport> {
        let Ok(_guard) = self.sweeping.try_lock() else {
            tracing::debug!("Liveness sweep already running, skipping");
            return None;
        };

        let mut report = SweepReport::default();
        let locks = match self.jobs.context().locks.list_all().await {
            Ok(locks) => locks,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate locks");
                report.errors += 1;
                return Some(report);
            }
        };

        for lock in locks {
            report.examined += 1;
            match self.reconcile(&lock).await {
                Ok(verdict) => report.record(verdict),
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        source_id = %lock.key.source_id,
                        target_id = lock.key.target_id,
                        error = %e,
                        "Failed to reconcile lock",
                    );
                }
            }
        }
        Some(report)
    }

    async fn reconcile(&self, lock: &LockRecord) -> EngineResult<Verdict> {
        let ctx = self.jobs.context();
        let now = Utc::now();
        let threshold = ctx.config.stale_threshold_secs();
        let alive = lock.pid.map(|pid| ctx.probe.is_alive(pid));

        if alive == Some(true) {
            ctx.locks.touch(&lock.key, LockTouch::checked_now()).await?;
            return Ok(Verdict::Alive);
        }
        if !is_stale(lock, alive, now, threshold) {
            return Ok(Verdict::Grace);
        }

        let reason = match lock.pid {
            Some(pid) => format!(
                "Worker process {pid} exited without reporting a result within {threshold}s"
            ),
            None => {
                if let Some(verdict) = self.confirm_remote(lock).await {
                    return Ok(verdict);
                }
                format!("No heartbeat or result from remote worker for more than {threshold}s")
            }
        };
        self.jobs.force_error(&lock.key, &reason).await?;
        Ok(Verdict::ForcedError)
    }

    /// Poll a silent remote worker once before failing it. `None` means
    /// the poll did not settle anything.
    async fn confirm_remote(&self, lock: &LockRecord) -> Option<Verdict> {
        let key = &lock.key;
        let poll = match self.correlator.poll(key).await {
            Ok(poll) => poll,
            Err(e) => {
                tracing::warn!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    error = %e,
                    "Status poll for silent remote worker failed",
                );
                return None;
            }
        };
        match poll.ingested {
            Some(ref outcome) if outcome.changed_status() => Some(Verdict::ResolvedByPoll),
            Some(IngestOutcome::Progress { .. }) => {
                tracing::debug!(
                    source_id = %key.source_id,
                    target_id = key.target_id,
                    "Silent remote worker still running per status poll",
                );
                Some(Verdict::Alive)
            }
            _ => None,
        }
    }
}
