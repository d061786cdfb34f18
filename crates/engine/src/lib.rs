//! Coordination engine for migration jobs.
//!
//! - [`jobs::JobService`]: the per-job state machine (run, restart, kill,
//!   unlock, reset, hard reset, result ingestion).
//! - [`correlator::ResultCorrelator`]: webhook and poll ingestion followed
//!   by wave recompute.
//! - [`waves::WaveAggregator`]: wave creation, rollup and bulk commands.
//! - [`monitor::LivenessMonitor`]: the periodic stale-lock sweep.
//!
//! All services share one [`EngineContext`]; [`Engine`] wires them up.

pub mod config;
pub mod context;
pub mod correlator;
pub mod error;
pub mod jobs;
pub mod monitor;
pub mod waves;

use std::sync::Arc;

pub use config::CoordinatorConfig;
pub use context::EngineContext;
pub use error::{EngineError, EngineResult};

use correlator::ResultCorrelator;
use jobs::JobService;
use monitor::LivenessMonitor;
use waves::WaveAggregator;

/// The engine services, wired to one context.
#[derive(Clone)]
pub struct Engine {
    pub jobs: JobService,
    pub waves: WaveAggregator,
    pub correlator: ResultCorrelator,
    pub monitor: Arc<LivenessMonitor>,
}

impl Engine {
    pub fn new(ctx: EngineContext) -> Self {
        let jobs = JobService::new(ctx);
        let waves = WaveAggregator::new(jobs.clone());
        let correlator = ResultCorrelator::new(jobs.clone(), waves.clone());
        let monitor = Arc::new(LivenessMonitor::new(jobs.clone(), correlator.clone()));
        Self {
            jobs,
            waves,
            correlator,
            monitor,
        }
    }

    pub fn context(&self) -> &EngineContext {
        self.jobs.context()
    }
}
