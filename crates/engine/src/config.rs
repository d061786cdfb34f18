//! Coordinator tuning knobs.

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between liveness sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Default age after which a dead or silent lock is considered stale.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(600);

/// Settings shared by every engine service.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub sweep_interval: Duration,
    pub stale_threshold: Duration,
    /// Externally reachable base URL of this service, used for callbacks.
    pub public_base_url: String,
    /// Root of the per-job artifact directories cleared by hard reset.
    pub artifact_dir: PathBuf,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            public_base_url: "http://localhost:3000".to_string(),
            artifact_dir: PathBuf::from("./data/artifacts"),
        }
    }
}

impl CoordinatorConfig {
    pub fn stale_threshold_secs(&self) -> i64 {
        self.stale_threshold.as_secs() as i64
    }
}
