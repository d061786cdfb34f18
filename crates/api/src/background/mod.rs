//! Background tasks spawned next to the HTTP server.
//!
//! Each task runs until its [`CancellationToken`] is cancelled:
//!
//! - the liveness monitor sweep
//! - the wave follower, which recomputes a wave on every job event that
//!   names one

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use waveline_engine::Engine;

/// Handles of the running background tasks.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    /// Spawn every background task for `engine`.
    pub fn start(engine: &Engine) -> Self {
        let cancel = CancellationToken::new();

        let monitor = engine.monitor.clone();
        let monitor_cancel = cancel.clone();
        let monitor_handle = tokio::spawn(async move {
            monitor.run(monitor_cancel).await;
        });

        let waves = engine.waves.clone();
        let events = engine.context().events.clone();
        let follower_cancel = cancel.clone();
        let follower_handle = tokio::spawn(async move {
            waves.follow_events(&events, follower_cancel).await;
        });

        tracing::info!("Background tasks started (liveness monitor, wave follower)");
        Self {
            cancel,
            handles: vec![
                ("liveness monitor", monitor_handle),
                ("wave follower", follower_handle),
            ],
        }
    }

    /// Cancel every task and wait up to `timeout` for each to finish.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => tracing::info!(task = name, "Background task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task panicked"),
                Err(_) => tracing::warn!(task = name, "Background task did not stop in time"),
            }
        }
    }
}
