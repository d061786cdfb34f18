//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every applied job transition is published here, whichever channel
//! (command, webhook, poll, monitor) caused it. Shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use waveline_core::status::JobStatus;
use waveline_core::types::JobKey;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// What happened to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobEventKind {
    #[serde(rename = "job.dispatched")]
    Dispatched,
    #[serde(rename = "job.completed")]
    Completed,
    #[serde(rename = "job.failed")]
    Failed,
    #[serde(rename = "job.reset")]
    Reset,
    #[serde(rename = "job.lock_removed")]
    LockRemoved,
}

impl JobEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dispatched => "job.dispatched",
            Self::Completed => "job.completed",
            Self::Failed => "job.failed",
            Self::Reset => "job.reset",
            Self::LockRemoved => "job.lock_removed",
        }
    }

    /// Event kind for a job that just reached `status` through a result.
    pub fn for_status(status: JobStatus) -> Self {
        match status {
            JobStatus::Completed => Self::Completed,
            JobStatus::Error => Self::Failed,
            JobStatus::InProgress => Self::Dispatched,
            JobStatus::Pending => Self::Reset,
        }
    }
}

/// A job transition that has been persisted.
///
/// Built with [`JobEvent::new`] and enriched with
/// [`with_wave`](JobEvent::with_wave) and
/// [`with_payload`](JobEvent::with_payload).
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub key: JobKey,
    /// Status after the transition.
    pub status: JobStatus,
    pub wave_id: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, key: JobKey, status: JobStatus) -> Self {
        Self {
            kind,
            key,
            status,
            wave_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_wave(mut self, wave_id: Option<String>) -> Self {
        self.wave_id = wave_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use waveline_core::status::JobStatus;
/// use waveline_core::types::JobKey;
/// use waveline_events::{EventBus, JobEvent, JobEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::new(JobEventKind::Reset, JobKey::new("proj", 1), JobStatus::Pending));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: JobEvent) {
        tracing::debug!(
            kind = event.kind.as_str(),
            source_id = %event.key.source_id,
            target_id = event.key.target_id,
            wave_id = ?event.wave_id,
            "Publishing job event",
        );
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
