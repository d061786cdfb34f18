//! Lock records and the filesystem-backed lock store.
//!
//! A lock marks a job as running. It must outlive the coordinator process
//! (the remote worker may still be running after a restart), so it is
//! persisted rather than held in memory. The default store keeps one JSON
//! file per key, `{source_id}-{target_id}.lock`, in a lock directory:
//!
//! ```json
//! {"pid": 4242, "started_at": "...", "last_check": "...", "current_stage": "dispatched"}
//! ```
//!
//! `pid` is `null` for fully remote workers whose process is not
//! observable from this host.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::types::{JobKey, TargetId, Timestamp};

/// Extension of lock files inside the lock directory.
pub const LOCK_EXTENSION: &str = "lock";

/// A persisted lock on a job key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    pub key: JobKey,
    /// Pid of the locally spawned worker, or `None` for a remote worker.
    pub pid: Option<i32>,
    pub started_at: Timestamp,
    pub last_check: Timestamp,
    pub current_stage: Option<String>,
}

impl LockRecord {
    /// A new lock owned by a remote worker, stamped `now`.
    pub fn new(key: JobKey, now: Timestamp) -> Self {
        Self {
            key,
            pid: None,
            started_at: now,
            last_check: now,
            current_stage: None,
        }
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.current_stage = Some(stage.into());
        self
    }

    /// Seconds since the lock was created.
    pub fn age_secs(&self, now: Timestamp) -> i64 {
        (now - self.started_at).num_seconds()
    }

    /// Seconds since the last liveness evidence (check or heartbeat).
    pub fn silence_secs(&self, now: Timestamp) -> i64 {
        (now - self.last_check).num_seconds()
    }

    fn apply(&mut self, touch: &LockTouch) {
        if let Some(at) = touch.last_check {
            self.last_check = at;
        }
        if let Some(stage) = &touch.current_stage {
            self.current_stage = Some(stage.clone());
        }
        if let Some(pid) = touch.worker_pid {
            self.pid = Some(pid);
        }
    }
}

/// In-place update of an existing lock. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct LockTouch {
    pub last_check: Option<Timestamp>,
    pub current_stage: Option<String>,
    /// Records the worker pid once the launch reported it.
    pub worker_pid: Option<i32>,
}

impl LockTouch {
    /// Fresh liveness timestamp, nothing else.
    pub fn checked_now() -> Self {
        Self {
            last_check: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.current_stage = Some(stage.into());
        self
    }
}

/// Mutual-exclusion store keyed by [`JobKey`].
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically create the lock. At most one concurrent caller per key
    /// succeeds; the rest get [`CoreError::AlreadyLocked`].
    async fn acquire(&self, record: LockRecord) -> Result<LockRecord, CoreError>;

    /// Delete the lock. [`CoreError::NotFound`] when there is none.
    async fn release(&self, key: &JobKey) -> Result<(), CoreError>;

    /// Update liveness/stage fields of an existing lock.
    async fn touch(&self, key: &JobKey, touch: LockTouch) -> Result<LockRecord, CoreError>;

    async fn find(&self, key: &JobKey) -> Result<Option<LockRecord>, CoreError>;

    async fn list_all(&self) -> Result<Vec<LockRecord>, CoreError>;

    /// First lock whose key carries `target_id`. Used to recover the
    /// source id when a caller only knows the target.
    async fn find_by_target(&self, target_id: TargetId) -> Result<Option<LockRecord>, CoreError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|lock| lock.key.target_id == target_id))
    }
}

fn lock_not_found(key: &JobKey) -> CoreError {
    CoreError::NotFound {
        entity: "Lock",
        id: key.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// On-disk body of a lock file. The key lives in the file name.
#[derive(Debug, Serialize, Deserialize)]
struct LockFile {
    pid: Option<i32>,
    started_at: Timestamp,
    last_check: Timestamp,
    #[serde(default)]
    current_stage: Option<String>,
}

impl LockFile {
    fn from_record(record: &LockRecord) -> Self {
        Self {
            pid: record.pid,
            started_at: record.started_at,
            last_check: record.last_check,
            current_stage: record.current_stage.clone(),
        }
    }

    fn into_record(self, key: JobKey) -> LockRecord {
        LockRecord {
            key,
            pid: self.pid,
            started_at: self.started_at,
            last_check: self.last_check,
            current_stage: self.current_stage,
        }
    }
}

/// Lock store keeping one JSON file per key in a directory.
///
/// Creation writes a temp file and hard-links it into place, so a lock
/// file is never observable half-written and the link fails if another
/// caller got there first. Updates write a temp file and rename it over
/// the original.
///
/// Acquire, release and touch are serialized within the process: a touch
/// that read a lock must not rename it back into place after a release.
/// One coordinator process owns a lock directory.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    dir: PathBuf,
    writes: Arc<Mutex<()>>,
}

impl FileLockStore {
    /// Open (and create if needed) the lock directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            writes: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic path for a key.
    pub fn path_for(&self, key: &JobKey) -> PathBuf {
        self.dir.join(format!("{}.{LOCK_EXTENSION}", key.stem()))
    }

    fn temp_path(&self, key: &JobKey) -> PathBuf {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        self.dir.join(format!(".{}.{suffix}.tmp", key.stem()))
    }

    async fn write_temp(&self, key: &JobKey, body: &LockFile) -> Result<PathBuf, CoreError> {
        let bytes = serde_json::to_vec_pretty(body)
            .map_err(|e| CoreError::Internal(format!("Failed to encode lock file: {e}")))?;
        let tmp = self.temp_path(key);
        tokio::fs::write(&tmp, bytes).await?;
        Ok(tmp)
    }

    async fn read(&self, key: &JobKey, path: &Path) -> Result<Option<LockRecord>, CoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let body: LockFile = serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::Storage(format!("Corrupt lock file {}: {e}", path.display()))
        })?;
        Ok(Some(body.into_record(key.clone())))
    }
}

#[async_trait]
impl LockStore for FileLockStore {
    async fn acquire(&self, record: LockRecord) -> Result<LockRecord, CoreError> {
        record.key.validate()?;
        let path = self.path_for(&record.key);
        let _writes = self.writes.lock().await;
        let tmp = self.write_temp(&record.key, &LockFile::from_record(&record)).await?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => Ok(record),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(CoreError::AlreadyLocked { key: record.key })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&self, key: &JobKey) -> Result<(), CoreError> {
        let _writes = self.writes.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(lock_not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn touch(&self, key: &JobKey, touch: LockTouch) -> Result<LockRecord, CoreError> {
        let path = self.path_for(key);
        let _writes = self.writes.lock().await;
        let mut record = self
            .read(key, &path)
            .await?
            .ok_or_else(|| lock_not_found(key))?;
        record.apply(&touch);

        let tmp = self.write_temp(key, &LockFile::from_record(&record)).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(record)
    }

    async fn find(&self, key: &JobKey) -> Result<Option<LockRecord>, CoreError> {
        self.read(key, &self.path_for(key)).await
    }

    async fn list_all(&self) -> Result<Vec<LockRecord>, CoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut locks = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LOCK_EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(JobKey::from_stem)
            else {
                continue;
            };
            match self.read(&key, &path).await {
                Ok(Some(lock)) => locks.push(lock),
                // Released between read_dir and read.
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable lock file");
                }
            }
        }

        locks.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(locks)
    }
}
