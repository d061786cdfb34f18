//! Process liveness probes.
//!
//! Only meaningful for workers spawned on this host. Remote workers carry
//! no pid and are judged by lock age and heartbeats instead.

use crate::error::CoreError;

/// How forcefully to stop a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM: ask the process to exit.
    Graceful,
    /// SIGKILL: no chance to clean up.
    Forced,
}

/// Probe and signal local worker processes.
pub trait ProcessProbe: Send + Sync {
    /// `true` if a process with this pid exists.
    fn is_alive(&self, pid: i32) -> bool;

    /// Send a termination signal. Returns `Ok(false)` when the process was
    /// already gone.
    fn terminate(&self, pid: i32, mode: Termination) -> Result<bool, CoreError>;
}

/// [`ProcessProbe`] backed by `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl SignalProbe {
    fn validate(pid: i32) -> Result<(), CoreError> {
        // 0 and negatives address process groups in kill(2).
        if pid <= 0 {
            return Err(CoreError::Validation(format!("Invalid pid {pid}")));
        }
        Ok(())
    }
}

#[cfg(unix)]
impl ProcessProbe for SignalProbe {
    fn is_alive(&self, pid: i32) -> bool {
        if Self::validate(pid).is_err() {
            return false;
        }
        // Signal 0 performs the permission and existence checks only.
        // SAFETY: kill with signal 0 has no side effects on the target.
        let ret = unsafe { libc::kill(pid, 0) };
        if ret == 0 {
            return true;
        }
        // EPERM: exists but owned by someone else.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn terminate(&self, pid: i32, mode: Termination) -> Result<bool, CoreError> {
        Self::validate(pid)?;
        let signal = match mode {
            Termination::Graceful => libc::SIGTERM,
            Termination::Forced => libc::SIGKILL,
        };
        // SAFETY: pid is validated positive, so this targets one process.
        let ret = unsafe { libc::kill(pid, signal) };
        if ret == 0 {
            return Ok(true);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(false);
        }
        Err(CoreError::Io(err))
    }
}

#[cfg(not(unix))]
impl ProcessProbe for SignalProbe {
    fn is_alive(&self, _pid: i32) -> bool {
        false
    }

    fn terminate(&self, pid: i32, _mode: Termination) -> Result<bool, CoreError> {
        Self::validate(pid)?;
        Err(CoreError::Internal(
            "Process signals are not supported on this platform".into(),
        ))
    }
}
