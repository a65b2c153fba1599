//! Process lock and crash recovery
//!
//! A single-line PID file asserts that one daemon instance owns the
//! microphone. Recovery runs once at startup, before any command is
//! accepted, and purges locks left behind by crashed daemons without
//! ever touching an unrelated process that happens to reuse the PID.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// How long to wait for a leftover daemon to exit after SIGTERM
const TERMINATE_WAIT: Duration = Duration::from_millis(100);
const TERMINATE_ATTEMPTS: u32 = 50;

/// Lock file errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another daemon is already running (PID: {0})")]
    AlreadyRunning(u32),

    #[error("Failed to write lock file: {0}")]
    WriteFailed(String),

    #[error("Failed to remove lock file: {0}")]
    RemoveFailed(String),
}

/// Outcome of a liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Alive,
    Dead,
    /// Permission denied; liveness cannot be determined
    Denied,
}

/// Seam over process inspection so recovery is testable without real PIDs
pub trait ProcessProbe: Send + Sync {
    /// Zero-effect liveness probe (signal 0)
    fn probe(&self, pid: u32) -> Probe;

    /// Identity check: is this PID actually a daemon instance of ours,
    /// not an unrelated process that reused the identifier?
    fn is_daemon(&self, pid: u32) -> bool;

    /// Request graceful termination (SIGTERM)
    fn request_exit(&self, pid: u32) -> Probe;
}

/// Probe implementation over Unix signals
pub struct NixProbe {
    process_name: String,
}

impl NixProbe {
    /// Probe that identifies daemons by process name
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
        }
    }
}

impl Default for NixProbe {
    fn default() -> Self {
        Self::new("voxd")
    }
}

#[cfg(unix)]
impl ProcessProbe for NixProbe {
    fn probe(&self, pid: u32) -> Probe {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => Probe::Alive,
            Err(Errno::ESRCH) => Probe::Dead,
            Err(_) => Probe::Denied,
        }
    }

    fn is_daemon(&self, pid: u32) -> bool {
        // /proc is authoritative where it exists; elsewhere fall back to ps
        let comm_path = format!("/proc/{}/comm", pid);
        if let Ok(comm) = fs::read_to_string(&comm_path) {
            return comm.trim() == self.process_name;
        }

        std::process::Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "comm="])
            .output()
            .map(|out| {
                String::from_utf8_lossy(&out.stdout)
                    .trim()
                    .ends_with(&self.process_name)
            })
            .unwrap_or(false)
    }

    fn request_exit(&self, pid: u32) -> Probe {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => Probe::Alive,
            Err(Errno::ESRCH) => Probe::Dead,
            Err(_) => Probe::Denied,
        }
    }
}

/// The on-disk marker asserting which daemon owns the session
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Create a lock manager for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored PID, if the file exists and parses
    pub fn read_pid(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.path).ok()?;
        contents.trim().parse().ok()
    }

    /// Whether a lock file exists at all (valid or not)
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the current process identifier.
    ///
    /// Run `CrashRecovery::run` first; this only refuses when a live
    /// foreign lock is still present.
    pub fn acquire(&self) -> Result<(), LockError> {
        if let Some(pid) = self.read_pid() {
            if pid != std::process::id() {
                return Err(LockError::AlreadyRunning(pid));
            }
        }

        fs::write(&self.path, std::process::id().to_string())
            .map_err(|e| LockError::WriteFailed(e.to_string()))
    }

    /// Remove the lock file
    pub fn release(&self) -> Result<(), LockError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| LockError::RemoveFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        // Best-effort cleanup
        let _ = self.release();
    }
}

/// What the recovery pass decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// No lock file existed
    NoLock,
    /// Contents were not a valid PID; file removed
    RemovedInvalid,
    /// The lock already names this process (idempotent restart)
    OwnLock,
    /// PID no longer exists; stale file removed
    RemovedStale(u32),
    /// PID is alive but is not one of our daemons; file removed, process untouched
    RemovedForeign(u32),
    /// A leftover daemon was asked to exit and confirmed gone; file removed
    TerminatedAndRemoved(u32),
    /// Could not determine or could not terminate; lock left in place
    LeftInPlace(u32),
}

/// Startup crash-recovery pass over the lock file
pub struct CrashRecovery<P: ProcessProbe> {
    probe: P,
    own_pid: u32,
}

impl<P: ProcessProbe> CrashRecovery<P> {
    /// Build a recovery pass for the current process
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            own_pid: std::process::id(),
        }
    }

    #[cfg(test)]
    fn with_own_pid(probe: P, own_pid: u32) -> Self {
        Self { probe, own_pid }
    }

    /// Validate and, where safe, clear the lock file.
    ///
    /// Never crashes on permission problems: anything undeterminable
    /// leaves the lock in place.
    pub fn run(&self, lock: &ProcessLock) -> RecoveryAction {
        if !lock.exists() {
            return RecoveryAction::NoLock;
        }

        let Some(pid) = lock.read_pid() else {
            let _ = fs::remove_file(lock.path());
            return RecoveryAction::RemovedInvalid;
        };

        if pid == self.own_pid {
            return RecoveryAction::OwnLock;
        }

        match self.probe.probe(pid) {
            Probe::Dead => {
                let _ = fs::remove_file(lock.path());
                RecoveryAction::RemovedStale(pid)
            }
            Probe::Denied => RecoveryAction::LeftInPlace(pid),
            Probe::Alive => {
                if !self.probe.is_daemon(pid) {
                    // PID reuse by an unrelated process: remove only the
                    // file, never signal the process
                    let _ = fs::remove_file(lock.path());
                    return RecoveryAction::RemovedForeign(pid);
                }

                match self.probe.request_exit(pid) {
                    Probe::Denied => RecoveryAction::LeftInPlace(pid),
                    Probe::Dead => {
                        let _ = fs::remove_file(lock.path());
                        RecoveryAction::TerminatedAndRemoved(pid)
                    }
                    Probe::Alive => self.await_exit(lock, pid),
                }
            }
        }
    }

    /// Delete the lock only after the old daemon is confirmed gone
    fn await_exit(&self, lock: &ProcessLock, pid: u32) -> RecoveryAction {
        for _ in 0..TERMINATE_ATTEMPTS {
            match self.probe.probe(pid) {
                Probe::Dead => {
                    let _ = fs::remove_file(lock.path());
                    return RecoveryAction::TerminatedAndRemoved(pid);
                }
                Probe::Denied => return RecoveryAction::LeftInPlace(pid),
                Probe::Alive => std::thread::sleep(TERMINATE_WAIT),
            }
        }
        RecoveryAction::LeftInPlace(pid)
    }
}
