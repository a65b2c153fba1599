//! State publishing port (the daemon side of the IPC protocol)

use thiserror::Error;

use crate::domain::session::DaemonState;

/// Publishing errors
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Failed to write IPC artifact: {0}")]
    WriteFailed(String),
}

/// Write-only port for exposing daemon state to external readers.
///
/// Writes are whole-value replacements; a concurrent reader never sees a
/// torn value. The daemon never reads these artifacts back.
pub trait StatePublisher: Send + Sync {
    /// Publish the current state token
    fn publish_state(&self, state: DaemonState) -> Result<(), PublishError>;

    /// Publish the latest interim transcript.
    ///
    /// Implementations must never regress to an older partial than the
    /// one already shown, except through `clear_interim`.
    fn publish_interim(&self, text: &str) -> Result<(), PublishError>;

    /// Remove the interim artifact (on leaving interim-meaningful states)
    fn clear_interim(&self) -> Result<(), PublishError>;
}
