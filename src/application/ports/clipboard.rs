//! Clipboard port interface

use async_trait::async_trait;
use thiserror::Error;

/// Clipboard errors
#[derive(Debug, Clone, Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Failed to copy to clipboard: {0}")]
    CopyFailed(String),
}

/// Port for the paste collaborator.
///
/// The daemon hands the final transcript over and does not depend on the
/// copy succeeding.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Copy text to the system clipboard
    async fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}
