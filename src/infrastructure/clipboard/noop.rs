//! No-op clipboard for headless operation

use async_trait::async_trait;

use crate::application::ports::{Clipboard, ClipboardError};

/// Clipboard adapter that discards everything (clipboard disabled)
pub struct NoopClipboard;

#[async_trait]
impl Clipboard for NoopClipboard {
    async fn copy(&self, _text: &str) -> Result<(), ClipboardError> {
        Ok(())
    }
}
