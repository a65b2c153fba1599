//! Transcription result value object

use std::time::Duration;

/// Final outcome of one session, produced exactly once per session.
///
/// The text may be empty (nothing recognized) but is never absent.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    text: String,
    elapsed: Duration,
    provider: String,
}

impl TranscriptionResult {
    /// Create a result
    pub fn new(text: impl Into<String>, elapsed: Duration, provider: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            elapsed,
            provider: provider.into(),
        }
    }

    /// The transcribed text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Total session duration from start to final transcript
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Name of the provider that produced the text
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Replace the text, keeping timing and provider (used by the
    /// vocabulary refinement pass)
    pub fn with_text(self, text: String) -> Self {
        Self { text, ..self }
    }
}
