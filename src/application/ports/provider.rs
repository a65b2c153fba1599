//! Transcription provider port

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::session::CancelToken;
use crate::domain::transcription::{AudioSource, TranscriptionRequest};

use super::capture::FrameReceiver;

/// Provider errors.
///
/// Configuration errors (missing credential, invalid option) are fatal
/// to the session and must not be retried; transient errors are
/// fallback/retry candidates. The controller relies on this split.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Missing credential: set {0}")]
    MissingCredential(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Request failed: {0}")]
    Transient(String),

    #[error("Failed to parse provider response: {0}")]
    ParseError(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Whether this error means "fix your configuration" rather than
    /// "the request happened to fail"
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingCredential(_) | Self::InvalidConfig(_))
    }
}

/// Sink for interim transcript updates during a streaming session
pub type InterimSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Port for transcription backends.
///
/// `transcribe` never yields a null result: an empty recognition comes
/// back as an empty string.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name used by the registry and in results
    fn name(&self) -> &'static str;

    /// Published default model for this provider
    fn default_model(&self) -> &'static str;

    /// Whether `transcribe_stream` is available
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Batch transcription of a complete audio source
    async fn transcribe(
        &self,
        audio: &AudioSource,
        request: &TranscriptionRequest,
    ) -> Result<String, ProviderError>;

    /// Live transcription over a persistent connection.
    ///
    /// Frames arrive on `frames` until the channel closes (end-of-audio);
    /// partial transcripts go to `interim` as they arrive. Implementations
    /// must stop promptly when `cancel` fires.
    async fn transcribe_stream(
        &self,
        request: &TranscriptionRequest,
        frames: FrameReceiver,
        interim: InterimSink,
        cancel: CancelToken,
    ) -> Result<String, ProviderError> {
        let _ = (request, frames, interim, cancel);
        Err(ProviderError::InvalidConfig(format!(
            "provider '{}' does not support streaming",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(ProviderError::MissingCredential("OPENAI_API_KEY".into()).is_configuration());
        assert!(ProviderError::InvalidConfig("bad model".into()).is_configuration());
        assert!(!ProviderError::Transient("connection reset".into()).is_configuration());
        assert!(!ProviderError::ParseError("bad json".into()).is_configuration());
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let err = ProviderError::MissingCredential("DEEPGRAM_API_KEY".into());
        assert!(err.to_string().contains("DEEPGRAM_API_KEY"));
    }
}
