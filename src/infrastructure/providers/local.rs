//! Local whisper server provider
//!
//! Talks to a self-hosted OpenAI-compatible whisper server (e.g.
//! faster-whisper-server) so on-device inference stays out of this
//! process. No credential is required; the endpoint comes from
//! `VOXD_LOCAL_URL` with a localhost default.

use async_trait::async_trait;

use crate::application::ports::{Provider, ProviderError};
use crate::domain::transcription::{AudioSource, TranscriptionRequest};

use super::load_audio;
use super::openai_compatible::transcribe_openai_compatible;

const DEFAULT_MODEL: &str = "Systran/faster-whisper-small";
const DEFAULT_URL: &str = "http://localhost:8765";
const URL_ENV: &str = "VOXD_LOCAL_URL";

/// Self-hosted whisper server provider
pub struct LocalWhisperProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl LocalWhisperProvider {
    /// Create a provider resolving the server URL from the environment
    pub fn new() -> Self {
        let base = std::env::var(URL_ENV).unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::with_server_url(base)
    }

    /// Create a provider against an explicit server base URL
    pub fn with_server_url(base: impl Into<String>) -> Self {
        let base = base.into();
        let trimmed = base.trim_end_matches('/');
        Self {
            endpoint: format!("{}/v1/audio/transcriptions", trimmed),
            client: reqwest::Client::new(),
        }
    }

    /// The resolved endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for LocalWhisperProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for LocalWhisperProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    async fn transcribe(
        &self,
        audio: &AudioSource,
        request: &TranscriptionRequest,
    ) -> Result<String, ProviderError> {
        let bytes = load_audio(audio).await?;
        let model = request.model().unwrap_or(DEFAULT_MODEL);

        // Self-hosted servers accept any bearer token
        transcribe_openai_compatible(&self.client, &self.endpoint, "no-auth", model, bytes, request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_from_base_url() {
        let provider = LocalWhisperProvider::with_server_url("http://localhost:9000/");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9000/v1/audio/transcriptions"
        );
    }

    #[test]
    fn provider_identity() {
        let provider = LocalWhisperProvider::with_server_url(DEFAULT_URL);
        assert_eq!(provider.name(), "local");
        assert!(!provider.supports_streaming());
    }
}
