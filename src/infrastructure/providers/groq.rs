//! Groq transcription provider (batch REST, OpenAI-compatible)

use async_trait::async_trait;

use crate::application::ports::{Provider, ProviderError};
use crate::domain::transcription::{AudioSource, TranscriptionRequest};

use super::openai_compatible::transcribe_openai_compatible;
use super::{load_audio, require_env_key};

const DEFAULT_MODEL: &str = "whisper-large-v3";
const API_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Groq-hosted Whisper over the OpenAI-compatible endpoint
pub struct GroqProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl GroqProvider {
    /// Create a provider against the production endpoint
    pub fn new() -> Self {
        Self::with_endpoint(API_URL)
    }

    /// Create a provider against a custom endpoint (tests, proxies)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GroqProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    async fn transcribe(
        &self,
        audio: &AudioSource,
        request: &TranscriptionRequest,
    ) -> Result<String, ProviderError> {
        let api_key = require_env_key(API_KEY_ENV)?;
        let bytes = load_audio(audio).await?;
        let model = request.model().unwrap_or(DEFAULT_MODEL);

        transcribe_openai_compatible(&self.client, &self.endpoint, &api_key, model, bytes, request)
            .await
    }
}
