//! Deepgram transcription provider (batch REST)

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{Provider, ProviderError};
use crate::domain::transcription::{AudioSource, TranscriptionRequest};

use super::openai_compatible::map_http_error;
use super::{load_audio, require_env_key};

const DEFAULT_MODEL: &str = "nova-3";
const API_URL: &str = "https://api.deepgram.com/v1/listen";
pub(crate) const API_KEY_ENV: &str = "DEEPGRAM_API_KEY";

// Response types for the pre-recorded endpoint

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
}

/// Deepgram pre-recorded audio endpoint
pub struct DeepgramProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl DeepgramProvider {
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

    /// Build the query string for one request
    fn build_query(&self, request: &TranscriptionRequest) -> Vec<(String, String)> {
        let mut query = vec![
            (
                "model".to_string(),
                request.model().unwrap_or(DEFAULT_MODEL).to_string(),
            ),
            ("smart_format".to_string(), "true".to_string()),
        ];

        if let Some(language) = request.language() {
            query.push(("language".to_string(), language.to_string()));
        }

        for keyword in request.keywords() {
            query.push(("keyterm".to_string(), keyword.clone()));
        }

        query
    }

    /// Extract the transcript; empty recognition yields an empty string
    fn extract_transcript(response: &ListenResponse) -> String {
        response
            .results
            .as_ref()
            .and_then(|r| r.channels.first())
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default()
    }
}

impl Default for DeepgramProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for DeepgramProvider {
    fn name(&self) -> &'static str {
        "deepgram"
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

        let response = self
            .client
            .post(&self.endpoint)
            .query(&self.build_query(request))
            .header("Authorization", format!("Token {}", api_key))
            .header("Content-Type", "audio/wav")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_http_error(status, &body));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(Self::extract_transcript(&parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_includes_model_and_formatting() {
        let provider = DeepgramProvider::new();
        let request = TranscriptionRequest::new("deepgram");
        let query = provider.build_query(&request);

        assert!(query.contains(&("model".to_string(), "nova-3".to_string())));
        assert!(query.contains(&("smart_format".to_string(), "true".to_string())));
    }

    #[test]
    fn query_includes_language_and_keywords() {
        let provider = DeepgramProvider::new();
        let request = TranscriptionRequest::new("deepgram")
            .with_language(Some("de".into()))
            .with_keywords(vec!["Tokio".into(), "Serde".into()]);
        let query = provider.build_query(&request);

        assert!(query.contains(&("language".to_string(), "de".to_string())));
        assert!(query.contains(&("keyterm".to_string(), "Tokio".to_string())));
        assert!(query.contains(&("keyterm".to_string(), "Serde".to_string())));
    }

    #[test]
    fn model_override_wins() {
        let provider = DeepgramProvider::new();
        let request = TranscriptionRequest::new("deepgram").with_model(Some("nova-2".into()));
        let query = provider.build_query(&request);

        assert!(query.contains(&("model".to_string(), "nova-2".to_string())));
    }

    #[test]
    fn extract_transcript_from_response() {
        let response = ListenResponse {
            results: Some(ListenResults {
                channels: vec![ListenChannel {
                    alternatives: vec![ListenAlternative {
                        transcript: " hello world ".to_string(),
                    }],
                }],
            }),
        };

        assert_eq!(DeepgramProvider::extract_transcript(&response), "hello world");
    }

    #[test]
    fn empty_recognition_is_empty_string_not_error() {
        let response = ListenResponse { results: None };
        assert_eq!(DeepgramProvider::extract_transcript(&response), "");
    }
}
