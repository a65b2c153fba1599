//! Transcription provider adapters
//!
//! Providers are resolved by name through a closed registry; an unknown
//! name is a construction-time error, not a runtime condition.

mod deepgram;
mod deepgram_stream;
mod groq;
mod local;
mod openai;
mod openai_compatible;

pub use deepgram::DeepgramProvider;
pub use deepgram_stream::DeepgramStreamProvider;
pub use groq::GroqProvider;
pub use local::LocalWhisperProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use crate::application::ports::{Provider, ProviderError};
use crate::domain::transcription::AudioSource;

/// Every provider name the registry accepts
pub const PROVIDER_NAMES: &[&str] = &["openai", "deepgram", "deepgram_stream", "groq", "local"];

/// Resolve a provider by name.
///
/// Returns an `InvalidConfig` error for names outside the closed set.
pub fn create_provider(name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    match name {
        "openai" => Ok(Arc::new(OpenAiProvider::new())),
        "deepgram" => Ok(Arc::new(DeepgramProvider::new())),
        "deepgram_stream" => Ok(Arc::new(DeepgramStreamProvider::new())),
        "groq" => Ok(Arc::new(GroqProvider::new())),
        "local" => Ok(Arc::new(LocalWhisperProvider::new())),
        other => Err(ProviderError::InvalidConfig(format!(
            "unknown provider '{}' (valid: {})",
            other,
            PROVIDER_NAMES.join(", ")
        ))),
    }
}

/// Load the raw bytes behind an audio source
pub(crate) async fn load_audio(audio: &AudioSource) -> Result<Vec<u8>, ProviderError> {
    match audio {
        AudioSource::Clip(clip) => Ok(clip.data().to_vec()),
        AudioSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::Transient(format!("failed to read audio file: {}", e))),
    }
}

/// Read a credential from the environment, mapping absence to a
/// configuration error the controller will not retry
pub(crate) fn require_env_key(var: &'static str) -> Result<String, ProviderError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ProviderError::MissingCredential(var.to_string())),
    }
}
