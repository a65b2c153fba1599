//! Shared implementation for OpenAI-compatible transcription APIs
//!
//! OpenAI, Groq, and self-hosted whisper servers all speak the same
//! format: multipart upload with `model` and `file` fields, Bearer
//! authorization, JSON response with a `text` field.

use serde::Deserialize;

use crate::application::ports::ProviderError;
use crate::domain::transcription::TranscriptionRequest;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Upload audio to an OpenAI-compatible endpoint and return the transcript.
///
/// The transcript is trimmed; an empty recognition comes back as `""`.
pub(crate) async fn transcribe_openai_compatible(
    client: &reqwest::Client,
    api_url: &str,
    api_key: &str,
    model: &str,
    wav_bytes: Vec<u8>,
    request: &TranscriptionRequest,
) -> Result<String, ProviderError> {
    let mut form = reqwest::multipart::Form::new()
        .text("model", model.to_string())
        .part(
            "file",
            reqwest::multipart::Part::bytes(wav_bytes)
                .file_name("audio.wav")
                .mime_str("audio/wav")
                .map_err(|e| ProviderError::Transient(e.to_string()))?,
        );

    if let Some(language) = request.language() {
        form = form.text("language", language.to_string());
    }

    // Vocabulary keywords ride along as the recognition prompt
    if !request.keywords().is_empty() {
        form = form.text("prompt", request.keywords().join(", "));
    }

    let response = client
        .post(api_url)
        .header("Authorization", format!("Bearer {}", api_key))
        .multipart(form)
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

    let parsed: TranscriptionResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;

    Ok(parsed.text.unwrap_or_default().trim().to_string())
}

/// Map an HTTP failure to the error taxonomy the controller dispatches on
pub(crate) fn map_http_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
    use reqwest::StatusCode;

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::InvalidConfig(format!("API key rejected (HTTP {})", status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ProviderError::Transient("rate limit exceeded".to_string())
        }
        status if status.is_server_error() => {
            ProviderError::Transient(format!("HTTP {}: {}", status.as_u16(), body))
        }
        status => ProviderError::Rejected(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}
