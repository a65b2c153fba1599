//! Deepgram live streaming provider (WebSocket)
//!
//! Streams raw PCM16 frames over a persistent connection and surfaces
//! interim results while audio is still being captured. Batch calls
//! delegate to the REST provider; the live endpoint is for mic input.

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::header::{HeaderValue, AUTHORIZATION},
        Message,
    },
};

use crate::application::ports::{FrameReceiver, InterimSink, Provider, ProviderError};
use crate::domain::session::CancelToken;
use crate::domain::transcription::{AudioSource, TranscriptionRequest, SAMPLE_RATE};

use super::deepgram::DeepgramProvider;
use super::require_env_key;

const DEFAULT_MODEL: &str = "nova-3";
const WS_URL: &str = "wss://api.deepgram.com/v1/listen";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Deepgram drops the connection after 10s without audio or keepalive
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(4);
/// How long to keep draining in-flight frames after a cancel
const TAIL_DRAIN: Duration = Duration::from_millis(200);

// Live API event types

#[derive(Debug, Deserialize)]
struct LiveEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    channel: Option<LiveChannel>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LiveChannel {
    alternatives: Vec<LiveAlternative>,
}

#[derive(Debug, Deserialize)]
struct LiveAlternative {
    transcript: String,
}

/// Deepgram WebSocket streaming provider
pub struct DeepgramStreamProvider {
    ws_endpoint: String,
    batch: DeepgramProvider,
}

impl DeepgramStreamProvider {
    /// Create a provider against the production endpoints
    pub fn new() -> Self {
        Self {
            ws_endpoint: WS_URL.to_string(),
            batch: DeepgramProvider::new(),
        }
    }

    /// Build the connection URL with query parameters
    fn build_url(&self, request: &TranscriptionRequest) -> String {
        let model = request.model().unwrap_or(DEFAULT_MODEL);
        let mut url = format!(
            "{}?model={}&encoding=linear16&sample_rate={}&channels=1\
             &smart_format=true&interim_results=true",
            self.ws_endpoint, model, SAMPLE_RATE
        );

        if let Some(language) = request.language() {
            url.push_str(&format!("&language={}", language));
        }

        for keyword in request.keywords() {
            url.push_str(&format!("&keyterm={}", keyword));
        }

        url
    }
}

impl Default for DeepgramStreamProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for DeepgramStreamProvider {
    fn name(&self) -> &'static str {
        "deepgram_stream"
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    /// File/buffer input goes through the pre-recorded REST endpoint;
    /// the live endpoint exists for mic input
    async fn transcribe(
        &self,
        audio: &AudioSource,
        request: &TranscriptionRequest,
    ) -> Result<String, ProviderError> {
        self.batch.transcribe(audio, request).await
    }

    async fn transcribe_stream(
        &self,
        request: &TranscriptionRequest,
        mut frames: FrameReceiver,
        interim: InterimSink,
        cancel: CancelToken,
    ) -> Result<String, ProviderError> {
        let api_key = require_env_key(super::deepgram::API_KEY_ENV)?;

        let mut ws_request = self
            .build_url(request)
            .into_client_request()
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        ws_request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {}", api_key))
                .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?,
        );

        let (ws_stream, _response) = timeout(CONNECT_TIMEOUT, connect_async(ws_request))
            .await
            .map_err(|_| ProviderError::Transient("connection timeout".into()))?
            .map_err(|e| ProviderError::Transient(format!("failed to connect: {}", e)))?;

        let (write, read) = ws_stream.split();
        let write = Arc::new(Mutex::new(write));

        // Signals the reader that CloseStream was sent, carrying the total
        // sample count so the flush timeout can scale with audio length
        let (done_tx, done_rx) = oneshot::channel::<usize>();

        let read_handle = tokio::spawn(collect_transcripts(read, done_rx, interim));

        let (keepalive_cancel_tx, keepalive_cancel_rx) = oneshot::channel();
        let keepalive_handle = tokio::spawn({
            let write = Arc::clone(&write);
            async move { keepalive_task(write, keepalive_cancel_rx).await }
        });

        // Forward frames as binary PCM16 little-endian until end-of-audio
        // or external cancellation
        let mut total_samples = 0usize;
        let send_result: Result<(), ProviderError> = loop {
            let frame = tokio::select! {
                frame = frames.recv() => frame,
                _ = cancel.cancelled() => {
                    // The session is stopping; pick up the tail the
                    // capture side is still flushing before end-of-audio
                    let drained = loop {
                        match timeout(TAIL_DRAIN, frames.recv()).await {
                            Ok(Some(samples)) => {
                                if let Err(e) =
                                    send_frame(&write, samples, &mut total_samples).await
                                {
                                    break Err(e);
                                }
                            }
                            Ok(None) | Err(_) => break Ok(()),
                        }
                    };
                    break drained;
                }
            };

            let Some(samples) = frame else {
                break Ok(());
            };

            if let Err(e) = send_frame(&write, samples, &mut total_samples).await {
                break Err(e);
            }
        };

        let _ = keepalive_cancel_tx.send(());
        let _ = keepalive_handle.await;

        if let Err(e) = send_result {
            read_handle.abort();
            let _ = write.lock().await.send(Message::Close(None)).await;
            return Err(e);
        }

        // CloseStream flushes whatever Deepgram still buffers
        if let Err(e) = write
            .lock()
            .await
            .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string().into()))
            .await
        {
            read_handle.abort();
            return Err(ProviderError::Transient(format!(
                "failed to close stream: {}",
                e
            )));
        }

        let _ = done_tx.send(total_samples);

        let transcript = match timeout(CONNECT_TIMEOUT, read_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ProviderError::Transient(format!("read task failed: {}", e))),
            Err(_) => Err(ProviderError::Transient(
                "timed out waiting for the final transcript".into(),
            )),
        };

        let _ = write.lock().await.send(Message::Close(None)).await;

        transcript
    }
}

/// Encode and send one PCM16 frame as a binary WebSocket message
async fn send_frame<W>(
    write: &Arc<Mutex<W>>,
    samples: Vec<i16>,
    total_samples: &mut usize,
) -> Result<(), ProviderError>
where
    W: SinkExt<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    if samples.is_empty() {
        return Ok(());
    }

    *total_samples += samples.len();
    let bytes: Vec<u8> = samples.iter().flat_map(|&s| s.to_le_bytes()).collect();

    write
        .lock()
        .await
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| ProviderError::Transient(format!("failed to send audio chunk: {}", e)))
}

/// Periodic KeepAlive so silent stretches do not drop the connection
async fn keepalive_task<W>(write: Arc<Mutex<W>>, mut cancel_rx: oneshot::Receiver<()>)
where
    W: SinkExt<Message> + Unpin,
{
    let mut interval = tokio::time::interval(KEEPALIVE_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let msg = r#"{"type":"KeepAlive"}"#;
                if write.lock().await.send(Message::Text(msg.to_string().into())).await.is_err() {
                    break;
                }
            }
            _ = &mut cancel_rx => break,
        }
    }
}

/// Collect transcripts from the read side.
///
/// Finalized segments accumulate into the transcript; non-final segments
/// are surfaced through the interim sink appended to what is already
/// final, so the shown text only ever grows.
async fn collect_transcripts<S>(
    mut read: S,
    mut done_rx: oneshot::Receiver<usize>,
    interim: InterimSink,
) -> Result<String, ProviderError>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut final_transcript = String::new();

    // Phase 1: stream in progress
    let total_samples: usize;
    loop {
        tokio::select! {
            result = &mut done_rx => {
                total_samples = result.unwrap_or(0);
                break;
            }
            msg = read.next() => {
                if let Some(result) = process_message(msg, &mut final_transcript, &interim)? {
                    return Ok(result);
                }
            }
        }
    }

    // Phase 2: CloseStream sent; wait for the flush with a timeout that
    // scales with how much audio the server still has to chew through
    let audio_secs = total_samples as f64 / SAMPLE_RATE as f64;
    let flush_timeout = Duration::from_secs_f64((audio_secs / 5.0).clamp(5.0, 60.0));
    let deadline = tokio::time::Instant::now() + flush_timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(final_transcript.trim().to_string());
        }

        tokio::select! {
            _ = tokio::time::sleep(remaining) => {
                return Ok(final_transcript.trim().to_string());
            }
            msg = read.next() => {
                if let Some(result) = process_message(msg, &mut final_transcript, &interim)? {
                    return Ok(result);
                }
            }
        }
    }
}

/// Process one WebSocket message.
/// Returns Ok(Some(transcript)) when the stream is finished.
fn process_message(
    msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    final_transcript: &mut String,
    interim: &InterimSink,
) -> Result<Option<String>, ProviderError> {
    match msg {
        Some(Ok(Message::Text(text))) => {
            let event: LiveEvent = serde_json::from_str(&text)
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;

            match event.event_type.as_str() {
                "Results" => {
                    let segment = event
                        .channel
                        .as_ref()
                        .and_then(|c| c.alternatives.first())
                        .map(|a| a.transcript.trim())
                        .unwrap_or("");

                    if segment.is_empty() {
                        // A pause; leave the last interim untouched
                        return Ok(None);
                    }

                    if event.is_final {
                        if !final_transcript.is_empty() {
                            final_transcript.push(' ');
                        }
                        final_transcript.push_str(segment);
                        interim(final_transcript.as_str());
                    } else {
                        let shown = if final_transcript.is_empty() {
                            segment.to_string()
                        } else {
                            format!("{} {}", final_transcript, segment)
                        };
                        interim(&shown);
                    }
                }
                "Metadata" => {}
                "error" => {
                    let desc = event
                        .description
                        .unwrap_or_else(|| "no description".to_string());
                    return Err(ProviderError::Transient(format!("deepgram error: {}", desc)));
                }
                _ => {}
            }
            Ok(None)
        }
        Some(Ok(Message::Close(_))) => Ok(Some(final_transcript.trim().to_string())),
        Some(Ok(_)) => Ok(None),
        Some(Err(e)) => Err(ProviderError::Transient(format!("websocket error: {}", e))),
        None => Ok(Some(final_transcript.trim().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn sink_into(buffer: Arc<StdMutex<Vec<String>>>) -> InterimSink {
        Arc::new(move |text: &str| buffer.lock().unwrap().push(text.to_string()))
    }

    fn results_event(transcript: &str, is_final: bool) -> String {
        format!(
            r#"{{"type":"Results","is_final":{},"channel":{{"alternatives":[{{"transcript":"{}"}}]}}}}"#,
            is_final, transcript
        )
    }

    #[test]
    fn url_carries_model_and_query_params() {
        let provider = DeepgramStreamProvider::new();
        let request = TranscriptionRequest::new("deepgram_stream")
            .with_language(Some("en".into()))
            .with_keywords(vec!["voxd".into()]);

        let url = provider.build_url(&request);
        assert!(url.starts_with("wss://api.deepgram.com/v1/listen?model=nova-3"));
        assert!(url.contains("encoding=linear16"));
        assert!(url.contains("sample_rate=16000"));
        assert!(url.contains("interim_results=true"));
        assert!(url.contains("language=en"));
        assert!(url.contains("keyterm=voxd"));
    }

    #[test]
    fn provider_identity() {
        let provider = DeepgramStreamProvider::new();
        assert_eq!(provider.name(), "deepgram_stream");
        assert_eq!(provider.default_model(), "nova-3");
        assert!(provider.supports_streaming());
    }

    #[test]
    fn interim_results_grow_and_finals_accumulate() {
        let shown = Arc::new(StdMutex::new(Vec::new()));
        let interim = sink_into(shown.clone());
        let mut transcript = String::new();

        let msg = |raw: String| Some(Ok(Message::Text(raw.into())));

        process_message(msg(results_event("hello", false)), &mut transcript, &interim).unwrap();
        process_message(msg(results_event("hello world", true)), &mut transcript, &interim)
            .unwrap();
        process_message(msg(results_event("again", false)), &mut transcript, &interim).unwrap();

        assert_eq!(transcript, "hello world");
        assert_eq!(
            shown.lock().unwrap().as_slice(),
            &[
                "hello".to_string(),
                "hello world".to_string(),
                "hello world again".to_string(),
            ]
        );
    }

    #[test]
    fn pause_gap_does_not_clear_interim() {
        let shown = Arc::new(StdMutex::new(Vec::new()));
        let interim = sink_into(shown.clone());
        let mut transcript = String::new();

        let msg = |raw: String| Some(Ok(Message::Text(raw.into())));

        process_message(msg(results_event("so far", true)), &mut transcript, &interim).unwrap();
        // Speaker pauses: Deepgram sends an empty segment
        process_message(msg(results_event("", false)), &mut transcript, &interim).unwrap();

        // No new (and no blank) interim was pushed for the pause
        assert_eq!(shown.lock().unwrap().as_slice(), &["so far".to_string()]);
    }

    #[test]
    fn server_error_event_is_transient() {
        let interim: InterimSink = Arc::new(|_| {});
        let mut transcript = String::new();
        let raw = r#"{"type":"error","description":"bad audio"}"#;

        let err = process_message(
            Some(Ok(Message::Text(raw.to_string().into()))),
            &mut transcript,
            &interim,
        )
        .unwrap_err();

        assert!(matches!(err, ProviderError::Transient(_)));
        assert!(err.to_string().contains("bad audio"));
    }

    #[test]
    fn close_frame_returns_accumulated_transcript() {
        let interim: InterimSink = Arc::new(|_| {});
        let mut transcript = String::from("all done");

        let result = process_message(
            Some(Ok(Message::Close(None))),
            &mut transcript,
            &interim,
        )
        .unwrap();

        assert_eq!(result, Some("all done".to_string()));
    }
}
