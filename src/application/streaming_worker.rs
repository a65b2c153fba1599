//! Streaming worker - the live transcription path

use std::sync::Arc;
use std::time::Duration;

use crate::domain::session::RecordingSession;
use crate::domain::transcription::{AudioClip, AudioSource, TranscriptionRequest, TranscriptionResult};

use super::ports::{AudioCapture, Provider, ProviderError, frame_queue};
use super::session::{ProgressHandle, WorkerError};

/// Capture-side queue depth, same headroom as the batch path
const CAPTURE_QUEUE_FRAMES: usize = 512;

/// Capture-to-network hand-off depth. Small on purpose: a stalled
/// network write sheds the oldest frames here instead of backing up
/// into the capture callback.
const NETWORK_QUEUE_FRAMES: usize = 128;

/// Run one streaming-path session.
///
/// Pre-roll chunks are replayed into the connection before live frames.
/// Every frame is also teed into the session buffer so a mid-session
/// connection failure degrades to the batch path over the buffered audio
/// instead of losing the session.
pub async fn run_streaming_worker(
    capture: &dyn AudioCapture,
    provider: Arc<dyn Provider>,
    progress: &ProgressHandle,
    mut session: RecordingSession,
    request: &TranscriptionRequest,
    close_timeout: Duration,
) -> Result<TranscriptionResult, WorkerError> {
    let cancel = session.cancel_token();

    let (capture_sink, mut capture_rx) = frame_queue(CAPTURE_QUEUE_FRAMES);
    let (net_tx, net_rx) = frame_queue(NETWORK_QUEUE_FRAMES);

    // Replay pre-roll audio ahead of anything live so speech that started
    // the instant the hotkey was pressed is not clipped.
    for chunk in session.drain_early_buffer() {
        session.push_frame(&chunk);
        net_tx.push(chunk);
    }

    let handle = capture.start(capture_sink).await?;
    progress.capture_live();

    let mut stream_task = {
        let provider = Arc::clone(&provider);
        let request = request.clone();
        let interim = progress.interim_sink();
        let cancel = cancel.clone();
        tokio::spawn(
            async move { provider.transcribe_stream(&request, net_rx, interim, cancel).await },
        )
    };

    // Pump frames until stop. The network hand-off stays open only while
    // the stream task is healthy; after an early stream failure we keep
    // capturing for the fallback.
    let mut net_tx = Some(net_tx);
    let mut early_outcome: Option<Result<String, ProviderError>> = None;

    loop {
        tokio::select! {
            frame = capture_rx.recv() => match frame {
                Some(frame) => {
                    session.push_frame(&frame);
                    if let Some(tx) = &net_tx {
                        tx.push(frame);
                    }
                }
                None => break,
            },
            outcome = &mut stream_task, if early_outcome.is_none() => {
                // The connection ended while audio was still flowing.
                // Even a clean early close loses the tail, so both cases
                // route into the fallback below.
                let outcome = match outcome {
                    Ok(Ok(_)) => Err(ProviderError::Transient(
                        "streaming connection closed before end of audio".into(),
                    )),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(ProviderError::Transient(format!("stream task failed: {}", e))),
                };
                eprintln!(
                    "voxd: streaming connection lost, will fall back to batch: {}",
                    outcome.as_ref().err().map(ToString::to_string).unwrap_or_default()
                );
                early_outcome = Some(outcome);
                net_tx = None;
            }
            _ = cancel.cancelled() => break,
        }
    }

    handle.stop();

    // Frames the driver delivered before it observed the stop
    while let Some(frame) = capture_rx.try_recv() {
        session.push_frame(&frame);
        if let Some(tx) = &net_tx {
            tx.push(frame);
        }
    }

    if let Some(tx) = &net_tx {
        let dropped = tx.dropped();
        if dropped > 0 {
            eprintln!(
                "voxd: network hand-off shed {} frame(s) to keep capture real-time",
                dropped
            );
        }
    }

    // Closing the hand-off signals end-of-audio; the provider flushes and
    // resolves with the final transcript.
    drop(net_tx);

    let outcome = match early_outcome {
        Some(outcome) => outcome,
        None => match tokio::time::timeout(close_timeout, &mut stream_task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Err(ProviderError::Transient(format!("stream task failed: {}", e))),
            Err(_) => {
                stream_task.abort();
                Err(ProviderError::Transient(
                    "timed out waiting for the final transcript".into(),
                ))
            }
        },
    };

    let elapsed = session.elapsed();

    match outcome {
        Ok(text) => Ok(TranscriptionResult::new(text, elapsed, provider.name())),
        Err(err) if err.is_configuration() => Err(err.into()),
        Err(err) => {
            eprintln!("voxd: falling back to batch transcription: {}", err);

            let samples = session.into_samples();
            if samples.is_empty() {
                return Ok(TranscriptionResult::new("", elapsed, provider.name()));
            }

            let clip = AudioClip::from_samples(&samples);
            let text = provider
                .transcribe(&AudioSource::Clip(clip), request)
                .await?;

            Ok(TranscriptionResult::new(text, elapsed, provider.name()))
        }
    }
}
