//! Recording worker - the batch transcription path

use std::io::Write;

use crate::domain::session::RecordingSession;
use crate::domain::transcription::{AudioClip, AudioSource, TranscriptionRequest, TranscriptionResult};

use super::ports::{AudioCapture, Provider, frame_queue};
use super::session::{ProgressHandle, WorkerError};

/// Capture-side queue depth. At ~10ms driver callbacks this is several
/// seconds of headroom before anything is dropped.
const CAPTURE_QUEUE_FRAMES: usize = 512;

/// Run one batch-path session: capture until cancelled, then upload the
/// whole buffer to the provider.
///
/// The buffered audio is written to a transient WAV artifact that is
/// removed on every exit path, including provider failure.
pub async fn run_recording_worker(
    capture: &dyn AudioCapture,
    provider: &dyn Provider,
    progress: &ProgressHandle,
    mut session: RecordingSession,
    request: &TranscriptionRequest,
) -> Result<TranscriptionResult, WorkerError> {
    let cancel = session.cancel_token();

    let (sink, mut frames) = frame_queue(CAPTURE_QUEUE_FRAMES);
    let handle = capture.start(sink).await?;
    progress.capture_live();

    // Pre-roll audio recorded before the session was confirmed
    for chunk in session.drain_early_buffer() {
        session.push_frame(&chunk);
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => session.push_frame(&frame),
                None => break,
            },
            _ = cancel.cancelled() => break,
        }
    }

    handle.stop();

    // Frames the driver delivered before it observed the stop
    while let Some(frame) = frames.try_recv() {
        session.push_frame(&frame);
    }

    let elapsed = session.elapsed();
    let samples = session.into_samples();

    if samples.is_empty() {
        return Ok(TranscriptionResult::new("", elapsed, provider.name()));
    }

    let clip = AudioClip::from_samples(&samples);

    // NamedTempFile removes the artifact when it goes out of scope,
    // whatever path we leave this function on.
    let mut artifact = tempfile::Builder::new()
        .prefix("voxd-")
        .suffix(".wav")
        .tempfile()
        .map_err(|e| WorkerError::Artifact(e.to_string()))?;

    artifact
        .write_all(clip.data())
        .and_then(|_| artifact.flush())
        .map_err(|e| WorkerError::Artifact(e.to_string()))?;

    let text = provider
        .transcribe(&AudioSource::File(artifact.path().to_path_buf()), request)
        .await?;

    Ok(TranscriptionResult::new(text, elapsed, provider.name()))
}
