//! Daemon controller - owns the state machine and the active worker

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::session::{CancelToken, DaemonState, InvalidStateTransition, RecordingSession};
use crate::domain::transcription::{TranscriptionRequest, TranscriptionResult, Vocabulary};

use super::ports::{AudioCapture, AudioCue, AudioCueType, Clipboard, Provider};
use super::recording_worker::run_recording_worker;
use super::session::{ProgressHandle, SharedState, WorkerError};
use super::streaming_worker::run_streaming_worker;

/// Environment toggle for forcing the streaming path on or off
pub const STREAMING_ENV: &str = "VOXD_STREAMING";

/// Controller errors surfaced to the command surface
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Busy: a session is already active ({0})")]
    Busy(DaemonState),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),
}

/// Per-start options from the command surface
#[derive(Debug, Default)]
pub struct StartOptions {
    /// Explicit path override; wins over the environment toggle and the
    /// provider capability default
    pub streaming: Option<bool>,
    /// Pre-roll audio captured by the trigger collaborator before the
    /// start command was confirmed
    pub early_buffer: Vec<Vec<i16>>,
}

/// Controller tuning, resolved from the merged configuration
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Model override passed to the provider
    pub model: Option<String>,
    /// Language code, `None` for auto-detection
    pub language: Option<String>,
    /// Config-file streaming preference (below the env toggle)
    pub streaming: Option<bool>,
    /// Whether to hand the final transcript to the clipboard
    pub clipboard: bool,
    /// Whether to play audio cues
    pub cues: bool,
    /// Hard timeout for the await-result step after a stop
    pub result_timeout: Duration,
    /// Bound on waiting for a streaming final transcript after end-of-audio
    pub close_timeout: Duration,
    /// How long done/error remain visible before resetting to idle
    pub done_grace: Duration,
    /// Safety limit: a session still recording after this long is
    /// auto-stopped as if a stop command had arrived
    pub max_duration: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            model: None,
            language: None,
            streaming: None,
            clipboard: true,
            cues: false,
            result_timeout: Duration::from_secs(60),
            close_timeout: Duration::from_secs(30),
            done_grace: Duration::from_secs(2),
            max_duration: Duration::from_secs(300),
        }
    }
}

/// Outcome delivered on the controller's result channel, one per session
pub type SessionOutcome = Result<TranscriptionResult, WorkerError>;

struct ActiveSession {
    /// Distinguishes sessions so a finishing supervisor can only clear
    /// its own slot, never a successor's
    generation: u64,
    cancel: CancelToken,
    /// Set by force-cancel: the supervisor discards the result instead of
    /// publishing it
    abort: Arc<AtomicBool>,
}

/// The daemon state machine owner.
///
/// Exactly one worker may be active at a time; a start while busy is
/// rejected, never queued. Commands return immediately; the session
/// outcome arrives on the result channel.
pub struct DaemonController {
    capture: Arc<dyn AudioCapture>,
    provider: Arc<dyn Provider>,
    clipboard: Arc<dyn Clipboard>,
    cue: Arc<dyn AudioCue>,
    shared: Arc<SharedState>,
    vocabulary: Vocabulary,
    settings: ControllerSettings,
    active: Arc<StdMutex<Option<ActiveSession>>>,
    next_generation: AtomicU64,
    results: mpsc::UnboundedSender<SessionOutcome>,
}

impl DaemonController {
    /// Create a controller and the receiving end of its result channel
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        provider: Arc<dyn Provider>,
        clipboard: Arc<dyn Clipboard>,
        cue: Arc<dyn AudioCue>,
        shared: Arc<SharedState>,
        vocabulary: Vocabulary,
        settings: ControllerSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionOutcome>) {
        let (results, outcome_rx) = mpsc::unbounded_channel();
        (
            Self {
                capture,
                provider,
                clipboard,
                cue,
                shared,
                vocabulary,
                settings,
                active: Arc::new(StdMutex::new(None)),
                next_generation: AtomicU64::new(0),
                results,
            },
            outcome_rx,
        )
    }

    /// Current daemon state
    pub fn state(&self) -> DaemonState {
        self.shared.state()
    }

    /// Whether a session is active (start would be rejected)
    pub fn is_busy(&self) -> bool {
        self.shared.is_busy()
    }

    /// Accept a start command.
    ///
    /// Rejected with `ControllerError::Busy` while a session is active.
    /// A start arriving while done/error are still displayed resets first.
    pub fn start_session(&self, options: StartOptions) -> Result<(), ControllerError> {
        self.shared.advance(|sm| {
            if matches!(sm.state(), DaemonState::Done | DaemonState::Error) {
                sm.reset()?;
            }
            sm.begin_listening()
        })
        .map_err(|e| ControllerError::Busy(e.current_state))?;

        let streaming = self.select_streaming(options.streaming);
        let request = TranscriptionRequest::new(self.provider.name())
            .with_model(self.settings.model.clone())
            .with_language(self.settings.language.clone())
            .with_keywords(self.vocabulary.keywords().to_vec());

        let session = RecordingSession::with_early_buffer(options.early_buffer);
        let cancel = session.cancel_token();
        let abort = Arc::new(AtomicBool::new(false));
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            *active = Some(ActiveSession {
                generation,
                cancel: cancel.clone(),
                abort: Arc::clone(&abort),
            });
        }

        self.spawn_supervisor(session, request, streaming, cancel, abort, generation);

        if self.settings.cues {
            let cue = Arc::clone(&self.cue);
            tokio::spawn(async move {
                let _ = cue.play(AudioCueType::SessionStart).await;
            });
        }

        Ok(())
    }

    /// Accept a stop command. A stop while idle is a no-op; returns
    /// whether a session was actually stopped.
    pub fn stop_session(&self) -> Result<bool, ControllerError> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let Some(session) = active.as_ref() else {
            return Ok(false);
        };

        // Already past recording (double stop): ignore
        if self.shared.advance(|sm| sm.begin_transcribing()).is_err() {
            return Ok(false);
        }

        session.cancel.cancel();

        if self.settings.cues {
            let cue = Arc::clone(&self.cue);
            tokio::spawn(async move {
                let _ = cue.play(AudioCueType::SessionStop).await;
            });
        }

        Ok(true)
    }

    /// Force-cancel the active session without delivering a result.
    /// Used for user cancellation and the fatal-signal path.
    pub fn cancel_session(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = active.take() {
            session.abort.store(true, Ordering::SeqCst);
            session.cancel.cancel();
        }
        self.shared.force_reset();
    }

    /// Path selection: per-call flag, then environment toggle, then
    /// config preference, then the provider capability default.
    fn select_streaming(&self, per_call: Option<bool>) -> bool {
        per_call
            .or_else(env_streaming_toggle)
            .or(self.settings.streaming)
            .unwrap_or_else(|| self.provider.supports_streaming())
    }

    fn spawn_supervisor(
        &self,
        session: RecordingSession,
        request: TranscriptionRequest,
        streaming: bool,
        cancel: CancelToken,
        abort: Arc<AtomicBool>,
        generation: u64,
    ) {
        let capture = Arc::clone(&self.capture);
        let provider = Arc::clone(&self.provider);
        let clipboard = Arc::clone(&self.clipboard);
        let cue = Arc::clone(&self.cue);
        let shared = Arc::clone(&self.shared);
        let vocabulary = self.vocabulary.clone();
        let settings = self.settings.clone();
        let active = Arc::clone(&self.active);
        let results = self.results.clone();

        tokio::spawn(async move {
            let progress = ProgressHandle::new(Arc::clone(&shared));
            let close_timeout = settings.close_timeout;

            let mut worker = tokio::spawn(async move {
                if streaming {
                    run_streaming_worker(
                        capture.as_ref(),
                        provider,
                        &progress,
                        session,
                        &request,
                        close_timeout,
                    )
                    .await
                } else {
                    run_recording_worker(
                        capture.as_ref(),
                        provider.as_ref(),
                        &progress,
                        session,
                        &request,
                    )
                    .await
                }
            });

            // The hard result timeout starts counting once a stop (or
            // force-cancel) is requested; before that the worker runs
            // until the user stops it or the max-duration safety limit.
            let outcome = tokio::select! {
                joined = &mut worker => flatten_join(joined),
                _ = cancel.cancelled() => {
                    await_result(&mut worker, settings.result_timeout).await
                }
                _ = tokio::time::sleep(settings.max_duration) => {
                    // Auto-stop: same path as an explicit stop command
                    let _ = shared.advance(|sm| sm.begin_transcribing());
                    cancel.cancel();
                    await_result(&mut worker, settings.result_timeout).await
                }
            };

            if abort.load(Ordering::SeqCst) {
                // Force-cancelled: state already reset, nothing to deliver
                return;
            }

            let outcome = match outcome {
                Ok(result) => {
                    // Worker may have finished without an explicit stop
                    // (e.g. capture source ended); enter transcribing first.
                    let _ = shared.advance(|sm| sm.begin_transcribing());

                    let result = if vocabulary.is_empty() {
                        result
                    } else {
                        let _ = shared.advance(|sm| sm.begin_refining());
                        let refined = vocabulary.apply_casing(result.text());
                        result.with_text(refined)
                    };

                    let _ = shared.advance(|sm| sm.finish());

                    if settings.clipboard && !result.text().is_empty() {
                        // The paste collaborator's failure does not fail the session
                        let _ = clipboard.copy(result.text()).await;
                    }

                    Ok(result)
                }
                Err(err) => {
                    let _ = shared.advance(|sm| sm.fail());
                    if settings.cues {
                        let _ = cue.play(AudioCueType::SessionError).await;
                    }
                    Err(err)
                }
            };

            let _ = results.send(outcome);

            {
                let mut active = active.lock().unwrap_or_else(|e| e.into_inner());
                if active.as_ref().map(|s| s.generation) == Some(generation) {
                    *active = None;
                }
            }

            // Leave done/error visible briefly, then return to idle unless
            // a new session already started.
            tokio::time::sleep(settings.done_grace).await;
            let _ = shared.advance(|sm| sm.reset());
        });
    }
}

async fn await_result(
    worker: &mut tokio::task::JoinHandle<Result<TranscriptionResult, WorkerError>>,
    result_timeout: Duration,
) -> Result<TranscriptionResult, WorkerError> {
    match tokio::time::timeout(result_timeout, &mut *worker).await {
        Ok(joined) => flatten_join(joined),
        Err(_) => {
            worker.abort();
            Err(WorkerError::ResultTimeout)
        }
    }
}

fn flatten_join(
    joined: Result<Result<TranscriptionResult, WorkerError>, tokio::task::JoinError>,
) -> Result<TranscriptionResult, WorkerError> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => Err(WorkerError::Artifact(format!("worker task failed: {}", e))),
    }
}

fn env_streaming_toggle() -> Option<bool> {
    match std::env::var(STREAMING_ENV) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        AudioCapture, AudioCueError, CaptureError, CaptureHandle, ClipboardError, FrameSender,
        Provider, ProviderError, PublishError, StatePublisher,
    };
    use crate::domain::transcription::AudioSource;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct IdleCapture;

    #[async_trait]
    impl AudioCapture for IdleCapture {
        async fn start(&self, sink: FrameSender) -> Result<CaptureHandle, CaptureError> {
            let stop = Arc::new(AtomicBool::new(false));
            let stop_clone = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut n: i16 = 0;
                while !stop_clone.load(Ordering::SeqCst) {
                    n = n.wrapping_add(1);
                    sink.push(vec![n; 160]);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            });
            Ok(CaptureHandle::new(stop))
        }
    }

    struct StaticProvider {
        text: &'static str,
        streaming: bool,
    }

    #[async_trait]
    impl Provider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }
        fn default_model(&self) -> &'static str {
            "static-1"
        }
        fn supports_streaming(&self) -> bool {
            self.streaming
        }
        async fn transcribe(
            &self,
            _audio: &AudioSource,
            _request: &TranscriptionRequest,
        ) -> Result<String, ProviderError> {
            Ok(self.text.to_string())
        }
    }

    #[derive(Default)]
    struct MemoryPublisher {
        states: Mutex<Vec<String>>,
    }

    impl StatePublisher for MemoryPublisher {
        fn publish_state(&self, state: DaemonState) -> Result<(), PublishError> {
            self.states.lock().unwrap().push(state.as_str().to_string());
            Ok(())
        }
        fn publish_interim(&self, _text: &str) -> Result<(), PublishError> {
            Ok(())
        }
        fn clear_interim(&self) -> Result<(), PublishError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryClipboard {
        copied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Clipboard for MemoryClipboard {
        async fn copy(&self, text: &str) -> Result<(), ClipboardError> {
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct SilentCue;

    #[async_trait]
    impl AudioCue for SilentCue {
        async fn play(&self, _cue_type: AudioCueType) -> Result<(), AudioCueError> {
            Ok(())
        }
    }

    struct Harness {
        controller: DaemonController,
        outcomes: mpsc::UnboundedReceiver<SessionOutcome>,
        publisher: Arc<MemoryPublisher>,
        clipboard: Arc<MemoryClipboard>,
    }

    fn harness(provider_text: &'static str) -> Harness {
        let publisher = Arc::new(MemoryPublisher::default());
        let clipboard = Arc::new(MemoryClipboard::default());
        let shared = Arc::new(SharedState::new(publisher.clone()));

        let settings = ControllerSettings {
            result_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(1),
            done_grace: Duration::from_millis(30),
            max_duration: Duration::from_secs(60),
            ..Default::default()
        };

        let (controller, outcomes) = DaemonController::new(
            Arc::new(IdleCapture),
            Arc::new(StaticProvider {
                text: provider_text,
                streaming: false,
            }),
            clipboard.clone(),
            Arc::new(SilentCue),
            shared,
            Vocabulary::default(),
            settings,
        );

        Harness {
            controller,
            outcomes,
            publisher,
            clipboard,
        }
    }

    #[tokio::test]
    async fn start_stop_delivers_result() {
        let mut h = harness("transcribed text");

        h.controller.start_session(StartOptions::default()).unwrap();
        assert!(h.controller.is_busy());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(h.controller.stop_session().unwrap());

        let outcome = tokio::time::timeout(Duration::from_secs(5), h.outcomes.recv())
            .await
            .expect("outcome within timeout")
            .expect("channel open");
        let result = outcome.expect("session succeeds");
        assert_eq!(result.text(), "transcribed text");

        // Final transcript went to the paste collaborator
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            h.clipboard.copied.lock().unwrap().as_slice(),
            &["transcribed text"]
        );

        // Grace period returns the daemon to idle
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(h.controller.state(), DaemonState::Idle);
    }

    #[tokio::test]
    async fn second_start_is_rejected_not_queued() {
        let h = harness("text");

        h.controller.start_session(StartOptions::default()).unwrap();
        let err = h.controller.start_session(StartOptions::default());

        assert!(matches!(err, Err(ControllerError::Busy(_))));
        h.controller.cancel_session();
    }

    #[tokio::test]
    async fn stop_while_idle_is_noop() {
        let h = harness("text");
        assert!(!h.controller.stop_session().unwrap());
        assert_eq!(h.controller.state(), DaemonState::Idle);
    }

    #[tokio::test]
    async fn force_cancel_discards_result() {
        let mut h = harness("must not appear");

        h.controller.start_session(StartOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.controller.cancel_session();

        assert_eq!(h.controller.state(), DaemonState::Idle);
        assert!(!h.controller.is_busy());

        // No outcome is delivered and nothing reaches the clipboard
        let outcome =
            tokio::time::timeout(Duration::from_millis(200), h.outcomes.recv()).await;
        assert!(outcome.is_err(), "force-cancel must not deliver a result");
        assert!(h.clipboard.copied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn states_publish_in_controller_order() {
        let mut h = harness("ordered");

        h.controller.start_session(StartOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        h.controller.stop_session().unwrap();

        let _ = tokio::time::timeout(Duration::from_secs(5), h.outcomes.recv()).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let states = h.publisher.states.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![
                "idle".to_string(),
                "listening".to_string(),
                "recording".to_string(),
                "transcribing".to_string(),
                "done".to_string(),
                "idle".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn start_while_done_resets_first() {
        let mut h = harness("quick");

        h.controller.start_session(StartOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.controller.stop_session().unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(5), h.outcomes.recv()).await;

        // Immediately start again while "done" is still displayed
        h.controller.start_session(StartOptions::default()).unwrap();
        assert!(h.controller.is_busy());
        h.controller.cancel_session();
    }

    #[tokio::test]
    async fn vocabulary_refines_the_transcript() {
        let publisher = Arc::new(MemoryPublisher::default());
        let shared = Arc::new(SharedState::new(publisher.clone()));

        let settings = ControllerSettings {
            result_timeout: Duration::from_secs(5),
            done_grace: Duration::from_millis(30),
            max_duration: Duration::from_secs(60),
            ..Default::default()
        };

        let (controller, mut outcomes) = DaemonController::new(
            Arc::new(IdleCapture),
            Arc::new(StaticProvider {
                text: "we build on tokio and deepgram",
                streaming: false,
            }),
            Arc::new(MemoryClipboard::default()),
            Arc::new(SilentCue),
            shared,
            Vocabulary::new(vec!["Tokio".into(), "Deepgram".into()]),
            settings,
        );

        controller.start_session(StartOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        controller.stop_session().unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("outcome within timeout")
            .expect("channel open");
        assert_eq!(
            outcome.unwrap().text(),
            "we build on Tokio and Deepgram"
        );

        // The refining state was published between transcribing and done
        let states = publisher.states.lock().unwrap().clone();
        let refining_pos = states.iter().position(|s| s == "refining");
        let done_pos = states.iter().position(|s| s == "done");
        assert!(refining_pos.is_some(), "refining state published: {:?}", states);
        assert!(refining_pos < done_pos);
    }

    #[tokio::test]
    async fn max_duration_auto_stops_the_session() {
        let publisher = Arc::new(MemoryPublisher::default());
        let shared = Arc::new(SharedState::new(publisher.clone()));

        let settings = ControllerSettings {
            result_timeout: Duration::from_secs(5),
            done_grace: Duration::from_millis(30),
            // Very short safety limit: the session stops by itself
            max_duration: Duration::from_millis(60),
            ..Default::default()
        };

        let (controller, mut outcomes) = DaemonController::new(
            Arc::new(IdleCapture),
            Arc::new(StaticProvider {
                text: "auto stopped",
                streaming: false,
            }),
            Arc::new(MemoryClipboard::default()),
            Arc::new(SilentCue),
            shared,
            Vocabulary::default(),
            settings,
        );

        controller.start_session(StartOptions::default()).unwrap();

        // No stop command is ever issued
        let outcome = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("auto-stop delivers an outcome")
            .expect("channel open");
        assert_eq!(outcome.unwrap().text(), "auto stopped");
    }

    #[test]
    fn env_toggle_parses_common_values() {
        // Not set in the test environment
        assert_eq!(env_streaming_toggle(), None);
    }
}
