//! Shared session context between the controller and the active worker

use std::sync::{Arc, Mutex as StdMutex};

use thiserror::Error;

use crate::domain::session::{DaemonState, InvalidStateTransition, StateMachine};

use super::ports::{CaptureError, InterimSink, ProviderError, PublishError, StatePublisher};

/// Errors a worker can surface to the controller
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Audio capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to write audio artifact: {0}")]
    Artifact(String),

    #[error("Timed out waiting for the transcription result")]
    ResultTimeout,
}

impl WorkerError {
    /// Whether the underlying cause is a configuration problem the user
    /// must fix (as opposed to a transient failure)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_configuration())
    }
}

/// State machine plus publisher, shared between the controller and the
/// supervisor task it spawns per session.
///
/// Every transition goes through `advance`, which serializes the mutation
/// and publishes the new state in the same order it occurred.
pub struct SharedState {
    machine: StdMutex<StateMachine>,
    publisher: Arc<dyn StatePublisher>,
}

impl SharedState {
    /// Create a shared state wrapper and publish the initial idle state
    pub fn new(publisher: Arc<dyn StatePublisher>) -> Self {
        let shared = Self {
            machine: StdMutex::new(StateMachine::new()),
            publisher,
        };
        shared.publish(DaemonState::Idle);
        shared
    }

    /// Current state
    pub fn state(&self) -> DaemonState {
        self.machine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state()
    }

    /// Whether a session is currently active
    pub fn is_busy(&self) -> bool {
        self.machine
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_busy()
    }

    /// Apply a transition and publish the resulting state.
    ///
    /// Publishing happens under the same lock as the transition, so the
    /// IPC artifacts always see states in exactly the order the machine
    /// went through them.
    pub fn advance(
        &self,
        transition: impl FnOnce(&mut StateMachine) -> Result<(), InvalidStateTransition>,
    ) -> Result<DaemonState, InvalidStateTransition> {
        let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
        transition(&mut machine)?;
        let state = machine.state();
        self.publish(state);
        Ok(state)
    }

    /// Unconditional reset to idle (fatal-signal path)
    pub fn force_reset(&self) {
        let mut machine = self.machine.lock().unwrap_or_else(|e| e.into_inner());
        machine.force_reset();
        self.publish(DaemonState::Idle);
    }

    /// Publish the latest interim transcript
    pub fn publish_interim(&self, text: &str) {
        if let Err(e) = self.publisher.publish_interim(text) {
            log_publish_error(&e);
        }
    }

    fn publish(&self, state: DaemonState) {
        if let Err(e) = self.publisher.publish_state(state) {
            log_publish_error(&e);
        }
        if !state.shows_interim() {
            if let Err(e) = self.publisher.clear_interim() {
                log_publish_error(&e);
            }
        }
    }
}

fn log_publish_error(err: &PublishError) {
    eprintln!("voxd: IPC publish failed: {}", err);
}

/// Narrow handle handed to workers so they can report progress without
/// owning state transitions beyond their contract.
#[derive(Clone)]
pub struct ProgressHandle {
    shared: Arc<SharedState>,
}

impl ProgressHandle {
    /// Wrap the shared state
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Report that capture is delivering frames (listening -> recording).
    /// Ignored when the session already moved past listening.
    pub fn capture_live(&self) {
        let _ = self.shared.advance(|sm| sm.begin_recording());
    }

    /// Publish an interim transcript update
    pub fn interim(&self, text: &str) {
        self.shared.publish_interim(text);
    }

    /// Build a sink closure for streaming providers
    pub fn interim_sink(&self) -> InterimSink {
        let handle = self.clone();
        Arc::new(move |text: &str| handle.interim(text))
    }
}
