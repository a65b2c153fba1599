//! Daemon session state machine

use std::fmt;
use thiserror::Error;

/// Daemon states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DaemonState {
    #[default]
    Idle,
    Listening,
    Recording,
    Transcribing,
    Refining,
    Done,
    Error,
}

impl DaemonState {
    /// Get the string representation (the IPC state token)
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::Refining => "refining",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// States in which interim text is meaningful to external readers
    pub const fn shows_interim(&self) -> bool {
        matches!(self, Self::Recording | Self::Transcribing)
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: DaemonState,
    pub action: String,
}

impl InvalidStateTransition {
    fn new(current_state: DaemonState, action: &str) -> Self {
        Self {
            current_state,
            action: action.to_string(),
        }
    }
}

/// Session state machine.
/// All transitions are serialized by the controller; no other component
/// mutates the current state.
///
/// State machine:
///   IDLE -> LISTENING (start accepted)
///   LISTENING -> RECORDING (capture delivering frames)
///   LISTENING | RECORDING -> TRANSCRIBING (stop)
///   TRANSCRIBING -> REFINING (vocabulary pass)
///   TRANSCRIBING | REFINING -> DONE (worker success)
///   LISTENING | RECORDING | TRANSCRIBING | REFINING -> ERROR (worker failure)
///   LISTENING | RECORDING -> IDLE (cancel)
///   DONE | ERROR -> IDLE (grace timeout or next start)
///   any -> IDLE (force reset on fatal signal)
#[derive(Debug, Default)]
pub struct StateMachine {
    state: DaemonState,
}

impl StateMachine {
    /// Create a new state machine in idle state
    pub fn new() -> Self {
        Self {
            state: DaemonState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Check if currently idle
    pub fn is_idle(&self) -> bool {
        self.state == DaemonState::Idle
    }

    /// Check if a session is active (anything between start and reset)
    pub fn is_busy(&self) -> bool {
        !matches!(
            self.state,
            DaemonState::Idle | DaemonState::Done | DaemonState::Error
        )
    }

    /// Transition from IDLE to LISTENING
    pub fn begin_listening(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != DaemonState::Idle {
            return Err(InvalidStateTransition::new(self.state, "start a session"));
        }
        self.state = DaemonState::Listening;
        Ok(())
    }

    /// Transition from LISTENING to RECORDING
    pub fn begin_recording(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != DaemonState::Listening {
            return Err(InvalidStateTransition::new(self.state, "begin recording"));
        }
        self.state = DaemonState::Recording;
        Ok(())
    }

    /// Transition from LISTENING or RECORDING to TRANSCRIBING
    pub fn begin_transcribing(&mut self) -> Result<(), InvalidStateTransition> {
        if !matches!(self.state, DaemonState::Listening | DaemonState::Recording) {
            return Err(InvalidStateTransition::new(self.state, "stop recording"));
        }
        self.state = DaemonState::Transcribing;
        Ok(())
    }

    /// Transition from TRANSCRIBING to REFINING
    pub fn begin_refining(&mut self) -> Result<(), InvalidStateTransition> {
        if self.state != DaemonState::Transcribing {
            return Err(InvalidStateTransition::new(self.state, "refine transcript"));
        }
        self.state = DaemonState::Refining;
        Ok(())
    }

    /// Transition from TRANSCRIBING or REFINING to DONE
    pub fn finish(&mut self) -> Result<(), InvalidStateTransition> {
        if !matches!(self.state, DaemonState::Transcribing | DaemonState::Refining) {
            return Err(InvalidStateTransition::new(self.state, "finish the session"));
        }
        self.state = DaemonState::Done;
        Ok(())
    }

    /// Transition to ERROR from any in-session state
    pub fn fail(&mut self) -> Result<(), InvalidStateTransition> {
        if !self.is_busy() {
            return Err(InvalidStateTransition::new(self.state, "fail the session"));
        }
        self.state = DaemonState::Error;
        Ok(())
    }

    /// Transition from LISTENING or RECORDING to IDLE (cancel without result)
    pub fn cancel(&mut self) -> Result<(), InvalidStateTransition> {
        if !matches!(self.state, DaemonState::Listening | DaemonState::Recording) {
            return Err(InvalidStateTransition::new(self.state, "cancel recording"));
        }
        self.state = DaemonState::Idle;
        Ok(())
    }

    /// Transition from DONE or ERROR back to IDLE
    pub fn reset(&mut self) -> Result<(), InvalidStateTransition> {
        if !matches!(self.state, DaemonState::Done | DaemonState::Error) {
            return Err(InvalidStateTransition::new(self.state, "reset the session"));
        }
        self.state = DaemonState::Idle;
        Ok(())
    }

    /// Unconditional reset to IDLE, used by the fatal-signal path
    pub fn force_reset(&mut self) {
        self.state = DaemonState::Idle;
    }
}
