//! Session domain module

mod cancel;
mod recording;
mod state;

pub use cancel::CancelToken;
pub use recording::RecordingSession;
pub use state::{DaemonState, InvalidStateTransition, StateMachine};
