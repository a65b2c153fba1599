//! Application layer - Use cases and port interfaces
//!
//! Contains the daemon controller, the two workers, and trait
//! definitions for external system interactions.

pub mod controller;
pub mod ports;
pub mod recording_worker;
pub mod session;
pub mod streaming_worker;

// Re-export the core surface
pub use controller::{
    ControllerError, ControllerSettings, DaemonController, SessionOutcome, StartOptions,
    STREAMING_ENV,
};
pub use recording_worker::run_recording_worker;
pub use session::{ProgressHandle, SharedState, WorkerError};
pub use streaming_worker::run_streaming_worker;
