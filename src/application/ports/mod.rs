//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod audio_cue;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod provider;
pub mod publisher;

// Re-export common types
pub use audio_cue::{AudioCue, AudioCueError, AudioCueType};
pub use capture::{
    AudioCapture, CaptureError, CaptureHandle, Frame, FrameReceiver, FrameSender, frame_queue,
};
pub use clipboard::{Clipboard, ClipboardError};
pub use config::ConfigStore;
pub use provider::{InterimSink, Provider, ProviderError};
pub use publisher::{PublishError, StatePublisher};
