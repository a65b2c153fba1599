//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces: audio
//! capture, transcription providers, IPC publishing, the process lock,
//! clipboard, audio cues, and configuration storage.

pub mod audio_cue;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod ipc;
pub mod lock;
pub mod providers;

// Re-export adapters
pub use audio_cue::{NoopAudioCue, RodioAudioCue};
pub use capture::CpalCapture;
pub use clipboard::{ArboardClipboard, NoopClipboard};
pub use config::XdgConfigStore;
pub use ipc::{FilePublisher, IpcPaths};
pub use lock::{CrashRecovery, LockError, NixProbe, ProcessLock, ProcessProbe, RecoveryAction};
pub use providers::{
    create_provider, DeepgramProvider, DeepgramStreamProvider, GroqProvider, LocalWhisperProvider,
    OpenAiProvider, PROVIDER_NAMES,
};
