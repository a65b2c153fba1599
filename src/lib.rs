//! voxd - hotkey dictation daemon
//!
//! Turns a hotkey press into transcribed text: a control command starts a
//! recording session, a second one stops it, and the transcript lands on
//! the clipboard while file-based IPC artifacts keep menu-bar/overlay
//! processes in sync.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: the session state machine, value objects, and errors
//! - **Application**: the daemon controller, both workers, and port traits
//! - **Infrastructure**: adapter implementations (cpal, providers, IPC,
//!   process lock, clipboard, audio cues, config)
//! - **CLI**: argument parsing, the control socket, signal handling, and
//!   the daemon runner

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
