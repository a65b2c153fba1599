//! Transcription domain module

mod request;
mod result;
mod vocabulary;

pub use request::{AudioClip, AudioSource, TranscriptionRequest};
pub use result::TranscriptionResult;
pub use vocabulary::Vocabulary;

/// Sample rate every session records at (mono PCM16)
pub const SAMPLE_RATE: u32 = 16_000;
