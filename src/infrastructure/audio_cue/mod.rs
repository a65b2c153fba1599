//! Audio cue adapters

mod noop;
mod rodio;

pub use noop::NoopAudioCue;
pub use rodio::RodioAudioCue;
