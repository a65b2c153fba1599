//! Silent audio cue adapter

use async_trait::async_trait;

use crate::application::ports::{AudioCue, AudioCueError, AudioCueType};

/// Audio cue adapter that plays nothing (cues disabled)
pub struct NoopAudioCue;

#[async_trait]
impl AudioCue for NoopAudioCue {
    async fn play(&self, _cue_type: AudioCueType) -> Result<(), AudioCueError> {
        Ok(())
    }
}
