//! Recording session entity

use std::time::{Duration, Instant};

use super::CancelToken;

/// One start-to-result recording cycle.
///
/// Owns the growing sample buffer (mono i16 at the session sample rate),
/// the cancellation token, and any pre-roll audio captured before the
/// session was confirmed. Exclusively owned by the active worker; the
/// capture callback never touches it directly.
pub struct RecordingSession {
    samples: Vec<i16>,
    early_buffer: Vec<Vec<i16>>,
    cancel: CancelToken,
    started_at: Instant,
}

impl RecordingSession {
    /// Create a new session with an empty buffer
    pub fn new() -> Self {
        Self::with_early_buffer(Vec::new())
    }

    /// Create a session seeded with pre-roll chunks captured before the
    /// start command was confirmed
    pub fn with_early_buffer(early_buffer: Vec<Vec<i16>>) -> Self {
        Self {
            samples: Vec::new(),
            early_buffer,
            cancel: CancelToken::new(),
            started_at: Instant::now(),
        }
    }

    /// The session's cancellation token
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Append a captured frame to the session buffer
    pub fn push_frame(&mut self, frame: &[i16]) {
        self.samples.extend_from_slice(frame);
    }

    /// Take the pre-roll chunks, leaving the buffer empty.
    /// Chunks are returned in capture order.
    pub fn drain_early_buffer(&mut self) -> Vec<Vec<i16>> {
        std::mem::take(&mut self.early_buffer)
    }

    /// Whether any pre-roll audio was captured
    pub fn has_early_audio(&self) -> bool {
        !self.early_buffer.is_empty()
    }

    /// Number of buffered samples so far (pre-roll not included until drained)
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Borrow the buffered samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Consume the session, returning the full sample buffer
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Time since the session was created
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty() {
        let session = RecordingSession::new();
        assert_eq!(session.sample_count(), 0);
        assert!(!session.has_early_audio());
        assert!(!session.cancel_token().is_cancelled());
    }

    #[test]
    fn push_frame_accumulates() {
        let mut session = RecordingSession::new();
        session.push_frame(&[1, 2, 3]);
        session.push_frame(&[4, 5]);
        assert_eq!(session.samples(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn early_buffer_preserves_order() {
        let mut session =
            RecordingSession::with_early_buffer(vec![vec![1, 2], vec![3], vec![4, 5]]);
        assert!(session.has_early_audio());

        let chunks = session.drain_early_buffer();
        assert_eq!(chunks, vec![vec![1, 2], vec![3], vec![4, 5]]);

        // Draining empties the buffer
        assert!(!session.has_early_audio());
        assert!(session.drain_early_buffer().is_empty());
    }

    #[test]
    fn into_samples_returns_buffer() {
        let mut session = RecordingSession::new();
        session.push_frame(&[7, 8, 9]);
        assert_eq!(session.into_samples(), vec![7, 8, 9]);
    }

    #[test]
    fn token_is_shared_with_clones() {
        let session = RecordingSession::new();
        let token = session.cancel_token();
        token.cancel();
        assert!(session.cancel_token().is_cancelled());
    }
}
