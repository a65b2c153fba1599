//! Transcription request value objects

use std::path::PathBuf;

/// Value object holding a WAV-framed audio clip ready for upload
#[derive(Debug, Clone)]
pub struct AudioClip {
    data: Vec<u8>,
}

impl AudioClip {
    /// Create a clip from WAV bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Frame mono PCM16 samples at the session sample rate as a WAV clip
    pub fn from_samples(samples: &[i16]) -> Self {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: super::SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            // Writing into an in-memory cursor cannot fail
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .expect("WAV header write to memory buffer");
            for &sample in samples {
                let _ = writer.write_sample(sample);
            }
            let _ = writer.finalize();
        }

        Self {
            data: cursor.into_inner(),
        }
    }

    /// Get the raw bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

/// Audio input for a batch transcription call
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// In-memory clip recorded during this session
    Clip(AudioClip),
    /// Pre-existing audio file on disk
    File(PathBuf),
}

/// Immutable description of one transcription job.
///
/// Constructed by the controller when a start command is accepted and
/// handed to the worker once; carries every parameter that affects
/// provider behavior so a configuration change mid-session can never
/// leak into an already-running job.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    provider: String,
    model: Option<String>,
    language: Option<String>,
    keywords: Vec<String>,
}

impl TranscriptionRequest {
    /// Build a request for the named provider
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            language: None,
            keywords: Vec::new(),
        }
    }

    /// Select a specific model instead of the provider default
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Set the language code; `None` means auto-detection
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Attach vocabulary keywords as a recognition hint
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Provider name the request targets
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Requested model, if one overrides the provider default
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Language code, or `None` for auto-detection
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Vocabulary keywords (possibly empty)
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_size() {
        let clip = AudioClip::new(vec![0u8; 1024]);
        assert_eq!(clip.size_bytes(), 1024);
    }

    #[test]
    fn human_readable_size_bytes() {
        let clip = AudioClip::new(vec![0u8; 500]);
        assert_eq!(clip.human_readable_size(), "500 B");
    }

    #[test]
    fn human_readable_size_kb() {
        let clip = AudioClip::new(vec![0u8; 2048]);
        assert_eq!(clip.human_readable_size(), "2.0 KB");
    }

    #[test]
    fn from_samples_produces_riff_wav() {
        let clip = AudioClip::from_samples(&[0i16; 160]);
        assert_eq!(&clip.data()[..4], b"RIFF");
        assert_eq!(&clip.data()[8..12], b"WAVE");
        // 44-byte header + 2 bytes per sample
        assert_eq!(clip.size_bytes(), 44 + 320);
    }

    #[test]
    fn from_empty_samples_is_header_only() {
        let clip = AudioClip::from_samples(&[]);
        assert_eq!(clip.size_bytes(), 44);
    }

    #[test]
    fn human_readable_size_mb() {
        let clip = AudioClip::new(vec![0u8; 2 * 1024 * 1024]);
        assert_eq!(clip.human_readable_size(), "2.0 MB");
    }

    #[test]
    fn request_defaults() {
        let request = TranscriptionRequest::new("deepgram");
        assert_eq!(request.provider(), "deepgram");
        assert!(request.model().is_none());
        assert!(request.language().is_none());
        assert!(request.keywords().is_empty());
    }

    #[test]
    fn request_builder() {
        let request = TranscriptionRequest::new("openai")
            .with_model(Some("whisper-1".into()))
            .with_language(Some("de".into()))
            .with_keywords(vec!["tokio".into()]);

        assert_eq!(request.model(), Some("whisper-1"));
        assert_eq!(request.language(), Some("de"));
        assert_eq!(request.keywords(), &["tokio".to_string()]);
    }
}
