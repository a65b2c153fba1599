//! Application configuration value object

use serde::{Deserialize, Serialize};

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transcription provider name (openai, deepgram, deepgram_stream, groq, local)
    pub provider: Option<String>,
    /// Model override; provider default when unset
    pub model: Option<String>,
    /// Language code; auto-detection when unset
    pub language: Option<String>,
    /// Force streaming on/off; provider capability default when unset
    pub streaming: Option<bool>,
    /// Copy the final transcript to the clipboard
    pub clipboard: Option<bool>,
    /// Play audio cues on session start/stop/error
    pub cues: Option<bool>,
    /// Path to the vocabulary JSON file
    pub vocabulary: Option<String>,
    /// Directory for the IPC artifacts (state, lock, interim text)
    pub runtime_dir: Option<String>,
    /// Hard result timeout in seconds once a stop is requested
    pub result_timeout_secs: Option<u64>,
    /// Safety limit in seconds before a recording auto-stops
    pub max_duration_secs: Option<u64>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            provider: Some("openai".to_string()),
            model: None,
            language: None,
            streaming: None,
            clipboard: Some(true),
            cues: Some(false),
            vocabulary: None,
            runtime_dir: None,
            result_timeout_secs: Some(60),
            max_duration_secs: Some(300),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            model: other.model.or(self.model),
            language: other.language.or(self.language),
            streaming: other.streaming.or(self.streaming),
            clipboard: other.clipboard.or(self.clipboard),
            cues: other.cues.or(self.cues),
            vocabulary: other.vocabulary.or(self.vocabulary),
            runtime_dir: other.runtime_dir.or(self.runtime_dir),
            result_timeout_secs: other.result_timeout_secs.or(self.result_timeout_secs),
            max_duration_secs: other.max_duration_secs.or(self.max_duration_secs),
        }
    }

    /// Get the provider name, or the default
    pub fn provider_or_default(&self) -> &str {
        self.provider.as_deref().unwrap_or("openai")
    }

    /// Get clipboard setting, or true if not set
    pub fn clipboard_or_default(&self) -> bool {
        self.clipboard.unwrap_or(true)
    }

    /// Get cue setting, or false if not set
    pub fn cues_or_default(&self) -> bool {
        self.cues.unwrap_or(false)
    }

    /// Get the result timeout, or the 60s default
    pub fn result_timeout_or_default(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.result_timeout_secs.unwrap_or(60))
    }

    /// Get the max recording duration, or the 5-minute default
    pub fn max_duration_or_default(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.max_duration_secs.unwrap_or(300))
    }
}
