//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};

/// voxd - hotkey dictation daemon
#[derive(Parser, Debug)]
#[command(name = "voxd")]
#[command(version)]
#[command(about = "Hotkey dictation daemon with batch and live-streaming transcription")]
#[command(long_about = None)]
pub struct Cli {
    /// Transcription provider (openai, deepgram, deepgram_stream, groq, local)
    #[arg(short = 'm', long = "mode", value_name = "NAME", env = "VOXD_MODE")]
    pub mode: Option<String>,

    /// Model override (provider default when unset)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code, e.g. 'de', 'en' (auto-detection when unset)
    #[arg(short = 'l', long, value_name = "LANG")]
    pub language: Option<String>,

    /// Force the streaming path on or off (provider default when unset)
    #[arg(long, value_name = "BOOL")]
    pub streaming: Option<bool>,

    /// Do not copy the final transcript to the clipboard
    #[arg(long)]
    pub no_clipboard: bool,

    /// Play audio cues on session start/stop/error
    #[arg(long)]
    pub cues: bool,

    /// Vocabulary JSON file with recognition keywords
    #[arg(long, value_name = "FILE")]
    pub vocabulary: Option<String>,

    /// Directory for IPC artifacts and the control socket
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<String>,

    /// Max recording duration in seconds before auto-stop
    #[arg(long, value_name = "SECS")]
    pub max_duration: Option<u64>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a command to the running daemon
    Ctl {
        #[command(subcommand)]
        action: CtlAction,
    },
}

/// Daemon control actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CtlAction {
    /// Toggle recording (start if idle, stop if recording)
    Toggle,
    /// Start a recording session
    Start,
    /// Stop recording and transcribe
    Stop,
    /// Cancel the current session without a transcript
    Cancel,
    /// Show daemon status
    Status,
}

impl CtlAction {
    /// The wire token sent over the control socket
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Cancel => "cancel",
            Self::Status => "status",
        }
    }
}

/// Parsed daemon options after config merging
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub provider: String,
    pub model: Option<String>,
    pub language: Option<String>,
    pub streaming: Option<bool>,
    pub clipboard: bool,
    pub cues: bool,
    pub vocabulary: Option<String>,
    pub runtime_dir: Option<String>,
    pub result_timeout: std::time::Duration,
    pub max_duration: std::time::Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["voxd"]);
        assert!(cli.mode.is_none());
        assert!(cli.model.is_none());
        assert!(cli.language.is_none());
        assert!(cli.streaming.is_none());
        assert!(!cli.no_clipboard);
        assert!(!cli.cues);
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_mode() {
        let cli = Cli::parse_from(["voxd", "-m", "deepgram_stream"]);
        assert_eq!(cli.mode.as_deref(), Some("deepgram_stream"));
    }

    #[test]
    fn cli_parses_streaming_toggle() {
        let cli = Cli::parse_from(["voxd", "--streaming", "false"]);
        assert_eq!(cli.streaming, Some(false));

        let cli = Cli::parse_from(["voxd", "--streaming", "true"]);
        assert_eq!(cli.streaming, Some(true));
    }

    #[test]
    fn cli_parses_language_and_model() {
        let cli = Cli::parse_from(["voxd", "-l", "de", "--model", "nova-2"]);
        assert_eq!(cli.language.as_deref(), Some("de"));
        assert_eq!(cli.model.as_deref(), Some("nova-2"));
    }

    #[test]
    fn cli_parses_ctl_subcommands() {
        let cli = Cli::parse_from(["voxd", "ctl", "toggle"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Ctl {
                action: CtlAction::Toggle
            })
        ));

        let cli = Cli::parse_from(["voxd", "ctl", "status"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Ctl {
                action: CtlAction::Status
            })
        ));
    }

    #[test]
    fn ctl_actions_have_wire_tokens() {
        assert_eq!(CtlAction::Toggle.as_str(), "toggle");
        assert_eq!(CtlAction::Start.as_str(), "start");
        assert_eq!(CtlAction::Stop.as_str(), "stop");
        assert_eq!(CtlAction::Cancel.as_str(), "cancel");
        assert_eq!(CtlAction::Status.as_str(), "status");
    }

    #[test]
    fn verify_cli() {
        // Verify the CLI definition is valid
        Cli::command().debug_assert();
    }
}
