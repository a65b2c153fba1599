//! Daemon app runner

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::application::ports::Provider;
use crate::application::{
    ControllerSettings, DaemonController, SessionOutcome, SharedState, StartOptions,
};
use crate::domain::session::DaemonState;
use crate::domain::transcription::Vocabulary;
use crate::infrastructure::{
    create_provider, ArboardClipboard, CpalCapture, CrashRecovery, FilePublisher, IpcPaths,
    NixProbe, NoopAudioCue, NoopClipboard, ProcessLock, RecoveryAction, RodioAudioCue,
};

use super::args::DaemonOptions;
use super::presenter::{format_duration, preview, Presenter};
use super::signals::{DaemonCommand, DaemonSignalHandler};
use super::socket::DaemonSocketServer;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;

/// Run the daemon until a shutdown signal arrives
pub async fn run_daemon(options: DaemonOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let paths = match &options.runtime_dir {
        Some(dir) => IpcPaths::in_dir(dir),
        None => IpcPaths::new(),
    };

    // Crash recovery runs before anything else touches the lock
    let lock = ProcessLock::new(paths.lock_path());
    match CrashRecovery::new(NixProbe::default()).run(&lock) {
        RecoveryAction::NoLock | RecoveryAction::OwnLock => {}
        RecoveryAction::RemovedInvalid => {
            presenter.warn("Removed lock file with invalid contents");
        }
        RecoveryAction::RemovedStale(pid) => {
            presenter.warn(&format!("Removed stale lock of dead process {}", pid));
        }
        RecoveryAction::RemovedForeign(pid) => {
            presenter.warn(&format!(
                "Removed lock held by unrelated process {} (PID reuse)",
                pid
            ));
        }
        RecoveryAction::TerminatedAndRemoved(pid) => {
            presenter.warn(&format!("Terminated leftover daemon {} and took over", pid));
        }
        RecoveryAction::LeftInPlace(pid) => {
            presenter.error(&format!(
                "Another daemon appears to be running (PID: {})",
                pid
            ));
            return ExitCode::from(EXIT_ERROR);
        }
    }

    if let Err(e) = lock.acquire() {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    // Unknown provider names fail here, before any command is accepted
    let provider: Arc<dyn Provider> = match create_provider(&options.provider) {
        Ok(p) => p,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let vocabulary = match &options.vocabulary {
        Some(path) => Vocabulary::load(&PathBuf::from(path)),
        None => default_vocabulary(),
    };
    if !vocabulary.is_empty() {
        presenter.info(&format!(
            "Vocabulary loaded ({} keywords)",
            vocabulary.keywords().len()
        ));
    }

    let publisher = Arc::new(FilePublisher::new(paths.clone()));
    let shared = Arc::new(SharedState::new(publisher.clone()));

    let clipboard: Arc<dyn crate::application::ports::Clipboard> = if options.clipboard {
        Arc::new(ArboardClipboard::new())
    } else {
        Arc::new(NoopClipboard)
    };
    let cue: Arc<dyn crate::application::ports::AudioCue> = if options.cues {
        Arc::new(RodioAudioCue::new())
    } else {
        Arc::new(NoopAudioCue)
    };

    let settings = ControllerSettings {
        model: options.model.clone(),
        language: options.language.clone(),
        streaming: options.streaming,
        clipboard: options.clipboard,
        cues: options.cues,
        result_timeout: options.result_timeout,
        max_duration: options.max_duration,
        ..Default::default()
    };

    let (controller, mut outcomes) = DaemonController::new(
        Arc::new(CpalCapture::new()),
        Arc::clone(&provider),
        clipboard,
        cue,
        Arc::clone(&shared),
        vocabulary,
        settings,
    );

    let (mut commands, command_tx) = match DaemonSignalHandler::new() {
        Ok(s) => s,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut socket_server = DaemonSocketServer::new(paths.socket_path());
    if let Err(e) = socket_server.bind() {
        presenter.error(&format!("Failed to bind control socket: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let socket_path_display = socket_server.path().display().to_string();
    let shared_for_socket = Arc::clone(&shared);
    tokio::spawn(async move {
        let _ = socket_server
            .run(command_tx, move || shared_for_socket.state())
            .await;
    });

    presenter.daemon_status("Started, waiting for commands...");
    presenter.info(&format!(
        "PID: {} | Provider: {} | Socket: {}",
        std::process::id(),
        provider.name(),
        socket_path_display
    ));

    // Main command loop
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(DaemonCommand::Toggle) => match controller.state() {
                        DaemonState::Idle | DaemonState::Done | DaemonState::Error => {
                            handle_start(&controller, &presenter);
                        }
                        DaemonState::Listening | DaemonState::Recording => {
                            handle_stop(&controller, &mut presenter);
                        }
                        state => {
                            presenter.warn(&format!("Busy ({}), please wait", state));
                        }
                    },
                    Some(DaemonCommand::Start) => {
                        handle_start(&controller, &presenter);
                    }
                    Some(DaemonCommand::Stop) => {
                        handle_stop(&controller, &mut presenter);
                    }
                    Some(DaemonCommand::Cancel) => {
                        if controller.is_busy() {
                            controller.cancel_session();
                            presenter.stop_spinner();
                            presenter.daemon_status("Session cancelled");
                        } else {
                            presenter.warn("Nothing to cancel");
                        }
                    }
                    Some(DaemonCommand::Shutdown) => {
                        controller.cancel_session();
                        presenter.stop_spinner();
                        presenter.daemon_status("Shutting down...");
                        break;
                    }
                    None => {
                        // Command channel closed
                        break;
                    }
                }
            }
            outcome = outcomes.recv() => {
                match outcome {
                    Some(outcome) => report_outcome(outcome, &mut presenter),
                    None => break,
                }
            }
        }
    }

    // Cleanup (the socket server removes its file on drop)
    publisher.remove_artifacts();
    let _ = lock.release();

    ExitCode::from(EXIT_SUCCESS)
}

fn handle_start(controller: &DaemonController, presenter: &Presenter) {
    match controller.start_session(StartOptions::default()) {
        Ok(()) => presenter.daemon_status("Recording..."),
        Err(e) => presenter.warn(&e.to_string()),
    }
}

fn handle_stop(controller: &DaemonController, presenter: &mut Presenter) {
    match controller.stop_session() {
        Ok(true) => presenter.start_spinner("Transcribing..."),
        Ok(false) => presenter.warn("Not recording, nothing to stop"),
        Err(e) => presenter.error(&e.to_string()),
    }
}

fn report_outcome(outcome: SessionOutcome, presenter: &mut Presenter) {
    match outcome {
        Ok(result) => {
            presenter.spinner_success(&format!(
                "Transcribed in {} via {}",
                format_duration(result.elapsed()),
                result.provider()
            ));
            if result.text().is_empty() {
                presenter.warn("Nothing recognized");
            } else {
                presenter.info(&format!("Text: {}", preview(result.text(), 80)));
                presenter.output(result.text());
            }
        }
        Err(e) => {
            presenter.spinner_fail(&format!("Session failed: {}", e));
        }
    }
}

/// Default vocabulary location under the user config dir
fn default_vocabulary() -> Vocabulary {
    let path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("voxd")
        .join("vocabulary.json");
    Vocabulary::load(&path)
}
