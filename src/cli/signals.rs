//! Signal handling for the daemon

use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Commands the daemon loop reacts to, from signals or the control socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Toggle recording (start if idle, stop if recording)
    Toggle,
    /// Start a session
    Start,
    /// Stop recording and transcribe
    Stop,
    /// Cancel the current session without a transcript
    Cancel,
    /// Shut the daemon down (SIGINT/SIGTERM)
    Shutdown,
}

/// Daemon signal handler
///
/// Translates OS signals into daemon commands on the same channel the
/// control socket feeds: SIGUSR1 toggles, SIGUSR2 cancels, SIGINT and
/// SIGTERM shut down.
pub struct DaemonSignalHandler {
    receiver: mpsc::Receiver<DaemonCommand>,
}

impl DaemonSignalHandler {
    /// Create a handler and start listening for signals.
    ///
    /// Returns the handler plus a sender for other command sources
    /// (the control socket server).
    pub fn new() -> Result<(Self, mpsc::Sender<DaemonCommand>), std::io::Error> {
        let (tx, rx) = mpsc::channel(10);

        let tx_int = tx.clone();
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            sigint.recv().await;
            eprintln!("{} Received SIGINT (shutdown)", "↓".cyan());
            let _ = tx_int.send(DaemonCommand::Shutdown).await;
        });

        let tx_term = tx.clone();
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            sigterm.recv().await;
            eprintln!("{} Received SIGTERM (shutdown)", "↓".cyan());
            let _ = tx_term.send(DaemonCommand::Shutdown).await;
        });

        let tx_usr1 = tx.clone();
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        tokio::spawn(async move {
            loop {
                sigusr1.recv().await;
                let _ = tx_usr1.send(DaemonCommand::Toggle).await;
            }
        });

        let tx_usr2 = tx.clone();
        let mut sigusr2 = signal(SignalKind::user_defined2())?;
        tokio::spawn(async move {
            loop {
                sigusr2.recv().await;
                let _ = tx_usr2.send(DaemonCommand::Cancel).await;
            }
        });

        Ok((Self { receiver: rx }, tx))
    }

    /// Wait for the next command
    pub async fn recv(&mut self) -> Option<DaemonCommand> {
        self.receiver.recv().await
    }
}
