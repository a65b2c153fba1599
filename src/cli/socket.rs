//! Unix Domain Socket for daemon control

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::domain::session::DaemonState;

use super::signals::DaemonCommand;

/// Daemon socket server - listens for commands and feeds the command channel
pub struct DaemonSocketServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl DaemonSocketServer {
    /// Create a new socket server
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            listener: None,
        }
    }

    /// Bind to the socket
    pub fn bind(&mut self) -> io::Result<()> {
        // Remove stale socket file if it exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Get the socket path
    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept and handle connections.
    ///
    /// Each command is sent to the provided channel. The state_fn is
    /// called to answer status queries and to reject a start while busy.
    pub async fn run<F>(&self, tx: mpsc::Sender<DaemonCommand>, state_fn: F) -> io::Result<()>
    where
        F: Fn() -> DaemonState + Send + Sync + Clone + 'static,
    {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Socket not bound"))?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let tx = tx.clone();
                    let state_fn = state_fn.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, tx, state_fn).await {
                            eprintln!("voxd: socket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    eprintln!("voxd: socket accept error: {}", e);
                }
            }
        }
    }

    /// Cleanup socket file
    pub fn cleanup(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for DaemonSocketServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Handle a single client connection
async fn handle_connection<F>(
    stream: UnixStream,
    tx: mpsc::Sender<DaemonCommand>,
    state_fn: F,
) -> io::Result<()>
where
    F: Fn() -> DaemonState,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader.read_line(&mut line).await?;
    let cmd = line.trim();

    let response: String = match cmd {
        "toggle" => {
            let _ = tx.send(DaemonCommand::Toggle).await;
            "ok\n".into()
        }
        "start" => {
            // A start while busy is rejected here, not queued
            let state = state_fn();
            if matches!(state, DaemonState::Idle | DaemonState::Done | DaemonState::Error) {
                let _ = tx.send(DaemonCommand::Start).await;
                "ok\n".into()
            } else {
                format!("busy: {}\n", state)
            }
        }
        "stop" => {
            let _ = tx.send(DaemonCommand::Stop).await;
            "ok\n".into()
        }
        "cancel" => {
            let _ = tx.send(DaemonCommand::Cancel).await;
            "ok\n".into()
        }
        "status" => format!("{}\n", state_fn()),
        _ => "error: unknown command\n".into(),
    };

    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}

/// Daemon socket client - connects and sends commands
pub struct DaemonSocketClient {
    socket_path: PathBuf,
}

impl DaemonSocketClient {
    /// Create a new socket client
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Check if daemon appears to be running (socket exists)
    pub fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send a command and receive the response line
    pub async fn send_command(&self, cmd: &str) -> io::Result<String> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (reader, mut writer) = stream.into_split();

        writer.write_all(format!("{}\n", cmd).as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        reader.read_line(&mut response).await?;

        Ok(response)
    }
}
