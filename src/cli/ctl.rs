//! Client side of the daemon control socket

use crate::infrastructure::IpcPaths;

use super::args::CtlAction;
use super::presenter::Presenter;
use super::socket::DaemonSocketClient;

/// Send a control command to the running daemon and report the response
pub async fn handle_ctl_command(
    action: CtlAction,
    runtime_dir: Option<&str>,
    presenter: &Presenter,
) -> Result<(), String> {
    let paths = match runtime_dir {
        Some(dir) => IpcPaths::in_dir(dir),
        None => IpcPaths::new(),
    };

    let client = DaemonSocketClient::new(paths.socket_path());

    if !client.is_daemon_running() {
        return Err("Daemon is not running (start it with 'voxd')".to_string());
    }

    let response = client
        .send_command(action.as_str())
        .await
        .map_err(|e| format!("Failed to reach daemon: {}", e))?;

    let response = response.trim();
    match action {
        CtlAction::Status => presenter.output(response),
        _ => {
            if response == "ok" {
                presenter.success(response);
            } else if let Some(state) = response.strip_prefix("busy: ") {
                return Err(format!("Daemon is busy ({})", state));
            } else {
                return Err(response.to_string());
            }
        }
    }

    Ok(())
}
