//! voxd CLI entry point

use std::process::ExitCode;

use clap::Parser;

use voxd::application::ports::ConfigStore;
use voxd::cli::{
    args::{Cli, Commands},
    ctl::handle_ctl_command,
    daemon_app::{run_daemon, EXIT_ERROR},
    presenter::Presenter,
    DaemonOptions,
};
use voxd::domain::config::AppConfig;
use voxd::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let presenter = Presenter::new();

    // Client subcommand
    if let Some(Commands::Ctl { action }) = cli.command {
        if let Err(e) = handle_ctl_command(action, cli.runtime_dir.as_deref(), &presenter).await {
            presenter.error(&e);
            return ExitCode::from(EXIT_ERROR);
        }
        return ExitCode::SUCCESS;
    }

    // Build CLI config from args (clap already resolved VOXD_MODE)
    let cli_config = AppConfig {
        provider: cli.mode.clone(),
        model: cli.model.clone(),
        language: cli.language.clone(),
        streaming: cli.streaming,
        clipboard: if cli.no_clipboard { Some(false) } else { None },
        cues: if cli.cues { Some(true) } else { None },
        vocabulary: cli.vocabulary.clone(),
        runtime_dir: cli.runtime_dir.clone(),
        result_timeout_secs: None,
        max_duration_secs: cli.max_duration,
    };

    // Merge: defaults < file < cli
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|_| AppConfig::empty());
    let config = AppConfig::defaults().merge(file_config).merge(cli_config);

    let options = DaemonOptions {
        provider: config.provider_or_default().to_string(),
        model: config.model.clone(),
        language: config.language.clone(),
        streaming: config.streaming,
        clipboard: config.clipboard_or_default(),
        cues: config.cues_or_default(),
        vocabulary: config.vocabulary.clone(),
        runtime_dir: config.runtime_dir.clone(),
        result_timeout: config.result_timeout_or_default(),
        max_duration: config.max_duration_or_default(),
    };

    run_daemon(options).await
}
