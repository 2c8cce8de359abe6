//! lab-agent CLI entry point.

use clap::Parser;

use lab_agent::cli::{commands, handle_error, Cli, Commands};
use lab_agent::infrastructure::config::ConfigLoader;
use lab_agent::infrastructure::logging::{cleanup_old_logs, LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A broken config must not stop `init` from writing a fresh one, so
    // logging falls back to defaults and the command reports the error.
    let log_config = ConfigLoader::load()
        .map(|config| LogConfig::from(&config.logging))
        .unwrap_or_default();
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => Some(logger),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };
    if let Some(dir) = &log_config.log_dir {
        if let Err(e) = cleanup_old_logs(dir, log_config.retention_days).await {
            tracing::warn!(error = %e, "log retention cleanup failed");
        }
    }

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, cli.json).await,
        Commands::Request(args) => commands::request::execute(args, cli.json).await,
        Commands::Runs(args) => commands::runs::execute(args, cli.json).await,
        Commands::Approvals(args) => commands::approvals::execute(args, cli.json).await,
        Commands::Tools(args) => commands::tools::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
