mod args;
mod commands;

use anyhow::Context;
use args::{Cli, Commands};
use clap::Parser;
use palbot::{clienv, AdminConfig};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    dotenvy::from_path(clienv::dotenv_path()).ok();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        return commands::completions::cmd_completions(shell);
    }

    let config_path = cli.config.clone().unwrap_or_else(clienv::config_path);
    let config = AdminConfig::load(&config_path)?;

    let log_file = match cli.command {
        Commands::Serve => Some(config.log_path()),
        _ => None,
    };
    init_logging(log_file.as_deref())?;
    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Serve => commands::serve::cmd_serve(config).await?,
        Commands::Send(invocation) => commands::send::cmd_send(&config, invocation).await?,
        Commands::Hook { command, args } => commands::send::cmd_hook(&config, &command, &args).await?,
        Commands::Exec(invocation) => commands::exec::cmd_exec(&config, invocation).await?,
        Commands::Ping => commands::send::cmd_ping(&config).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Stderr logging for every subcommand; `serve` also appends to `log_file`.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}
