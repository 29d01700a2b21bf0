mod cli;
mod completions;
mod config;
mod daemon;
mod error;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::FileConfig;
use parley_core::RelayConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error::handle_error(err);
    }
}

async fn run() -> Result<()> {
    // .env only fills variables that are not already set
    let dotenv_path = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        completions::generate_completions(shell);
        return Ok(());
    }

    let file_config = FileConfig::load(cli.config.as_deref())?;
    let log_dir = cli.log_dir.clone().or(file_config.logging.dir.clone());
    let _guard = init_logging(cli.verbose, log_dir.as_deref())?;

    if let Some(path) = dotenv_path {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let settings = cli.relay.to_settings().or(file_config.relay);
    let config = RelayConfig::resolve(settings)?;
    tracing::debug!("Resolved configuration: {:?}", config);

    match cli.command {
        Some(Commands::Check) => daemon::check(config).await,
        Some(Commands::Run) | None => daemon::run(config).await,
        Some(Commands::Completions { .. }) => Ok(()),
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "parley.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_level(true)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}
