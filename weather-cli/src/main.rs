//! Binary crate for the `weather` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Mapping empty/ambiguous lookups to user-facing errors
//! - Human-friendly and JSON output formatting

use anyhow::Context;
use clap::Parser;
use weather_core::config::API_KEY_ENV;

mod cli;
mod output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    let (config, key_from_env) = cmd.load_config()?;

    init_logging(cmd.verbose, config.log_level.as_deref())?;
    if key_from_env {
        tracing::debug!("Using OpenWeather API key from {API_KEY_ENV}");
    }

    cmd.run(config).await
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level; default is `warn`.
fn init_logging(verbose: bool, configured: Option<&str>) -> anyhow::Result<()> {
    let fallback = if verbose { "debug" } else { configured.unwrap_or("warn") };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
