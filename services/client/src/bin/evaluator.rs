//! services/client/src/bin/evaluator.rs

use std::process::ExitCode;

use clap::Parser;
use client_lib::{
    cli::{App, Cli},
    config::{self, Config, ConfigError},
    error::CliError,
};
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let mut config = Config::from_env()?;
    if let Some(raw) = &cli.api_url {
        config.api_url = config::parse_base_url(raw)
            .map_err(|e| ConfigError::InvalidValue("--api-url".to_string(), e))?;
    }
    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    debug!(api_url = %config.api_url, "Configuration loaded");

    // --- 2. Wire Adapters & Run ---
    let app = App::connect(config).await?;
    app.run(cli.command).await
}
