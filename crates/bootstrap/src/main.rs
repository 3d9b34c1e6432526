//! Node bootstrap binary.
//!
//! # Usage
//!
//! ```bash
//! genpool-bootstrap --server http://10.0.0.1:8000 \
//!     --data /var/lib/node5 --alias Node5 --host 10.0.0.5
//! ```
//!
//! Exit codes follow sysexits: 0 on success, 75 (`EX_TEMPFAIL`) for
//! transient failures a supervisor should retry, 70 (`EX_SOFTWARE`) for
//! failures needing operator attention.

mod config;
mod error;
mod runner;
mod state;

use std::{io::IsTerminal, process::ExitCode};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use config::BootstrapConfig;
use runner::NodeBootstrapper;

/// Bootstrap a validator node against a genpool coordinator.
#[derive(Debug, Parser)]
#[command(name = "genpool-bootstrap", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "GENPOOL_BOOTSTRAP_CONFIG")]
    config: Option<String>,

    /// Coordinator base URL, overriding the config file.
    #[arg(long)]
    server: Option<String>,

    /// Data directory, overriding the config file.
    #[arg(long)]
    data: Option<std::path::PathBuf>,

    /// Node alias, overriding the config file.
    #[arg(long)]
    alias: Option<String>,

    /// Reachable host, overriding the config file.
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let mut config = match BootstrapConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::from(error::EXIT_SOFTWARE);
        },
    };
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(data) = cli.data {
        config.data_dir = data;
    }
    if let Some(alias) = cli.alias {
        config.alias = alias;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling bootstrap");
            signal_token.cancel();
        }
    });

    let bootstrapper = NodeBootstrapper::new(config).with_cancellation(token);
    match bootstrapper.run().await {
        Ok(state) => {
            tracing::info!(state = %state, "bootstrap finished");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(error = %e, retryable = e.is_retryable(), "bootstrap failed");
            ExitCode::from(e.exit_code())
        },
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::io::stdout().is_terminal() {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    }
}
