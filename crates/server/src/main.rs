//! Genpool coordinator binary.
//!
//! Serves the genesis bundles on the distribution listener and the
//! enrollment write path on the admin listener.
//!
//! # Usage
//!
//! ```bash
//! # Serve bundles from /var/lib/genpool
//! genpool-server --data /var/lib/genpool
//!
//! # With environment variables
//! GENPOOL__DATA_DIR=/var/lib/genpool \
//! GENPOOL__LISTEN_ADDR=0.0.0.0:8000 \
//! genpool-server
//! ```

mod config;
mod coordinator;
mod routes;
mod shutdown;

use std::{io::IsTerminal, net::SocketAddr, sync::Arc};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, LogFormat};
use coordinator::EnrollmentCoordinator;
use genpool_store::GenesisStore;
use genpool_types::SequenceName;
use shutdown::ShutdownCoordinator;

/// Genesis distribution and node enrollment coordinator.
#[derive(Debug, Parser)]
#[command(name = "genpool-server", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "GENPOOL_CONFIG")]
    config: Option<String>,

    /// Distribution listen address, overriding the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Admin (enrollment) listen address, overriding the config file.
    #[arg(long)]
    admin_listen: Option<SocketAddr>,

    /// Data directory, overriding the config file.
    #[arg(long)]
    data: Option<std::path::PathBuf>,

    /// Log output format, overriding the config file.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Debug)]
enum ServerError {
    Config(config::ConfigError),
    Store(genpool_types::PoolError),
    Serve(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Config(e) => write!(f, "configuration error: {e}"),
            ServerError::Store(e) => write!(f, "store error: {e}"),
            ServerError::Serve(e) => write!(f, "serve error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(ServerError::Config)?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(admin) = cli.admin_listen {
        config.admin_addr = admin;
    }
    if let Some(data) = cli.data {
        config.data_dir = data;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    init_logging(config.log_format);

    let store = Arc::new(GenesisStore::open(&config.data_dir).map_err(ServerError::Store)?);
    for sequence in SequenceName::ALL {
        let snapshot = store.snapshot(sequence);
        tracing::info!(
            sequence = %sequence,
            version = snapshot.version,
            records = snapshot.len(),
            "loaded genesis sequence"
        );
    }

    let coordinator = Arc::new(EnrollmentCoordinator::new(
        Arc::clone(&store),
        config.enrollment.max_append_attempts,
    ));

    let shutdown = Arc::new(ShutdownCoordinator::new());

    let distribution = routes::distribution_router(Arc::clone(&store));
    let distribution_listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .map_err(ServerError::Serve)?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        "distribution endpoints ready"
    );

    // The admin listener carries the full surface: enrollment plus the
    // bundle reads a probe needs to confirm its own write.
    let enrollment = routes::enrollment_router(coordinator)
        .merge(routes::distribution_router(Arc::clone(&store)));
    let enrollment_listener =
        tokio::net::TcpListener::bind(config.admin_addr).await.map_err(ServerError::Serve)?;
    tracing::info!(admin_addr = %config.admin_addr, "enrollment endpoints ready");

    let mut distribution_shutdown = shutdown.subscribe();
    let distribution_task = tokio::spawn(async move {
        axum::serve(distribution_listener, distribution)
            .with_graceful_shutdown(async move {
                let _ = distribution_shutdown.recv().await;
            })
            .await
    });

    let mut enrollment_shutdown = shutdown.subscribe();
    let enrollment_task = tokio::spawn(async move {
        axum::serve(enrollment_listener, enrollment)
            .with_graceful_shutdown(async move {
                let _ = enrollment_shutdown.recv().await;
            })
            .await
    });

    shutdown.wait_for_signal().await;

    for (name, task) in [("distribution", distribution_task), ("enrollment", enrollment_task)] {
        match task.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => return Err(ServerError::Serve(e)),
            Err(e) => {
                tracing::warn!(listener = name, error = %e, "listener task panicked during shutdown");
            },
        }
    }

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Initializes the logging system.
///
/// `Auto` picks JSON when stdout is not a terminal, so container logs are
/// machine-parseable without configuration.
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    }
}
