//! Bootstrap configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Bootstrap configuration.
///
/// Loaded from a TOML file with `GENPOOL_BOOTSTRAP__`-prefixed environment
/// overrides; the CLI overrides both.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Base URL of the coordinator (serves `/init`, `/domain`, `/enroll`).
    pub server_url: String,
    /// Local data directory for genesis files, identity, and markers.
    pub data_dir: PathBuf,
    /// Alias this node enrolls under.
    pub alias: String,
    /// Host other nodes reach this node at.
    pub host: String,
    /// Inter-node port.
    #[serde(default = "default_node_port")]
    pub node_port: u16,
    /// Client-facing port.
    #[serde(default = "default_client_port")]
    pub client_port: u16,
    /// Alias of the sponsoring identity.
    #[serde(default = "default_sponsor_alias")]
    pub sponsor_alias: String,
    /// Role the sponsor holds.
    #[serde(default = "default_sponsor_role")]
    pub sponsor_role: genpool_types::Role,
    /// Command installing the node software; skipped when unset or when the
    /// install marker already exists.
    #[serde(default)]
    pub install_command: Option<String>,
    /// Command starting the node process. `{alias}`, `{node_port}`,
    /// `{client_port}` and `{genesis_dir}` are substituted. When unset,
    /// bootstrap stops after registration.
    #[serde(default)]
    pub run_command: Option<String>,
    /// How long to wait for the enrollment to reach a terminal state.
    #[serde(default = "default_register_timeout_secs")]
    pub register_timeout_secs: u64,
    /// Interval between enrollment status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_node_port() -> u16 {
    9701
}

fn default_client_port() -> u16 {
    9702
}

fn default_sponsor_alias() -> String {
    "Steward1".to_string()
}

fn default_sponsor_role() -> genpool_types::Role {
    genpool_types::Role::Steward
}

fn default_register_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl BootstrapConfig {
    /// Load configuration from a file.
    ///
    /// Environment variables override config values using the
    /// `GENPOOL_BOOTSTRAP__` prefix (e.g.
    /// `GENPOOL_BOOTSTRAP__SERVER_URL=http://10.0.0.1:8000`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = if let Some(path) = path {
            builder.add_source(config::File::with_name(path))
        } else {
            builder.add_source(config::File::with_name("genpool-bootstrap").required(false))
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("GENPOOL_BOOTSTRAP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(|e| ConfigError::Load(e.to_string()))?;
        config.try_deserialize().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Registration poll budget as a `Duration`.
    #[must_use]
    pub fn register_timeout(&self) -> Duration {
        Duration::from_secs(self.register_timeout_secs)
    }

    /// Registration poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Create a configuration for testing.
    #[allow(clippy::unwrap_used, dead_code)]
    pub fn for_test(server_url: impl Into<String>, data_dir: PathBuf, alias: &str) -> Self {
        Self {
            server_url: server_url.into(),
            data_dir,
            alias: alias.to_string(),
            host: "127.0.0.1".to_string(),
            node_port: default_node_port(),
            client_port: default_client_port(),
            sponsor_alias: default_sponsor_alias(),
            sponsor_role: default_sponsor_role(),
            install_command: None,
            run_command: None,
            register_timeout_secs: 5,
            poll_interval_ms: 10,
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration.
    Load(String),
    /// Failed to parse configuration.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "failed to load config: {msg}"),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
