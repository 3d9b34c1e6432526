//! Server configuration.
//!
//! Provides configuration loading from files and environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (development).
    Text,
    /// JSON structured logging (production).
    Json,
    /// JSON when stdout is not a terminal, text otherwise.
    Auto,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Auto
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address serving the genesis bundles (`/init`, `/domain`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Address serving the enrollment write endpoints, kept off the
    /// distribution listener so bundle reads stay reachable even when
    /// writes are firewalled off.
    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,
    /// Directory holding the genesis sequence files.
    pub data_dir: PathBuf,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Enrollment coordinator tuning.
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

/// Enrollment coordinator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentConfig {
    /// Append attempts per enrollment before it is marked failed.
    /// Each attempt re-reads the current bundle version.
    #[serde(default = "default_max_append_attempts")]
    pub max_append_attempts: u32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self { max_append_attempts: default_max_append_attempts() }
    }
}

fn default_max_append_attempts() -> u32 {
    5
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_admin_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8001))
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Supports TOML format. Environment variables override config values
    /// using the `GENPOOL__` prefix with `__` separating nested fields
    /// (e.g. `GENPOOL__ENROLLMENT__MAX_APPEND_ATTEMPTS=3`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = if let Some(path) = path {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
                .add_source(config::File::with_name("genpool").required(false))
                .add_source(config::File::with_name("/etc/genpool/config").required(false))
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("GENPOOL").separator("__").try_parsing(true),
        );

        let config = builder.build().map_err(|e| ConfigError::Load(e.to_string()))?;

        config.try_deserialize().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a configuration for testing.
    #[allow(clippy::unwrap_used, dead_code)]
    pub fn for_test(port: u16, admin_port: u16, data_dir: PathBuf) -> Self {
        Self {
            listen_addr: format!("127.0.0.1:{port}").parse().unwrap(),
            admin_addr: format!("127.0.0.1:{admin_port}").parse().unwrap(),
            data_dir,
            log_format: LogFormat::Text,
            enrollment: EnrollmentConfig::default(),
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
