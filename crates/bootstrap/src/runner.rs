//! The bootstrap runner.
//!
//! Drives a node from `Unprovisioned` to `Running` step by step: install,
//! genesis fetch, identity derivation, enrollment, process start. Every
//! step is idempotent — it checks for its output artifact before doing
//! work — so an interrupted bootstrap resumes instead of redoing or
//! duplicating anything. The enrollment nonce is persisted before first
//! use, so retried runs re-submit the same nonce and the coordinator
//! deduplicates them.

use std::path::Path;

use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use genpool_client::PoolClient;
use genpool_types::{
    EnrollmentRequest, EnrollmentState, NodeEndpoint, NodeIdentity, Role, SequenceName,
};

use crate::{
    config::BootstrapConfig,
    error::{BootstrapError, IoSnafu, Result},
    state::{BootstrapPaths, BootstrapState},
};

/// Persisted record of an enrollment attempt.
///
/// Written before the first submission so a crash between submit and
/// confirmation cannot lose the nonce and enroll the node twice.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct EnrollmentReceipt {
    /// Exactly-once key for this node's enrollment.
    nonce: String,
    /// Alias the nonce was issued for.
    alias: String,
    /// Bundle version the enrollment confirmed at, once known.
    confirmed_version: Option<u64>,
}

impl EnrollmentReceipt {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(IoSnafu { path: path.display().to_string() })?;
        serde_json::from_str(&content).map_err(|e| BootstrapError::Artifact {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| BootstrapError::Artifact {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        write_atomic(path, &json)
    }
}

/// Drives one node through bootstrap against a coordinator.
pub struct NodeBootstrapper {
    config: BootstrapConfig,
    paths: BootstrapPaths,
    client: PoolClient,
    token: CancellationToken,
}

impl NodeBootstrapper {
    /// Create a bootstrapper for `config`.
    #[must_use]
    pub fn new(config: BootstrapConfig) -> Self {
        let paths = BootstrapPaths::new(&config.data_dir);
        let client = PoolClient::new(&config.server_url);
        Self { config, paths, client, token: CancellationToken::new() }
    }

    /// Use `token` for cancellation at state boundaries.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Artifact paths this bootstrapper works with.
    #[must_use]
    pub fn paths(&self) -> &BootstrapPaths {
        &self.paths
    }

    /// Run bootstrap to completion.
    ///
    /// Returns the terminal state reached: `Running` when a run command is
    /// configured, `Registered` otherwise.
    pub async fn run(&self) -> Result<BootstrapState> {
        std::fs::create_dir_all(&self.paths.data_dir)
            .context(IoSnafu { path: self.paths.data_dir.display().to_string() })?;

        let resumed_from = self.paths.detect();
        tracing::info!(
            alias = %self.config.alias,
            server = %self.config.server_url,
            state = %resumed_from,
            "starting bootstrap"
        );

        self.checkpoint()?;
        self.install().await?;
        self.checkpoint()?;
        self.fetch_genesis().await?;
        self.checkpoint()?;
        let identity = self.derive_identity()?;
        self.checkpoint()?;
        self.register(&identity).await?;
        self.checkpoint()?;
        let state = self.start_node().await?;

        tracing::info!(alias = %self.config.alias, state = %state, "bootstrap complete");
        Ok(state)
    }

    /// Run the install command unless the marker says it already ran.
    async fn install(&self) -> Result<()> {
        if self.paths.install_marker.exists() {
            tracing::debug!("install marker present, skipping install");
            return Ok(());
        }
        let Some(command) = &self.config.install_command else {
            // No install step configured; mark it done so detect() moves on.
            return write_atomic(&self.paths.install_marker, "");
        };

        tracing::info!(command = %command, "running install command");
        let code = run_shell(command).await?;
        if code != 0 {
            return Err(BootstrapError::Install { command: command.clone(), code });
        }
        write_atomic(&self.paths.install_marker, "")
    }

    /// Fetch both genesis bundles, skipping files already on disk.
    async fn fetch_genesis(&self) -> Result<()> {
        for sequence in SequenceName::ALL {
            let target = self.paths.genesis(sequence);
            if std::fs::metadata(&target).map(|m| m.len() > 0).unwrap_or(false) {
                tracing::debug!(sequence = %sequence, path = %target.display(), "genesis file present, skipping fetch");
                continue;
            }

            let snapshot = self
                .client
                .fetch_genesis(sequence)
                .await
                .map_err(|source| BootstrapError::Fetch { source })?;
            write_atomic(&target, &snapshot.to_text())?;
            tracing::info!(
                sequence = %sequence,
                version = snapshot.version,
                records = snapshot.len(),
                path = %target.display(),
                "genesis bundle persisted"
            );
        }
        Ok(())
    }

    /// Load or generate the node identity.
    fn derive_identity(&self) -> Result<NodeIdentity> {
        let endpoint = NodeEndpoint {
            host: self.config.host.clone(),
            client_port: self.config.client_port,
            node_port: self.config.node_port,
        };
        NodeIdentity::load_or_generate(&self.paths.identity, &self.config.alias, endpoint)
            .map_err(|source| BootstrapError::Identity { source })
    }

    /// Enroll the node, reusing a persisted nonce across runs.
    async fn register(&self, identity: &NodeIdentity) -> Result<()> {
        let receipt = if self.paths.receipt.exists() {
            let receipt = EnrollmentReceipt::load(&self.paths.receipt)?;
            if receipt.alias != self.config.alias {
                return Err(BootstrapError::Artifact {
                    path: self.paths.receipt.display().to_string(),
                    message: format!(
                        "receipt is for alias {:?}, bootstrap requested {:?}",
                        receipt.alias, self.config.alias
                    ),
                });
            }
            receipt
        } else {
            let receipt = EnrollmentReceipt {
                nonce: uuid::Uuid::new_v4().to_string(),
                alias: self.config.alias.clone(),
                confirmed_version: None,
            };
            receipt.save(&self.paths.receipt)?;
            receipt
        };

        if let Some(version) = receipt.confirmed_version {
            tracing::info!(nonce = %receipt.nonce, version = version, "enrollment already confirmed, skipping");
            return Ok(());
        }

        let request = EnrollmentRequest {
            requesting_alias: self.config.sponsor_alias.clone(),
            requesting_role: self.config.sponsor_role,
            node_alias: identity.alias.clone(),
            verkey: identity.verkey.clone(),
            endpoint: identity.endpoint.clone(),
            role: Role::Validator,
            nonce: receipt.nonce.clone(),
        };

        let status = self
            .client
            .submit_enrollment(&request)
            .await
            .map_err(|source| BootstrapError::Register { source })?;

        let status = if status.state.is_terminal() {
            status
        } else {
            self.client
                .wait_for_enrollment(
                    &receipt.nonce,
                    self.config.register_timeout(),
                    self.config.poll_interval(),
                )
                .await
                .map_err(|source| BootstrapError::Register { source })?
        };

        match status.state {
            EnrollmentState::Confirmed => {
                let confirmed = EnrollmentReceipt {
                    confirmed_version: status.version,
                    ..receipt
                };
                confirmed.save(&self.paths.receipt)?;
                tracing::info!(
                    nonce = %confirmed.nonce,
                    sequence = ?status.sequence,
                    version = ?status.version,
                    "enrollment confirmed"
                );
                // Best effort: the coordinator keeps the record if this fails.
                if let Err(e) = self.client.acknowledge_enrollment(&confirmed.nonce).await {
                    tracing::debug!(error = %e, "failed to acknowledge enrollment");
                }
                Ok(())
            },
            _ => Err(BootstrapError::RegisterDenied {
                nonce: receipt.nonce,
                reason: status.last_error.unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }

    /// Start the node process, if one is configured.
    async fn start_node(&self) -> Result<BootstrapState> {
        let Some(template) = &self.config.run_command else {
            return Ok(BootstrapState::Registered);
        };

        let command = substitute(template, &self.config, &self.paths);
        tracing::info!(command = %command, "starting node process");
        let code = run_shell(&command).await?;
        if code != 0 {
            return Err(BootstrapError::Process { command, code });
        }
        Ok(BootstrapState::Running)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            tracing::warn!(alias = %self.config.alias, "bootstrap cancelled at state boundary");
            return Err(BootstrapError::Cancelled);
        }
        Ok(())
    }
}

/// Substitute the run-command placeholders.
fn substitute(template: &str, config: &BootstrapConfig, paths: &BootstrapPaths) -> String {
    template
        .replace("{alias}", &config.alias)
        .replace("{node_port}", &config.node_port.to_string())
        .replace("{client_port}", &config.client_port.to_string())
        .replace("{genesis_dir}", &paths.data_dir.display().to_string())
}

/// Run a command through the shell and return its exit code.
async fn run_shell(command: &str) -> Result<i32> {
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .context(IoSnafu { path: command.to_string() })?;
    Ok(status.code().unwrap_or(-1))
}

/// Write `content` to `path` via a temp file and rename, so readers and
/// re-runs never observe a half-written artifact.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).context(IoSnafu { path: tmp.display().to_string() })?;
    std::fs::rename(&tmp, path).context(IoSnafu { path: path.display().to_string() })?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_substitute_fills_all_placeholders() {
        let config = BootstrapConfig::for_test(
            "http://127.0.0.1:8000",
            PathBuf::from("/data/node5"),
            "Node5",
        );
        let paths = BootstrapPaths::new(&config.data_dir);
        let command = substitute(
            "start_node --name {alias} --ports {node_port},{client_port} --genesis {genesis_dir}",
            &config,
            &paths,
        );
        assert_eq!(command, "start_node --name Node5 --ports 9701,9702 --genesis /data/node5");
    }

    #[test]
    fn test_receipt_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollment.json");

        let receipt = EnrollmentReceipt {
            nonce: "n1".to_string(),
            alias: "Node5".to_string(),
            confirmed_version: None,
        };
        receipt.save(&path).unwrap();

        let loaded = EnrollmentReceipt::load(&path).unwrap();
        assert_eq!(loaded.nonce, "n1");
        assert!(loaded.confirmed_version.is_none());

        EnrollmentReceipt { confirmed_version: Some(2), ..loaded }.save(&path).unwrap();
        assert_eq!(EnrollmentReceipt::load(&path).unwrap().confirmed_version, Some(2));
    }

    #[test]
    fn test_corrupt_receipt_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollment.json");
        std::fs::write(&path, "not json").unwrap();
        let err = EnrollmentReceipt::load(&path).unwrap_err();
        assert!(matches!(err, BootstrapError::Artifact { .. }));
    }

    #[tokio::test]
    async fn test_run_shell_reports_exit_code() {
        assert_eq!(run_shell("exit 0").await.unwrap(), 0);
        assert_eq!(run_shell("exit 3").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_at_first_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let config = BootstrapConfig::for_test(
            "http://127.0.0.1:1",
            dir.path().to_path_buf(),
            "Node5",
        );
        let token = CancellationToken::new();
        token.cancel();

        let bootstrapper = NodeBootstrapper::new(config).with_cancellation(token);
        let err = bootstrapper.run().await.unwrap_err();
        assert!(matches!(err, BootstrapError::Cancelled));
        // Nothing was done.
        assert!(!bootstrapper.paths().install_marker.exists());
    }
}
