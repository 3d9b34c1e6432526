//! Locally derived node identities.
//!
//! A node identity is generated once on the target host at bootstrap time,
//! persisted to local storage, and never transmitted in plaintext except
//! inside a signed enrollment transaction. Central infrastructure never
//! stores it.
//!
//! The load-or-generate discipline mirrors node ID persistence in cluster
//! databases: the first run generates and persists, subsequent runs load the
//! existing identity. Re-deriving never silently overwrites — a differing
//! alias is a hard `IdentityConflict`, because replacing the key pair would
//! invalidate a prior enrollment.

use std::{fmt, path::Path};

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{IoSnafu, PoolError};

/// Network endpoint a node is reachable at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Host name or IP address.
    pub host: String,
    /// Port clients connect to.
    pub client_port: u16,
    /// Port other validator nodes connect to.
    pub node_port: u16,
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.node_port, self.client_port)
    }
}

/// A locally generated node identity: ed25519 key pair, human-readable
/// alias, and network endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Human-readable alias (e.g. `Node5`).
    pub alias: String,
    /// Hex-encoded ed25519 verification key. Safe to publish.
    pub verkey: String,
    /// Hex-encoded 32-byte signing seed. Local only; redacted from logs and
    /// never included in enrollment records.
    seed: String,
    /// Where the node is reachable.
    pub endpoint: NodeEndpoint,
}

impl NodeIdentity {
    /// Generates a fresh identity from OS randomness.
    #[must_use]
    pub fn generate(alias: impl Into<String>, endpoint: NodeEndpoint) -> Self {
        Self::from_seed(alias, endpoint, rand::random::<[u8; 32]>())
    }

    /// Derives an identity deterministically from a 32-byte seed.
    ///
    /// Deterministic seeds are how test and demo fixtures get stable
    /// verkeys; production bootstrap always uses [`NodeIdentity::generate`].
    #[must_use]
    pub fn from_seed(alias: impl Into<String>, endpoint: NodeEndpoint, seed: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&seed);
        Self {
            alias: alias.into(),
            verkey: hex::encode(signing.verifying_key().as_bytes()),
            seed: hex::encode(seed),
            endpoint,
        }
    }

    /// Reads a persisted identity from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Io`] if the file cannot be read and
    /// [`PoolError::Serialization`] if its content is not a valid identity.
    pub fn load(path: &Path) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path)
            .context(IoSnafu { path: path.display().to_string() })?;
        serde_json::from_str(&content).map_err(|e| PoolError::Serialization {
            message: format!("invalid identity file {}: {e}", path.display()),
        })
    }

    /// Persists the identity to `path` atomically (temp file + rename), so a
    /// crash never leaves a half-written identity on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Io`] on any filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), PoolError> {
        let path_str = path.display().to_string();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context(IoSnafu { path: parent.display().to_string() })?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PoolError::Serialization { message: e.to_string() })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).context(IoSnafu { path: tmp.display().to_string() })?;
        std::fs::rename(&tmp, path).context(IoSnafu { path: path_str })?;
        Ok(())
    }

    /// Loads the identity at `path` if present, otherwise generates and
    /// persists a fresh one. Idempotent: a second call with the same alias
    /// returns the stored identity unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::IdentityConflict`] if an identity already exists
    /// under a different alias, plus the I/O and serialization errors of
    /// [`NodeIdentity::load`] / [`NodeIdentity::save`].
    pub fn load_or_generate(
        path: &Path,
        alias: &str,
        endpoint: NodeEndpoint,
    ) -> Result<Self, PoolError> {
        if path.exists() {
            let existing = Self::load(path)?;
            if existing.alias != alias {
                return Err(PoolError::IdentityConflict {
                    path: path.display().to_string(),
                    existing: existing.alias,
                    requested: alias.to_string(),
                });
            }
            tracing::info!(alias = %existing.alias, path = %path.display(), "loaded existing node identity");
            return Ok(existing);
        }
        let identity = Self::generate(alias, endpoint);
        identity.save(path)?;
        tracing::info!(alias = %identity.alias, verkey = %identity.verkey, path = %path.display(), "generated new node identity");
        Ok(identity)
    }

    /// Reconstructs the signing key for enrollment-transaction signing.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Serialization`] if the stored seed is corrupt.
    pub fn signing_key(&self) -> Result<SigningKey, PoolError> {
        let bytes = hex::decode(&self.seed)
            .map_err(|e| PoolError::Serialization { message: format!("bad seed hex: {e}") })?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| PoolError::Serialization {
            message: "seed is not 32 bytes".to_string(),
        })?;
        Ok(SigningKey::from_bytes(&seed))
    }
}

// Manual Debug keeps the seed out of logs and error chains.
impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("alias", &self.alias)
            .field("verkey", &self.verkey)
            .field("seed", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
