//! Bootstrap state machine definition.
//!
//! The state is not persisted as such: each step leaves an artifact on
//! disk (marker file, genesis bundles, identity, enrollment receipt), and
//! a re-run probes artifacts to resume where the last run stopped. This
//! makes interrupted bootstraps resumable without a separate journal that
//! could disagree with the artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use genpool_types::SequenceName;

/// Progress of a node through bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapState {
    /// Nothing done yet.
    Unprovisioned,
    /// Node software installed (install marker present).
    SoftwareInstalled,
    /// Both genesis bundles on disk.
    GenesisFetched,
    /// Node identity derived and persisted.
    IdentityDerived,
    /// Enrollment confirmed by the coordinator.
    Registered,
    /// Node process started.
    Running,
    /// Terminal failure; see the accompanying error.
    Failed,
}

impl BootstrapState {
    /// Whether this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unprovisioned => "unprovisioned",
            Self::SoftwareInstalled => "software-installed",
            Self::GenesisFetched => "genesis-fetched",
            Self::IdentityDerived => "identity-derived",
            Self::Registered => "registered",
            Self::Running => "running",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// On-disk locations of the bootstrap artifacts under a data directory.
#[derive(Debug, Clone)]
pub struct BootstrapPaths {
    /// The data directory itself.
    pub data_dir: PathBuf,
    /// Marker written after a successful install.
    pub install_marker: PathBuf,
    /// Persisted node identity.
    pub identity: PathBuf,
    /// Enrollment receipt holding the nonce (and confirmation, once known).
    pub receipt: PathBuf,
}

impl BootstrapPaths {
    /// Derive artifact paths under `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            install_marker: data_dir.join(".installed"),
            identity: data_dir.join("node_identity"),
            receipt: data_dir.join("enrollment.json"),
            data_dir,
        }
    }

    /// Where a fetched genesis bundle is persisted.
    #[must_use]
    pub fn genesis(&self, sequence: SequenceName) -> PathBuf {
        self.data_dir.join(sequence.genesis_file_name())
    }

    /// Probe artifacts to find where a previous run stopped.
    ///
    /// Only pre-registration progress is derivable from disk alone;
    /// whether the enrollment confirmed lives in the receipt and is
    /// decided by the runner.
    #[must_use]
    pub fn detect(&self) -> BootstrapState {
        if !self.install_marker.exists() {
            return BootstrapState::Unprovisioned;
        }
        let fetched = SequenceName::ALL
            .into_iter()
            .all(|s| non_empty_file(&self.genesis(s)));
        if !fetched {
            return BootstrapState::SoftwareInstalled;
        }
        if !self.identity.exists() {
            return BootstrapState::GenesisFetched;
        }
        BootstrapState::IdentityDerived
    }
}

fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_walks_artifact_chain() {
        let dir = tempfile::tempdir().unwrap();
        let paths = BootstrapPaths::new(dir.path());

        assert_eq!(paths.detect(), BootstrapState::Unprovisioned);

        std::fs::write(&paths.install_marker, "").unwrap();
        assert_eq!(paths.detect(), BootstrapState::SoftwareInstalled);

        std::fs::write(paths.genesis(SequenceName::Pool), "r1\n").unwrap();
        // One bundle is not enough.
        assert_eq!(paths.detect(), BootstrapState::SoftwareInstalled);

        std::fs::write(paths.genesis(SequenceName::Domain), "r2\n").unwrap();
        assert_eq!(paths.detect(), BootstrapState::GenesisFetched);

        std::fs::write(&paths.identity, "{}").unwrap();
        assert_eq!(paths.detect(), BootstrapState::IdentityDerived);
    }

    #[test]
    fn test_empty_genesis_file_does_not_count_as_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let paths = BootstrapPaths::new(dir.path());
        std::fs::write(&paths.install_marker, "").unwrap();
        std::fs::write(paths.genesis(SequenceName::Pool), "").unwrap();
        std::fs::write(paths.genesis(SequenceName::Domain), "r\n").unwrap();
        assert_eq!(paths.detect(), BootstrapState::SoftwareInstalled);
    }

    #[test]
    fn test_state_ordering_and_terminality() {
        assert!(BootstrapState::Unprovisioned < BootstrapState::Registered);
        assert!(BootstrapState::Running.is_terminal());
        assert!(BootstrapState::Failed.is_terminal());
        assert!(!BootstrapState::IdentityDerived.is_terminal());
    }
}
