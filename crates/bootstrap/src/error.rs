//! Bootstrap error types and exit-code mapping.
//!
//! The binary maps every failure to a sysexits-style code so supervisors
//! can tell a retryable bootstrap from a dead one: `EX_TEMPFAIL` (75) means
//! run it again later, `EX_SOFTWARE` (70) means operator attention.

use snafu::Snafu;

use genpool_client::ClientError;
use genpool_types::PoolError;

/// Exit code for transient failures (sysexits `EX_TEMPFAIL`).
pub const EXIT_TEMPFAIL: u8 = 75;
/// Exit code for fatal failures (sysexits `EX_SOFTWARE`).
pub const EXIT_SOFTWARE: u8 = 70;

/// Result type alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Errors from the node bootstrap state machine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BootstrapError {
    /// The install command exited nonzero.
    #[snafu(display("install command {command:?} exited with code {code}"))]
    Install {
        /// The command that was run.
        command: String,
        /// Its exit code.
        code: i32,
    },

    /// Fetching a genesis bundle failed after retries.
    #[snafu(display("genesis fetch failed: {source}"))]
    Fetch {
        /// The underlying client error.
        source: ClientError,
    },

    /// Identity derivation or persistence failed.
    #[snafu(display("node identity failure: {source}"))]
    Identity {
        /// The underlying pool error.
        source: PoolError,
    },

    /// Enrollment submission or polling failed at the transport level.
    #[snafu(display("enrollment failed: {source}"))]
    Register {
        /// The underlying client error.
        source: ClientError,
    },

    /// The coordinator recorded the enrollment as failed.
    #[snafu(display("enrollment {nonce} was rejected: {reason}"))]
    RegisterDenied {
        /// Nonce of the rejected enrollment.
        nonce: String,
        /// The coordinator's recorded failure cause.
        reason: String,
    },

    /// The node process exited nonzero.
    #[snafu(display("node process {command:?} exited with code {code}"))]
    Process {
        /// The command that was run.
        command: String,
        /// Its exit code.
        code: i32,
    },

    /// Local filesystem failure.
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        /// The path involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A persisted artifact could not be decoded.
    #[snafu(display("corrupt bootstrap artifact at {path}: {message}"))]
    Artifact {
        /// The path involved.
        path: String,
        /// Decode failure description.
        message: String,
    },

    /// Bootstrap was cancelled at a state boundary.
    #[snafu(display("bootstrap cancelled"))]
    Cancelled,
}

impl BootstrapError {
    /// Whether a re-run may succeed without operator intervention.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { source } | Self::Register { source } => {
                // Exhausted transient retries are still transient from the
                // supervisor's point of view.
                matches!(source, ClientError::RetryExhausted { .. } | ClientError::Timeout { .. })
                    || source.is_retryable()
            },
            Self::Io { .. } | Self::Cancelled => true,
            Self::Install { .. }
            | Self::Identity { .. }
            | Self::RegisterDenied { .. }
            | Self::Process { .. }
            | Self::Artifact { .. } => false,
        }
    }

    /// The process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.is_retryable() { EXIT_TEMPFAIL } else { EXIT_SOFTWARE }
    }
}
