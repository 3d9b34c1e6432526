//! Unified error taxonomy for pool coordination.
//!
//! Every error maps to an [`ErrorKind`] that the coordinating layers use to
//! decide retry vs. abort. The decision is always made on kind, never on
//! message text:
//!
//! - **Transient** — retried with bounded exponential backoff.
//! - **Validation** — surfaced immediately with field/sequence context.
//! - **Authorization** — terminal denial, never retried.
//! - **Fatal** — operator intervention required (e.g. node process exit).

use snafu::Snafu;

use crate::{enrollment::Role, record::SequenceName};

/// Unified result type for pool operations.
pub type Result<T, E = PoolError> = std::result::Result<T, E>;

/// Coarse error classification driving retry/abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// May succeed on a subsequent attempt; retried with backoff.
    Transient,
    /// Malformed input or state; never retried automatically.
    Validation,
    /// The requesting identity lacks rights; terminal denial.
    Authorization,
    /// Unrecoverable without operator intervention.
    Fatal,
}

impl ErrorKind {
    /// Whether errors of this kind may be retried automatically.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Top-level error type for pool coordination.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PoolError {
    /// Optimistic-concurrency conflict: the caller's expected base version no
    /// longer matches the store. The caller must re-read and retry.
    #[snafu(display(
        "version conflict on {sequence} sequence: expected {expected}, current {current}"
    ))]
    Conflict {
        /// The sequence the append targeted.
        sequence: SequenceName,
        /// The version the caller expected.
        expected: u64,
        /// The version actually current.
        current: u64,
    },

    /// A field failed structural validation.
    #[snafu(display("validation failed for {field}: {message}"))]
    Validation {
        /// The field that failed.
        field: String,
        /// Description of the violated constraint.
        message: String,
    },

    /// A genesis sequence contained zero records where consumers require at
    /// least one.
    #[snafu(display("{sequence} genesis sequence is empty"))]
    EmptyBundle {
        /// The empty sequence.
        sequence: SequenceName,
    },

    /// The requesting identity is not authorized to grant the requested role.
    #[snafu(display(
        "{requester} ({requester_role}) is not authorized to enroll a {requested}"
    ))]
    Authorization {
        /// Alias of the requesting identity.
        requester: String,
        /// Role held by the requesting identity.
        requester_role: Role,
        /// Role that was requested.
        requested: Role,
    },

    /// A node identity already exists on disk under a different alias.
    /// Re-deriving must never silently overwrite a prior enrollment identity.
    #[snafu(display(
        "identity at {path} has alias {existing:?}, requested {requested:?}"
    ))]
    IdentityConflict {
        /// Path of the persisted identity.
        path: String,
        /// Alias stored on disk.
        existing: String,
        /// Alias requested by the caller.
        requested: String,
    },

    /// Filesystem I/O error.
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        /// The path involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failure.
    #[snafu(display("serialization error: {message}"))]
    Serialization {
        /// Error description.
        message: String,
    },
}

impl PoolError {
    /// Returns the classification used for retry/abort decisions.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict { .. } | Self::Io { .. } => ErrorKind::Transient,
            Self::Validation { .. } | Self::EmptyBundle { .. } | Self::IdentityConflict { .. } => {
                ErrorKind::Validation
            },
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::Serialization { .. } => ErrorKind::Fatal,
        }
    }

    /// Whether this error may be retried automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
