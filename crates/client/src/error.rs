//! Client-side error types with retryability classification.
//!
//! Transport failures and service-unavailable responses are transient and
//! retryable; malformed or empty bundles are integrity failures and never
//! retried, because the same bad bundle would come back.

use snafu::Snafu;

use genpool_types::PoolError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the pool HTTP client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, protocol).
    #[snafu(display("transport error calling {endpoint}: {source}"))]
    Http {
        /// Endpoint path being called.
        endpoint: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },

    /// Non-success HTTP status from the server.
    #[snafu(display("{endpoint} returned status {status}: {message}"))]
    Status {
        /// Endpoint path being called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, best effort.
        message: String,
    },

    /// A genesis response was missing or carried an unparseable version header.
    #[snafu(display("{endpoint} response is missing a valid version header"))]
    MissingVersion {
        /// Endpoint path being called.
        endpoint: String,
    },

    /// The fetched bundle body failed integrity checks (empty or truncated).
    /// Non-retryable: a retry would fetch the same bad bundle.
    #[snafu(display("bundle integrity failure: {source}"))]
    Integrity {
        /// The underlying validation error.
        source: PoolError,
    },

    /// Failed to decode a JSON response body.
    #[snafu(display("failed to decode {endpoint} response: {message}"))]
    Decode {
        /// Endpoint path being called.
        endpoint: String,
        /// Decode failure description.
        message: String,
    },

    /// Retry budget exhausted on a transient failure.
    #[snafu(display("retry exhausted after {attempts} attempts: {last_error}"))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message before giving up.
        last_error: String,
    },

    /// A bounded wait expired before the operation reached a terminal state.
    #[snafu(display("{operation} timed out after {seconds}s"))]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// The budget that expired.
        seconds: u64,
    },
}

impl ClientError {
    /// Whether this error may succeed on a subsequent attempt.
    ///
    /// Service-unavailable (503) and throttling (429) responses are
    /// transient by contract; other non-success statuses in the 5xx range
    /// are treated the same. Integrity and decode failures are not retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MissingVersion { .. }
            | Self::Integrity { .. }
            | Self::Decode { .. }
            | Self::RetryExhausted { .. }
            | Self::Timeout { .. } => false,
        }
    }
}
