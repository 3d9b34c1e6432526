//! HTTP client for the genesis distribution and enrollment endpoints.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use snafu::ResultExt;

use genpool_types::{EnrollmentRequest, EnrollmentStatus, GenesisSnapshot, SequenceName};

use crate::{
    VERSION_HEADER,
    error::{ClientError, DecodeSnafu, HttpSnafu, IntegritySnafu, Result},
    retry::{RetryPolicy, with_retry},
};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a genesis pool coordinator.
///
/// Fetches genesis bundles and drives enrollment against a single
/// coordinator base URL. All operations are retried on transient
/// failures according to the configured [`RetryPolicy`]; enrollment
/// submission is safe to retry because the server deduplicates by nonce.
#[derive(Debug, Clone)]
pub struct PoolClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl PoolClient {
    /// Create a client for the given base URL (e.g. `http://10.0.0.1:8000`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, base_url, retry: RetryPolicy::default() }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current genesis bundle for a sequence.
    ///
    /// Returns the parsed snapshot, carrying the version the server
    /// advertised in the `x-genesis-version` header. An empty or
    /// truncated body is an integrity failure and is not retried.
    pub async fn fetch_genesis(&self, sequence: SequenceName) -> Result<GenesisSnapshot> {
        let endpoint = sequence.endpoint();
        with_retry(&self.retry, || async {
            let url = format!("{}{endpoint}", self.base_url);
            let resp =
                self.http.get(&url).send().await.context(HttpSnafu { endpoint })?;

            let status = resp.status();
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ClientError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }

            let version = resp
                .headers()
                .get(VERSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or(ClientError::MissingVersion { endpoint: endpoint.to_string() })?;

            let body = resp.text().await.context(HttpSnafu { endpoint })?;
            let snapshot =
                GenesisSnapshot::parse(sequence, version, &body).context(IntegritySnafu)?;

            tracing::debug!(
                sequence = %sequence,
                version = snapshot.version,
                records = snapshot.len(),
                "fetched genesis bundle"
            );
            Ok(snapshot)
        })
        .await
    }

    /// Submit an enrollment request.
    ///
    /// Idempotent: resubmitting with the same nonce returns the status of
    /// the original enrollment without appending a second record.
    pub async fn submit_enrollment(
        &self,
        request: &EnrollmentRequest,
    ) -> Result<EnrollmentStatus> {
        let endpoint = "/enroll";
        with_retry(&self.retry, || async {
            let url = format!("{}{endpoint}", self.base_url);
            let resp = self
                .http
                .post(&url)
                .json(request)
                .send()
                .await
                .context(HttpSnafu { endpoint })?;

            let status = resp.status();
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ClientError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }

            resp.json::<EnrollmentStatus>().await.map_err(|e| ClientError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })
        })
        .await
    }

    /// Look up the status of an enrollment by nonce.
    ///
    /// Returns `None` when the coordinator has no record of the nonce.
    pub async fn enrollment_status(&self, nonce: &str) -> Result<Option<EnrollmentStatus>> {
        let endpoint = "/enroll";
        with_retry(&self.retry, || async {
            let url = format!("{}{endpoint}/{nonce}", self.base_url);
            let resp =
                self.http.get(&url).send().await.context(HttpSnafu { endpoint })?;

            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ClientError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: EnrollmentStatus =
                resp.json().await.map_err(|e| ClientError::Decode {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })?;
            Ok(Some(parsed))
        })
        .await
    }

    /// Acknowledge a terminal enrollment, releasing its nonce record.
    pub async fn acknowledge_enrollment(&self, nonce: &str) -> Result<()> {
        let endpoint = "/enroll";
        with_retry(&self.retry, || async {
            let url = format!("{}{endpoint}/{nonce}", self.base_url);
            let resp =
                self.http.delete(&url).send().await.context(HttpSnafu { endpoint })?;

            let status = resp.status();
            // Acknowledging an unknown nonce is a no-op.
            if status.is_success() || status == StatusCode::NOT_FOUND {
                return Ok(());
            }
            let message = resp.text().await.unwrap_or_default();
            Err(ClientError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            })
        })
        .await
    }

    /// Poll an enrollment until it reaches a terminal state.
    ///
    /// Returns [`ClientError::Timeout`] if the deadline passes first, and
    /// [`ClientError::Decode`] if the coordinator loses track of the nonce
    /// mid-flight.
    pub async fn wait_for_enrollment(
        &self,
        nonce: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<EnrollmentStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.enrollment_status(nonce).await? {
                Some(status) if status.state.is_terminal() => return Ok(status),
                Some(status) => {
                    tracing::debug!(nonce = %nonce, state = ?status.state, "enrollment pending");
                },
                None => {
                    return DecodeSnafu {
                        endpoint: format!("/enroll/{nonce}"),
                        message: "enrollment disappeared before reaching a terminal state",
                    }
                    .fail();
                },
            }

            if Instant::now() >= deadline {
                return Err(ClientError::Timeout {
                    operation: format!("enrollment {nonce}"),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
