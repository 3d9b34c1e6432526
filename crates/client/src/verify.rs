//! End-to-end write-path verification probe.
//!
//! Confirms that a coordinator accepts writes and publishes them through
//! the genesis endpoints by enrolling a throwaway steward identity and
//! polling the domain bundle until its nonce becomes visible.

use std::time::{Duration, Instant};

use uuid::Uuid;

use genpool_types::{EnrollmentRequest, NodeEndpoint, NodeIdentity, Role, SequenceName};

use crate::{
    client::PoolClient,
    error::{ClientError, Result},
};

/// Outcome of a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// The probe record became visible in the domain bundle.
    Confirmed {
        /// Read attempts performed, including the successful one.
        attempts: u32,
        /// Bundle version the probe record first appeared in.
        version: u64,
    },
    /// The probe was submitted but never became visible within budget.
    Timeout {
        /// Read attempts performed before giving up.
        attempts: u32,
    },
}

/// Write-then-read probe against a coordinator.
///
/// Submits a trustee-sponsored steward enrollment under a `probe-` aliased
/// nonce, then reads the domain bundle back until the nonce appears. A
/// confirmed probe proves the whole path: validation, authorization,
/// append, and publication.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    client: PoolClient,
    sponsor_alias: String,
    max_attempts: u32,
    interval: Duration,
}

impl VerificationClient {
    /// Probe the coordinator behind `client`, sponsoring as `Trustee1`.
    #[must_use]
    pub fn new(client: PoolClient) -> Self {
        Self {
            client,
            sponsor_alias: "Trustee1".to_string(),
            max_attempts: 10,
            interval: Duration::from_millis(500),
        }
    }

    /// Override the read-back budget.
    #[must_use]
    pub fn with_budget(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.interval = interval;
        self
    }

    /// Override the sponsoring trustee alias.
    #[must_use]
    pub fn with_sponsor(mut self, alias: impl Into<String>) -> Self {
        self.sponsor_alias = alias.into();
        self
    }

    /// Run the probe.
    ///
    /// Read failures, including exhausted inner retries against an
    /// unreachable coordinator, count against the attempt budget rather
    /// than aborting the probe.
    ///
    /// # Errors
    ///
    /// Propagates submission failures and non-retryable read failures;
    /// exhausting the read budget is not an error but
    /// [`VerificationResult::Timeout`].
    pub async fn verify(&self) -> Result<VerificationResult> {
        let nonce = format!("probe-{}", Uuid::new_v4());
        let alias = format!("probe-{}", &nonce[6..14]);
        let identity = NodeIdentity::generate(
            alias.clone(),
            NodeEndpoint { host: "127.0.0.1".to_string(), client_port: 0, node_port: 0 },
        );

        let request = EnrollmentRequest {
            requesting_alias: self.sponsor_alias.clone(),
            requesting_role: Role::Trustee,
            node_alias: alias,
            verkey: identity.verkey.clone(),
            endpoint: identity.endpoint.clone(),
            role: Role::Steward,
            nonce: nonce.clone(),
        };

        let started = Instant::now();
        let status = self.client.submit_enrollment(&request).await?;
        tracing::info!(nonce = %nonce, state = ?status.state, "probe enrollment submitted");

        let mut attempts = 0u32;
        while attempts < self.max_attempts {
            attempts += 1;
            match self.client.fetch_genesis(SequenceName::Domain).await {
                Ok(snapshot) => {
                    if let Some(version) = snapshot
                        .records
                        .iter()
                        .any(|r| r.as_str().contains(&nonce))
                        .then_some(snapshot.version)
                    {
                        tracing::info!(
                            nonce = %nonce,
                            version = version,
                            attempts = attempts,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "probe record visible"
                        );
                        return Ok(VerificationResult::Confirmed { attempts, version });
                    }
                },
                Err(e)
                    if e.is_retryable()
                        || matches!(e, ClientError::RetryExhausted { .. }) =>
                {
                    tracing::debug!(attempt = attempts, error = %e, "probe read failed, will retry");
                },
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.interval).await;
        }

        tracing::warn!(nonce = %nonce, attempts = attempts, "probe never became visible");
        Ok(VerificationResult::Timeout { attempts })
    }
}
