//! Enrollment coordination.
//!
//! The coordinator owns the write path: it accepts enrollment requests,
//! enforces exactly-once semantics by nonce, serializes appends per
//! sequence, and tracks each enrollment's lifecycle until the operator
//! acknowledges the outcome.
//!
//! Exactly-once discipline: the nonce registry is consulted and updated
//! under one lock, so a duplicate submission either observes the prior
//! terminal status or the in-flight status of the first submission. A
//! nonce never produces a second appended record.

use std::{collections::HashMap, sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use parking_lot::Mutex;

use genpool_store::GenesisStore;
use genpool_types::{
    EnrollmentRequest, EnrollmentStatus, PoolError, Result, SequenceName,
};

/// Delay before the first append retry after a version conflict.
const CONFLICT_BACKOFF_MIN: Duration = Duration::from_millis(10);
/// Upper bound on any single conflict backoff delay.
const CONFLICT_BACKOFF_MAX: Duration = Duration::from_millis(250);

/// Backoff schedule for append version conflicts. `max_attempts` bounds
/// total tries, so the schedule yields one fewer delay.
fn conflict_backoff(max_attempts: u32) -> ExponentialBuilder {
    ExponentialBuilder::new()
        .with_min_delay(CONFLICT_BACKOFF_MIN)
        .with_max_delay(CONFLICT_BACKOFF_MAX)
        .with_max_times(max_attempts.saturating_sub(1) as usize)
}

/// Coordinates enrollment appends against the genesis store.
pub struct EnrollmentCoordinator {
    store: Arc<GenesisStore>,
    /// Append attempts per enrollment before giving up on version conflicts.
    max_append_attempts: u32,
    /// Nonce registry. Entries live until acknowledged.
    registry: Mutex<HashMap<String, EnrollmentStatus>>,
    /// Per-sequence append gates. Appends to one sequence are serialized;
    /// the two sequences proceed independently.
    pool_gate: tokio::sync::Mutex<()>,
    domain_gate: tokio::sync::Mutex<()>,
}

impl EnrollmentCoordinator {
    /// Create a coordinator over `store`.
    #[must_use]
    pub fn new(store: Arc<GenesisStore>, max_append_attempts: u32) -> Self {
        Self {
            store,
            max_append_attempts: max_append_attempts.max(1),
            registry: Mutex::new(HashMap::new()),
            pool_gate: tokio::sync::Mutex::new(()),
            domain_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Submit an enrollment request.
    ///
    /// Submission is asynchronous: an authorized request is registered as
    /// `Pending` and that status is returned immediately, while a spawned
    /// task drives the append to its terminal state. Callers observe the
    /// transition by polling [`status`](Self::status). The task outlives
    /// the submitting request, so a caller that disconnects mid-flight
    /// never strands its nonce.
    ///
    /// A duplicate nonce returns the current status of the original
    /// submission without touching the store. Authorization denial is a
    /// recorded `Failed` outcome, not a transport error, so the denial is
    /// observable under the nonce afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for structurally invalid requests;
    /// those are never registered.
    pub async fn submit(self: Arc<Self>, request: &EnrollmentRequest) -> Result<EnrollmentStatus> {
        request.validate()?;

        // Claim the nonce, or yield the prior result.
        {
            let mut registry = self.registry.lock();
            if let Some(existing) = registry.get(&request.nonce) {
                tracing::info!(
                    nonce = %request.nonce,
                    state = ?existing.state,
                    "duplicate enrollment submission, returning prior status"
                );
                return Ok(existing.clone());
            }
            registry.insert(request.nonce.clone(), EnrollmentStatus::pending(&request.nonce));
        }

        if let Err(denied) = request.authorize() {
            tracing::warn!(
                nonce = %request.nonce,
                requester = %request.requesting_alias,
                requester_role = %request.requesting_role,
                requested = %request.role,
                "enrollment denied"
            );
            let status = EnrollmentStatus::pending(&request.nonce).failed(&denied);
            self.set_status(status.clone());
            return Ok(status);
        }

        let pending = EnrollmentStatus::pending(&request.nonce);
        let request = request.clone();
        tokio::spawn(async move {
            let status = self.drive_append(&request).await;
            self.set_status(status);
        });
        Ok(pending)
    }

    /// Look up the status of an enrollment.
    #[must_use]
    pub fn status(&self, nonce: &str) -> Option<EnrollmentStatus> {
        self.registry.lock().get(nonce).cloned()
    }

    /// Acknowledge a terminal enrollment, releasing its registry entry.
    ///
    /// Returns the released status, or `None` if the nonce is unknown.
    /// Non-terminal enrollments are left in place: acknowledging an
    /// in-flight enrollment would reopen its nonce for reuse.
    pub fn acknowledge(&self, nonce: &str) -> Option<EnrollmentStatus> {
        let mut registry = self.registry.lock();
        match registry.get(nonce) {
            Some(status) if status.state.is_terminal() => registry.remove(nonce),
            Some(status) => {
                tracing::debug!(nonce = %nonce, state = ?status.state, "acknowledge ignored, enrollment still in flight");
                None
            },
            None => None,
        }
    }

    /// Number of unacknowledged enrollments.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.lock().len()
    }

    /// Append the enrollment record under the sequence gate, retrying on
    /// version conflicts with exponential backoff up to the configured
    /// budget.
    async fn drive_append(&self, request: &EnrollmentRequest) -> EnrollmentStatus {
        let sequence = request.target_sequence();
        let record = match request.to_record() {
            Ok(record) => record,
            Err(e) => return EnrollmentStatus::pending(&request.nonce).failed(&e),
        };

        let _gate = match sequence {
            SequenceName::Pool => self.pool_gate.lock().await,
            SequenceName::Domain => self.domain_gate.lock().await,
        };

        self.set_status(EnrollmentStatus::pending(&request.nonce).submitted());

        let append = || async {
            let expected = self.store.version(sequence);
            self.store.append(sequence, record.clone(), expected)
        };

        let result = append
            .retry(conflict_backoff(self.max_append_attempts))
            .sleep(tokio::time::sleep)
            .when(|e: &PoolError| matches!(e, PoolError::Conflict { .. }))
            .notify(|e: &PoolError, delay: Duration| {
                tracing::warn!(
                    nonce = %request.nonce,
                    sequence = %sequence,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "append lost version race, backing off before retry"
                );
            })
            .await;

        match result {
            Ok(version) => {
                tracing::info!(
                    nonce = %request.nonce,
                    node_alias = %request.node_alias,
                    sequence = %sequence,
                    version = version,
                    "enrollment confirmed"
                );
                EnrollmentStatus::pending(&request.nonce)
                    .submitted()
                    .confirmed(sequence, version)
            },
            Err(e @ PoolError::Conflict { .. }) => {
                tracing::warn!(
                    nonce = %request.nonce,
                    sequence = %sequence,
                    attempts = self.max_append_attempts,
                    error = %e,
                    "append attempt budget exhausted on version conflicts"
                );
                EnrollmentStatus::pending(&request.nonce).submitted().failed(&e)
            },
            Err(e) => {
                tracing::error!(
                    nonce = %request.nonce,
                    sequence = %sequence,
                    kind = ?e.kind(),
                    error = %e,
                    "enrollment append failed"
                );
                EnrollmentStatus::pending(&request.nonce).submitted().failed(&e)
            },
        }
    }

    fn set_status(&self, status: EnrollmentStatus) {
        self.registry.lock().insert(status.nonce.clone(), status);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use genpool_test_utils::{TestDir, test_identity, write_genesis_files};
    use genpool_types::{EnrollmentState, Role};

    use super::*;

    fn coordinator() -> (TestDir, Arc<EnrollmentCoordinator>) {
        let dir = TestDir::new();
        write_genesis_files(dir.path(), 4);
        let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
        (dir, Arc::new(EnrollmentCoordinator::new(store, 5)))
    }

    fn enroll_validator(nonce: &str, alias: &str) -> EnrollmentRequest {
        let identity = test_identity(alias);
        EnrollmentRequest {
            requesting_alias: "Steward1".to_string(),
            requesting_role: Role::Steward,
            node_alias: alias.to_string(),
            verkey: identity.verkey,
            endpoint: identity.endpoint,
            role: Role::Validator,
            nonce: nonce.to_string(),
        }
    }

    /// Poll the registry until `nonce` reaches a terminal state.
    async fn wait_terminal(
        coordinator: &Arc<EnrollmentCoordinator>,
        nonce: &str,
    ) -> EnrollmentStatus {
        for _ in 0..1000 {
            if let Some(status) = coordinator.status(nonce) {
                if status.state.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("enrollment {nonce} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_submit_returns_pending_immediately() {
        let (_dir, coordinator) = coordinator();

        let status = Arc::clone(&coordinator)
            .submit(&enroll_validator("n0", "Node5"))
            .await
            .unwrap();
        assert_eq!(status.state, EnrollmentState::Pending);

        // The spawned task carries the append to its terminal state
        // without the submitter waiting on it.
        let terminal = wait_terminal(&coordinator, "n0").await;
        assert_eq!(terminal.state, EnrollmentState::Confirmed);
    }

    #[tokio::test]
    async fn test_enrollment_appends_and_confirms() {
        let (_dir, coordinator) = coordinator();

        Arc::clone(&coordinator).submit(&enroll_validator("n1", "Node5")).await.unwrap();
        let status = wait_terminal(&coordinator, "n1").await;
        assert_eq!(status.state, EnrollmentState::Confirmed);
        assert_eq!(status.sequence, Some(SequenceName::Pool));
        assert_eq!(status.version, Some(2));

        let snapshot = coordinator.store.snapshot(SequenceName::Pool);
        assert_eq!(snapshot.len(), 5);
        assert!(snapshot.records.iter().any(|r| r.as_str().contains("Node5")));
    }

    #[tokio::test]
    async fn test_duplicate_nonce_returns_prior_result() {
        let (_dir, coordinator) = coordinator();

        Arc::clone(&coordinator).submit(&enroll_validator("n1", "Node5")).await.unwrap();
        let first = wait_terminal(&coordinator, "n1").await;
        let second =
            Arc::clone(&coordinator).submit(&enroll_validator("n1", "Node5")).await.unwrap();

        assert_eq!(first.state, EnrollmentState::Confirmed);
        assert_eq!(second.state, EnrollmentState::Confirmed);
        assert_eq!(second.version, first.version);

        // Exactly one record was appended.
        assert_eq!(coordinator.store.snapshot(SequenceName::Pool).len(), 5);
        assert_eq!(coordinator.store.version(SequenceName::Pool), 2);
    }

    #[tokio::test]
    async fn test_steward_cannot_enroll_steward() {
        let (_dir, coordinator) = coordinator();
        let before = coordinator.store.version(SequenceName::Domain);

        let mut request = enroll_validator("n2", "Steward9");
        request.role = Role::Steward;
        let status = Arc::clone(&coordinator).submit(&request).await.unwrap();

        assert_eq!(status.state, EnrollmentState::Failed);
        assert!(status.last_error.unwrap().contains("not authorized"));
        assert_eq!(coordinator.store.version(SequenceName::Domain), before);

        // The denial is observable under the nonce afterwards.
        let looked_up = coordinator.status("n2").unwrap();
        assert_eq!(looked_up.state, EnrollmentState::Failed);
    }

    #[tokio::test]
    async fn test_trustee_enrolls_steward_into_domain() {
        let (_dir, coordinator) = coordinator();

        let identity = test_identity("Steward2");
        let request = EnrollmentRequest {
            requesting_alias: "Trustee1".to_string(),
            requesting_role: Role::Trustee,
            node_alias: "Steward2".to_string(),
            verkey: identity.verkey,
            endpoint: identity.endpoint,
            role: Role::Steward,
            nonce: "n3".to_string(),
        };

        Arc::clone(&coordinator).submit(&request).await.unwrap();
        let status = wait_terminal(&coordinator, "n3").await;
        assert_eq!(status.state, EnrollmentState::Confirmed);
        assert_eq!(status.sequence, Some(SequenceName::Domain));
        assert!(coordinator
            .store
            .snapshot(SequenceName::Domain)
            .records
            .iter()
            .any(|r| r.as_str().contains("Steward2")));
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_registered() {
        let (_dir, coordinator) = coordinator();

        let mut request = enroll_validator("n4", "Node5");
        request.node_alias = String::new();
        let err = Arc::clone(&coordinator).submit(&request).await.unwrap_err();
        assert!(matches!(err, PoolError::Validation { .. }));
        assert!(coordinator.status("n4").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_enrollments_all_confirm() {
        let (_dir, coordinator) = coordinator();

        let mut handles = Vec::new();
        for i in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                let nonce = format!("nonce-{i}");
                let request = enroll_validator(&nonce, &format!("Node{}", 10 + i));
                Arc::clone(&coordinator).submit(&request).await.unwrap();
                wait_terminal(&coordinator, &nonce).await
            }));
        }

        let mut versions = Vec::new();
        for handle in handles {
            let status = handle.await.unwrap();
            assert_eq!(status.state, EnrollmentState::Confirmed);
            versions.push(status.version.unwrap());
        }

        // Every append got a distinct version; the final bundle holds all
        // eight new records.
        versions.sort_unstable();
        versions.dedup();
        assert_eq!(versions.len(), 8);
        assert_eq!(coordinator.store.snapshot(SequenceName::Pool).len(), 12);
        assert_eq!(coordinator.store.version(SequenceName::Pool), 9);
    }

    #[tokio::test]
    async fn test_append_recovers_from_external_version_race() {
        let (_dir, coordinator) = coordinator();

        // Advance the sequence out of band after the coordinator was built.
        let current = coordinator.store.version(SequenceName::Pool);
        coordinator
            .store
            .append(SequenceName::Pool, genpool_test_utils::validator_record(9), current)
            .unwrap();

        Arc::clone(&coordinator).submit(&enroll_validator("n5", "Node6")).await.unwrap();
        let status = wait_terminal(&coordinator, "n5").await;
        assert_eq!(status.state, EnrollmentState::Confirmed);
        assert_eq!(status.version, Some(3));
    }

    #[test]
    fn test_conflict_backoff_spaces_retries() {
        use backon::BackoffBuilder;

        // Five attempts leave four retries, each separated by at least the
        // minimum delay and capped by the maximum.
        let delays: Vec<Duration> = conflict_backoff(5).build().collect();
        assert_eq!(delays.len(), 4);
        assert!(delays.iter().all(|d| *d >= CONFLICT_BACKOFF_MIN));
        assert!(delays.iter().all(|d| *d <= CONFLICT_BACKOFF_MAX));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));

        // A single-attempt budget never sleeps.
        assert_eq!(conflict_backoff(1).build().count(), 0);
    }

    #[tokio::test]
    async fn test_acknowledge_releases_terminal_only() {
        let (_dir, coordinator) = coordinator();

        Arc::clone(&coordinator).submit(&enroll_validator("n6", "Node7")).await.unwrap();
        wait_terminal(&coordinator, "n6").await;
        assert_eq!(coordinator.in_flight(), 1);

        let released = coordinator.acknowledge("n6").unwrap();
        assert_eq!(released.state, EnrollmentState::Confirmed);
        assert!(coordinator.status("n6").is_none());
        assert_eq!(coordinator.in_flight(), 0);

        assert!(coordinator.acknowledge("unknown").is_none());
    }
}
