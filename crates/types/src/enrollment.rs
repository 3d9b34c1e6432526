//! Enrollment requests, roles, and status tracking.
//!
//! Enrollment adds a new identity to the pool's genesis record. The request
//! carries a nonce that makes submission exactly-once: re-submitting an
//! already-processed nonce returns the prior result instead of creating a
//! second transaction.
//!
//! Role semantics follow the NYM model: a trustee may sponsor stewards and
//! validators; a steward may sponsor validators only. The full authorization
//! rule lives with the ledger's acceptance logic — what is encoded here is
//! the allow/deny decision enforced at the coordinator boundary before any
//! append is attempted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::PoolError,
    identity::NodeEndpoint,
    record::{SequenceName, TxRecord},
};

/// Ledger roles relevant to enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Trustee-level authority; may sponsor stewards and validators.
    Trustee,
    /// May sponsor validator nodes.
    Steward,
    /// A validator node identity; may not sponsor anything.
    Validator,
}

impl Role {
    /// Stable uppercase name matching the wire encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trustee => "TRUSTEE",
            Self::Steward => "STEWARD",
            Self::Validator => "VALIDATOR",
        }
    }

    /// Whether an identity holding this role may enroll `target`.
    ///
    /// A steward may enroll a validator but not another steward unless it
    /// holds trustee-level authority.
    #[must_use]
    pub const fn may_enroll(self, target: Role) -> bool {
        match self {
            Self::Trustee => matches!(target, Role::Steward | Role::Validator),
            Self::Steward => matches!(target, Role::Validator),
            Self::Validator => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to enroll a new node or steward identity.
///
/// Created by an operator action, consumed exactly once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    /// Alias of the sponsoring identity.
    pub requesting_alias: String,
    /// Role the sponsor holds (verified by the ledger layer; asserted here).
    pub requesting_role: Role,
    /// Alias of the identity being enrolled.
    pub node_alias: String,
    /// Hex-encoded verification key of the identity being enrolled.
    pub verkey: String,
    /// Where the new node is reachable.
    pub endpoint: NodeEndpoint,
    /// Role being granted.
    pub role: Role,
    /// Exactly-once key; duplicate submissions of this nonce return the
    /// prior result.
    pub nonce: String,
}

impl EnrollmentRequest {
    /// Structural validation of all fields. Authorization is checked
    /// separately, after validation passes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), PoolError> {
        for (field, value) in [
            ("requesting_alias", &self.requesting_alias),
            ("node_alias", &self.node_alias),
            ("verkey", &self.verkey),
            ("nonce", &self.nonce),
        ] {
            if value.trim().is_empty() {
                return Err(PoolError::Validation {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(PoolError::Validation {
                field: "endpoint.host".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if matches!(self.role, Role::Trustee) {
            return Err(PoolError::Validation {
                field: "role".to_string(),
                message: "enrollment may request STEWARD or VALIDATOR only".to_string(),
            });
        }
        Ok(())
    }

    /// Checks that the sponsor may grant the requested role.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Authorization`] on denial.
    pub fn authorize(&self) -> Result<(), PoolError> {
        if self.requesting_role.may_enroll(self.role) {
            Ok(())
        } else {
            Err(PoolError::Authorization {
                requester: self.requesting_alias.clone(),
                requester_role: self.requesting_role,
                requested: self.role,
            })
        }
    }

    /// The sequence this enrollment appends to: validator records extend the
    /// pool genesis, steward NYM records extend the domain genesis.
    #[must_use]
    pub const fn target_sequence(&self) -> SequenceName {
        match self.role {
            Role::Validator => SequenceName::Pool,
            Role::Steward | Role::Trustee => SequenceName::Domain,
        }
    }

    /// Builds the canonical single-line transaction record for this request.
    /// The record is opaque to the store; this is the coordinator's one
    /// place that knows its shape.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Serialization`] if encoding fails.
    pub fn to_record(&self) -> Result<TxRecord, PoolError> {
        let body = serde_json::json!({
            "type": "NYM",
            "alias": self.node_alias,
            "verkey": self.verkey,
            "role": self.role.as_str(),
            "host": self.endpoint.host,
            "client_port": self.endpoint.client_port,
            "node_port": self.endpoint.node_port,
            "sponsor": self.requesting_alias,
            "nonce": self.nonce,
        });
        let line = serde_json::to_string(&body)
            .map_err(|e| PoolError::Serialization { message: e.to_string() })?;
        TxRecord::new(line)
    }
}

/// Lifecycle of an enrollment request inside the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnrollmentState {
    /// Accepted, not yet driven.
    Pending,
    /// The transaction record is being appended.
    Submitted,
    /// Appended; the new bundle version is published.
    Confirmed,
    /// Rejected or retries exhausted; `last_error` holds the cause.
    Failed,
}

impl EnrollmentState {
    /// Whether this state is terminal (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// Observable status of an enrollment, owned exclusively by the coordinator
/// and retained until the operator acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStatus {
    /// Nonce of the request this status tracks.
    pub nonce: String,
    /// Current lifecycle state.
    pub state: EnrollmentState,
    /// Sequence the record was appended to, once known.
    pub sequence: Option<SequenceName>,
    /// Bundle version produced by the append (the transaction reference).
    pub version: Option<u64>,
    /// Cause of failure, for `Failed` only.
    pub last_error: Option<String>,
    /// When this status last changed.
    pub updated_at: DateTime<Utc>,
}

impl EnrollmentStatus {
    /// A freshly accepted request.
    #[must_use]
    pub fn pending(nonce: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            state: EnrollmentState::Pending,
            sequence: None,
            version: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Transitions to `Submitted`.
    #[must_use]
    pub fn submitted(mut self) -> Self {
        self.state = EnrollmentState::Submitted;
        self.updated_at = Utc::now();
        self
    }

    /// Transitions to `Confirmed` with the transaction reference.
    #[must_use]
    pub fn confirmed(mut self, sequence: SequenceName, version: u64) -> Self {
        self.state = EnrollmentState::Confirmed;
        self.sequence = Some(sequence);
        self.version = Some(version);
        self.last_error = None;
        self.updated_at = Utc::now();
        self
    }

    /// Transitions to `Failed`, recording the causing error.
    #[must_use]
    pub fn failed(mut self, error: &PoolError) -> Self {
        self.state = EnrollmentState::Failed;
        self.last_error = Some(error.to_string());
        self.updated_at = Utc::now();
        self
    }
}
