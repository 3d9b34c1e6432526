//! Core data model for the genpool coordinator.
//!
//! Defines the types shared across the workspace:
//! - Genesis transaction records and versioned snapshots
//! - Node identities (locally generated key pairs + endpoints)
//! - Enrollment requests, roles, and status tracking
//! - The unified error taxonomy with retryability classification
//!
//! Records are opaque to this subsystem: their validity is established by the
//! ledger layer, not here. The only structural rules enforced are the ones the
//! wire format demands (non-empty, single line, UTF-8).

#![deny(unsafe_code)]

pub mod enrollment;
pub mod error;
pub mod identity;
pub mod record;
pub mod snapshot;

pub use enrollment::{EnrollmentRequest, EnrollmentState, EnrollmentStatus, Role};
pub use error::{ErrorKind, PoolError, Result};
pub use identity::{NodeEndpoint, NodeIdentity};
pub use record::{SequenceName, TxRecord};
pub use snapshot::GenesisSnapshot;

/// HTTP header carrying the bundle version on genesis responses.
pub const VERSION_HEADER: &str = "x-genesis-version";
