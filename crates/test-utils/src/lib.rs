//! Shared test utilities for the genpool workspace.
//!
//! Provides a managed temp directory and genesis fixtures (validator and
//! steward records, deterministic identities) so integration tests across
//! crates build the same four-validator pool.

// Test utilities are expected to panic on failure - that's their purpose
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod fixtures;
mod test_dir;

pub use fixtures::{
    probe_endpoint, steward_record, test_identity, validator_record, write_genesis_files,
};
pub use test_dir::TestDir;
