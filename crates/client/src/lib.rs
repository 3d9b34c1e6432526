//! HTTP client SDK for the genpool coordinator.
//!
//! Provides:
//! - [`PoolClient`] — genesis bundle fetch (`/init`, `/domain`) and
//!   enrollment submission/polling, with retry on transient failures
//! - [`VerificationClient`] — a diagnostic probe that round-trips a test
//!   transaction through the enrollment write path
//! - [`with_retry`] — the backoff helper the above are built on
//!
//! All waits are bounded; nothing here blocks without a budget.

#![deny(unsafe_code)]

mod client;
mod error;
mod retry;
mod verify;

pub use client::PoolClient;
pub use error::{ClientError, Result};
pub use retry::{with_retry, RetryPolicy};
pub use verify::{VerificationClient, VerificationResult};

pub use genpool_types::VERSION_HEADER;
