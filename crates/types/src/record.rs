//! Genesis transaction records and sequence names.
//!
//! A record is an opaque, ordered, line-delimited byte record whose validity
//! is established by the ledger layer. This module enforces only the wire
//! format rules: non-empty, single line, UTF-8.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// The two genesis transaction sequences a pool publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceName {
    /// Validator set records: node identity, keys, network address, ports.
    Pool,
    /// Non-validator ledger state: steward/NYM records.
    Domain,
}

impl SequenceName {
    /// Both sequences, in publication order.
    pub const ALL: [SequenceName; 2] = [SequenceName::Pool, SequenceName::Domain];

    /// Stable lowercase name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pool => "pool",
            Self::Domain => "domain",
        }
    }

    /// Well-known on-disk file name for this sequence.
    #[must_use]
    pub const fn genesis_file_name(self) -> &'static str {
        match self {
            Self::Pool => "pool_transactions_genesis",
            Self::Domain => "domain_transactions_genesis",
        }
    }

    /// HTTP path this sequence is served under.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Pool => "/init",
            Self::Domain => "/domain",
        }
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SequenceName {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pool" => Ok(Self::Pool),
            "domain" => Ok(Self::Domain),
            other => Err(PoolError::Validation {
                field: "sequence".to_string(),
                message: format!("unknown sequence {other:?} (expected \"pool\" or \"domain\")"),
            }),
        }
    }
}

/// A single opaque genesis transaction record.
///
/// Construction validates the wire format only: the content must be non-empty
/// after trimming and must not contain line breaks (records are
/// line-delimited on the wire and on disk). Content is never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxRecord(String);

impl TxRecord {
    /// Creates a record, enforcing the line-delimited wire format.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] if the content is empty/whitespace
    /// or contains `\n` or `\r`.
    pub fn new(content: impl Into<String>) -> Result<Self, PoolError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(PoolError::Validation {
                field: "record".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if content.contains('\n') || content.contains('\r') {
            return Err(PoolError::Validation {
                field: "record".to_string(),
                message: "must not contain line breaks".to_string(),
            });
        }
        Ok(Self(content))
    }

    /// The record content as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TxRecord {
    type Error = PoolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TxRecord> for String {
    fn from(record: TxRecord) -> Self {
        record.0
    }
}
