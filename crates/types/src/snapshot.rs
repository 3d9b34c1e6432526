//! Immutable, versioned genesis snapshots.
//!
//! A snapshot is the unit the server publishes and the bootstrapper persists:
//! an ordered record set frozen at a version. Records are shared behind an
//! `Arc` slice so concurrent readers can never observe a partial append.

use std::sync::Arc;

use crate::{
    error::PoolError,
    record::{SequenceName, TxRecord},
};

/// An immutable snapshot of one genesis sequence at a specific version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisSnapshot {
    /// Which sequence this snapshot captures.
    pub sequence: SequenceName,
    /// Version the sequence was at when the snapshot was taken. Strictly
    /// increases with every successful append.
    pub version: u64,
    /// The full, ordered record set. Never a prefix of one version mixed
    /// with a suffix of another.
    pub records: Arc<[TxRecord]>,
}

impl GenesisSnapshot {
    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds zero records. Consumers treat an empty
    /// snapshot as an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes the snapshot to its wire/on-disk form: one record per
    /// line, UTF-8, trailing newline. Byte-stable for a given version.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for record in self.records.iter() {
            out.push_str(record.as_str());
            out.push('\n');
        }
        out
    }

    /// Parses line-delimited text fetched from a server or read from disk.
    ///
    /// Blank lines are not tolerated mid-sequence; a body that is empty or
    /// ends mid-record is rejected so a truncated transfer never yields a
    /// silently shortened bundle.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::EmptyBundle`] for an empty body and
    /// [`PoolError::Validation`] for a truncated or malformed one.
    pub fn parse(sequence: SequenceName, version: u64, text: &str) -> Result<Self, PoolError> {
        if text.trim().is_empty() {
            return Err(PoolError::EmptyBundle { sequence });
        }
        if !text.ends_with('\n') {
            return Err(PoolError::Validation {
                field: format!("{sequence} body"),
                message: "truncated: final record is not newline-terminated".to_string(),
            });
        }
        let mut records = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                return Err(PoolError::Validation {
                    field: format!("{sequence} body"),
                    message: format!("blank line at record position {}", records.len()),
                });
            }
            records.push(TxRecord::new(line)?);
        }
        Ok(Self { sequence, version, records: records.into() })
    }
}
