//! The genesis store: per-sequence versioned record sets with
//! optimistic-concurrency appends and atomic file persistence.
//!
//! # Versioning
//!
//! Each sequence carries its own version counter. A sequence that loads with
//! records starts at version 1 (the initial trusted bundle); an absent or
//! empty sequence starts at 0. Every successful append increments the
//! version by exactly 1, and versions are never reused — the counter is
//! persisted in a sidecar file alongside the genesis records and restored on
//! open.
//!
//! # Crash safety
//!
//! An append persists the full record file via temp-file + rename, then the
//! sidecar the same way, then publishes the new in-memory state. The sidecar
//! records both the version and the record count; if a crash lands between
//! the two writes, open() heals the version from the count delta, so a
//! version observed by a reader is never handed out twice.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use snafu::ResultExt;

use genpool_types::{
    error::IoSnafu, GenesisSnapshot, PoolError, Result, SequenceName, TxRecord,
};

/// In-memory state of one sequence. The record slice is immutable; appends
/// build a new slice and swap it in under the write lock.
struct SequenceCell {
    version: u64,
    records: Arc<[TxRecord]>,
}

/// Durable holder of the pool and domain genesis transaction sets.
///
/// Append-only and versioned. Concurrent readers either see the full prior
/// version or the full new version, never a partial record set.
pub struct GenesisStore {
    data_dir: PathBuf,
    pool: RwLock<SequenceCell>,
    domain: RwLock<SequenceCell>,
}

impl GenesisStore {
    /// Opens the store at `data_dir`, loading any existing genesis files.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Io`] on filesystem failure and
    /// [`PoolError::Validation`] if a persisted record is malformed.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .context(IoSnafu { path: data_dir.display().to_string() })?;

        let pool = Self::load_sequence(&data_dir, SequenceName::Pool)?;
        let domain = Self::load_sequence(&data_dir, SequenceName::Domain)?;

        tracing::info!(
            data_dir = %data_dir.display(),
            pool_version = pool.version,
            pool_records = pool.records.len(),
            domain_version = domain.version,
            domain_records = domain.records.len(),
            "opened genesis store"
        );

        Ok(Self { data_dir, pool: RwLock::new(pool), domain: RwLock::new(domain) })
    }

    /// Path of the genesis record file for `sequence`.
    #[must_use]
    pub fn sequence_path(&self, sequence: SequenceName) -> PathBuf {
        self.data_dir.join(sequence.genesis_file_name())
    }

    /// Current version of `sequence`.
    #[must_use]
    pub fn version(&self, sequence: SequenceName) -> u64 {
        self.cell(sequence).read().version
    }

    /// Takes an immutable snapshot of `sequence`: the full committed record
    /// set plus the version it was committed at.
    #[must_use]
    pub fn snapshot(&self, sequence: SequenceName) -> GenesisSnapshot {
        let cell = self.cell(sequence).read();
        GenesisSnapshot { sequence, version: cell.version, records: Arc::clone(&cell.records) }
    }

    /// Appends `record` to `sequence`, provided the caller's expected base
    /// version still matches. Returns the new, strictly increased version.
    ///
    /// The new state is persisted to disk before it becomes visible to
    /// readers; on persistence failure the in-memory state is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Conflict`] if `expected_version` does not match
    /// the current version (optimistic concurrency; re-read and retry), and
    /// [`PoolError::Io`] if persistence fails.
    pub fn append(
        &self,
        sequence: SequenceName,
        record: TxRecord,
        expected_version: u64,
    ) -> Result<u64> {
        let mut cell = self.cell(sequence).write();
        if cell.version != expected_version {
            return Err(PoolError::Conflict {
                sequence,
                expected: expected_version,
                current: cell.version,
            });
        }

        let mut records: Vec<TxRecord> = cell.records.to_vec();
        records.push(record);
        let new_version = cell.version + 1;

        self.persist_sequence(sequence, new_version, &records)?;

        cell.version = new_version;
        cell.records = records.into();

        tracing::info!(
            sequence = %sequence,
            version = new_version,
            records = cell.records.len(),
            "appended genesis record"
        );
        Ok(new_version)
    }

    fn cell(&self, sequence: SequenceName) -> &RwLock<SequenceCell> {
        match sequence {
            SequenceName::Pool => &self.pool,
            SequenceName::Domain => &self.domain,
        }
    }

    fn sidecar_path(&self, sequence: SequenceName) -> PathBuf {
        self.data_dir.join(format!("{}.version", sequence.genesis_file_name()))
    }

    fn load_sequence(data_dir: &Path, sequence: SequenceName) -> Result<SequenceCell> {
        let path = data_dir.join(sequence.genesis_file_name());
        let records: Vec<TxRecord> = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .context(IoSnafu { path: path.display().to_string() })?;
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(TxRecord::new)
                .collect::<Result<_>>()?
        } else {
            Vec::new()
        };

        // Baseline: a pre-existing non-empty bundle is version 1; an empty
        // sequence is version 0. The sidecar, if present, restores the exact
        // counter and heals a crash between record and sidecar writes.
        let mut version = if records.is_empty() { 0 } else { 1 };
        let sidecar = data_dir.join(format!("{}.version", sequence.genesis_file_name()));
        if sidecar.exists() {
            let text = std::fs::read_to_string(&sidecar)
                .context(IoSnafu { path: sidecar.display().to_string() })?;
            let mut parts = text.split_whitespace();
            let stored_version: u64 = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| PoolError::Validation {
                    field: format!("{sequence} version sidecar"),
                    message: "missing or invalid version".to_string(),
                })?;
            let stored_count: usize = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            let unaccounted = records.len().saturating_sub(stored_count) as u64;
            version = stored_version + unaccounted;
        }

        Ok(SequenceCell { version, records: records.into() })
    }

    fn persist_sequence(
        &self,
        sequence: SequenceName,
        version: u64,
        records: &[TxRecord],
    ) -> Result<()> {
        let path = self.sequence_path(sequence);
        let mut text = String::new();
        for record in records {
            text.push_str(record.as_str());
            text.push('\n');
        }
        write_atomic(&path, &text)?;
        write_atomic(&self.sidecar_path(sequence), &format!("{version} {}\n", records.len()))?;
        Ok(())
    }
}

/// Writes `content` to `path` via a temp file and rename, so the file on
/// disk is always complete or absent, never torn.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).context(IoSnafu { path: tmp.display().to_string() })?;
    std::fs::rename(&tmp, path).context(IoSnafu { path: path.display().to_string() })?;
    Ok(())
}
