//! Known-identity store
//!
//! `KnownIdentityStore` is the read-only snapshot every submission is matched
//! against. `IdentityStore` is the persistence seam behind it: the store is
//! loaded in full per submission and only ever grows by appending.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rv_protocol::StoreStats;
use tracing::{debug, info, warn};

use crate::data::{append_record, read_rows, FingerprintRecord};
use crate::error::{Result, RevisitError};

/// Snapshot of every stored record, sorted by (id, log)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownIdentityStore {
    records: Vec<FingerprintRecord>,
}

impl KnownIdentityStore {
    pub fn new(mut records: Vec<FingerprintRecord>) -> Self {
        // Stable, so duplicate (id, log) rows keep file order
        records.sort_by_key(|r| (r.id, r.log));
        Self { records }
    }

    pub fn records(&self) -> &[FingerprintRecord] {
        &self.records
    }

    /// Records that take part in matching
    pub fn comparable(&self) -> impl Iterator<Item = &FingerprintRecord> {
        self.records.iter().filter(|r| r.is_comparable())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every stored row of one identity
    pub fn rows_for(&self, id: u64) -> impl Iterator<Item = &FingerprintRecord> {
        self.records.iter().filter(move |r| r.id == id)
    }

    /// Identity for a brand-new browser: one past the last id, 0 for an empty store
    pub fn next_identity_id(&self) -> u64 {
        self.records.last().map(|r| r.id + 1).unwrap_or(0)
    }

    /// Log index for the next revisit of `id`: the number of rows it already has
    pub fn next_log_index(&self, id: u64) -> u64 {
        self.rows_for(id).count() as u64
    }

    pub fn identity_count(&self) -> usize {
        let mut ids: Vec<u64> = self.records.iter().map(|r| r.id).collect();
        ids.dedup();
        ids.len()
    }

    pub fn malformed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_comparable()).count()
    }

    /// Add a record to the snapshot, keeping it sorted
    pub fn insert(&mut self, record: FingerprintRecord) {
        let pos = self
            .records
            .partition_point(|r| (r.id, r.log) <= (record.id, record.log));
        self.records.insert(pos, record);
    }
}

/// Persistence for the known-identity store
#[cfg_attr(test, mockall::automock)]
pub trait IdentityStore: Send {
    /// Read every record
    fn load(&self) -> Result<KnownIdentityStore>;

    /// Persist one new record
    fn append(&mut self, record: &FingerprintRecord) -> Result<()>;

    /// Human-readable location, for logs and stats
    fn location(&self) -> String;

    fn stats(&self) -> Result<StoreStats> {
        let snapshot = self.load()?;
        Ok(StoreStats {
            path: self.location(),
            records: snapshot.len(),
            identities: snapshot.identity_count(),
            malformed: snapshot.malformed_count(),
        })
    }
}

/// CSV file store
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for CsvStore {
    fn load(&self) -> Result<KnownIdentityStore> {
        let rows = read_rows(&self.path)?;
        let total = rows.len();

        let records: Vec<FingerprintRecord> = rows
            .into_iter()
            .filter_map(|row| {
                let line = row.row;
                let record = row.into_record();
                if record.is_none() {
                    warn!(row = line, path = ?self.path, "Dropping store row without numeric ID/Log");
                }
                record
            })
            .collect();

        if records.len() != total {
            warn!(
                dropped = total - records.len(),
                path = ?self.path,
                "Some store rows could not be used"
            );
        }

        info!(records = records.len(), path = ?self.path, "Loaded identity store");
        Ok(KnownIdentityStore::new(records))
    }

    fn append(&mut self, record: &FingerprintRecord) -> Result<()> {
        append_record(&self.path, record)?;
        debug!(id = record.id, log = record.log, path = ?self.path, "Appended record");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store; clones share the same records
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<FingerprintRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<FingerprintRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
}

impl IdentityStore for MemoryStore {
    fn load(&self) -> Result<KnownIdentityStore> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RevisitError::generic("memory store lock poisoned"))?;
        Ok(KnownIdentityStore::new(guard.clone()))
    }

    fn append(&mut self, record: &FingerprintRecord) -> Result<()> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RevisitError::generic("memory store lock poisoned"))?;
        guard.push(record.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
