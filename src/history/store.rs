//! Execution History Persistence
//!
//! Persists the full execution history as a single JSON blob (an array
//! of execution records). The blob is reloaded at startup; a missing or
//! unreadable blob recovers silently to an empty history. Updates
//! replace by execution id, never append a duplicate.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::execution::record::ExecutionRecord;

/// Errors raised while persisting the history blob.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write history blob: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-or-replace store for execution records.
///
/// Holds the in-memory cache of the persisted collection; `save` writes
/// the whole blob back after every change the engine persists.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<ExecutionRecord>,
}

impl HistoryStore {
    /// Default blob location under the data dot-directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from(".flowbench/history.json")
    }

    /// Opens a store, loading whatever the blob holds.
    ///
    /// Absence or corruption is not fatal: the store starts empty and
    /// the condition is logged.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = Self::load_records(&path);
        Self { path, records }
    }

    fn load_records(path: &Path) -> Vec<ExecutionRecord> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                info!(
                    "No execution history at {} ({}), starting empty",
                    path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ExecutionRecord>>(&content) {
            Ok(records) => {
                info!(
                    "Loaded {} execution record(s) from {}",
                    records.len(),
                    path.display()
                );
                records
            }
            Err(e) => {
                warn!(
                    "Execution history at {} is unreadable ({}), starting empty",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// The persisted collection, in insertion order.
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// Number of persisted records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a record, replacing any existing entry with the same id.
    pub fn append_or_replace(&mut self, record: ExecutionRecord) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Writes the whole collection back to the blob.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.records)?;
        fs::write(&self.path, json)?;

        info!(
            "Saved {} execution record(s) to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::record::RunTarget;
    use crate::workflow::model::WorkflowDefinition;
    use tempfile::tempdir;

    fn sample_record() -> ExecutionRecord {
        let definition = WorkflowDefinition::income_verification_demo();
        ExecutionRecord::new(&definition, RunTarget::Loan { loan_id: 42 })
    }

    #[test]
    fn test_open_missing_blob_starts_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("history.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut store = HistoryStore::open(&path);
        let record = sample_record();
        let id = record.id.clone();
        store.append_or_replace(record);
        store.save().unwrap();

        let reloaded = HistoryStore::open(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records()[0].id, id);
    }

    #[test]
    fn test_corrupt_blob_recovers_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not an array").unwrap();

        let store = HistoryStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_or_replace_deduplicates_by_id() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::open(dir.path().join("history.json"));

        let mut record = sample_record();
        store.append_or_replace(record.clone());
        assert_eq!(store.len(), 1);

        record.log("tagged");
        store.append_or_replace(record.clone());
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].console_logs.len(), 1);

        store.append_or_replace(sample_record());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/data/history.json");

        let mut store = HistoryStore::open(&path);
        store.append_or_replace(sample_record());
        store.save().unwrap();

        assert!(path.exists());
    }
}
