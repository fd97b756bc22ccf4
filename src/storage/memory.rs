use super::{BlobStore, TableStore};
use crate::errors::{AppError, AppResult};
use crate::models::{TableKey, TableRow};
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Blob container held in memory, for tests and embedding without storage.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container already holding one blob.
    pub fn with_blob(name: &str, body: &str) -> Self {
        let store = Self::new();
        store.lock().insert(name.to_string(), body.to_string());
        store
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    /// Blob names in lexical order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read_text(&self, name: &str) -> AppResult<String> {
        self.get(name)
            .ok_or_else(|| AppError::SourceUnavailable(format!("blob '{name}' not found")))
    }

    async fn upload(&self, name: &str, body: &str, overwrite: bool) -> AppResult<()> {
        let mut blobs = self.lock();
        if !overwrite && blobs.contains_key(name) {
            return Err(AppError::SinkUnavailable(format!(
                "blob '{name}' already exists"
            )));
        }
        blobs.insert(name.to_string(), body.to_string());
        Ok(())
    }
}

/// Table held in memory, keyed by (partition, row).
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    rows: Mutex<BTreeMap<TableKey, TableRow>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, partition: &str, row: &str) -> Option<TableRow> {
        let key = TableKey {
            partition: partition.to_string(),
            row: row.to_string(),
        };
        self.lock().get(&key).cloned()
    }

    /// All rows ordered by partition, then row key.
    pub fn rows(&self) -> Vec<TableRow> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TableKey, TableRow>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn create_entity(&self, row: &TableRow) -> AppResult<()> {
        match self.lock().entry(row.key()) {
            Entry::Occupied(_) => Err(AppError::DuplicateKey {
                partition: row.partition_key.clone(),
                row: row.row_key.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                Ok(())
            }
        }
    }
}
