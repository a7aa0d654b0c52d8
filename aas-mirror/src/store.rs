//! In-memory catalog store: the reference [`CatalogStore`] implementation for
//! local runs. Duplicate creates and missing updates/deletes are reported as
//! errors; the core surfaces them as recoverable warnings.

use std::collections::HashMap;
use std::sync::Mutex;

use aas_mirror_core::contract::{CatalogStore, StoreError};
use aas_mirror_core::model::CatalogEntry;
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: Mutex<HashMap<String, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.entries.lock().ok()?.get(id).cloned()
    }

    /// All entries currently in the catalog, for reporting.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.entries
            .lock()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn create(&self, entry: CatalogEntry) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "catalog store mutex poisoned")?;
        if entries.contains_key(&entry.id) {
            return Err(format!("an entry with id {} already exists", entry.id).into());
        }
        debug!(id = %entry.id, name = %entry.name, "catalog entry created");
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn update(&self, entry: CatalogEntry) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "catalog store mutex poisoned")?;
        if !entries.contains_key(&entry.id) {
            return Err(format!("no entry with id {} to update", entry.id).into());
        }
        debug!(id = %entry.id, name = %entry.name, "catalog entry updated");
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "catalog store mutex poisoned")?;
        if entries.remove(id).is_none() {
            return Err(format!("no entry with id {id} to delete").into());
        }
        debug!(id = %id, "catalog entry deleted");
        Ok(())
    }
}
