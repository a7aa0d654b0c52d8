//! Registrar: applies a change set to the catalog store.

use std::sync::Arc;

use tracing::{debug, info};

use crate::contract::CatalogStore;
use crate::diff::ChangeSet;
use crate::model::CatalogEntry;
use crate::pipeline::{self, PipelineFailure, PipelineResult};

/// Counts of catalog mutations that actually went through in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl AppliedChanges {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.removed
    }
}

/// Translates a [`ChangeSet`] into catalog-store calls.
///
/// Each failed create/update/delete becomes a WARNING failure naming the
/// entry, and the remaining entries are still processed. The registrar never
/// retries; the next poll cycle recomputes the diff and converges.
pub struct Registrar<S> {
    store: Arc<S>,
}

impl<S: CatalogStore> Registrar<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply the change set: create every `to_add` entry, update every
    /// `to_update` entry, delete every `to_remove` entry by id.
    pub async fn apply(&self, changes: ChangeSet) -> PipelineResult<AppliedChanges> {
        debug!(
            to_add = changes.to_add.len(),
            to_update = changes.to_update.len(),
            to_remove = changes.to_remove.len(),
            "applying change set"
        );

        let store = &self.store;

        let adds: Vec<CatalogEntry> = changes.to_add.into_values().collect();
        let added = pipeline::map_each_async("catalog-create", adds, |entry| async move {
            let id = entry.id.clone();
            match store.create(entry).await {
                Ok(()) => PipelineResult::success(()),
                Err(e) => PipelineResult::failure(PipelineFailure::warning(format!(
                    "create failed for entry {id}: {e}"
                ))),
            }
        })
        .await;

        let updates: Vec<CatalogEntry> = changes.to_update.into_values().collect();
        let updated = pipeline::map_each_async("catalog-update", updates, |entry| async move {
            let id = entry.id.clone();
            match store.update(entry).await {
                Ok(()) => PipelineResult::success(()),
                Err(e) => PipelineResult::failure(PipelineFailure::warning(format!(
                    "update failed for entry {id}: {e}"
                ))),
            }
        })
        .await;

        let removals: Vec<String> = changes
            .to_remove
            .into_values()
            .map(|entry| entry.id)
            .collect();
        let removed = pipeline::map_each_async("catalog-delete", removals, |id| async move {
            match store.delete_by_id(&id).await {
                Ok(()) => PipelineResult::success(()),
                Err(e) => PipelineResult::failure(PipelineFailure::warning(format!(
                    "delete failed for entry {id}: {e}"
                ))),
            }
        })
        .await;

        let report = AppliedChanges {
            added: added.payload().map_or(0, Vec::len),
            updated: updated.payload().map_or(0, Vec::len),
            removed: removed.payload().map_or(0, Vec::len),
        };
        info!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            "change set applied"
        );

        pipeline::aggregate(&[added, updated, removed], report)
    }
}
