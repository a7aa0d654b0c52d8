//! Per-source reconciliation: fetch → map → diff → apply, one scheduler tick.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::contract::{CatalogStore, FetchError, SourceClient};
use crate::diff;
use crate::mapping;
use crate::model::{Snapshot, SourceRegistration};
use crate::pipeline::{PipelineFailure, PipelineResult, Severity};
use crate::registrar::{AppliedChanges, Registrar};
use crate::scheduler::PollTask;

/// Runs reconciliation cycles for one registered source.
///
/// Owns that source's last-known snapshot exclusively; it is only ever read or
/// written from within this reconciler's own run, so no cross-task locking is
/// needed. The snapshot is replaced wholesale after every successful poll and
/// kept untouched when a cycle halts fatally (an unauthorized source keeps
/// mirroring from where it left off once access is restored).
pub struct SourceReconciler<C, S> {
    registration: SourceRegistration,
    client: Arc<C>,
    registrar: Registrar<S>,
    last_snapshot: Snapshot,
}

impl<C, S> SourceReconciler<C, S>
where
    C: SourceClient,
    S: CatalogStore,
{
    pub fn new(registration: SourceRegistration, client: Arc<C>, store: Arc<S>) -> Self {
        Self {
            registration,
            client,
            registrar: Registrar::new(store),
            last_snapshot: Snapshot::new(),
        }
    }

    pub fn registration(&self) -> &SourceRegistration {
        &self.registration
    }

    /// One full reconciliation cycle for this source.
    ///
    /// A connection failure is a WARNING (retried next cycle); an authorization
    /// failure is FATAL. Both keep the last-known snapshot so the next
    /// successful poll diffs against real state instead of re-adding
    /// everything.
    pub async fn run_cycle(&mut self) -> PipelineResult<AppliedChanges> {
        let source = self.registration.id.clone();
        debug!(source = %source, base_url = %self.registration.base_url, "starting reconciliation cycle");

        let environment = match self
            .client
            .fetch_environment(&self.registration.base_url)
            .await
        {
            Ok(environment) => environment,
            Err(FetchError::Connect(msg)) => {
                let result = PipelineResult::failure(PipelineFailure::warning(format!(
                    "fetch failed for source {source}: connection failed: {msg}"
                )));
                log_outcome(&source, &result);
                return result;
            }
            Err(FetchError::Unauthorized(msg)) => {
                let result = PipelineResult::failure(PipelineFailure::fatal(format!(
                    "fetch failed for source {source}: unauthorized: {msg}"
                )));
                log_outcome(&source, &result);
                return result;
            }
        };

        let (snapshot, mapping_failure) =
            match mapping::environment_to_snapshot(&self.registration, &environment) {
                PipelineResult::Success(snapshot) => (snapshot, None),
                PipelineResult::NegligibleFailure(snapshot, failure) => (snapshot, Some(failure)),
                PipelineResult::Failure(failure) => {
                    let result = PipelineResult::failure(failure);
                    log_outcome(&source, &result);
                    return result;
                }
            };

        let changes = diff::diff(&self.last_snapshot, &snapshot);
        debug!(
            source = %source,
            to_add = changes.to_add.len(),
            to_update = changes.to_update.len(),
            to_remove = changes.to_remove.len(),
            "computed change set"
        );

        let mut result = self.registrar.apply(changes).await;
        if let Some(failure) = mapping_failure {
            result = result.merge_failure(failure);
        }

        // The poll itself succeeded, so this becomes the new last-known state
        // even if individual catalog calls were warned about.
        self.last_snapshot = snapshot;

        log_outcome(&source, &result);
        result
    }

    /// Remove every catalog entry attributed to this source. Called when the
    /// source is deregistered.
    pub async fn teardown(&mut self) -> PipelineResult<AppliedChanges> {
        let source = self.registration.id.clone();
        info!(source = %source, entries = self.last_snapshot.len(), "tearing down deregistered source");
        let changes = diff::diff(&self.last_snapshot, &Snapshot::new());
        let result = self.registrar.apply(changes).await;
        self.last_snapshot.clear();
        log_outcome(&source, &result);
        result
    }

    /// Last-known snapshot, as of the most recent successful poll.
    pub fn last_snapshot(&self) -> &Snapshot {
        &self.last_snapshot
    }
}

/// Log one cycle's outcome at a level keyed by its severity.
fn log_outcome(source: &str, result: &PipelineResult<AppliedChanges>) {
    match result.failure_ref() {
        None => {
            info!(source = %source, "reconciliation cycle completed cleanly");
        }
        Some(failure) => match failure.severity {
            Severity::Info => {
                debug!(source = %source, detail = %failure, "reconciliation cycle completed");
            }
            Severity::Warning => {
                warn!(source = %source, detail = %failure, "reconciliation cycle completed with warnings");
            }
            Severity::Fatal => {
                error!(source = %source, detail = %failure, "reconciliation cycle failed");
            }
        },
    }
}

/// Adapter that lets the scheduler drive a [`SourceReconciler`].
pub struct SourcePollTask<C, S> {
    reconciler: SourceReconciler<C, S>,
}

impl<C, S> SourcePollTask<C, S>
where
    C: SourceClient,
    S: CatalogStore,
{
    pub fn new(reconciler: SourceReconciler<C, S>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl<C, S> PollTask for SourcePollTask<C, S>
where
    C: SourceClient + 'static,
    S: CatalogStore + 'static,
{
    fn id(&self) -> &str {
        &self.reconciler.registration().id
    }

    async fn run(&mut self) {
        let _ = self.reconciler.run_cycle().await;
    }

    async fn shutdown(&mut self) {
        let _ = self.reconciler.teardown().await;
    }
}
