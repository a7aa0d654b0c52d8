//! # contract: abstract collaborators of the reconciliation core
//!
//! The engine never speaks a wire format itself. It consumes two capabilities:
//! a [`SourceClient`] that fetches the full twin environment of one remote
//! repository, and a [`CatalogStore`] that persists catalog entries. Both are
//! async traits, annotated for `mockall` so tests can generate deterministic
//! mocks (enable the `test-export-mocks` feature, on by default).
//!
//! Store methods return boxed errors; the registrar converts every store
//! failure into a WARNING pipeline failure, so a single failed catalog call
//! never aborts the rest of a change set. Duplicate creates must therefore be
//! reported as an error by the store, never as a panic.

use std::fmt;

use async_trait::async_trait;
use mockall::automock;

use crate::model::{CatalogEntry, Environment};

/// The two error kinds the reconciliation core special-cases.
///
/// `Unauthorized` halts the source's cycle as FATAL without discarding its
/// last-known snapshot; `Connect` is a WARNING and the poll is retried next
/// cycle.
#[derive(Debug)]
pub enum FetchError {
    Connect(String),
    Unauthorized(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Connect(msg) => write!(f, "connection failed: {msg}"),
            FetchError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Error type for catalog-store calls (boxed, like the uploader contract this
/// engine grew out of).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Fetches the full twin environment of one remote repository.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch the environment behind `base_url`, atomically from the caller's
    /// point of view: one call, one snapshot.
    async fn fetch_environment(&self, base_url: &str) -> Result<Environment, FetchError>;
}

/// The local asset catalog the engine mirrors into.
///
/// Each call is idempotent from the core's perspective: the store is free to
/// reject a duplicate create or a missing delete, and the registrar surfaces
/// that as a recoverable WARNING. Retry policy, if any, belongs to the store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a new catalog entry.
    async fn create(&self, entry: CatalogEntry) -> Result<(), StoreError>;

    /// Replace an existing catalog entry, matched by id.
    async fn update(&self, entry: CatalogEntry) -> Result<(), StoreError>;

    /// Delete the entry with the given id.
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
}
