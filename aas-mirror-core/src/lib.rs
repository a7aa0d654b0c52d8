//! aas-mirror-core: reconciliation and scheduling engine for aas-mirror.
//!
//! This crate contains the engine that keeps a local asset catalog in step with
//! one or more remote digital-twin repositories: the severity-tagged pipeline
//! results, the snapshot diff algorithm, the registrar that applies change sets
//! to the catalog, and the variable-rate scheduler that polls every registered
//! source without letting a slow source delay the others.
//!
//! Transport, authentication and catalog persistence are abstract collaborators;
//! see [`contract`] for the traits a host must provide.

pub mod config;
pub mod contract;
pub mod diff;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod registrar;
pub mod scheduler;
