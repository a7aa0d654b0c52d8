//! CLI glue for aas-mirror: command parsing and orchestration. All engine
//! logic lives in `aas-mirror-core`; this module only wires configuration,
//! the HTTP source client and the catalog store into the scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use aas_mirror_core::config::MirrorConfig;
use aas_mirror_core::reconcile::{SourcePollTask, SourceReconciler};
use aas_mirror_core::scheduler::Scheduler;

use crate::client::HttpSourceClient;
use crate::load_config::load_config;
use crate::store::InMemoryCatalog;

/// CLI for aas-mirror: keep a local asset catalog in step with remote
/// digital-twin repositories.
#[derive(Parser)]
#[clap(
    name = "aas-mirror",
    version,
    about = "Mirror Asset Administration Shell environments into a policy-annotated local asset catalog"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll all configured sources on the configured interval until interrupted
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Run one reconciliation cycle per configured source, then exit
    SyncOnce {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config } => run_scheduler(config).await,
        Commands::SyncOnce { config } => sync_once(config).await,
    }
}

async fn run_scheduler(path: PathBuf) -> Result<()> {
    let config = load_config(path)?;
    let runtime_config = Arc::new(MirrorConfig::new(config.poll_interval_seconds));
    runtime_config.trace_loaded();

    let client = Arc::new(HttpSourceClient::new_from_env());
    let store = Arc::new(InMemoryCatalog::new());

    let interval_config = Arc::clone(&runtime_config);
    let scheduler = Scheduler::new(move || interval_config.poll_interval());

    for source in config.sources {
        let registration = source.into_registration();
        info!(source = %registration.id, base_url = %registration.base_url, "registering source");
        let reconciler =
            SourceReconciler::new(registration, Arc::clone(&client), Arc::clone(&store));
        scheduler.register(Box::new(SourcePollTask::new(reconciler)));
    }

    let handle = scheduler.start();
    tokio::signal::ctrl_c().await?;
    info!("interrupt received, stopping scheduler");
    scheduler.stop();
    handle.await?;
    info!(catalog_entries = store.len(), "scheduler stopped");
    Ok(())
}

async fn sync_once(path: PathBuf) -> Result<()> {
    let config = load_config(path)?;
    let client = Arc::new(HttpSourceClient::new_from_env());
    let store = Arc::new(InMemoryCatalog::new());

    let mut halted_sources: Vec<String> = Vec::new();
    for source in config.sources {
        let registration = source.into_registration();
        info!(source = %registration.id, "running single reconciliation cycle");
        let mut reconciler =
            SourceReconciler::new(registration.clone(), Arc::clone(&client), Arc::clone(&store));
        let result = reconciler.run_cycle().await;
        if result.should_halt() {
            halted_sources.push(registration.id);
        }
    }

    match serde_json::to_string_pretty(&store.entries()) {
        Ok(json) => debug!(catalog = %json, "catalog contents after sync"),
        Err(e) => debug!(error = ?e, "failed to serialize catalog contents"),
    }
    info!(catalog_entries = store.len(), "single pass complete");

    if !halted_sources.is_empty() {
        anyhow::bail!(
            "reconciliation halted fatally for source(s): {}",
            halted_sources.join(", ")
        );
    }
    Ok(())
}
