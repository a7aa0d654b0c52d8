//! `load_config` module: loads the static YAML config into typed sections the
//! CLI hands to the core. This is the only place untrusted YAML is parsed.
//!
//! All errors here use `anyhow::Error` for context-rich diagnostics, surfaced
//! at the CLI boundary.

use std::fs;
use std::path::Path;

use aas_mirror_core::model::{PolicyBinding, SourceRegistration};
use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Initial polling period; mutable at runtime through `MirrorConfig`.
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub sources: Vec<SourceSection>,
}

#[derive(Debug, Deserialize)]
pub struct SourceSection {
    pub id: String,
    pub base_url: String,
    pub access_policy_id: String,
    pub usage_policy_id: String,
    /// Optional selective-binding list; when present, only the listed paths
    /// are mirrored.
    #[serde(default)]
    pub bindings: Option<Vec<PolicyBinding>>,
}

impl SourceSection {
    pub fn into_registration(self) -> SourceRegistration {
        SourceRegistration {
            id: self.id,
            base_url: self.base_url,
            access_policy_id: self.access_policy_id,
            usage_policy_id: self.usage_policy_id,
            bindings: self.bindings,
        }
    }
}

/// Loads a static YAML config file. Secrets (API tokens) come from the
/// environment, never from the file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}
