//! Data model: catalog entries, snapshots, source registrations and the twin
//! environment they are derived from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The remote data address needed to later fetch an entry's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Base reference of the remote twin repository.
    pub base_url: String,
    /// Structural path of the element inside the repository's object graph.
    pub path: String,
}

impl SourceRef {
    /// Deterministic catalog id for this reference: the same twin element maps
    /// to the same id across polls, which is what makes identity equality in
    /// the diff engine meaningful.
    pub fn catalog_id(&self) -> String {
        let name = format!("{}|{}", self.base_url, self.path);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }
}

/// Pairs a structural path with the access/usage policy ids governing it.
/// Used as the snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyBinding {
    pub path: String,
    pub access_policy_id: String,
    pub usage_policy_id: String,
}

/// One reconcilable unit in the local catalog.
///
/// Full equality (`PartialEq`) compares all descriptive fields, properties and
/// the source reference; the fetched content bytes are never part of equality.
/// Identity equality is [`CatalogEntry::same_identity`], by id alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    pub source: SourceRef,
}

impl CatalogEntry {
    pub fn same_identity(&self, other: &CatalogEntry) -> bool {
        self.id == other.id
    }
}

/// The full keyed collection of catalog entries derived from one poll of one
/// source. Owned exclusively by that source's task and replaced wholesale
/// after each successful poll; never partially mutated.
pub type Snapshot = HashMap<PolicyBinding, CatalogEntry>;

/// Identifies one remote repository to mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRegistration {
    /// Stable identifier of this registration (scheduler task id).
    pub id: String,
    /// Base reference of the remote repository.
    pub base_url: String,
    /// Policies applied to elements not covered by a selective binding.
    pub access_policy_id: String,
    pub usage_policy_id: String,
    /// Optional selective-binding list: when present, only elements whose
    /// structural path matches a binding are mirrored.
    #[serde(default)]
    pub bindings: Option<Vec<PolicyBinding>>,
}

/// The external source-of-truth object graph being mirrored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub submodels: Vec<Submodel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submodel {
    pub id: String,
    #[serde(default)]
    pub id_short: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub elements: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmodelElement {
    pub id_short: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}
