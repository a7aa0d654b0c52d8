//! Mapping: derives a snapshot of catalog entries from one fetched twin
//! environment, honoring the registration's selective bindings.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{
    CatalogEntry, Environment, PolicyBinding, Snapshot, SourceRef, SourceRegistration, Submodel,
    SubmodelElement,
};
use crate::pipeline::{self, PipelineFailure, PipelineResult};

/// Structural path of one submodel element inside the source's object graph.
pub fn element_path(submodel: &Submodel, element: &SubmodelElement) -> String {
    format!("submodels/{}/elements/{}", submodel.id, element.id_short)
}

/// Map a fetched environment to the snapshot it represents.
///
/// Every submodel element becomes one [`CatalogEntry`], keyed by its policy
/// binding. When the registration carries a selective-binding list, elements
/// without a matching binding are skipped and reported as an INFO failure
/// (expected, informational). An element that cannot be mapped (empty
/// `id_short`) is dropped with a WARNING; the rest of the snapshot survives.
pub fn environment_to_snapshot(
    registration: &SourceRegistration,
    environment: &Environment,
) -> PipelineResult<Snapshot> {
    let mut selected: HashMap<PolicyBinding, MappingInput> = HashMap::new();
    let mut filtered: Vec<String> = Vec::new();

    for submodel in &environment.submodels {
        for element in &submodel.elements {
            let path = element_path(submodel, element);
            match binding_for(registration, &path) {
                Some(binding) => {
                    selected.insert(
                        binding,
                        MappingInput {
                            path,
                            version: submodel.version.clone(),
                            element: element.clone(),
                        },
                    );
                }
                None => filtered.push(path),
            }
        }
    }

    let base_url = registration.base_url.clone();
    let result = pipeline::map_values("map-element", selected, |binding, input| {
        if input.element.id_short.is_empty() {
            return PipelineResult::failure(PipelineFailure::warning(format!(
                "element at '{}' has no id_short and cannot be mapped",
                binding.path
            )));
        }
        let source = SourceRef {
            base_url: base_url.clone(),
            path: input.path,
        };
        PipelineResult::success(CatalogEntry {
            id: source.catalog_id(),
            name: input.element.id_short,
            version: input.version,
            content_type: input.element.content_type,
            properties: input.element.properties,
            source,
        })
    });

    if filtered.is_empty() {
        return result;
    }
    debug!(
        source = %registration.id,
        filtered = filtered.len(),
        "elements without a matching binding were filtered out"
    );
    result.merge_failure(PipelineFailure::info(format!(
        "{} element(s) filtered out by selective bindings: {}",
        filtered.len(),
        filtered.join(", ")
    )))
}

struct MappingInput {
    path: String,
    version: Option<String>,
    element: SubmodelElement,
}

fn binding_for(registration: &SourceRegistration, path: &str) -> Option<PolicyBinding> {
    match &registration.bindings {
        None => Some(PolicyBinding {
            path: path.to_string(),
            access_policy_id: registration.access_policy_id.clone(),
            usage_policy_id: registration.usage_policy_id.clone(),
        }),
        Some(bindings) => bindings.iter().find(|b| b.path == path).cloned(),
    }
}
