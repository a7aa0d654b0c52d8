use std::collections::HashMap;

use aas_mirror_core::diff::diff;
use aas_mirror_core::model::{CatalogEntry, PolicyBinding, Snapshot, SourceRef};

fn binding(path: &str) -> PolicyBinding {
    PolicyBinding {
        path: path.to_string(),
        access_policy_id: "access-default".to_string(),
        usage_policy_id: "usage-default".to_string(),
    }
}

fn entry(path: &str) -> CatalogEntry {
    let source = SourceRef {
        base_url: "https://twin.example.com".to_string(),
        path: path.to_string(),
    };
    CatalogEntry {
        id: source.catalog_id(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        version: Some("1.0".to_string()),
        content_type: Some("application/json".to_string()),
        properties: HashMap::from([("unit".to_string(), "celsius".to_string())]),
        source,
    }
}

fn snapshot(paths: &[&str]) -> Snapshot {
    paths.iter().map(|p| (binding(p), entry(p))).collect()
}

#[test]
fn disjoint_snapshots_add_everything_and_remove_everything() {
    let current = snapshot(&["submodels/a/elements/x", "submodels/a/elements/y"]);
    let updated = snapshot(&["submodels/b/elements/p", "submodels/b/elements/q"]);

    let changes = diff(&current, &updated);

    assert_eq!(changes.to_add.len(), updated.len());
    for (b, e) in &updated {
        assert_eq!(changes.to_add.get(b), Some(e));
    }
    assert!(changes.to_update.is_empty());
    assert_eq!(changes.to_remove.len(), current.len());
    for (b, e) in &current {
        assert_eq!(changes.to_remove.get(b), Some(e));
    }
}

#[test]
fn identical_snapshots_diff_to_nothing() {
    let current = snapshot(&["submodels/a/elements/x", "submodels/a/elements/y"]);
    let updated = current.clone();

    let changes = diff(&current, &updated);

    assert!(changes.is_empty());
    assert_eq!(changes.len(), 0);
}

#[test]
fn single_property_change_yields_exactly_one_update() {
    let current = snapshot(&["submodels/a/elements/x", "submodels/a/elements/y"]);
    let mut updated = current.clone();
    let key = binding("submodels/a/elements/y");
    updated
        .get_mut(&key)
        .expect("entry present")
        .properties
        .insert("unit".to_string(), "fahrenheit".to_string());

    let changes = diff(&current, &updated);

    assert!(changes.to_add.is_empty());
    assert!(changes.to_remove.is_empty());
    assert_eq!(changes.to_update.len(), 1);
    let changed = changes.to_update.get(&key).expect("the changed entry");
    assert_eq!(
        changed.properties.get("unit"),
        Some(&"fahrenheit".to_string())
    );
}

#[test]
fn source_reference_change_is_an_update_not_an_add() {
    let current = snapshot(&["submodels/a/elements/x"]);
    let mut updated = current.clone();
    let key = binding("submodels/a/elements/x");
    // Same identity, different data address.
    updated.get_mut(&key).expect("entry present").source.base_url =
        "https://twin-replica.example.com".to_string();

    let changes = diff(&current, &updated);

    assert!(changes.to_add.is_empty());
    assert!(changes.to_remove.is_empty());
    assert_eq!(changes.to_update.len(), 1);
}

#[test]
fn the_three_sets_are_disjoint() {
    let current = snapshot(&[
        "submodels/a/elements/kept",
        "submodels/a/elements/changed",
        "submodels/a/elements/gone",
    ]);
    let mut updated = snapshot(&[
        "submodels/a/elements/kept",
        "submodels/a/elements/changed",
        "submodels/a/elements/new",
    ]);
    updated
        .get_mut(&binding("submodels/a/elements/changed"))
        .expect("entry present")
        .version = Some("2.0".to_string());

    let changes = diff(&current, &updated);

    let add_ids: Vec<&str> = changes.to_add.values().map(|e| e.id.as_str()).collect();
    let update_ids: Vec<&str> = changes.to_update.values().map(|e| e.id.as_str()).collect();
    let remove_ids: Vec<&str> = changes.to_remove.values().map(|e| e.id.as_str()).collect();

    assert_eq!(add_ids.len(), 1);
    assert_eq!(update_ids.len(), 1);
    assert_eq!(remove_ids.len(), 1);
    assert!(add_ids.iter().all(|id| !update_ids.contains(id) && !remove_ids.contains(id)));
    assert!(update_ids.iter().all(|id| !remove_ids.contains(id)));
}

#[test]
fn catalog_ids_are_deterministic_across_polls() {
    let a = entry("submodels/a/elements/x");
    let b = entry("submodels/a/elements/x");
    assert_eq!(a.id, b.id);
    assert!(a.same_identity(&b));

    let c = entry("submodels/a/elements/other");
    assert_ne!(a.id, c.id);
}
