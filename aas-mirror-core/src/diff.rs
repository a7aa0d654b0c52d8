//! Diff engine: turns "old snapshot" + "new snapshot" into a minimal
//! add/update/remove change set.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::{CatalogEntry, PolicyBinding, Snapshot};

/// Three disjoint, key-identified collections produced by [`diff`] and
/// consumed exactly once by the registrar.
///
/// `BTreeMap` keeps application order deterministic, which keeps aggregated
/// failure messages stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub to_add: BTreeMap<PolicyBinding, CatalogEntry>,
    pub to_update: BTreeMap<PolicyBinding, CatalogEntry>,
    pub to_remove: BTreeMap<PolicyBinding, CatalogEntry>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_remove.len()
    }
}

/// Compute the change set between the last-known snapshot and a freshly
/// mapped one.
///
/// - `to_add`: entries in `updated` with no identity-equal counterpart
///   anywhere in `current`'s values.
/// - `to_update`: entries in `updated` with an identity-equal counterpart in
///   `current` that is not fully equal (some field, property or source
///   reference changed). A child-element-only change surfaces as an update of
///   the parent entry's properties; there is no per-child diff.
/// - `to_remove`: entries in `current` with no identity-equal counterpart
///   anywhere in `updated`'s values.
///
/// Identity equality is by id alone; the three sets are disjoint by
/// construction. Values are indexed by id first, so the comparison is
/// O(n + m) over the two snapshots.
pub fn diff(current: &Snapshot, updated: &Snapshot) -> ChangeSet {
    let current_by_id: HashMap<&str, &CatalogEntry> = current
        .values()
        .map(|entry| (entry.id.as_str(), entry))
        .collect();
    let updated_ids: HashSet<&str> = updated.values().map(|entry| entry.id.as_str()).collect();

    let mut changes = ChangeSet::default();

    for (binding, entry) in updated {
        match current_by_id.get(entry.id.as_str()) {
            None => {
                changes.to_add.insert(binding.clone(), entry.clone());
            }
            Some(existing) if *existing != entry => {
                changes.to_update.insert(binding.clone(), entry.clone());
            }
            Some(_) => {}
        }
    }

    for (binding, entry) in current {
        if !updated_ids.contains(entry.id.as_str()) {
            changes.to_remove.insert(binding.clone(), entry.clone());
        }
    }

    changes
}
