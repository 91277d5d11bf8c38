// crates/autobuildr-graph/tests/repair.rs
// ============================================================================
// Module: Dependency Repair Tests
// Description: Auto-repair coverage for self-references and orphans.
// Purpose: Validate repair correctness, idempotence, and preservation of
//          unrelated edges.
// ============================================================================

//! ## Overview
//! Repair coverage over the in-memory store:
//! - Self-referencing edges are removed; other edges survive.
//! - Orphaned edges are removed and reported per feature.
//! - Both repairs are idempotent: a second run changes nothing.

#![allow(
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use autobuildr_core::FeatureId;
use autobuildr_core::InMemoryStore;
use autobuildr_core::NewFeature;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_graph::repair_orphaned_dependencies;
use autobuildr_graph::repair_self_references;

fn insert(store: &InMemoryStore, name: &str, deps: Option<Vec<i64>>) -> FeatureId {
    let feature = NewFeature {
        dependencies: deps.map(|ids| ids.into_iter().map(FeatureId::new).collect()),
        ..NewFeature::new("coding", name, "description", Vec::new())
    };
    store.insert_feature(&feature).unwrap().id
}

#[test]
fn self_references_are_removed_and_other_edges_kept() {
    let store = InMemoryStore::new();
    let a = insert(&store, "a", None);
    let b = insert(&store, "b", Some(vec![a.get(), 2]));

    // b depends on itself (id 2) and on a; only the self edge goes.
    let repaired = repair_self_references(&store).unwrap();
    assert_eq!(repaired, vec![b]);

    let stored = store.get_feature(b).unwrap().unwrap();
    assert_eq!(stored.dependencies_safe(), vec![a]);
}

#[test]
fn self_reference_repair_is_idempotent() {
    let store = InMemoryStore::new();
    insert(&store, "a", Some(vec![1]));

    let first = repair_self_references(&store).unwrap();
    assert_eq!(first.len(), 1);
    let second = repair_self_references(&store).unwrap();
    assert!(second.is_empty());
}

#[test]
fn orphaned_dependencies_are_removed_and_reported() {
    let store = InMemoryStore::new();
    let a = insert(&store, "a", None);
    let b = insert(&store, "b", Some(vec![a.get(), 77, 88]));

    let removed = repair_orphaned_dependencies(&store).unwrap();
    assert_eq!(removed.get(&b).unwrap(), &vec![FeatureId::new(77), FeatureId::new(88)]);

    let stored = store.get_feature(b).unwrap().unwrap();
    assert_eq!(stored.dependencies_safe(), vec![a]);
}

#[test]
fn orphan_repair_is_idempotent() {
    let store = InMemoryStore::new();
    insert(&store, "a", Some(vec![55]));

    let first = repair_orphaned_dependencies(&store).unwrap();
    assert_eq!(first.len(), 1);
    let second = repair_orphaned_dependencies(&store).unwrap();
    assert!(second.is_empty());
}

#[test]
fn clean_stores_are_untouched() {
    let store = InMemoryStore::new();
    let a = insert(&store, "a", None);
    let b = insert(&store, "b", Some(vec![a.get()]));

    assert!(repair_self_references(&store).unwrap().is_empty());
    assert!(repair_orphaned_dependencies(&store).unwrap().is_empty());
    let stored = store.get_feature(b).unwrap().unwrap();
    assert_eq!(stored.dependencies_safe(), vec![a]);
}

#[test]
fn orphan_repair_leaves_self_references_for_the_other_repair() {
    let store = InMemoryStore::new();
    let a = insert(&store, "a", Some(vec![1, 99]));

    let removed = repair_orphaned_dependencies(&store).unwrap();
    assert_eq!(removed.get(&a).unwrap(), &vec![FeatureId::new(99)]);
    // The self edge survives orphan repair; it belongs to the other pass.
    let stored = store.get_feature(a).unwrap().unwrap();
    assert_eq!(stored.dependencies_safe(), vec![a]);

    let repaired = repair_self_references(&store).unwrap();
    assert_eq!(repaired, vec![a]);
    assert!(store.get_feature(a).unwrap().unwrap().dependencies_safe().is_empty());
}
