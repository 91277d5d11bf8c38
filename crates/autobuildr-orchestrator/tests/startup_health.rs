// crates/autobuildr-orchestrator/tests/startup_health.rs
// ============================================================================
// Module: Startup Health Tests
// Description: Auto-repair and cycle-refusal coverage at startup.
// Purpose: Validate that repairs apply automatically, repairs are
//          idempotent, and cycles refuse startup with their path.
// ============================================================================

//! ## Overview
//! Startup coverage over the durable store:
//! - A clean graph reports healthy with no repairs.
//! - Self-references and orphans repair automatically.
//! - A two-feature cycle refuses startup and names the cycle path.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use autobuildr_core::FeatureId;
use autobuildr_core::NewFeature;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_orchestrator::HealthError;
use autobuildr_orchestrator::startup_health_check;
use autobuildr_store_sqlite::SqliteStore;
use tempfile::TempDir;

fn insert(store: &SqliteStore, name: &str, deps: Option<Vec<FeatureId>>) -> FeatureId {
    let feature = NewFeature {
        dependencies: deps,
        ..NewFeature::new("coding", name, "description", Vec::new())
    };
    store.insert_feature(&feature).unwrap().id
}

#[test]
fn clean_graphs_report_healthy() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_project(dir.path()).unwrap();
    let a = insert(&store, "a", None);
    insert(&store, "b", Some(vec![a]));

    let report = startup_health_check(&store).unwrap();
    assert!(report.validation.is_valid);
    assert!(report.repaired_self_references.is_empty());
    assert!(report.repaired_orphans.is_empty());
}

#[test]
fn auto_fixable_issues_are_repaired_in_place() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_project(dir.path()).unwrap();
    let a = insert(&store, "a", None);
    let b = insert(&store, "b", None);
    // b depends on itself and on a ghost feature.
    store.set_feature_dependencies(b, Some(&[b, a, FeatureId::new(777)])).unwrap();

    let report = startup_health_check(&store).unwrap();
    assert!(report.validation.is_valid);
    assert_eq!(report.repaired_self_references, vec![b]);
    assert_eq!(report.repaired_orphans, vec![b]);

    let repaired = store.get_feature(b).unwrap().unwrap();
    assert_eq!(repaired.dependencies_safe(), vec![a]);

    // Running the check again finds nothing left to repair.
    let second = startup_health_check(&store).unwrap();
    assert!(second.repaired_self_references.is_empty());
    assert!(second.repaired_orphans.is_empty());
}

#[test]
fn cycles_refuse_startup_with_their_path() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_project(dir.path()).unwrap();
    let a = insert(&store, "a", None);
    let b = insert(&store, "b", Some(vec![a]));
    store.set_feature_dependencies(a, Some(&[b])).unwrap();

    let err = startup_health_check(&store).unwrap_err();
    let HealthError::CyclesDetected { cycles } = err else {
        panic!("expected a cycle refusal");
    };
    assert_eq!(cycles, vec![vec![a, b]]);
}
