// crates/autobuildr-graph/src/repair.rs
// ============================================================================
// Module: Dependency Auto-Repair
// Description: Idempotent repair of self-references and orphaned edges.
// Purpose: Fix the auto-fixable dependency issues in one transaction each,
//          with structured before/after audit logs.
// Dependencies: autobuildr-core, tracing
// ============================================================================

//! ## Overview
//! Two repairs are auto-applicable: dropping self-referencing edges and
//! dropping edges whose target feature no longer exists. Each repair
//! computes its full update set, logs the before state per feature, commits
//! a single bulk transaction, and logs the after state. Running a repair
//! twice yields no additional changes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use autobuildr_core::FeatureId;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::StoreError;
use tracing::info;

// ============================================================================
// SECTION: Self-Reference Repair
// ============================================================================

/// Removes self-referencing dependency edges.
///
/// Returns the repaired feature ids. Idempotent: a second invocation finds
/// nothing to repair.
///
/// # Errors
///
/// Returns [`StoreError`] when reading or committing fails.
pub fn repair_self_references(store: &dyn FeatureStore) -> Result<Vec<FeatureId>, StoreError> {
    let features = store.list_features()?;
    let mut updates: Vec<(FeatureId, Option<Vec<FeatureId>>)> = Vec::new();
    let mut repaired = Vec::new();

    for feature in &features {
        let dependencies = feature.dependencies_safe();
        if !dependencies.contains(&feature.id) {
            continue;
        }
        let new_deps: Vec<FeatureId> =
            dependencies.iter().copied().filter(|dependency| *dependency != feature.id).collect();
        info!(
            "action=before_fix feature_id={} original_deps=[{}]",
            feature.id,
            format_ids(&dependencies)
        );
        repaired.push(feature.id);
        updates.push((feature.id, Some(new_deps)));
    }

    if updates.is_empty() {
        return Ok(repaired);
    }
    store.set_dependencies_bulk(&updates)?;
    for (id, new_deps) in &updates {
        info!(
            "action=after_fix feature_id={id} new_deps=[{}]",
            format_ids(new_deps.as_deref().unwrap_or(&[]))
        );
    }
    Ok(repaired)
}

// ============================================================================
// SECTION: Orphaned-Dependency Repair
// ============================================================================

/// Removes dependency edges pointing at non-existent features.
///
/// Returns, per repaired feature, the removed target ids. Idempotent: a
/// second invocation finds nothing to repair.
///
/// # Errors
///
/// Returns [`StoreError`] when reading or committing fails.
pub fn repair_orphaned_dependencies(
    store: &dyn FeatureStore,
) -> Result<BTreeMap<FeatureId, Vec<FeatureId>>, StoreError> {
    let features = store.list_features()?;
    let known: BTreeSet<FeatureId> = features.iter().map(|feature| feature.id).collect();

    let mut updates: Vec<(FeatureId, Option<Vec<FeatureId>>)> = Vec::new();
    let mut removed: BTreeMap<FeatureId, Vec<FeatureId>> = BTreeMap::new();

    for feature in &features {
        let dependencies = feature.dependencies_safe();
        let orphans: Vec<FeatureId> = dependencies
            .iter()
            .copied()
            .filter(|dependency| *dependency != feature.id && !known.contains(dependency))
            .collect();
        if orphans.is_empty() {
            continue;
        }
        let new_deps: Vec<FeatureId> = dependencies
            .iter()
            .copied()
            .filter(|dependency| !orphans.contains(dependency))
            .collect();
        info!(
            "action=before_fix feature_id={} original_deps=[{}] orphaned=[{}]",
            feature.id,
            format_ids(&dependencies),
            format_ids(&orphans)
        );
        removed.insert(feature.id, orphans);
        updates.push((feature.id, Some(new_deps)));
    }

    if updates.is_empty() {
        return Ok(removed);
    }
    store.set_dependencies_bulk(&updates)?;
    for (id, new_deps) in &updates {
        info!(
            "action=after_fix feature_id={id} new_deps=[{}]",
            format_ids(new_deps.as_deref().unwrap_or(&[]))
        );
    }
    Ok(removed)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders ids as a comma-separated list for log messages.
fn format_ids(ids: &[FeatureId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
