// crates/autobuildr-graph/tests/scheduling.rs
// ============================================================================
// Module: Graph Scheduling Tests
// Description: Kahn ordering and scheduling score coverage.
// Purpose: Validate dependency-respecting order, priority tie-breaks,
//          partial results on cycles, and non-negative scores.
// ============================================================================

//! ## Overview
//! Scheduling coverage:
//! - `resolve` orders dependencies before dependents and breaks ties by
//!   priority, then id.
//! - Cycle members land in `circular_dependencies`, never in the order.
//! - `compute_scheduling_scores` is total, non-negative, favors
//!   high-unblock roots, and defaults cycle members to 0.

#![allow(
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use autobuildr_core::DEFAULT_FEATURE_PRIORITY;
use autobuildr_core::Feature;
use autobuildr_core::FeatureId;
use autobuildr_graph::compute_scheduling_scores;
use autobuildr_graph::resolve;

fn feature(id: i64, priority: i64, deps: &[i64]) -> Feature {
    Feature {
        id: FeatureId::new(id),
        priority,
        category: "coding".to_string(),
        name: format!("feature-{id}"),
        description: String::new(),
        steps: Vec::new(),
        passes: false,
        in_progress: false,
        dependencies: if deps.is_empty() {
            None
        } else {
            Some(deps.iter().copied().map(FeatureId::new).collect())
        },
    }
}

#[test]
fn dependencies_order_before_dependents() {
    let features = vec![
        feature(1, DEFAULT_FEATURE_PRIORITY, &[2]),
        feature(2, DEFAULT_FEATURE_PRIORITY, &[3]),
        feature(3, DEFAULT_FEATURE_PRIORITY, &[]),
    ];
    let resolution = resolve(&features);
    assert_eq!(
        resolution.ordered,
        vec![FeatureId::new(3), FeatureId::new(2), FeatureId::new(1)]
    );
    assert!(resolution.circular_dependencies.is_empty());
}

#[test]
fn ready_features_order_by_priority_then_id() {
    let features = vec![
        feature(1, 50, &[]),
        feature(2, 10, &[]),
        feature(3, 50, &[]),
    ];
    let resolution = resolve(&features);
    assert_eq!(
        resolution.ordered,
        vec![FeatureId::new(2), FeatureId::new(1), FeatureId::new(3)]
    );
}

#[test]
fn cycle_members_are_reported_not_ordered() {
    let features = vec![
        feature(1, DEFAULT_FEATURE_PRIORITY, &[]),
        feature(2, DEFAULT_FEATURE_PRIORITY, &[3]),
        feature(3, DEFAULT_FEATURE_PRIORITY, &[2]),
    ];
    let resolution = resolve(&features);
    assert_eq!(resolution.ordered, vec![FeatureId::new(1)]);
    assert_eq!(
        resolution.circular_dependencies,
        vec![FeatureId::new(2), FeatureId::new(3)]
    );
}

#[test]
fn missing_targets_do_not_block_resolution() {
    let features = vec![feature(1, DEFAULT_FEATURE_PRIORITY, &[99])];
    let resolution = resolve(&features);
    assert_eq!(resolution.ordered, vec![FeatureId::new(1)]);
}

#[test]
fn scores_are_total_and_non_negative() {
    let features = vec![
        feature(1, DEFAULT_FEATURE_PRIORITY, &[]),
        feature(2, DEFAULT_FEATURE_PRIORITY, &[1]),
        feature(3, DEFAULT_FEATURE_PRIORITY, &[1]),
        feature(4, DEFAULT_FEATURE_PRIORITY, &[2, 3]),
    ];
    let scores = compute_scheduling_scores(&features);
    assert_eq!(scores.len(), 4);
    for score in scores.values() {
        assert!(*score >= 0.0);
    }
    // The root unblocks everything downstream and must outrank the leaf.
    assert!(scores[&FeatureId::new(1)] > scores[&FeatureId::new(4)]);
}

#[test]
fn cycle_members_score_the_neutral_default() {
    let features = vec![
        feature(1, DEFAULT_FEATURE_PRIORITY, &[2]),
        feature(2, DEFAULT_FEATURE_PRIORITY, &[1]),
        feature(3, DEFAULT_FEATURE_PRIORITY, &[]),
    ];
    let scores = compute_scheduling_scores(&features);
    assert_eq!(scores.len(), 3);
    assert!((scores[&FeatureId::new(1)] - 0.0).abs() < f64::EPSILON);
    assert!((scores[&FeatureId::new(2)] - 0.0).abs() < f64::EPSILON);
    assert!(scores[&FeatureId::new(3)] > 0.0);
}

#[test]
fn dense_cyclic_graph_returns_scores_for_every_feature() {
    let ids: Vec<i64> = (1..=12).collect();
    let features: Vec<Feature> = ids
        .iter()
        .map(|id| {
            let deps: Vec<i64> = ids.iter().copied().filter(|other| other != id).collect();
            feature(*id, DEFAULT_FEATURE_PRIORITY, &deps)
        })
        .collect();
    let scores = compute_scheduling_scores(&features);
    assert_eq!(scores.len(), features.len());
    for score in scores.values() {
        assert!(*score >= 0.0);
    }
}
