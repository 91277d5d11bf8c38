// crates/autobuildr-graph/src/graph.rs
// ============================================================================
// Module: Feature Graph Algorithms
// Description: Validation, topological scheduling, and scoring over the
//              feature dependency graph.
// Purpose: Provide cycle-safe graph algorithms that never raise and never
//          hang.
// Dependencies: autobuildr-core, serde, tracing
// ============================================================================

//! ## Overview
//! The feature graph is an index-keyed adjacency map over feature ids, never
//! object pointers. Every traversal carries an explicit visited set (or
//! in-degree map for Kahn) and an enforced iteration ceiling of `2·|V|`.
//! When the ceiling is hit, the algorithm logs an ERROR with the algorithm
//! name, iteration count, and feature count, and returns partial safe
//! results: unprocessed nodes receive a neutral default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use autobuildr_core::Feature;
use autobuildr_core::FeatureId;
use serde::Deserialize;
use serde::Serialize;
use tracing::error;

// ============================================================================
// SECTION: Iteration Ceiling
// ============================================================================

/// Returns the iteration ceiling for a graph of `n` features.
#[must_use]
pub const fn iteration_ceiling(n: usize) -> usize {
    2 * n
}

/// Logs the standard iteration-ceiling bailout.
fn log_bailout(algorithm: &str, iterations: usize, feature_count: usize) {
    error!(
        "algorithm={algorithm} iteration_limit_exceeded iterations={iterations} \
         feature_count={feature_count} returning_partial_results"
    );
}

// ============================================================================
// SECTION: Adjacency
// ============================================================================

/// Builds the dependency map `feature -> its dependencies` over known ids.
fn dependency_map(features: &[Feature]) -> BTreeMap<FeatureId, Vec<FeatureId>> {
    features
        .iter()
        .map(|feature| (feature.id, feature.dependencies_safe()))
        .collect()
}

/// Builds the reverse map `feature -> features depending on it`.
fn dependent_map(features: &[Feature]) -> BTreeMap<FeatureId, Vec<FeatureId>> {
    let mut dependents: BTreeMap<FeatureId, Vec<FeatureId>> =
        features.iter().map(|feature| (feature.id, Vec::new())).collect();
    for feature in features {
        for dependency in feature.dependencies_safe() {
            if let Some(entry) = dependents.get_mut(&dependency) {
                entry.push(feature.id);
            }
        }
    }
    dependents
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Classification of one dependency issue.
///
/// # Invariants
/// - Variants are stable for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Feature depends on itself.
    SelfReference,
    /// Dependency points at a non-existent feature.
    MissingTarget,
    /// Feature participates in a dependency cycle.
    Cycle,
}

/// One reported dependency issue.
///
/// # Invariants
/// - `auto_fixable` is true for self-references and missing targets only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyIssue {
    /// Issue classification.
    pub kind: IssueKind,
    /// Feature the issue is reported against.
    pub feature_id: FeatureId,
    /// Human-readable description.
    pub detail: String,
    /// True when auto-repair can fix the issue.
    pub auto_fixable: bool,
}

/// Result of validating the feature graph.
///
/// # Invariants
/// - `is_valid` is true iff every issue list is empty.
/// - Cycle paths are normalized to start at their smallest id and
///   deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Features depending on themselves.
    pub self_references: Vec<FeatureId>,
    /// Missing dependency targets, keyed by the referencing feature.
    pub missing_targets: BTreeMap<FeatureId, Vec<FeatureId>>,
    /// Normalized, deduplicated cycle paths of length >= 2.
    pub cycles: Vec<Vec<FeatureId>>,
    /// Flat issue list in detection order.
    pub issues: Vec<DependencyIssue>,
    /// One-line summary for operator display.
    pub summary: String,
    /// True when the graph is clean.
    pub is_valid: bool,
}

/// Validates the feature graph. Never raises.
#[must_use]
pub fn validate(features: &[Feature]) -> ValidationResult {
    let known: BTreeSet<FeatureId> = features.iter().map(|feature| feature.id).collect();
    let mut self_references = Vec::new();
    let mut missing_targets: BTreeMap<FeatureId, Vec<FeatureId>> = BTreeMap::new();
    let mut issues = Vec::new();

    for feature in features {
        for dependency in feature.dependencies_safe() {
            if dependency == feature.id {
                if !self_references.contains(&feature.id) {
                    self_references.push(feature.id);
                    issues.push(DependencyIssue {
                        kind: IssueKind::SelfReference,
                        feature_id: feature.id,
                        detail: format!("feature {} depends on itself", feature.id),
                        auto_fixable: true,
                    });
                }
            } else if !known.contains(&dependency) {
                let entry = missing_targets.entry(feature.id).or_default();
                if !entry.contains(&dependency) {
                    entry.push(dependency);
                    issues.push(DependencyIssue {
                        kind: IssueKind::MissingTarget,
                        feature_id: feature.id,
                        detail: format!(
                            "feature {} depends on missing feature {dependency}",
                            feature.id
                        ),
                        auto_fixable: true,
                    });
                }
            }
        }
    }

    let cycles = find_cycles(features);
    for cycle in &cycles {
        let path = format_id_path(cycle);
        issues.push(DependencyIssue {
            kind: IssueKind::Cycle,
            feature_id: cycle[0],
            detail: format!("dependency cycle: [{path}]"),
            auto_fixable: false,
        });
    }

    let is_valid = self_references.is_empty() && missing_targets.is_empty() && cycles.is_empty();
    let summary = if is_valid {
        format!("dependency graph valid: {} features", features.len())
    } else {
        format!(
            "dependency graph invalid: {} self-references, {} features with missing targets, \
             {} cycles",
            self_references.len(),
            missing_targets.len(),
            cycles.len()
        )
    };

    ValidationResult {
        self_references,
        missing_targets,
        cycles,
        issues,
        summary,
        is_valid,
    }
}

/// Finds dependency cycles of length >= 2 via iterative DFS.
///
/// Self-references are excluded (they are reported separately). Paths are
/// normalized to start at their smallest id and deduplicated.
fn find_cycles(features: &[Feature]) -> Vec<Vec<FeatureId>> {
    let known: BTreeSet<FeatureId> = features.iter().map(|feature| feature.id).collect();
    let adjacency = dependency_map(features);
    let ceiling = iteration_ceiling(features.len()).max(1);

    let mut cycles: Vec<Vec<FeatureId>> = Vec::new();
    let mut finished: BTreeSet<FeatureId> = BTreeSet::new();
    let mut iterations = 0_usize;

    for feature in features {
        if finished.contains(&feature.id) {
            continue;
        }
        // Iterative DFS with an explicit path stack.
        let mut stack: Vec<(FeatureId, usize)> = vec![(feature.id, 0)];
        let mut path: Vec<FeatureId> = Vec::new();
        let mut on_path: BTreeSet<FeatureId> = BTreeSet::new();

        while let Some((node, edge_index)) = stack.pop() {
            iterations += 1;
            if iterations > ceiling {
                log_bailout("find_cycles", iterations, features.len());
                return normalize_cycles(cycles);
            }
            if edge_index == 0 {
                path.push(node);
                on_path.insert(node);
            }
            let edges: &[FeatureId] = adjacency.get(&node).map_or(&[], Vec::as_slice);
            let mut advanced = false;
            for (offset, next) in edges.iter().enumerate().skip(edge_index) {
                let next = *next;
                if next == node || !known.contains(&next) {
                    continue;
                }
                if on_path.contains(&next) {
                    // Found a cycle: slice the path from the repeated node.
                    if let Some(start) = path.iter().position(|id| *id == next) {
                        cycles.push(path[start..].to_vec());
                    }
                    continue;
                }
                if finished.contains(&next) {
                    continue;
                }
                stack.push((node, offset + 1));
                stack.push((next, 0));
                advanced = true;
                break;
            }
            if !advanced {
                finished.insert(node);
                on_path.remove(&node);
                path.pop();
            }
        }
    }

    normalize_cycles(cycles)
}

/// Rotates each cycle to start at its smallest id and removes duplicates.
fn normalize_cycles(cycles: Vec<Vec<FeatureId>>) -> Vec<Vec<FeatureId>> {
    let mut normalized: Vec<Vec<FeatureId>> = Vec::new();
    for cycle in cycles {
        if cycle.len() < 2 {
            continue;
        }
        let smallest = cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map_or(0, |(index, _)| index);
        let mut rotated = Vec::with_capacity(cycle.len());
        for offset in 0..cycle.len() {
            rotated.push(cycle[(smallest + offset) % cycle.len()]);
        }
        if !normalized.contains(&rotated) {
            normalized.push(rotated);
        }
    }
    normalized.sort();
    normalized
}

/// Renders an id path as a comma-separated string.
#[must_use]
pub fn format_id_path(path: &[FeatureId]) -> String {
    path.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Topological Resolution
// ============================================================================

/// Result of topological scheduling.
///
/// # Invariants
/// - `ordered` respects dependency order for every acyclic feature.
/// - `circular_dependencies` holds the ids left unordered by a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Features in executable order.
    pub ordered: Vec<FeatureId>,
    /// Features stuck in cycles, in id order.
    pub circular_dependencies: Vec<FeatureId>,
}

/// Orders features via Kahn's algorithm, ready set ordered by
/// `(priority, id)`. Never raises; cycle members are returned separately.
#[must_use]
pub fn resolve(features: &[Feature]) -> Resolution {
    let known: BTreeSet<FeatureId> = features.iter().map(|feature| feature.id).collect();
    let priorities: BTreeMap<FeatureId, i64> =
        features.iter().map(|feature| (feature.id, feature.priority)).collect();
    let dependents = dependent_map(features);
    let ceiling = iteration_ceiling(features.len()).max(1);

    let mut in_degree: BTreeMap<FeatureId, usize> = BTreeMap::new();
    for feature in features {
        let degree = feature
            .dependencies_safe()
            .iter()
            .filter(|dependency| **dependency != feature.id && known.contains(dependency))
            .count();
        in_degree.insert(feature.id, degree);
    }

    // Ready set keyed by (priority, id) so equal-priority ties stay stable.
    let mut ready: BTreeSet<(i64, FeatureId)> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| (priorities.get(id).copied().unwrap_or(i64::MAX), *id))
        .collect();

    let mut ordered = Vec::with_capacity(features.len());
    let mut iterations = 0_usize;

    while let Some(&(priority, id)) = ready.iter().next() {
        iterations += 1;
        if iterations > ceiling {
            log_bailout("resolve", iterations, features.len());
            break;
        }
        ready.remove(&(priority, id));
        ordered.push(id);
        for dependent in dependents.get(&id).map_or(&[] as &[FeatureId], Vec::as_slice) {
            if let Some(degree) = in_degree.get_mut(dependent) {
                if *degree > 0 {
                    *degree -= 1;
                }
                if *degree == 0 {
                    ready.insert((
                        priorities.get(dependent).copied().unwrap_or(i64::MAX),
                        *dependent,
                    ));
                }
            }
        }
    }

    let circular_dependencies: Vec<FeatureId> =
        known.iter().filter(|id| !ordered.contains(id)).copied().collect();
    Resolution {
        ordered,
        circular_dependencies,
    }
}

// ============================================================================
// SECTION: Scheduling Scores
// ============================================================================

/// Computes a non-negative scheduling score per feature.
///
/// The score blends upstream depth (root-proximity: shallow features score
/// higher) with the downstream unblock count (how many features become
/// reachable once this one completes). Unprocessed nodes (cycle members,
/// ceiling bailouts) receive the neutral default 0.
#[must_use]
pub fn compute_scheduling_scores(features: &[Feature]) -> BTreeMap<FeatureId, f64> {
    let mut scores: BTreeMap<FeatureId, f64> =
        features.iter().map(|feature| (feature.id, 0.0)).collect();
    let depths = bfs_depths(features);
    let unblocks = downstream_counts(features);

    for feature in features {
        let Some(depth) = depths.get(&feature.id) else {
            // Unreachable from any root (cycle member): neutral default.
            continue;
        };
        let proximity = 1.0 / (1.0 + *depth as f64);
        let unblock = unblocks.get(&feature.id).copied().unwrap_or(0);
        scores.insert(feature.id, proximity + unblock as f64);
    }
    scores
}

/// BFS levels from the dependency roots (in-degree 0 features).
fn bfs_depths(features: &[Feature]) -> BTreeMap<FeatureId, u32> {
    let known: BTreeSet<FeatureId> = features.iter().map(|feature| feature.id).collect();
    let dependents = dependent_map(features);
    let ceiling = iteration_ceiling(features.len()).max(1);

    let mut depths: BTreeMap<FeatureId, u32> = BTreeMap::new();
    let mut queue: VecDeque<FeatureId> = VecDeque::new();
    for feature in features {
        let rooted = feature
            .dependencies_safe()
            .iter()
            .all(|dependency| *dependency == feature.id || !known.contains(dependency));
        if rooted {
            depths.insert(feature.id, 0);
            queue.push_back(feature.id);
        }
    }

    let mut iterations = 0_usize;
    let mut visited: BTreeSet<FeatureId> = depths.keys().copied().collect();
    while let Some(node) = queue.pop_front() {
        iterations += 1;
        if iterations > ceiling {
            log_bailout("compute_scheduling_scores", iterations, features.len());
            break;
        }
        let level = depths.get(&node).copied().unwrap_or(0);
        for dependent in dependents.get(&node).map_or(&[] as &[FeatureId], Vec::as_slice) {
            if visited.insert(*dependent) {
                depths.insert(*dependent, level + 1);
                queue.push_back(*dependent);
            }
        }
    }
    depths
}

/// Counts transitive dependents per feature with bounded BFS.
fn downstream_counts(features: &[Feature]) -> BTreeMap<FeatureId, usize> {
    let dependents = dependent_map(features);
    let ceiling = iteration_ceiling(features.len()).max(1);
    let mut counts = BTreeMap::new();

    for feature in features {
        let mut visited: BTreeSet<FeatureId> = BTreeSet::new();
        let mut queue: VecDeque<FeatureId> = VecDeque::new();
        queue.push_back(feature.id);
        visited.insert(feature.id);
        let mut iterations = 0_usize;
        let mut bailed = false;
        while let Some(node) = queue.pop_front() {
            iterations += 1;
            if iterations > ceiling {
                log_bailout("downstream_counts", iterations, features.len());
                bailed = true;
                break;
            }
            for dependent in dependents.get(&node).map_or(&[] as &[FeatureId], Vec::as_slice) {
                if visited.insert(*dependent) {
                    queue.push_back(*dependent);
                }
            }
        }
        if bailed {
            counts.insert(feature.id, 0);
        } else {
            counts.insert(feature.id, visited.len() - 1);
        }
    }
    counts
}

// ============================================================================
// SECTION: Cycle Probe
// ============================================================================

/// Returns true when adding the edge `from -> to` would create a cycle.
///
/// Adding a dependency from `from` onto `to` is circular when `from` is
/// already reachable from `to` through existing dependencies, or when the
/// edge is a self-reference.
#[must_use]
pub fn would_create_circular_dependency(
    features: &[Feature],
    from: FeatureId,
    to: FeatureId,
) -> bool {
    if from == to {
        return true;
    }
    let adjacency = dependency_map(features);
    let ceiling = iteration_ceiling(features.len()).max(1);

    let mut visited: BTreeSet<FeatureId> = BTreeSet::new();
    let mut queue: VecDeque<FeatureId> = VecDeque::new();
    queue.push_back(to);
    visited.insert(to);
    let mut iterations = 0_usize;

    while let Some(node) = queue.pop_front() {
        iterations += 1;
        if iterations > ceiling {
            log_bailout("would_create_circular_dependency", iterations, features.len());
            // Fail closed: report a cycle rather than allow a possible one.
            return true;
        }
        if node == from {
            return true;
        }
        for next in adjacency.get(&node).map_or(&[] as &[FeatureId], Vec::as_slice) {
            if visited.insert(*next) {
                queue.push_back(*next);
            }
        }
    }
    false
}
