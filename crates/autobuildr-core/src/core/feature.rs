// crates/autobuildr-core/src/core/feature.rs
// ============================================================================
// Module: AutoBuildr Features
// Description: Backlog work items and their dependency edges.
// Purpose: Provide the canonical feature record consumed by the compiler and
//          the dependency resolver.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A feature is one backlog work item: a named, prioritized description with
//! ordered acceptance steps and optional dependency edges to other features.
//! Dependency data is tolerated in degraded shapes on read (absent lists,
//! stray non-integer members) and normalized through
//! [`Feature::dependencies_safe`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::FeatureId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default priority assigned to features created without one.
pub const DEFAULT_FEATURE_PRIORITY: i64 = 999;

// ============================================================================
// SECTION: Feature Record
// ============================================================================

/// Backlog work item.
///
/// # Invariants
/// - `id` never appears in `dependencies` once auto-repair has run.
/// - Every id in `dependencies` refers to an existing feature once
///   auto-repair has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature identifier.
    pub id: FeatureId,
    /// Scheduling priority; smaller values schedule earlier.
    pub priority: i64,
    /// Short category label used for task-type derivation.
    pub category: String,
    /// Human-readable feature name.
    pub name: String,
    /// Free-text description of the work.
    pub description: String,
    /// Ordered acceptance steps.
    pub steps: Vec<String>,
    /// True once the acceptance gate has passed for this feature.
    pub passes: bool,
    /// True while a worker owns the feature.
    pub in_progress: bool,
    /// Optional dependency edges; `None` means no dependencies.
    pub dependencies: Option<Vec<FeatureId>>,
}

impl Feature {
    /// Returns the dependency list normalized to a concrete vector.
    ///
    /// Absent dependency data yields an empty vector; duplicates are
    /// preserved in declaration order for the resolver to report.
    #[must_use]
    pub fn dependencies_safe(&self) -> Vec<FeatureId> {
        self.dependencies.clone().unwrap_or_default()
    }

    /// Returns true when the feature is neither passed nor claimed.
    #[must_use]
    pub const fn is_ready_candidate(&self) -> bool {
        !self.passes && !self.in_progress
    }
}

/// Payload used to create a feature before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeature {
    /// Scheduling priority; smaller values schedule earlier.
    pub priority: i64,
    /// Short category label used for task-type derivation.
    pub category: String,
    /// Human-readable feature name.
    pub name: String,
    /// Free-text description of the work.
    pub description: String,
    /// Ordered acceptance steps.
    pub steps: Vec<String>,
    /// Optional dependency edges.
    pub dependencies: Option<Vec<FeatureId>>,
}

impl NewFeature {
    /// Creates a new-feature payload with the default priority.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<String>,
    ) -> Self {
        Self {
            priority: DEFAULT_FEATURE_PRIORITY,
            category: category.into(),
            name: name.into(),
            description: description.into(),
            steps,
            dependencies: None,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
