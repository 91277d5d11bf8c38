// crates/autobuildr-orchestrator/src/health.rs
// ============================================================================
// Module: Startup Health Check
// Description: Dependency-graph validation with auto-repair at startup.
// Purpose: Refuse to start on cycles; auto-fix self-references and orphans
//          with per-feature audit logs.
// Dependencies: autobuildr-core, autobuildr-graph
// ============================================================================

//! ## Overview
//! Before any run starts, the orchestrator validates the feature graph,
//! auto-applies the two repairs (self-references, orphaned dependencies)
//! with WARN-level per-feature audit logs, and revalidates. Remaining
//! cycles are non-auto-fixable: startup is refused with the cycle path and
//! remediation guidance, which the CLI maps to exit code 2.

// ============================================================================
// SECTION: Imports
// ============================================================================

use autobuildr_core::FeatureId;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::StoreError;
use autobuildr_graph::ValidationResult;
use autobuildr_graph::format_id_path;
use autobuildr_graph::repair_orphaned_dependencies;
use autobuildr_graph::repair_self_references;
use autobuildr_graph::validate;
use thiserror::Error;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup health failures.
///
/// # Invariants
/// - `CyclesDetected` carries normalized cycle paths for operator display.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Persistence failure during validation or repair.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Non-auto-fixable cycles block startup.
    #[error("dependency cycles block startup: {}", render_cycles(.cycles))]
    CyclesDetected {
        /// Normalized cycle paths.
        cycles: Vec<Vec<FeatureId>>,
    },
}

/// Renders cycle paths for the error display.
fn render_cycles(cycles: &[Vec<FeatureId>]) -> String {
    cycles.iter().map(|cycle| format!("[{}]", format_id_path(cycle))).collect::<Vec<_>>().join(" ")
}

// ============================================================================
// SECTION: Health Report
// ============================================================================

/// Outcome of a successful startup health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Features whose self-references were repaired.
    pub repaired_self_references: Vec<FeatureId>,
    /// Features whose orphaned dependencies were repaired.
    pub repaired_orphans: Vec<FeatureId>,
    /// Final validation result after repairs.
    pub validation: ValidationResult,
}

/// Remediation guidance printed alongside a cycle refusal.
pub const CYCLE_REMEDIATION: &str = "break the cycle by removing one dependency edge from the \
     listed features, then start again";

// ============================================================================
// SECTION: Health Check
// ============================================================================

/// Runs the startup health check: validate, auto-repair, revalidate.
///
/// # Errors
///
/// Returns [`HealthError::CyclesDetected`] when cycles remain after
/// repairs, or [`HealthError::Store`] on persistence failures.
pub fn startup_health_check(store: &dyn FeatureStore) -> Result<HealthReport, HealthError> {
    let initial = validate(&store.list_features()?);
    if initial.is_valid {
        info!(summary = %initial.summary, "dependency graph healthy");
        return Ok(HealthReport {
            repaired_self_references: Vec::new(),
            repaired_orphans: Vec::new(),
            validation: initial,
        });
    }

    for issue in &initial.issues {
        if issue.auto_fixable {
            warn!(
                feature_id = %issue.feature_id,
                detail = %issue.detail,
                "auto-repairing dependency issue"
            );
        }
    }

    let repaired_self_references = repair_self_references(store)?;
    let repaired_orphans: Vec<FeatureId> =
        repair_orphaned_dependencies(store)?.keys().copied().collect();

    let validation = validate(&store.list_features()?);
    if !validation.cycles.is_empty() {
        return Err(HealthError::CyclesDetected {
            cycles: validation.cycles,
        });
    }

    info!(
        self_references = repaired_self_references.len(),
        orphans = repaired_orphans.len(),
        summary = %validation.summary,
        "dependency graph repaired"
    );
    Ok(HealthReport {
        repaired_self_references,
        repaired_orphans,
        validation,
    })
}
