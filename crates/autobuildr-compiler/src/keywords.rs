// crates/autobuildr-compiler/src/keywords.rs
// ============================================================================
// Module: Task-Type Keywords
// Description: Static keyword tables mapping features to task types.
// Purpose: Derive a spec's task type from feature category and description.
// Dependencies: autobuildr-core
// ============================================================================

//! ## Overview
//! Task types derive from case-insensitive substring matches of the feature
//! category and description against static tables. The first matching table
//! wins; ties inside a table resolve by declaration order; no match falls
//! back to `coding`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use autobuildr_core::TaskType;

// ============================================================================
// SECTION: Keyword Tables
// ============================================================================

/// Keyword tables in match-priority order.
///
/// # Invariants
/// - Table order is authoritative: earlier tables win ties across tables.
pub const TASK_TYPE_KEYWORDS: [(TaskType, &[&str]); 5] = [
    (TaskType::Audit, &["security", "review", "audit", "vulnerability"]),
    (TaskType::Testing, &["test", "verify", "validate"]),
    (TaskType::Documentation, &["doc", "readme", "comments"]),
    (TaskType::Refactoring, &["refactor", "cleanup", "simplify", "optimize"]),
    (TaskType::Coding, &["implement", "build", "create", "add feature", "fix"]),
];

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Derives the task type from a feature's category and description.
#[must_use]
pub fn derive_task_type(category: &str, description: &str) -> TaskType {
    let haystack = format!("{} {}", category.to_lowercase(), description.to_lowercase());
    for (task_type, keywords) in TASK_TYPE_KEYWORDS {
        if keywords.iter().any(|keyword| haystack.contains(keyword)) {
            return task_type;
        }
    }
    TaskType::Coding
}

// ============================================================================
// SECTION: Tests
// ============================================================================
