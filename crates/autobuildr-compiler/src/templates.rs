// crates/autobuildr-compiler/src/templates.rs
// ============================================================================
// Module: Policy and Budget Templates
// Description: Per-task-type tool policies and base budgets.
// Purpose: Seed compiled specs with calibrated policies and budgets.
// Dependencies: autobuildr-core
// ============================================================================

//! ## Overview
//! Every task type carries a curated tool policy (read-mostly for audits,
//! write-capable for coding, test-runner for testing) and a base budget
//! pair. The global forbidden patterns (destructive shell commands,
//! credential exfiltration) are unioned into every template.

// ============================================================================
// SECTION: Imports
// ============================================================================

use autobuildr_core::TaskType;
use autobuildr_core::ToolPolicy;

// ============================================================================
// SECTION: Global Forbidden Patterns
// ============================================================================

/// Forbidden argument patterns applied to every compiled spec.
///
/// # Invariants
/// - Every entry compiles as a regular expression.
pub const GLOBAL_FORBIDDEN_PATTERNS: [&str; 6] = [
    r"rm\s+-rf\s+/",
    r"sudo\s+rm",
    r"mkfs\.",
    r"dd\s+if=.+of=/dev/",
    r"curl[^|]*\|\s*(sh|bash)",
    r"(AWS_SECRET|PRIVATE_KEY|api[_-]?key\s*=)",
];

// ============================================================================
// SECTION: Tool Sets
// ============================================================================

/// Read-only tool set for audit work.
const READ_TOOLS: [&str; 3] = ["read_file", "list_files", "search"];
/// Write-capable tool set for coding and refactoring work.
const WRITE_TOOLS: [&str; 5] = ["read_file", "list_files", "search", "write_file", "bash"];
/// Test-runner tool set for testing work.
const TEST_TOOLS: [&str; 4] = ["read_file", "list_files", "search", "bash"];
/// Documentation tool set.
const DOC_TOOLS: [&str; 4] = ["read_file", "list_files", "search", "write_file"];

// ============================================================================
// SECTION: Policy Templates
// ============================================================================

/// Builds the tool policy template for a task type, global forbidden
/// patterns included.
#[must_use]
pub fn policy_template(task_type: TaskType) -> ToolPolicy {
    let mut policy = match task_type {
        TaskType::Audit => ToolPolicy::allow_only(READ_TOOLS),
        TaskType::Coding | TaskType::Refactoring => ToolPolicy::allow_only(WRITE_TOOLS),
        TaskType::Testing => ToolPolicy::allow_only(TEST_TOOLS),
        TaskType::Documentation => ToolPolicy::allow_only(DOC_TOOLS),
        TaskType::Custom => ToolPolicy::allow_all(),
    };
    policy
        .forbidden_patterns
        .extend(GLOBAL_FORBIDDEN_PATTERNS.iter().map(|pattern| (*pattern).to_string()));
    if task_type == TaskType::Audit {
        policy.tool_hints.insert(
            "read_file".to_string(),
            "audit work is read-only; report findings instead of editing".to_string(),
        );
    }
    policy
}

// ============================================================================
// SECTION: Budget Templates
// ============================================================================

/// Base `(max_turns, timeout_seconds)` per task type, before scaling.
#[must_use]
pub const fn budget_template(task_type: TaskType) -> (u32, u64) {
    match task_type {
        TaskType::Coding => (30, 1_200),
        TaskType::Testing => (20, 900),
        TaskType::Refactoring => (25, 1_200),
        TaskType::Documentation => (15, 600),
        TaskType::Audit => (15, 900),
        TaskType::Custom => (20, 900),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
