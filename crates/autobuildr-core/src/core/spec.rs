// crates/autobuildr-core/src/core/spec.rs
// ============================================================================
// Module: AutoBuildr Agent Specs
// Description: Runnable agent specifications with budgets and tool policy.
// Purpose: Provide the immutable execution primitive produced by the compiler
//          and consumed by the harness kernel.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An agent spec describes what an agent must do: an objective, a task type,
//! a tool policy, and hard execution budgets. Specs are immutable once
//! created except for budget and policy edits; spec names are unique,
//! URL-safe slugs used for agent snapshot file names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::FeatureId;
use crate::core::identifiers::SpecId;
use crate::core::policy::ToolPolicy;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Budget Bounds
// ============================================================================

/// Minimum turn budget for any spec.
pub const MIN_MAX_TURNS: u32 = 1;
/// Maximum turn budget for any spec.
pub const MAX_MAX_TURNS: u32 = 500;
/// Minimum wall-clock budget in seconds for any spec.
pub const MIN_TIMEOUT_SECONDS: u64 = 60;
/// Maximum wall-clock budget in seconds for any spec.
pub const MAX_TIMEOUT_SECONDS: u64 = 7_200;
/// Maximum spec name length in characters.
pub const MAX_SPEC_NAME_LEN: usize = 100;

// ============================================================================
// SECTION: Task Type
// ============================================================================

/// Closed set of task types a spec may carry.
///
/// # Invariants
/// - Variants are stable for serialization and schema CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Implementation work producing file changes.
    Coding,
    /// Test execution and verification work.
    Testing,
    /// Restructuring work without behavior change.
    Refactoring,
    /// Documentation work.
    Documentation,
    /// Read-mostly review work.
    Audit,
    /// Caller-defined task type.
    Custom,
}

impl TaskType {
    /// Returns the stable wire label for the task type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::Testing => "testing",
            Self::Refactoring => "refactoring",
            Self::Documentation => "documentation",
            Self::Audit => "audit",
            Self::Custom => "custom",
        }
    }

    /// Parses a stable wire label back into a task type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "coding" => Some(Self::Coding),
            "testing" => Some(Self::Testing),
            "refactoring" => Some(Self::Refactoring),
            "documentation" => Some(Self::Documentation),
            "audit" => Some(Self::Audit),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Agent Spec
// ============================================================================

/// Runnable agent specification.
///
/// # Invariants
/// - `name` is unique, URL-safe, and at most [`MAX_SPEC_NAME_LEN`] chars.
/// - `max_turns` lies in [`MIN_MAX_TURNS`]..=[`MAX_MAX_TURNS`].
/// - `timeout_seconds` lies in
///   [`MIN_TIMEOUT_SECONDS`]..=[`MAX_TIMEOUT_SECONDS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Spec identifier.
    pub id: SpecId,
    /// Unique URL-safe slug.
    pub name: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Optional icon tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Spec schema version.
    pub spec_version: String,
    /// Free-text objective for the agent.
    pub objective: String,
    /// Task type driving policy templates and budgets.
    pub task_type: TaskType,
    /// Opaque context map composed into the system prompt.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    /// Tool policy enforced on every tool event.
    pub tool_policy: ToolPolicy,
    /// Maximum number of executor turns.
    pub max_turns: u32,
    /// Maximum wall-clock seconds for a run.
    pub timeout_seconds: u64,
    /// Optional parent spec for fallback chains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_spec_id: Option<SpecId>,
    /// Optional feature this spec was compiled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_feature_id: Option<FeatureId>,
    /// Optional on-disk snapshot path for materialized agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_path: Option<String>,
    /// Scheduling priority; smaller values schedule earlier.
    pub priority: i64,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl AgentSpec {
    /// Default spec schema version.
    pub const DEFAULT_SPEC_VERSION: &'static str = "v1";

    /// Validates the spec's structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), SpecError> {
        validate_spec_name(&self.name)?;
        if !(MIN_MAX_TURNS..=MAX_MAX_TURNS).contains(&self.max_turns) {
            return Err(SpecError::TurnBudgetOutOfBounds(self.max_turns));
        }
        if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(SpecError::TimeoutOutOfBounds(self.timeout_seconds));
        }
        if self.tool_policy.policy_version.is_empty() {
            return Err(SpecError::MissingPolicyVersion);
        }
        if self.objective.trim().is_empty() {
            return Err(SpecError::EmptyObjective);
        }
        Ok(())
    }
}

/// Validates a spec name slug.
///
/// # Errors
///
/// Returns [`SpecError::InvalidName`] when the slug is empty, too long, or
/// contains characters outside `[a-z0-9._-]`.
pub fn validate_spec_name(name: &str) -> Result<(), SpecError> {
    let url_safe = !name.is_empty()
        && name.len() <= MAX_SPEC_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_' || b == b'.');
    if url_safe {
        Ok(())
    } else {
        Err(SpecError::InvalidName(name.to_string()))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Agent spec validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// Spec name is empty, too long, or not URL-safe.
    #[error("invalid spec name: {0:?}")]
    InvalidName(String),
    /// Turn budget lies outside the global bounds.
    #[error("max_turns out of bounds: {0} (allowed {MIN_MAX_TURNS}..={MAX_MAX_TURNS})")]
    TurnBudgetOutOfBounds(u32),
    /// Wall-clock budget lies outside the global bounds.
    #[error(
        "timeout_seconds out of bounds: {0} (allowed {MIN_TIMEOUT_SECONDS}..={MAX_TIMEOUT_SECONDS})"
    )]
    TimeoutOutOfBounds(u64),
    /// Tool policy is missing its version tag.
    #[error("tool policy is missing policy_version")]
    MissingPolicyVersion,
    /// Objective text is empty.
    #[error("spec objective is empty")]
    EmptyObjective,
    /// Unknown task type label encountered at a persistence boundary.
    #[error("unknown task type: {0:?}")]
    UnknownTaskType(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    fn sample_spec() -> AgentSpec {
        AgentSpec {
            id: SpecId::new("spec-1"),
            name: "coding-implement-login".to_string(),
            display_name: "Implement login".to_string(),
            icon: None,
            spec_version: AgentSpec::DEFAULT_SPEC_VERSION.to_string(),
            objective: "Implement login".to_string(),
            task_type: TaskType::Coding,
            context: BTreeMap::new(),
            tool_policy: ToolPolicy::allow_all(),
            max_turns: 30,
            timeout_seconds: 600,
            parent_spec_id: None,
            source_feature_id: None,
            spec_path: None,
            priority: 999,
            tags: Vec::new(),
            created_at: Timestamp::from_unix_millis(0),
        }
    }

    #[test]
    fn valid_spec_passes_validation() {
        assert_eq!(sample_spec().validate(), Ok(()));
    }

    #[test]
    fn budgets_outside_bounds_are_rejected() {
        let mut spec = sample_spec();
        spec.max_turns = 0;
        assert_eq!(spec.validate(), Err(SpecError::TurnBudgetOutOfBounds(0)));
        spec.max_turns = 30;
        spec.timeout_seconds = 10;
        assert_eq!(spec.validate(), Err(SpecError::TimeoutOutOfBounds(10)));
    }

    #[test]
    fn spec_names_must_be_url_safe() {
        assert!(validate_spec_name("coding-login.v1").is_ok());
        assert!(validate_spec_name("").is_err());
        assert!(validate_spec_name("Has Spaces").is_err());
        assert!(validate_spec_name(&"x".repeat(MAX_SPEC_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn task_type_labels_round_trip() {
        for task_type in [
            TaskType::Coding,
            TaskType::Testing,
            TaskType::Refactoring,
            TaskType::Documentation,
            TaskType::Audit,
            TaskType::Custom,
        ] {
            assert_eq!(TaskType::parse(task_type.as_str()), Some(task_type));
        }
        assert_eq!(TaskType::parse("unknown"), None);
    }
}
