// crates/autobuildr-core/src/runtime/policy.rs
// ============================================================================
// Module: Tool Policy Enforcer
// Description: Synchronous enforcement of tool policies on tool events.
// Purpose: Block forbidden tools, forbidden argument patterns, and sandbox
//          escapes before a tool result is considered.
// Dependencies: crate::core, regex-lite, serde_json
// ============================================================================

//! ## Overview
//! The enforcer compiles a [`ToolPolicy`] once per spec load and checks every
//! tool event in a fixed order: forbidden tools, allowed-tools membership,
//! forbidden argument patterns, then directory sandboxing for file-accessing
//! tools. Blocked events never abort the run; the kernel records a
//! `policy_violation` event plus a synthetic blocked `tool_result`.
//!
//! Path arguments are defended against traversal (`..` components), NUL
//! bytes, URL-encoded traversal (`%2e%2e`), and symlink escapes (paths are
//! canonicalized before the prefix check). When directory sandboxing is
//! active, non-absolute paths are rejected outright.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use regex_lite::Regex;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::ToolEvent;
use crate::core::ToolPolicy;

// ============================================================================
// SECTION: Compilation Errors
// ============================================================================

/// A forbidden pattern failed to compile at spec load.
///
/// # Invariants
/// - Carries the offending pattern verbatim for operator diagnosis.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("forbidden pattern failed to compile: {pattern:?}: {message}")]
pub struct PatternCompilationError {
    /// Pattern source text.
    pub pattern: String,
    /// Compiler error message.
    pub message: String,
}

// ============================================================================
// SECTION: Violations
// ============================================================================

/// Violation classification for blocked tool events.
///
/// # Invariants
/// - Variants are stable for event payloads and reporting counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyViolationKind {
    /// Tool named in `forbidden_tools`.
    ForbiddenTool,
    /// Tool absent from a non-empty `allowed_tools` set.
    ToolNotAllowed,
    /// Serialized arguments matched a forbidden pattern.
    ForbiddenPattern,
    /// Path argument escaped the allowed directory roots.
    DirectoryDenied,
    /// Path argument was malformed (NUL, traversal, non-absolute).
    MalformedPath,
}

impl PolicyViolationKind {
    /// Returns the stable wire label for the violation kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ForbiddenTool => "forbidden_tool",
            Self::ToolNotAllowed => "tool_not_allowed",
            Self::ForbiddenPattern => "forbidden_pattern",
            Self::DirectoryDenied => "directory_denied",
            Self::MalformedPath => "malformed_path",
        }
    }
}

/// One blocked tool event.
///
/// # Invariants
/// - `detail` is a short summary of the offending value, never the full
///   argument payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PolicyViolation {
    /// Violation classification.
    pub kind: PolicyViolationKind,
    /// Tool whose event was blocked.
    pub tool_name: String,
    /// Summary of the offending value.
    pub detail: String,
}

/// Outcome of checking one tool event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCheck {
    /// Event passes the policy.
    Allowed,
    /// Event is blocked; the kernel records the violation.
    Blocked(PolicyViolation),
}

/// Builds the canonical blocked payload substituted for a tool result.
///
/// Executors must observe that blocked events do not advance external state;
/// this payload is the well-known shape they receive instead of a result.
#[must_use]
pub fn blocked_tool_result(violation: &PolicyViolation) -> Value {
    json!({
        "error": "tool_blocked",
        "blocked": true,
        "violation": violation.kind.as_str(),
        "tool": violation.tool_name,
        "detail": violation.detail,
    })
}

// ============================================================================
// SECTION: Compiled Policy
// ============================================================================

/// Argument keys treated as path-bearing for directory sandboxing.
///
/// A tool event is considered file-accessing when any top-level argument key
/// contains one of these fragments (or equals `cwd`).
const PATH_KEY_FRAGMENTS: [&str; 3] = ["path", "file", "dir"];

/// A tool policy with its patterns compiled and sandbox roots normalized.
///
/// # Invariants
/// - `patterns` preserves the declaration order of `forbidden_patterns`.
/// - `allowed_roots` are absolute; symlinked roots are canonicalized when
///   they exist at compile time.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    /// Source policy value.
    policy: ToolPolicy,
    /// Compiled forbidden patterns in declaration order.
    patterns: Vec<(String, Regex)>,
    /// Canonicalized sandbox roots, when directory sandboxing is active.
    allowed_roots: Option<Vec<PathBuf>>,
}

impl CompiledPolicy {
    /// Compiles a tool policy.
    ///
    /// # Errors
    ///
    /// Returns [`PatternCompilationError`] for the first pattern that fails
    /// to compile; a spec carrying such a pattern must not load.
    pub fn compile(policy: &ToolPolicy) -> Result<Self, PatternCompilationError> {
        let mut patterns = Vec::with_capacity(policy.forbidden_patterns.len());
        for pattern in &policy.forbidden_patterns {
            let compiled = Regex::new(pattern).map_err(|err| PatternCompilationError {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?;
            patterns.push((pattern.clone(), compiled));
        }

        let allowed_roots = policy.allowed_directories.as_ref().map(|roots| {
            roots
                .iter()
                .map(|root| root.canonicalize().unwrap_or_else(|_| root.clone()))
                .collect()
        });

        Ok(Self {
            policy: policy.clone(),
            patterns,
            allowed_roots,
        })
    }

    /// Returns the source policy value.
    #[must_use]
    pub const fn policy(&self) -> &ToolPolicy {
        &self.policy
    }

    /// Checks one tool event against the policy.
    ///
    /// Enforcement order: forbidden tools, allowed-tools membership,
    /// forbidden patterns over serialized arguments, directory sandboxing.
    #[must_use]
    pub fn check(&self, event: &ToolEvent) -> PolicyCheck {
        if self.policy.forbidden_tools.contains(&event.tool_name) {
            return PolicyCheck::Blocked(PolicyViolation {
                kind: PolicyViolationKind::ForbiddenTool,
                tool_name: event.tool_name.clone(),
                detail: format!("tool {:?} is forbidden by policy", event.tool_name),
            });
        }

        if !self.policy.allows_all_tools() && !self.policy.allowed_tools.contains(&event.tool_name)
        {
            return PolicyCheck::Blocked(PolicyViolation {
                kind: PolicyViolationKind::ToolNotAllowed,
                tool_name: event.tool_name.clone(),
                detail: format!("tool {:?} is not in the allowed set", event.tool_name),
            });
        }

        let serialized = event.arguments.to_string();
        for (source, pattern) in &self.patterns {
            if pattern.is_match(&serialized) {
                return PolicyCheck::Blocked(PolicyViolation {
                    kind: PolicyViolationKind::ForbiddenPattern,
                    tool_name: event.tool_name.clone(),
                    detail: format!("arguments matched forbidden pattern {source:?}"),
                });
            }
        }

        if let Some(roots) = &self.allowed_roots
            && let Some(violation) = self.check_directories(event, roots)
        {
            return PolicyCheck::Blocked(violation);
        }

        PolicyCheck::Allowed
    }

    /// Applies directory sandboxing to the path arguments of a file-accessing
    /// tool event. Returns the first violation found.
    fn check_directories(&self, event: &ToolEvent, roots: &[PathBuf]) -> Option<PolicyViolation> {
        for candidate in path_arguments(&event.arguments) {
            if let Some(kind_and_detail) = examine_path(&candidate, roots) {
                return Some(PolicyViolation {
                    kind: kind_and_detail.0,
                    tool_name: event.tool_name.clone(),
                    detail: kind_and_detail.1,
                });
            }
        }
        None
    }
}

// ============================================================================
// SECTION: Path Defenses
// ============================================================================

/// Collects candidate path strings from a tool event's argument object.
fn path_arguments(arguments: &Value) -> Vec<String> {
    let Value::Object(map) = arguments else {
        return Vec::new();
    };
    let mut candidates = Vec::new();
    for (key, value) in map {
        let lowered = key.to_ascii_lowercase();
        let path_bearing =
            lowered == "cwd" || PATH_KEY_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment));
        if !path_bearing {
            continue;
        }
        match value {
            Value::String(path) => candidates.push(path.clone()),
            Value::Array(paths) => {
                for entry in paths {
                    if let Value::String(path) = entry {
                        candidates.push(path.clone());
                    }
                }
            }
            _ => {}
        }
    }
    candidates
}

/// Examines one path candidate against the sandbox roots.
///
/// Returns the violation kind and detail when the path must be blocked.
fn examine_path(candidate: &str, roots: &[PathBuf]) -> Option<(PolicyViolationKind, String)> {
    if candidate.contains('\0') {
        return Some((
            PolicyViolationKind::MalformedPath,
            "path argument contains a NUL byte".to_string(),
        ));
    }
    if candidate.to_ascii_lowercase().contains("%2e%2e") {
        return Some((
            PolicyViolationKind::MalformedPath,
            "path argument contains url-encoded traversal".to_string(),
        ));
    }

    let path = Path::new(candidate);
    if path.components().any(|component| matches!(component, Component::ParentDir)) {
        return Some((
            PolicyViolationKind::MalformedPath,
            format!("path argument contains a parent traversal: {}", summarize(candidate)),
        ));
    }
    if !path.is_absolute() {
        return Some((
            PolicyViolationKind::MalformedPath,
            format!("path argument is not absolute: {}", summarize(candidate)),
        ));
    }

    let resolved = resolve_symlinks(path);
    let inside = roots.iter().any(|root| resolved.starts_with(root));
    if inside {
        None
    } else {
        Some((
            PolicyViolationKind::DirectoryDenied,
            format!("path escapes the allowed directories: {}", summarize(candidate)),
        ))
    }
}

/// Resolves symlinks on the deepest existing ancestor, then reattaches the
/// non-existing remainder. Missing files resolve through their parents so a
/// symlinked directory cannot smuggle writes outside the sandbox.
fn resolve_symlinks(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let mut existing = path.to_path_buf();
    let mut remainder = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for component in remainder.into_iter().rev() {
        resolved.push(component);
    }
    resolved
}

/// Truncates an offending value for violation details.
fn summarize(value: &str) -> String {
    const MAX: usize = 120;
    if value.len() <= MAX {
        value.to_string()
    } else {
        let cut: String = value.chars().take(MAX).collect();
        format!("{cut}…")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
