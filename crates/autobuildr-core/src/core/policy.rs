// crates/autobuildr-core/src/core/policy.rs
// ============================================================================
// Module: AutoBuildr Tool Policy
// Description: Closed tool policy value object attached to agent specs.
// Purpose: Describe which tools an agent may call and under which argument
//          and directory constraints.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A tool policy is an immutable value attached to every agent spec. It names
//! the allowed and forbidden tools, the forbidden argument patterns, the
//! sandbox directory roots, and human tool hints. Unknown keys are preserved
//! on the wire for forward compatibility but never interpreted.
//!
//! Enforcement lives in [`crate::runtime::policy`]; this module only carries
//! the serializable shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Tool Policy
// ============================================================================

/// Immutable tool policy value.
///
/// # Invariants
/// - `policy_version` is always present.
/// - An empty `allowed_tools` set means "all available tools".
/// - `forbidden_patterns` entries must compile as regular expressions at
///   spec load; compilation happens in the runtime enforcer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPolicy {
    /// Policy schema version tag.
    pub policy_version: String,
    /// Tools the agent may call; empty means all available.
    pub allowed_tools: BTreeSet<String>,
    /// Tools the agent must never call, regardless of `allowed_tools`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub forbidden_tools: BTreeSet<String>,
    /// Ordered regular-expression strings matched against serialized
    /// tool arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden_patterns: Vec<String>,
    /// Absolute directory roots file-accessing tools may touch; `None`
    /// disables directory sandboxing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_directories: Option<Vec<PathBuf>>,
    /// Human guidance rendered into the system prompt, keyed by tool name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_hints: BTreeMap<String, String>,
    /// Unrecognized keys preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ToolPolicy {
    /// Current policy schema version tag.
    pub const CURRENT_VERSION: &'static str = "v1";

    /// Creates a policy allowing every available tool.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            policy_version: Self::CURRENT_VERSION.to_string(),
            allowed_tools: BTreeSet::new(),
            forbidden_tools: BTreeSet::new(),
            forbidden_patterns: Vec::new(),
            allowed_directories: None,
            tool_hints: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Creates a policy restricted to the named tools.
    #[must_use]
    pub fn allow_only<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_tools: tools.into_iter().map(Into::into).collect(),
            ..Self::allow_all()
        }
    }

    /// Returns true when `allowed_tools` places no restriction.
    #[must_use]
    pub fn allows_all_tools(&self) -> bool {
        self.allowed_tools.is_empty()
    }

    /// Renders the tool-hints section composed into system prompts.
    ///
    /// Hints render in tool-name order, one `- tool: guidance` line each;
    /// an empty hint map renders as an empty string.
    #[must_use]
    pub fn render_tool_hints(&self) -> String {
        if self.tool_hints.is_empty() {
            return String::new();
        }
        let mut out = String::from("Tool guidance:\n");
        for (tool, hint) in &self.tool_hints {
            out.push_str("- ");
            out.push_str(tool);
            out.push_str(": ");
            out.push_str(hint);
            out.push('\n');
        }
        out
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let json = serde_json::json!({
            "policy_version": "v1",
            "allowed_tools": ["bash"],
            "future_knob": {"setting": true},
        });
        let policy: ToolPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(policy.extra.get("future_knob").unwrap()["setting"], true);
        let back = serde_json::to_value(&policy).unwrap();
        assert_eq!(back["future_knob"]["setting"], true);
    }

    #[test]
    fn empty_allowed_tools_means_all() {
        assert!(ToolPolicy::allow_all().allows_all_tools());
        assert!(!ToolPolicy::allow_only(["bash"]).allows_all_tools());
    }

    #[test]
    fn tool_hints_render_in_name_order() {
        let mut policy = ToolPolicy::allow_all();
        policy.tool_hints.insert("write".to_string(), "prefer small diffs".to_string());
        policy.tool_hints.insert("bash".to_string(), "avoid sudo".to_string());
        let rendered = policy.render_tool_hints();
        let bash = rendered.find("- bash").unwrap();
        let write = rendered.find("- write").unwrap();
        assert!(bash < write);
    }
}
