// crates/autobuildr-orchestrator/src/materialize.rs
// ============================================================================
// Module: Agent Snapshot Materialization
// Description: On-disk markdown snapshots of agent specs.
// Purpose: Write readable spec snapshots; materialization only, never
//          executed.
// Dependencies: autobuildr-core
// ============================================================================

//! ## Overview
//! Materialization renders each spec to
//! `<project>/.claude/agents/generated/<spec.name>.md` and records the path
//! back onto the spec. The snapshots exist for inspection and diffing; the
//! orchestrator never executes them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use autobuildr_core::AgentSpec;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_core::interfaces::StoreError;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Project-relative directory for generated agent snapshots.
pub const AGENTS_SUBDIR: &str = ".claude/agents/generated";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Materialization failures.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// Snapshot file I/O failed.
    #[error("snapshot io error at {path}: {message}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Recording the snapshot path failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Materialization
// ============================================================================

/// Writes the snapshot for one spec and records its path.
///
/// # Errors
///
/// Returns [`MaterializeError`] when the write or the path record fails.
pub fn materialize_spec(
    store: &dyn SpecStore,
    project_dir: &Path,
    spec: &AgentSpec,
) -> Result<PathBuf, MaterializeError> {
    let directory = project_dir.join(AGENTS_SUBDIR);
    fs::create_dir_all(&directory).map_err(|err| MaterializeError::Io {
        path: directory.clone(),
        message: err.to_string(),
    })?;
    let path = directory.join(format!("{}.md", spec.name));
    fs::write(&path, render_snapshot(spec)).map_err(|err| MaterializeError::Io {
        path: path.clone(),
        message: err.to_string(),
    })?;

    let relative = format!("{AGENTS_SUBDIR}/{}.md", spec.name);
    store.set_spec_path(&spec.id, &relative)?;
    info!(spec = %spec.name, path = %path.display(), "agent snapshot written");
    Ok(path)
}

/// Renders the markdown snapshot for a spec.
#[must_use]
pub fn render_snapshot(spec: &AgentSpec) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", spec.display_name));
    out.push_str(&format!("- name: `{}`\n", spec.name));
    out.push_str(&format!("- task type: {}\n", spec.task_type));
    out.push_str(&format!("- max turns: {}\n", spec.max_turns));
    out.push_str(&format!("- timeout: {}s\n", spec.timeout_seconds));
    if let Some(feature_id) = spec.source_feature_id {
        out.push_str(&format!("- source feature: {feature_id}\n"));
    }
    out.push_str("\n## Objective\n\n");
    out.push_str(&spec.objective);
    out.push('\n');

    if !spec.tool_policy.allowed_tools.is_empty() {
        out.push_str("\n## Allowed tools\n\n");
        for tool in &spec.tool_policy.allowed_tools {
            out.push_str(&format!("- {tool}\n"));
        }
    }
    if !spec.tool_policy.forbidden_patterns.is_empty() {
        out.push_str("\n## Forbidden patterns\n\n");
        for pattern in &spec.tool_policy.forbidden_patterns {
            out.push_str(&format!("- `{pattern}`\n"));
        }
    }
    let hints = spec.tool_policy.render_tool_hints();
    if !hints.is_empty() {
        out.push_str("\n## Hints\n\n");
        out.push_str(&hints);
    }
    out
}
