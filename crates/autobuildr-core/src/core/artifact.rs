// crates/autobuildr-core/src/core/artifact.rs
// ============================================================================
// Module: AutoBuildr Artifacts
// Description: Content-addressed persisted outputs of agent runs.
// Purpose: Provide the canonical artifact record with inline/blob routing.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An artifact is any persisted blob produced during a run, addressed by the
//! SHA-256 of its bytes. Content at most [`ARTIFACT_INLINE_MAX_SIZE`] bytes
//! is stored inline as text; larger content lives in a content-addressed
//! blob file under the project's artifact root, referenced by a
//! project-relative path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::ContentHash;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::RunId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum content size stored inline on the artifact record, in bytes.
pub const ARTIFACT_INLINE_MAX_SIZE: usize = 4_096;

/// Project-relative directory holding artifact blob files.
pub const ARTIFACTS_SUBDIR: &str = ".autobuildr/artifacts";

// ============================================================================
// SECTION: Artifact Type
// ============================================================================

/// Closed set of artifact types.
///
/// # Invariants
/// - Variants are stable for serialization and schema CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// A file change produced by the agent.
    FileChange,
    /// Structured test execution results.
    TestResult,
    /// Free-form log output, including overflowed event payloads.
    Log,
    /// Numeric or structured measurement.
    Metric,
    /// Point-in-time capture of external state.
    Snapshot,
}

impl ArtifactType {
    /// Every artifact type, in declaration order.
    pub const ALL: [Self; 5] =
        [Self::FileChange, Self::TestResult, Self::Log, Self::Metric, Self::Snapshot];

    /// Returns the stable wire label for the artifact type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileChange => "file_change",
            Self::TestResult => "test_result",
            Self::Log => "log",
            Self::Metric => "metric",
            Self::Snapshot => "snapshot",
        }
    }

    /// Parses a stable wire label back into an artifact type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|artifact_type| artifact_type.as_str() == value)
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Artifact Record
// ============================================================================

/// Persisted output of a run.
///
/// # Invariants
/// - `content_hash` and `size_bytes` are always set.
/// - Exactly one of `content_inline` / `content_ref` is set, keyed strictly
///   by `size_bytes <= ARTIFACT_INLINE_MAX_SIZE`.
/// - `content_ref` is a project-relative path under the artifact root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier.
    pub id: ArtifactId,
    /// Owning run identifier.
    pub run_id: RunId,
    /// Artifact type.
    pub artifact_type: ArtifactType,
    /// Optional source path the content was captured from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// SHA-256 of the content bytes.
    pub content_hash: ContentHash,
    /// Content length in bytes.
    pub size_bytes: u64,
    /// Inline text content for small artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_inline: Option<String>,
    /// Project-relative blob path for large artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    /// Type-specific metadata map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Artifact {
    /// Returns true when the record routes content consistently with its
    /// size: inline iff `size_bytes <= ARTIFACT_INLINE_MAX_SIZE`.
    #[must_use]
    pub const fn routing_is_consistent(&self) -> bool {
        let inline_expected = self.size_bytes <= ARTIFACT_INLINE_MAX_SIZE as u64;
        matches!(
            (inline_expected, self.content_inline.is_some(), self.content_ref.is_some()),
            (true, true, false) | (false, false, true)
        )
    }
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

    fn artifact(size: u64, inline: Option<&str>, blob: Option<&str>) -> Artifact {
        Artifact {
            id: ArtifactId::new("artifact-1"),
            run_id: RunId::new("run-1"),
            artifact_type: ArtifactType::Log,
            path: None,
            content_hash: ContentHash::of_bytes(b"content"),
            size_bytes: size,
            content_inline: inline.map(str::to_string),
            content_ref: blob.map(str::to_string),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn routing_consistency_is_keyed_by_size() {
        assert!(artifact(7, Some("content"), None).routing_is_consistent());
        assert!(artifact(10_000, None, Some("blob/path")).routing_is_consistent());
        assert!(!artifact(7, None, Some("blob/path")).routing_is_consistent());
        assert!(!artifact(10_000, Some("content"), None).routing_is_consistent());
        assert!(!artifact(7, Some("content"), Some("blob/path")).routing_is_consistent());
    }

    #[test]
    fn labels_round_trip_for_every_artifact_type() {
        for artifact_type in ArtifactType::ALL {
            assert_eq!(ArtifactType::parse(artifact_type.as_str()), Some(artifact_type));
        }
    }
}
