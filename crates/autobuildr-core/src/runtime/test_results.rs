// crates/autobuildr-core/src/runtime/test_results.rs
// ============================================================================
// Module: Test Result Artifacts
// Description: Structured test-run summaries persisted as artifacts.
// Purpose: Capture test executions in the audit trail and as retrievable
//          `test_result` artifacts.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! Test executions performed during a run are persisted twice: a
//! `tests_executed` (or `sandbox_tests_executed`) audit event summarizing
//! the execution, and a `test_result` artifact holding the full structured
//! summary including captured output. A `test_result_artifact_created`
//! event links the two.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::core::Artifact;
use crate::core::ArtifactType;
use crate::core::EventType;
use crate::core::RunId;
use crate::interfaces::ArtifactRecordStore;
use crate::interfaces::EventStore;
use crate::runtime::artifacts::ArtifactStore;
use crate::runtime::artifacts::ArtifactStoreError;
use crate::runtime::artifacts::ArtifactWriteOptions;
use crate::runtime::recorder::EventRecorder;
use crate::runtime::recorder::RecordOptions;
use crate::runtime::recorder::RecorderError;

// ============================================================================
// SECTION: Summary
// ============================================================================

/// Structured outcome of one test command execution.
///
/// # Invariants
/// - `passed_count + failed_count <= total_tests` (skips account for the
///   remainder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunSummary {
    /// Command line that was executed.
    pub command: String,
    /// Working directory, when one was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Process exit code.
    pub exit_code: i32,
    /// Total tests discovered.
    pub total_tests: u32,
    /// Tests that passed.
    pub passed_count: u32,
    /// Tests that failed.
    pub failed_count: u32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Captured combined output.
    pub output: String,
    /// True when the command ran inside a sandbox environment.
    pub sandboxed: bool,
}

impl TestRunSummary {
    /// Returns true when the execution is considered passing.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.exit_code == 0 && self.failed_count == 0
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while persisting a test result.
#[derive(Debug, Error)]
pub enum TestResultError {
    /// Audit event recording failed.
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    /// Artifact persistence failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactStoreError),
    /// Summary serialization failed.
    #[error("test summary serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Persists a test execution as audit events plus a `test_result` artifact.
///
/// # Errors
///
/// Returns [`TestResultError`] when recording or artifact storage fails.
pub fn store_test_result<S: EventStore + ArtifactRecordStore>(
    recorder: &EventRecorder<S>,
    artifacts: &ArtifactStore<S>,
    run_id: &RunId,
    summary: &TestRunSummary,
) -> Result<Artifact, TestResultError> {
    let executed_event = if summary.sandboxed {
        EventType::SandboxTestsExecuted
    } else {
        EventType::TestsExecuted
    };
    recorder.record(
        run_id,
        executed_event,
        RecordOptions::with_payload(json!({
            "command": summary.command,
            "exit_code": summary.exit_code,
            "total_tests": summary.total_tests,
            "passed_count": summary.passed_count,
            "failed_count": summary.failed_count,
            "duration_ms": summary.duration_ms,
        })),
    )?;

    let content = serde_json::to_vec(summary)
        .map_err(|err| TestResultError::Serialization(err.to_string()))?;
    let mut options = ArtifactWriteOptions::default();
    options.metadata.insert("passed_count".to_string(), json!(summary.passed_count));
    options.metadata.insert("failed_count".to_string(), json!(summary.failed_count));
    options.metadata.insert("command".to_string(), json!(summary.command));
    let artifact = artifacts.store(run_id, ArtifactType::TestResult, &content, options)?;

    recorder.record(
        run_id,
        EventType::TestResultArtifactCreated,
        RecordOptions::with_payload(json!({
            "artifact_id": artifact.id,
            "content_hash": artifact.content_hash,
            "size_bytes": artifact.size_bytes,
        })),
    )?;
    Ok(artifact)
}

/// Reconstructs a test summary from a `test_result` artifact.
///
/// Returns `None` when the content is unavailable or does not parse.
///
/// # Errors
///
/// Returns [`TestResultError::Artifact`] for read failures other than a
/// missing blob file.
pub fn retrieve_test_result<S: EventStore + ArtifactRecordStore>(
    artifacts: &ArtifactStore<S>,
    artifact: &Artifact,
) -> Result<Option<TestRunSummary>, TestResultError> {
    let Some(bytes) = artifacts.retrieve(artifact)? else {
        return Ok(None);
    };
    Ok(serde_json::from_slice(&bytes).ok())
}
