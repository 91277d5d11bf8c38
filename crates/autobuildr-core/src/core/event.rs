// crates/autobuildr-core/src/core/event.rs
// ============================================================================
// Module: AutoBuildr Audit Events
// Description: Immutable, densely sequenced audit records for agent runs.
// Purpose: Provide the canonical event shape and the closed event-type set.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Events are the immutable audit trail of a run. Within a run, sequence
//! numbers start at 1 and are strictly increasing and dense. Payloads above
//! [`EVENT_PAYLOAD_MAX_SIZE`] bytes spill into a linked artifact; the stored
//! payload is then a small summary object.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum serialized payload size stored inline on an event, in bytes.
pub const EVENT_PAYLOAD_MAX_SIZE: usize = 4_096;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// Closed set of audit event types.
///
/// # Invariants
/// - Variants are stable for serialization and schema CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Run entered the turn loop.
    Started,
    /// Executor emitted a tool invocation.
    ToolCall,
    /// Tool invocation produced a result (or a synthetic blocked payload).
    ToolResult,
    /// One executor turn finished; payload carries cumulative token totals.
    TurnComplete,
    /// Acceptance gate evaluated; payload carries per-validator outcomes.
    AcceptanceCheck,
    /// Terminal: run completed through the gate.
    Completed,
    /// Terminal: executor failure or cancellation.
    Failed,
    /// Terminal: budget exhaustion.
    Timeout,
    /// Run suspended by an operator.
    Paused,
    /// Run resumed by an operator.
    Resumed,
    /// Tool event blocked by the policy enforcer.
    PolicyViolation,
    /// Test command executed on the host.
    TestsExecuted,
    /// Test command executed inside a sandbox.
    SandboxTestsExecuted,
    /// Structured test results persisted as an artifact.
    TestResultArtifactCreated,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Started,
        Self::ToolCall,
        Self::ToolResult,
        Self::TurnComplete,
        Self::AcceptanceCheck,
        Self::Completed,
        Self::Failed,
        Self::Timeout,
        Self::Paused,
        Self::Resumed,
        Self::PolicyViolation,
        Self::TestsExecuted,
        Self::SandboxTestsExecuted,
        Self::TestResultArtifactCreated,
    ];

    /// Returns the stable wire label for the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::TurnComplete => "turn_complete",
            Self::AcceptanceCheck => "acceptance_check",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::PolicyViolation => "policy_violation",
            Self::TestsExecuted => "tests_executed",
            Self::SandboxTestsExecuted => "sandbox_tests_executed",
            Self::TestResultArtifactCreated => "test_result_artifact_created",
        }
    }

    /// Parses a stable wire label back into an event type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event_type| event_type.as_str() == value)
    }

    /// Returns true for the three terminal event types.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Agent Event
// ============================================================================

/// Immutable audit record.
///
/// # Invariants
/// - `(run_id, sequence)` is unique and dense within a run, starting at 1.
/// - Serialized `payload` size is at most [`EVENT_PAYLOAD_MAX_SIZE`] bytes;
///   overflowed payloads live in the artifact named by `artifact_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event identifier (table autoincrement).
    pub id: EventId,
    /// Owning run identifier.
    pub run_id: RunId,
    /// Dense per-run sequence number, starting at 1.
    pub sequence: u64,
    /// Event type.
    pub event_type: EventType,
    /// UTC instant the event was recorded.
    pub timestamp: Timestamp,
    /// Structured payload, possibly a truncation summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Original serialized payload size when the payload was truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_truncated: Option<u64>,
    /// Weak reference to an overflow or associated artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<ArtifactId>,
    /// Tool name for tool-related events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// Event payload used for insertion before the store assigns an id.
///
/// # Invariants
/// - `sequence` is acquired from the per-run counter before insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAgentEvent {
    /// Owning run identifier.
    pub run_id: RunId,
    /// Dense per-run sequence number, starting at 1.
    pub sequence: u64,
    /// Event type.
    pub event_type: EventType,
    /// UTC instant the event was recorded.
    pub timestamp: Timestamp,
    /// Structured payload, possibly a truncation summary.
    pub payload: Option<serde_json::Value>,
    /// Original serialized payload size when the payload was truncated.
    pub payload_truncated: Option<u64>,
    /// Weak reference to an overflow or associated artifact.
    pub artifact_ref: Option<ArtifactId>,
    /// Tool name for tool-related events.
    pub tool_name: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
