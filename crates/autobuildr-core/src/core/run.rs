// crates/autobuildr-core/src/core/run.rs
// ============================================================================
// Module: AutoBuildr Agent Runs
// Description: Run records, the status state machine, and verdicts.
// Purpose: Capture one execution attempt of an agent spec with budget
//          accounting and terminal outcomes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An agent run is one execution attempt of a spec. Its status follows a
//! closed state machine with exactly three terminal states; the harness
//! kernel is the single writer of the status column. The verdict is the
//! semantic outcome of the acceptance gate, distinct from the lifecycle
//! status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::RunId;
use crate::core::identifiers::SpecId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and schema CHECK constraints.
/// - Valid transitions are exactly those accepted by
///   [`RunStatus::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet started.
    Pending,
    /// Owned by a worker and inside the turn loop.
    Running,
    /// Suspended by an operator; resumable.
    Paused,
    /// Gate evaluated; terminal.
    Completed,
    /// Executor failure or cancellation; terminal.
    Failed,
    /// Budget exhaustion; terminal.
    Timeout,
}

impl RunStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    /// Parses a stable wire label back into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }

    /// Returns true for the three terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }

    /// Returns true when the edge `self -> next` is in the state machine.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Timeout)
                | (Self::Paused, Self::Failed)
                | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Terminal semantic outcome of a run.
///
/// # Invariants
/// - Set iff the run status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Acceptance gate passed.
    Passed,
    /// Acceptance gate failed.
    Failed,
    /// Run ended without a usable gate evaluation.
    Error,
}

impl Verdict {
    /// Returns the stable wire label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    /// Parses a stable wire label back into a verdict.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Agent Run
// ============================================================================

/// One execution attempt of an agent spec.
///
/// # Invariants
/// - `completed_at` is set iff `status` is terminal.
/// - `final_verdict` is set iff `status` is terminal.
/// - At most one run per spec is non-terminal at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    /// Run identifier.
    pub id: RunId,
    /// Executed spec identifier.
    pub agent_spec_id: SpecId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Instant the run entered `running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// Instant the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Executor turns consumed.
    pub turns_used: u32,
    /// Cumulative input tokens.
    pub tokens_in: u64,
    /// Cumulative output tokens.
    pub tokens_out: u64,
    /// Terminal gate verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_verdict: Option<Verdict>,
    /// Structured acceptance gate report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_results: Option<serde_json::Value>,
    /// Terminal error message, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retry attempts consumed under the acceptance retry policy.
    pub retry_count: u32,
    /// Creation instant.
    pub created_at: Timestamp,
}

impl AgentRun {
    /// Creates a fresh pending run for a spec.
    #[must_use]
    pub fn pending(id: RunId, agent_spec_id: SpecId, created_at: Timestamp) -> Self {
        Self {
            id,
            agent_spec_id,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            turns_used: 0,
            tokens_in: 0,
            tokens_out: 0,
            final_verdict: None,
            acceptance_results: None,
            error: None,
            retry_count: 0,
            created_at,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Typed rejection of an invalid status transition.
///
/// # Invariants
/// - Carries both endpoints so callers can render a 409-equivalent outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state transition for run {run_id}: {from} -> {to}")]
pub struct InvalidStateTransition {
    /// Run whose transition was rejected.
    pub run_id: RunId,
    /// Observed current status.
    pub from: RunStatus,
    /// Requested next status.
    pub to: RunStatus,
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

    #[test]
    fn declared_edges_are_accepted() {
        assert!(RunStatus::Pending.can_transition(RunStatus::Running));
        assert!(RunStatus::Running.can_transition(RunStatus::Paused));
        assert!(RunStatus::Paused.can_transition(RunStatus::Running));
        assert!(RunStatus::Running.can_transition(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition(RunStatus::Failed));
        assert!(RunStatus::Running.can_transition(RunStatus::Timeout));
        assert!(RunStatus::Paused.can_transition(RunStatus::Failed));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for terminal in [RunStatus::Completed, RunStatus::Failed, RunStatus::Timeout] {
            assert!(terminal.is_terminal());
            for next in [
                RunStatus::Pending,
                RunStatus::Running,
                RunStatus::Paused,
                RunStatus::Completed,
                RunStatus::Failed,
                RunStatus::Timeout,
            ] {
                assert!(!terminal.can_transition(next));
            }
        }
    }

    #[test]
    fn pending_cannot_pause_or_complete() {
        assert!(!RunStatus::Pending.can_transition(RunStatus::Paused));
        assert!(!RunStatus::Pending.can_transition(RunStatus::Completed));
        assert!(!RunStatus::Pending.can_transition(RunStatus::Timeout));
    }
}
