// crates/autobuildr-core/src/core/turn.rs
// ============================================================================
// Module: AutoBuildr Turn Records
// Description: Tool events and turn outcomes exchanged with the executor.
// Purpose: Provide the wire shapes of the turn executor contract.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A turn is one call cycle through the external executor. The executor
//! returns a completion flag, an opaque turn payload, the ordered tool
//! events observed during the turn, and token totals. Protocol-level
//! executor failures surface as a single tool event of kind `"error"`,
//! never as a raised error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Tool Events
// ============================================================================

/// Reserved tool name used by executors to surface protocol failures.
pub const ERROR_TOOL_NAME: &str = "error";

/// One tool invocation observed during a turn.
///
/// # Invariants
/// - `arguments` and `result` are the serialized forms seen on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    /// Invoked tool name.
    pub tool_name: String,
    /// Serialized argument object.
    pub arguments: Value,
    /// Serialized result payload.
    pub result: Value,
    /// True when the tool reported success.
    pub success: bool,
}

impl ToolEvent {
    /// Returns true when this event is an executor error surface.
    #[must_use]
    pub fn is_executor_error(&self) -> bool {
        self.tool_name == ERROR_TOOL_NAME
    }
}

// ============================================================================
// SECTION: Turn Outcome
// ============================================================================

/// Result of one executor turn.
///
/// # Invariants
/// - `tool_events` preserves wire order.
/// - An empty turn with `completed = false` is the contractual shape for a
///   protocol-level executor failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// True when the executor considers the objective complete.
    pub completed: bool,
    /// Opaque per-turn payload recorded with `turn_complete`.
    pub turn_payload: Value,
    /// Ordered tool events observed during the turn.
    pub tool_events: Vec<ToolEvent>,
    /// Input tokens consumed by the turn.
    pub tokens_in: u64,
    /// Output tokens produced by the turn.
    pub tokens_out: u64,
}

impl TurnOutcome {
    /// Creates an empty non-completing turn, the contractual shape used by
    /// executors to surface protocol failures.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            completed: false,
            turn_payload: Value::Null,
            tool_events: Vec::new(),
            tokens_in: 0,
            tokens_out: 0,
        }
    }
}

// ============================================================================
// SECTION: Conversation State
// ============================================================================

/// Conversation history threaded through executor turns.
///
/// # Invariants
/// - `entries` is append-only; the kernel owns mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Composed system prompt for the run.
    pub system_prompt: String,
    /// Opaque per-turn payloads in turn order.
    pub entries: Vec<Value>,
}

impl ConversationState {
    /// Creates conversation state seeded with a system prompt.
    #[must_use]
    pub fn new(system_prompt: String) -> Self {
        Self {
            system_prompt,
            entries: Vec::new(),
        }
    }

    /// Appends one turn payload to the history.
    pub fn push_turn(&mut self, payload: Value) {
        self.entries.push(payload);
    }

    /// Returns the number of recorded turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.entries.len()
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

    #[test]
    fn empty_turn_is_non_completing() {
        let turn = TurnOutcome::empty();
        assert!(!turn.completed);
        assert!(turn.tool_events.is_empty());
        assert_eq!(turn.tokens_in, 0);
    }

    #[test]
    fn error_tool_events_are_recognized() {
        let event = ToolEvent {
            tool_name: ERROR_TOOL_NAME.to_string(),
            arguments: Value::Null,
            result: serde_json::json!({"category": "rate_limit"}),
            success: false,
        };
        assert!(event.is_executor_error());
    }
}
