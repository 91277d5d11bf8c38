// crates/autobuildr-core/tests/kernel_execution.rs
// ============================================================================
// Module: Kernel Execution Tests
// Description: End-to-end turn-loop scenarios over the in-memory store.
// Purpose: Validate happy-path completion, budget exhaustion, policy
//          blocking, cancellation, and crash recovery.
// ============================================================================

//! ## Overview
//! Scenario coverage for the harness kernel:
//! - Happy path: scripted executor completes, gate passes, event order holds.
//! - Turn budget: executor never completes, run times out after `max_turns`.
//! - Wall clock: elapsed time exceeds `timeout_seconds`, gate still runs.
//! - Policy block: forbidden pattern produces `policy_violation` plus a
//!   synthetic blocked `tool_result`; the run continues.
//! - Cancellation and orphan recovery.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use autobuildr_core::Clock;
use autobuildr_core::EventStore;
use autobuildr_core::EventType;
use autobuildr_core::ExecutorError;
use autobuildr_core::RunStatus;
use autobuildr_core::RunStore;
use autobuildr_core::ToolEvent;
use autobuildr_core::TurnOutcome;
use autobuildr_core::Verdict;
use serde_json::json;

use common::ScriptedExecutor;
use common::harness;
use common::pending_run;
use common::spec_with_budgets;

/// Builds a completed turn carrying one successful tool event.
fn turn_with_tool(tool: &str, arguments: serde_json::Value, completed: bool) -> TurnOutcome {
    TurnOutcome {
        completed,
        turn_payload: json!({"note": "turn"}),
        tool_events: vec![ToolEvent {
            tool_name: tool.to_string(),
            arguments,
            result: json!({"ok": true}),
            success: true,
        }],
        tokens_in: 100,
        tokens_out: 40,
    }
}

#[test]
fn happy_path_completes_with_ordered_events() {
    let h = harness();
    let spec = spec_with_budgets(10, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut executor = ScriptedExecutor::new(vec![
        Ok(turn_with_tool("write", json!({"file_path": "/tmp/login.ts"}), false)),
        Ok(turn_with_tool("bash", json!({"cmd": "ls"}), true)),
    ]);
    let run = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.final_verdict, Some(Verdict::Passed));
    assert_eq!(run.turns_used, 2);
    assert_eq!(run.tokens_in, 200);
    assert_eq!(run.tokens_out, 80);
    assert!(run.completed_at.is_some());

    let events = h.store.list_events(&run_id).unwrap();
    let kinds: Vec<EventType> = events.iter().map(|event| event.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::Started,
            EventType::ToolCall,
            EventType::ToolResult,
            EventType::TurnComplete,
            EventType::ToolCall,
            EventType::ToolResult,
            EventType::TurnComplete,
            EventType::AcceptanceCheck,
            EventType::Completed,
        ]
    );
    // Sequence density: 1..=N with no gaps.
    let sequences: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    assert_eq!(sequences, (1..=events.len() as u64).collect::<Vec<u64>>());
}

#[test]
fn turn_budget_exhaustion_times_out_and_still_runs_the_gate() {
    let h = harness();
    let spec = spec_with_budgets(3, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut executor = ScriptedExecutor::new(Vec::new());
    let run = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    assert_eq!(run.status, RunStatus::Timeout);
    assert_eq!(run.turns_used, 3);
    assert!(run.acceptance_results.is_some());

    let timeouts = h.store.list_events_of_type(&run_id, EventType::Timeout).unwrap();
    assert_eq!(timeouts.len(), 1);
    let payload = timeouts[0].payload.clone().unwrap();
    assert_eq!(payload["resource"], "max_turns");
    assert_eq!(payload["turns_used"], 3);

    let checks = h.store.list_events_of_type(&run_id, EventType::AcceptanceCheck).unwrap();
    assert_eq!(checks.len(), 1);
    assert!(checks[0].sequence > timeouts[0].sequence);
}

#[test]
fn wall_clock_exhaustion_times_out() {
    let h = harness();
    let spec = spec_with_budgets(100, 60);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    // Each turn advances the clock by 25 seconds; the third check trips.
    let mut executor = ScriptedExecutor::endless(h.clock.clone(), 25_000);
    let run = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    assert_eq!(run.status, RunStatus::Timeout);
    let timeouts = h.store.list_events_of_type(&run_id, EventType::Timeout).unwrap();
    let payload = timeouts[0].payload.clone().unwrap();
    assert_eq!(payload["resource"], "wall_clock");
    assert!(payload["elapsed_seconds"].as_u64().unwrap() >= 60);
    // Budget bound: completed_at - started_at stays within the budget plus
    // one turn of grace.
    let started = run.started_at.unwrap();
    let completed = run.completed_at.unwrap();
    assert!(completed.seconds_since(started) <= spec.timeout_seconds + 25);
}

#[test]
fn blocked_tool_events_record_violation_then_blocked_result() {
    let h = harness();
    let mut spec = spec_with_budgets(5, 600);
    spec.tool_policy.forbidden_patterns.push(r"rm\s+-rf".to_string());
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut executor = ScriptedExecutor::new(vec![
        Ok(turn_with_tool("bash", json!({"cmd": "rm -rf /"}), false)),
        Ok(turn_with_tool("bash", json!({"cmd": "ls"}), true)),
    ]);
    let run = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    // The run continues past the violation and completes.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.turns_used, 2);

    let events = h.store.list_events(&run_id).unwrap();
    let violation_seq = events
        .iter()
        .find(|event| event.event_type == EventType::PolicyViolation)
        .map(|event| event.sequence)
        .unwrap();
    let blocked_result = events
        .iter()
        .find(|event| {
            event.event_type == EventType::ToolResult
                && event.payload.as_ref().is_some_and(|payload| payload["blocked"] == true)
        })
        .unwrap();
    assert!(violation_seq < blocked_result.sequence);
    assert_eq!(blocked_result.payload.as_ref().unwrap()["error"], "tool_blocked");
}

#[test]
fn executor_fatal_error_fails_the_run() {
    let h = harness();
    let spec = spec_with_budgets(5, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut executor = ScriptedExecutor::new(vec![Err(ExecutorError::Fatal {
        kind: "auth".to_string(),
        message: "api key rejected".to_string(),
    })]);
    let run = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.final_verdict, Some(Verdict::Error));
    assert!(run.error.as_deref().unwrap().contains("api key rejected"));
    let failed = h.store.list_events_of_type(&run_id, EventType::Failed).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].payload.as_ref().unwrap()["error_kind"], "auth");
}

#[test]
fn transient_errors_retry_without_consuming_turns() {
    let h = harness();
    let spec = spec_with_budgets(5, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut executor = ScriptedExecutor::new(vec![
        Err(ExecutorError::Transient("503".to_string())),
        Ok(turn_with_tool("bash", json!({"cmd": "ls"}), true)),
    ]);
    let run = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.turns_used, 1);
}

#[test]
fn execute_requires_a_pending_run() {
    let h = harness();
    let spec = spec_with_budgets(5, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut executor = ScriptedExecutor::new(vec![Ok(turn_with_tool("x", json!({}), true))]);
    h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap();

    // Second execution of the same (now terminal) run is a typed conflict.
    let mut executor = ScriptedExecutor::new(Vec::new());
    let err = h.kernel.execute(&spec, None, &run_id, &mut executor).unwrap_err();
    assert!(matches!(err, autobuildr_core::KernelError::InvalidTransition(_)));
}

#[test]
fn cancel_without_a_live_worker_terminalizes_directly() {
    let h = harness();
    let spec = spec_with_budgets(5, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    // Move the run to running manually, simulating an owner that died.
    let mut run = h.store.get_run(&run_id).unwrap().unwrap();
    run.status = RunStatus::Running;
    run.started_at = Some(h.clock.now());
    h.store.update_run(&run).unwrap();

    h.kernel.cancel(&run_id).unwrap();
    let run = h.store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("user_cancelled"));

    // Cancelling again is idempotent.
    h.kernel.cancel(&run_id).unwrap();
    // Cancelling a completed run is a conflict.
}

#[test]
fn orphaned_runs_are_repaired_on_startup() {
    let h = harness();
    let spec = spec_with_budgets(5, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());

    let mut run = h.store.get_run(&run_id).unwrap().unwrap();
    run.status = RunStatus::Running;
    run.started_at = Some(h.clock.now());
    h.store.update_run(&run).unwrap();

    // Advance beyond the largest allowed timeout.
    h.clock.advance_millis((7_200 + 60) * 1_000);
    let repaired = h.kernel.recover_orphaned_runs().unwrap();
    assert_eq!(repaired, vec![run_id.clone()]);

    let run = h.store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("orphaned_on_restart"));
    assert!(run.completed_at.is_some());
    let failed = h.store.list_events_of_type(&run_id, EventType::Failed).unwrap();
    assert_eq!(failed.len(), 1);
}

#[test]
fn recent_runs_survive_orphan_recovery() {
    let h = harness();
    let spec = spec_with_budgets(5, 600);
    let run_id = pending_run(&h.store, &spec, h.clock.now());
    let repaired = h.kernel.recover_orphaned_runs().unwrap();
    assert!(repaired.is_empty());
    let run = h.store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Pending);
}
