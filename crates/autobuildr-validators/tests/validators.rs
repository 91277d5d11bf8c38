// crates/autobuildr-validators/tests/validators.rs
// ============================================================================
// Module: Validator Tests
// Description: Behavioral coverage for the three built-in validators.
// Purpose: Validate exit-code comparison, timeout kill, path interpolation,
//          and tool-result pattern scanning.
// ============================================================================

//! ## Overview
//! Validator coverage:
//! - `test_pass` passes on the expected exit code, fails otherwise, and
//!   kills commands that exceed their timeout.
//! - `file_exists` interpolates `{project_dir}` and honors `should_exist`.
//! - `forbidden_patterns` scans only `tool_result` payloads and reports
//!   the first matching pattern with context.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;

use autobuildr_core::AgentEvent;
use autobuildr_core::EventId;
use autobuildr_core::EventType;
use autobuildr_core::RunId;
use autobuildr_core::Timestamp;
use autobuildr_core::ValidatorConfig;
use autobuildr_core::ValidatorKind;
use autobuildr_core::interfaces::ValidationContext;
use autobuildr_core::interfaces::Validator;
use autobuildr_validators::FileExistsValidator;
use autobuildr_validators::ForbiddenPatternsValidator;
use autobuildr_validators::TestPassValidator;
use autobuildr_validators::registry::BuiltinValidatorRegistry;
use serde_json::json;

fn config(kind: ValidatorKind, map: serde_json::Value) -> ValidatorConfig {
    let serde_json::Value::Object(map) = map else {
        panic!("config fixture must be an object");
    };
    ValidatorConfig::new(kind, map)
}

fn event(sequence: u64, event_type: EventType, payload: serde_json::Value) -> AgentEvent {
    AgentEvent {
        id: EventId::new(sequence as i64),
        run_id: RunId::new("run-1"),
        sequence,
        event_type,
        timestamp: Timestamp::from_unix_millis(0),
        payload: Some(payload),
        payload_truncated: None,
        artifact_ref: None,
        tool_name: None,
    }
}

#[test]
fn test_pass_accepts_the_expected_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &[],
    };

    let ok = TestPassValidator
        .evaluate(&config(ValidatorKind::TestPass, json!({"command": "true"})), &context)
        .unwrap();
    assert!(ok.passed);

    let failing = TestPassValidator
        .evaluate(&config(ValidatorKind::TestPass, json!({"command": "false"})), &context)
        .unwrap();
    assert!(!failing.passed);
    assert_eq!(failing.details["exit_code"], 1);

    let custom = TestPassValidator
        .evaluate(
            &config(
                ValidatorKind::TestPass,
                json!({"command": "exit 3", "expected_exit_code": 3}),
            ),
            &context,
        )
        .unwrap();
    assert!(custom.passed);
}

#[test]
fn test_pass_captures_output() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &[],
    };
    let result = TestPassValidator
        .evaluate(
            &config(ValidatorKind::TestPass, json!({"command": "echo out; echo err 1>&2"})),
            &context,
        )
        .unwrap();
    assert!(result.passed);
    assert!(result.details["stdout"].as_str().unwrap().contains("out"));
    assert!(result.details["stderr"].as_str().unwrap().contains("err"));
}

#[test]
fn test_pass_kills_commands_exceeding_their_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &[],
    };
    let result = TestPassValidator
        .evaluate(
            &config(
                ValidatorKind::TestPass,
                json!({"command": "sleep 30", "timeout_seconds": 1}),
            ),
            &context,
        )
        .unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["timed_out"], true);
}

#[test]
fn test_pass_requires_a_command() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &[],
    };
    let err = TestPassValidator
        .evaluate(&config(ValidatorKind::TestPass, json!({})), &context)
        .unwrap_err();
    assert!(err.to_string().contains("command"));
}

#[test]
fn file_exists_interpolates_the_project_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("present.txt"), "x").unwrap();
    let run_id = RunId::new("run-1");
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &[],
    };

    let present = FileExistsValidator
        .evaluate(
            &config(ValidatorKind::FileExists, json!({"path": "{project_dir}/present.txt"})),
            &context,
        )
        .unwrap();
    assert!(present.passed);

    let missing = FileExistsValidator
        .evaluate(&config(ValidatorKind::FileExists, json!({"path": "absent.txt"})), &context)
        .unwrap();
    assert!(!missing.passed);

    let absent_expected = FileExistsValidator
        .evaluate(
            &config(
                ValidatorKind::FileExists,
                json!({"path": "absent.txt", "should_exist": false}),
            ),
            &context,
        )
        .unwrap();
    assert!(absent_expected.passed);
}

#[test]
fn forbidden_patterns_scans_only_tool_results() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let events = vec![
        // A tool_call mentioning the pattern must not trip the validator.
        event(1, EventType::ToolCall, json!({"arguments": {"cmd": "echo password=hunter2"}})),
        event(2, EventType::ToolResult, json!({"result": "all clean"})),
    ];
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &events,
    };
    let clean = ForbiddenPatternsValidator
        .evaluate(
            &config(ValidatorKind::ForbiddenPatterns, json!({"patterns": ["password="]})),
            &context,
        )
        .unwrap();
    assert!(clean.passed);
    assert_eq!(clean.details["tool_results_scanned"], 1);
}

#[test]
fn forbidden_patterns_reports_the_first_match_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let events = vec![
        event(1, EventType::ToolResult, json!({"result": "ok"})),
        event(2, EventType::ToolResult, json!({"result": "leaked password=hunter2 here"})),
        event(3, EventType::ToolResult, json!({"result": "password=again"})),
    ];
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &events,
    };
    let result = ForbiddenPatternsValidator
        .evaluate(
            &config(
                ValidatorKind::ForbiddenPatterns,
                json!({"patterns": ["nothing", r"password=\w+"]}),
            ),
            &context,
        )
        .unwrap();
    assert!(!result.passed);
    assert_eq!(result.details["sequence"], 2);
    assert!(result.details["context"].as_str().unwrap().contains("password=hunter2"));
}

#[test]
fn forbidden_patterns_rejects_bad_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let run_id = RunId::new("run-1");
    let context = ValidationContext {
        run_id: &run_id,
        project_dir: dir.path(),
        events: &[],
    };
    let err = ForbiddenPatternsValidator
        .evaluate(
            &config(ValidatorKind::ForbiddenPatterns, json!({"patterns": ["(unclosed"]})),
            &context,
        )
        .unwrap_err();
    assert!(err.to_string().contains("failed to compile"));
}

#[test]
fn registry_resolves_every_builtin_kind() {
    use autobuildr_core::interfaces::ValidatorRegistry;
    let registry = BuiltinValidatorRegistry::with_builtin_validators();
    for kind in [
        ValidatorKind::TestPass,
        ValidatorKind::FileExists,
        ValidatorKind::ForbiddenPatterns,
    ] {
        assert!(registry.resolve(kind).is_some());
    }
    assert!(
        BuiltinValidatorRegistry::empty().resolve(ValidatorKind::TestPass).is_none(),
        "empty registry must resolve nothing"
    );
}
