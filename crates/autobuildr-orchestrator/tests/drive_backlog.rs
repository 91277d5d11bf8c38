// crates/autobuildr-orchestrator/tests/drive_backlog.rs
// ============================================================================
// Module: Backlog Drive Tests
// Description: End-to-end orchestration over the durable store.
// Purpose: Validate the full path: feature -> compile -> kernel -> verdict
//          reflection, dependency ordering, and snapshot materialization.
// ============================================================================

//! ## Overview
//! Full-stack coverage:
//! - A coding feature with a `file_exists` step drives to `passes = true`
//!   when the stub executor writes the file, with the expected event
//!   stream.
//! - A feature whose gate fails reflects `passes = false`.
//! - Dependent features execute after their dependencies.
//! - Snapshots land under `.claude/agents/generated/`.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use autobuildr_config::OrchestratorConfig;
use autobuildr_core::AgentSpec;
use autobuildr_core::ConversationState;
use autobuildr_core::EventType;
use autobuildr_core::NewFeature;
use autobuildr_core::RunId;
use autobuildr_core::RunStatus;
use autobuildr_core::ToolEvent;
use autobuildr_core::TurnOutcome;
use autobuildr_core::Verdict;
use autobuildr_core::interfaces::EventStore;
use autobuildr_core::interfaces::ExecutorError;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::RunStore;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_core::interfaces::TurnExecutor;
use autobuildr_orchestrator::AGENTS_SUBDIR;
use autobuildr_orchestrator::CoreContext;
use autobuildr_orchestrator::ExecutorProvider;
use autobuildr_orchestrator::Orchestrator;
use autobuildr_orchestrator::materialize_spec;
use serde_json::json;
use tempfile::TempDir;

/// Executor that optionally writes a file on its first turn, then
/// completes on the second.
struct FileWritingExecutor {
    /// File written during the run, when any.
    target: Option<PathBuf>,
}

impl TurnExecutor for FileWritingExecutor {
    fn execute_turn(
        &mut self,
        _spec: &AgentSpec,
        _run_id: &RunId,
        history: &ConversationState,
    ) -> Result<TurnOutcome, ExecutorError> {
        if history.turn_count() == 0 {
            if let Some(target) = &self.target {
                if let Some(parent) = target.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(target, "generated");
            }
            Ok(TurnOutcome {
                completed: false,
                turn_payload: json!({"turn": 1}),
                tool_events: vec![ToolEvent {
                    tool_name: "write_file".to_string(),
                    arguments: json!({"file_path": "src/login.ts"}),
                    result: json!({"ok": true}),
                    success: true,
                }],
                tokens_in: 50,
                tokens_out: 20,
            })
        } else {
            Ok(TurnOutcome {
                completed: true,
                turn_payload: json!({"turn": 2}),
                tool_events: Vec::new(),
                tokens_in: 30,
                tokens_out: 10,
            })
        }
    }
}

/// Provider that writes the configured file and records spec order.
struct RecordingProvider {
    /// Project root, used to place written files.
    project_dir: PathBuf,
    /// True when the executor should satisfy `file_exists` gates.
    write_files: bool,
    /// Spec names in dispatch order.
    dispatched: Mutex<Vec<String>>,
}

impl ExecutorProvider for RecordingProvider {
    fn executor_for(&self, spec: &AgentSpec) -> Box<dyn TurnExecutor + Send> {
        if let Ok(mut guard) = self.dispatched.lock() {
            guard.push(spec.name.clone());
        }
        let target = self.write_files.then(|| self.project_dir.join("src/login.ts"));
        Box::new(FileWritingExecutor {
            target,
        })
    }
}

fn orchestrator_for(dir: &TempDir) -> Orchestrator {
    let context =
        CoreContext::initialize(dir.path(), OrchestratorConfig::default()).expect("context");
    Orchestrator::new(context)
}

#[test]
fn happy_path_feature_drives_to_passed() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_for(&dir);
    let store = orchestrator.context().store().clone();

    let feature = store
        .insert_feature(&NewFeature::new(
            "coding",
            "Login",
            "Implement login",
            vec!["File src/login.ts should exist".to_string()],
        ))
        .unwrap();

    let provider = RecordingProvider {
        project_dir: dir.path().to_path_buf(),
        write_files: true,
        dispatched: Mutex::new(Vec::new()),
    };
    let summary = orchestrator.drive_backlog(&provider).unwrap();

    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].feature_id, feature.id);
    assert_eq!(summary.outcomes[0].verdict, Some(Verdict::Passed));

    let reflected = store.get_feature(feature.id).unwrap().unwrap();
    assert!(reflected.passes);
    assert!(!reflected.in_progress);

    // The run is terminal with the canonical event stream shape.
    let run = store.get_run(&summary.outcomes[0].run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.turns_used, 2);
    let events = store.list_events(&run.id).unwrap();
    let kinds: Vec<EventType> = events.iter().map(|event| event.event_type).collect();
    assert_eq!(kinds[0], EventType::Started);
    assert_eq!(kinds[kinds.len() - 2], EventType::AcceptanceCheck);
    assert_eq!(kinds[kinds.len() - 1], EventType::Completed);
    let sequences: Vec<u64> = events.iter().map(|event| event.sequence).collect();
    assert_eq!(sequences, (1..=events.len() as u64).collect::<Vec<u64>>());
}

#[test]
fn failing_gate_reflects_passes_false() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_for(&dir);
    let store = orchestrator.context().store().clone();

    let feature = store
        .insert_feature(&NewFeature::new(
            "coding",
            "Login",
            "Implement login",
            vec!["File src/login.ts should exist".to_string()],
        ))
        .unwrap();

    let provider = RecordingProvider {
        project_dir: dir.path().to_path_buf(),
        write_files: false,
        dispatched: Mutex::new(Vec::new()),
    };
    let summary = orchestrator.drive_backlog(&provider).unwrap();

    assert_eq!(summary.outcomes[0].verdict, Some(Verdict::Failed));
    let reflected = store.get_feature(feature.id).unwrap().unwrap();
    assert!(!reflected.passes);
    assert!(!reflected.in_progress);
}

#[test]
fn dependencies_execute_before_dependents() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_for(&dir);
    let store = orchestrator.context().store().clone();

    let base = store
        .insert_feature(&NewFeature::new("coding", "Base", "Implement base", Vec::new()))
        .unwrap();
    let dependent = NewFeature {
        dependencies: Some(vec![base.id]),
        ..NewFeature::new("coding", "On top", "Implement the dependent part", Vec::new())
    };
    store.insert_feature(&dependent).unwrap();

    let provider = RecordingProvider {
        project_dir: dir.path().to_path_buf(),
        write_files: true,
        dispatched: Mutex::new(Vec::new()),
    };
    let summary = orchestrator.drive_backlog(&provider).unwrap();
    assert_eq!(summary.outcomes.len(), 2);

    let order = provider.dispatched.lock().unwrap();
    assert_eq!(order.len(), 2);
    assert!(order[0].contains("implement-base"));
    assert!(order[1].contains("implement-the-dependent-part"));
}

#[test]
fn snapshots_are_materialized_under_the_generated_dir() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_for(&dir);
    let store = orchestrator.context().store().clone();

    let feature = store
        .insert_feature(&NewFeature::new("coding", "Login", "Implement login", Vec::new()))
        .unwrap();
    let compiled = autobuildr_compiler::compile_and_store(
        &feature,
        store.as_ref(),
        orchestrator.context().clock().now(),
    )
    .unwrap();

    let path = materialize_spec(store.as_ref(), dir.path(), &compiled.spec).unwrap();
    assert!(path.starts_with(dir.path().join(AGENTS_SUBDIR)));
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("Implement login"));

    let stored = store.get_spec(&compiled.spec.id).unwrap().unwrap();
    assert!(stored.spec_path.unwrap().ends_with(&format!("{}.md", compiled.spec.name)));
}
