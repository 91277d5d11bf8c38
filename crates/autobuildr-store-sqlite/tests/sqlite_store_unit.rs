// crates/autobuildr-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Schema idempotence, CRUD round-trips, cascades, and the
//              sequence contract.
// Purpose: Validate migration idempotence, uniqueness constraints, cascade
//          deletes, SET NULL on artifact delete, and dense sequences.
// ============================================================================

//! ## Overview
//! Unit-level coverage for the durable store:
//! - Opening twice produces the same schema and row set (idempotent
//!   migration).
//! - Feature, spec, run, event, and artifact round-trips.
//! - Spec name uniqueness and the one-non-terminal-run invariant.
//! - Cascade deletes spec -> acceptance/runs -> events/artifacts.
//! - `artifact_ref` SET NULL on artifact delete.
//! - `(run_id, sequence)` uniqueness and `max_sequence` recovery.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;

use autobuildr_core::AcceptanceSpec;
use autobuildr_core::AcceptanceSpecId;
use autobuildr_core::AgentRun;
use autobuildr_core::AgentSpec;
use autobuildr_core::Artifact;
use autobuildr_core::ArtifactId;
use autobuildr_core::ArtifactType;
use autobuildr_core::ContentHash;
use autobuildr_core::EventType;
use autobuildr_core::GateMode;
use autobuildr_core::NewAgentEvent;
use autobuildr_core::NewFeature;
use autobuildr_core::RetryPolicy;
use autobuildr_core::RunId;
use autobuildr_core::RunStatus;
use autobuildr_core::SpecId;
use autobuildr_core::TaskType;
use autobuildr_core::Timestamp;
use autobuildr_core::ToolPolicy;
use autobuildr_core::ValidatorConfig;
use autobuildr_core::ValidatorKind;
use autobuildr_core::interfaces::ArtifactRecordStore;
use autobuildr_core::interfaces::EventStore;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::RunStore;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_core::interfaces::StoreError;
use autobuildr_store_sqlite::SqliteStore;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> SqliteStore {
    SqliteStore::open_project(dir.path()).expect("open store")
}

fn sample_spec(name: &str) -> AgentSpec {
    AgentSpec {
        id: SpecId::generate(),
        name: name.to_string(),
        display_name: "Sample".to_string(),
        icon: None,
        spec_version: "v1".to_string(),
        objective: "objective".to_string(),
        task_type: TaskType::Coding,
        context: BTreeMap::new(),
        tool_policy: ToolPolicy::allow_all(),
        max_turns: 20,
        timeout_seconds: 300,
        parent_spec_id: None,
        source_feature_id: None,
        spec_path: None,
        priority: 999,
        tags: vec!["auto".to_string()],
        created_at: Timestamp::from_unix_millis(1_000),
    }
}

fn sample_run(spec: &AgentSpec) -> AgentRun {
    AgentRun::pending(RunId::generate(), spec.id.clone(), Timestamp::from_unix_millis(2_000))
}

fn sample_event(run_id: &RunId, sequence: u64) -> NewAgentEvent {
    NewAgentEvent {
        run_id: run_id.clone(),
        sequence,
        event_type: EventType::Started,
        timestamp: Timestamp::from_unix_millis(3_000),
        payload: Some(serde_json::json!({"n": sequence})),
        payload_truncated: None,
        artifact_ref: None,
        tool_name: None,
    }
}

fn sample_artifact(run_id: &RunId) -> Artifact {
    Artifact {
        id: ArtifactId::generate(),
        run_id: run_id.clone(),
        artifact_type: ArtifactType::Log,
        path: None,
        content_hash: ContentHash::of_bytes(b"body"),
        size_bytes: 4,
        content_inline: Some("body".to_string()),
        content_ref: None,
        metadata: BTreeMap::new(),
    }
}

#[test]
fn migration_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let feature = store.insert_feature(&NewFeature::new("coding", "a", "d", Vec::new())).unwrap();
    drop(store);

    // Reopening applies the migration again; data survives unchanged.
    let store = open_store(&dir);
    let features = store.list_features().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].id, feature.id);
}

#[test]
fn feature_round_trip_preserves_steps_and_dependencies() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = store.insert_feature(&NewFeature::new("coding", "a", "d", Vec::new())).unwrap();
    let new = NewFeature {
        dependencies: Some(vec![a.id]),
        ..NewFeature::new("testing", "b", "desc", vec!["Run tests".to_string()])
    };
    let b = store.insert_feature(&new).unwrap();

    let fetched = store.get_feature(b.id).unwrap().unwrap();
    assert_eq!(fetched.steps, vec!["Run tests".to_string()]);
    assert_eq!(fetched.dependencies_safe(), vec![a.id]);
    assert!(!fetched.passes);
    assert!(!fetched.in_progress);

    store.set_feature_in_progress(b.id, true).unwrap();
    store.set_feature_passes(b.id, true).unwrap();
    let fetched = store.get_feature(b.id).unwrap().unwrap();
    assert!(fetched.passes);
    assert!(fetched.in_progress);
}

#[test]
fn malformed_dependency_members_are_filtered_on_read() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let feature = store.insert_feature(&NewFeature::new("coding", "a", "d", Vec::new())).unwrap();

    // Corrupt the column directly the way legacy data could.
    let connection = rusqlite::Connection::open(dir.path().join("features.db")).unwrap();
    connection
        .execute(
            "UPDATE features SET dependencies = '[1, \"junk\", 2.5, 7]' WHERE id = ?1",
            rusqlite::params![feature.id.get()],
        )
        .unwrap();
    drop(connection);

    let fetched = store.get_feature(feature.id).unwrap().unwrap();
    let ids: Vec<i64> = fetched.dependencies_safe().iter().map(|id| id.get()).collect();
    assert_eq!(ids, vec![1, 7]);
}

#[test]
fn spec_round_trip_and_name_uniqueness() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-sample");
    store.insert_spec(&spec).unwrap();

    let fetched = store.get_spec(&spec.id).unwrap().unwrap();
    assert_eq!(fetched.name, spec.name);
    assert_eq!(fetched.task_type, TaskType::Coding);
    assert_eq!(fetched.tags, spec.tags);
    assert!(store.spec_name_exists("coding-sample").unwrap());
    assert!(store.get_spec_by_name("coding-sample").unwrap().is_some());

    let mut duplicate = sample_spec("coding-sample");
    duplicate.id = SpecId::generate();
    let err = store.insert_spec(&duplicate).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn acceptance_spec_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-acceptance");
    store.insert_spec(&spec).unwrap();

    let acceptance = AcceptanceSpec {
        id: AcceptanceSpecId::generate(),
        agent_spec_id: spec.id.clone(),
        validators: vec![ValidatorConfig::new(ValidatorKind::FileExists, serde_json::Map::new())],
        gate_mode: GateMode::Weighted,
        min_score: Some(0.75),
        retry_policy: RetryPolicy::Exponential,
        max_retries: 2,
        fallback_spec_id: None,
    };
    store.insert_acceptance_spec(&acceptance).unwrap();

    let fetched = store.get_acceptance_for_spec(&spec.id).unwrap().unwrap();
    assert_eq!(fetched.gate_mode, GateMode::Weighted);
    assert_eq!(fetched.min_score, Some(0.75));
    assert_eq!(fetched.retry_policy, RetryPolicy::Exponential);
    assert_eq!(fetched.validators.len(), 1);
    assert_eq!(fetched.validators[0].kind, ValidatorKind::FileExists);
}

#[test]
fn at_most_one_non_terminal_run_per_spec() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-runs");
    store.insert_spec(&spec).unwrap();

    store.insert_run(&sample_run(&spec)).unwrap();
    let err = store.insert_run(&sample_run(&spec)).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn run_update_round_trips_terminal_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-run-update");
    store.insert_spec(&spec).unwrap();
    let mut run = sample_run(&spec);
    store.insert_run(&run).unwrap();

    run.status = RunStatus::Completed;
    run.started_at = Some(Timestamp::from_unix_millis(2_100));
    run.completed_at = Some(Timestamp::from_unix_millis(2_500));
    run.turns_used = 4;
    run.tokens_in = 1_234;
    run.tokens_out = 567;
    run.final_verdict = Some(autobuildr_core::Verdict::Passed);
    run.acceptance_results = Some(serde_json::json!({"passed": true}));
    store.update_run(&run).unwrap();

    let fetched = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(fetched, run);
    assert!(store.find_non_terminal_run(&spec.id).unwrap().is_none());
    assert_eq!(store.list_runs_with_status(RunStatus::Completed).unwrap().len(), 1);
}

#[test]
fn sequence_collisions_conflict_and_max_sequence_recovers() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-events");
    store.insert_spec(&spec).unwrap();
    let run = sample_run(&spec);
    store.insert_run(&run).unwrap();

    store.insert_event(&sample_event(&run.id, 1)).unwrap();
    store.insert_event(&sample_event(&run.id, 2)).unwrap();
    let err = store.insert_event(&sample_event(&run.id, 2)).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.max_sequence(&run.id).unwrap(), 2);
    assert_eq!(store.max_sequence(&RunId::new("missing")).unwrap(), 0);

    let events = store.list_events(&run.id).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence, 1);
    let started = store.list_events_of_type(&run.id, EventType::Started).unwrap();
    assert_eq!(started.len(), 2);
}

#[test]
fn cascade_delete_removes_runs_events_and_artifacts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-cascade");
    store.insert_spec(&spec).unwrap();
    let acceptance = AcceptanceSpec {
        id: AcceptanceSpecId::generate(),
        agent_spec_id: spec.id.clone(),
        validators: Vec::new(),
        gate_mode: GateMode::AllPass,
        min_score: None,
        retry_policy: RetryPolicy::None,
        max_retries: 0,
        fallback_spec_id: None,
    };
    store.insert_acceptance_spec(&acceptance).unwrap();
    let run = sample_run(&spec);
    store.insert_run(&run).unwrap();
    store.insert_event(&sample_event(&run.id, 1)).unwrap();
    store.insert_artifact(&sample_artifact(&run.id)).unwrap();

    store.delete_spec(&spec.id).unwrap();
    assert!(store.get_spec(&spec.id).unwrap().is_none());
    assert!(store.get_acceptance_for_spec(&spec.id).unwrap().is_none());
    assert!(store.get_run(&run.id).unwrap().is_none());
    assert!(store.list_events(&run.id).unwrap().is_empty());
    assert!(store.find_artifact_by_hash(&run.id, &ContentHash::of_bytes(b"body")).unwrap().is_none());
}

#[test]
fn deleting_an_artifact_nulls_event_references() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-setnull");
    store.insert_spec(&spec).unwrap();
    let run = sample_run(&spec);
    store.insert_run(&run).unwrap();
    let artifact = sample_artifact(&run.id);
    store.insert_artifact(&artifact).unwrap();

    let mut event = sample_event(&run.id, 1);
    event.artifact_ref = Some(artifact.id.clone());
    store.insert_event(&event).unwrap();

    // Deleting the artifact weakly detaches the event.
    let connection = rusqlite::Connection::open(dir.path().join("features.db")).unwrap();
    connection.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    connection
        .execute("DELETE FROM artifacts WHERE id = ?1", rusqlite::params![artifact.id.as_str()])
        .unwrap();
    drop(connection);

    let events = store.list_events(&run.id).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].artifact_ref.is_none());
}

#[test]
fn artifact_round_trips_with_hash_and_dedup_lookup() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let spec = sample_spec("coding-artifacts");
    store.insert_spec(&spec).unwrap();
    let run = sample_run(&spec);
    store.insert_run(&run).unwrap();

    let artifact = sample_artifact(&run.id);
    store.insert_artifact(&artifact).unwrap();
    let fetched = store.get_artifact(&artifact.id).unwrap().unwrap();
    assert_eq!(fetched, artifact);

    let by_hash =
        store.find_artifact_by_hash(&run.id, &artifact.content_hash).unwrap().unwrap();
    assert_eq!(by_hash.id, artifact.id);
}

#[test]
fn bulk_dependency_updates_commit_atomically() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let a = store.insert_feature(&NewFeature::new("coding", "a", "d", Vec::new())).unwrap();
    let b = store.insert_feature(&NewFeature::new("coding", "b", "d", Vec::new())).unwrap();

    store
        .set_dependencies_bulk(&[(a.id, Some(vec![b.id])), (b.id, Some(Vec::new()))])
        .unwrap();
    assert_eq!(store.get_feature(a.id).unwrap().unwrap().dependencies_safe(), vec![b.id]);

    // A failing member rolls the whole batch back.
    let missing = autobuildr_core::FeatureId::new(404);
    let err = store
        .set_dependencies_bulk(&[(a.id, Some(Vec::new())), (missing, None)])
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(store.get_feature(a.id).unwrap().unwrap().dependencies_safe(), vec![b.id]);
}
