// crates/autobuildr-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Support
// Description: Shared fixtures for kernel and recorder integration tests.
// Purpose: Provide a manual clock, stub executors, and record builders.
// ============================================================================

//! ## Overview
//! Shared helpers for the core integration suites: a manually advanced
//! clock, scripted turn executors, a pass-everything validator registry,
//! and builders for specs and pending runs.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only helpers; not every suite uses every item."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use autobuildr_core::AgentRun;
use autobuildr_core::AgentSpec;
use autobuildr_core::ArtifactStore;
use autobuildr_core::Clock;
use autobuildr_core::ConversationState;
use autobuildr_core::EventRecorder;
use autobuildr_core::ExecutorError;
use autobuildr_core::HarnessKernel;
use autobuildr_core::InMemoryStore;
use autobuildr_core::KernelConfig;
use autobuildr_core::RunId;
use autobuildr_core::SpecId;
use autobuildr_core::TaskType;
use autobuildr_core::Timestamp;
use autobuildr_core::ToolPolicy;
use autobuildr_core::TurnExecutor;
use autobuildr_core::TurnOutcome;
use autobuildr_core::ValidationContext;
use autobuildr_core::Validator;
use autobuildr_core::ValidatorError;
use autobuildr_core::ValidatorKind;
use autobuildr_core::ValidatorRegistry;
use autobuildr_core::ValidatorResult;

/// Manually advanced clock for deterministic budget checks.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in unix milliseconds.
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    /// Advances the clock by the given milliseconds.
    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Scripted executor returning pre-built turns in order.
pub struct ScriptedExecutor {
    /// Remaining scripted turns, front first.
    turns: Mutex<Vec<Result<TurnOutcome, ExecutorError>>>,
    /// Fallback turn replayed once the script is exhausted.
    fallback: TurnOutcome,
    /// Optional clock advanced by each call, simulating elapsed time.
    clock: Option<(Arc<ManualClock>, i64)>,
}

impl ScriptedExecutor {
    pub fn new(turns: Vec<Result<TurnOutcome, ExecutorError>>) -> Self {
        Self {
            turns: Mutex::new(turns),
            fallback: TurnOutcome::empty(),
            clock: None,
        }
    }

    /// Returns an executor that never completes and advances the clock by
    /// `millis_per_turn` on each call.
    pub fn endless(clock: Arc<ManualClock>, millis_per_turn: i64) -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
            fallback: TurnOutcome::empty(),
            clock: Some((clock, millis_per_turn)),
        }
    }
}

impl TurnExecutor for ScriptedExecutor {
    fn execute_turn(
        &mut self,
        _spec: &AgentSpec,
        _run_id: &RunId,
        _history: &ConversationState,
    ) -> Result<TurnOutcome, ExecutorError> {
        if let Some((clock, delta)) = &self.clock {
            clock.advance_millis(*delta);
        }
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            Ok(self.fallback.clone())
        } else {
            turns.remove(0)
        }
    }
}

/// Validator registry whose single validator always passes.
pub struct PassRegistry {
    validator: PassValidator,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self {
            validator: PassValidator,
        }
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry for PassRegistry {
    fn resolve(&self, _kind: ValidatorKind) -> Option<&dyn Validator> {
        Some(&self.validator)
    }
}

/// Validator that always passes.
pub struct PassValidator;

impl Validator for PassValidator {
    fn evaluate(
        &self,
        _config: &autobuildr_core::ValidatorConfig,
        _context: &ValidationContext<'_>,
    ) -> Result<ValidatorResult, ValidatorError> {
        Ok(ValidatorResult::pass("ok", serde_json::Value::Null))
    }
}

/// Builds a minimal valid spec with the given budgets.
pub fn spec_with_budgets(max_turns: u32, timeout_seconds: u64) -> AgentSpec {
    AgentSpec {
        id: SpecId::generate(),
        name: "coding-test-spec".to_string(),
        display_name: "Test Spec".to_string(),
        icon: None,
        spec_version: "v1".to_string(),
        objective: "Exercise the kernel".to_string(),
        task_type: TaskType::Coding,
        context: BTreeMap::new(),
        tool_policy: ToolPolicy::allow_all(),
        max_turns,
        timeout_seconds,
        parent_spec_id: None,
        source_feature_id: None,
        spec_path: None,
        priority: 999,
        tags: Vec::new(),
        created_at: Timestamp::from_unix_millis(0),
    }
}

/// Test harness bundle: store, recorder, artifacts, kernel, clock.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub artifacts: ArtifactStore<InMemoryStore>,
    pub recorder: Arc<EventRecorder<InMemoryStore>>,
    pub kernel: HarnessKernel<InMemoryStore>,
    pub project_dir: tempfile::TempDir,
}

/// Builds a full kernel harness over an in-memory store.
pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_000_000));
    let project_dir = tempfile::tempdir().expect("tempdir");
    let artifacts = ArtifactStore::new(project_dir.path(), Arc::clone(&store));
    let recorder = Arc::new(EventRecorder::new(
        Arc::clone(&store),
        artifacts.clone(),
        clock.clone() as Arc<dyn Clock>,
    ));
    let kernel = HarnessKernel::new(
        Arc::clone(&store),
        Arc::clone(&recorder),
        Arc::new(PassRegistry::new()),
        clock.clone() as Arc<dyn Clock>,
        project_dir.path(),
        KernelConfig::default(),
    );
    Harness {
        store,
        clock,
        artifacts,
        recorder,
        kernel,
        project_dir,
    }
}

/// Inserts a pending run for a spec and returns its id.
pub fn pending_run(store: &InMemoryStore, spec: &AgentSpec, now: Timestamp) -> RunId {
    use autobuildr_core::RunStore;
    let run = AgentRun::pending(RunId::generate(), spec.id.clone(), now);
    store.insert_run(&run).expect("insert run");
    run.id
}
