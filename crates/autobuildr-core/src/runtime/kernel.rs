// crates/autobuildr-core/src/runtime/kernel.rs
// ============================================================================
// Module: Harness Kernel
// Description: Turn-by-turn run execution with budgets, policy, and the gate.
// Purpose: Drive an agent run from pending to a terminal state while
//          recording a complete audit trail.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The kernel is the single writer of a run's status column. Given a spec
//! and a pending run, it transitions the run to `running`, executes turns
//! through the injected executor, enforces the tool policy on every tool
//! event, records the audit trail through the recorder, evaluates the
//! acceptance gate, and commits a terminal state.
//!
//! Budget checks happen before each turn; an in-flight executor call is
//! never interrupted. Transient executor failures retry with exponential
//! backoff without consuming turn budget. Storage failures retry once and
//! then abort the run as failed. A panicking executor is contained and
//! converted into a fatal executor error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::AcceptanceSpec;
use crate::core::AgentRun;
use crate::core::AgentSpec;
use crate::core::ConversationState;
use crate::core::EventType;
use crate::core::InvalidStateTransition;
use crate::core::MAX_TIMEOUT_SECONDS;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::SpecError;
use crate::core::Timestamp;
use crate::core::ToolEvent;
use crate::core::Verdict;
use crate::interfaces::Clock;
use crate::interfaces::CoreStore;
use crate::interfaces::ExecutorError;
use crate::interfaces::StoreError;
use crate::interfaces::TurnExecutor;
use crate::interfaces::ValidationContext;
use crate::interfaces::ValidatorRegistry;
use crate::runtime::gate::GateReport;
use crate::runtime::gate::evaluate_gate;
use crate::runtime::policy::CompiledPolicy;
use crate::runtime::policy::PatternCompilationError;
use crate::runtime::policy::PolicyCheck;
use crate::runtime::policy::blocked_tool_result;
use crate::runtime::recorder::EventRecorder;
use crate::runtime::recorder::RecordOptions;
use crate::runtime::recorder::RecorderError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Backoff configuration for transient executor failures.
///
/// # Invariants
/// - Retries consume wall-clock budget, never turn budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// First retry delay in milliseconds.
    pub base_delay_ms: u64,
    /// Delay multiplier per attempt.
    pub multiplier: u32,
    /// Maximum executor attempts per turn (including the first).
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 250,
            multiplier: 2,
            max_attempts: 3,
        }
    }
}

/// Kernel configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelConfig {
    /// Executor retry backoff.
    pub retry: RetryConfig,
}

// ============================================================================
// SECTION: Control Flags
// ============================================================================

/// Per-run control flags shared between the owning worker and control calls.
///
/// # Invariants
/// - Flags only ever transition false -> true (abort) or toggle (paused).
#[derive(Debug, Default)]
pub struct RunControl {
    /// Cancellation flag checked before each turn.
    abort: AtomicBool,
    /// Pause flag holding the worker between turns.
    paused: AtomicBool,
}

impl RunControl {
    /// Requests cancellation.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation was requested.
    #[must_use]
    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Sets or clears the pause flag.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Returns true while the run is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Kernel failures surfaced to callers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Persistence failure outside the turn loop.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Audit recording failure.
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    /// Invalid status transition; a 409-equivalent outcome.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidStateTransition),
    /// Spec validation failure; never recorded against the run.
    #[error(transparent)]
    Spec(#[from] SpecError),
    /// Tool policy failed to compile; never recorded against the run.
    #[error(transparent)]
    Pattern(#[from] PatternCompilationError),
    /// Run does not exist.
    #[error("run not found: {0}")]
    RunNotFound(RunId),
}

// ============================================================================
// SECTION: Harness Kernel
// ============================================================================

/// Turn-loop execution engine; the single writer of run status.
pub struct HarnessKernel<S> {
    /// Persistence backend.
    store: Arc<S>,
    /// Audit recorder.
    recorder: Arc<EventRecorder<S>>,
    /// Validator registry for the acceptance gate.
    validators: Arc<dyn ValidatorRegistry + Send + Sync>,
    /// Clock driving budget checks and timestamps.
    clock: Arc<dyn Clock>,
    /// Project root directory.
    project_dir: PathBuf,
    /// Kernel configuration.
    config: KernelConfig,
    /// Live per-run control flags, keyed by run id.
    controls: Mutex<HashMap<RunId, Arc<RunControl>>>,
}

impl<S: CoreStore> HarnessKernel<S> {
    /// Creates a kernel over the injected collaborators.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        recorder: Arc<EventRecorder<S>>,
        validators: Arc<dyn ValidatorRegistry + Send + Sync>,
        clock: Arc<dyn Clock>,
        project_dir: impl Into<PathBuf>,
        config: KernelConfig,
    ) -> Self {
        Self {
            store,
            recorder,
            validators,
            clock,
            project_dir: project_dir.into(),
            config,
            controls: Mutex::new(HashMap::new()),
        }
    }

    /// Executes a pending run to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] for preconditions (missing run, wrong state,
    /// invalid spec). Failures inside the turn loop never escape; they
    /// terminalize the run as `failed` and the final record is returned.
    pub fn execute(
        &self,
        spec: &AgentSpec,
        acceptance: Option<&AcceptanceSpec>,
        run_id: &RunId,
        executor: &mut dyn TurnExecutor,
    ) -> Result<AgentRun, KernelError> {
        spec.validate()?;
        let policy = CompiledPolicy::compile(&spec.tool_policy)?;

        let mut run = self
            .store
            .get_run(run_id)?
            .ok_or_else(|| KernelError::RunNotFound(run_id.clone()))?;
        if run.status != RunStatus::Pending {
            return Err(InvalidStateTransition {
                run_id: run_id.clone(),
                from: run.status,
                to: RunStatus::Running,
            }
            .into());
        }

        let control = self.register_control(run_id)?;

        let started_at = self.clock.now();
        run.status = RunStatus::Running;
        run.started_at = Some(started_at);
        self.store.update_run(&run)?;
        self.recorder.record(
            run_id,
            EventType::Started,
            RecordOptions::with_payload(json!({
                "objective": spec.objective,
                "spec_id": spec.id,
            })),
        )?;
        info!(run_id = %run_id, spec = %spec.name, "run started");

        let mut history = ConversationState::new(compose_system_prompt(spec));
        let mut violations: u64 = 0;

        let outcome = self.turn_loop(
            spec,
            acceptance,
            &mut run,
            &policy,
            executor,
            &control,
            started_at,
            &mut history,
            &mut violations,
        );

        self.release_control(run_id);

        match outcome {
            Ok(final_run) => Ok(final_run),
            Err(failure) => {
                // Typed recovery: the loop never leaks an error upward
                // without terminalizing the run first.
                let message = failure.to_string();
                error!(run_id = %run_id, error = %message, "run failed");
                let payload = json!({"error_kind": failure.kind(), "message": message});
                if let Err(terminal) = self.terminalize(
                    &mut run,
                    RunStatus::Failed,
                    Some(Verdict::Error),
                    Some(message),
                    EventType::Failed,
                    payload,
                ) {
                    return Err(StoreError::Engine(terminal.to_string()).into());
                }
                Ok(run)
            }
        }
    }

    /// Runs the turn loop; every internal failure maps to [`TurnFailure`].
    #[allow(
        clippy::too_many_arguments,
        clippy::too_many_lines,
        reason = "Maintain a single linear flow for ordered state updates and auditability."
    )]
    fn turn_loop(
        &self,
        spec: &AgentSpec,
        acceptance: Option<&AcceptanceSpec>,
        run: &mut AgentRun,
        policy: &CompiledPolicy,
        executor: &mut dyn TurnExecutor,
        control: &RunControl,
        started_at: Timestamp,
        history: &mut ConversationState,
        violations: &mut u64,
    ) -> Result<AgentRun, TurnFailure> {
        loop {
            // Hold here while paused; wall-clock budget keeps accruing.
            while control.is_paused() && !control.abort_requested() {
                if self.wall_clock_exhausted(started_at, spec) {
                    break;
                }
                thread::sleep(Duration::from_millis(50));
            }

            if control.abort_requested() {
                let gate = if run.turns_used > 0 {
                    Some(self.run_gate(spec, acceptance, run)?)
                } else {
                    None
                };
                run.acceptance_results =
                    gate.as_ref().map(|report| serde_json::to_value(report).unwrap_or_default());
                let verdict = gate.map_or(Verdict::Error, |report| report.verdict);
                self.terminalize(
                    run,
                    RunStatus::Failed,
                    Some(verdict),
                    Some("user_cancelled".to_string()),
                    EventType::Failed,
                    json!({"error_kind": "user_cancelled", "policy_violations": *violations}),
                )?;
                return Ok(run.clone());
            }

            let now = self.clock.now();
            if self.wall_clock_exhausted(started_at, spec) {
                let elapsed = now.seconds_since(started_at);
                return self.exhaust_budget(
                    spec,
                    acceptance,
                    run,
                    json!({"resource": "wall_clock", "elapsed_seconds": elapsed}),
                );
            }
            if run.turns_used >= spec.max_turns {
                let turns = run.turns_used;
                return self.exhaust_budget(
                    spec,
                    acceptance,
                    run,
                    json!({"resource": "max_turns", "turns_used": turns}),
                );
            }

            let turn = self.call_executor_with_retry(spec, run, executor, history)?;

            for tool_event in &turn.tool_events {
                match policy.check(tool_event) {
                    PolicyCheck::Allowed => {
                        self.record_tool_pair(run, tool_event)?;
                    }
                    PolicyCheck::Blocked(violation) => {
                        *violations += 1;
                        warn!(
                            run_id = %run.id,
                            tool = %violation.tool_name,
                            violation = violation.kind.as_str(),
                            "tool event blocked by policy"
                        );
                        self.recorder.record(
                            &run.id,
                            EventType::PolicyViolation,
                            RecordOptions::for_tool(
                                serde_json::to_value(&violation).unwrap_or_default(),
                                violation.tool_name.clone(),
                            ),
                        )?;
                        self.recorder.record(
                            &run.id,
                            EventType::ToolCall,
                            RecordOptions::for_tool(
                                json!({"arguments": tool_event.arguments}),
                                tool_event.tool_name.clone(),
                            ),
                        )?;
                        self.recorder.record(
                            &run.id,
                            EventType::ToolResult,
                            RecordOptions::for_tool(
                                blocked_tool_result(&violation),
                                tool_event.tool_name.clone(),
                            ),
                        )?;
                    }
                }
            }

            run.turns_used += 1;
            run.tokens_in += turn.tokens_in;
            run.tokens_out += turn.tokens_out;
            let turns = run.turns_used;
            self.recorder.record(
                &run.id,
                EventType::TurnComplete,
                RecordOptions::with_payload(json!({
                    "turn": turns,
                    "tokens_in": run.tokens_in,
                    "tokens_out": run.tokens_out,
                })),
            )?;
            history.push_turn(turn.turn_payload.clone());
            self.persist_run_with_retry(run)?;

            if turn.completed {
                break;
            }
        }

        let report = self.run_gate(spec, acceptance, run)?;
        run.acceptance_results = Some(serde_json::to_value(&report).unwrap_or_default());
        let verdict = report.verdict;
        self.terminalize(
            run,
            RunStatus::Completed,
            Some(verdict),
            None,
            EventType::Completed,
            json!({"verdict": verdict, "policy_violations": *violations}),
        )?;
        Ok(run.clone())
    }

    /// Records a tool_call / tool_result pair for an allowed tool event.
    fn record_tool_pair(&self, run: &AgentRun, tool_event: &ToolEvent) -> Result<(), TurnFailure> {
        self.recorder.record(
            &run.id,
            EventType::ToolCall,
            RecordOptions::for_tool(
                json!({"arguments": tool_event.arguments}),
                tool_event.tool_name.clone(),
            ),
        )?;
        self.recorder.record(
            &run.id,
            EventType::ToolResult,
            RecordOptions::for_tool(
                json!({"result": tool_event.result, "success": tool_event.success}),
                tool_event.tool_name.clone(),
            ),
        )?;
        Ok(())
    }

    /// Calls the executor with backoff on transient failures; a panicking
    /// executor is contained as a fatal error.
    fn call_executor_with_retry(
        &self,
        spec: &AgentSpec,
        run: &AgentRun,
        executor: &mut dyn TurnExecutor,
        history: &ConversationState,
    ) -> Result<crate::core::TurnOutcome, TurnFailure> {
        let mut delay_ms = self.config.retry.base_delay_ms;
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let call = catch_unwind(AssertUnwindSafe(|| {
                executor.execute_turn(spec, &run.id, history)
            }));
            let result = match call {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Fatal {
                    kind: "panic".to_string(),
                    message: "turn executor panicked".to_string(),
                }),
            };
            match result {
                Ok(turn) => return Ok(turn),
                Err(ExecutorError::Transient(message))
                    if attempt < self.config.retry.max_attempts =>
                {
                    warn!(
                        run_id = %run.id,
                        attempt,
                        delay_ms,
                        error = %message,
                        "transient executor failure, retrying"
                    );
                    thread::sleep(Duration::from_millis(delay_ms));
                    delay_ms = delay_ms.saturating_mul(u64::from(self.config.retry.multiplier));
                }
                Err(ExecutorError::Transient(message)) => {
                    return Err(TurnFailure::Executor {
                        kind: "transient_exhausted".to_string(),
                        message,
                    });
                }
                Err(ExecutorError::Fatal { kind, message }) => {
                    return Err(TurnFailure::Executor { kind, message });
                }
            }
        }
    }

    /// Terminalizes a run on budget exhaustion. The terminal `timeout`
    /// event carries the exhausted resource; the gate still runs on the
    /// partial state and its `acceptance_check` event follows it.
    fn exhaust_budget(
        &self,
        spec: &AgentSpec,
        acceptance: Option<&AcceptanceSpec>,
        run: &mut AgentRun,
        payload: serde_json::Value,
    ) -> Result<AgentRun, TurnFailure> {
        self.recorder.record(&run.id, EventType::Timeout, RecordOptions::with_payload(payload))?;
        let report = self.run_gate(spec, acceptance, run)?;
        run.acceptance_results = Some(serde_json::to_value(&report).unwrap_or_default());
        run.status = RunStatus::Timeout;
        run.final_verdict = Some(report.verdict);
        run.completed_at = Some(self.clock.now());
        self.persist_run_with_retry(run)?;
        info!(run_id = %run.id, status = %run.status, "run terminal");
        Ok(run.clone())
    }

    /// Evaluates the acceptance gate and records the `acceptance_check`
    /// event. A spec without an acceptance spec passes vacuously.
    fn run_gate(
        &self,
        _spec: &AgentSpec,
        acceptance: Option<&AcceptanceSpec>,
        run: &AgentRun,
    ) -> Result<GateReport, TurnFailure> {
        let events = self.store.list_events(&run.id)?;
        let report = acceptance.map_or_else(
            || GateReport {
                gate_mode: crate::core::GateMode::AllPass,
                passed: true,
                verdict: Verdict::Passed,
                score: None,
                validators: Vec::new(),
            },
            |acceptance| {
                let context = ValidationContext {
                    run_id: &run.id,
                    project_dir: &self.project_dir,
                    events: &events,
                };
                evaluate_gate(acceptance, self.validators.as_ref(), &context)
            },
        );
        self.recorder.record(
            &run.id,
            EventType::AcceptanceCheck,
            RecordOptions::with_payload(serde_json::to_value(&report).unwrap_or_default()),
        )?;
        Ok(report)
    }

    /// Returns true once the wall-clock budget is exhausted.
    fn wall_clock_exhausted(&self, started_at: Timestamp, spec: &AgentSpec) -> bool {
        self.clock.now().seconds_since(started_at) >= spec.timeout_seconds
    }

    /// Writes the terminal state: status, verdict, error, `completed_at`,
    /// and the matching terminal event, then commits.
    fn terminalize(
        &self,
        run: &mut AgentRun,
        status: RunStatus,
        verdict: Option<Verdict>,
        error: Option<String>,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<(), TurnFailure> {
        run.status = status;
        run.final_verdict = verdict;
        run.error = error;
        run.completed_at = Some(self.clock.now());
        self.recorder.record(&run.id, event_type, RecordOptions::with_payload(payload))?;
        self.persist_run_with_retry(run)?;
        info!(run_id = %run.id, status = %status, "run terminal");
        Ok(())
    }

    /// Persists a run, retrying once with a short backoff before giving up.
    fn persist_run_with_retry(&self, run: &AgentRun) -> Result<(), TurnFailure> {
        match self.store.update_run(run) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(run_id = %run.id, error = %first, "run persist failed, retrying once");
                thread::sleep(Duration::from_millis(self.config.retry.base_delay_ms));
                self.store.update_run(run).map_err(|err| TurnFailure::Storage(err.to_string()))
            }
        }
    }

    /// Registers the control flags for a starting run.
    fn register_control(&self, run_id: &RunId) -> Result<Arc<RunControl>, KernelError> {
        let mut controls = self
            .controls
            .lock()
            .map_err(|_| StoreError::Engine("control registry poisoned".to_string()))?;
        let control = Arc::new(RunControl::default());
        controls.insert(run_id.clone(), Arc::clone(&control));
        Ok(control)
    }

    /// Drops the control flags once a run is terminal.
    fn release_control(&self, run_id: &RunId) {
        if let Ok(mut controls) = self.controls.lock() {
            controls.remove(run_id);
        }
    }

    /// Looks up the live control flags for a run.
    fn control_for(&self, run_id: &RunId) -> Option<Arc<RunControl>> {
        self.controls.lock().ok().and_then(|controls| controls.get(run_id).cloned())
    }

    /// Pauses a running run.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] unless the run is
    /// `running`.
    pub fn pause(&self, run_id: &RunId) -> Result<(), KernelError> {
        let mut run = self
            .store
            .get_run(run_id)?
            .ok_or_else(|| KernelError::RunNotFound(run_id.clone()))?;
        if !run.status.can_transition(RunStatus::Paused) {
            return Err(InvalidStateTransition {
                run_id: run_id.clone(),
                from: run.status,
                to: RunStatus::Paused,
            }
            .into());
        }
        run.status = RunStatus::Paused;
        self.store.update_run(&run)?;
        if let Some(control) = self.control_for(run_id) {
            control.set_paused(true);
        }
        self.recorder.record(run_id, EventType::Paused, RecordOptions::default())?;
        Ok(())
    }

    /// Resumes a paused run.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] unless the run is
    /// `paused`.
    pub fn resume(&self, run_id: &RunId) -> Result<(), KernelError> {
        let mut run = self
            .store
            .get_run(run_id)?
            .ok_or_else(|| KernelError::RunNotFound(run_id.clone()))?;
        if run.status != RunStatus::Paused {
            return Err(InvalidStateTransition {
                run_id: run_id.clone(),
                from: run.status,
                to: RunStatus::Running,
            }
            .into());
        }
        run.status = RunStatus::Running;
        self.store.update_run(&run)?;
        if let Some(control) = self.control_for(run_id) {
            control.set_paused(false);
        }
        self.recorder.record(run_id, EventType::Resumed, RecordOptions::default())?;
        Ok(())
    }

    /// Cancels a run.
    ///
    /// A live worker observes the abort flag before its next turn, discards
    /// any in-flight executor output, and finalizes (running the gate on
    /// partial state when at least one full turn completed). When no worker
    /// owns the run, the kernel terminalizes it directly. Cancelling an
    /// already-cancelled run is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] for other terminal states.
    pub fn cancel(&self, run_id: &RunId) -> Result<(), KernelError> {
        let mut run = self
            .store
            .get_run(run_id)?
            .ok_or_else(|| KernelError::RunNotFound(run_id.clone()))?;
        if run.status.is_terminal() {
            if run.status == RunStatus::Failed && run.error.as_deref() == Some("user_cancelled") {
                return Ok(());
            }
            return Err(InvalidStateTransition {
                run_id: run_id.clone(),
                from: run.status,
                to: RunStatus::Failed,
            }
            .into());
        }
        if run.status == RunStatus::Pending {
            return Err(InvalidStateTransition {
                run_id: run_id.clone(),
                from: run.status,
                to: RunStatus::Failed,
            }
            .into());
        }

        if let Some(control) = self.control_for(run_id) {
            control.request_abort();
            return Ok(());
        }

        run.status = RunStatus::Failed;
        run.final_verdict = Some(Verdict::Error);
        run.error = Some("user_cancelled".to_string());
        run.completed_at = Some(self.clock.now());
        self.recorder.record(
            run_id,
            EventType::Failed,
            RecordOptions::with_payload(json!({"error_kind": "user_cancelled"})),
        )?;
        self.store.update_run(&run)?;
        Ok(())
    }

    /// Repairs runs orphaned by a crash: `pending`/`running` rows whose age
    /// exceeds the largest allowed timeout are failed with
    /// `orphaned_on_restart` before normal operation begins.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] when the scan or repair writes fail.
    pub fn recover_orphaned_runs(&self) -> Result<Vec<RunId>, KernelError> {
        let now = self.clock.now();
        let mut repaired = Vec::new();
        for status in [RunStatus::Pending, RunStatus::Running] {
            for mut run in self.store.list_runs_with_status(status)? {
                let reference = run.started_at.unwrap_or(run.created_at);
                if now.seconds_since(reference) <= MAX_TIMEOUT_SECONDS {
                    continue;
                }
                warn!(run_id = %run.id, status = %run.status, "repairing orphaned run");
                run.status = RunStatus::Failed;
                run.final_verdict = Some(Verdict::Error);
                run.error = Some("orphaned_on_restart".to_string());
                run.completed_at = Some(now);
                self.recorder.record(
                    &run.id,
                    EventType::Failed,
                    RecordOptions::with_payload(json!({"error_kind": "orphaned_on_restart"})),
                )?;
                self.store.update_run(&run)?;
                repaired.push(run.id.clone());
            }
        }
        Ok(repaired)
    }
}

// ============================================================================
// SECTION: Turn Failures
// ============================================================================

/// Internal failure classification inside the turn loop.
///
/// Every variant terminalizes the run as `failed`; none escape to callers.
#[derive(Debug, Error)]
enum TurnFailure {
    /// Executor failed fatally or exhausted its retries.
    #[error("executor failure ({kind}): {message}")]
    Executor {
        /// Stable failure-kind label.
        kind: String,
        /// Human-readable message.
        message: String,
    },
    /// Persistent storage failure after the retry.
    #[error("storage_failure:{0}")]
    Storage(String),
    /// Audit recording failure.
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    /// Store read failure inside the loop.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TurnFailure {
    /// Returns the stable failure-kind label recorded on the failed event.
    fn kind(&self) -> &str {
        match self {
            Self::Executor { kind, .. } => kind,
            Self::Storage(_) => "storage_failure",
            Self::Recorder(_) => "recorder_failure",
            Self::Store(_) => "store_failure",
        }
    }
}

// ============================================================================
// SECTION: System Prompt
// ============================================================================

/// Composes the system prompt from the objective, context map, and rendered
/// tool hints.
fn compose_system_prompt(spec: &AgentSpec) -> String {
    let mut prompt = spec.objective.clone();
    if !spec.context.is_empty() {
        prompt.push_str("\n\nContext:\n");
        for (key, value) in &spec.context {
            prompt.push_str("- ");
            prompt.push_str(key);
            prompt.push_str(": ");
            prompt.push_str(&value.to_string());
            prompt.push('\n');
        }
    }
    let hints = spec.tool_policy.render_tool_hints();
    if !hints.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&hints);
    }
    prompt
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::collections::BTreeMap;

    use super::*;
    use crate::core::ToolPolicy;

    #[test]
    fn system_prompt_includes_context_and_hints() {
        let mut policy = ToolPolicy::allow_all();
        policy.tool_hints.insert("bash".to_string(), "no sudo".to_string());
        let mut context = BTreeMap::new();
        context.insert("repo".to_string(), serde_json::json!("autobuildr"));
        let spec = AgentSpec {
            id: crate::core::SpecId::new("s"),
            name: "coding-x".to_string(),
            display_name: "X".to_string(),
            icon: None,
            spec_version: "v1".to_string(),
            objective: "Do the thing".to_string(),
            task_type: crate::core::TaskType::Coding,
            context,
            tool_policy: policy,
            max_turns: 5,
            timeout_seconds: 60,
            parent_spec_id: None,
            source_feature_id: None,
            spec_path: None,
            priority: 999,
            tags: Vec::new(),
            created_at: Timestamp::from_unix_millis(0),
        };
        let prompt = compose_system_prompt(&spec);
        assert!(prompt.starts_with("Do the thing"));
        assert!(prompt.contains("repo"));
        assert!(prompt.contains("no sudo"));
    }
}
