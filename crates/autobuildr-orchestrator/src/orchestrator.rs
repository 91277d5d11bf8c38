// crates/autobuildr-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Scheduler driver turning the backlog into executed runs.
// Purpose: Pick ready features via the resolver, compile them, execute
//          through the kernel, and reflect verdicts onto feature records.
// Dependencies: autobuildr-compiler, autobuildr-core, autobuildr-graph
// ============================================================================

//! ## Overview
//! The orchestrator drives execution in waves: it selects ready features
//! (unclaimed, not passed, every dependency passed), orders them by
//! scheduling score, and dispatches up to K workers per wave (K from
//! configuration, hard max 5). Each worker owns its run start-to-terminal:
//! claim the feature, compile a spec, insert a pending run, execute through
//! the kernel, reflect the verdict, release the claim. Waves repeat until
//! no feature is ready.
//!
//! Startup order is fixed: crash recovery first, then the dependency
//! health check, then scheduling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use autobuildr_compiler::CompileError;
use autobuildr_compiler::compile_and_store;
use autobuildr_core::AgentRun;
use autobuildr_core::AgentSpec;
use autobuildr_core::Feature;
use autobuildr_core::FeatureId;
use autobuildr_core::KernelError;
use autobuildr_core::RunId;
use autobuildr_core::Verdict;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::RunStore;
use autobuildr_core::interfaces::StoreError;
use autobuildr_core::interfaces::TurnExecutor;
use autobuildr_graph::compute_scheduling_scores;
use autobuildr_store_sqlite::SqliteStore;
use thiserror::Error;
use tracing::error;
use tracing::info;

use crate::context::CoreContext;
use crate::health::HealthError;
use crate::health::HealthReport;
use crate::health::startup_health_check;

// ============================================================================
// SECTION: Executor Provider
// ============================================================================

/// Supplies each worker with its own turn executor.
pub trait ExecutorProvider: Send + Sync {
    /// Builds an executor for one run of the given spec.
    fn executor_for(&self, spec: &AgentSpec) -> Box<dyn TurnExecutor + Send>;
}

// ============================================================================
// SECTION: Errors and Summary
// ============================================================================

/// Orchestrator failures.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Startup health check failed.
    #[error(transparent)]
    Health(#[from] HealthError),
    /// Kernel precondition failure outside a run.
    #[error(transparent)]
    Kernel(#[from] KernelError),
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Feature compilation failure.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Outcome of one executed feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOutcome {
    /// Feature that was executed.
    pub feature_id: FeatureId,
    /// Run that executed it.
    pub run_id: RunId,
    /// Terminal verdict.
    pub verdict: Option<Verdict>,
}

/// Summary of a full backlog drive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// Outcomes in completion order.
    pub outcomes: Vec<FeatureOutcome>,
    /// Runs repaired by crash recovery before scheduling.
    pub recovered_runs: Vec<RunId>,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Scheduler driver over one core context.
pub struct Orchestrator {
    /// Composed runtime for the project.
    context: CoreContext,
}

impl Orchestrator {
    /// Creates an orchestrator over an initialized context.
    #[must_use]
    pub const fn new(context: CoreContext) -> Self {
        Self {
            context,
        }
    }

    /// Returns the underlying context.
    #[must_use]
    pub const fn context(&self) -> &CoreContext {
        &self.context
    }

    /// Runs startup repairs: crash recovery, then the dependency health
    /// check.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Health`] when cycles block startup.
    pub fn startup(&self) -> Result<(HealthReport, Vec<RunId>), OrchestratorError> {
        let recovered = self.context.kernel().recover_orphaned_runs()?;
        if !recovered.is_empty() {
            info!(count = recovered.len(), "repaired orphaned runs on startup");
        }
        let report = startup_health_check(self.context.store().as_ref())?;
        Ok((report, recovered))
    }

    /// Drives the backlog until no feature is ready.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] for startup failures; per-feature
    /// failures are reflected in the summary, not raised.
    pub fn drive_backlog(
        &self,
        executors: &dyn ExecutorProvider,
    ) -> Result<DriveSummary, OrchestratorError> {
        let (_, recovered_runs) = self.startup()?;
        let mut summary = DriveSummary {
            recovered_runs,
            ..DriveSummary::default()
        };

        // Features attempted in this drive are not rescheduled even when
        // their gate failed; a fresh drive retries them.
        let mut attempted = std::collections::BTreeSet::new();
        loop {
            let wave = self.select_wave(&attempted)?;
            if wave.is_empty() {
                break;
            }
            for feature in &wave {
                attempted.insert(feature.id);
            }
            let outcomes = self.run_wave(wave, executors);
            summary.outcomes.extend(outcomes);
        }

        info!(executed = summary.outcomes.len(), "backlog drive complete");
        Ok(summary)
    }

    /// Selects the next wave of ready features, best-scored first, capped
    /// at the configured concurrency.
    fn select_wave(
        &self,
        attempted: &std::collections::BTreeSet<FeatureId>,
    ) -> Result<Vec<Feature>, OrchestratorError> {
        let features = self.context.store().list_features()?;
        let scores = compute_scheduling_scores(&features);
        let mut ready: Vec<Feature> = features
            .iter()
            .filter(|feature| feature.is_ready_candidate() && !attempted.contains(&feature.id))
            .filter(|feature| {
                feature.dependencies_safe().iter().all(|dependency| {
                    features
                        .iter()
                        .find(|candidate| candidate.id == *dependency)
                        .is_some_and(|candidate| candidate.passes)
                })
            })
            .cloned()
            .collect();
        ready.sort_by(|a, b| {
            let score_a = scores.get(&a.id).copied().unwrap_or(0.0);
            let score_b = scores.get(&b.id).copied().unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.id.cmp(&b.id))
        });
        ready.truncate(self.context.config().max_concurrency);
        Ok(ready)
    }

    /// Executes one wave with one worker thread per feature.
    fn run_wave(
        &self,
        wave: Vec<Feature>,
        executors: &dyn ExecutorProvider,
    ) -> Vec<FeatureOutcome> {
        let outcomes = Mutex::new(Vec::new());
        thread::scope(|scope| {
            for feature in wave {
                let outcomes = &outcomes;
                scope.spawn(move || match self.run_feature(&feature, executors) {
                    Ok(outcome) => {
                        if let Ok(mut guard) = outcomes.lock() {
                            guard.push(outcome);
                        }
                    }
                    Err(err) => {
                        error!(
                            feature_id = %feature.id,
                            error = %err,
                            "feature execution failed"
                        );
                    }
                });
            }
        });
        outcomes.into_inner().unwrap_or_default()
    }

    /// Executes one feature start-to-terminal on the calling worker.
    fn run_feature(
        &self,
        feature: &Feature,
        executors: &dyn ExecutorProvider,
    ) -> Result<FeatureOutcome, OrchestratorError> {
        let store: &Arc<SqliteStore> = self.context.store();
        store.set_feature_in_progress(feature.id, true)?;

        let result = self.execute_feature(feature, executors);

        // The claim is always released, success or failure.
        if let Err(release) = store.set_feature_in_progress(feature.id, false) {
            error!(feature_id = %feature.id, error = %release, "claim release failed");
        }
        result
    }

    /// Compiles, runs, and reflects one feature.
    fn execute_feature(
        &self,
        feature: &Feature,
        executors: &dyn ExecutorProvider,
    ) -> Result<FeatureOutcome, OrchestratorError> {
        let store = self.context.store();
        let now = self.context.clock().now();
        let compiled = compile_and_store(feature, store.as_ref(), now)?;

        let run = AgentRun::pending(RunId::generate(), compiled.spec.id.clone(), now);
        store.insert_run(&run)?;

        let mut executor = executors.executor_for(&compiled.spec);
        let finished = self.context.kernel().execute(
            &compiled.spec,
            Some(&compiled.acceptance),
            &run.id,
            executor.as_mut(),
        )?;

        let passed = finished.final_verdict == Some(Verdict::Passed);
        store.set_feature_passes(feature.id, passed)?;
        info!(
            feature_id = %feature.id,
            run_id = %finished.id,
            verdict = finished.final_verdict.map_or("none", Verdict::as_str),
            "feature reflected"
        );
        Ok(FeatureOutcome {
            feature_id: feature.id,
            run_id: finished.id,
            verdict: finished.final_verdict,
        })
    }
}
