// crates/autobuildr-core/src/interfaces/mod.rs
// ============================================================================
// Module: AutoBuildr Interfaces
// Description: Backend-agnostic interfaces for persistence, turn execution,
//              validation, and time.
// Purpose: Define the contract surfaces used by the harness runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the harness runtime integrates with external systems
//! without embedding backend details. Implementations must be deterministic
//! where the contract demands it and fail closed on missing or invalid data.
//!
//! The turn executor is the only interface reaching the LLM world; the store
//! traits describe the persistence schema contract; validators implement the
//! acceptance gate's capability set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::AcceptanceSpec;
use crate::core::AgentEvent;
use crate::core::AgentRun;
use crate::core::AgentSpec;
use crate::core::Artifact;
use crate::core::ArtifactId;
use crate::core::ContentHash;
use crate::core::ConversationState;
use crate::core::EventId;
use crate::core::EventType;
use crate::core::Feature;
use crate::core::FeatureId;
use crate::core::NewAgentEvent;
use crate::core::NewFeature;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::SpecId;
use crate::core::Timestamp;
use crate::core::TurnOutcome;
use crate::core::ValidatorConfig;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Persistence errors shared by every store trait.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages avoid embedding raw payload content.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Database engine failure.
    #[error("store engine error: {0}")]
    Engine(String),
    /// Referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
    /// Uniqueness or integrity conflict.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Stored data failed to deserialize or violated an invariant.
    #[error("store data invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Feature Store
// ============================================================================

/// Persistence surface for backlog features.
pub trait FeatureStore {
    /// Lists every feature.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_features(&self) -> Result<Vec<Feature>, StoreError>;

    /// Fetches a feature by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_feature(&self, id: FeatureId) -> Result<Option<Feature>, StoreError>;

    /// Inserts a feature and returns the stored record with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_feature(&self, feature: &NewFeature) -> Result<Feature, StoreError>;

    /// Replaces a feature's dependency list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the feature does not exist.
    fn set_feature_dependencies(
        &self,
        id: FeatureId,
        dependencies: Option<&[FeatureId]>,
    ) -> Result<(), StoreError>;

    /// Replaces dependency lists for several features in one transaction.
    ///
    /// The default implementation applies the updates one by one; durable
    /// stores override it with a single atomic transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any update fails.
    fn set_dependencies_bulk(
        &self,
        updates: &[(FeatureId, Option<Vec<FeatureId>>)],
    ) -> Result<(), StoreError> {
        for (id, dependencies) in updates {
            self.set_feature_dependencies(*id, dependencies.as_deref())?;
        }
        Ok(())
    }

    /// Sets the `in_progress` flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the feature does not exist.
    fn set_feature_in_progress(&self, id: FeatureId, in_progress: bool) -> Result<(), StoreError>;

    /// Sets the `passes` flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the feature does not exist.
    fn set_feature_passes(&self, id: FeatureId, passes: bool) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Spec Store
// ============================================================================

/// Persistence surface for agent specs and their acceptance specs.
pub trait SpecStore {
    /// Inserts an agent spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate name.
    fn insert_spec(&self, spec: &AgentSpec) -> Result<(), StoreError>;

    /// Inserts an acceptance spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the owning spec already has one.
    fn insert_acceptance_spec(&self, acceptance: &AcceptanceSpec) -> Result<(), StoreError>;

    /// Fetches a spec by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_spec(&self, id: &SpecId) -> Result<Option<AgentSpec>, StoreError>;

    /// Fetches a spec by its unique name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_spec_by_name(&self, name: &str) -> Result<Option<AgentSpec>, StoreError>;

    /// Fetches the acceptance spec owned by a spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_acceptance_for_spec(&self, spec_id: &SpecId)
    -> Result<Option<AcceptanceSpec>, StoreError>;

    /// Returns true when a spec with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn spec_name_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Records the on-disk snapshot path for a materialized spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the spec does not exist.
    fn set_spec_path(&self, id: &SpecId, spec_path: &str) -> Result<(), StoreError>;

    /// Deletes a spec, cascading to its acceptance spec and runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_spec(&self, id: &SpecId) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Persistence surface for agent runs.
pub trait RunStore {
    /// Inserts a run record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when another run for the same spec
    /// is still non-terminal.
    fn insert_run(&self, run: &AgentRun) -> Result<(), StoreError>;

    /// Fetches a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, StoreError>;

    /// Persists the mutable columns of a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    fn update_run(&self, run: &AgentRun) -> Result<(), StoreError>;

    /// Finds the non-terminal run for a spec, when any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn find_non_terminal_run(&self, spec_id: &SpecId) -> Result<Option<AgentRun>, StoreError>;

    /// Lists runs currently holding the given status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_runs_with_status(&self, status: RunStatus) -> Result<Vec<AgentRun>, StoreError>;
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// Persistence surface for audit events.
pub trait EventStore {
    /// Inserts an event and returns its assigned id.
    ///
    /// The insert commits synchronously: once this returns, the event is
    /// durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a `(run_id, sequence)` collision.
    fn insert_event(&self, event: &NewAgentEvent) -> Result<EventId, StoreError>;

    /// Returns the highest sequence recorded for a run (0 when none).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn max_sequence(&self, run_id: &RunId) -> Result<u64, StoreError>;

    /// Lists a run's events in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_events(&self, run_id: &RunId) -> Result<Vec<AgentEvent>, StoreError>;

    /// Lists a run's events of one type in sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_events_of_type(
        &self,
        run_id: &RunId,
        event_type: EventType,
    ) -> Result<Vec<AgentEvent>, StoreError>;
}

// ============================================================================
// SECTION: Artifact Record Store
// ============================================================================

/// Persistence surface for artifact records (blob bytes live on disk).
pub trait ArtifactRecordStore {
    /// Inserts an artifact record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Fetches an artifact by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError>;

    /// Finds an artifact by `(run_id, content_hash)` for deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn find_artifact_by_hash(
        &self,
        run_id: &RunId,
        hash: &ContentHash,
    ) -> Result<Option<Artifact>, StoreError>;
}

// ============================================================================
// SECTION: Combined Store
// ============================================================================

/// Convenience supertrait combining every persistence surface.
pub trait CoreStore:
    FeatureStore + SpecStore + RunStore + EventStore + ArtifactRecordStore + Send + Sync
{
}

impl<T> CoreStore for T where
    T: FeatureStore + SpecStore + RunStore + EventStore + ArtifactRecordStore + Send + Sync
{
}

// ============================================================================
// SECTION: Turn Executor
// ============================================================================

/// Executor failure classification.
///
/// # Invariants
/// - `Transient` failures are retried with backoff; `Fatal` failures
///   terminate the run as failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Retryable transport-level failure (network, rate limit, 5xx).
    #[error("transient executor error: {0}")]
    Transient(String),
    /// Non-retryable failure.
    #[error("fatal executor error ({kind}): {message}")]
    Fatal {
        /// Stable failure-kind label.
        kind: String,
        /// Human-readable message.
        message: String,
    },
}

/// External collaborator driving one LLM turn at a time.
///
/// Implementations must not raise for protocol-level failures; they return
/// an empty turn with `completed = false` and surface the failure as a
/// single tool event named [`crate::core::ERROR_TOOL_NAME`]. Transport-level
/// failures may surface as [`ExecutorError`] for the kernel's retry logic.
pub trait TurnExecutor {
    /// Executes one turn against the conversation history.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] for transport-level failures only.
    fn execute_turn(
        &mut self,
        spec: &AgentSpec,
        run_id: &RunId,
        history: &ConversationState,
    ) -> Result<TurnOutcome, ExecutorError>;
}

// ============================================================================
// SECTION: Validators
// ============================================================================

/// Validator evaluation errors.
///
/// A failing validator is not an error; errors describe evaluation that
/// could not produce a result at all. The gate maps them to failed results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    /// Required configuration key missing or malformed.
    #[error("validator config invalid: {0}")]
    Config(String),
    /// Evaluation infrastructure failed (spawn, I/O).
    #[error("validator evaluation failed: {0}")]
    Evaluation(String),
}

/// Context handed to validators during gate evaluation.
///
/// # Invariants
/// - `events` is the run's full event list in sequence order.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    /// Run under evaluation.
    pub run_id: &'a RunId,
    /// Project root directory for `{project_dir}` interpolation.
    pub project_dir: &'a Path,
    /// The run's events in sequence order.
    pub events: &'a [AgentEvent],
}

/// Outcome of one validator evaluation.
///
/// # Invariants
/// - `details` is a structured object safe to embed in event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorResult {
    /// True when the validator passed.
    pub passed: bool,
    /// One-line human-readable outcome.
    pub message: String,
    /// Structured evaluation details.
    pub details: Value,
}

impl ValidatorResult {
    /// Creates a passing result.
    #[must_use]
    pub fn pass(message: impl Into<String>, details: Value) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details,
        }
    }

    /// Creates a failing result.
    #[must_use]
    pub fn fail(message: impl Into<String>, details: Value) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details,
        }
    }
}

/// Deterministic acceptance validator.
pub trait Validator {
    /// Evaluates the validator against a run.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError`] when evaluation infrastructure fails; the
    /// gate converts such errors into failed results and never raises.
    fn evaluate(
        &self,
        config: &ValidatorConfig,
        context: &ValidationContext<'_>,
    ) -> Result<ValidatorResult, ValidatorError>;
}

/// Registry resolving validator kinds to implementations.
pub trait ValidatorRegistry {
    /// Resolves a validator by kind.
    fn resolve(&self, kind: crate::core::ValidatorKind) -> Option<&dyn Validator>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock source injected into the runtime.
///
/// The runtime never reads ambient time; tests drive budget checks by
/// substituting a deterministic clock.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now(&self) -> Timestamp;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}
