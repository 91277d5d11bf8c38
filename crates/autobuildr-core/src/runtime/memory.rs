// crates/autobuildr-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Store
// Description: Reference store implementation for tests and embedding.
// Purpose: Provide a complete, mutex-guarded implementation of the store
//          traits without a database.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The in-memory store implements every persistence surface over plain maps
//! behind a single mutex. It mirrors the durable store's semantics
//! (uniqueness of spec names, `(run_id, sequence)` collisions, cascade
//! deletes) so kernel and gate tests exercise the same contract the
//! `SQLite` store provides.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::AcceptanceSpec;
use crate::core::AgentEvent;
use crate::core::AgentRun;
use crate::core::AgentSpec;
use crate::core::Artifact;
use crate::core::ArtifactId;
use crate::core::ContentHash;
use crate::core::EventId;
use crate::core::EventType;
use crate::core::Feature;
use crate::core::FeatureId;
use crate::core::NewAgentEvent;
use crate::core::NewFeature;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::SpecId;
use crate::interfaces::ArtifactRecordStore;
use crate::interfaces::EventStore;
use crate::interfaces::FeatureStore;
use crate::interfaces::RunStore;
use crate::interfaces::SpecStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Inner State
// ============================================================================

/// Mutable store state behind the mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Features keyed by id.
    features: BTreeMap<i64, Feature>,
    /// Next feature id.
    next_feature_id: i64,
    /// Agent specs keyed by id.
    specs: BTreeMap<String, AgentSpec>,
    /// Acceptance specs keyed by owning spec id.
    acceptance: BTreeMap<String, AcceptanceSpec>,
    /// Runs keyed by id.
    runs: BTreeMap<String, AgentRun>,
    /// Events keyed by id.
    events: BTreeMap<i64, AgentEvent>,
    /// Next event id.
    next_event_id: i64,
    /// Artifacts keyed by id.
    artifacts: BTreeMap<String, Artifact>,
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Complete in-memory implementation of the store traits.
///
/// # Invariants
/// - All mutation happens under one mutex; lock poisoning surfaces as
///   [`StoreError::Engine`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Guarded store state.
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the inner state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Engine("store mutex poisoned".to_string()))
    }
}

impl FeatureStore for InMemoryStore {
    fn list_features(&self) -> Result<Vec<Feature>, StoreError> {
        Ok(self.lock()?.features.values().cloned().collect())
    }

    fn get_feature(&self, id: FeatureId) -> Result<Option<Feature>, StoreError> {
        Ok(self.lock()?.features.get(&id.get()).cloned())
    }

    fn insert_feature(&self, feature: &NewFeature) -> Result<Feature, StoreError> {
        let mut inner = self.lock()?;
        inner.next_feature_id += 1;
        let id = FeatureId::new(inner.next_feature_id);
        let stored = Feature {
            id,
            priority: feature.priority,
            category: feature.category.clone(),
            name: feature.name.clone(),
            description: feature.description.clone(),
            steps: feature.steps.clone(),
            passes: false,
            in_progress: false,
            dependencies: feature.dependencies.clone(),
        };
        inner.features.insert(id.get(), stored.clone());
        Ok(stored)
    }

    fn set_feature_dependencies(
        &self,
        id: FeatureId,
        dependencies: Option<&[FeatureId]>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let feature = inner
            .features
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("feature {id}")))?;
        feature.dependencies = dependencies.map(<[FeatureId]>::to_vec);
        Ok(())
    }

    fn set_feature_in_progress(&self, id: FeatureId, in_progress: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let feature = inner
            .features
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("feature {id}")))?;
        feature.in_progress = in_progress;
        Ok(())
    }

    fn set_feature_passes(&self, id: FeatureId, passes: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let feature = inner
            .features
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::NotFound(format!("feature {id}")))?;
        feature.passes = passes;
        Ok(())
    }
}

impl SpecStore for InMemoryStore {
    fn insert_spec(&self, spec: &AgentSpec) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.specs.values().any(|existing| existing.name == spec.name) {
            return Err(StoreError::Conflict(format!("spec name {:?} already exists", spec.name)));
        }
        inner.specs.insert(spec.id.as_str().to_string(), spec.clone());
        Ok(())
    }

    fn insert_acceptance_spec(&self, acceptance: &AcceptanceSpec) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = acceptance.agent_spec_id.as_str().to_string();
        if inner.acceptance.contains_key(&key) {
            return Err(StoreError::Conflict(format!("spec {key} already has an acceptance spec")));
        }
        inner.acceptance.insert(key, acceptance.clone());
        Ok(())
    }

    fn get_spec(&self, id: &SpecId) -> Result<Option<AgentSpec>, StoreError> {
        Ok(self.lock()?.specs.get(id.as_str()).cloned())
    }

    fn get_spec_by_name(&self, name: &str) -> Result<Option<AgentSpec>, StoreError> {
        Ok(self.lock()?.specs.values().find(|spec| spec.name == name).cloned())
    }

    fn get_acceptance_for_spec(
        &self,
        spec_id: &SpecId,
    ) -> Result<Option<AcceptanceSpec>, StoreError> {
        Ok(self.lock()?.acceptance.get(spec_id.as_str()).cloned())
    }

    fn spec_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.specs.values().any(|spec| spec.name == name))
    }

    fn set_spec_path(&self, id: &SpecId, spec_path: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let spec = inner
            .specs
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::NotFound(format!("spec {id}")))?;
        spec.spec_path = Some(spec_path.to_string());
        Ok(())
    }

    fn delete_spec(&self, id: &SpecId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.specs.remove(id.as_str());
        inner.acceptance.remove(id.as_str());
        let run_ids: Vec<String> = inner
            .runs
            .values()
            .filter(|run| run.agent_spec_id == *id)
            .map(|run| run.id.as_str().to_string())
            .collect();
        for run_id in &run_ids {
            inner.runs.remove(run_id);
            inner.events.retain(|_, event| event.run_id.as_str() != run_id);
            inner.artifacts.retain(|_, artifact| artifact.run_id.as_str() != run_id);
        }
        Ok(())
    }
}

impl RunStore for InMemoryStore {
    fn insert_run(&self, run: &AgentRun) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let conflicting = inner
            .runs
            .values()
            .any(|existing| existing.agent_spec_id == run.agent_spec_id && !existing.status.is_terminal());
        if conflicting && !run.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "spec {} already has a non-terminal run",
                run.agent_spec_id
            )));
        }
        inner.runs.insert(run.id.as_str().to_string(), run.clone());
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, StoreError> {
        Ok(self.lock()?.runs.get(id.as_str()).cloned())
    }

    fn update_run(&self, run: &AgentRun) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.runs.contains_key(run.id.as_str()) {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        inner.runs.insert(run.id.as_str().to_string(), run.clone());
        Ok(())
    }

    fn find_non_terminal_run(&self, spec_id: &SpecId) -> Result<Option<AgentRun>, StoreError> {
        Ok(self
            .lock()?
            .runs
            .values()
            .find(|run| run.agent_spec_id == *spec_id && !run.status.is_terminal())
            .cloned())
    }

    fn list_runs_with_status(&self, status: RunStatus) -> Result<Vec<AgentRun>, StoreError> {
        Ok(self.lock()?.runs.values().filter(|run| run.status == status).cloned().collect())
    }
}

impl EventStore for InMemoryStore {
    fn insert_event(&self, event: &NewAgentEvent) -> Result<EventId, StoreError> {
        let mut inner = self.lock()?;
        let collision = inner
            .events
            .values()
            .any(|existing| existing.run_id == event.run_id && existing.sequence == event.sequence);
        if collision {
            return Err(StoreError::Conflict(format!(
                "sequence {} already recorded for run {}",
                event.sequence, event.run_id
            )));
        }
        inner.next_event_id += 1;
        let id = EventId::new(inner.next_event_id);
        inner.events.insert(
            id.get(),
            AgentEvent {
                id,
                run_id: event.run_id.clone(),
                sequence: event.sequence,
                event_type: event.event_type,
                timestamp: event.timestamp,
                payload: event.payload.clone(),
                payload_truncated: event.payload_truncated,
                artifact_ref: event.artifact_ref.clone(),
                tool_name: event.tool_name.clone(),
            },
        );
        Ok(id)
    }

    fn max_sequence(&self, run_id: &RunId) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .events
            .values()
            .filter(|event| event.run_id == *run_id)
            .map(|event| event.sequence)
            .max()
            .unwrap_or(0))
    }

    fn list_events(&self, run_id: &RunId) -> Result<Vec<AgentEvent>, StoreError> {
        let mut events: Vec<AgentEvent> = self
            .lock()?
            .events
            .values()
            .filter(|event| event.run_id == *run_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.sequence);
        Ok(events)
    }

    fn list_events_of_type(
        &self,
        run_id: &RunId,
        event_type: EventType,
    ) -> Result<Vec<AgentEvent>, StoreError> {
        let mut events: Vec<AgentEvent> = self
            .lock()?
            .events
            .values()
            .filter(|event| event.run_id == *run_id && event.event_type == event_type)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.sequence);
        Ok(events)
    }
}

impl ArtifactRecordStore for InMemoryStore {
    fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.artifacts.insert(artifact.id.as_str().to_string(), artifact.clone());
        Ok(())
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError> {
        Ok(self.lock()?.artifacts.get(id.as_str()).cloned())
    }

    fn find_artifact_by_hash(
        &self,
        run_id: &RunId,
        hash: &ContentHash,
    ) -> Result<Option<Artifact>, StoreError> {
        Ok(self
            .lock()?
            .artifacts
            .values()
            .find(|artifact| artifact.run_id == *run_id && artifact.content_hash == *hash)
            .cloned())
    }
}
