// crates/autobuildr-core/src/runtime/recorder.rs
// ============================================================================
// Module: Event Recorder
// Description: Durable, densely sequenced audit event recording.
// Purpose: Assign per-run sequence numbers and spill oversized payloads into
//          linked artifacts.
// Dependencies: crate::core, crate::interfaces, crate::runtime::artifacts
// ============================================================================

//! ## Overview
//! The recorder owns the per-run sequence counters. For each run, events form
//! a dense sequence 1..N; the counter is seeded from `max(sequence) + 1` on
//! first use and guarded by a per-run mutex. Inserts commit synchronously
//! before the recorder returns, so sequence order observes real time within
//! a run.
//!
//! Payloads whose serialized size exceeds [`EVENT_PAYLOAD_MAX_SIZE`] bytes
//! spill into a `log` artifact; the stored payload becomes a summary object
//! `{_truncated, _original_size, …}` and the event carries `artifact_ref`
//! and `payload_truncated`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::core::ArtifactType;
use crate::core::EVENT_PAYLOAD_MAX_SIZE;
use crate::core::EventId;
use crate::core::EventType;
use crate::core::NewAgentEvent;
use crate::core::RunId;
use crate::interfaces::ArtifactRecordStore;
use crate::interfaces::Clock;
use crate::interfaces::EventStore;
use crate::interfaces::StoreError;
use crate::runtime::artifacts::ArtifactStore;
use crate::runtime::artifacts::ArtifactStoreError;
use crate::runtime::artifacts::ArtifactWriteOptions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a string field kept in a truncation summary.
const SUMMARY_STRING_MAX: usize = 120;
/// Maximum number of scalar fields kept in a truncation summary.
const SUMMARY_FIELD_MAX: usize = 8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Recorder failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Event persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Overflow artifact persistence failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactStoreError),
    /// Sequence mutex was poisoned by a panicking writer.
    #[error("sequence counter poisoned for run {0}")]
    CounterPoisoned(RunId),
}

// ============================================================================
// SECTION: Record Options
// ============================================================================

/// Options accepted by [`EventRecorder::record`].
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    /// Structured payload for the event.
    pub payload: Option<Value>,
    /// Tool name for tool-related events.
    pub tool_name: Option<String>,
}

impl RecordOptions {
    /// Creates options carrying just a payload.
    #[must_use]
    pub const fn with_payload(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            tool_name: None,
        }
    }

    /// Creates options carrying a payload and tool name.
    #[must_use]
    pub fn for_tool(payload: Value, tool_name: impl Into<String>) -> Self {
        Self {
            payload: Some(payload),
            tool_name: Some(tool_name.into()),
        }
    }
}

// ============================================================================
// SECTION: Event Recorder
// ============================================================================

/// Durable audit event recorder.
///
/// # Invariants
/// - Within a run, `(run_id, sequence)` pairs are unique and dense.
/// - The per-run counter is the only mutable shared state; it is guarded by
///   a per-run mutex acquired in a single leaf-level critical section.
pub struct EventRecorder<S> {
    /// Event persistence backend.
    store: Arc<S>,
    /// Artifact store used for payload overflow.
    artifacts: ArtifactStore<S>,
    /// Clock stamping event timestamps.
    clock: Arc<dyn Clock>,
    /// Per-run next-sequence counters.
    counters: Mutex<HashMap<RunId, Arc<Mutex<u64>>>>,
}

impl<S: EventStore + ArtifactRecordStore> EventRecorder<S> {
    /// Creates a recorder over a store and artifact backend.
    #[must_use]
    pub fn new(store: Arc<S>, artifacts: ArtifactStore<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            artifacts,
            clock,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Records one event and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError`] when persistence fails; the sequence
    /// reservation is rolled back in-memory on failure so the dense
    /// numbering survives.
    pub fn record(
        &self,
        run_id: &RunId,
        event_type: EventType,
        options: RecordOptions,
    ) -> Result<EventId, RecorderError> {
        let counter = self.counter_for(run_id)?;
        let mut next = counter.lock().map_err(|_| RecorderError::CounterPoisoned(run_id.clone()))?;
        let sequence = if *next == 0 {
            self.store.max_sequence(run_id)? + 1
        } else {
            *next
        };

        let (payload, payload_truncated, artifact_ref) =
            self.prepare_payload(run_id, options.payload)?;

        let event = NewAgentEvent {
            run_id: run_id.clone(),
            sequence,
            event_type,
            timestamp: self.clock.now(),
            payload,
            payload_truncated,
            artifact_ref,
            tool_name: options.tool_name,
        };

        let event_id = self.store.insert_event(&event)?;
        *next = sequence + 1;
        debug!(run_id = %run_id, sequence, event_type = %event_type, "event recorded");
        Ok(event_id)
    }

    /// Routes an oversized payload into an overflow artifact.
    fn prepare_payload(
        &self,
        run_id: &RunId,
        payload: Option<Value>,
    ) -> Result<(Option<Value>, Option<u64>, Option<crate::core::ArtifactId>), RecorderError> {
        let Some(payload) = payload else {
            return Ok((None, None, None));
        };
        let serialized = payload.to_string();
        if serialized.len() <= EVENT_PAYLOAD_MAX_SIZE {
            return Ok((Some(payload), None, None));
        }

        let original_size = serialized.len() as u64;
        let artifact = self.artifacts.store(
            run_id,
            ArtifactType::Log,
            serialized.as_bytes(),
            ArtifactWriteOptions::default(),
        )?;
        let summary = truncation_summary(&payload, original_size);
        Ok((Some(summary), Some(original_size), Some(artifact.id)))
    }

    /// Returns the per-run counter cell, creating it on first use.
    fn counter_for(&self, run_id: &RunId) -> Result<Arc<Mutex<u64>>, RecorderError> {
        let mut counters =
            self.counters.lock().map_err(|_| RecorderError::CounterPoisoned(run_id.clone()))?;
        Ok(Arc::clone(counters.entry(run_id.clone()).or_insert_with(|| Arc::new(Mutex::new(0)))))
    }
}

// ============================================================================
// SECTION: Truncation Summary
// ============================================================================

/// Builds the summary object stored in place of an overflowed payload.
///
/// Scalar top-level fields are retained (strings clipped to
/// [`SUMMARY_STRING_MAX`] chars, at most [`SUMMARY_FIELD_MAX`] fields) so the
/// inline payload stays useful without the artifact.
fn truncation_summary(payload: &Value, original_size: u64) -> Value {
    let mut summary = Map::new();
    summary.insert("_truncated".to_string(), Value::Bool(true));
    summary.insert("_original_size".to_string(), json!(original_size));

    if let Value::Object(fields) = payload {
        let mut kept = 0_usize;
        for (key, value) in fields {
            if kept >= SUMMARY_FIELD_MAX {
                break;
            }
            let small = match value {
                Value::String(text) => {
                    let clipped: String = text.chars().take(SUMMARY_STRING_MAX).collect();
                    Some(Value::String(clipped))
                }
                Value::Bool(_) | Value::Number(_) | Value::Null => Some(value.clone()),
                Value::Array(_) | Value::Object(_) => None,
            };
            if let Some(small) = small {
                summary.insert(key.clone(), small);
                kept += 1;
            }
        }
    }

    Value::Object(summary)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
