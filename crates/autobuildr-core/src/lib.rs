// crates/autobuildr-core/src/lib.rs
// ============================================================================
// Module: AutoBuildr Core Library
// Description: Public API surface for the AutoBuildr core.
// Purpose: Expose core types, interfaces, and the harness runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! AutoBuildr core provides the data model, contract interfaces, and harness
//! runtime for bounded, auditable agent execution. It is backend-agnostic
//! and integrates through explicit interfaces rather than embedding an LLM
//! client or a database engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ArtifactRecordStore;
pub use interfaces::Clock;
pub use interfaces::CoreStore;
pub use interfaces::EventStore;
pub use interfaces::ExecutorError;
pub use interfaces::FeatureStore;
pub use interfaces::RunStore;
pub use interfaces::SpecStore;
pub use interfaces::StoreError;
pub use interfaces::SystemClock;
pub use interfaces::TurnExecutor;
pub use interfaces::ValidationContext;
pub use interfaces::Validator;
pub use interfaces::ValidatorError;
pub use interfaces::ValidatorRegistry;
pub use interfaces::ValidatorResult;
pub use runtime::ArtifactStore;
pub use runtime::ArtifactStoreError;
pub use runtime::ArtifactWriteOptions;
pub use runtime::CompiledPolicy;
pub use runtime::EventRecorder;
pub use runtime::GateReport;
pub use runtime::HarnessKernel;
pub use runtime::InMemoryStore;
pub use runtime::KernelConfig;
pub use runtime::KernelError;
pub use runtime::PatternCompilationError;
pub use runtime::PolicyCheck;
pub use runtime::PolicyViolation;
pub use runtime::PolicyViolationKind;
pub use runtime::RecordOptions;
pub use runtime::RecorderError;
pub use runtime::RetryConfig;
pub use runtime::RunControl;
pub use runtime::TestRunSummary;
pub use runtime::ValidatorOutcome;
pub use runtime::blocked_tool_result;
pub use runtime::evaluate_gate;
pub use runtime::retrieve_test_result;
pub use runtime::store_test_result;
