// crates/autobuildr-orchestrator/src/lib.rs
// ============================================================================
// Module: AutoBuildr Orchestrator Library
// Description: Public API surface for the scheduler driver.
// Purpose: Expose the context, health check, orchestrator, and
//          materialization.
// Dependencies: crate::{context, health, materialize, orchestrator}
// ============================================================================

//! ## Overview
//! The orchestrator composes the whole core: it owns the runtime context,
//! repairs state at startup (crash recovery, dependency auto-repair),
//! refuses to start on cycles, and drives the backlog through the harness
//! kernel with a bounded worker pool.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod context;
pub mod health;
pub mod materialize;
pub mod orchestrator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::ContextError;
pub use context::CoreContext;
pub use health::CYCLE_REMEDIATION;
pub use health::HealthError;
pub use health::HealthReport;
pub use health::startup_health_check;
pub use materialize::AGENTS_SUBDIR;
pub use materialize::MaterializeError;
pub use materialize::materialize_spec;
pub use materialize::render_snapshot;
pub use orchestrator::DriveSummary;
pub use orchestrator::ExecutorProvider;
pub use orchestrator::FeatureOutcome;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorError;
