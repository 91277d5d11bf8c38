// crates/autobuildr-orchestrator/src/context.rs
// ============================================================================
// Module: Core Context
// Description: Process-wide runtime composition with a scoped lifecycle.
// Purpose: Own the store, recorder, kernel, and clock for one project.
// Dependencies: autobuildr-core, autobuildr-store-sqlite, autobuildr-config,
//               autobuildr-validators
// ============================================================================

//! ## Overview
//! The core context is acquired at startup and disposed at shutdown; no
//! happy-path code reaches global mutable state outside it. It composes the
//! durable store, the artifact store, the event recorder, the validator
//! registry, and the harness kernel for one project directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use autobuildr_config::OrchestratorConfig;
use autobuildr_core::ArtifactStore;
use autobuildr_core::EventRecorder;
use autobuildr_core::HarnessKernel;
use autobuildr_core::KernelConfig;
use autobuildr_core::RetryConfig;
use autobuildr_core::SystemClock;
use autobuildr_core::interfaces::Clock;
use autobuildr_store_sqlite::SqliteStore;
use autobuildr_store_sqlite::SqliteStoreError;
use autobuildr_validators::BuiltinValidatorRegistry;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Context acquisition failures.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Durable store failed to open.
    #[error(transparent)]
    Store(#[from] SqliteStoreError),
}

// ============================================================================
// SECTION: Core Context
// ============================================================================

/// Process-wide runtime composition for one project.
///
/// # Invariants
/// - One context per project directory; dropped at shutdown.
pub struct CoreContext {
    /// Project root directory.
    project_dir: PathBuf,
    /// Validated configuration.
    config: OrchestratorConfig,
    /// Durable store shared by every subsystem.
    store: Arc<SqliteStore>,
    /// Content-addressed artifact store.
    artifacts: ArtifactStore<SqliteStore>,
    /// Audit recorder.
    recorder: Arc<EventRecorder<SqliteStore>>,
    /// Harness kernel.
    kernel: Arc<HarnessKernel<SqliteStore>>,
    /// Wall clock.
    clock: Arc<dyn Clock>,
}

impl CoreContext {
    /// Initializes the context: opens the store and wires the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] when the store cannot be opened.
    pub fn initialize(
        project_dir: &Path,
        config: OrchestratorConfig,
    ) -> Result<Self, ContextError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(SqliteStore::open_project(project_dir)?);
        let artifacts = ArtifactStore::new(project_dir, Arc::clone(&store));
        let recorder = Arc::new(EventRecorder::new(
            Arc::clone(&store),
            artifacts.clone(),
            Arc::clone(&clock),
        ));
        let kernel = Arc::new(HarnessKernel::new(
            Arc::clone(&store),
            Arc::clone(&recorder),
            Arc::new(BuiltinValidatorRegistry::with_builtin_validators()),
            Arc::clone(&clock),
            project_dir,
            KernelConfig {
                retry: RetryConfig {
                    base_delay_ms: config.retry.base_delay_ms,
                    multiplier: config.retry.multiplier,
                    max_attempts: config.retry.max_attempts,
                },
            },
        ));
        info!(project_dir = %project_dir.display(), "core context initialized");
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            store,
            artifacts,
            recorder,
            kernel,
            clock,
        })
    }

    /// Returns the project root directory.
    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Returns the validated configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the shared durable store.
    #[must_use]
    pub const fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Returns the artifact store.
    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactStore<SqliteStore> {
        &self.artifacts
    }

    /// Returns the audit recorder.
    #[must_use]
    pub const fn recorder(&self) -> &Arc<EventRecorder<SqliteStore>> {
        &self.recorder
    }

    /// Returns the harness kernel.
    #[must_use]
    pub const fn kernel(&self) -> &Arc<HarnessKernel<SqliteStore>> {
        &self.kernel
    }

    /// Returns the wall clock.
    #[must_use]
    pub const fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
