// crates/autobuildr-core/src/runtime/artifacts.rs
// ============================================================================
// Module: Content-Addressed Artifact Store
// Description: Size-routed artifact persistence with SHA-256 addressing.
// Purpose: Store run outputs inline or as content-addressed blob files with
//          per-run deduplication.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The artifact store routes content by size: at most
//! [`ARTIFACT_INLINE_MAX_SIZE`] bytes lives inline on the record (decoded as
//! text with replacement fallback); larger content is written to
//! `<project>/.autobuildr/artifacts/<run_id>/<sha256>.blob`. Writes are
//! content-addressed and idempotent: an existing blob file is never
//! rewritten, and two workers racing on the same hash produce identical
//! bytes. Retrieval prefers inline content and degrades to `None` on a
//! missing blob file rather than erroring.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::core::ARTIFACT_INLINE_MAX_SIZE;
use crate::core::ARTIFACTS_SUBDIR;
use crate::core::Artifact;
use crate::core::ArtifactId;
use crate::core::ArtifactType;
use crate::core::ContentHash;
use crate::core::RunId;
use crate::interfaces::ArtifactRecordStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact store failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// Record persistence failed.
    #[error(transparent)]
    Record(#[from] StoreError),
    /// Blob file I/O failed.
    #[error("artifact blob io error at {path}: {message}")]
    Io {
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
}

// ============================================================================
// SECTION: Write Options
// ============================================================================

/// Options accepted by [`ArtifactStore::store`].
///
/// # Invariants
/// - `deduplicate` defaults to true.
#[derive(Debug, Clone)]
pub struct ArtifactWriteOptions {
    /// Optional source path recorded on the artifact.
    pub path: Option<String>,
    /// Type-specific metadata map.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// When true, an existing `(run_id, content_hash)` record is returned
    /// instead of inserting a duplicate.
    pub deduplicate: bool,
}

impl Default for ArtifactWriteOptions {
    fn default() -> Self {
        Self {
            path: None,
            metadata: BTreeMap::new(),
            deduplicate: true,
        }
    }
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Content-addressed artifact storage service.
///
/// # Invariants
/// - `content_hash` and `size_bytes` are always set on returned records.
/// - Blob files are written exactly once per `(run_id, content_hash)`.
#[derive(Debug)]
pub struct ArtifactStore<S> {
    /// Project root directory.
    project_dir: PathBuf,
    /// Record persistence backend.
    records: Arc<S>,
}

impl<S> Clone for ArtifactStore<S> {
    fn clone(&self) -> Self {
        Self {
            project_dir: self.project_dir.clone(),
            records: Arc::clone(&self.records),
        }
    }
}

impl<S: ArtifactRecordStore> ArtifactStore<S> {
    /// Creates an artifact store rooted at a project directory.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>, records: Arc<S>) -> Self {
        Self {
            project_dir: project_dir.into(),
            records,
        }
    }

    /// Returns the blob path for a run and content hash.
    #[must_use]
    pub fn blob_path(&self, run_id: &RunId, hash: &ContentHash) -> PathBuf {
        self.project_dir
            .join(ARTIFACTS_SUBDIR)
            .join(run_id.as_str())
            .join(format!("{hash}.blob"))
    }

    /// Stores content for a run with size-based routing.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the blob write or the record
    /// insert fails.
    pub fn store(
        &self,
        run_id: &RunId,
        artifact_type: ArtifactType,
        content: &[u8],
        options: ArtifactWriteOptions,
    ) -> Result<Artifact, ArtifactStoreError> {
        let content_hash = ContentHash::of_bytes(content);
        let size_bytes = content.len() as u64;

        if options.deduplicate
            && let Some(existing) = self.records.find_artifact_by_hash(run_id, &content_hash)?
        {
            debug!(
                run_id = %run_id,
                artifact_id = %existing.id,
                hash = %content_hash,
                "artifact deduplicated"
            );
            return Ok(existing);
        }

        let mut artifact = Artifact {
            id: ArtifactId::generate(),
            run_id: run_id.clone(),
            artifact_type,
            path: options.path,
            content_hash: content_hash.clone(),
            size_bytes,
            content_inline: None,
            content_ref: None,
            metadata: options.metadata,
        };

        if content.len() <= ARTIFACT_INLINE_MAX_SIZE {
            artifact.content_inline = Some(String::from_utf8_lossy(content).into_owned());
        } else {
            let blob = self.blob_path(run_id, &content_hash);
            if blob.exists() {
                debug!(path = %blob.display(), "blob already present, skipping write");
            } else {
                write_blob(&blob, content)?;
            }
            artifact.content_ref = Some(relative_ref(&self.project_dir, &blob));
        }

        self.records.insert_artifact(&artifact)?;
        Ok(artifact)
    }

    /// Retrieves artifact content, preferring inline storage.
    ///
    /// A missing blob file yields `Ok(None)` so callers can degrade.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Io`] only for read failures other than
    /// a missing file.
    pub fn retrieve(&self, artifact: &Artifact) -> Result<Option<Vec<u8>>, ArtifactStoreError> {
        if let Some(inline) = &artifact.content_inline {
            return Ok(Some(inline.clone().into_bytes()));
        }
        if let Some(reference) = &artifact.content_ref {
            let blob = self.project_dir.join(reference);
            return match fs::read(&blob) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(
                        artifact_id = %artifact.id,
                        path = %blob.display(),
                        "artifact blob missing"
                    );
                    Ok(None)
                }
                Err(err) => Err(ArtifactStoreError::Io {
                    path: blob,
                    message: err.to_string(),
                }),
            };
        }
        Ok(None)
    }

    /// Retrieves artifact content as text with replacement decoding.
    ///
    /// # Errors
    ///
    /// Propagates [`ArtifactStoreError`] from [`ArtifactStore::retrieve`].
    pub fn retrieve_string(&self, artifact: &Artifact) -> Result<Option<String>, ArtifactStoreError> {
        Ok(self.retrieve(artifact)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes a blob file, creating parent directories.
fn write_blob(blob: &Path, content: &[u8]) -> Result<(), ArtifactStoreError> {
    if let Some(parent) = blob.parent() {
        fs::create_dir_all(parent).map_err(|err| ArtifactStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;
    }
    fs::write(blob, content).map_err(|err| ArtifactStoreError::Io {
        path: blob.to_path_buf(),
        message: err.to_string(),
    })
}

/// Renders the project-relative reference stored on the record.
fn relative_ref(project_dir: &Path, blob: &Path) -> String {
    blob.strip_prefix(project_dir)
        .unwrap_or(blob)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
