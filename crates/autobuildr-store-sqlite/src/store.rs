// crates/autobuildr-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable store for features, specs, runs, events, artifacts.
// Purpose: Implement the core persistence contract over SQLite with additive
//          idempotent migration and journal-mode selection.
// Dependencies: autobuildr-core, rusqlite, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! This module implements every core store trait over a single `SQLite`
//! database at `<project>/features.db`. Schema evolution is additive: tables
//! and indices are created idempotently, columns are added with nullable
//! defaults, and no destructive migration touches `features`.
//!
//! The journal mode is chosen at open time: WAL on local disks, DELETE on
//! detected network filesystems (NFS, SMB, sshfs), where WAL is unreliable.
//! The busy timeout defaults to 30 seconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use autobuildr_core::AcceptanceError;
use autobuildr_core::AcceptanceSpec;
use autobuildr_core::AcceptanceSpecId;
use autobuildr_core::AgentEvent;
use autobuildr_core::AgentRun;
use autobuildr_core::AgentSpec;
use autobuildr_core::Artifact;
use autobuildr_core::ArtifactId;
use autobuildr_core::ArtifactType;
use autobuildr_core::ContentHash;
use autobuildr_core::EventId;
use autobuildr_core::EventType;
use autobuildr_core::Feature;
use autobuildr_core::FeatureId;
use autobuildr_core::NewAgentEvent;
use autobuildr_core::NewFeature;
use autobuildr_core::RunId;
use autobuildr_core::RunStatus;
use autobuildr_core::SpecError;
use autobuildr_core::SpecId;
use autobuildr_core::TaskType;
use autobuildr_core::Timestamp;
use autobuildr_core::ToolPolicy;
use autobuildr_core::Verdict;
use autobuildr_core::interfaces::ArtifactRecordStore;
use autobuildr_core::interfaces::EventStore;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::RunStore;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_core::interfaces::StoreError;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms); generous because worker threads share the file.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Filesystem types treated as network-backed for journal selection.
const NETWORK_FS_TYPES: [&str; 5] = ["nfs", "nfs4", "cifs", "smbfs", "fuse.sshfs"];

/// Database file name inside a project directory.
pub const DATABASE_FILE_NAME: &str = "features.db";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteJournalMode {
    /// WAL journal mode (local disks).
    Wal,
    /// Delete journal mode (network filesystems).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `journal_mode` of `None` selects WAL or DELETE by filesystem detection.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode override; `None` auto-detects.
    pub journal_mode: Option<SqliteJournalMode>,
}

impl SqliteStoreConfig {
    /// Creates the standard configuration for a project directory.
    #[must_use]
    pub fn for_project(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(DATABASE_FILE_NAME),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: None,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw payload content.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid stored data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Engine(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a rusqlite error to the shared store error, classifying constraint
/// violations as conflicts.
fn map_db_error(error: &rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error
        && failure.code == rusqlite::ErrorCode::ConstraintViolation
    {
        return StoreError::Conflict(error.to_string());
    }
    StoreError::Engine(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of the core persistence contract.
///
/// # Invariants
/// - Connection access is serialized through a mutex; transactions are
///   small and explicit (session-per-operation discipline).
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the store and applies the additive migration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        }
        let connection = Connection::open(&config.path)?;

        let journal_mode = config.journal_mode.unwrap_or_else(|| {
            if is_network_path(&config.path) {
                SqliteJournalMode::Delete
            } else {
                SqliteJournalMode::Wal
            }
        });
        info!(
            path = %config.path.display(),
            journal_mode = journal_mode.pragma_value(),
            "opening feature database"
        );

        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection
            .execute_batch(&format!("PRAGMA journal_mode = {};", journal_mode.pragma_value()))?;
        connection.execute_batch(&format!("PRAGMA busy_timeout = {};", config.busy_timeout_ms))?;

        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens the standard store for a project directory.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when opening fails.
    pub fn open_project(project_dir: &Path) -> Result<Self, SqliteStoreError> {
        Self::open(&SqliteStoreConfig::for_project(project_dir))
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Engine("connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates tables and indices idempotently, then applies additive column
/// migrations. Safe to run on every open; never destructive.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS features (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             priority INTEGER NOT NULL DEFAULT 999,
             category TEXT NOT NULL,
             name TEXT NOT NULL,
             description TEXT NOT NULL,
             steps TEXT NOT NULL,
             passes INTEGER NOT NULL DEFAULT 0,
             in_progress INTEGER NOT NULL DEFAULT 0,
             dependencies TEXT DEFAULT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_feature_status ON features (passes, in_progress);
         CREATE INDEX IF NOT EXISTS ix_feature_priority ON features (priority);

         CREATE TABLE IF NOT EXISTS agent_specs (
             id TEXT PRIMARY KEY,
             name TEXT NOT NULL UNIQUE,
             display_name TEXT NOT NULL,
             icon TEXT,
             spec_version TEXT NOT NULL DEFAULT 'v1',
             objective TEXT NOT NULL,
             task_type TEXT NOT NULL CHECK (task_type IN
                 ('coding','testing','refactoring','documentation','audit','custom')),
             context TEXT,
             tool_policy TEXT NOT NULL,
             max_turns INTEGER NOT NULL CHECK (max_turns BETWEEN 1 AND 500),
             timeout_seconds INTEGER NOT NULL CHECK (timeout_seconds BETWEEN 60 AND 7200),
             parent_spec_id TEXT REFERENCES agent_specs(id),
             source_feature_id INTEGER,
             spec_path TEXT,
             priority INTEGER NOT NULL DEFAULT 999,
             tags TEXT,
             created_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_spec_source_feature ON agent_specs (source_feature_id);
         CREATE INDEX IF NOT EXISTS ix_spec_task_type ON agent_specs (task_type);
         CREATE INDEX IF NOT EXISTS ix_spec_created_at ON agent_specs (created_at);

         CREATE TABLE IF NOT EXISTS acceptance_specs (
             id TEXT PRIMARY KEY,
             agent_spec_id TEXT NOT NULL UNIQUE
                 REFERENCES agent_specs(id) ON DELETE CASCADE,
             validators TEXT NOT NULL,
             gate_mode TEXT NOT NULL CHECK (gate_mode IN ('all_pass','any_pass','weighted')),
             min_score REAL,
             retry_policy TEXT NOT NULL DEFAULT 'none'
                 CHECK (retry_policy IN ('none','fixed','exponential')),
             max_retries INTEGER NOT NULL DEFAULT 0 CHECK (max_retries >= 0),
             fallback_spec_id TEXT REFERENCES agent_specs(id)
         );

         CREATE TABLE IF NOT EXISTS agent_runs (
             id TEXT PRIMARY KEY,
             agent_spec_id TEXT NOT NULL REFERENCES agent_specs(id) ON DELETE CASCADE,
             status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN
                 ('pending','running','paused','completed','failed','timeout')),
             started_at INTEGER,
             completed_at INTEGER,
             turns_used INTEGER NOT NULL DEFAULT 0 CHECK (turns_used >= 0),
             tokens_in INTEGER NOT NULL DEFAULT 0 CHECK (tokens_in >= 0),
             tokens_out INTEGER NOT NULL DEFAULT 0 CHECK (tokens_out >= 0),
             final_verdict TEXT CHECK (final_verdict IN ('passed','failed','error')),
             acceptance_results TEXT,
             error TEXT,
             retry_count INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
             created_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_run_spec ON agent_runs (agent_spec_id);
         CREATE INDEX IF NOT EXISTS ix_run_status ON agent_runs (status);
         CREATE INDEX IF NOT EXISTS ix_agentrun_spec_status
             ON agent_runs (agent_spec_id, status);

         CREATE TABLE IF NOT EXISTS artifacts (
             id TEXT PRIMARY KEY,
             run_id TEXT NOT NULL REFERENCES agent_runs(id) ON DELETE CASCADE,
             artifact_type TEXT NOT NULL CHECK (artifact_type IN
                 ('file_change','test_result','log','metric','snapshot')),
             path TEXT,
             content_ref TEXT,
             content_inline TEXT,
             content_hash TEXT NOT NULL,
             size_bytes INTEGER NOT NULL,
             metadata TEXT
         );
         CREATE INDEX IF NOT EXISTS ix_artifact_run ON artifacts (run_id);
         CREATE INDEX IF NOT EXISTS ix_artifact_type ON artifacts (artifact_type);
         CREATE INDEX IF NOT EXISTS ix_artifact_hash ON artifacts (content_hash);

         CREATE TABLE IF NOT EXISTS agent_events (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             run_id TEXT NOT NULL REFERENCES agent_runs(id) ON DELETE CASCADE,
             sequence INTEGER NOT NULL,
             event_type TEXT NOT NULL,
             timestamp INTEGER NOT NULL,
             payload TEXT,
             payload_truncated INTEGER,
             artifact_ref TEXT REFERENCES artifacts(id) ON DELETE SET NULL,
             tool_name TEXT,
             UNIQUE (run_id, sequence)
         );
         CREATE INDEX IF NOT EXISTS ix_event_run_sequence ON agent_events (run_id, sequence);
         CREATE INDEX IF NOT EXISTS ix_event_timestamp ON agent_events (timestamp);
         CREATE INDEX IF NOT EXISTS ix_event_run_event_type
             ON agent_events (run_id, event_type);",
    )?;

    migrate_add_column(connection, "features", "dependencies", "TEXT DEFAULT NULL")?;
    migrate_add_column(connection, "features", "in_progress", "INTEGER DEFAULT 0")?;
    migrate_add_column(connection, "agent_specs", "spec_path", "TEXT")?;
    connection.execute_batch(
        "UPDATE features SET passes = 0 WHERE passes IS NULL;
         UPDATE features SET in_progress = 0 WHERE in_progress IS NULL;",
    )?;
    Ok(())
}

/// Adds a column when missing; existing databases keep their data.
fn migrate_add_column(
    connection: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<(), SqliteStoreError> {
    let mut statement = connection.prepare(&format!("PRAGMA table_info({table})"))?;
    let existing: Vec<String> = statement
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    if !existing.iter().any(|name| name == column) {
        connection
            .execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition};"))?;
    }
    Ok(())
}

/// Detects whether a path lives on a network filesystem.
///
/// Reads `/proc/mounts` and matches the longest mount point containing the
/// path against known network filesystem types. Unreadable mount tables are
/// treated as local.
fn is_network_path(path: &Path) -> bool {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = resolved.to_string_lossy().into_owned();
    let Ok(mounts) = fs::read_to_string("/proc/mounts") else {
        return false;
    };
    let mut best: Option<(usize, bool)> = None;
    for line in mounts.lines() {
        let mut parts = line.split_whitespace();
        let _device = parts.next();
        let Some(mount_point) = parts.next() else { continue };
        let Some(fs_type) = parts.next() else { continue };
        if path_str.starts_with(mount_point)
            && best.is_none_or(|(length, _)| mount_point.len() > length)
        {
            best = Some((mount_point.len(), NETWORK_FS_TYPES.contains(&fs_type)));
        }
    }
    best.is_some_and(|(_, network)| network)
}

// ============================================================================
// SECTION: Serialization Helpers
// ============================================================================

/// Parses the dependencies column, filtering malformed members.
fn parse_dependencies(raw: Option<String>) -> Option<Vec<FeatureId>> {
    let raw = raw?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let list = value.as_array()?;
    Some(list.iter().filter_map(serde_json::Value::as_i64).map(FeatureId::new).collect())
}

/// Serializes a dependency list for storage.
fn render_dependencies(dependencies: Option<&[FeatureId]>) -> Option<String> {
    dependencies.map(|ids| {
        serde_json::Value::Array(
            ids.iter().map(|id| serde_json::Value::from(id.get())).collect(),
        )
        .to_string()
    })
}

/// Parses a JSON column into a value, tolerating NULL.
fn parse_json(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
}

/// Converts a feature row into the core record.
fn row_to_feature(row: &rusqlite::Row<'_>) -> Result<Feature, rusqlite::Error> {
    let steps_raw: String = row.get("steps")?;
    let steps: Vec<String> = serde_json::from_str(&steps_raw).unwrap_or_default();
    Ok(Feature {
        id: FeatureId::new(row.get("id")?),
        priority: row.get("priority")?,
        category: row.get("category")?,
        name: row.get("name")?,
        description: row.get("description")?,
        steps,
        passes: row.get("passes")?,
        in_progress: row.get("in_progress")?,
        dependencies: parse_dependencies(row.get("dependencies")?),
    })
}

/// Converts a spec row into the core record.
fn row_to_spec(row: &rusqlite::Row<'_>) -> Result<AgentSpec, StoreError> {
    let task_type_raw: String = row.get("task_type").map_err(|err| map_db_error(&err))?;
    let task_type = TaskType::parse(&task_type_raw)
        .ok_or_else(|| StoreError::Invalid(SpecError::UnknownTaskType(task_type_raw).to_string()))?;
    let policy_raw: String = row.get("tool_policy").map_err(|err| map_db_error(&err))?;
    let tool_policy: ToolPolicy = serde_json::from_str(&policy_raw)
        .map_err(|err| StoreError::Invalid(format!("tool_policy column: {err}")))?;
    let context = parse_json(row.get("context").map_err(|err| map_db_error(&err))?)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    let tags = parse_json(row.get("tags").map_err(|err| map_db_error(&err))?)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    let max_turns: i64 = row.get("max_turns").map_err(|err| map_db_error(&err))?;
    let timeout_seconds: i64 = row.get("timeout_seconds").map_err(|err| map_db_error(&err))?;
    Ok(AgentSpec {
        id: SpecId::new(row.get::<_, String>("id").map_err(|err| map_db_error(&err))?),
        name: row.get("name").map_err(|err| map_db_error(&err))?,
        display_name: row.get("display_name").map_err(|err| map_db_error(&err))?,
        icon: row.get("icon").map_err(|err| map_db_error(&err))?,
        spec_version: row.get("spec_version").map_err(|err| map_db_error(&err))?,
        objective: row.get("objective").map_err(|err| map_db_error(&err))?,
        task_type,
        context,
        tool_policy,
        max_turns: u32::try_from(max_turns)
            .map_err(|_| StoreError::Invalid(format!("max_turns column: {max_turns}")))?,
        timeout_seconds: u64::try_from(timeout_seconds)
            .map_err(|_| StoreError::Invalid(format!("timeout_seconds column: {timeout_seconds}")))?,
        parent_spec_id: row
            .get::<_, Option<String>>("parent_spec_id")
            .map_err(|err| map_db_error(&err))?
            .map(SpecId::new),
        source_feature_id: row
            .get::<_, Option<i64>>("source_feature_id")
            .map_err(|err| map_db_error(&err))?
            .map(FeatureId::new),
        spec_path: row.get("spec_path").map_err(|err| map_db_error(&err))?,
        priority: row.get("priority").map_err(|err| map_db_error(&err))?,
        tags,
        created_at: Timestamp::from_unix_millis(
            row.get("created_at").map_err(|err| map_db_error(&err))?,
        ),
    })
}

/// Converts a run row into the core record.
fn row_to_run(row: &rusqlite::Row<'_>) -> Result<AgentRun, StoreError> {
    let status_raw: String = row.get("status").map_err(|err| map_db_error(&err))?;
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Invalid(format!("status column: {status_raw}")))?;
    let verdict = row
        .get::<_, Option<String>>("final_verdict")
        .map_err(|err| map_db_error(&err))?
        .map(|raw| {
            Verdict::parse(&raw)
                .ok_or_else(|| StoreError::Invalid(format!("final_verdict column: {raw}")))
        })
        .transpose()?;
    let turns_used: i64 = row.get("turns_used").map_err(|err| map_db_error(&err))?;
    let retry_count: i64 = row.get("retry_count").map_err(|err| map_db_error(&err))?;
    Ok(AgentRun {
        id: RunId::new(row.get::<_, String>("id").map_err(|err| map_db_error(&err))?),
        agent_spec_id: SpecId::new(
            row.get::<_, String>("agent_spec_id").map_err(|err| map_db_error(&err))?,
        ),
        status,
        started_at: row
            .get::<_, Option<i64>>("started_at")
            .map_err(|err| map_db_error(&err))?
            .map(Timestamp::from_unix_millis),
        completed_at: row
            .get::<_, Option<i64>>("completed_at")
            .map_err(|err| map_db_error(&err))?
            .map(Timestamp::from_unix_millis),
        turns_used: u32::try_from(turns_used)
            .map_err(|_| StoreError::Invalid(format!("turns_used column: {turns_used}")))?,
        tokens_in: row
            .get::<_, i64>("tokens_in")
            .map_err(|err| map_db_error(&err))?
            .unsigned_abs(),
        tokens_out: row
            .get::<_, i64>("tokens_out")
            .map_err(|err| map_db_error(&err))?
            .unsigned_abs(),
        final_verdict: verdict,
        acceptance_results: parse_json(
            row.get("acceptance_results").map_err(|err| map_db_error(&err))?,
        ),
        error: row.get("error").map_err(|err| map_db_error(&err))?,
        retry_count: u32::try_from(retry_count)
            .map_err(|_| StoreError::Invalid(format!("retry_count column: {retry_count}")))?,
        created_at: Timestamp::from_unix_millis(
            row.get("created_at").map_err(|err| map_db_error(&err))?,
        ),
    })
}

/// Converts an event row into the core record.
fn row_to_event(row: &rusqlite::Row<'_>) -> Result<AgentEvent, StoreError> {
    let event_type_raw: String = row.get("event_type").map_err(|err| map_db_error(&err))?;
    let event_type = EventType::parse(&event_type_raw)
        .ok_or_else(|| StoreError::Invalid(format!("event_type column: {event_type_raw}")))?;
    let sequence: i64 = row.get("sequence").map_err(|err| map_db_error(&err))?;
    Ok(AgentEvent {
        id: EventId::new(row.get("id").map_err(|err| map_db_error(&err))?),
        run_id: RunId::new(row.get::<_, String>("run_id").map_err(|err| map_db_error(&err))?),
        sequence: sequence.unsigned_abs(),
        event_type,
        timestamp: Timestamp::from_unix_millis(
            row.get("timestamp").map_err(|err| map_db_error(&err))?,
        ),
        payload: parse_json(row.get("payload").map_err(|err| map_db_error(&err))?),
        payload_truncated: row
            .get::<_, Option<i64>>("payload_truncated")
            .map_err(|err| map_db_error(&err))?
            .map(i64::unsigned_abs),
        artifact_ref: row
            .get::<_, Option<String>>("artifact_ref")
            .map_err(|err| map_db_error(&err))?
            .map(ArtifactId::new),
        tool_name: row.get("tool_name").map_err(|err| map_db_error(&err))?,
    })
}

/// Converts an artifact row into the core record.
fn row_to_artifact(row: &rusqlite::Row<'_>) -> Result<Artifact, StoreError> {
    let type_raw: String = row.get("artifact_type").map_err(|err| map_db_error(&err))?;
    let artifact_type = ArtifactType::parse(&type_raw)
        .ok_or_else(|| StoreError::Invalid(format!("artifact_type column: {type_raw}")))?;
    let hash_raw: String = row.get("content_hash").map_err(|err| map_db_error(&err))?;
    let content_hash = ContentHash::from_hex(hash_raw)
        .map_err(|err| StoreError::Invalid(err.to_string()))?;
    let size_bytes: i64 = row.get("size_bytes").map_err(|err| map_db_error(&err))?;
    let metadata = parse_json(row.get("metadata").map_err(|err| map_db_error(&err))?)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    Ok(Artifact {
        id: ArtifactId::new(row.get::<_, String>("id").map_err(|err| map_db_error(&err))?),
        run_id: RunId::new(row.get::<_, String>("run_id").map_err(|err| map_db_error(&err))?),
        artifact_type,
        path: row.get("path").map_err(|err| map_db_error(&err))?,
        content_hash,
        size_bytes: size_bytes.unsigned_abs(),
        content_inline: row.get("content_inline").map_err(|err| map_db_error(&err))?,
        content_ref: row.get("content_ref").map_err(|err| map_db_error(&err))?,
        metadata,
    })
}

// ============================================================================
// SECTION: Feature Store
// ============================================================================

impl FeatureStore for SqliteStore {
    fn list_features(&self) -> Result<Vec<Feature>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM features ORDER BY id")
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map([], row_to_feature)
            .map_err(|err| map_db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| map_db_error(&err))?;
        Ok(rows)
    }

    fn get_feature(&self, id: FeatureId) -> Result<Option<Feature>, StoreError> {
        let connection = self.lock()?;
        connection
            .query_row("SELECT * FROM features WHERE id = ?1", params![id.get()], row_to_feature)
            .optional()
            .map_err(|err| map_db_error(&err))
    }

    fn insert_feature(&self, feature: &NewFeature) -> Result<Feature, StoreError> {
        let steps = serde_json::Value::from(feature.steps.clone()).to_string();
        let dependencies = render_dependencies(feature.dependencies.as_deref());
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO features
                     (priority, category, name, description, steps, passes, in_progress,
                      dependencies)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
                params![
                    feature.priority,
                    feature.category,
                    feature.name,
                    feature.description,
                    steps,
                    dependencies,
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        let id = connection.last_insert_rowid();
        connection
            .query_row("SELECT * FROM features WHERE id = ?1", params![id], row_to_feature)
            .map_err(|err| map_db_error(&err))
    }

    fn set_feature_dependencies(
        &self,
        id: FeatureId,
        dependencies: Option<&[FeatureId]>,
    ) -> Result<(), StoreError> {
        let rendered = render_dependencies(dependencies);
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE features SET dependencies = ?1 WHERE id = ?2",
                params![rendered, id.get()],
            )
            .map_err(|err| map_db_error(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("feature {id}")));
        }
        Ok(())
    }

    fn set_dependencies_bulk(
        &self,
        updates: &[(FeatureId, Option<Vec<FeatureId>>)],
    ) -> Result<(), StoreError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(|err| map_db_error(&err))?;
        for (id, dependencies) in updates {
            let rendered = render_dependencies(dependencies.as_deref());
            let updated = tx
                .execute(
                    "UPDATE features SET dependencies = ?1 WHERE id = ?2",
                    params![rendered, id.get()],
                )
                .map_err(|err| map_db_error(&err))?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("feature {id}")));
            }
        }
        tx.commit().map_err(|err| map_db_error(&err))
    }

    fn set_feature_in_progress(&self, id: FeatureId, in_progress: bool) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE features SET in_progress = ?1 WHERE id = ?2",
                params![in_progress, id.get()],
            )
            .map_err(|err| map_db_error(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("feature {id}")));
        }
        Ok(())
    }

    fn set_feature_passes(&self, id: FeatureId, passes: bool) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let updated = connection
            .execute("UPDATE features SET passes = ?1 WHERE id = ?2", params![passes, id.get()])
            .map_err(|err| map_db_error(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("feature {id}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Spec Store
// ============================================================================

impl SpecStore for SqliteStore {
    fn insert_spec(&self, spec: &AgentSpec) -> Result<(), StoreError> {
        let policy = serde_json::to_string(&spec.tool_policy)
            .map_err(|err| StoreError::Invalid(format!("tool_policy: {err}")))?;
        let context = serde_json::to_string(&spec.context)
            .map_err(|err| StoreError::Invalid(format!("context: {err}")))?;
        let tags = serde_json::to_string(&spec.tags)
            .map_err(|err| StoreError::Invalid(format!("tags: {err}")))?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO agent_specs
                     (id, name, display_name, icon, spec_version, objective, task_type,
                      context, tool_policy, max_turns, timeout_seconds, parent_spec_id,
                      source_feature_id, spec_path, priority, tags, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17)",
                params![
                    spec.id.as_str(),
                    spec.name,
                    spec.display_name,
                    spec.icon,
                    spec.spec_version,
                    spec.objective,
                    spec.task_type.as_str(),
                    context,
                    policy,
                    spec.max_turns,
                    spec.timeout_seconds as i64,
                    spec.parent_spec_id.as_ref().map(SpecId::as_str),
                    spec.source_feature_id.map(FeatureId::get),
                    spec.spec_path,
                    spec.priority,
                    tags,
                    spec.created_at.as_unix_millis(),
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn insert_acceptance_spec(&self, acceptance: &AcceptanceSpec) -> Result<(), StoreError> {
        let validators = serde_json::to_string(&acceptance.validators)
            .map_err(|err| StoreError::Invalid(format!("validators: {err}")))?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO acceptance_specs
                     (id, agent_spec_id, validators, gate_mode, min_score, retry_policy,
                      max_retries, fallback_spec_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    acceptance.id.as_str(),
                    acceptance.agent_spec_id.as_str(),
                    validators,
                    acceptance.gate_mode.as_str(),
                    acceptance.min_score,
                    acceptance.retry_policy.as_str(),
                    acceptance.max_retries,
                    acceptance.fallback_spec_id.as_ref().map(SpecId::as_str),
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn get_spec(&self, id: &SpecId) -> Result<Option<AgentSpec>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT * FROM agent_specs WHERE id = ?1",
                params![id.as_str()],
                |row| Ok(row_to_spec(row)),
            )
            .optional()
            .map_err(|err| map_db_error(&err))?;
        row.transpose()
    }

    fn get_spec_by_name(&self, name: &str) -> Result<Option<AgentSpec>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row("SELECT * FROM agent_specs WHERE name = ?1", params![name], |row| {
                Ok(row_to_spec(row))
            })
            .optional()
            .map_err(|err| map_db_error(&err))?;
        row.transpose()
    }

    fn get_acceptance_for_spec(
        &self,
        spec_id: &SpecId,
    ) -> Result<Option<AcceptanceSpec>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT * FROM acceptance_specs WHERE agent_spec_id = ?1",
                params![spec_id.as_str()],
                |row| {
                    let validators_raw: String = row.get("validators")?;
                    let gate_mode_raw: String = row.get("gate_mode")?;
                    let retry_raw: String = row.get("retry_policy")?;
                    let max_retries: i64 = row.get("max_retries")?;
                    Ok((
                        row.get::<_, String>("id")?,
                        row.get::<_, String>("agent_spec_id")?,
                        validators_raw,
                        gate_mode_raw,
                        row.get::<_, Option<f64>>("min_score")?,
                        retry_raw,
                        max_retries,
                        row.get::<_, Option<String>>("fallback_spec_id")?,
                    ))
                },
            )
            .optional()
            .map_err(|err| map_db_error(&err))?;
        let Some((id, agent_spec_id, validators_raw, gate_mode_raw, min_score, retry_raw,
            max_retries, fallback)) = row
        else {
            return Ok(None);
        };
        let validators = serde_json::from_str(&validators_raw)
            .map_err(|err| StoreError::Invalid(format!("validators column: {err}")))?;
        let gate_mode = autobuildr_core::GateMode::parse(&gate_mode_raw).ok_or_else(|| {
            StoreError::Invalid(AcceptanceError::UnknownGateMode(gate_mode_raw).to_string())
        })?;
        let retry_policy = autobuildr_core::RetryPolicy::parse(&retry_raw)
            .ok_or_else(|| StoreError::Invalid(format!("retry_policy column: {retry_raw}")))?;
        Ok(Some(AcceptanceSpec {
            id: AcceptanceSpecId::new(id),
            agent_spec_id: SpecId::new(agent_spec_id),
            validators,
            gate_mode,
            min_score,
            retry_policy,
            max_retries: u32::try_from(max_retries)
                .map_err(|_| StoreError::Invalid(format!("max_retries column: {max_retries}")))?,
            fallback_spec_id: fallback.map(SpecId::new),
        }))
    }

    fn spec_name_exists(&self, name: &str) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let count: i64 = connection
            .query_row("SELECT COUNT(1) FROM agent_specs WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .map_err(|err| map_db_error(&err))?;
        Ok(count > 0)
    }

    fn set_spec_path(&self, id: &SpecId, spec_path: &str) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE agent_specs SET spec_path = ?1 WHERE id = ?2",
                params![spec_path, id.as_str()],
            )
            .map_err(|err| map_db_error(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("spec {id}")));
        }
        Ok(())
    }

    fn delete_spec(&self, id: &SpecId) -> Result<(), StoreError> {
        let connection = self.lock()?;
        connection
            .execute("DELETE FROM agent_specs WHERE id = ?1", params![id.as_str()])
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

impl RunStore for SqliteStore {
    fn insert_run(&self, run: &AgentRun) -> Result<(), StoreError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(|err| map_db_error(&err))?;
        if !run.status.is_terminal() {
            let live: i64 = tx
                .query_row(
                    "SELECT COUNT(1) FROM agent_runs
                     WHERE agent_spec_id = ?1 AND status IN ('pending','running','paused')",
                    params![run.agent_spec_id.as_str()],
                    |row| row.get(0),
                )
                .map_err(|err| map_db_error(&err))?;
            if live > 0 {
                return Err(StoreError::Conflict(format!(
                    "spec {} already has a non-terminal run",
                    run.agent_spec_id
                )));
            }
        }
        let acceptance_results = run.acceptance_results.as_ref().map(ToString::to_string);
        tx.execute(
            "INSERT INTO agent_runs
                 (id, agent_spec_id, status, started_at, completed_at, turns_used,
                  tokens_in, tokens_out, final_verdict, acceptance_results, error,
                  retry_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                run.id.as_str(),
                run.agent_spec_id.as_str(),
                run.status.as_str(),
                run.started_at.map(Timestamp::as_unix_millis),
                run.completed_at.map(Timestamp::as_unix_millis),
                run.turns_used,
                run.tokens_in as i64,
                run.tokens_out as i64,
                run.final_verdict.map(Verdict::as_str),
                acceptance_results,
                run.error,
                run.retry_count,
                run.created_at.as_unix_millis(),
            ],
        )
        .map_err(|err| map_db_error(&err))?;
        tx.commit().map_err(|err| map_db_error(&err))
    }

    fn get_run(&self, id: &RunId) -> Result<Option<AgentRun>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row("SELECT * FROM agent_runs WHERE id = ?1", params![id.as_str()], |row| {
                Ok(row_to_run(row))
            })
            .optional()
            .map_err(|err| map_db_error(&err))?;
        row.transpose()
    }

    fn update_run(&self, run: &AgentRun) -> Result<(), StoreError> {
        let acceptance_results = run.acceptance_results.as_ref().map(ToString::to_string);
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE agent_runs SET
                     status = ?2, started_at = ?3, completed_at = ?4, turns_used = ?5,
                     tokens_in = ?6, tokens_out = ?7, final_verdict = ?8,
                     acceptance_results = ?9, error = ?10, retry_count = ?11
                 WHERE id = ?1",
                params![
                    run.id.as_str(),
                    run.status.as_str(),
                    run.started_at.map(Timestamp::as_unix_millis),
                    run.completed_at.map(Timestamp::as_unix_millis),
                    run.turns_used,
                    run.tokens_in as i64,
                    run.tokens_out as i64,
                    run.final_verdict.map(Verdict::as_str),
                    acceptance_results,
                    run.error,
                    run.retry_count,
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        Ok(())
    }

    fn find_non_terminal_run(&self, spec_id: &SpecId) -> Result<Option<AgentRun>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT * FROM agent_runs
                 WHERE agent_spec_id = ?1 AND status IN ('pending','running','paused')
                 LIMIT 1",
                params![spec_id.as_str()],
                |row| Ok(row_to_run(row)),
            )
            .optional()
            .map_err(|err| map_db_error(&err))?;
        row.transpose()
    }

    fn list_runs_with_status(&self, status: RunStatus) -> Result<Vec<AgentRun>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM agent_runs WHERE status = ?1 ORDER BY created_at")
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map(params![status.as_str()], |row| Ok(row_to_run(row)))
            .map_err(|err| map_db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| map_db_error(&err))?;
        rows.into_iter().collect()
    }
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

impl EventStore for SqliteStore {
    fn insert_event(&self, event: &NewAgentEvent) -> Result<EventId, StoreError> {
        let payload = event.payload.as_ref().map(ToString::to_string);
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO agent_events
                     (run_id, sequence, event_type, timestamp, payload, payload_truncated,
                      artifact_ref, tool_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.run_id.as_str(),
                    event.sequence as i64,
                    event.event_type.as_str(),
                    event.timestamp.as_unix_millis(),
                    payload,
                    event.payload_truncated.map(|size| size as i64),
                    event.artifact_ref.as_ref().map(ArtifactId::as_str),
                    event.tool_name,
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(EventId::new(connection.last_insert_rowid()))
    }

    fn max_sequence(&self, run_id: &RunId) -> Result<u64, StoreError> {
        let connection = self.lock()?;
        let max: Option<i64> = connection
            .query_row(
                "SELECT MAX(sequence) FROM agent_events WHERE run_id = ?1",
                params![run_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(max.unwrap_or(0).unsigned_abs())
    }

    fn list_events(&self, run_id: &RunId) -> Result<Vec<AgentEvent>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT * FROM agent_events WHERE run_id = ?1 ORDER BY sequence")
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map(params![run_id.as_str()], |row| Ok(row_to_event(row)))
            .map_err(|err| map_db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| map_db_error(&err))?;
        rows.into_iter().collect()
    }

    fn list_events_of_type(
        &self,
        run_id: &RunId,
        event_type: EventType,
    ) -> Result<Vec<AgentEvent>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT * FROM agent_events
                 WHERE run_id = ?1 AND event_type = ?2 ORDER BY sequence",
            )
            .map_err(|err| map_db_error(&err))?;
        let rows = statement
            .query_map(params![run_id.as_str(), event_type.as_str()], |row| Ok(row_to_event(row)))
            .map_err(|err| map_db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| map_db_error(&err))?;
        rows.into_iter().collect()
    }
}

// ============================================================================
// SECTION: Artifact Record Store
// ============================================================================

impl ArtifactRecordStore for SqliteStore {
    fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&artifact.metadata)
            .map_err(|err| StoreError::Invalid(format!("metadata: {err}")))?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO artifacts
                     (id, run_id, artifact_type, path, content_ref, content_inline,
                      content_hash, size_bytes, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    artifact.id.as_str(),
                    artifact.run_id.as_str(),
                    artifact.artifact_type.as_str(),
                    artifact.path,
                    artifact.content_ref,
                    artifact.content_inline,
                    artifact.content_hash.as_str(),
                    artifact.size_bytes as i64,
                    metadata,
                ],
            )
            .map_err(|err| map_db_error(&err))?;
        Ok(())
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row("SELECT * FROM artifacts WHERE id = ?1", params![id.as_str()], |row| {
                Ok(row_to_artifact(row))
            })
            .optional()
            .map_err(|err| map_db_error(&err))?;
        row.transpose()
    }

    fn find_artifact_by_hash(
        &self,
        run_id: &RunId,
        hash: &ContentHash,
    ) -> Result<Option<Artifact>, StoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT * FROM artifacts WHERE run_id = ?1 AND content_hash = ?2 LIMIT 1",
                params![run_id.as_str(), hash.as_str()],
                |row| Ok(row_to_artifact(row)),
            )
            .optional()
            .map_err(|err| map_db_error(&err))?;
        row.transpose()
    }
}
