// crates/autobuildr-config/src/lib.rs
// ============================================================================
// Module: AutoBuildr Configuration
// Description: Recognized options from process env or a TOML file.
// Purpose: Load, overlay, and validate orchestrator configuration with
//          typed errors.
// Dependencies: serde, thiserror, toml, tracing
// ============================================================================

//! ## Overview
//! Configuration comes from `autobuildr.toml` in the project directory,
//! overlaid by process environment variables (env wins). Invalid values are
//! typed configuration errors that the CLI maps to exit code 3. The legacy
//! non-kernel execution path was removed: `USE_KERNEL=false` is rejected at
//! validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Configuration file name inside a project directory.
pub const CONFIG_FILE_NAME: &str = "autobuildr.toml";

/// Smallest allowed worker count.
pub const MIN_CONCURRENCY: usize = 1;
/// Largest allowed worker count.
pub const MAX_CONCURRENCY: usize = 5;
/// Default worker count.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Informational constant: inline artifact threshold in bytes.
pub const ARTIFACT_INLINE_MAX_SIZE: usize = 4_096;
/// Informational constant: inline event payload threshold in bytes.
pub const EVENT_PAYLOAD_MAX_SIZE: usize = 4_096;

/// Environment variable for the worker count.
pub const ENV_MAX_CONCURRENCY: &str = "ORCHESTRATOR_MAX_CONCURRENCY";
/// Environment variable selecting the execution path.
pub const ENV_USE_KERNEL: &str = "USE_KERNEL";
/// Environment variable affecting only the HTTP adapter.
pub const ENV_ALLOW_REMOTE_BIND: &str = "ALLOW_REMOTE_BIND";
/// Environment variable for the executor retry base delay.
pub const ENV_RETRY_BASE_DELAY_MS: &str = "AUTOBUILDR_RETRY_BASE_DELAY_MS";
/// Environment variable for the executor retry attempt cap.
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "AUTOBUILDR_RETRY_MAX_ATTEMPTS";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors; the CLI maps them to exit code 3.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config file unreadable: {0}")]
    Io(String),
    /// Config file or env value failed to parse.
    #[error("config value invalid for {key}: {value:?}")]
    Parse {
        /// Offending option name.
        key: String,
        /// Offending raw value.
        value: String,
    },
    /// Value parsed but lies outside its allowed range.
    #[error("config value out of range for {key}: {value} (allowed {low}..={high})")]
    OutOfRange {
        /// Offending option name.
        key: String,
        /// Parsed value.
        value: i64,
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
    },
    /// The legacy non-kernel execution path no longer exists.
    #[error("USE_KERNEL=false selects the removed legacy path; only kernel execution exists")]
    LegacyPathRemoved,
}

// ============================================================================
// SECTION: File Shape
// ============================================================================

/// On-disk configuration shape (`autobuildr.toml`).
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    /// Worker count.
    max_concurrency: Option<usize>,
    /// Execution path selector.
    use_kernel: Option<bool>,
    /// HTTP adapter bind policy.
    allow_remote_bind: Option<bool>,
    /// Executor retry settings.
    #[serde(default)]
    retry: FileRetryConfig,
}

/// On-disk retry settings.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileRetryConfig {
    /// First retry delay in milliseconds.
    base_delay_ms: Option<u64>,
    /// Delay multiplier per attempt.
    multiplier: Option<u32>,
    /// Maximum attempts per turn.
    max_attempts: Option<u32>,
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Executor retry settings.
///
/// # Invariants
/// - `max_attempts >= 1`; retries consume wall-clock, never turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// First retry delay in milliseconds.
    pub base_delay_ms: u64,
    /// Delay multiplier per attempt.
    pub multiplier: u32,
    /// Maximum attempts per turn (including the first).
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 250,
            multiplier: 2,
            max_attempts: 3,
        }
    }
}

/// Validated orchestrator configuration.
///
/// # Invariants
/// - `max_concurrency` lies in [`MIN_CONCURRENCY`]..=[`MAX_CONCURRENCY`].
/// - `use_kernel` is always true after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Concurrent worker count.
    pub max_concurrency: usize,
    /// Execution path selector; only the kernel path exists.
    pub use_kernel: bool,
    /// Bind policy surfaced to the (out-of-process) HTTP adapter.
    pub allow_remote_bind: bool,
    /// Executor retry settings.
    pub retry: RetrySettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_CONCURRENCY,
            use_kernel: true,
            allow_remote_bind: false,
            retry: RetrySettings::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Loads configuration for a project: file first, env overlay, then
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unreadable files, unparseable values,
    /// out-of-range values, or the removed legacy path.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_with(project_dir, |key| std::env::var(key).ok())
    }

    /// Loads configuration with an injected env lookup (test seam).
    ///
    /// # Errors
    ///
    /// Same contract as [`OrchestratorConfig::load`].
    pub fn load_with(
        project_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = read_file_config(&project_dir.join(CONFIG_FILE_NAME))?;
        let mut config = Self::default();

        if let Some(value) = file.max_concurrency {
            config.max_concurrency = value;
        }
        if let Some(value) = file.use_kernel {
            config.use_kernel = value;
        }
        if let Some(value) = file.allow_remote_bind {
            config.allow_remote_bind = value;
        }
        if let Some(value) = file.retry.base_delay_ms {
            config.retry.base_delay_ms = value;
        }
        if let Some(value) = file.retry.multiplier {
            config.retry.multiplier = value;
        }
        if let Some(value) = file.retry.max_attempts {
            config.retry.max_attempts = value;
        }

        if let Some(raw) = env(ENV_MAX_CONCURRENCY) {
            config.max_concurrency = parse_number(ENV_MAX_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = env(ENV_USE_KERNEL) {
            config.use_kernel = parse_bool(ENV_USE_KERNEL, &raw)?;
        }
        if let Some(raw) = env(ENV_ALLOW_REMOTE_BIND) {
            config.allow_remote_bind = parse_bool(ENV_ALLOW_REMOTE_BIND, &raw)?;
        }
        if let Some(raw) = env(ENV_RETRY_BASE_DELAY_MS) {
            config.retry.base_delay_ms = parse_number(ENV_RETRY_BASE_DELAY_MS, &raw)?;
        }
        if let Some(raw) = env(ENV_RETRY_MAX_ATTEMPTS) {
            config.retry.max_attempts = parse_number(ENV_RETRY_MAX_ATTEMPTS, &raw)?;
        }

        config.validate()?;
        debug!(
            max_concurrency = config.max_concurrency,
            allow_remote_bind = config.allow_remote_bind,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validates the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.max_concurrency) {
            return Err(ConfigError::OutOfRange {
                key: ENV_MAX_CONCURRENCY.to_string(),
                value: i64::try_from(self.max_concurrency).unwrap_or(i64::MAX),
                low: MIN_CONCURRENCY as i64,
                high: MAX_CONCURRENCY as i64,
            });
        }
        if !self.use_kernel {
            return Err(ConfigError::LegacyPathRemoved);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                key: ENV_RETRY_MAX_ATTEMPTS.to_string(),
                value: 0,
                low: 1,
                high: i64::from(u32::MAX),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Reads the optional config file; a missing file is the default config.
fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw).map_err(|err| ConfigError::Parse {
            key: CONFIG_FILE_NAME.to_string(),
            value: err.to_string(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(err) => Err(ConfigError::Io(err.to_string())),
    }
}

/// Parses a numeric env value.
fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Parse {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Parses a boolean env value; accepts 1/0, true/false, yes/no.
fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Parse {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
