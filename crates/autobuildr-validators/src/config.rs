// crates/autobuildr-validators/src/config.rs
// ============================================================================
// Module: Validator Config Helpers
// Description: Typed extraction from kind-specific config maps.
// Purpose: Read recognized keys with defaults; unknown keys are ignored.
// Dependencies: autobuildr-core, serde_json
// ============================================================================

//! ## Overview
//! Validator configs are JSON maps with an explicit set of recognized keys
//! per kind. These helpers extract them with typed errors; unrecognized
//! keys are preserved in storage but never interpreted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use autobuildr_core::interfaces::ValidatorError;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Reads a required string key.
///
/// # Errors
///
/// Returns [`ValidatorError::Config`] when the key is missing or not a
/// string.
pub fn required_string(config: &Map<String, Value>, key: &str) -> Result<String, ValidatorError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ValidatorError::Config(format!("missing required string key {key:?}")))
}

/// Reads an optional string key.
#[must_use]
pub fn optional_string(config: &Map<String, Value>, key: &str) -> Option<String> {
    config.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Reads an optional boolean key.
#[must_use]
pub fn optional_bool(config: &Map<String, Value>, key: &str) -> Option<bool> {
    config.get(key).and_then(Value::as_bool)
}

/// Reads an optional signed integer key.
#[must_use]
pub fn optional_i64(config: &Map<String, Value>, key: &str) -> Option<i64> {
    config.get(key).and_then(Value::as_i64)
}

/// Reads an optional unsigned integer key.
#[must_use]
pub fn optional_u64(config: &Map<String, Value>, key: &str) -> Option<u64> {
    config.get(key).and_then(Value::as_u64)
}

/// Reads a required string-array key.
///
/// # Errors
///
/// Returns [`ValidatorError::Config`] when the key is missing or not an
/// array of strings.
pub fn required_string_list(
    config: &Map<String, Value>,
    key: &str,
) -> Result<Vec<String>, ValidatorError> {
    let list = config
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ValidatorError::Config(format!("missing required list key {key:?}")))?;
    list.iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ValidatorError::Config(format!("{key:?} entries must be strings")))
        })
        .collect()
}

/// Replaces the `{project_dir}` placeholder with the actual project root.
#[must_use]
pub fn interpolate_project_dir(raw: &str, project_dir: &Path) -> String {
    raw.replace("{project_dir}", &project_dir.to_string_lossy())
}
