// crates/autobuildr-validators/src/file.rs
// ============================================================================
// Module: File-Exists Validator
// Description: Path presence/absence validator.
// Purpose: Pass iff a path's existence matches the configured expectation.
// Dependencies: autobuildr-core, serde_json
// ============================================================================

//! ## Overview
//! The `file_exists` validator resolves the configured path (with
//! `{project_dir}` interpolation; relative paths resolve against the
//! project root) and passes iff `exists() == should_exist` (default true).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use autobuildr_core::ValidatorConfig;
use autobuildr_core::interfaces::ValidationContext;
use autobuildr_core::interfaces::Validator;
use autobuildr_core::interfaces::ValidatorError;
use autobuildr_core::interfaces::ValidatorResult;
use serde_json::json;

use crate::config::interpolate_project_dir;
use crate::config::optional_bool;
use crate::config::required_string;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Path presence validator (`file_exists`).
#[derive(Debug, Default)]
pub struct FileExistsValidator;

impl Validator for FileExistsValidator {
    fn evaluate(
        &self,
        config: &ValidatorConfig,
        context: &ValidationContext<'_>,
    ) -> Result<ValidatorResult, ValidatorError> {
        let raw_path = required_string(&config.config, "path")?;
        let should_exist = optional_bool(&config.config, "should_exist").unwrap_or(true);

        let interpolated = interpolate_project_dir(&raw_path, context.project_dir);
        let resolved = resolve(&interpolated, context.project_dir);
        let exists = resolved.exists();

        let details = json!({
            "path": resolved.to_string_lossy(),
            "exists": exists,
            "should_exist": should_exist,
        });

        if exists == should_exist {
            Ok(ValidatorResult::pass(
                format!("path {} existence matches expectation", resolved.display()),
                details,
            ))
        } else {
            Ok(ValidatorResult::fail(
                format!(
                    "path {} {} but was expected {}",
                    resolved.display(),
                    if exists { "exists" } else { "does not exist" },
                    if should_exist { "to exist" } else { "to be absent" },
                ),
                details,
            ))
        }
    }
}

/// Resolves a possibly relative path against the project root.
fn resolve(raw: &str, project_dir: &Path) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
