// crates/autobuildr-compiler/src/compiler.rs
// ============================================================================
// Module: Feature Compiler
// Description: Maps backlog features to runnable agent + acceptance specs.
// Purpose: Derive task type, policy, budgets, name, and validators from a
//          feature record.
// Dependencies: autobuildr-core, serde_json
// ============================================================================

//! ## Overview
//! Compilation is deterministic up to the name disambiguator: the task type
//! comes from the keyword tables, the tool policy from the per-task-type
//! template with global forbidden patterns unioned in, budgets from the
//! base templates scaled by description length and step count (clamped to
//! the global bounds), and validators from intent hints in the feature
//! steps. The produced acceptance spec always combines under `all_pass`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use autobuildr_core::AcceptanceError;
use autobuildr_core::AcceptanceSpec;
use autobuildr_core::AcceptanceSpecId;
use autobuildr_core::AgentSpec;
use autobuildr_core::Feature;
use autobuildr_core::GateMode;
use autobuildr_core::MAX_MAX_TURNS;
use autobuildr_core::MAX_TIMEOUT_SECONDS;
use autobuildr_core::MIN_MAX_TURNS;
use autobuildr_core::MIN_TIMEOUT_SECONDS;
use autobuildr_core::RetryPolicy;
use autobuildr_core::SpecError;
use autobuildr_core::SpecId;
use autobuildr_core::Timestamp;
use autobuildr_core::ValidatorConfig;
use autobuildr_core::ValidatorKind;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_core::interfaces::StoreError;
use serde_json::Map;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::keywords::derive_task_type;
use crate::slug::unique_spec_name;
use crate::templates::budget_template;
use crate::templates::policy_template;

// ============================================================================
// SECTION: Scaling Constants
// ============================================================================

/// Description characters granting one extra turn.
const CHARS_PER_EXTRA_TURN: usize = 400;
/// Extra turns granted per acceptance step.
const TURNS_PER_STEP: u32 = 2;
/// Extra timeout seconds granted per acceptance step.
const TIMEOUT_PER_STEP_SECONDS: u64 = 120;
/// Description characters granting one extra timeout second.
const CHARS_PER_EXTRA_SECOND: usize = 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Compiler failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Persistence failure during name lookup or spec storage.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Produced spec failed validation.
    #[error(transparent)]
    Spec(#[from] SpecError),
    /// Produced acceptance spec failed validation.
    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// A compiled feature: the runnable spec and its gate.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFeature {
    /// Runnable agent spec.
    pub spec: AgentSpec,
    /// One-to-one acceptance spec.
    pub acceptance: AcceptanceSpec,
}

/// Compiles a feature into an agent spec plus acceptance spec.
///
/// The store is consulted only for name uniqueness; nothing is persisted.
///
/// # Errors
///
/// Returns [`CompileError`] when name derivation fails or the produced
/// records violate their invariants.
pub fn compile<S: SpecStore>(
    feature: &Feature,
    store: &S,
    now: Timestamp,
) -> Result<CompiledFeature, CompileError> {
    let task_type = derive_task_type(&feature.category, &feature.description);
    let tool_policy = policy_template(task_type);
    let (max_turns, timeout_seconds) = scale_budgets(task_type, feature);
    let objective = if feature.description.trim().is_empty() {
        feature.name.clone()
    } else {
        feature.description.clone()
    };
    let name = unique_spec_name(store, task_type, &objective)?;

    debug!(
        feature_id = %feature.id,
        task_type = %task_type,
        name = %name,
        max_turns,
        timeout_seconds,
        "compiled feature"
    );

    let mut context = std::collections::BTreeMap::new();
    context.insert("feature_name".to_string(), json!(feature.name));
    context.insert("feature_category".to_string(), json!(feature.category));
    if !feature.steps.is_empty() {
        context.insert("acceptance_steps".to_string(), json!(feature.steps));
    }

    let spec = AgentSpec {
        id: SpecId::generate(),
        name,
        display_name: feature.name.clone(),
        icon: None,
        spec_version: AgentSpec::DEFAULT_SPEC_VERSION.to_string(),
        objective,
        task_type,
        context,
        tool_policy,
        max_turns,
        timeout_seconds,
        parent_spec_id: None,
        source_feature_id: Some(feature.id),
        spec_path: None,
        priority: feature.priority,
        tags: vec!["compiled".to_string(), task_type.as_str().to_string()],
        created_at: now,
    };
    spec.validate()?;

    let acceptance = AcceptanceSpec {
        id: AcceptanceSpecId::generate(),
        agent_spec_id: spec.id.clone(),
        validators: derive_validators(&feature.steps),
        gate_mode: GateMode::AllPass,
        min_score: None,
        retry_policy: RetryPolicy::None,
        max_retries: 0,
        fallback_spec_id: None,
    };
    acceptance.validate()?;

    Ok(CompiledFeature {
        spec,
        acceptance,
    })
}

/// Compiles a feature and persists the spec and acceptance spec.
///
/// # Errors
///
/// Returns [`CompileError`] when compilation or persistence fails.
pub fn compile_and_store<S: SpecStore>(
    feature: &Feature,
    store: &S,
    now: Timestamp,
) -> Result<CompiledFeature, CompileError> {
    let compiled = compile(feature, store, now)?;
    store.insert_spec(&compiled.spec)?;
    store.insert_acceptance_spec(&compiled.acceptance)?;
    Ok(compiled)
}

// ============================================================================
// SECTION: Budget Scaling
// ============================================================================

/// Scales base budgets by description length and step count, clamped to
/// the global bounds.
fn scale_budgets(task_type: autobuildr_core::TaskType, feature: &Feature) -> (u32, u64) {
    let (base_turns, base_timeout) = budget_template(task_type);
    let step_count = u32::try_from(feature.steps.len()).unwrap_or(u32::MAX);

    let extra_turns = u32::try_from(feature.description.len() / CHARS_PER_EXTRA_TURN)
        .unwrap_or(u32::MAX)
        .saturating_add(step_count.saturating_mul(TURNS_PER_STEP));
    let max_turns = base_turns.saturating_add(extra_turns).clamp(MIN_MAX_TURNS, MAX_MAX_TURNS);

    let extra_seconds = (feature.description.len() / CHARS_PER_EXTRA_SECOND) as u64
        + u64::from(step_count) * TIMEOUT_PER_STEP_SECONDS;
    let timeout_seconds = base_timeout
        .saturating_add(extra_seconds)
        .clamp(MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS);

    (max_turns, timeout_seconds)
}

// ============================================================================
// SECTION: Validator Derivation
// ============================================================================

/// Derives validators from intent hints in the feature steps.
///
/// Per step, the first matching hint wins: negation phrases ("should not",
/// "must not") produce `forbidden_patterns`; "run"/"execute" produce
/// `test_pass`; "file"/"path" produce `file_exists`. Steps without hints
/// (or without extractable operands) produce nothing.
#[must_use]
pub fn derive_validators(steps: &[String]) -> Vec<ValidatorConfig> {
    let mut validators = Vec::new();
    for step in steps {
        let lowered = step.to_lowercase();
        if lowered.contains("should not") || lowered.contains("must not") {
            if let Some(pattern) = negated_pattern(step) {
                let mut config = Map::new();
                config.insert("patterns".to_string(), json!([pattern]));
                validators
                    .push(ValidatorConfig::new(ValidatorKind::ForbiddenPatterns, config));
            }
        } else if lowered.contains("run") || lowered.contains("execute") {
            if let Some(command) = command_from_step(step) {
                let mut config = Map::new();
                config.insert("command".to_string(), json!(command));
                validators.push(ValidatorConfig::new(ValidatorKind::TestPass, config));
            }
        } else if (lowered.contains("file") || lowered.contains("path"))
            && let Some(path) = path_token(step)
        {
            let mut config = Map::new();
            config.insert("path".to_string(), json!(path));
            config.insert("should_exist".to_string(), json!(!lowered.contains("not exist")));
            validators.push(ValidatorConfig::new(ValidatorKind::FileExists, config));
        }
    }
    validators
}

/// Extracts the command text following a "run"/"execute" hint.
fn command_from_step(step: &str) -> Option<String> {
    let lowered = step.to_lowercase();
    let keyword_end = ["execute", "run"]
        .iter()
        .find_map(|keyword| lowered.find(keyword).map(|start| start + keyword.len()))?;
    let command = step.get(keyword_end..).unwrap_or("").trim().trim_end_matches('.');
    if command.is_empty() {
        None
    } else {
        Some(command.to_string())
    }
}

/// Extracts the first path-looking token (contains `/` or `.`).
fn path_token(step: &str) -> Option<String> {
    step.split_whitespace()
        .map(|token| token.trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == ','))
        .find(|token| (token.contains('/') || token.contains('.')) && token.len() > 1)
        .map(|token| token.trim_end_matches('.').to_string())
}

/// Builds the forbidden pattern for a negated step: a quoted segment when
/// present, otherwise the escaped tail after the negation phrase.
fn negated_pattern(step: &str) -> Option<String> {
    if let Some(quoted) = quoted_segment(step) {
        return Some(escape_regex(&quoted));
    }
    let lowered = step.to_lowercase();
    let tail_start = ["should not", "must not"]
        .iter()
        .find_map(|phrase| lowered.find(phrase).map(|start| start + phrase.len()))?;
    let tail = step.get(tail_start..).unwrap_or("").trim().trim_end_matches('.');
    // Drop the leading verb ("contain", "include", "write") and escape the
    // remainder as the scanned needle.
    let needle = tail.split_once(' ').map_or(tail, |(_, rest)| rest).trim();
    if needle.is_empty() {
        None
    } else {
        Some(escape_regex(needle))
    }
}

/// Returns the first single-, double-, or backtick-quoted segment.
fn quoted_segment(step: &str) -> Option<String> {
    for quote in ['"', '\'', '`'] {
        let mut parts = step.split(quote);
        let _prefix = parts.next()?;
        if let Some(inner) = parts.next()
            && !inner.is_empty()
        {
            return Some(inner.to_string());
        }
    }
    None
}

/// Escapes regex metacharacters in a literal needle.
fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(character) {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn run_steps_become_test_pass_validators() {
        let validators = derive_validators(&["Run pytest tests/".to_string()]);
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].kind, ValidatorKind::TestPass);
        assert_eq!(validators[0].config["command"], "pytest tests/");
    }

    #[test]
    fn file_steps_become_file_exists_validators() {
        let validators = derive_validators(&["File src/login.ts should exist".to_string()]);
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].kind, ValidatorKind::FileExists);
        assert_eq!(validators[0].config["path"], "src/login.ts");
        assert_eq!(validators[0].config["should_exist"], true);
    }

    #[test]
    fn negated_steps_become_forbidden_patterns() {
        let validators =
            derive_validators(&["Output should not contain 'password'".to_string()]);
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].kind, ValidatorKind::ForbiddenPatterns);
        assert_eq!(validators[0].config["patterns"], json!(["password"]));
    }

    #[test]
    fn negation_outranks_the_file_hint() {
        let validators =
            derive_validators(&["The file output must not contain `secret`".to_string()]);
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].kind, ValidatorKind::ForbiddenPatterns);
    }

    #[test]
    fn hintless_steps_produce_nothing() {
        assert!(derive_validators(&["Make it good".to_string()]).is_empty());
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(escape_regex("a.b*c"), r"a\.b\*c");
    }
}
