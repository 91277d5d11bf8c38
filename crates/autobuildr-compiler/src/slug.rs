// crates/autobuildr-compiler/src/slug.rs
// ============================================================================
// Module: Spec Name Slugs
// Description: URL-safe spec name generation with collision handling.
// Purpose: Derive unique spec names from objectives.
// Dependencies: autobuildr-core
// ============================================================================

//! ## Overview
//! Spec names are slugs derived from the objective, prefixed with the task
//! type and capped at the global name length. On collision a numeric
//! disambiguator is appended; compilation is deterministic up to that
//! suffix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use autobuildr_core::MAX_SPEC_NAME_LEN;
use autobuildr_core::TaskType;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_core::interfaces::StoreError;

// ============================================================================
// SECTION: Slugification
// ============================================================================

/// Maximum disambiguator attempts before falling back to a numbered tail.
const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 1_000;

/// Reduces free text to a lowercase hyphen-separated slug.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut previous_hyphen = true;
    for character in text.chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character.to_ascii_lowercase());
            previous_hyphen = false;
        } else if !previous_hyphen {
            slug.push('-');
            previous_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("spec");
    }
    slug
}

/// Builds the base spec name: task-type prefix plus objective slug, capped
/// at the global name length.
#[must_use]
pub fn base_spec_name(task_type: TaskType, objective: &str) -> String {
    let mut name = format!("{}-{}", task_type.as_str(), slugify(objective));
    if name.len() > MAX_SPEC_NAME_LEN {
        name.truncate(MAX_SPEC_NAME_LEN);
        while name.ends_with('-') {
            name.pop();
        }
    }
    name
}

/// Returns a unique spec name, appending a numeric disambiguator on
/// collision.
///
/// # Errors
///
/// Returns [`StoreError`] when uniqueness lookups fail, or
/// [`StoreError::Conflict`] when no free name is found within the attempt
/// bound.
pub fn unique_spec_name(
    store: &dyn SpecStore,
    task_type: TaskType,
    objective: &str,
) -> Result<String, StoreError> {
    let base = base_spec_name(task_type, objective);
    if !store.spec_name_exists(&base)? {
        return Ok(base);
    }
    for attempt in 2..=MAX_DISAMBIGUATION_ATTEMPTS {
        let suffix = format!("-{attempt}");
        let mut candidate = base.clone();
        candidate.truncate(MAX_SPEC_NAME_LEN.saturating_sub(suffix.len()));
        while candidate.ends_with('-') {
            candidate.pop();
        }
        candidate.push_str(&suffix);
        if !store.spec_name_exists(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(StoreError::Conflict(format!("no free spec name derived from {base:?}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
