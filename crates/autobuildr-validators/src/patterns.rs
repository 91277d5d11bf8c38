// crates/autobuildr-validators/src/patterns.rs
// ============================================================================
// Module: Forbidden-Patterns Validator
// Description: Scans recorded tool results for forbidden patterns.
// Purpose: Fail iff any tool_result payload matches a configured pattern.
// Dependencies: autobuildr-core, regex-lite, serde_json
// ============================================================================

//! ## Overview
//! The `forbidden_patterns` validator compiles the configured patterns,
//! scans every `tool_result` payload of the run in sequence order, and
//! fails on the first match, reporting the pattern and surrounding context.
//! A pattern that fails to compile is a configuration error; the gate maps
//! it to a failed result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use autobuildr_core::EventType;
use autobuildr_core::ValidatorConfig;
use autobuildr_core::interfaces::ValidationContext;
use autobuildr_core::interfaces::Validator;
use autobuildr_core::interfaces::ValidatorError;
use autobuildr_core::interfaces::ValidatorResult;
use regex_lite::Regex;
use serde_json::json;

use crate::config::required_string_list;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Context characters captured around a match for reporting.
const MATCH_CONTEXT_CHARS: usize = 40;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Tool-result pattern validator (`forbidden_patterns`).
#[derive(Debug, Default)]
pub struct ForbiddenPatternsValidator;

impl Validator for ForbiddenPatternsValidator {
    fn evaluate(
        &self,
        config: &ValidatorConfig,
        context: &ValidationContext<'_>,
    ) -> Result<ValidatorResult, ValidatorError> {
        let sources = required_string_list(&config.config, "patterns")?;
        let mut compiled = Vec::with_capacity(sources.len());
        for source in &sources {
            let regex = Regex::new(source).map_err(|err| {
                ValidatorError::Config(format!("pattern {source:?} failed to compile: {err}"))
            })?;
            compiled.push((source.clone(), regex));
        }

        let mut scanned = 0_usize;
        for event in context.events {
            if event.event_type != EventType::ToolResult {
                continue;
            }
            let Some(payload) = &event.payload else { continue };
            let serialized = payload.to_string();
            scanned += 1;
            for (source, regex) in &compiled {
                if let Some(found) = regex.find(&serialized) {
                    return Ok(ValidatorResult::fail(
                        format!("forbidden pattern {source:?} matched a tool result"),
                        json!({
                            "pattern": source,
                            "sequence": event.sequence,
                            "context": surrounding(&serialized, found.start(), found.end()),
                        }),
                    ));
                }
            }
        }

        Ok(ValidatorResult::pass(
            format!("no forbidden pattern matched across {scanned} tool results"),
            json!({"patterns": sources, "tool_results_scanned": scanned}),
        ))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the characters surrounding a match for the failure report.
fn surrounding(haystack: &str, start: usize, end: usize) -> String {
    let from = start.saturating_sub(MATCH_CONTEXT_CHARS);
    let to = (end + MATCH_CONTEXT_CHARS).min(haystack.len());
    let from = floor_char_boundary(haystack, from);
    let to = floor_char_boundary(haystack, to);
    haystack[from..to].to_string()
}

/// Rounds an index down to the nearest char boundary.
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
