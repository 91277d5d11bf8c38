// crates/autobuildr-core/src/core/acceptance.rs
// ============================================================================
// Module: AutoBuildr Acceptance Specs
// Description: Deterministic gate configuration attached to agent specs.
// Purpose: Describe the validator set and gate mode evaluated after a run.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An acceptance spec is the one-to-one gate configuration for an agent spec:
//! an ordered validator list combined under a gate mode. Validator kinds are
//! a closed set; the weighted mode requires a minimum score.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::AcceptanceSpecId;
use crate::core::identifiers::SpecId;

// ============================================================================
// SECTION: Validator Configuration
// ============================================================================

/// Closed set of validator kinds.
///
/// # Invariants
/// - Variants are stable for serialization and registry dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    /// Spawn a configured command and compare its exit code.
    TestPass,
    /// Check existence (or absence) of a path.
    FileExists,
    /// Scan recorded tool results for forbidden patterns.
    ForbiddenPatterns,
}

impl ValidatorKind {
    /// Returns the stable wire label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TestPass => "test_pass",
            Self::FileExists => "file_exists",
            Self::ForbiddenPatterns => "forbidden_patterns",
        }
    }

    /// Parses a stable wire label back into a validator kind.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "test_pass" => Some(Self::TestPass),
            "file_exists" => Some(Self::FileExists),
            "forbidden_patterns" => Some(Self::ForbiddenPatterns),
            _ => None,
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validator entry in an acceptance spec.
///
/// # Invariants
/// - `weight` lies in `[0.0, 1.0]`.
/// - `config` keys are interpreted per kind; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Validator kind dispatched through the registry.
    pub kind: ValidatorKind,
    /// Kind-specific configuration map.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Weight used by the weighted gate mode.
    pub weight: f64,
    /// Required validators must pass regardless of gate mode.
    pub required: bool,
}

impl ValidatorConfig {
    /// Creates a validator entry with weight 1.0 and `required = false`.
    #[must_use]
    pub fn new(kind: ValidatorKind, config: Map<String, Value>) -> Self {
        Self {
            kind,
            config,
            weight: 1.0,
            required: false,
        }
    }
}

// ============================================================================
// SECTION: Gate Mode and Retry Policy
// ============================================================================

/// Gate combination mode.
///
/// # Invariants
/// - Variants are stable for serialization and schema CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Gate passes iff every validator passed.
    AllPass,
    /// Gate passes iff at least one validator passed.
    AnyPass,
    /// Gate passes iff the weighted score reaches `min_score`.
    Weighted,
}

impl GateMode {
    /// Returns the stable wire label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllPass => "all_pass",
            Self::AnyPass => "any_pass",
            Self::Weighted => "weighted",
        }
    }

    /// Parses a stable wire label back into a gate mode.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all_pass" => Some(Self::AllPass),
            "any_pass" => Some(Self::AnyPass),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }
}

/// Retry policy applied when the gate fails.
///
/// # Invariants
/// - Variants are stable for serialization and schema CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Never retry.
    #[default]
    None,
    /// Retry with a fixed delay.
    Fixed,
    /// Retry with exponential backoff.
    Exponential,
}

impl RetryPolicy {
    /// Returns the stable wire label for the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fixed => "fixed",
            Self::Exponential => "exponential",
        }
    }

    /// Parses a stable wire label back into a retry policy.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "fixed" => Some(Self::Fixed),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Acceptance Spec
// ============================================================================

/// Gate configuration; one-to-one with an agent spec.
///
/// # Invariants
/// - `min_score` is present iff `gate_mode` is [`GateMode::Weighted`].
/// - Every validator weight lies in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceSpec {
    /// Acceptance spec identifier.
    pub id: AcceptanceSpecId,
    /// Owning agent spec identifier.
    pub agent_spec_id: SpecId,
    /// Ordered validator entries.
    pub validators: Vec<ValidatorConfig>,
    /// Gate combination mode.
    pub gate_mode: GateMode,
    /// Minimum weighted score; required iff `gate_mode` is weighted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    /// Retry policy when the gate fails.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Maximum retries under the retry policy.
    #[serde(default)]
    pub max_retries: u32,
    /// Optional fallback spec executed after exhausting retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_spec_id: Option<SpecId>,
}

impl AcceptanceSpec {
    /// Validates the gate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptanceError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), AcceptanceError> {
        if self.gate_mode == GateMode::Weighted && self.min_score.is_none() {
            return Err(AcceptanceError::MissingMinScore);
        }
        if let Some(score) = self.min_score
            && !(0.0..=1.0).contains(&score)
        {
            return Err(AcceptanceError::MinScoreOutOfRange(score));
        }
        for validator in &self.validators {
            if !(0.0..=1.0).contains(&validator.weight) {
                return Err(AcceptanceError::WeightOutOfRange {
                    kind: validator.kind,
                    weight: validator.weight,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Acceptance spec validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq)]
pub enum AcceptanceError {
    /// Weighted gate mode without a minimum score.
    #[error("weighted gate mode requires min_score")]
    MissingMinScore,
    /// Minimum score outside `[0.0, 1.0]`.
    #[error("min_score out of range: {0}")]
    MinScoreOutOfRange(f64),
    /// Validator weight outside `[0.0, 1.0]`.
    #[error("validator {kind} weight out of range: {weight}")]
    WeightOutOfRange {
        /// Offending validator kind.
        kind: ValidatorKind,
        /// Offending weight value.
        weight: f64,
    },
    /// Unknown validator kind label encountered at a persistence boundary.
    #[error("unknown validator kind: {0:?}")]
    UnknownValidatorKind(String),
    /// Unknown gate mode label encountered at a persistence boundary.
    #[error("unknown gate mode: {0:?}")]
    UnknownGateMode(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
