// crates/autobuildr-core/src/runtime/gate.rs
// ============================================================================
// Module: Acceptance Gate
// Description: Deterministic combination of validator outcomes.
// Purpose: Evaluate an acceptance spec's validators and derive the verdict.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The gate instantiates the configured validators in order, collects one
//! result per validator, and combines them under the gate mode. Required
//! validators must pass regardless of mode. The gate never raises: an
//! unregistered kind or a validator error becomes a failed result with the
//! error captured in its details.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::core::AcceptanceSpec;
use crate::core::GateMode;
use crate::core::ValidatorKind;
use crate::core::Verdict;
use crate::interfaces::ValidationContext;
use crate::interfaces::ValidatorRegistry;
use crate::interfaces::ValidatorResult;

// ============================================================================
// SECTION: Gate Report
// ============================================================================

/// Outcome of one validator within a gate evaluation.
///
/// # Invariants
/// - `weight` and `required` mirror the validator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorOutcome {
    /// Validator kind evaluated.
    pub kind: ValidatorKind,
    /// Weight from the configuration.
    pub weight: f64,
    /// Required flag from the configuration.
    pub required: bool,
    /// Evaluation result.
    pub result: ValidatorResult,
}

/// Full structured result of a gate evaluation.
///
/// # Invariants
/// - `verdict` is `Passed` iff `passed` is true.
/// - `score` is present iff `gate_mode` is [`GateMode::Weighted`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// Gate combination mode applied.
    pub gate_mode: GateMode,
    /// True when the gate passed.
    pub passed: bool,
    /// Derived verdict.
    pub verdict: Verdict,
    /// Weighted score, for the weighted mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Per-validator outcomes in configuration order.
    pub validators: Vec<ValidatorOutcome>,
}

// ============================================================================
// SECTION: Gate Evaluation
// ============================================================================

/// Evaluates an acceptance spec against a run.
///
/// Validators run in configuration order; each produces exactly one
/// result. This function never fails: evaluation errors are folded into
/// failed validator results.
#[must_use]
pub fn evaluate_gate(
    acceptance: &AcceptanceSpec,
    registry: &dyn ValidatorRegistry,
    context: &ValidationContext<'_>,
) -> GateReport {
    let mut outcomes = Vec::with_capacity(acceptance.validators.len());
    for config in &acceptance.validators {
        let result = match registry.resolve(config.kind) {
            None => ValidatorResult::fail(
                format!("validator kind {} is not registered", config.kind),
                json!({"error": "unregistered_validator"}),
            ),
            Some(validator) => match validator.evaluate(config, context) {
                Ok(result) => result,
                Err(err) => ValidatorResult::fail(
                    format!("validator {} errored", config.kind),
                    json!({"error": err.to_string()}),
                ),
            },
        };
        outcomes.push(ValidatorOutcome {
            kind: config.kind,
            weight: config.weight,
            required: config.required,
            result,
        });
    }

    let required_ok =
        outcomes.iter().filter(|outcome| outcome.required).all(|outcome| outcome.result.passed);

    let (mode_ok, score) = match acceptance.gate_mode {
        GateMode::AllPass => (outcomes.iter().all(|outcome| outcome.result.passed), None),
        GateMode::AnyPass => (outcomes.iter().any(|outcome| outcome.result.passed), None),
        GateMode::Weighted => {
            let total: f64 = outcomes.iter().map(|outcome| outcome.weight).sum();
            let earned: f64 = outcomes
                .iter()
                .filter(|outcome| outcome.result.passed)
                .map(|outcome| outcome.weight)
                .sum();
            let score = if total > 0.0 { earned / total } else { 0.0 };
            let threshold = acceptance.min_score.unwrap_or(1.0);
            (score >= threshold, Some(score))
        }
    };

    let passed = required_ok && mode_ok;
    GateReport {
        gate_mode: acceptance.gate_mode,
        passed,
        verdict: if passed { Verdict::Passed } else { Verdict::Failed },
        score,
        validators: outcomes,
    }
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

    use std::path::Path;

    use serde_json::Map;
    use serde_json::Value;

    use super::*;
    use crate::core::AcceptanceSpecId;
    use crate::core::RetryPolicy;
    use crate::core::RunId;
    use crate::core::SpecId;
    use crate::core::ValidatorConfig;
    use crate::interfaces::Validator;
    use crate::interfaces::ValidatorError;

    /// Validator stub that passes or fails by configuration.
    struct FixedValidator(bool);

    impl Validator for FixedValidator {
        fn evaluate(
            &self,
            _config: &ValidatorConfig,
            _context: &ValidationContext<'_>,
        ) -> Result<ValidatorResult, ValidatorError> {
            if self.0 {
                Ok(ValidatorResult::pass("ok", Value::Null))
            } else {
                Ok(ValidatorResult::fail("nope", Value::Null))
            }
        }
    }

    /// Registry stub answering every kind with one fixed validator.
    struct FixedRegistry(FixedValidator);

    impl ValidatorRegistry for FixedRegistry {
        fn resolve(&self, _kind: ValidatorKind) -> Option<&dyn Validator> {
            Some(&self.0)
        }
    }

    /// Registry stub with nothing registered.
    struct EmptyRegistry;

    impl ValidatorRegistry for EmptyRegistry {
        fn resolve(&self, _kind: ValidatorKind) -> Option<&dyn Validator> {
            None
        }
    }

    fn acceptance(mode: GateMode, min_score: Option<f64>, weights: &[f64]) -> AcceptanceSpec {
        AcceptanceSpec {
            id: AcceptanceSpecId::new("acc"),
            agent_spec_id: SpecId::new("spec"),
            validators: weights
                .iter()
                .map(|weight| {
                    let mut config = ValidatorConfig::new(ValidatorKind::FileExists, Map::new());
                    config.weight = *weight;
                    config
                })
                .collect(),
            gate_mode: mode,
            min_score,
            retry_policy: RetryPolicy::None,
            max_retries: 0,
            fallback_spec_id: None,
        }
    }

    fn context_parts() -> (RunId, Vec<crate::core::AgentEvent>) {
        (RunId::new("run"), Vec::new())
    }

    #[test]
    fn all_pass_requires_every_validator() {
        let (run_id, events) = context_parts();
        let context = ValidationContext {
            run_id: &run_id,
            project_dir: Path::new("/tmp"),
            events: &events,
        };
        let spec = acceptance(GateMode::AllPass, None, &[1.0, 1.0]);
        let passing = evaluate_gate(&spec, &FixedRegistry(FixedValidator(true)), &context);
        assert!(passing.passed);
        assert_eq!(passing.verdict, Verdict::Passed);
        let failing = evaluate_gate(&spec, &FixedRegistry(FixedValidator(false)), &context);
        assert!(!failing.passed);
        assert_eq!(failing.verdict, Verdict::Failed);
    }

    #[test]
    fn weighted_mode_compares_score_to_threshold() {
        let (run_id, events) = context_parts();
        let context = ValidationContext {
            run_id: &run_id,
            project_dir: Path::new("/tmp"),
            events: &events,
        };
        let spec = acceptance(GateMode::Weighted, Some(0.5), &[1.0, 1.0]);
        let report = evaluate_gate(&spec, &FixedRegistry(FixedValidator(true)), &context);
        assert_eq!(report.score, Some(1.0));
        assert!(report.passed);
    }

    #[test]
    fn unregistered_kinds_become_failed_results() {
        let (run_id, events) = context_parts();
        let context = ValidationContext {
            run_id: &run_id,
            project_dir: Path::new("/tmp"),
            events: &events,
        };
        let spec = acceptance(GateMode::AnyPass, None, &[1.0]);
        let report = evaluate_gate(&spec, &EmptyRegistry, &context);
        assert!(!report.passed);
        assert_eq!(report.validators.len(), 1);
        assert!(!report.validators[0].result.passed);
    }

    #[test]
    fn required_validator_failure_overrides_any_pass() {
        let (run_id, events) = context_parts();
        let context = ValidationContext {
            run_id: &run_id,
            project_dir: Path::new("/tmp"),
            events: &events,
        };
        let mut spec = acceptance(GateMode::AnyPass, None, &[1.0, 1.0]);
        spec.validators[0].required = true;
        // First validator fails (required), second passes: any_pass would
        // succeed, the required flag must veto it.
        struct Alternating(std::cell::Cell<bool>);
        impl Validator for Alternating {
            fn evaluate(
                &self,
                _config: &ValidatorConfig,
                _context: &ValidationContext<'_>,
            ) -> Result<ValidatorResult, ValidatorError> {
                let fail_first = !self.0.get();
                self.0.set(true);
                if fail_first {
                    Ok(ValidatorResult::fail("first fails", Value::Null))
                } else {
                    Ok(ValidatorResult::pass("second passes", Value::Null))
                }
            }
        }
        struct AltRegistry(Alternating);
        impl ValidatorRegistry for AltRegistry {
            fn resolve(&self, _kind: ValidatorKind) -> Option<&dyn Validator> {
                Some(&self.0)
            }
        }
        let report =
            evaluate_gate(&spec, &AltRegistry(Alternating(std::cell::Cell::new(false))), &context);
        assert!(!report.passed);
    }
}
