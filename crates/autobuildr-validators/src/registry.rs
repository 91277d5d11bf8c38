// crates/autobuildr-validators/src/registry.rs
// ============================================================================
// Module: Validator Registry
// Description: Kind-dispatched registry of acceptance validators.
// Purpose: Resolve validator kinds to implementations for the gate.
// Dependencies: autobuildr-core
// ============================================================================

//! ## Overview
//! The registry maps the closed validator-kind set to implementations and
//! implements the core [`autobuildr_core::ValidatorRegistry`] interface for
//! seamless use by the harness kernel. Custom deployments may replace any
//! entry before handing the registry to the kernel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use autobuildr_core::ValidatorKind;
use autobuildr_core::interfaces::Validator;
use autobuildr_core::interfaces::ValidatorRegistry;

use crate::command::TestPassValidator;
use crate::file::FileExistsValidator;
use crate::patterns::ForbiddenPatternsValidator;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of acceptance validators keyed by kind.
///
/// # Invariants
/// - Each kind resolves to at most one implementation.
/// - Registered validators are `Send + Sync` trait objects.
pub struct BuiltinValidatorRegistry {
    /// Validator implementations keyed by kind.
    validators: BTreeMap<ValidatorKind, Box<dyn Validator + Send + Sync>>,
}

impl BuiltinValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            validators: BTreeMap::new(),
        }
    }

    /// Creates a registry with every built-in validator registered.
    #[must_use]
    pub fn with_builtin_validators() -> Self {
        let mut registry = Self::empty();
        registry.register(ValidatorKind::TestPass, Box::new(TestPassValidator));
        registry.register(ValidatorKind::FileExists, Box::new(FileExistsValidator));
        registry.register(ValidatorKind::ForbiddenPatterns, Box::new(ForbiddenPatternsValidator));
        registry
    }

    /// Registers (or replaces) the implementation for a kind.
    pub fn register(&mut self, kind: ValidatorKind, validator: Box<dyn Validator + Send + Sync>) {
        self.validators.insert(kind, validator);
    }
}

impl Default for BuiltinValidatorRegistry {
    fn default() -> Self {
        Self::with_builtin_validators()
    }
}

impl ValidatorRegistry for BuiltinValidatorRegistry {
    fn resolve(&self, kind: ValidatorKind) -> Option<&dyn Validator> {
        self.validators.get(&kind).map(|validator| validator.as_ref() as &dyn Validator)
    }
}
