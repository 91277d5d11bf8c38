// crates/autobuildr-compiler/src/lib.rs
// ============================================================================
// Module: AutoBuildr Compiler Library
// Description: Public API surface for feature compilation.
// Purpose: Expose the feature compiler, templates, and static adapter.
// Dependencies: crate::{adapter, compiler, keywords, slug, templates}
// ============================================================================

//! ## Overview
//! The compiler turns backlog features into runnable agent specs plus
//! acceptance specs: keyword-derived task types, templated tool policies
//! with global forbidden patterns, scaled budgets, unique slugs, and
//! intent-derived validators. The static adapter provides the three legacy
//! role specs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adapter;
pub mod compiler;
pub mod keywords;
pub mod slug;
pub mod templates;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adapter::StaticRole;
pub use adapter::static_spec;
pub use compiler::CompileError;
pub use compiler::CompiledFeature;
pub use compiler::compile;
pub use compiler::compile_and_store;
pub use compiler::derive_validators;
pub use keywords::TASK_TYPE_KEYWORDS;
pub use keywords::derive_task_type;
pub use slug::base_spec_name;
pub use slug::slugify;
pub use slug::unique_spec_name;
pub use templates::GLOBAL_FORBIDDEN_PATTERNS;
pub use templates::budget_template;
pub use templates::policy_template;
