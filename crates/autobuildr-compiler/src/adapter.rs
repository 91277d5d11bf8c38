// crates/autobuildr-compiler/src/adapter.rs
// ============================================================================
// Module: Static Spec Adapter
// Description: Hard-coded specs for the legacy agent roles.
// Purpose: Provide runnable initializer, coder, and tester specs without a
//          source feature.
// Dependencies: autobuildr-core
// ============================================================================

//! ## Overview
//! Three legacy roles survive as templated specs: the initializer seeds a
//! project's backlog, the coder implements ready features, and the tester
//! verifies passing ones. Each wraps a template objective, a curated tool
//! policy, and a validator set calibrated to the role.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use autobuildr_core::AcceptanceSpec;
use autobuildr_core::AcceptanceSpecId;
use autobuildr_core::AgentSpec;
use autobuildr_core::GateMode;
use autobuildr_core::RetryPolicy;
use autobuildr_core::SpecId;
use autobuildr_core::TaskType;
use autobuildr_core::Timestamp;
use autobuildr_core::ValidatorConfig;
use autobuildr_core::ValidatorKind;
use serde_json::Map;
use serde_json::json;

use crate::compiler::CompiledFeature;
use crate::templates::policy_template;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Legacy agent roles provided as static specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRole {
    /// Seeds the backlog for a fresh project.
    Initializer,
    /// Implements ready features.
    Coder,
    /// Verifies features marked as passing.
    Tester,
}

impl StaticRole {
    /// Every role, in declaration order.
    pub const ALL: [Self; 3] = [Self::Initializer, Self::Coder, Self::Tester];

    /// Returns the stable slug for the role.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Initializer => "static-initializer",
            Self::Coder => "static-coder",
            Self::Tester => "static-tester",
        }
    }
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Builds the static spec for a role.
#[must_use]
pub fn static_spec(role: StaticRole, now: Timestamp) -> CompiledFeature {
    let (task_type, objective, display_name) = match role {
        StaticRole::Initializer => (
            TaskType::Coding,
            "Initialize the project backlog: review the project layout and create an ordered \
             feature list with categories, steps, and dependencies."
                .to_string(),
            "Initializer".to_string(),
        ),
        StaticRole::Coder => (
            TaskType::Coding,
            "Implement the assigned feature end to end, keeping changes minimal and running the \
             relevant tests before finishing."
                .to_string(),
            "Coder".to_string(),
        ),
        StaticRole::Tester => (
            TaskType::Testing,
            "Verify the assigned feature: execute its acceptance steps and report structured \
             results."
                .to_string(),
            "Tester".to_string(),
        ),
    };

    let spec = AgentSpec {
        id: SpecId::generate(),
        name: role.slug().to_string(),
        display_name,
        icon: None,
        spec_version: AgentSpec::DEFAULT_SPEC_VERSION.to_string(),
        objective,
        task_type,
        context: BTreeMap::new(),
        tool_policy: policy_template(task_type),
        max_turns: match role {
            StaticRole::Initializer => 40,
            StaticRole::Coder => 50,
            StaticRole::Tester => 25,
        },
        timeout_seconds: match role {
            StaticRole::Initializer => 1_800,
            StaticRole::Coder => 2_400,
            StaticRole::Tester => 1_200,
        },
        parent_spec_id: None,
        source_feature_id: None,
        spec_path: None,
        priority: 0,
        tags: vec!["static".to_string()],
        created_at: now,
    };

    let validators = match role {
        // The initializer must leave a populated database behind.
        StaticRole::Initializer => vec![ValidatorConfig::new(ValidatorKind::FileExists, {
            let mut config = Map::new();
            config.insert("path".to_string(), json!("{project_dir}/features.db"));
            config
        })],
        StaticRole::Coder => Vec::new(),
        // The tester's own run must not leak credentials into results.
        StaticRole::Tester => vec![ValidatorConfig::new(ValidatorKind::ForbiddenPatterns, {
            let mut config = Map::new();
            config
                .insert("patterns".to_string(), json!([r"(AWS_SECRET|PRIVATE_KEY|password\s*=)"]));
            config
        })],
    };

    let acceptance = AcceptanceSpec {
        id: AcceptanceSpecId::generate(),
        agent_spec_id: spec.id.clone(),
        validators,
        gate_mode: GateMode::AllPass,
        min_score: None,
        retry_policy: RetryPolicy::None,
        max_retries: 0,
        fallback_spec_id: None,
    };

    CompiledFeature {
        spec,
        acceptance,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
