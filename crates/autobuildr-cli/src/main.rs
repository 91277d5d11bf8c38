// crates/autobuildr-cli/src/main.rs
// ============================================================================
// Module: AutoBuildr CLI Entry Point
// Description: Command dispatcher for startup, health gating, and
//              materialization.
// Purpose: Provide the `run` command with stable exit codes.
// Dependencies: autobuildr-orchestrator, autobuildr-config, clap,
//               tracing-subscriber
// ============================================================================

//! ## Overview
//! The CLI drives everything up to the turn-executor boundary: it loads and
//! validates configuration, initializes the core context, runs crash
//! recovery and the dependency health check, optionally materializes agent
//! snapshots, and prints the scheduling preview. The concrete LLM executor
//! is an external collaborator wired through the library API.
//!
//! Exit codes: 0 success; 2 startup gated by a dependency cycle; 3
//! configuration error; 1 unrecoverable runtime error.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "The CLI surface prints to the terminal."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use autobuildr_config::ConfigError;
use autobuildr_config::OrchestratorConfig;
use autobuildr_core::interfaces::FeatureStore;
use autobuildr_core::interfaces::SpecStore;
use autobuildr_graph::format_id_path;
use autobuildr_orchestrator::CYCLE_REMEDIATION;
use autobuildr_orchestrator::CoreContext;
use autobuildr_orchestrator::HealthError;
use autobuildr_orchestrator::Orchestrator;
use autobuildr_orchestrator::OrchestratorError;
use autobuildr_orchestrator::materialize_spec;
use clap::Parser;
use clap::Subcommand;
use tracing::error;

// ============================================================================
// SECTION: Exit Codes
// ============================================================================

/// Exit code: success.
const EXIT_OK: u8 = 0;
/// Exit code: unrecoverable runtime error.
const EXIT_RUNTIME: u8 = 1;
/// Exit code: startup gated by a dependency cycle.
const EXIT_CYCLE: u8 = 2;
/// Exit code: configuration error.
const EXIT_CONFIG: u8 = 3;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "autobuildr", version, about = "Autonomous agent orchestrator")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate, repair, and prepare a project for agent execution.
    Run {
        /// Project directory holding `features.db`.
        project_dir: PathBuf,
        /// Restrict the preview to a single spec by name.
        #[arg(long = "spec")]
        spec: Option<String>,
        /// Write agent snapshots under `.claude/agents/generated/`.
        #[arg(long = "materialize-agents")]
        materialize_agents: bool,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            project_dir,
            spec,
            materialize_agents,
        } => run_command(&project_dir, spec.as_deref(), materialize_agents),
    }
}

/// Executes the `run` command and maps failures to exit codes.
fn run_command(
    project_dir: &std::path::Path,
    spec_filter: Option<&str>,
    materialize_agents: bool,
) -> ExitCode {
    let config = match OrchestratorConfig::load(project_dir) {
        Ok(config) => config,
        Err(err) => return config_failure(&err),
    };

    let context = match CoreContext::initialize(project_dir, config) {
        Ok(context) => context,
        Err(err) => {
            error!(error = %err, "context initialization failed");
            eprintln!("error: {err}");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };
    let orchestrator = Orchestrator::new(context);

    let (report, recovered) = match orchestrator.startup() {
        Ok(outcome) => outcome,
        Err(OrchestratorError::Health(HealthError::CyclesDetected { cycles })) => {
            for cycle in &cycles {
                eprintln!("dependency cycle: [{}]", format_id_path(cycle));
            }
            eprintln!("{CYCLE_REMEDIATION}");
            return ExitCode::from(EXIT_CYCLE);
        }
        Err(err) => {
            error!(error = %err, "startup failed");
            eprintln!("error: {err}");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    if !recovered.is_empty() {
        println!("repaired {} orphaned run(s)", recovered.len());
    }
    if !report.repaired_self_references.is_empty() || !report.repaired_orphans.is_empty() {
        println!(
            "auto-repaired dependencies: {} self-reference(s), {} orphan(s)",
            report.repaired_self_references.len(),
            report.repaired_orphans.len()
        );
    }
    println!("{}", report.validation.summary);

    if materialize_agents && let Some(code) = materialize(&orchestrator, spec_filter) {
        return code;
    }

    preview(&orchestrator, spec_filter)
}

/// Maps a configuration error to its exit code.
fn config_failure(err: &ConfigError) -> ExitCode {
    error!(error = %err, "configuration invalid");
    eprintln!("configuration error: {err}");
    ExitCode::from(EXIT_CONFIG)
}

/// Materializes compiled spec snapshots; returns an exit code on failure.
fn materialize(orchestrator: &Orchestrator, spec_filter: Option<&str>) -> Option<ExitCode> {
    let context = orchestrator.context();
    let store = context.store();
    let features = match store.list_features() {
        Ok(features) => features,
        Err(err) => {
            eprintln!("error: {err}");
            return Some(ExitCode::from(EXIT_RUNTIME));
        }
    };
    let now = context.clock().now();
    for feature in features {
        let compiled = match autobuildr_compiler::compile_and_store(&feature, store.as_ref(), now)
        {
            Ok(compiled) => compiled,
            Err(err) => {
                eprintln!("error compiling feature {}: {err}", feature.id);
                return Some(ExitCode::from(EXIT_RUNTIME));
            }
        };
        if spec_filter.is_some_and(|name| name != compiled.spec.name) {
            continue;
        }
        match materialize_spec(store.as_ref(), context.project_dir(), &compiled.spec) {
            Ok(path) => println!("materialized {}", path.display()),
            Err(err) => {
                eprintln!("error: {err}");
                return Some(ExitCode::from(EXIT_RUNTIME));
            }
        }
    }
    None
}

/// Prints the scheduling preview and finishes with success.
fn preview(orchestrator: &Orchestrator, spec_filter: Option<&str>) -> ExitCode {
    let store = orchestrator.context().store();

    if let Some(name) = spec_filter {
        return match store.get_spec_by_name(name) {
            Ok(Some(spec)) => {
                println!(
                    "spec {}: task_type={} max_turns={} timeout={}s",
                    spec.name, spec.task_type, spec.max_turns, spec.timeout_seconds
                );
                ExitCode::from(EXIT_OK)
            }
            Ok(None) => {
                eprintln!("error: no spec named {name}");
                ExitCode::from(EXIT_RUNTIME)
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::from(EXIT_RUNTIME)
            }
        };
    }

    match store.list_features() {
        Ok(features) => {
            let resolution = autobuildr_graph::resolve(&features);
            let pending: Vec<String> = resolution
                .ordered
                .iter()
                .filter_map(|id| features.iter().find(|feature| feature.id == *id))
                .filter(|feature| !feature.passes)
                .map(|feature| format!("{} {}", feature.id, feature.name))
                .collect();
            println!("{} feature(s) pending, in execution order:", pending.len());
            for line in pending {
                println!("  {line}");
            }
            ExitCode::from(EXIT_OK)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}
