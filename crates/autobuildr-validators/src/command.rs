// crates/autobuildr-validators/src/command.rs
// ============================================================================
// Module: Test-Pass Validator
// Description: Subprocess-backed command validator with timeout kill.
// Purpose: Pass iff a configured command exits with the expected code within
//          its time budget.
// Dependencies: autobuildr-core, serde_json
// ============================================================================

//! ## Overview
//! The `test_pass` validator spawns the configured command through the
//! platform shell, caps it with a per-validator timeout (enforced by
//! killing the subprocess), and passes iff the exit code equals the
//! configured expectation (default 0). Captured stdout/stderr land in the
//! result details; oversized gate payloads spill through the recorder's
//! normal overflow path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::process::Command;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use autobuildr_core::ValidatorConfig;
use autobuildr_core::interfaces::ValidationContext;
use autobuildr_core::interfaces::Validator;
use autobuildr_core::interfaces::ValidatorError;
use autobuildr_core::interfaces::ValidatorResult;
use serde_json::json;
use tracing::debug;

use crate::config::interpolate_project_dir;
use crate::config::optional_i64;
use crate::config::optional_string;
use crate::config::optional_u64;
use crate::config::required_string;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-validator timeout in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
/// Poll interval while waiting for the subprocess.
const POLL_INTERVAL_MS: u64 = 25;
/// Output kept in the result details, per stream.
const OUTPUT_CAP_BYTES: usize = 16 * 1024;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Command-execution validator (`test_pass`).
#[derive(Debug, Default)]
pub struct TestPassValidator;

impl Validator for TestPassValidator {
    fn evaluate(
        &self,
        config: &ValidatorConfig,
        context: &ValidationContext<'_>,
    ) -> Result<ValidatorResult, ValidatorError> {
        let command_line = required_string(&config.config, "command")?;
        let expected_code = optional_i64(&config.config, "expected_exit_code").unwrap_or(0);
        let timeout_seconds =
            optional_u64(&config.config, "timeout_seconds").unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let working_directory = optional_string(&config.config, "working_directory")
            .map(|raw| interpolate_project_dir(&raw, context.project_dir));

        debug!(command = %command_line, timeout_seconds, "running test_pass command");

        let mut command = Command::new("sh");
        command.arg("-c").arg(&command_line);
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        match &working_directory {
            Some(dir) => {
                command.current_dir(dir);
            }
            None => {
                command.current_dir(context.project_dir);
            }
        }

        let mut child = command
            .spawn()
            .map_err(|err| ValidatorError::Evaluation(format!("spawn failed: {err}")))?;

        // Drain the pipes on reader threads so a chatty command cannot
        // deadlock against a full pipe buffer.
        let stdout_reader = child.stdout.take().map(spawn_capture);
        let stderr_reader = child.stderr.take().map(spawn_capture);

        let deadline = Instant::now() + Duration::from_secs(timeout_seconds);
        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        timed_out = true;
                        let _ = child.kill();
                        break child.wait().ok();
                    }
                    thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
                }
                Err(err) => {
                    let _ = child.kill();
                    return Err(ValidatorError::Evaluation(format!("wait failed: {err}")));
                }
            }
        };

        let stdout = join_capture(stdout_reader);
        let stderr = join_capture(stderr_reader);
        let exit_code = status.and_then(|status| status.code());

        let details = json!({
            "command": command_line,
            "exit_code": exit_code,
            "expected_exit_code": expected_code,
            "timed_out": timed_out,
            "stdout": stdout,
            "stderr": stderr,
        });

        if timed_out {
            return Ok(ValidatorResult::fail(
                format!("command timed out after {timeout_seconds}s"),
                details,
            ));
        }
        match exit_code {
            Some(code) if i64::from(code) == expected_code => Ok(ValidatorResult::pass(
                format!("command exited with expected code {code}"),
                details,
            )),
            Some(code) => Ok(ValidatorResult::fail(
                format!("command exited with {code}, expected {expected_code}"),
                details,
            )),
            None => {
                Ok(ValidatorResult::fail("command terminated by signal".to_string(), details))
            }
        }
    }
}

// ============================================================================
// SECTION: Capture Helpers
// ============================================================================

/// Spawns a thread draining a pipe into a capped buffer.
fn spawn_capture<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer.truncate(OUTPUT_CAP_BYTES);
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

/// Joins a capture thread, tolerating a panicked reader.
fn join_capture(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|handle| handle.join().ok()).unwrap_or_default()
}
