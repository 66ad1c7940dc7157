//! Subprocess-backed Python sandbox.

use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::config::SandboxConfig;
use super::pytest::{parse_report, PytestReport};
use super::staging::StagingArea;
use super::Sandbox;
use crate::domain::{ExecutionResult, SandboxFault};
use crate::metrics::METRICS;

/// Parses stdin as Python source without executing it.
const SYNTAX_CHECK: &str = "import sys\ncompile(sys.stdin.read(), sys.argv[1], 'exec')\n";

/// pytest exit code for "no tests were collected".
const PYTEST_NO_TESTS: i32 = 5;

/// Appended to the output of a run that exited cleanly with no verdicts.
const NO_VERDICTS: &str = "test runner exited without reporting any test results";

/// Runs candidates and pytest suites in a separate interpreter process.
///
/// Per call: a fresh [`StagingArea`], a cleared environment (only `PATH`
/// and a handful of Python variables pointing into the staging area), and
/// `kill_on_drop` so a timed-out or cancelled child never outlives the call.
#[derive(Debug, Clone)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

enum ProcessOutcome {
    Exited(Output),
    TimedOut,
}

enum SyntaxVerdict {
    Valid,
    Invalid(String),
    TimedOut,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn command(&self, staging: &StagingArea) -> Command {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.current_dir(staging.path())
            .env_clear()
            .env("PATH", self.config.child_path())
            .env("HOME", staging.path())
            .env("PYTHONPATH", staging.path())
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONHASHSEED", "0")
            .env("PYTHONUNBUFFERED", "1")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Parse the raw candidate without running it.
    async fn check_syntax(
        &self,
        staging: &StagingArea,
        attempt_text: &str,
        budget: Duration,
    ) -> std::io::Result<SyntaxVerdict> {
        let mut cmd = self.command(staging);
        cmd.arg("-c")
            .arg(SYNTAX_CHECK)
            .arg(self.config.candidate_file())
            .stdin(Stdio::piped());
        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(attempt_text.as_bytes()).await?;
        }

        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                if output.status.success() {
                    Ok(SyntaxVerdict::Valid)
                } else {
                    Ok(SyntaxVerdict::Invalid(last_line(&String::from_utf8_lossy(
                        &output.stderr,
                    ))))
                }
            }
            Err(_elapsed) => Ok(SyntaxVerdict::TimedOut),
        }
    }

    async fn run_suite(
        &self,
        staging: &StagingArea,
        budget: Duration,
    ) -> std::io::Result<ProcessOutcome> {
        let mut cmd = self.command(staging);
        cmd.args(["-m", "pytest", "-v", "-rfE", "--tb=short", "--color=no"])
            .args(["-p", "no:cacheprovider"])
            .arg(self.config.test_file())
            .stdin(Stdio::null());
        let child = cmd.spawn()?;

        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => Ok(ProcessOutcome::Exited(output?)),
            Err(_elapsed) => Ok(ProcessOutcome::TimedOut),
        }
    }

    fn timed_out(&self, timeout: Duration, elapsed: Duration) -> ExecutionResult {
        METRICS.inc_sandbox_timeouts();
        warn!(
            timeout_ms = timeout.as_millis() as u64,
            "sandbox execution timed out; child killed"
        );
        ExecutionResult::fault(
            SandboxFault::Timeout,
            format!(
                "execution exceeded the {}ms budget and was terminated",
                timeout.as_millis()
            ),
            elapsed,
            Vec::new(),
        )
    }
}

#[async_trait]
impl Sandbox for PythonSandbox {
    async fn execute(
        &self,
        attempt_text: &str,
        test_text: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        let start = Instant::now();
        let remaining = || timeout.saturating_sub(start.elapsed());

        let staging = match StagingArea::create(self.config.staging_root.as_deref()) {
            Ok(staging) => staging,
            Err(err) => {
                return ExecutionResult::fault(
                    SandboxFault::Staging,
                    format!("failed to create staging area: {err}"),
                    start.elapsed(),
                    vec![err.to_string()],
                )
            }
        };
        debug!(staging = %staging.path().display(), "staging area created");

        match self.check_syntax(&staging, attempt_text, remaining()).await {
            Ok(SyntaxVerdict::Valid) => {}
            Ok(SyntaxVerdict::TimedOut) => return self.timed_out(timeout, start.elapsed()),
            Ok(SyntaxVerdict::Invalid(parse_error)) => {
                METRICS.inc_syntax_rejections();
                return ExecutionResult::fault(
                    SandboxFault::Syntax,
                    format!("Syntax error in implementation: {parse_error}"),
                    start.elapsed(),
                    vec![parse_error],
                );
            }
            Err(err) => {
                return ExecutionResult::fault(
                    SandboxFault::Spawn,
                    format!(
                        "failed to launch interpreter {}: {err}",
                        self.config.interpreter.display()
                    ),
                    start.elapsed(),
                    vec![err.to_string()],
                )
            }
        }

        let staged = staging
            .write(
                &self.config.candidate_file(),
                &self.config.stage_candidate(attempt_text),
            )
            .and_then(|_| {
                staging.write(&self.config.test_file(), &self.config.stage_suite(test_text))
            });
        if let Err(err) = staged {
            return ExecutionResult::fault(
                SandboxFault::Staging,
                format!("Failed to write implementation: {err}"),
                start.elapsed(),
                vec![err.to_string()],
            );
        }

        let output = match self.run_suite(&staging, remaining()).await {
            Ok(ProcessOutcome::Exited(output)) => output,
            Ok(ProcessOutcome::TimedOut) => return self.timed_out(timeout, start.elapsed()),
            Err(err) => {
                return ExecutionResult::fault(
                    SandboxFault::Spawn,
                    format!("failed to launch test runner: {err}"),
                    start.elapsed(),
                    vec![err.to_string()],
                )
            }
        };

        let duration = start.elapsed();
        let mut raw_output = String::from_utf8_lossy(&output.stdout).into_owned();
        raw_output.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code().unwrap_or(-1);
        let report = parse_report(&raw_output, &self.config.domain_keywords);

        debug!(
            exit_code,
            passed = report.passed_ids.len(),
            failed = report.failed_ids.len(),
            duration_ms = duration.as_millis() as u64,
            "test suite finished"
        );

        if let Err(err) = staging.close() {
            warn!(error = %err, "failed to remove staging area");
        }

        classify(exit_code, report, raw_output, duration)
    }
}

/// Turn a finished pytest run into a result.
///
/// A pass needs exit status 0 and at least one passing verdict line. A run
/// that exits cleanly without reporting any verdict (the candidate ended the
/// interpreter during import, for example) is a runner fault.
fn classify(
    exit_code: i32,
    report: PytestReport,
    mut raw_output: String,
    duration: Duration,
) -> ExecutionResult {
    let domain_errors = report.domain_errors;
    if !report.failed_ids.is_empty() {
        return ExecutionResult::new(raw_output, report.failed_ids, duration, domain_errors);
    }
    match exit_code {
        0 if !report.passed_ids.is_empty() => {
            ExecutionResult::new(raw_output, Vec::new(), duration, domain_errors)
        }
        0 => {
            warn!("test runner exited cleanly without reporting any verdict");
            if !raw_output.is_empty() && !raw_output.ends_with('\n') {
                raw_output.push('\n');
            }
            raw_output.push_str(NO_VERDICTS);
            ExecutionResult::fault(SandboxFault::Runner, raw_output, duration, domain_errors)
        }
        PYTEST_NO_TESTS => {
            ExecutionResult::fault(SandboxFault::NoTests, raw_output, duration, domain_errors)
        }
        _ => ExecutionResult::fault(SandboxFault::Runner, raw_output, duration, domain_errors),
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown parse error")
        .to_string()
}
