//! Structured outcome of running one attempt against the generated suite.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Faults raised inside the sandbox.
///
/// These never cross the sandbox boundary as errors; each one is recorded as
/// a dedicated failure id on a non-passing [`ExecutionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxFault {
    /// The candidate failed to parse; the suite was never run.
    Syntax,
    /// The staging area could not be prepared.
    Staging,
    /// The interpreter process could not be spawned.
    Spawn,
    /// The run exceeded its wall-clock budget and was killed.
    Timeout,
    /// The test runner failed without reporting a per-test verdict.
    Runner,
    /// The suite contained no collectable tests.
    NoTests,
}

impl SandboxFault {
    /// Failure id recorded for this fault.
    pub fn failure_id(&self) -> &'static str {
        match self {
            SandboxFault::Syntax => "syntax_check",
            SandboxFault::Staging => "file_write",
            SandboxFault::Spawn => "sandbox_error",
            SandboxFault::Timeout => "timeout",
            SandboxFault::Runner => "test_run",
            SandboxFault::NoTests => "no_tests_collected",
        }
    }

    /// Reverse lookup from a recorded failure id.
    pub fn from_failure_id(id: &str) -> Option<Self> {
        [
            SandboxFault::Syntax,
            SandboxFault::Staging,
            SandboxFault::Spawn,
            SandboxFault::Timeout,
            SandboxFault::Runner,
            SandboxFault::NoTests,
        ]
        .into_iter()
        .find(|fault| fault.failure_id() == id)
    }
}

impl std::fmt::Display for SandboxFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.failure_id())
    }
}

/// Result of executing an attempt in the sandbox.
///
/// Invariant: `passed == failed_test_ids.is_empty()`. The only constructors
/// derive `passed` from the failure ids, and deserialization rejects records
/// that disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExecutionResultRecord")]
pub struct ExecutionResult {
    passed: bool,
    raw_output: String,
    failed_test_ids: Vec<String>,
    duration: Duration,
    domain_errors: Vec<String>,
    timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// Build a result from per-test verdicts. Passes iff no test failed.
    pub fn new(
        raw_output: impl Into<String>,
        failed_test_ids: Vec<String>,
        duration: Duration,
        domain_errors: Vec<String>,
    ) -> Self {
        Self {
            passed: failed_test_ids.is_empty(),
            raw_output: raw_output.into(),
            failed_test_ids,
            duration,
            domain_errors,
            timestamp: Utc::now(),
        }
    }

    /// Build a passing result.
    pub fn passing(raw_output: impl Into<String>, duration: Duration) -> Self {
        Self::new(raw_output, Vec::new(), duration, Vec::new())
    }

    /// Build a non-passing result for a sandbox fault.
    pub fn fault(
        fault: SandboxFault,
        raw_output: impl Into<String>,
        duration: Duration,
        domain_errors: Vec<String>,
    ) -> Self {
        Self::new(
            raw_output,
            vec![fault.failure_id().to_string()],
            duration,
            domain_errors,
        )
    }

    /// Override the timestamp (deterministic fixtures).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    pub fn failed_test_ids(&self) -> &[String] {
        &self.failed_test_ids
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn domain_errors(&self) -> &[String] {
        &self.domain_errors
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The sandbox fault behind this result, if it was not a plain test failure.
    pub fn fault_kind(&self) -> Option<SandboxFault> {
        match self.failed_test_ids.as_slice() {
            [only] => SandboxFault::from_failure_id(only),
            _ => None,
        }
    }
}

/// Wire shape of [`ExecutionResult`], validated on the way in.
#[derive(Deserialize)]
struct ExecutionResultRecord {
    passed: bool,
    raw_output: String,
    failed_test_ids: Vec<String>,
    duration: Duration,
    #[serde(default)]
    domain_errors: Vec<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ExecutionResultRecord> for ExecutionResult {
    type Error = String;

    fn try_from(record: ExecutionResultRecord) -> Result<Self, Self::Error> {
        if record.passed != record.failed_test_ids.is_empty() {
            return Err(format!(
                "inconsistent execution result: passed={} with {} failed test id(s)",
                record.passed,
                record.failed_test_ids.len()
            ));
        }
        Ok(Self {
            passed: record.passed,
            raw_output: record.raw_output,
            failed_test_ids: record.failed_test_ids,
            duration: record.duration,
            domain_errors: record.domain_errors,
            timestamp: record.timestamp,
        })
    }
}
