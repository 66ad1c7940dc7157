//! Deterministic fakes for the oracle, sandbox and clock (testing only)
//!
//! `ScriptedOracle` replays canned responses, `ScriptedSandbox` maps candidate
//! text to fixed results and `FixedClock` never moves. Together they make a
//! whole session reproducible byte for byte.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;
use crate::domain::{ExecutionResult, GenerationError, SandboxFault, Specification};
use crate::oracle::Oracle;
use crate::sandbox::Sandbox;

/// Timestamp used by every fake that needs one.
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

/// Oracle replaying scripted responses in order.
///
/// Once a script runs out its last entry repeats. With no diagnoses scripted
/// the oracle behaves like one without diagnosis support.
#[derive(Debug)]
pub struct ScriptedOracle {
    test: Result<String, GenerationError>,
    implementations: Vec<Result<String, GenerationError>>,
    diagnoses: Vec<Result<String, GenerationError>>,
    test_calls: AtomicU32,
    implementation_calls: AtomicU32,
    diagnosis_calls: AtomicU32,
    contexts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(test_text: impl Into<String>) -> Self {
        Self {
            test: Ok(test_text.into()),
            implementations: Vec::new(),
            diagnoses: Vec::new(),
            test_calls: AtomicU32::new(0),
            implementation_calls: AtomicU32::new(0),
            diagnosis_calls: AtomicU32::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// An oracle whose test generation always fails.
    pub fn failing_test(error: GenerationError) -> Self {
        let mut oracle = Self::new("");
        oracle.test = Err(error);
        oracle
    }

    pub fn with_implementations(mut self, script: Vec<Result<String, GenerationError>>) -> Self {
        self.implementations = script;
        self
    }

    /// Shorthand for a script of successful implementations.
    pub fn with_implementation_texts<I, S>(self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_implementations(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    pub fn with_diagnoses(mut self, script: Vec<Result<String, GenerationError>>) -> Self {
        self.diagnoses = script;
        self
    }

    pub fn test_calls(&self) -> u32 {
        self.test_calls.load(Ordering::SeqCst)
    }

    pub fn implementation_calls(&self) -> u32 {
        self.implementation_calls.load(Ordering::SeqCst)
    }

    pub fn diagnosis_calls(&self) -> u32 {
        self.diagnosis_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        self.test_calls() + self.implementation_calls() + self.diagnosis_calls()
    }

    /// Contexts passed to each implementation request, in call order.
    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }
}

fn replay(
    script: &[Result<String, GenerationError>],
    call: u32,
) -> Option<Result<String, GenerationError>> {
    let index = usize::try_from(call).unwrap_or(usize::MAX);
    script.get(index).or_else(|| script.last()).cloned()
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn produce_test(
        &self,
        _specification: &Specification,
    ) -> Result<String, GenerationError> {
        self.test_calls.fetch_add(1, Ordering::SeqCst);
        self.test.clone()
    }

    async fn produce_implementation(
        &self,
        _specification: &Specification,
        _test_text: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let call = self.implementation_calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.to_string());
        replay(&self.implementations, call).unwrap_or_else(|| {
            Err(GenerationError::InvalidResponse(
                "no scripted implementation".to_string(),
            ))
        })
    }

    async fn produce_diagnosis(
        &self,
        _result: &ExecutionResult,
    ) -> Result<String, GenerationError> {
        let call = self.diagnosis_calls.fetch_add(1, Ordering::SeqCst);
        replay(&self.diagnoses, call)
            .unwrap_or(Err(GenerationError::Unsupported("failure diagnosis")))
    }
}

// ---------------------------------------------------------------------------
// ScriptedSandbox
// ---------------------------------------------------------------------------

/// Sandbox returning a fixed result per candidate text.
///
/// Unknown candidates fail `test_candidate.py::test_behaviour`. Every result
/// carries [`fixed_instant`] and a 1ms duration.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    results: HashMap<String, ExecutionResult>,
    executions: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passing(mut self, candidate: impl Into<String>) -> Self {
        let result = ExecutionResult::passing("1 passed", Duration::from_millis(1));
        self.results.insert(candidate.into(), result.at(fixed_instant()));
        self
    }

    pub fn failing(mut self, candidate: impl Into<String>, failed_ids: &[&str]) -> Self {
        let result = ExecutionResult::new(
            format!("{} failed", failed_ids.len()),
            failed_ids.iter().map(|id| id.to_string()).collect(),
            Duration::from_millis(1),
            Vec::new(),
        );
        self.results.insert(candidate.into(), result.at(fixed_instant()));
        self
    }

    pub fn faulting(mut self, candidate: impl Into<String>, fault: SandboxFault) -> Self {
        let result = ExecutionResult::fault(
            fault,
            format!("{fault}"),
            Duration::from_millis(1),
            Vec::new(),
        );
        self.results.insert(candidate.into(), result.at(fixed_instant()));
        self
    }

    pub fn with_result(mut self, candidate: impl Into<String>, result: ExecutionResult) -> Self {
        self.results.insert(candidate.into(), result);
        self
    }

    pub fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    /// Candidate texts and timeouts seen so far, in call order.
    pub fn executions(&self) -> Vec<(String, Duration)> {
        self.executions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(
        &self,
        attempt_text: &str,
        _test_text: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        self.executions
            .lock()
            .unwrap()
            .push((attempt_text.to_string(), timeout));
        match self.results.get(attempt_text) {
            Some(result) => result.clone(),
            None => ExecutionResult::new(
                format!("FAILED test_candidate.py::test_behaviour\n{attempt_text}"),
                vec!["test_candidate.py::test_behaviour".to_string()],
                Duration::from_millis(1),
                Vec::new(),
            )
            .at(fixed_instant()),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedClock
// ---------------------------------------------------------------------------

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(fixed_instant())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
