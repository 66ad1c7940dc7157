//! Synthesis session: the bounded generate-execute-record loop.
//!
//! A session owns its specification, generated test, ledger and iteration
//! counter exclusively. Each iteration depends on the full result of the
//! previous one, so the loop is strictly sequential; independent sessions
//! share no mutable state and may run concurrently.
//!
//! Loop, per iteration:
//! 1. stop on budget exhaustion or cancellation
//! 2. render the ledger into the iteration context
//! 3. ask the oracle for an attempt (a failure here ends the session)
//! 4. execute it in the sandbox (faults come back as data)
//! 5. append `(attempt, result)` to the ledger, unconditionally
//! 6. stop with success on a pass, with no further oracle calls
//! 7. otherwise optionally collect an advisory diagnosis
//! 8. advance the counter

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::analyzer::FailureAnalyzer;
use crate::clock::{Clock, SystemClock};
use crate::domain::{
    Attempt, ErrorKind, GeneratedTest, Specification, SynthesisConfig, SynthesisError,
};
use crate::ledger::{build_context, HistoryLedger};
use crate::metrics::METRICS;
use crate::obs;
use crate::observer::{SessionEvent, SessionObserver, TracingObserver};
use crate::oracle::Oracle;
use crate::sandbox::Sandbox;

/// Terminal status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Succeeded,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Succeeded => write!(f, "succeeded"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Cooperative cancellation, checked between iterations.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// External capabilities a session drives.
#[derive(Clone)]
pub struct Collaborators {
    oracle: Arc<dyn Oracle>,
    sandbox: Arc<dyn Sandbox>,
    observer: Arc<dyn SessionObserver>,
    clock: Arc<dyn Clock>,
    cancel: CancelFlag,
}

impl Collaborators {
    /// Oracle and sandbox are required; observer, clock and cancel flag
    /// default to tracing, wall-clock time and a fresh flag.
    pub fn new(oracle: Arc<dyn Oracle>, sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            oracle,
            sandbox,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A passing implementation together with the suite it passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisSuccess {
    pub implementation: Attempt,
    pub test: GeneratedTest,
    /// 1-based iteration at which the pass was observed.
    pub iteration_count: u32,
}

impl SynthesisSuccess {
    pub fn implementation_text(&self) -> &str {
        self.implementation.text()
    }

    pub fn test_text(&self) -> &str {
        self.test.text()
    }
}

/// Classified failure, as persisted in a [`SessionReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SynthesisError> for FailureSummary {
    fn from(err: &SynthesisError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything a session produced, success or not. Nothing is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub specification: Specification,
    /// Absent only when test generation itself failed.
    pub test: Option<GeneratedTest>,
    pub config: SynthesisConfig,
    pub status: SessionStatus,
    pub failure: Option<FailureSummary>,
    pub ledger: HistoryLedger,
    /// Advisory diagnoses keyed by the iteration they explain.
    #[serde(default)]
    pub diagnoses: BTreeMap<u32, String>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn iterations(&self) -> u32 {
        u32::try_from(self.ledger.len()).unwrap_or(u32::MAX)
    }
}

/// Return value of [`Session::run`] and [`synthesize`].
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub result: Result<SynthesisSuccess, SynthesisError>,
    pub report: SessionReport,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.report.ledger
    }
}

/// One bounded run of the synthesis loop for a single specification.
pub struct Session {
    id: Uuid,
    specification: Specification,
    test: GeneratedTest,
    config: SynthesisConfig,
    ledger: HistoryLedger,
    diagnoses: BTreeMap<u32, String>,
    current_iteration: u32,
    status: SessionStatus,
    analyzer: Option<FailureAnalyzer>,
    collaborators: Collaborators,
    started: Instant,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("current_iteration", &self.current_iteration)
            .field("max_iterations", &self.config.max_iterations)
            .field("ledger_len", &self.ledger.len())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session and generate its test suite.
    ///
    /// Fails with [`SynthesisError::TestGeneration`] when the oracle cannot
    /// produce the suite; no attempt is ever made in that case.
    pub async fn start(
        specification: Specification,
        config: SynthesisConfig,
        collaborators: Collaborators,
    ) -> Result<Self, SynthesisError> {
        Self::start_with_id(Uuid::new_v4(), specification, config, collaborators).await
    }

    /// [`Session::start`] with a caller-chosen session id.
    pub async fn start_with_id(
        id: Uuid,
        specification: Specification,
        config: SynthesisConfig,
        collaborators: Collaborators,
    ) -> Result<Self, SynthesisError> {
        config.validate()?;
        METRICS.inc_sessions_started();

        let observer = collaborators.observer.clone();
        observer.on_event(&SessionEvent::Started {
            session_id: id,
            max_iterations: config.max_iterations,
        });

        let test_text = collaborators
            .oracle
            .produce_test(&specification)
            .instrument(obs::session_span(&id))
            .await
            .map_err(SynthesisError::TestGeneration)?;
        let test = GeneratedTest::new(test_text);
        observer.on_event(&SessionEvent::TestGenerated {
            session_id: id,
            test_bytes: test.text().len(),
        });

        let analyzer = config
            .analyze_failures
            .then(|| FailureAnalyzer::new(collaborators.oracle.clone()));

        Ok(Self {
            id,
            specification,
            test,
            config,
            ledger: HistoryLedger::new(),
            diagnoses: BTreeMap::new(),
            current_iteration: 0,
            status: SessionStatus::Pending,
            analyzer,
            collaborators,
            started: Instant::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn specification(&self) -> &Specification {
        &self.specification
    }

    pub fn test(&self) -> &GeneratedTest {
        &self.test
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Run the loop to a terminal status. Consumes the session, so it can
    /// only ever run once.
    pub async fn run(mut self) -> SessionOutcome {
        let span = obs::session_span(&self.id);
        let result = self.drive().instrument(span).await;

        self.status = match result {
            Ok(_) => SessionStatus::Succeeded,
            Err(_) => SessionStatus::Failed,
        };
        self.collaborators.observer.on_event(&SessionEvent::Finished {
            session_id: self.id,
            status: self.status,
            iterations: u32::try_from(self.ledger.len()).unwrap_or(u32::MAX),
            duration_ms: elapsed_ms(self.started),
        });
        METRICS.flush();

        let report = SessionReport {
            session_id: self.id,
            specification: self.specification,
            test: Some(self.test),
            config: self.config,
            status: self.status,
            failure: result.as_ref().err().map(FailureSummary::from),
            ledger: self.ledger,
            diagnoses: self.diagnoses,
            finished_at: Utc::now(),
        };
        SessionOutcome { result, report }
    }

    async fn drive(&mut self) -> Result<SynthesisSuccess, SynthesisError> {
        let oracle = self.collaborators.oracle.clone();
        let sandbox = self.collaborators.sandbox.clone();
        let observer = self.collaborators.observer.clone();
        let timeout = self.config.sandbox_timeout();

        loop {
            if self.current_iteration >= self.config.max_iterations {
                return Err(SynthesisError::MaxIterationsExceeded {
                    max_iterations: self.config.max_iterations,
                });
            }
            if self.collaborators.cancel.is_cancelled() {
                return Err(SynthesisError::Cancelled {
                    completed: self.current_iteration,
                });
            }

            let iteration = self.current_iteration + 1;
            observer.on_event(&SessionEvent::IterationStarted {
                session_id: self.id,
                iteration,
                max_iterations: self.config.max_iterations,
            });

            let context = build_context(&self.ledger, &self.diagnoses);
            let text = oracle
                .produce_implementation(&self.specification, self.test.text(), &context)
                .await
                .map_err(|source| SynthesisError::ImplementationGeneration { iteration, source })?;
            let attempt = Attempt::new(iteration, text, self.collaborators.clock.now());

            let result = sandbox
                .execute(attempt.text(), self.test.text(), timeout)
                .await;
            METRICS.inc_iterations();
            let passed = result.passed();
            observer.on_event(&SessionEvent::IterationFinished {
                session_id: self.id,
                iteration,
                passed,
                duration_ms: u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX),
                failed_tests: result.failed_test_ids().len(),
            });

            let winner = passed.then(|| attempt.clone());
            self.ledger.append(attempt, result);

            if let Some(implementation) = winner {
                return Ok(SynthesisSuccess {
                    implementation,
                    test: self.test.clone(),
                    iteration_count: iteration,
                });
            }

            if let Some(diagnosis) = self.diagnose_last().await {
                observer.on_event(&SessionEvent::DiagnosisProduced {
                    session_id: self.id,
                    iteration,
                    diagnosis_bytes: diagnosis.len(),
                });
                self.diagnoses.insert(iteration, diagnosis);
            }

            self.current_iteration += 1;
        }
    }

    async fn diagnose_last(&self) -> Option<String> {
        let analyzer = self.analyzer.as_ref()?;
        let entry = self.ledger.last()?;
        analyzer.diagnose(&entry.result).await
    }
}

/// Run one complete session: generate the suite, then loop to a terminal
/// status.
///
/// Never panics or returns early on oracle failure: a failed test generation
/// comes back as a failed outcome with an empty ledger.
pub async fn synthesize(
    specification: Specification,
    config: SynthesisConfig,
    collaborators: Collaborators,
) -> SessionOutcome {
    let id = Uuid::new_v4();
    let observer = collaborators.observer.clone();
    let started = Instant::now();

    match Session::start_with_id(id, specification.clone(), config.clone(), collaborators).await {
        Ok(session) => session.run().await,
        Err(error) => {
            obs::emit_session_start_failed(&id, &error);
            observer.on_event(&SessionEvent::Finished {
                session_id: id,
                status: SessionStatus::Failed,
                iterations: 0,
                duration_ms: elapsed_ms(started),
            });
            let report = SessionReport {
                session_id: id,
                specification,
                test: None,
                config,
                status: SessionStatus::Failed,
                failure: Some(FailureSummary::from(&error)),
                ledger: HistoryLedger::new(),
                diagnoses: BTreeMap::new(),
                finished_at: Utc::now(),
            };
            SessionOutcome {
                result: Err(error),
                report,
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
