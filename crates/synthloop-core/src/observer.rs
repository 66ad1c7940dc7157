//! Per-iteration events delivered to an explicit observer.
//!
//! Observation is decoupled from control flow: observers see every event but
//! cannot influence the loop.

use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

use crate::obs;
use crate::session::SessionStatus;

/// Lifecycle event of a synthesis session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
        max_iterations: u32,
    },
    TestGenerated {
        session_id: Uuid,
        test_bytes: usize,
    },
    IterationStarted {
        session_id: Uuid,
        iteration: u32,
        max_iterations: u32,
    },
    IterationFinished {
        session_id: Uuid,
        iteration: u32,
        passed: bool,
        duration_ms: u64,
        failed_tests: usize,
    },
    DiagnosisProduced {
        session_id: Uuid,
        iteration: u32,
        diagnosis_bytes: usize,
    },
    Finished {
        session_id: Uuid,
        status: SessionStatus,
        iterations: u32,
        duration_ms: u64,
    },
}

/// Receiver of [`SessionEvent`]s.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started {
                session_id,
                max_iterations,
            } => obs::emit_session_started(session_id, *max_iterations),
            SessionEvent::TestGenerated {
                session_id,
                test_bytes,
            } => obs::emit_test_generated(session_id, *test_bytes),
            SessionEvent::IterationStarted {
                session_id,
                iteration,
                max_iterations,
            } => obs::emit_iteration_started(session_id, *iteration, *max_iterations),
            SessionEvent::IterationFinished {
                session_id,
                iteration,
                passed,
                duration_ms,
                failed_tests,
            } => obs::emit_iteration_finished(
                session_id,
                *iteration,
                *passed,
                *duration_ms,
                *failed_tests,
            ),
            SessionEvent::DiagnosisProduced {
                session_id,
                iteration,
                diagnosis_bytes,
            } => obs::emit_diagnosis_produced(session_id, *iteration, *diagnosis_bytes),
            SessionEvent::Finished {
                session_id,
                status,
                iterations,
                duration_ms,
            } => obs::emit_session_finished(
                session_id,
                &status.to_string(),
                *iterations,
                *duration_ms,
            ),
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// `(iteration, passed)` for every finished iteration.
    pub fn iteration_verdicts(&self) -> Vec<(u32, bool)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::IterationFinished {
                    iteration, passed, ..
                } => Some((iteration, passed)),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fan an event out to several observers.
impl SessionObserver for Vec<std::sync::Arc<dyn SessionObserver>> {
    fn on_event(&self, event: &SessionEvent) {
        for observer in self {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        let id = Uuid::new_v4();
        observer.on_event(&SessionEvent::IterationFinished {
            session_id: id,
            iteration: 1,
            passed: false,
            duration_ms: 10,
            failed_tests: 2,
        });
        observer.on_event(&SessionEvent::IterationFinished {
            session_id: id,
            iteration: 2,
            passed: true,
            duration_ms: 12,
            failed_tests: 0,
        });
        assert_eq!(observer.iteration_verdicts(), vec![(1, false), (2, true)]);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = SessionEvent::TestGenerated {
            session_id: Uuid::nil(),
            test_bytes: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "test_generated");
        assert_eq!(json["test_bytes"], 42);
    }
}
