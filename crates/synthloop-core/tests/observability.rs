//! Structured tracing output of the session lifecycle.

use std::sync::Arc;

use synthloop_core::fakes::{FixedClock, ScriptedOracle, ScriptedSandbox};
use synthloop_core::obs::{
    emit_advisory_failure, emit_iteration_finished, emit_session_finished, emit_session_started,
    session_span,
};
use synthloop_core::{synthesize, Collaborators, GenerationError, Specification, SynthesisConfig};
use tracing_test::traced_test;
use uuid::Uuid;

#[traced_test]
#[test]
fn test_emit_session_started_logs_budget() {
    let id = Uuid::new_v4();
    emit_session_started(&id, 7);

    assert!(logs_contain("session.started"));
    assert!(logs_contain("max_iterations=7"));
}

#[traced_test]
#[test]
fn test_emit_iteration_finished_logs_verdict() {
    emit_iteration_finished(&Uuid::new_v4(), 2, false, 140, 3);

    assert!(logs_contain("iteration.finished"));
    assert!(logs_contain("passed=false"));
    assert!(logs_contain("failed_tests=3"));
}

#[traced_test]
#[test]
fn test_emit_advisory_failure_logs_warning() {
    emit_advisory_failure(&Uuid::new_v4(), "failure_analysis", &"oracle overloaded");

    assert!(logs_contain("WARN"));
    assert!(logs_contain("oracle overloaded"));
}

#[traced_test]
#[test]
fn test_session_span_tags_events() {
    let id = Uuid::new_v4();
    let span = session_span(&id);
    let _guard = span.enter();
    emit_session_finished(&id, "succeeded", 1, 5);

    assert!(logs_contain("synthloop.session"));
    assert!(logs_contain(&id.to_string()));
}

#[traced_test]
#[tokio::test]
async fn test_session_emits_lifecycle_events() {
    let right = "def add(a, b):\n    return a + b\n";
    let oracle = Arc::new(
        ScriptedOracle::new("def test_add():\n    assert add(1, 2) == 3\n")
            .with_implementation_texts(["def add(a, b):\n    return 0\n", right]),
    );
    let sandbox = Arc::new(ScriptedSandbox::new().passing(right));
    let collab = Collaborators::new(oracle, sandbox).with_clock(Arc::new(FixedClock::default()));

    let outcome = synthesize(Specification::new("add"), SynthesisConfig::default(), collab).await;
    assert!(outcome.is_success());

    for event in [
        "session.started",
        "test.generated",
        "iteration.started",
        "iteration.finished",
        "session.finished",
    ] {
        assert!(logs_contain(event), "missing {event}");
    }
    assert!(logs_contain("status=succeeded"));
}

#[traced_test]
#[tokio::test]
async fn test_start_failure_is_not_logged_as_advisory() {
    let oracle = Arc::new(ScriptedOracle::failing_test(GenerationError::Quota(
        "rate limited".into(),
    )));
    let sandbox = Arc::new(ScriptedSandbox::new());
    let collab = Collaborators::new(oracle, sandbox);

    let outcome = synthesize(Specification::new("add"), SynthesisConfig::default(), collab).await;
    assert!(!outcome.is_success());

    assert!(logs_contain("session.start_failed"));
    assert!(logs_contain("ERROR"));
    assert!(!logs_contain("advisory.failed"));
    assert!(logs_contain("status=failed"));
}
