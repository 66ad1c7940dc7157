//! Structured observability hooks for the session lifecycle.
//!
//! Events are emitted at `info!` level (per-iteration detail at `debug!`),
//! filterable through `RUST_LOG`.

use tracing::{error, info, warn};
use uuid::Uuid;

/// Span tagging every event of one session with its id.
///
/// Attach it with `tracing::Instrument` so the session future stays `Send`.
pub fn session_span(session_id: &Uuid) -> tracing::Span {
    tracing::info_span!("synthloop.session", session_id = %session_id)
}

pub fn emit_session_started(session_id: &Uuid, max_iterations: u32) {
    info!(event = "session.started", session_id = %session_id, max_iterations);
}

pub fn emit_test_generated(session_id: &Uuid, test_bytes: usize) {
    info!(event = "test.generated", session_id = %session_id, test_bytes);
}

pub fn emit_iteration_started(session_id: &Uuid, iteration: u32, max_iterations: u32) {
    info!(
        event = "iteration.started",
        session_id = %session_id,
        iteration,
        max_iterations,
    );
}

pub fn emit_iteration_finished(
    session_id: &Uuid,
    iteration: u32,
    passed: bool,
    duration_ms: u64,
    failed_tests: usize,
) {
    info!(
        event = "iteration.finished",
        session_id = %session_id,
        iteration,
        passed,
        duration_ms,
        failed_tests,
    );
}

pub fn emit_diagnosis_produced(session_id: &Uuid, iteration: u32, diagnosis_bytes: usize) {
    info!(
        event = "diagnosis.produced",
        session_id = %session_id,
        iteration,
        diagnosis_bytes,
    );
}

pub fn emit_session_finished(session_id: &Uuid, status: &str, iterations: u32, duration_ms: u64) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        status = %status,
        iterations,
        duration_ms,
    );
}

/// Error-level: the session could not start, so no iteration ran.
pub fn emit_session_start_failed(session_id: &Uuid, error: &dyn std::fmt::Display) {
    error!(event = "session.start_failed", session_id = %session_id, error = %error);
}

/// Warn-level: an advisory step failed and was swallowed.
pub fn emit_advisory_failure(session_id: &Uuid, step: &str, error: &dyn std::fmt::Display) {
    warn!(event = "advisory.failed", session_id = %session_id, step = %step, error = %error);
}
