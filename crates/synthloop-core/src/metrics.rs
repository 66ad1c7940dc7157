//! Global atomic counters for synthloop observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a session finishes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters. No allocations, no locking.
pub struct Metrics {
    sessions_started: AtomicU64,
    iterations_executed: AtomicU64,
    sandbox_timeouts: AtomicU64,
    syntax_rejections: AtomicU64,
    analyzer_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            iterations_executed: AtomicU64::new(0),
            sandbox_timeouts: AtomicU64::new(0),
            syntax_rejections: AtomicU64::new(0),
            analyzer_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_sessions_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_started", "counter incremented");
    }

    pub fn inc_iterations(&self) {
        self.iterations_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "iterations_executed", "counter incremented");
    }

    pub fn inc_sandbox_timeouts(&self) {
        self.sandbox_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sandbox_timeouts", "counter incremented");
    }

    pub fn inc_syntax_rejections(&self) {
        self.syntax_rejections.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "syntax_rejections", "counter incremented");
    }

    pub fn inc_analyzer_failures(&self) {
        self.analyzer_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "analyzer_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sessions_started = self.sessions_started(),
            iterations_executed = self.iterations_executed(),
            sandbox_timeouts = self.sandbox_timeouts(),
            syntax_rejections = self.syntax_rejections(),
            analyzer_failures = self.analyzer_failures(),
        );
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }

    pub fn iterations_executed(&self) -> u64 {
        self.iterations_executed.load(Ordering::Relaxed)
    }

    pub fn sandbox_timeouts(&self) -> u64 {
        self.sandbox_timeouts.load(Ordering::Relaxed)
    }

    pub fn syntax_rejections(&self) -> u64 {
        self.syntax_rejections.load(Ordering::Relaxed)
    }

    pub fn analyzer_failures(&self) -> u64 {
        self.analyzer_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.sessions_started.store(0, Ordering::Relaxed);
        self.iterations_executed.store(0, Ordering::Relaxed);
        self.sandbox_timeouts.store(0, Ordering::Relaxed);
        self.syntax_rejections.store(0, Ordering::Relaxed);
        self.analyzer_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.iterations_executed(), 0);
        m.inc_iterations();
        m.inc_iterations();
        assert_eq!(m.iterations_executed(), 2);

        m.inc_sessions_started();
        assert_eq!(m.sessions_started(), 1);

        m.inc_sandbox_timeouts();
        m.inc_syntax_rejections();
        m.inc_analyzer_failures();
        assert_eq!(m.sandbox_timeouts(), 1);
        assert_eq!(m.syntax_rejections(), 1);
        assert_eq!(m.analyzer_failures(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_sessions_started();
        m.inc_iterations();
        m.inc_sandbox_timeouts();
        m.reset();
        assert_eq!(m.sessions_started(), 0);
        assert_eq!(m.iterations_executed(), 0);
        assert_eq!(m.sandbox_timeouts(), 0);
    }
}
