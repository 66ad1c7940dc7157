//! Immutable per-session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::SynthesisError;

/// Configuration for one synthesis session.
///
/// Constructed once by the caller and passed into the session; the loop
/// never consults ambient process state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Maximum number of generate-and-execute iterations.
    pub max_iterations: u32,
    /// Wall-clock budget for a single sandbox execution (milliseconds).
    pub sandbox_timeout_ms: u64,
    /// Ask the oracle to diagnose each failing result.
    #[serde(default = "default_analyze_failures")]
    pub analyze_failures: bool,
}

fn default_analyze_failures() -> bool {
    true
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            sandbox_timeout_ms: 60_000,
            analyze_failures: true,
        }
    }
}

impl SynthesisConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_sandbox_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_failure_analysis(mut self, enabled: bool) -> Self {
        self.analyze_failures = enabled;
        self
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms)
    }

    /// Reject configurations that could never run an iteration.
    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.max_iterations == 0 {
            return Err(SynthesisError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.sandbox_timeout_ms == 0 {
            return Err(SynthesisError::InvalidConfig(
                "sandbox_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
