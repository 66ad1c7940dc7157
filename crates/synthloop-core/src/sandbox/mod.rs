//! Sandbox: isolated execution of a candidate against the generated suite.
//!
//! Every call stages both texts into a fresh, private working directory and
//! runs them in a separate interpreter process with a scrubbed environment.
//! Faults inside the sandbox (parse errors, crashes, timeouts) come back as
//! non-passing [`ExecutionResult`]s, never as errors.
//!
//! # Modules
//!
//! - [`config`]: `SandboxConfig` (interpreter, preambles, domain keywords)
//! - [`staging`]: `StagingArea`, the scoped per-call working directory
//! - [`pytest`]: per-test verdict parsing of pytest output
//! - [`python`]: `PythonSandbox`, the subprocess-backed implementation

pub mod config;
pub mod pytest;
pub mod python;
pub mod staging;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ExecutionResult;

pub use config::SandboxConfig;
pub use pytest::{parse_report, PytestReport};
pub use python::PythonSandbox;
pub use staging::StagingArea;

/// Isolated execution boundary for untrusted candidate code.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `test_text` against `attempt_text` within `timeout`.
    ///
    /// Infallible by contract: every fault is folded into the result.
    async fn execute(
        &self,
        attempt_text: &str,
        test_text: &str,
        timeout: Duration,
    ) -> ExecutionResult;
}
