//! Generative oracle capability.
//!
//! The driver depends only on this trait; network backends live in
//! `synthloop-oracle`, deterministic stubs in [`crate::fakes`].

use async_trait::async_trait;

use crate::domain::{ExecutionResult, GenerationError, Specification};

/// Text-generation capability supplying tests, implementations and diagnoses.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate the validation suite for a specification.
    async fn produce_test(&self, specification: &Specification) -> Result<String, GenerationError>;

    /// Generate a candidate implementation.
    ///
    /// `context` is the rendered ledger (see [`crate::ledger::build_context`]).
    async fn produce_implementation(
        &self,
        specification: &Specification,
        test_text: &str,
        context: &str,
    ) -> Result<String, GenerationError>;

    /// Diagnose a failing result. Best effort; backends without the
    /// capability keep the default.
    async fn produce_diagnosis(
        &self,
        _result: &ExecutionResult,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Unsupported("failure diagnosis"))
    }
}
