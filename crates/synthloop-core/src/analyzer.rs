//! Advisory failure analysis.
//!
//! Turns a failing [`ExecutionResult`] into free-text guidance for the next
//! generation prompt. Purely advisory: nothing here can fail or block a
//! session.

use std::sync::Arc;

use tracing::warn;

use crate::domain::{ExecutionResult, GenerationError};
use crate::metrics::METRICS;
use crate::oracle::Oracle;

/// Asks the oracle to diagnose failing results.
#[derive(Clone)]
pub struct FailureAnalyzer {
    oracle: Arc<dyn Oracle>,
}

impl std::fmt::Debug for FailureAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureAnalyzer").finish_non_exhaustive()
    }
}

impl FailureAnalyzer {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Diagnosis text, or an explanatory placeholder when none could be made.
    pub async fn analyze(&self, result: &ExecutionResult) -> String {
        match self.try_analyze(result).await {
            Ok(text) => text,
            Err(err) => placeholder(&err),
        }
    }

    /// Diagnosis text, or `None` when the oracle could not produce one.
    /// The failure is logged and counted, never propagated.
    pub async fn diagnose(&self, result: &ExecutionResult) -> Option<String> {
        match self.try_analyze(result).await {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(error = %err, "failure analysis unavailable");
                None
            }
        }
    }

    async fn try_analyze(&self, result: &ExecutionResult) -> Result<String, GenerationError> {
        if result.passed() {
            return Err(GenerationError::InvalidResponse(
                "nothing to analyze: the execution passed".to_string(),
            ));
        }
        let outcome = match self.oracle.produce_diagnosis(result).await {
            Ok(text) if text.trim().is_empty() => Err(GenerationError::InvalidResponse(
                "empty diagnosis".to_string(),
            )),
            Ok(text) => Ok(text.trim().to_string()),
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            METRICS.inc_analyzer_failures();
        }
        outcome
    }
}

fn placeholder(err: &GenerationError) -> String {
    format!("Failed to analyze test failures: {err}")
}
