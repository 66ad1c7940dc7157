//! Error taxonomy for synthesis sessions.

use serde::{Deserialize, Serialize};

/// Closed classification of everything that can go wrong around a session.
///
/// Callers branch on this instead of parsing error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The oracle could not produce text.
    Generation,
    /// The candidate misbehaved inside the sandbox. Only ever seen as data.
    SandboxFault,
    /// The iteration budget ran out without a passing attempt.
    MaxIterationsExceeded,
    /// The external renderer failed on a successful attempt.
    Render,
    /// The session was cancelled between iterations.
    Cancelled,
    /// The session configuration was rejected before any oracle call.
    InvalidConfig,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Generation => "generation_error",
            ErrorKind::SandboxFault => "sandbox_fault",
            ErrorKind::MaxIterationsExceeded => "max_iterations_exceeded",
            ErrorKind::Render => "render_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidConfig => "invalid_config",
        };
        f.write_str(s)
    }
}

/// Failure of the generative oracle (network, auth, quota, bad payload).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle rejected credentials: {0}")]
    Auth(String),

    #[error("oracle quota exhausted: {0}")]
    Quota(String),

    #[error("oracle returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("oracle does not support {0}")]
    Unsupported(&'static str),
}

/// Terminal failures of a synthesis session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("test generation failed: {0}")]
    TestGeneration(#[source] GenerationError),

    #[error("implementation generation failed at iteration {iteration}: {source}")]
    ImplementationGeneration {
        iteration: u32,
        #[source]
        source: GenerationError,
    },

    #[error("no passing implementation within {max_iterations} iteration(s)")]
    MaxIterationsExceeded { max_iterations: u32 },

    #[error("session cancelled after {completed} completed iteration(s)")]
    Cancelled { completed: u32 },

    #[error("invalid synthesis config: {0}")]
    InvalidConfig(String),
}

impl SynthesisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SynthesisError::TestGeneration(_)
            | SynthesisError::ImplementationGeneration { .. } => ErrorKind::Generation,
            SynthesisError::MaxIterationsExceeded { .. } => ErrorKind::MaxIterationsExceeded,
            SynthesisError::Cancelled { .. } => ErrorKind::Cancelled,
            SynthesisError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// The underlying oracle failure, for generation errors.
    pub fn generation_error(&self) -> Option<&GenerationError> {
        match self {
            SynthesisError::TestGeneration(source)
            | SynthesisError::ImplementationGeneration { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_errors_share_a_kind() {
        let test = SynthesisError::TestGeneration(GenerationError::Quota("429".into()));
        let implementation = SynthesisError::ImplementationGeneration {
            iteration: 2,
            source: GenerationError::Request("connection reset".into()),
        };
        assert_eq!(test.kind(), ErrorKind::Generation);
        assert_eq!(implementation.kind(), ErrorKind::Generation);
        assert!(implementation.to_string().contains("iteration 2"));
        assert!(implementation.to_string().contains("connection reset"));
    }

    #[test]
    fn max_iterations_display() {
        let err = SynthesisError::MaxIterationsExceeded { max_iterations: 4 };
        assert_eq!(err.kind(), ErrorKind::MaxIterationsExceeded);
        assert!(err.to_string().contains("4 iteration(s)"));
        assert!(err.generation_error().is_none());
    }

    #[test]
    fn error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::Generation.to_string(), "generation_error");
        assert_eq!(
            ErrorKind::MaxIterationsExceeded.to_string(),
            "max_iterations_exceeded"
        );
    }
}
