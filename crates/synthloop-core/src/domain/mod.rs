//! Domain models for synthloop.
//!
//! Canonical definitions for the core entities:
//! - `Specification`: immutable natural-language task description
//! - `GeneratedTest`: the validation suite, generated once per session
//! - `Attempt`: one candidate implementation
//! - `ExecutionResult`: the structured outcome of running an attempt
//! - `SynthesisConfig`: the immutable per-session configuration

pub mod attempt;
pub mod config;
pub mod error;
pub mod result;
pub mod specification;

pub use attempt::Attempt;
pub use config::SynthesisConfig;
pub use error::{ErrorKind, GenerationError, Result, SynthesisError};
pub use result::{ExecutionResult, SandboxFault};
pub use specification::{GeneratedTest, Specification};
