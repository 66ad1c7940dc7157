//! Synthloop Oracle
//!
//! Network-backed implementation of [`synthloop_core::Oracle`] plus the
//! prompt profiles and response clean-up it relies on.

pub mod config;
pub mod extract;
pub mod llm;
pub mod prompt;

pub use config::{Backend, OracleConfig, OracleConfigError};
pub use extract::extract_code_block;
pub use llm::LlmOracle;
pub use prompt::PromptProfile;
