//! Candidate implementations produced by the oracle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One candidate implementation, tagged with its 1-based iteration index.
///
/// Fields are private: an attempt is never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    iteration: u32,
    text: String,
    created_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(iteration: u32, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            iteration,
            text: text.into(),
            created_at,
        }
    }

    /// 1-based iteration index.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
