//! Session inputs: the task specification and the generated test suite.

use serde::{Deserialize, Serialize};

/// Natural-language task description driving a session.
///
/// Constructed once at session start and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specification(String);

impl Specification {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the description carries no content.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Specification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text of the validation suite generated for a session.
///
/// Exactly one exists per session and it is never regenerated, however many
/// attempts fail against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedTest(String);

impl GeneratedTest {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specification_serializes_as_plain_string() {
        let spec = Specification::new("reverse a string");
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"reverse a string\"");
    }

    #[test]
    fn blank_specification_is_detected() {
        assert!(Specification::new("  \n").is_blank());
        assert!(!Specification::new("sum a list").is_blank());
    }
}
