//! Append-only history of every (attempt, result) pair in a session.
//!
//! The ledger is read context for the next generation prompt; entries are
//! never replayed or re-executed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Attempt, ExecutionResult};

/// Context handed to the oracle before any attempt exists.
pub const FIRST_ATTEMPT_CONTEXT: &str = "This is the first attempt.";

/// One completed iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub attempt: Attempt,
    pub result: ExecutionResult,
}

/// Ordered record of completed iterations.
///
/// There is no removal or mutation API: the length always equals the number
/// of iterations actually executed, in iteration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLedger {
    entries: Vec<LedgerEntry>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed iteration.
    pub fn append(&mut self, attempt: Attempt, result: ExecutionResult) {
        tracing::debug!(
            iteration = attempt.iteration(),
            passed = result.passed(),
            seq = self.entries.len() + 1,
            "ledger entry appended"
        );
        self.entries.push(LedgerEntry { attempt, result });
    }

    /// All entries, in insertion (= iteration) order.
    pub fn context_view(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LedgerEntry> {
        self.entries.iter()
    }

    /// Number of entries whose result did not pass.
    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.result.passed()).count()
    }
}

impl<'a> IntoIterator for &'a HistoryLedger {
    type Item = &'a LedgerEntry;
    type IntoIter = std::slice::Iter<'a, LedgerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Render the iteration context for the next generation prompt.
///
/// Every prior attempt contributes its implementation, raw output and failed
/// test ids, followed by its domain errors and advisory diagnosis when
/// present. An empty ledger yields [`FIRST_ATTEMPT_CONTEXT`].
pub fn build_context(ledger: &HistoryLedger, diagnoses: &BTreeMap<u32, String>) -> String {
    if ledger.is_empty() {
        return FIRST_ATTEMPT_CONTEXT.to_string();
    }

    let mut context = String::from("Previous attempts and their results:\n\n");
    for entry in ledger {
        let iteration = entry.attempt.iteration();
        context.push_str(&format!("Attempt {iteration}:\n"));
        context.push_str(&format!("Implementation:\n{}\n", entry.attempt.text()));
        context.push_str(&format!("Test Results:\n{}\n", entry.result.raw_output()));
        context.push_str(&format!(
            "Failed Tests:\n{}\n",
            entry.result.failed_test_ids().join(", ")
        ));
        if !entry.result.domain_errors().is_empty() {
            context.push_str(&format!(
                "Domain Errors:\n{}\n",
                entry.result.domain_errors().join(", ")
            ));
        }
        if let Some(diagnosis) = diagnoses.get(&iteration) {
            context.push_str(&format!("Failure Analysis:\n{diagnosis}\n"));
        }
        context.push_str("---\n");
    }
    context
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn attempt(iteration: u32, text: &str) -> Attempt {
        Attempt::new(
            iteration,
            text,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    fn failing(output: &str, ids: &[&str]) -> ExecutionResult {
        ExecutionResult::new(
            output,
            ids.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(5),
            Vec::new(),
        )
    }

    #[test]
    fn empty_ledger_yields_first_attempt_marker() {
        let ledger = HistoryLedger::new();
        assert_eq!(build_context(&ledger, &BTreeMap::new()), FIRST_ATTEMPT_CONTEXT);
    }

    #[test]
    fn context_view_preserves_insertion_order() {
        let mut ledger = HistoryLedger::new();
        ledger.append(attempt(1, "a"), failing("boom", &["t.py::x"]));
        ledger.append(attempt(2, "b"), failing("bang", &["t.py::y"]));
        ledger.append(attempt(3, "c"), ExecutionResult::passing("ok", Duration::ZERO));

        let iterations: Vec<u32> = ledger
            .context_view()
            .iter()
            .map(|e| e.attempt.iteration())
            .collect();
        assert_eq!(iterations, vec![1, 2, 3]);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.failed_count(), 2);
        assert!(ledger.last().unwrap().result.passed());
    }

    #[test]
    fn context_includes_every_prior_triple_in_order() {
        let mut ledger = HistoryLedger::new();
        ledger.append(attempt(1, "def f(): return 1"), failing("assert 1 == 2", &["t.py::test_f"]));
        ledger.append(attempt(2, "def f(): return 3"), failing("assert 3 == 2", &["t.py::test_g"]));

        let context = build_context(&ledger, &BTreeMap::new());
        assert!(context.starts_with("Previous attempts and their results:"));
        let first = context.find("def f(): return 1").unwrap();
        let second = context.find("def f(): return 3").unwrap();
        assert!(first < second);
        assert!(context.contains("assert 1 == 2"));
        assert!(context.contains("t.py::test_g"));
        assert_eq!(context.matches("---\n").count(), 2);
        assert!(!context.contains("Failure Analysis"));
    }

    #[test]
    fn context_folds_in_domain_errors_and_diagnoses() {
        let mut ledger = HistoryLedger::new();
        let result = ExecutionResult::new(
            "E   TypeError: Scene.play() missing animation",
            vec!["t.py::test_scene".into()],
            Duration::ZERO,
            vec!["TypeError: Scene.play() missing animation".into()],
        );
        ledger.append(attempt(1, "class A(Scene): pass"), result);

        let mut diagnoses = BTreeMap::new();
        diagnoses.insert(1, "call self.play with an animation".to_string());

        let context = build_context(&ledger, &diagnoses);
        assert!(context.contains("Domain Errors:\nTypeError: Scene.play()"));
        assert!(context.contains("Failure Analysis:\ncall self.play with an animation"));
    }
}
