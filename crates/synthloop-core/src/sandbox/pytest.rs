//! Per-test verdict parsing for verbose pytest output.

use std::sync::OnceLock;

use regex::Regex;

/// Verdicts and annotations extracted from one pytest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PytestReport {
    /// Node ids that passed, in report order.
    pub passed_ids: Vec<String>,
    /// Node ids that failed or errored, in report order, without duplicates.
    pub failed_ids: Vec<String>,
    /// `E` lines that mention a configured domain keyword.
    pub domain_errors: Vec<String>,
}

fn verdict_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<id>\S+::.+?)\s+(?P<verdict>PASSED|FAILED|ERROR|XPASS|XFAIL|SKIPPED)(?:\s|$)",
        )
        .expect("valid regex")
    })
}

fn summary_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:FAILED|ERROR) (?P<id>.+?)(?: - .*)?$").expect("valid regex")
    })
}

fn push_unique(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

/// Parse `pytest -v -rfE` output.
///
/// Failure ids come from the verbose verdict lines and from the short test
/// summary, so collection errors (which never get a verdict line) still
/// produce an id.
pub fn parse_report(output: &str, domain_keywords: &[String]) -> PytestReport {
    let mut report = PytestReport::default();

    for line in output.lines() {
        if let Some(caps) = verdict_line().captures(line) {
            let id = &caps["id"];
            match &caps["verdict"] {
                "PASSED" | "XFAIL" | "XPASS" | "SKIPPED" => push_unique(&mut report.passed_ids, id),
                _ => push_unique(&mut report.failed_ids, id),
            }
            continue;
        }

        if let Some(caps) = summary_line().captures(line) {
            push_unique(&mut report.failed_ids, &caps["id"]);
            continue;
        }

        if let Some(detail) = line.strip_prefix('E') {
            if detail.starts_with(char::is_whitespace)
                && domain_keywords.iter().any(|k| detail.contains(k.as_str()))
            {
                push_unique(&mut report.domain_errors, detail.trim());
            }
        }
    }

    report.passed_ids.retain(|id| !report.failed_ids.contains(id));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "\
============================= test session starts ==============================
collected 3 items

test_candidate.py::test_basic PASSED                                     [ 33%]
test_candidate.py::test_empty FAILED                                     [ 66%]
test_candidate.py::test_param[a b] PASSED                                [100%]

=================================== FAILURES ===================================
__________________________________ test_empty __________________________________
    def test_empty():
>       assert has_duplicates('') is False
E       AssertionError: assert None is False
=========================== short test summary info ============================
FAILED test_candidate.py::test_empty - AssertionError: assert None is False
========================= 1 failed, 2 passed in 0.02s ==========================
";

    #[test]
    fn failed_ids_are_deduplicated_across_sections() {
        let report = parse_report(MIXED, &[]);
        assert_eq!(report.failed_ids, vec!["test_candidate.py::test_empty"]);
        assert_eq!(report.passed_ids[0], "test_candidate.py::test_basic");
        assert!(report.domain_errors.is_empty());
    }

    #[test]
    fn parametrized_ids_keep_their_spaces() {
        let report = parse_report(MIXED, &[]);
        assert_eq!(
            report.passed_ids,
            vec!["test_candidate.py::test_basic", "test_candidate.py::test_param[a b]"]
        );

        let output = "\
test_candidate.py::test_split[a b] FAILED                                [100%]
=========================== short test summary info ============================
FAILED test_candidate.py::test_split[a b] - assert ['a b'] == ['a', 'b']
";
        let report = parse_report(output, &[]);
        assert_eq!(report.failed_ids, vec!["test_candidate.py::test_split[a b]"]);
    }

    #[test]
    fn collection_error_yields_module_id() {
        let output = "\
collected 0 items / 1 error

==================================== ERRORS ====================================
______________________ ERROR collecting test_candidate.py ______________________
E   NameError: name 'Circle' is not defined
=========================== short test summary info ============================
ERROR test_candidate.py - NameError: name 'Circle' is not defined
!!!!!!!!!!!!!!!!!!!! Interrupted: 1 error during collection !!!!!!!!!!!!!!!!!!!!
";
        let report = parse_report(output, &[]);
        assert_eq!(report.failed_ids, vec!["test_candidate.py"]);
    }

    #[test]
    fn domain_keywords_select_error_lines() {
        let output = "\
test_candidate.py::test_scene FAILED
E       AttributeError: 'VMobject' object has no attribute 'radius'
E       assert 1 == 2
";
        let keywords = vec!["VMobject".to_string(), "Camera".to_string()];
        let report = parse_report(output, &keywords);
        assert_eq!(
            report.domain_errors,
            vec!["AttributeError: 'VMobject' object has no attribute 'radius'"]
        );
    }

    #[test]
    fn setup_error_after_pass_counts_as_failure() {
        let output = "\
test_candidate.py::test_a PASSED
test_candidate.py::test_a ERROR
";
        let report = parse_report(output, &[]);
        assert_eq!(report.failed_ids, vec!["test_candidate.py::test_a"]);
        assert!(report.passed_ids.is_empty());
    }
}
