//! Entry-point discovery for successful attempts.
//!
//! A renderer needs to know which declared unit of the candidate to invoke.
//! The first class whose base list names the expected capability wins;
//! otherwise a fixed default name is used.

use std::sync::OnceLock;

use regex::Regex;

/// Name assumed when no declared class matches.
pub const DEFAULT_ENTRY_POINT: &str = "MainScene";

fn class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*class\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\((?P<bases>[^)]*)\)\s*:")
            .expect("valid regex")
    })
}

/// First class in `text` whose bases include `base`, else `default`.
///
/// Bases match on their last path segment, so `manim.Scene` counts as
/// `Scene`.
pub fn discover_entry_point(text: &str, base: &str, default: &str) -> String {
    class_pattern()
        .captures_iter(text)
        .find(|caps| {
            caps["bases"]
                .split(',')
                .map(|b| b.trim())
                .any(|b| b.rsplit('.').next() == Some(base))
        })
        .map(|caps| caps["name"].to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Every class declared in `text`, in order.
pub fn declared_classes(text: &str) -> Vec<String> {
    class_pattern()
        .captures_iter(text)
        .map(|caps| caps["name"].to_string())
        .collect()
}
