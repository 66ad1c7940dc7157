//! Response clean-up.

/// Strip markdown fences from model output.
///
/// Prefers the first ```` ```python ```` block, then the first fenced block
/// of any language, then the raw text. The result is trimmed.
pub fn extract_code_block(text: &str) -> String {
    if let Some(body) = fenced_after(text, "```python") {
        return body.trim().to_string();
    }
    if let Some(body) = fenced_after(text, "```") {
        // Drop a language tag on the opening fence line.
        let body = match body.split_once('\n') {
            Some((tag, rest)) if is_language_tag(tag) => rest,
            _ => body,
        };
        return body.trim().to_string();
    }
    text.trim().to_string()
}

fn fenced_after<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    Some(match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    })
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_python_block() {
        let text = "Here you go:\n```text\nnot this\n```\n```python\ndef f():\n    return 1\n```\nDone.";
        assert_eq!(extract_code_block(text), "def f():\n    return 1");
    }

    #[test]
    fn falls_back_to_any_fence() {
        let text = "```\nx = 1\n```";
        assert_eq!(extract_code_block(text), "x = 1");
        let tagged = "```py\nx = 2\n```";
        assert_eq!(extract_code_block(tagged), "x = 2");
    }

    #[test]
    fn unterminated_fence_keeps_tail() {
        assert_eq!(extract_code_block("```python\nx = 3\n"), "x = 3");
    }

    #[test]
    fn plain_text_is_trimmed() {
        assert_eq!(extract_code_block("  def g(): pass \n"), "def g(): pass");
    }

    #[test]
    fn single_line_fence_body_is_kept() {
        assert_eq!(extract_code_block("```x = 4```"), "x = 4");
    }
}
