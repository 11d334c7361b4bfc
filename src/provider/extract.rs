// src/provider/extract.rs - Split a model response into code and explanation

use std::sync::LazyLock;

use regex::Regex;

// Literal patterns, exercised by the tests below.
#[allow(clippy::unwrap_used)]
static FIXED_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)FIXED CODE:?\s*```[\w+#-]*[ \t]*\r?\n(.*?)```").unwrap());

#[allow(clippy::unwrap_used)]
static ANY_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+#-]*[ \t]*\r?\n(.*?)```").unwrap());

#[allow(clippy::unwrap_used)]
static EXPLANATION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t#*]*EXPLANATION:?[ \t*]*").unwrap());

/// Extract `(code, explanation)` from a response shaped like
///
/// ````text
/// FIXED CODE:
/// ```java
/// ...
/// ```
/// EXPLANATION:
/// ...
/// ````
///
/// Falls back to the first fenced block, and to the text after the code
/// (or the whole response) when there is no explanation header.
pub fn extract_code_and_explanation(response: &str) -> (String, String) {
    let code_match = FIXED_CODE_BLOCK
        .captures(response)
        .or_else(|| ANY_CODE_BLOCK.captures(response));

    let code = code_match
        .as_ref()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let explanation = match EXPLANATION_HEADER.find(response) {
        Some(m) => response[m.end()..].trim().to_string(),
        None => match code_match.as_ref().and_then(|c| c.get(0)) {
            Some(whole) => response[whole.end()..].trim().to_string(),
            None => response.trim().to_string(),
        },
    };

    (code, explanation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_format() {
        let response = "FIXED CODE:\n```java\n@ApplicationScoped\npublic class A {}\n```\n\nEXPLANATION:\nReplaced @Stateless with @ApplicationScoped.";
        let (code, explanation) = extract_code_and_explanation(response);
        assert_eq!(code, "@ApplicationScoped\npublic class A {}");
        assert_eq!(explanation, "Replaced @Stateless with @ApplicationScoped.");
    }

    #[test]
    fn test_markdown_headers() {
        let response = "## Fixed code:\n```python\nx = 1\n```\n**Explanation:**\nRenamed.";
        let (code, explanation) = extract_code_and_explanation(response);
        assert_eq!(code, "x = 1");
        assert_eq!(explanation, "Renamed.");
    }

    #[test]
    fn test_fallback_to_text_after_block() {
        let response = "Here you go:\n```\nfoo()\n```\nI renamed bar to foo.";
        let (code, explanation) = extract_code_and_explanation(response);
        assert_eq!(code, "foo()");
        assert_eq!(explanation, "I renamed bar to foo.");
    }

    #[test]
    fn test_no_code_block() {
        let (code, explanation) = extract_code_and_explanation("I cannot fix this.");
        assert_eq!(code, "");
        assert_eq!(explanation, "I cannot fix this.");
    }

    #[test]
    fn test_explanation_word_inside_prose_is_not_a_header() {
        let response = "```go\nfunc f() {}\n```\nNo further explanation needed.";
        let (_, explanation) = extract_code_and_explanation(response);
        assert_eq!(explanation, "No further explanation needed.");
    }
}
