// src/core/decision.rs - Pass/fail gate over merged metrics

use crate::core::metrics::{keys, EvaluationMetrics};

/// Characters of compiler output kept in the short failure reason.
pub const COMPILE_REASON_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub reason: Option<String>,
    /// Full text behind a truncated reason.
    pub detail: Option<String>,
}

impl Verdict {
    fn pass() -> Self {
        Self {
            passed: true,
            reason: None,
            detail: None,
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            passed: false,
            reason: Some(reason),
            detail: None,
        }
    }
}

/// Decide pass/fail. The first failing condition wins:
///
/// 1. violation not resolved (missing or unknown counts as unresolved)
/// 2. new violations introduced
/// 3. compilation failed, or could not be verified (`Unknown`); an absent
///    `compiles` means the language has no compile step and does not fail
/// 4. high-severity security findings
pub fn decide(metrics: &EvaluationMetrics) -> Verdict {
    if metrics.get_bool(keys::FUNCTIONAL_CORRECTNESS) != Some(true) {
        return Verdict::fail("Does not resolve violation".to_string());
    }

    if metrics.get_bool(keys::INTRODUCES_VIOLATIONS) == Some(true) {
        let count = metrics.get_i64(keys::NEW_VIOLATION_COUNT).unwrap_or(0);
        return Verdict::fail(format!(
            "Introduces new violations ({} new violation(s))",
            count
        ));
    }

    if metrics.get_bool(keys::COMPILES) == Some(false) {
        return match metrics.get_str(keys::COMPILATION_ERROR) {
            Some(error) if !error.trim().is_empty() => {
                let short = truncate_chars(error, COMPILE_REASON_CHARS);
                let ellipsis = if short.len() < error.len() { "..." } else { "" };
                Verdict {
                    passed: false,
                    reason: Some(format!("Compilation error: {short}{ellipsis}")),
                    detail: Some(error.to_string()),
                }
            }
            _ => Verdict::fail("Compilation error".to_string()),
        };
    }

    if metrics.is_unknown(keys::COMPILES) {
        return Verdict::fail("Compilation could not be verified".to_string());
    }

    let high = metrics.get_i64(keys::HIGH_SEVERITY_SECURITY).unwrap_or(0);
    if high > 0 {
        return Verdict::fail(format!(
            "High severity security issues ({} issue(s))",
            high
        ));
    }

    Verdict::pass()
}

pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::MetricValue;

    fn perfect() -> EvaluationMetrics {
        let mut m = EvaluationMetrics::new();
        m.insert(keys::FUNCTIONAL_CORRECTNESS, true).unwrap();
        m.insert(keys::INTRODUCES_VIOLATIONS, false).unwrap();
        m.insert(keys::NEW_VIOLATION_COUNT, 0i64).unwrap();
        m.insert(keys::COMPILES, true).unwrap();
        m.insert(keys::HIGH_SEVERITY_SECURITY, 0i64).unwrap();
        m.insert(keys::SECURITY_ISSUES, 0i64).unwrap();
        m
    }

    #[test]
    fn test_perfect_passes() {
        let v = decide(&perfect());
        assert!(v.passed);
        assert!(v.reason.is_none());
    }

    #[test]
    fn test_unresolved_violation_fails_first() {
        let mut m = perfect();
        m.insert(keys::FUNCTIONAL_CORRECTNESS, false).unwrap();
        let v = decide(&m);
        assert!(!v.passed);
        assert_eq!(v.reason.as_deref(), Some("Does not resolve violation"));
    }

    #[test]
    fn test_missing_or_unknown_correctness_fails_closed() {
        assert!(!decide(&EvaluationMetrics::new()).passed);

        let mut m = perfect();
        m.insert(keys::FUNCTIONAL_CORRECTNESS, MetricValue::Unknown)
            .unwrap();
        let v = decide(&m);
        assert_eq!(v.reason.as_deref(), Some("Does not resolve violation"));
    }

    #[test]
    fn test_new_violations_beat_compile_error() {
        let mut m = perfect();
        m.insert(keys::INTRODUCES_VIOLATIONS, true).unwrap();
        m.insert(keys::NEW_VIOLATION_COUNT, 2i64).unwrap();
        m.insert(keys::COMPILES, false).unwrap();
        m.insert(keys::COMPILATION_ERROR, "error: ';' expected").unwrap();
        let v = decide(&m);
        assert!(!v.passed);
        assert!(v.reason.unwrap().contains("2 new violation(s)"));
    }

    #[test]
    fn test_compile_error_truncated_with_full_detail() {
        let long = "x".repeat(450);
        let mut m = perfect();
        m.insert(keys::COMPILES, false).unwrap();
        m.insert(keys::COMPILATION_ERROR, long.as_str()).unwrap();
        let v = decide(&m);
        let reason = v.reason.unwrap();
        assert_eq!(reason, format!("Compilation error: {}...", "x".repeat(200)));
        assert_eq!(v.detail.as_deref(), Some(long.as_str()));
    }

    #[test]
    fn test_short_compile_error_not_marked_truncated() {
        let mut m = perfect();
        m.insert(keys::COMPILES, false).unwrap();
        m.insert(keys::COMPILATION_ERROR, "error: ';' expected").unwrap();
        let v = decide(&m);
        assert_eq!(
            v.reason.as_deref(),
            Some("Compilation error: error: ';' expected")
        );

        let exact = "y".repeat(COMPILE_REASON_CHARS);
        m.insert(keys::COMPILATION_ERROR, exact.as_str()).unwrap();
        assert_eq!(
            decide(&m).reason,
            Some(format!("Compilation error: {exact}"))
        );
    }

    #[test]
    fn test_unverified_compile_fails() {
        let mut m = perfect();
        m.insert(keys::COMPILES, MetricValue::Unknown).unwrap();
        let v = decide(&m);
        assert!(!v.passed);
        assert_eq!(
            v.reason.as_deref(),
            Some("Compilation could not be verified")
        );
    }

    #[test]
    fn test_no_compile_step_is_not_a_failure() {
        let mut m = EvaluationMetrics::new();
        m.insert(keys::FUNCTIONAL_CORRECTNESS, true).unwrap();
        m.insert(keys::INTRODUCES_VIOLATIONS, false).unwrap();
        assert!(!m.contains(keys::COMPILES));
        assert!(decide(&m).passed);
    }

    #[test]
    fn test_unverified_compile_ranks_below_new_violations() {
        let mut m = perfect();
        m.insert(keys::COMPILES, MetricValue::Unknown).unwrap();
        m.insert(keys::INTRODUCES_VIOLATIONS, true).unwrap();
        m.insert(keys::NEW_VIOLATION_COUNT, 1i64).unwrap();
        assert!(decide(&m).reason.unwrap().contains("1 new violation(s)"));
    }

    #[test]
    fn test_high_severity_security_fails() {
        let mut m = perfect();
        m.insert(keys::HIGH_SEVERITY_SECURITY, 3i64).unwrap();
        let v = decide(&m);
        assert_eq!(
            v.reason.as_deref(),
            Some("High severity security issues (3 issue(s))")
        );
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
