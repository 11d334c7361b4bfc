// src/core/metrics.rs - Sparse per-test metrics record
//
// Each evaluator contributes a disjoint slice of keys. Absence means "not
// measured", never zero or false. Values are validated against the scale
// registered for their key on insertion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::SecurityIssue;
use crate::infra::errors::BenchError;

/// Well-known metric keys, grouped by the component that owns them.
pub mod keys {
    // functional
    pub const COMPILES: &str = "compiles";
    pub const COMPILATION_ERROR: &str = "compilation_error";
    pub const INJECTED_IMPORTS: &str = "injected_imports";
    pub const STRIPPED_IMPORTS: &str = "stripped_imports";
    pub const FUNCTIONAL_CORRECTNESS: &str = "functional_correctness";
    pub const INTRODUCES_VIOLATIONS: &str = "introduces_violations";
    pub const NEW_VIOLATION_COUNT: &str = "new_violation_count";
    pub const MATCHES_EXPECTED: &str = "matches_expected";

    // quality
    pub const PYLINT_SCORE: &str = "pylint_score";
    pub const CYCLOMATIC_COMPLEXITY: &str = "cyclomatic_complexity";
    pub const COMPLEXITY_METHOD: &str = "complexity_method";
    pub const MAINTAINABILITY_INDEX: &str = "maintainability_index";
    pub const STYLE_VIOLATIONS: &str = "style_violations";

    // security
    pub const SECURITY_ISSUES: &str = "security_issues";
    pub const HIGH_SEVERITY_SECURITY: &str = "high_severity_security";
    pub const ISSUE_TYPES: &str = "issue_types";
    pub const ISSUES: &str = "issues";

    // efficiency
    pub const EXECUTION_TIME_MS: &str = "execution_time_ms";
    pub const MEMORY_USAGE_MB: &str = "memory_usage_mb";
    pub const EXECUTION_SUCCEEDED: &str = "execution_succeeded";
    pub const EXECUTION_TIMED_OUT: &str = "execution_timed_out";

    // explainability
    pub const HAS_EXPLANATION: &str = "has_explanation";
    pub const HAS_INLINE_COMMENTS: &str = "has_inline_comments";
    pub const COMMENT_DENSITY: &str = "comment_density";
    pub const EXPLANATION_QUALITY_SCORE: &str = "explanation_quality_score";
    pub const EXPLANATION_GRADER: &str = "explanation_grader";

    // engine
    pub const RESPONSE_TIME_MS: &str = "response_time_ms";
    pub const TOKENS_USED: &str = "tokens_used";
    pub const COMPILATION_ERROR_EXPLANATION: &str = "compilation_error_explanation";
}

/// The fixed scale a metric key is expressed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Boolean,
    /// 0 to 10 inclusive.
    Ten,
    /// 0 to 100 inclusive.
    Hundred,
    /// 0 to 1 inclusive.
    Ratio,
    /// Counts, durations and sizes.
    NonNegative,
    /// Free-form text, lists and issue records.
    Unbounded,
}

impl Scale {
    pub fn for_key(key: &str) -> Scale {
        use keys::*;
        match key {
            COMPILES | FUNCTIONAL_CORRECTNESS | INTRODUCES_VIOLATIONS | MATCHES_EXPECTED
            | EXECUTION_SUCCEEDED | EXECUTION_TIMED_OUT | HAS_EXPLANATION
            | HAS_INLINE_COMMENTS => Scale::Boolean,
            PYLINT_SCORE | EXPLANATION_QUALITY_SCORE => Scale::Ten,
            MAINTAINABILITY_INDEX => Scale::Hundred,
            COMMENT_DENSITY => Scale::Ratio,
            INJECTED_IMPORTS | STRIPPED_IMPORTS | NEW_VIOLATION_COUNT | CYCLOMATIC_COMPLEXITY
            | STYLE_VIOLATIONS | SECURITY_ISSUES | HIGH_SEVERITY_SECURITY
            | EXECUTION_TIME_MS | MEMORY_USAGE_MB | RESPONSE_TIME_MS | TOKENS_USED => {
                Scale::NonNegative
            }
            _ => Scale::Unbounded,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Scale::Boolean => "boolean",
            Scale::Ten => "0-10",
            Scale::Hundred => "0-100",
            Scale::Ratio => "0-1",
            Scale::NonNegative => "non-negative",
            Scale::Unbounded => "unbounded",
        }
    }

    fn admits(&self, value: &MetricValue) -> bool {
        match (self, value) {
            (_, MetricValue::Unknown) => true,
            (Scale::Boolean, MetricValue::Bool(_)) => true,
            (Scale::Boolean, _) => false,
            (Scale::Unbounded, MetricValue::Float(f)) => f.is_finite(),
            (Scale::Unbounded, _) => true,
            (scale, v) => match v.as_f64() {
                Some(f) if f.is_finite() => match scale {
                    Scale::Ten => (0.0..=10.0).contains(&f),
                    Scale::Hundred => (0.0..=100.0).contains(&f),
                    Scale::Ratio => (0.0..=1.0).contains(&f),
                    _ => f >= 0.0,
                },
                _ => false,
            },
        }
    }
}

/// One measured value. `Unknown` is the tri-state "could not be measured"
/// (e.g. the compiler is missing) and is distinct from an absent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Unknown,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Issues(Vec<SecurityIssue>),
}

impl MetricValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetricValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(i) => Some(*i as f64),
            MetricValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Int(i) => Some(*i),
            MetricValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for MetricValue {
    fn from(b: bool) -> Self {
        MetricValue::Bool(b)
    }
}

impl From<i64> for MetricValue {
    fn from(i: i64) -> Self {
        MetricValue::Int(i)
    }
}

impl From<usize> for MetricValue {
    fn from(i: usize) -> Self {
        MetricValue::Int(i as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(f: f64) -> Self {
        MetricValue::Float(f)
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        MetricValue::Text(s)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        MetricValue::Text(s.to_string())
    }
}

impl From<Option<bool>> for MetricValue {
    fn from(b: Option<bool>) -> Self {
        b.map(MetricValue::Bool).unwrap_or(MetricValue::Unknown)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationMetrics {
    values: BTreeMap<String, MetricValue>,
}

impl EvaluationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value after checking it against the key's scale.
    ///
    /// Overwrites within the same record are allowed; cross-evaluator
    /// collisions are caught by [`EvaluationMetrics::merge_from`].
    pub fn insert(
        &mut self,
        key: &str,
        value: impl Into<MetricValue>,
    ) -> Result<(), BenchError> {
        let value = value.into();
        let scale = Scale::for_key(key);
        if !scale.admits(&value) {
            return Err(BenchError::MetricOutOfRange {
                key: key.to_string(),
                value: value.as_f64().unwrap_or(f64::NAN),
                scale: scale.label().to_string(),
            });
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Merge another evaluator's output into this record.
    ///
    /// A key already present with a different value is a collision. The same
    /// key with an identical value is a no-op, so re-merging is idempotent.
    /// On error nothing from `other` is applied.
    pub fn merge_from(
        &mut self,
        other: &EvaluationMetrics,
        evaluator: &str,
    ) -> Result<(), BenchError> {
        for (key, value) in &other.values {
            if let Some(existing) = self.values.get(key) {
                if existing != value {
                    return Err(BenchError::MetricCollision {
                        key: key.clone(),
                        evaluator: evaluator.to_string(),
                    });
                }
            }
        }
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// `None` when absent or unknown.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(MetricValue::as_bool)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetricValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(MetricValue::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetricValue::as_str)
    }

    pub fn is_unknown(&self, key: &str) -> bool {
        matches!(self.get(key), Some(MetricValue::Unknown))
    }

    pub fn issues(&self) -> &[SecurityIssue] {
        match self.get(keys::ISSUES) {
            Some(MetricValue::Issues(issues)) => issues,
            _ => &[],
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IssueSeverity;

    fn sample(pairs: &[(&str, MetricValue)]) -> EvaluationMetrics {
        let mut m = EvaluationMetrics::new();
        for (k, v) in pairs {
            m.insert(k, v.clone()).unwrap();
        }
        m
    }

    #[test]
    fn test_absent_is_not_false() {
        let m = EvaluationMetrics::new();
        assert!(m.get_bool(keys::COMPILES).is_none());
        assert!(!m.contains(keys::COMPILES));
    }

    #[test]
    fn test_unknown_is_distinct_from_false_and_absent() {
        let m = sample(&[(keys::COMPILES, MetricValue::Unknown)]);
        assert!(m.contains(keys::COMPILES));
        assert!(m.is_unknown(keys::COMPILES));
        assert_eq!(m.get_bool(keys::COMPILES), None);
    }

    #[test]
    fn test_scale_validation_rejects_out_of_range() {
        let mut m = EvaluationMetrics::new();
        assert!(m.insert(keys::PYLINT_SCORE, 10.5).is_err());
        assert!(m.insert(keys::MAINTAINABILITY_INDEX, -1.0).is_err());
        assert!(m.insert(keys::COMMENT_DENSITY, 1.2).is_err());
        assert!(m.insert(keys::COMPILES, 1i64).is_err());
        assert!(m.insert(keys::SECURITY_ISSUES, -3i64).is_err());
        assert!(m.insert(keys::EXECUTION_TIME_MS, f64::NAN).is_err());
        assert!(m.is_empty());

        assert!(m.insert(keys::PYLINT_SCORE, 10.0).is_ok());
        assert!(m.insert(keys::MAINTAINABILITY_INDEX, 0.0).is_ok());
        assert!(m.insert(keys::COMMENT_DENSITY, 0.25).is_ok());
        assert!(m.insert(keys::SECURITY_ISSUES, 0i64).is_ok());
    }

    #[test]
    fn test_merge_collision_is_error_and_atomic() {
        let mut acc = sample(&[(keys::COMPILES, true.into())]);
        let other = sample(&[
            (keys::COMPILES, false.into()),
            (keys::PYLINT_SCORE, 8.0.into()),
        ]);
        let err = acc.merge_from(&other, "quality").unwrap_err();
        assert!(matches!(err, BenchError::MetricCollision { .. }));
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.get_bool(keys::COMPILES), Some(true));
    }

    #[test]
    fn test_remerge_is_idempotent() {
        let functional = sample(&[
            (keys::COMPILES, true.into()),
            (keys::FUNCTIONAL_CORRECTNESS, true.into()),
        ]);
        let quality = sample(&[(keys::CYCLOMATIC_COMPLEXITY, 3.0.into())]);

        let mut acc = EvaluationMetrics::new();
        acc.merge_from(&functional, "functional").unwrap();
        acc.merge_from(&quality, "quality").unwrap();
        let once = acc.clone();

        acc.merge_from(&functional, "functional").unwrap();
        acc.merge_from(&quality, "quality").unwrap();
        assert_eq!(acc, once);
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn test_json_shape() {
        let m = sample(&[
            (keys::COMPILES, MetricValue::Unknown),
            (keys::NEW_VIOLATION_COUNT, 2i64.into()),
            (keys::PYLINT_SCORE, 7.5.into()),
            (
                keys::ISSUE_TYPES,
                MetricValue::List(vec!["WEAK_RANDOM".into()]),
            ),
        ]);
        let json = serde_json::to_value(&m).unwrap();
        assert!(json["compiles"].is_null());
        assert_eq!(json["new_violation_count"], 2);
        assert_eq!(json["pylint_score"], 7.5);

        let back: EvaluationMetrics = serde_json::from_value(json).unwrap();
        assert!(back.is_unknown(keys::COMPILES));
        assert_eq!(back.get_i64(keys::NEW_VIOLATION_COUNT), Some(2));
    }

    #[test]
    fn test_issues_accessor() {
        let issue = SecurityIssue {
            kind: "HARDCODED_CREDENTIALS".into(),
            severity: IssueSeverity::High,
            description: "Hardcoded credential".into(),
            line: Some(3),
        };
        let m = sample(&[(keys::ISSUES, MetricValue::Issues(vec![issue.clone()]))]);
        assert_eq!(m.issues(), &[issue]);
        assert!(EvaluationMetrics::new().issues().is_empty());
    }
}
