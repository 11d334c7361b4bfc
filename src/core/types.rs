// src/core/types.rs - Core result and event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::metrics::{keys, EvaluationMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueSeverity::Low => write!(f, "LOW"),
            IssueSeverity::Medium => write!(f, "MEDIUM"),
            IssueSeverity::High => write!(f, "HIGH"),
        }
    }
}

/// One finding from the security evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: IssueSeverity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// The outcome of evaluating one test case against one model.
///
/// Built once by the engine and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: String,
    pub test_case_id: String,
    pub rule_id: String,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
    pub generated_code: String,
    #[serde(default)]
    pub generated_explanation: Option<String>,
    #[serde(default)]
    pub raw_response: String,
    pub metrics: EvaluationMetrics,
    pub passed: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Untruncated detail behind `failure_reason` (full compiler output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_source: Option<String>,
}

impl EvaluationResult {
    /// Response time in ms, 0 when the metric is missing.
    pub fn response_time_ms(&self) -> f64 {
        self.metrics.get_f64(keys::RESPONSE_TIME_MS).unwrap_or(0.0)
    }

    pub fn compiled(&self) -> bool {
        self.metrics.get_bool(keys::COMPILES) == Some(true)
    }
}

/// Events emitted by the engine to its single progress consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    SuiteStart {
        suite: String,
        rules: usize,
        models: usize,
        total_evaluations: usize,
        parallel: usize,
    },
    RuleStart {
        rule_id: String,
        test_cases: usize,
    },
    TestCaseStart {
        rule_id: String,
        test_case_id: String,
    },
    /// One (test case, model) pair finished. Arrives in completion order.
    ResultReady {
        test_case_id: String,
        model_name: String,
        passed: bool,
        failure_reason: Option<String>,
        completed: usize,
        total: usize,
    },
    /// All models finished a test case; `results` is sorted by model name.
    BatchComplete {
        test_case_id: String,
        results: Vec<(String, bool)>,
    },
    LimitReached {
        limit: usize,
    },
    Complete {
        total: usize,
        passed: usize,
        cost: f64,
    },
}
