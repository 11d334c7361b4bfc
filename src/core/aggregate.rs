// src/core/aggregate.rs - Fold results into per-model and per-rule statistics

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::core::metrics::keys;
use crate::core::types::EvaluationResult;

/// Running totals for one model. Derived, recomputed on demand.
///
/// `response_times` and `costs` hold one entry per result in evaluation
/// order. The quality/security/explainability series only hold values for
/// results that actually produced the metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelAggregate {
    pub model_name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub compiled: usize,
    pub response_times: Vec<f64>,
    pub costs: Vec<f64>,
    pub complexities: Vec<f64>,
    pub pylint_scores: Vec<f64>,
    pub maintainability_scores: Vec<f64>,
    pub security_issues: Vec<f64>,
    pub explanation_scores: Vec<f64>,
    pub comment_densities: Vec<f64>,
}

impl ModelAggregate {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &EvaluationResult) {
        self.total += 1;
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        if result.compiled() {
            self.compiled += 1;
        }

        self.response_times.push(result.response_time_ms());
        self.costs.push(result.estimated_cost);

        let m = &result.metrics;
        let series = [
            (keys::CYCLOMATIC_COMPLEXITY, &mut self.complexities),
            (keys::PYLINT_SCORE, &mut self.pylint_scores),
            (keys::MAINTAINABILITY_INDEX, &mut self.maintainability_scores),
            (keys::SECURITY_ISSUES, &mut self.security_issues),
            (keys::EXPLANATION_QUALITY_SCORE, &mut self.explanation_scores),
            (keys::COMMENT_DENSITY, &mut self.comment_densities),
        ];
        for (key, values) in series {
            if let Some(v) = m.get_f64(key) {
                values.push(v);
            }
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// One aggregate per distinct model, in order of first appearance.
pub fn aggregate_by_model(results: &[EvaluationResult]) -> Vec<ModelAggregate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut aggregates: Vec<ModelAggregate> = Vec::new();

    for result in results {
        let slot = *index.entry(result.model_name.as_str()).or_insert_with(|| {
            aggregates.push(ModelAggregate::new(result.model_name.clone()));
            aggregates.len() - 1
        });
        aggregates[slot].record(result);
    }

    aggregates
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassCounts {
    pub total: usize,
    pub passed: usize,
}

impl PassCounts {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }
}

/// rule_id -> model_name -> pass counts.
pub fn aggregate_by_rule(
    results: &[EvaluationResult],
) -> BTreeMap<String, BTreeMap<String, PassCounts>> {
    let mut out: BTreeMap<String, BTreeMap<String, PassCounts>> = BTreeMap::new();
    for result in results {
        let counts = out
            .entry(result.rule_id.clone())
            .or_default()
            .entry(result.model_name.clone())
            .or_default();
        counts.total += 1;
        if result.passed {
            counts.passed += 1;
        }
    }
    out
}
