// src/core/history.rs - Analytics over stored results
//
// Pure functions over result slices. Time windows take an explicit `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::core::aggregate::{mean, PassCounts};
use crate::core::metrics::keys;
use crate::core::types::EvaluationResult;

fn count(counts: &mut PassCounts, passed: bool) {
    counts.total += 1;
    if passed {
        counts.passed += 1;
    }
}

/// `now` minus `days`, saturating at the representable range.
fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let saturated = if days >= 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(saturated)
}

/// Results with a timestamp in the last `days` days.
pub fn within_days(
    results: &[EvaluationResult],
    now: DateTime<Utc>,
    days: i64,
) -> Vec<EvaluationResult> {
    let cutoff = days_before(now, days);
    results
        .iter()
        .filter(|r| r.timestamp >= cutoff)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailingRule {
    pub rule_id: String,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub pass_rate: f64,
}

/// Rules with at least `min_tests` results and a pass rate below
/// `threshold` percent, worst first.
pub fn failing_rules(
    results: &[EvaluationResult],
    threshold: f64,
    min_tests: usize,
) -> Vec<FailingRule> {
    let mut by_rule: BTreeMap<&str, PassCounts> = BTreeMap::new();
    for r in results {
        count(by_rule.entry(r.rule_id.as_str()).or_default(), r.passed);
    }

    let mut out: Vec<FailingRule> = by_rule
        .into_iter()
        .filter(|(_, c)| c.total >= min_tests && c.pass_rate() < threshold)
        .map(|(rule_id, c)| FailingRule {
            rule_id: rule_id.to_string(),
            total_tests: c.total,
            passed_tests: c.passed,
            pass_rate: c.pass_rate(),
        })
        .collect();
    out.sort_by(|a, b| a.pass_rate.total_cmp(&b.pass_rate));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub pass_rate: f64,
    pub avg_response_time_ms: f64,
    pub total_cost: f64,
    pub avg_explanation_score: Option<f64>,
}

/// One summary per model, highest pass rate first.
pub fn model_comparison(results: &[EvaluationResult]) -> Vec<ModelSummary> {
    #[derive(Default)]
    struct Acc {
        counts: PassCounts,
        times: Vec<f64>,
        cost: f64,
        explanation: Vec<f64>,
    }

    let mut by_model: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in results {
        let acc = by_model.entry(r.model_name.as_str()).or_default();
        count(&mut acc.counts, r.passed);
        acc.times.push(r.response_time_ms());
        acc.cost += r.estimated_cost;
        if let Some(score) = r.metrics.get_f64(keys::EXPLANATION_QUALITY_SCORE) {
            acc.explanation.push(score);
        }
    }

    let mut out: Vec<ModelSummary> = by_model
        .into_iter()
        .map(|(model, acc)| ModelSummary {
            model_name: model.to_string(),
            total_tests: acc.counts.total,
            passed_tests: acc.counts.passed,
            pass_rate: acc.counts.pass_rate(),
            avg_response_time_ms: mean(&acc.times).unwrap_or(0.0),
            total_cost: acc.cost,
            avg_explanation_score: mean(&acc.explanation),
        })
        .collect();
    out.sort_by(|a, b| b.pass_rate.total_cmp(&a.pass_rate));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub model_name: String,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub pass_rate: f64,
    pub avg_response_time_ms: f64,
    pub avg_cost: f64,
}

/// Daily pass rate of one rule, per model, oldest day first.
pub fn rule_trend(
    results: &[EvaluationResult],
    rule_id: &str,
    model: Option<&str>,
) -> Vec<TrendPoint> {
    let mut groups: BTreeMap<(NaiveDate, &str), Vec<&EvaluationResult>> = BTreeMap::new();
    for r in results
        .iter()
        .filter(|r| r.rule_id == rule_id)
        .filter(|r| model.is_none_or(|m| r.model_name == m))
    {
        groups
            .entry((r.timestamp.date_naive(), r.model_name.as_str()))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .map(|((date, model_name), rs)| {
            let mut counts = PassCounts::default();
            for r in &rs {
                count(&mut counts, r.passed);
            }
            let times: Vec<f64> = rs.iter().map(|r| r.response_time_ms()).collect();
            let costs: Vec<f64> = rs.iter().map(|r| r.estimated_cost).collect();
            TrendPoint {
                date,
                model_name: model_name.to_string(),
                total_tests: counts.total,
                passed_tests: counts.passed,
                pass_rate: counts.pass_rate(),
                avg_response_time_ms: mean(&times).unwrap_or(0.0),
                avg_cost: mean(&costs).unwrap_or(0.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub rule_id: String,
    pub model_name: String,
    pub historical_pass_rate: f64,
    pub recent_pass_rate: f64,
    pub drop: f64,
    pub historical_tests: usize,
    pub recent_tests: usize,
}

/// (rule, model) pairs whose pass rate in the last `lookback_days` is at
/// least `threshold` points below the preceding window reaching back
/// `comparison_days`. Largest drop first.
pub fn detect_regressions(
    results: &[EvaluationResult],
    now: DateTime<Utc>,
    threshold: f64,
    lookback_days: i64,
    comparison_days: i64,
) -> Vec<Regression> {
    let recent_cutoff = days_before(now, lookback_days);
    let historical_cutoff = days_before(now, comparison_days);

    let mut recent: BTreeMap<(&str, &str), PassCounts> = BTreeMap::new();
    let mut historical: BTreeMap<(&str, &str), PassCounts> = BTreeMap::new();
    for r in results {
        let key = (r.rule_id.as_str(), r.model_name.as_str());
        if r.timestamp >= recent_cutoff {
            count(recent.entry(key).or_default(), r.passed);
        } else if r.timestamp >= historical_cutoff {
            count(historical.entry(key).or_default(), r.passed);
        }
    }

    let mut out: Vec<Regression> = historical
        .into_iter()
        .filter_map(|(key, before)| {
            let after = recent.get(&key)?;
            let drop = before.pass_rate() - after.pass_rate();
            (drop >= threshold).then(|| Regression {
                rule_id: key.0.to_string(),
                model_name: key.1.to_string(),
                historical_pass_rate: before.pass_rate(),
                recent_pass_rate: after.pass_rate(),
                drop,
                historical_tests: before.total,
                recent_tests: after.total,
            })
        })
        .collect();
    out.sort_by(|a, b| b.drop.total_cmp(&a.drop));
    out
}
