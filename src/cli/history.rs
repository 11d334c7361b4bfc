// src/cli/history.rs - History analytics commands

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use super::HistoryArgs;
use crate::core::history::{
    detect_regressions, failing_rules, model_comparison, rule_trend, within_days,
};
use crate::core::results::load_history;
use crate::core::types::EvaluationResult;
use crate::infra::config::Config;

fn load(args: &HistoryArgs, config: &Config) -> anyhow::Result<Vec<EvaluationResult>> {
    let paths = if args.results.is_empty() {
        vec![PathBuf::from(&config.run.output_dir)]
    } else {
        args.results.clone()
    };
    let results = load_history(&paths)?;
    tracing::debug!("Loaded {} stored result(s)", results.len());
    Ok(results)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_failing_rules(
    args: &HistoryArgs,
    config: &Config,
    threshold: f64,
    min_tests: usize,
) -> anyhow::Result<()> {
    let results = within_days(&load(args, config)?, Utc::now(), args.days);
    let rules = failing_rules(&results, threshold, min_tests);
    if args.json {
        return print_json(&rules);
    }
    if rules.is_empty() {
        println!("No rules below {threshold:.0}% pass rate (min {min_tests} tests).");
        return Ok(());
    }
    println!("{:<40} {:>8} {:>7}", "rule", "passed", "pass%");
    for r in &rules {
        println!(
            "{:<40} {:>8} {:>7.1}",
            r.rule_id,
            format!("{}/{}", r.passed_tests, r.total_tests),
            r.pass_rate
        );
    }
    Ok(())
}

pub fn run_regressions(
    args: &HistoryArgs,
    config: &Config,
    threshold: f64,
    lookback_days: i64,
    comparison_days: i64,
) -> anyhow::Result<()> {
    if lookback_days >= comparison_days {
        anyhow::bail!("--lookback-days must be smaller than --comparison-days");
    }
    let results = load(args, config)?;
    let regressions =
        detect_regressions(&results, Utc::now(), threshold, lookback_days, comparison_days);
    if args.json {
        return print_json(&regressions);
    }
    if regressions.is_empty() {
        println!("No regressions of {threshold:.0} points or more.");
        return Ok(());
    }
    println!(
        "{:<40} {:<25} {:>9} {:>9} {:>7}",
        "rule", "model", "before%", "recent%", "drop"
    );
    for r in &regressions {
        println!(
            "{:<40} {:<25} {:>9.1} {:>9.1} {:>7.1}",
            r.rule_id, r.model_name, r.historical_pass_rate, r.recent_pass_rate, r.drop
        );
    }
    Ok(())
}

pub fn run_models(args: &HistoryArgs, config: &Config, rule: Option<&str>) -> anyhow::Result<()> {
    let mut results = within_days(&load(args, config)?, Utc::now(), args.days);
    if let Some(rule) = rule {
        results.retain(|r| r.rule_id == rule);
    }
    let summaries = model_comparison(&results);
    if args.json {
        return print_json(&summaries);
    }
    println!(
        "{:<25} {:>9} {:>7} {:>10} {:>9} {:>8}",
        "model", "passed", "pass%", "avg ms", "cost $", "expl"
    );
    for s in &summaries {
        println!(
            "{:<25} {:>9} {:>7.1} {:>10.0} {:>9.4} {:>8}",
            s.model_name,
            format!("{}/{}", s.passed_tests, s.total_tests),
            s.pass_rate,
            s.avg_response_time_ms,
            s.total_cost,
            s.avg_explanation_score
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

pub fn run_trend(
    args: &HistoryArgs,
    config: &Config,
    rule_id: &str,
    model: Option<&str>,
) -> anyhow::Result<()> {
    let results = within_days(&load(args, config)?, Utc::now(), args.days);
    let points = rule_trend(&results, rule_id, model);
    if args.json {
        return print_json(&points);
    }
    if points.is_empty() {
        println!("No results for rule '{rule_id}' in the last {} days.", args.days);
        return Ok(());
    }
    println!("{:<12} {:<25} {:>9} {:>7}", "date", "model", "passed", "pass%");
    for p in &points {
        println!(
            "{:<12} {:<25} {:>9} {:>7.1}",
            p.date.to_string(),
            p.model_name,
            format!("{}/{}", p.passed_tests, p.total_tests),
            p.pass_rate
        );
    }
    Ok(())
}
