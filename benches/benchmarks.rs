// benches/benchmarks.rs - Performance benchmarks (criterion)
//
//   1. Aggregation of a large results set into per-model aggregates
//   2. Composite ranking under both weight schemes
//   3. Code/explanation extraction from model responses

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fixbench::core::aggregate::aggregate_by_model;
use fixbench::core::metrics::{keys, EvaluationMetrics};
use fixbench::core::ranking::{rank_models, WeightScheme};
use fixbench::core::types::EvaluationResult;
use fixbench::provider::extract_code_and_explanation;

/// `n` results spread over 8 models with a realistic metric mix.
fn synthetic_results(n: usize) -> Vec<EvaluationResult> {
    (0..n)
        .map(|i| {
            let mut metrics = EvaluationMetrics::new();
            let _ = metrics.insert(keys::COMPILES, i % 7 != 0);
            let _ = metrics.insert(keys::FUNCTIONAL_CORRECTNESS, i % 3 != 0);
            let _ = metrics.insert(keys::RESPONSE_TIME_MS, 200.0 + (i % 50) as f64 * 40.0);
            let _ = metrics.insert(keys::CYCLOMATIC_COMPLEXITY, 1.0 + (i % 9) as f64);
            let _ = metrics.insert(keys::SECURITY_ISSUES, (i % 4) as i64);
            let _ = metrics.insert(keys::EXPLANATION_QUALITY_SCORE, (i % 11) as f64);
            let _ = metrics.insert(keys::COMMENT_DENSITY, (i % 5) as f64 / 10.0);
            EvaluationResult {
                id: format!("r-{i}"),
                test_case_id: format!("tc-{}", i / 8),
                rule_id: format!("rule-{}", i % 40),
                model_name: format!("model-{}", i % 8),
                timestamp: Utc::now(),
                generated_code: String::new(),
                generated_explanation: None,
                raw_response: String::new(),
                metrics,
                passed: i % 3 != 0,
                failure_reason: None,
                failure_detail: None,
                estimated_cost: 0.0005,
                prompt_source: None,
            }
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let results = synthetic_results(10_000);
    c.bench_function("aggregate_by_model_10k", |b| {
        b.iter(|| aggregate_by_model(black_box(&results)))
    });
}

fn bench_rank(c: &mut Criterion) {
    let aggregates = aggregate_by_model(&synthetic_results(10_000));
    let mut group = c.benchmark_group("rank_models");
    for scheme in [WeightScheme::Classic, WeightScheme::Extended] {
        group.bench_function(scheme.to_string(), |b| {
            b.iter(|| rank_models(black_box(&aggregates), scheme))
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let body = "    int x = compute();\n".repeat(200);
    let response = format!(
        "Here is the fix.\n\nFIXED CODE:\n```java\n{body}```\n\nEXPLANATION:\nReplaced the EJB bean with a CDI scope.\n"
    );
    c.bench_function("extract_code_and_explanation", |b| {
        b.iter(|| extract_code_and_explanation(black_box(&response)))
    });
}

criterion_group!(benches, bench_aggregate, bench_rank, bench_extract);
criterion_main!(benches);
