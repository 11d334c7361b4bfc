// src/core/engine.rs - Runs a suite across models and scores every fix
//
// Parallelism is scoped to one test case: all models are fanned out with
// `parallel` width, joined, and only then does the next test case start.
// Workers never print; they report through the progress channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use super::decision::decide;
use super::metrics::{keys, EvaluationMetrics};
use super::types::{EvaluationResult, ProgressEvent};
use crate::benchmark::prompt::PromptBuilder;
use crate::benchmark::rule_fetcher::RuleFetcher;
use crate::benchmark::schema::{Rule, TestCase, TestSuite};
use crate::evaluator::{EvaluationContext, EvaluationInput, EvaluatorRegistry};
use crate::provider::{extract_code_and_explanation, generate_with_timing, ModelProvider};

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

pub struct EvaluationEngine {
    models: Vec<Arc<dyn ModelProvider>>,
    registry: Arc<EvaluatorRegistry>,
    prompts: PromptBuilder,
    fetcher: Arc<RuleFetcher>,
    parallel: usize,
    limit: Option<usize>,
    provider_timeout: Duration,
}

impl EvaluationEngine {
    pub fn new(
        models: Vec<Arc<dyn ModelProvider>>,
        registry: Arc<EvaluatorRegistry>,
        prompts: PromptBuilder,
        fetcher: Arc<RuleFetcher>,
    ) -> Self {
        Self {
            models,
            registry,
            prompts,
            fetcher,
            parallel: 1,
            limit: None,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Models evaluated concurrently per test case; 0 is treated as 1.
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    /// Stop after this many test cases.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    /// Evaluate every test case with every model.
    ///
    /// Within a test case, `ResultReady` events arrive in completion order,
    /// while the returned batch is sorted by model name. No single failure
    /// aborts the run.
    pub async fn evaluate(
        &self,
        suite: &TestSuite,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Vec<EvaluationResult> {
        let test_cases = suite.test_case_count();
        let planned_cases = self.limit.map_or(test_cases, |l| l.min(test_cases));
        let total = planned_cases * self.models.len();

        tracing::info!(
            suite = %suite.name,
            rules = suite.rules.len(),
            models = self.models.len(),
            total,
            "Starting evaluation"
        );
        emit(
            &progress,
            ProgressEvent::SuiteStart {
                suite: suite.name.clone(),
                rules: suite.rules.len(),
                models: self.models.len(),
                total_evaluations: total,
                parallel: self.parallel,
            },
        )
        .await;

        let mut results: Vec<EvaluationResult> = Vec::with_capacity(total);
        let mut completed = 0usize;
        let mut cases_done = 0usize;

        'rules: for rule in &suite.rules {
            if self.limit_reached(cases_done) {
                break;
            }
            emit(
                &progress,
                ProgressEvent::RuleStart {
                    rule_id: rule.rule_id.clone(),
                    test_cases: rule.test_cases.len(),
                },
            )
            .await;

            let rule_message = match rule.source.as_deref() {
                Some(source) => self.fetcher.rule_message(source, &rule.rule_id).await,
                None => String::new(),
            };

            for test_case in &rule.test_cases {
                if self.limit_reached(cases_done) {
                    break 'rules;
                }
                emit(
                    &progress,
                    ProgressEvent::TestCaseStart {
                        rule_id: rule.rule_id.clone(),
                        test_case_id: test_case.id.clone(),
                    },
                )
                .await;

                let mut batch: Vec<EvaluationResult> = Vec::with_capacity(self.models.len());
                let mut pending = stream::iter(self.models.iter())
                    .map(|model| {
                        self.evaluate_single(model.as_ref(), suite, rule, test_case, &rule_message)
                    })
                    .buffer_unordered(self.parallel);

                while let Some(result) = pending.next().await {
                    completed += 1;
                    emit(
                        &progress,
                        ProgressEvent::ResultReady {
                            test_case_id: result.test_case_id.clone(),
                            model_name: result.model_name.clone(),
                            passed: result.passed,
                            failure_reason: result.failure_reason.clone(),
                            completed,
                            total,
                        },
                    )
                    .await;
                    batch.push(result);
                }

                batch.sort_by(|a, b| a.model_name.cmp(&b.model_name));
                emit(
                    &progress,
                    ProgressEvent::BatchComplete {
                        test_case_id: test_case.id.clone(),
                        results: batch
                            .iter()
                            .map(|r| (r.model_name.clone(), r.passed))
                            .collect(),
                    },
                )
                .await;
                results.extend(batch);
                cases_done += 1;
            }
        }

        if let Some(limit) = self.limit.filter(|l| *l < test_cases) {
            emit(&progress, ProgressEvent::LimitReached { limit }).await;
        }

        let passed = results.iter().filter(|r| r.passed).count();
        let cost: f64 = results.iter().map(|r| r.estimated_cost).sum();
        tracing::info!(total = results.len(), passed, cost, "Evaluation complete");
        emit(
            &progress,
            ProgressEvent::Complete {
                total: results.len(),
                passed,
                cost,
            },
        )
        .await;

        results
    }

    fn limit_reached(&self, cases_done: usize) -> bool {
        self.limit.is_some_and(|limit| cases_done >= limit)
    }

    /// Prompt, generate, extract, score and decide for one model.
    pub async fn evaluate_single(
        &self,
        model: &dyn ModelProvider,
        suite: &TestSuite,
        rule: &Rule,
        test_case: &TestCase,
        rule_message: &str,
    ) -> EvaluationResult {
        let prompt = match self.prompts.build(suite, rule, test_case, rule_message) {
            Ok(prompt) => prompt,
            Err(e) => return error_result(model.name(), rule, test_case, &e.to_string()),
        };

        let generation = generate_with_timing(model, &prompt.text, self.provider_timeout).await;
        if let Some(error) = generation.error {
            tracing::warn!(
                model = model.name(),
                test_case = %test_case.id,
                "Generation failed: {}",
                error
            );
            return error_result(model.name(), rule, test_case, &error);
        }

        let (generated_code, explanation) = extract_code_and_explanation(&generation.response);
        let input = EvaluationInput {
            original_code: test_case.code_snippet.clone(),
            generated_code: generated_code.clone(),
            expected_code: test_case.expected_fix.clone(),
            language: test_case.language,
            context: EvaluationContext {
                rule_id: rule.rule_id.clone(),
                legacy_pattern: rule.legacy_pattern().map(String::from),
                explanation: explanation.clone(),
                setup_code: test_case.setup_code.clone(),
                test_code: test_case.test_code.clone(),
            },
        };

        let mut metrics = self.registry.run(&input).await;
        record_generation_metrics(&mut metrics, generation.response_time_ms, generation.tokens_used);

        let verdict = decide(&metrics);
        EvaluationResult {
            id: uuid::Uuid::new_v4().to_string(),
            test_case_id: test_case.id.clone(),
            rule_id: rule.rule_id.clone(),
            model_name: model.name().to_string(),
            timestamp: Utc::now(),
            generated_code,
            generated_explanation: (!explanation.is_empty()).then_some(explanation),
            raw_response: generation.response,
            metrics,
            passed: verdict.passed,
            failure_reason: verdict.reason,
            failure_detail: verdict.detail,
            estimated_cost: generation.cost,
            prompt_source: Some(prompt.source),
        }
    }
}

async fn emit(progress: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    // A closed receiver only means nobody is watching.
    let _ = progress.send(event).await;
}

fn record_generation_metrics(metrics: &mut EvaluationMetrics, response_time_ms: f64, tokens: u64) {
    if let Err(e) = metrics.insert(keys::RESPONSE_TIME_MS, response_time_ms) {
        tracing::warn!("Dropping response time: {}", e);
    }
    if let Err(e) = metrics.insert(keys::TOKENS_USED, tokens as i64) {
        tracing::warn!("Dropping token count: {}", e);
    }

    if metrics.get_bool(keys::COMPILES) == Some(false) {
        let explanation = metrics
            .get_str(keys::COMPILATION_ERROR)
            .map(compilation_error_explanation);
        if let Some(text) = explanation {
            if let Err(e) = metrics.insert(keys::COMPILATION_ERROR_EXPLANATION, text) {
                tracing::warn!("Dropping compilation error explanation: {}", e);
            }
        }
    }
}

/// A failed result for a generation that never produced code.
pub fn error_result(
    model_name: &str,
    rule: &Rule,
    test_case: &TestCase,
    error: &str,
) -> EvaluationResult {
    let mut metrics = EvaluationMetrics::new();
    if let Err(e) = metrics.insert(keys::RESPONSE_TIME_MS, 0.0) {
        tracing::warn!("Dropping response time: {}", e);
    }
    EvaluationResult {
        id: uuid::Uuid::new_v4().to_string(),
        test_case_id: test_case.id.clone(),
        rule_id: rule.rule_id.clone(),
        model_name: model_name.to_string(),
        timestamp: Utc::now(),
        generated_code: String::new(),
        generated_explanation: None,
        raw_response: String::new(),
        metrics,
        passed: false,
        failure_reason: Some(format!("Error: {error}")),
        failure_detail: None,
        estimated_cost: 0.0,
        prompt_source: None,
    }
}

/// Plain-language category for a compiler error message.
pub fn compilation_error_explanation(error: &str) -> &'static str {
    let lower = error.to_lowercase();

    if lower.contains("cannot find symbol")
        || (lower.contains("package") && lower.contains("does not exist"))
    {
        if lower.contains("package") {
            return "Missing dependency: the code uses a package that is not on the classpath.";
        }
        return "Missing symbol: the code references a class, method or variable that does not exist.";
    }
    if lower.contains("is not abstract and does not override abstract method") {
        return "Interface implementation error: a required method is missing or its signature does not match.";
    }
    if lower.contains("cannot be applied to given types") || lower.contains("incompatible types") {
        return "Type mismatch: an argument, assignment or return value has the wrong type.";
    }
    if lower.contains("already defined") {
        return "Duplicate declaration: a name is declared more than once in the same scope.";
    }
    if lower.contains("has private access") || lower.contains("is not visible") {
        return "Access restriction: the code uses a member that is not visible from here.";
    }
    if lower.contains("non-static") && lower.contains("cannot be referenced from a static context") {
        return "Static context error: an instance member is used from a static context.";
    }
    if lower.contains("missing return statement") {
        return "Missing return statement: a non-void method does not return on every path.";
    }
    if lower.contains("class file for") && lower.contains("not found") {
        return "Class not found: a referenced class file is missing from the classpath.";
    }
    "Compilation failed: the generated code has syntax or semantic errors."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::schema::Language;

    fn rule() -> Rule {
        Rule {
            rule_id: "ejb-01".into(),
            description: String::new(),
            severity: Default::default(),
            category: String::new(),
            test_cases: Vec::new(),
            migration_pattern: None,
            source: None,
        }
    }

    fn test_case() -> TestCase {
        TestCase {
            id: "tc-1".into(),
            code_snippet: "@Stateless class A {}".into(),
            expected_fix: None,
            context: String::new(),
            language: Language::Java,
            setup_code: None,
            test_code: None,
            expected_metrics: Default::default(),
        }
    }

    #[test]
    fn test_error_result_shape() {
        let r = error_result("m1", &rule(), &test_case(), "connection refused");
        assert!(!r.passed);
        assert_eq!(r.failure_reason.as_deref(), Some("Error: connection refused"));
        assert_eq!(r.metrics.len(), 1);
        assert_eq!(r.response_time_ms(), 0.0);
        assert!(r.generated_code.is_empty());
        assert_eq!(r.estimated_cost, 0.0);
    }

    #[test]
    fn test_compilation_error_categories() {
        assert!(compilation_error_explanation(
            "A.java:1: error: package jakarta.ejb does not exist"
        )
        .starts_with("Missing dependency"));
        assert!(compilation_error_explanation("error: cannot find symbol\n  symbol: class Foo")
            .starts_with("Missing symbol"));
        assert!(compilation_error_explanation("error: incompatible types: String cannot be converted to int")
            .starts_with("Type mismatch"));
        assert!(compilation_error_explanation("error: missing return statement")
            .starts_with("Missing return"));
        assert!(compilation_error_explanation("error: ';' expected").starts_with("Compilation failed"));
    }

    #[test]
    fn test_generation_metrics_add_explanation_only_on_failure() {
        let mut m = EvaluationMetrics::new();
        m.insert(keys::COMPILES, false).unwrap();
        m.insert(keys::COMPILATION_ERROR, "error: already defined").unwrap();
        record_generation_metrics(&mut m, 42.0, 10);
        assert_eq!(m.get_f64(keys::RESPONSE_TIME_MS), Some(42.0));
        assert_eq!(m.get_i64(keys::TOKENS_USED), Some(10));
        assert!(m
            .get_str(keys::COMPILATION_ERROR_EXPLANATION)
            .unwrap()
            .starts_with("Duplicate declaration"));

        let mut ok = EvaluationMetrics::new();
        ok.insert(keys::COMPILES, true).unwrap();
        record_generation_metrics(&mut ok, 1.0, 0);
        assert!(!ok.contains(keys::COMPILATION_ERROR_EXPLANATION));
    }
}
