// src/evaluator/explainability.rs - Explanation and comment quality

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::utils::count_lines;
use super::{EvaluationInput, Evaluator};
use crate::core::metrics::{keys, EvaluationMetrics};
use crate::infra::errors::BenchError;
use crate::provider::{generate_with_timing, ModelProvider};

const GRADER_TIMEOUT: Duration = Duration::from_secs(60);

const KEY_TERMS: &[&str] = &[
    "changed", "replaced", "updated", "migrated", "fixed", "removed", "added",
];

#[allow(clippy::unwrap_used)]
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*•]|\d+[.)])\s+\S").unwrap());

#[allow(clippy::unwrap_used)]
static GRADE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

pub struct ExplainabilityEvaluator {
    grader: Option<Arc<dyn ModelProvider>>,
}

impl ExplainabilityEvaluator {
    pub fn new(grader: Option<Arc<dyn ModelProvider>>) -> Self {
        Self { grader }
    }

    async fn grade_with_model(
        &self,
        grader: &dyn ModelProvider,
        input: &EvaluationInput,
    ) -> Option<f64> {
        let prompt = format!(
            "Rate the following explanation of a code fix on a scale of 0 to 10, \
             where 10 is a clear, accurate and complete explanation. \
             Respond with the number only.\n\n\
             Original code:\n{}\n\nFixed code:\n{}\n\nExplanation:\n{}\n",
            input.original_code, input.generated_code, input.context.explanation
        );
        let reply = generate_with_timing(grader, &prompt, GRADER_TIMEOUT).await;
        if let Some(err) = reply.error {
            tracing::warn!("Grader model '{}' failed: {}", grader.name(), err);
            return None;
        }
        let score = parse_grade(&reply.response);
        if score.is_none() {
            tracing::warn!(
                "Grader model '{}' returned no usable score: {:?}",
                grader.name(),
                reply.response
            );
        }
        score
    }
}

/// First number in the reply, if it is a valid 0-10 grade.
pub fn parse_grade(reply: &str) -> Option<f64> {
    let value: f64 = GRADE.find(reply)?.as_str().parse().ok()?;
    (0.0..=10.0).contains(&value).then_some(value)
}

/// Heuristic 0-10 explanation score: base 5, adjusted for length, key verbs,
/// list structure and code references.
pub fn heuristic_score(explanation: &str) -> f64 {
    let mut score: f64 = 5.0;
    let words = explanation.split_whitespace().count();

    if words < 10 {
        score -= 3.0;
    } else if words < 20 {
        score -= 1.0;
    }
    if words > 200 {
        score -= 1.0;
    }

    let lower = explanation.to_lowercase();
    if KEY_TERMS.iter().any(|t| lower.contains(t)) {
        score += 1.0;
    }
    if LIST_MARKER.is_match(explanation) {
        score += 1.0;
    }
    if explanation.contains('`') || lower.contains("code") {
        score += 1.0;
    }

    score.clamp(0.0, 10.0)
}

#[async_trait]
impl Evaluator for ExplainabilityEvaluator {
    fn name(&self) -> &'static str {
        "explainability"
    }

    fn keys(&self) -> &'static [&'static str] {
        &[
            keys::HAS_EXPLANATION,
            keys::HAS_INLINE_COMMENTS,
            keys::COMMENT_DENSITY,
            keys::EXPLANATION_QUALITY_SCORE,
            keys::EXPLANATION_GRADER,
        ]
    }

    async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
        let explanation = input.context.explanation.trim();
        let lines = count_lines(&input.generated_code, input.language.line_comment());

        let mut metrics = EvaluationMetrics::new();
        metrics.insert(keys::HAS_EXPLANATION, !explanation.is_empty())?;
        metrics.insert(keys::HAS_INLINE_COMMENTS, lines.comment > 0)?;
        metrics.insert(keys::COMMENT_DENSITY, lines.comment_density())?;

        if explanation.is_empty() {
            return Ok(metrics);
        }

        let graded = match &self.grader {
            Some(grader) => self.grade_with_model(grader.as_ref(), input).await,
            None => None,
        };
        let (score, grader) = match graded {
            Some(score) => (score, "llm"),
            None => (heuristic_score(explanation), "heuristic"),
        };
        metrics.insert(keys::EXPLANATION_QUALITY_SCORE, score)?;
        metrics.insert(keys::EXPLANATION_GRADER, grader)?;
        Ok(metrics)
    }
}
