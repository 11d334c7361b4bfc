// src/core/ranking.rs - Composite 0-100 score and model ranking

use serde::{Deserialize, Serialize};

use crate::core::aggregate::{mean, ModelAggregate};

/// Which weighting of sub-scores the composite uses.
///
/// Both schemes sum to 100. Unavailable sub-scores contribute nothing and
/// the remaining weights are not renormalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScheme {
    /// pass 50, compile 20, quality 20, speed 5, cost 5
    Classic,
    /// pass 40, compile 15, quality 15, security 15, explainability 10,
    /// speed 2.5, cost 2.5
    #[default]
    Extended,
}

/// Percent weights per sub-score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub pass_rate: f64,
    pub compile_rate: f64,
    pub quality: f64,
    pub security: f64,
    pub explainability: f64,
    pub speed: f64,
    pub cost: f64,
}

impl Weights {
    pub fn total(&self) -> f64 {
        self.pass_rate
            + self.compile_rate
            + self.quality
            + self.security
            + self.explainability
            + self.speed
            + self.cost
    }
}

impl WeightScheme {
    pub fn weights(self) -> Weights {
        match self {
            WeightScheme::Classic => Weights {
                pass_rate: 50.0,
                compile_rate: 20.0,
                quality: 20.0,
                security: 0.0,
                explainability: 0.0,
                speed: 5.0,
                cost: 5.0,
            },
            WeightScheme::Extended => Weights {
                pass_rate: 40.0,
                compile_rate: 15.0,
                quality: 15.0,
                security: 15.0,
                explainability: 10.0,
                speed: 2.5,
                cost: 2.5,
            },
        }
    }
}

impl std::fmt::Display for WeightScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightScheme::Classic => write!(f, "classic"),
            WeightScheme::Extended => write!(f, "extended"),
        }
    }
}

/// Normalized [0, 100] sub-scores. `None` when no result produced the
/// underlying metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScores {
    pub quality: Option<f64>,
    pub security: Option<f64>,
    pub explainability: Option<f64>,
    pub speed: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRanking {
    pub model_name: String,
    pub score: f64,
    pub pass_rate: f64,
    pub compile_rate: f64,
    pub tests_passed: usize,
    pub tests_total: usize,
    pub avg_response_time_ms: f64,
    pub total_cost: f64,
    pub avg_complexity: Option<f64>,
    pub avg_pylint_score: Option<f64>,
    pub avg_maintainability: Option<f64>,
    pub avg_security_issues: Option<f64>,
    pub avg_explanation_score: Option<f64>,
    pub avg_comment_density: Option<f64>,
    pub sub_scores: SubScores,
}

fn clamp100(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

pub fn complexity_score(avg_complexity: f64) -> f64 {
    clamp100(100.0 - (avg_complexity - 1.0) * 3.33)
}

/// Score a comment-lines/code-lines ratio: 100 inside 10%..=30%, decaying
/// linearly on both sides.
pub fn comment_density_score(density: f64) -> f64 {
    let pct = density * 100.0;
    if (10.0..=30.0).contains(&pct) {
        100.0
    } else if pct > 30.0 {
        clamp100(100.0 - (pct - 30.0) * 3.33)
    } else if pct > 0.0 {
        clamp100(pct * 10.0)
    } else {
        0.0
    }
}

pub fn speed_score(avg_response_time_ms: f64) -> f64 {
    clamp100(100.0 - avg_response_time_ms / 100.0)
}

pub fn cost_score(total_cost: f64) -> f64 {
    if total_cost == 0.0 {
        100.0
    } else {
        clamp100(100.0 - total_cost * 100.0)
    }
}

pub fn security_score(avg_issues: f64) -> f64 {
    clamp100(100.0 - avg_issues * 20.0)
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Compute one model's composite score and its constituents.
pub fn score_model(agg: &ModelAggregate, weights: &Weights) -> ModelRanking {
    let pass_rate = rate(agg.passed, agg.total);
    let compile_rate = rate(agg.compiled, agg.total);
    let avg_response_time_ms = mean(&agg.response_times).unwrap_or(0.0);
    let total_cost: f64 = agg.costs.iter().sum();

    let avg_complexity = mean(&agg.complexities);
    let avg_maintainability = mean(&agg.maintainability_scores);
    let avg_security_issues = mean(&agg.security_issues);
    let avg_explanation_score = mean(&agg.explanation_scores);
    let avg_comment_density = mean(&agg.comment_densities);

    let quality_parts: Vec<f64> = [
        avg_complexity.map(complexity_score),
        avg_maintainability.map(clamp100),
    ]
    .into_iter()
    .flatten()
    .collect();
    let explain_parts: Vec<f64> = [
        avg_explanation_score.map(|s| clamp100(s * 10.0)),
        avg_comment_density.map(comment_density_score),
    ]
    .into_iter()
    .flatten()
    .collect();

    let sub_scores = SubScores {
        quality: mean(&quality_parts),
        security: avg_security_issues.map(security_score),
        explainability: mean(&explain_parts),
        speed: speed_score(avg_response_time_ms),
        cost: cost_score(total_cost),
    };

    let score = (pass_rate * weights.pass_rate
        + compile_rate * weights.compile_rate
        + sub_scores.quality.unwrap_or(0.0) * weights.quality
        + sub_scores.security.unwrap_or(0.0) * weights.security
        + sub_scores.explainability.unwrap_or(0.0) * weights.explainability
        + sub_scores.speed * weights.speed
        + sub_scores.cost * weights.cost)
        / 100.0;

    ModelRanking {
        model_name: agg.model_name.clone(),
        score: clamp100(score),
        pass_rate,
        compile_rate,
        tests_passed: agg.passed,
        tests_total: agg.total,
        avg_response_time_ms,
        total_cost,
        avg_complexity,
        avg_pylint_score: mean(&agg.pylint_scores),
        avg_maintainability,
        avg_security_issues,
        avg_explanation_score,
        avg_comment_density,
        sub_scores,
    }
}

/// Rank models by composite score, highest first. Exact ties keep their
/// input order.
pub fn rank_models(aggregates: &[ModelAggregate], scheme: WeightScheme) -> Vec<ModelRanking> {
    let weights = scheme.weights();
    let mut rankings: Vec<ModelRanking> = aggregates
        .iter()
        .map(|agg| score_model(agg, &weights))
        .collect();
    rankings.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rankings
}
