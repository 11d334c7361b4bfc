// src/evaluator/quality.rs - Linter score, complexity, maintainability, style

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::utils::{run_tool, write_source};
use super::{EvaluationInput, Evaluator};
use crate::benchmark::schema::Language;
use crate::core::metrics::{keys, EvaluationMetrics};
use crate::infra::config::QualityConfig;
use crate::infra::errors::BenchError;

const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[allow(clippy::unwrap_used)]
static PYLINT_RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rated at (-?[\d.]+)/10").unwrap());

const C_FAMILY_BRANCHES: &[&str] = &["if", "for", "while", "case", "catch"];
const PYTHON_BRANCHES: &[&str] = &["if", "elif", "for", "while", "except", "and", "or"];

pub struct QualityEvaluator {
    config: QualityConfig,
}

impl QualityEvaluator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    fn uses(&self, tool: &str) -> bool {
        self.config.tools.iter().any(|t| t == tool)
    }

    async fn python_metrics(&self, code: &str, metrics: &mut EvaluationMetrics) -> Result<(), BenchError> {
        let dir = tempfile::tempdir()?;
        let file = write_source(dir.path(), "candidate.py", code).await?;

        if self.uses("pylint") {
            if let Some(score) = pylint_score(&file).await {
                metrics.insert(keys::PYLINT_SCORE, score)?;
            }
        }

        let mut tool_complexity = None;
        if self.uses("radon") {
            tool_complexity = radon_complexity(&file).await;
            if let Some(mi) = radon_maintainability(&file).await {
                metrics.insert(keys::MAINTAINABILITY_INDEX, mi)?;
            }
        }
        match tool_complexity {
            Some(cc) => {
                metrics.insert(keys::CYCLOMATIC_COMPLEXITY, cc)?;
                metrics.insert(keys::COMPLEXITY_METHOD, "tool")?;
            }
            None => {
                metrics.insert(
                    keys::CYCLOMATIC_COMPLEXITY,
                    heuristic_complexity(code, Language::Python),
                )?;
                metrics.insert(keys::COMPLEXITY_METHOD, "heuristic")?;
            }
        }

        if self.uses("black") {
            if let Some(violations) = black_violations(&file).await {
                metrics.insert(keys::STYLE_VIOLATIONS, violations)?;
            }
        }
        Ok(())
    }
}

/// 1 plus the number of branch keywords, matched as whole words.
pub fn heuristic_complexity(code: &str, language: Language) -> f64 {
    let branches = match language {
        Language::Python => PYTHON_BRANCHES,
        _ => C_FAMILY_BRANCHES,
    };
    let words = code
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| branches.contains(w))
        .count();
    let operators = if language == Language::Python {
        0
    } else {
        code.matches("&&").count() + code.matches("||").count()
    };
    (1 + words + operators) as f64
}

pub fn parse_pylint_rating(output: &str) -> Option<f64> {
    let value: f64 = PYLINT_RATING.captures(output)?.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 10.0))
}

/// Mean of the top-level `complexity` entries in `radon cc -j` output.
pub fn parse_radon_cc(json: &str) -> Option<f64> {
    let data: serde_json::Value = serde_json::from_str(json).ok()?;
    let values: Vec<f64> = data
        .as_object()?
        .values()
        .filter_map(|blocks| blocks.as_array())
        .flatten()
        .filter_map(|block| block.get("complexity").and_then(|c| c.as_f64()))
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn parse_radon_mi(json: &str) -> Option<f64> {
    let data: serde_json::Value = serde_json::from_str(json).ok()?;
    data.as_object()?
        .values()
        .find_map(|file| file.get("mi").and_then(|mi| mi.as_f64()))
        .map(|mi| mi.clamp(0.0, 100.0))
}

async fn pylint_score(file: &Path) -> Option<f64> {
    let arg = file.display().to_string();
    let out = run_tool("pylint", ["--score=y", "--output-format=text", arg.as_str()], None, None, TOOL_TIMEOUT)
        .await
        .map_err(|e| tracing::debug!("pylint failed: {}", e))
        .ok()??;
    parse_pylint_rating(&out.stdout).or_else(|| parse_pylint_rating(&out.stderr))
}

async fn radon_complexity(file: &Path) -> Option<f64> {
    let arg = file.display().to_string();
    let out = run_tool("radon", ["cc", "-j", arg.as_str()], None, None, TOOL_TIMEOUT)
        .await
        .map_err(|e| tracing::debug!("radon cc failed: {}", e))
        .ok()??;
    parse_radon_cc(&out.stdout)
}

async fn radon_maintainability(file: &Path) -> Option<f64> {
    let arg = file.display().to_string();
    let out = run_tool("radon", ["mi", "-j", arg.as_str()], None, None, TOOL_TIMEOUT)
        .await
        .map_err(|e| tracing::debug!("radon mi failed: {}", e))
        .ok()??;
    parse_radon_mi(&out.stdout)
}

/// 0 when black leaves the file unchanged, 1 when it would reformat it.
async fn black_violations(file: &Path) -> Option<i64> {
    let arg = file.display().to_string();
    let out = run_tool("black", ["--check", "--quiet", arg.as_str()], None, None, TOOL_TIMEOUT)
        .await
        .map_err(|e| tracing::debug!("black failed: {}", e))
        .ok()??;
    match out.exit_code {
        Some(0) => Some(0),
        Some(1) => Some(1),
        _ => None,
    }
}

#[async_trait]
impl Evaluator for QualityEvaluator {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn keys(&self) -> &'static [&'static str] {
        &[
            keys::PYLINT_SCORE,
            keys::CYCLOMATIC_COMPLEXITY,
            keys::COMPLEXITY_METHOD,
            keys::MAINTAINABILITY_INDEX,
            keys::STYLE_VIOLATIONS,
        ]
    }

    async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
        let mut metrics = EvaluationMetrics::new();
        if input.generated_code.trim().is_empty() {
            return Ok(metrics);
        }

        if input.language == Language::Python {
            self.python_metrics(&input.generated_code, &mut metrics).await?;
        } else {
            metrics.insert(
                keys::CYCLOMATIC_COMPLEXITY,
                heuristic_complexity(&input.generated_code, input.language),
            )?;
            metrics.insert(keys::COMPLEXITY_METHOD, "heuristic")?;
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_complexity_java() {
        let code = "if (a && b) { for (x : xs) {} } else if (c) {} // notify\ntry {} catch (E e) {}";
        // if, for, if, catch, &&
        assert_eq!(heuristic_complexity(code, Language::Java), 6.0);
        assert_eq!(heuristic_complexity("class A {}", Language::Java), 1.0);
    }

    #[test]
    fn test_heuristic_complexity_python() {
        let code = "def f(x):\n    if x and y:\n        return 1\n    elif x:\n        pass\n    for i in r:\n        pass\n";
        assert_eq!(heuristic_complexity(code, Language::Python), 5.0);
    }

    #[test]
    fn test_parse_pylint_rating() {
        let out = "------\nYour code has been rated at 7.50/10 (previous run: 7.50/10, +0.00)\n";
        assert_eq!(parse_pylint_rating(out), Some(7.5));
        assert_eq!(parse_pylint_rating("Your code has been rated at -3.00/10"), Some(0.0));
        assert_eq!(parse_pylint_rating("nothing"), None);
    }

    #[test]
    fn test_parse_radon_outputs() {
        let cc = r#"{"/tmp/candidate.py": [{"type": "function", "name": "f", "complexity": 3}, {"type": "function", "name": "g", "complexity": 1}]}"#;
        assert_eq!(parse_radon_cc(cc), Some(2.0));
        assert_eq!(parse_radon_cc(r#"{"/tmp/c.py": {"error": "invalid syntax"}}"#), None);

        let mi = r#"{"/tmp/candidate.py": {"mi": 81.25, "rank": "A"}}"#;
        assert_eq!(parse_radon_mi(mi), Some(81.25));
        assert_eq!(parse_radon_mi("not json"), None);
    }

    #[tokio::test]
    async fn test_java_uses_heuristic() {
        let ev = QualityEvaluator::new(QualityConfig::default());
        let input = EvaluationInput {
            generated_code: "public class A { void f() { if (x) {} } }".into(),
            language: Language::Java,
            ..EvaluationInput::default()
        };
        let m = ev.evaluate(&input).await.unwrap();
        assert_eq!(m.get_f64(keys::CYCLOMATIC_COMPLEXITY), Some(2.0));
        assert_eq!(m.get_str(keys::COMPLEXITY_METHOD), Some("heuristic"));
        assert!(!m.contains(keys::PYLINT_SCORE));
    }

    #[tokio::test]
    async fn test_python_without_tools_falls_back() {
        let ev = QualityEvaluator::new(QualityConfig {
            enabled: true,
            tools: Vec::new(),
        });
        let input = EvaluationInput {
            generated_code: "def f(x):\n    if x:\n        return 1\n".into(),
            language: Language::Python,
            ..EvaluationInput::default()
        };
        let m = ev.evaluate(&input).await.unwrap();
        assert_eq!(m.get_f64(keys::CYCLOMATIC_COMPLEXITY), Some(2.0));
        assert_eq!(m.get_str(keys::COMPLEXITY_METHOD), Some("heuristic"));
        assert!(!m.contains(keys::MAINTAINABILITY_INDEX));
        assert!(!m.contains(keys::STYLE_VIOLATIONS));
    }

    #[tokio::test]
    async fn test_empty_code_yields_nothing() {
        let ev = QualityEvaluator::new(QualityConfig::default());
        let m = ev.evaluate(&EvaluationInput::default()).await.unwrap();
        assert!(m.is_empty());
    }
}
