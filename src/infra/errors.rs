// src/infra/errors.rs - Error types for fixbench

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("{what} timed out after {seconds}s")]
    Timeout { what: String, seconds: u64 },

    // Evaluation errors (contained per evaluator)
    #[error("Evaluator '{evaluator}' failed: {message}")]
    Evaluator { evaluator: String, message: String },

    #[error("Metric '{key}' value {value} is outside its {scale} scale")]
    MetricOutOfRange {
        key: String,
        value: f64,
        scale: String,
    },

    #[error("Metric '{key}' already set; evaluator '{evaluator}' may not overwrite it")]
    MetricCollision { key: String, evaluator: String },

    // User errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Benchmark suite error: {0}")]
    Suite(String),

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BenchError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            BenchError::Provider {
                retriable: true,
                ..
            } | BenchError::RateLimited { .. }
                | BenchError::Timeout { .. }
        )
    }

    pub fn evaluator(evaluator: &str, message: impl Into<String>) -> Self {
        BenchError::Evaluator {
            evaluator: evaluator.to_string(),
            message: message.into(),
        }
    }
}
