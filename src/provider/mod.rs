// src/provider/mod.rs - Model provider layer

pub mod command;
pub mod extract;
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::config::ModelConfig;
use crate::infra::errors::BenchError;

pub use extract::extract_code_and_explanation;

/// Core trait that every model under test implements.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Model name used in results and rankings.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Generation, BenchError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub response: String,
    pub tokens_used: u64,
    pub cost: f64,
    pub finish_reason: FinishReason,
}

/// A generation with elapsed time. Errors are carried as a sentinel in
/// `error` instead of being returned.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedGeneration {
    pub response: String,
    pub tokens_used: u64,
    pub cost: f64,
    pub finish_reason: FinishReason,
    pub response_time_ms: f64,
    pub error: Option<String>,
}

/// Call the provider under a timeout and measure wall-clock time.
pub async fn generate_with_timing(
    provider: &dyn ModelProvider,
    prompt: &str,
    timeout: Duration,
) -> TimedGeneration {
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, provider.generate(prompt)).await;
    let response_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let error = match outcome {
        Ok(Ok(generation)) => {
            return TimedGeneration {
                response: generation.response,
                tokens_used: generation.tokens_used,
                cost: generation.cost,
                finish_reason: generation.finish_reason,
                response_time_ms,
                error: None,
            }
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => BenchError::Timeout {
            what: format!("Provider '{}'", provider.name()),
            seconds: timeout.as_secs(),
        }
        .to_string(),
    };

    TimedGeneration {
        response: String::new(),
        tokens_used: 0,
        cost: 0.0,
        finish_reason: FinishReason::Error,
        response_time_ms,
        error: Some(error),
    }
}

/// Rough token estimate: ~4 characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Cost in USD given token counts and per-million-token prices.
pub fn calculate_cost(
    input_tokens: u64,
    output_tokens: u64,
    input_price_per_mtok: f64,
    output_price_per_mtok: f64,
) -> f64 {
    (input_tokens as f64 * input_price_per_mtok + output_tokens as f64 * output_price_per_mtok)
        / 1_000_000.0
}

/// Build the provider for one `[[models]]` entry, wrapped in retries when
/// `retries > 0`.
pub fn build_provider(config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, BenchError> {
    let base: Arc<dyn ModelProvider> = match config.provider.as_str() {
        "command" => Arc::new(command::CommandProvider::from_config(config)?),
        other => {
            return Err(BenchError::Config(format!(
                "model '{}': unknown provider '{}' (supported: command)",
                config.name, other
            )))
        }
    };

    if config.retries == 0 {
        return Ok(base);
    }
    Ok(Arc::new(retry::RetryProvider::with_config(
        base,
        retry::RetryConfig {
            max_retries: config.retries,
            ..retry::RetryConfig::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl ModelProvider for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn generate(&self, _prompt: &str) -> Result<Generation, BenchError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Generation::default())
        }
    }

    struct Failing;

    #[async_trait]
    impl ModelProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn generate(&self, _prompt: &str) -> Result<Generation, BenchError> {
            Err(BenchError::Provider {
                provider: "failing".into(),
                message: "HTTP 500".into(),
                retriable: true,
            })
        }
    }

    struct Echo;

    #[async_trait]
    impl ModelProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, prompt: &str) -> Result<Generation, BenchError> {
            Ok(Generation {
                response: prompt.to_string(),
                tokens_used: 7,
                cost: 0.5,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    #[tokio::test]
    async fn test_timing_success() {
        let g = generate_with_timing(&Echo, "hi", Duration::from_secs(1)).await;
        assert!(g.error.is_none());
        assert_eq!(g.response, "hi");
        assert_eq!(g.tokens_used, 7);
        assert!(g.response_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_timing_converts_error_to_sentinel() {
        let g = generate_with_timing(&Failing, "hi", Duration::from_secs(1)).await;
        assert!(g.error.unwrap().contains("HTTP 500"));
        assert_eq!(g.finish_reason, FinishReason::Error);
        assert!(g.response.is_empty());
    }

    #[tokio::test]
    async fn test_timing_timeout() {
        let g = generate_with_timing(&Slow, "hi", Duration::from_millis(100)).await;
        let err = g.error.unwrap();
        assert!(err.contains("timed out"), "{err}");
    }

    #[test]
    fn test_cost_math() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcde"), 2);
        let c = calculate_cost(1_000_000, 500_000, 3.0, 15.0);
        assert!((c - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let cfg = ModelConfig {
            name: "m".into(),
            provider: "openai".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(build_provider(&cfg), Err(BenchError::Config(_))));
    }
}
