// src/provider/retry.rs - Retry with exponential backoff for model providers
//
// Retries rate limits, retriable provider errors and timeouts.
// Everything else (bad command, non-zero exit, config errors) fails at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Generation, ModelProvider};
use crate::infra::errors::BenchError;

const MAX_RETRIES: u32 = 3;
const INITIAL_DELAY_MS: u64 = 2_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

/// Wraps a provider and retries `generate()` on transient errors.
pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    config: RetryConfig,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn ModelProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry `attempt` (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        Duration::from_millis((capped_ms * jitter) as u64)
    }
}

fn should_retry(error: &BenchError) -> bool {
    error.is_retriable()
}

fn rate_limit_delay(error: &BenchError) -> Option<Duration> {
    match error {
        BenchError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], reproducible per attempt.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, BenchError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(prompt).await {
                Ok(generation) => return Ok(generation),
                Err(e) => {
                    if !should_retry(&e) || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt, rate_limit_delay(&e));
                    tracing::warn!(
                        model = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
        retriable: bool,
    }

    impl Flaky {
        fn new(failures: u32, retriable: bool) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                retriable,
            }
        }
    }

    #[async_trait]
    impl ModelProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn generate(&self, _prompt: &str) -> Result<Generation, BenchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(BenchError::Provider {
                    provider: "flaky".into(),
                    message: "HTTP 503".into(),
                    retriable: self.retriable,
                });
            }
            Ok(Generation {
                response: "ok".into(),
                ..Generation::default()
            })
        }
    }

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let inner = Arc::new(Flaky::new(2, true));
        let provider = RetryProvider::with_config(inner.clone(), fast(3));
        let g = provider.generate("p").await.unwrap();
        assert_eq!(g.response, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(Flaky::new(10, true));
        let provider = RetryProvider::with_config(inner.clone(), fast(2));
        assert!(provider.generate("p").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retriable_fails_immediately() {
        let inner = Arc::new(Flaky::new(1, false));
        let provider = RetryProvider::with_config(inner.clone(), fast(5));
        assert!(provider.generate("p").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_should_retry_classification() {
        assert!(should_retry(&BenchError::RateLimited {
            provider: "p".into(),
            retry_after_ms: 5000,
        }));
        assert!(should_retry(&BenchError::Timeout {
            what: "Provider 'p'".into(),
            seconds: 120,
        }));
        assert!(!should_retry(&BenchError::Config("bad".into())));
    }

    #[test]
    fn test_rate_limit_delay_extraction() {
        let err = BenchError::RateLimited {
            provider: "p".into(),
            retry_after_ms: 3000,
        };
        assert_eq!(rate_limit_delay(&err), Some(Duration::from_millis(3000)));
        let zero = BenchError::RateLimited {
            provider: "p".into(),
            retry_after_ms: 0,
        };
        assert!(rate_limit_delay(&zero).is_none());
    }

    #[test]
    fn test_delay_for_attempt_exponential_and_capped() {
        let provider = RetryProvider::new(Arc::new(Flaky::new(0, true)));
        let d0 = provider.delay_for_attempt(0, None);
        let d1 = provider.delay_for_attempt(1, None);
        assert!(d0.as_millis() >= 1600 && d0.as_millis() <= 2400);
        assert!(d1.as_millis() >= 3200 && d1.as_millis() <= 4800);
        assert!(provider.delay_for_attempt(10, None).as_millis() <= 36_000);
        assert_eq!(
            provider
                .delay_for_attempt(0, Some(Duration::from_millis(10_000)))
                .as_millis(),
            10_100
        );
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {j} for attempt {attempt}");
        }
    }
}
