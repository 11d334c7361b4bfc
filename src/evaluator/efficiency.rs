// src/evaluator/efficiency.rs - Runtime and peak memory of the generated code
//
// Only Python candidates with test code are executed. The child is polled
// for liveness and its resident set size is sampled on every poll.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use super::utils::{tool_available, write_source};
use super::{EvaluationInput, Evaluator};
use crate::benchmark::schema::Language;
use crate::core::metrics::{keys, EvaluationMetrics};
use crate::infra::config::EfficiencyConfig;
use crate::infra::errors::BenchError;

const PYTHON: &str = "python3";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionSample {
    pub elapsed: Duration,
    pub peak_rss_bytes: u64,
    pub succeeded: bool,
    pub timed_out: bool,
}

pub struct EfficiencyEvaluator {
    config: EfficiencyConfig,
}

impl EfficiencyEvaluator {
    pub fn new(config: EfficiencyConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(1))
    }

    async fn execute(&self, program: &str) -> Result<ExecutionSample, BenchError> {
        let dir = tempfile::tempdir()?;
        let script = write_source(dir.path(), "bench_candidate.py", program).await?;

        let start = Instant::now();
        let mut child = Command::new(PYTHON)
            .arg(&script)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut peak = 0u64;
        loop {
            if let Some(pid) = child.id() {
                peak = peak.max(resident_set_bytes(pid).await.unwrap_or(0));
            }
            if let Some(status) = child.try_wait()? {
                return Ok(ExecutionSample {
                    elapsed: start.elapsed(),
                    peak_rss_bytes: peak,
                    succeeded: status.success(),
                    timed_out: false,
                });
            }
            if start.elapsed() >= self.timeout() {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed-out candidate: {}", e);
                }
                return Ok(ExecutionSample {
                    elapsed: self.timeout(),
                    peak_rss_bytes: peak,
                    succeeded: false,
                    timed_out: true,
                });
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}

/// `VmRSS` of a live process, from procfs.
async fn resident_set_bytes(pid: u32) -> Option<u64> {
    let status = tokio::fs::read_to_string(format!("/proc/{pid}/status"))
        .await
        .ok()?;
    parse_vm_rss(&status)
}

pub fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Setup code, candidate and test code joined into one script.
pub fn assemble_program(setup: Option<&str>, code: &str, test: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(setup) = setup.filter(|s| !s.trim().is_empty()) {
        parts.push(setup);
    }
    parts.push(code);
    parts.push(test);
    parts.join("\n\n")
}

#[async_trait]
impl Evaluator for EfficiencyEvaluator {
    fn name(&self) -> &'static str {
        "efficiency"
    }

    fn keys(&self) -> &'static [&'static str] {
        &[
            keys::EXECUTION_TIME_MS,
            keys::MEMORY_USAGE_MB,
            keys::EXECUTION_SUCCEEDED,
            keys::EXECUTION_TIMED_OUT,
        ]
    }

    async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
        let mut metrics = EvaluationMetrics::new();
        let Some(test_code) = input.context.test_code.as_deref().filter(|t| !t.trim().is_empty())
        else {
            return Ok(metrics);
        };
        if input.language != Language::Python {
            tracing::debug!("No efficiency runner for {}", input.language);
            return Ok(metrics);
        }
        if !tool_available(PYTHON).await {
            tracing::debug!("{} not available, skipping efficiency", PYTHON);
            return Ok(metrics);
        }

        let program = assemble_program(
            input.context.setup_code.as_deref(),
            &input.generated_code,
            test_code,
        );
        let sample = self.execute(&program).await?;

        metrics.insert(keys::EXECUTION_TIME_MS, sample.elapsed.as_secs_f64() * 1000.0)?;
        metrics.insert(
            keys::MEMORY_USAGE_MB,
            sample.peak_rss_bytes as f64 / (1024.0 * 1024.0),
        )?;
        metrics.insert(keys::EXECUTION_SUCCEEDED, sample.succeeded)?;
        metrics.insert(keys::EXECUTION_TIMED_OUT, sample.timed_out)?;
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_input(code: &str, test: Option<&str>) -> EvaluationInput {
        let mut input = EvaluationInput {
            generated_code: code.into(),
            language: Language::Python,
            ..EvaluationInput::default()
        };
        input.context.test_code = test.map(String::from);
        input
    }

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tpython3\nVmPeak:\t  20000 kB\nVmRSS:\t   10240 kB\nThreads:\t1\n";
        assert_eq!(parse_vm_rss(status), Some(10240 * 1024));
        assert_eq!(parse_vm_rss("Name:\tx\n"), None);
    }

    #[test]
    fn test_assemble_program() {
        assert_eq!(
            assemble_program(Some("import math"), "def f(): pass", "f()"),
            "import math\n\ndef f(): pass\n\nf()"
        );
        assert_eq!(assemble_program(Some("  "), "a", "b"), "a\n\nb");
    }

    #[tokio::test]
    async fn test_skipped_without_test_code() {
        let ev = EfficiencyEvaluator::new(EfficiencyConfig::default());
        let m = ev.evaluate(&python_input("x = 1", None)).await.unwrap();
        assert!(m.is_empty());
    }

    #[tokio::test]
    async fn test_skipped_for_java() {
        let ev = EfficiencyEvaluator::new(EfficiencyConfig::default());
        let mut input = python_input("class A {}", Some("new A();"));
        input.language = Language::Java;
        assert!(ev.evaluate(&input).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_runs_python_candidate() {
        if !tool_available(PYTHON).await {
            return;
        }
        let ev = EfficiencyEvaluator::new(EfficiencyConfig::default());
        let input = python_input("def double(x):\n    return x * 2\n", Some("assert double(2) == 4\n"));
        let m = ev.evaluate(&input).await.unwrap();
        assert_eq!(m.get_bool(keys::EXECUTION_SUCCEEDED), Some(true));
        assert_eq!(m.get_bool(keys::EXECUTION_TIMED_OUT), Some(false));
        assert!(m.get_f64(keys::EXECUTION_TIME_MS).unwrap() > 0.0);
        assert!(m.get_f64(keys::MEMORY_USAGE_MB).unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_failed_assertion_reported() {
        if !tool_available(PYTHON).await {
            return;
        }
        let ev = EfficiencyEvaluator::new(EfficiencyConfig::default());
        let input = python_input("def double(x):\n    return x\n", Some("assert double(2) == 4\n"));
        let m = ev.evaluate(&input).await.unwrap();
        assert_eq!(m.get_bool(keys::EXECUTION_SUCCEEDED), Some(false));
    }

    #[tokio::test]
    async fn test_timeout_is_hard_failure() {
        if !tool_available(PYTHON).await {
            return;
        }
        let ev = EfficiencyEvaluator::new(EfficiencyConfig {
            enabled: true,
            timeout_secs: 1,
            poll_interval_ms: 10,
        });
        let input = python_input("import time\n", Some("time.sleep(30)\n"));
        let m = ev.evaluate(&input).await.unwrap();
        assert_eq!(m.get_bool(keys::EXECUTION_TIMED_OUT), Some(true));
        assert_eq!(m.get_bool(keys::EXECUTION_SUCCEEDED), Some(false));
        assert_eq!(m.get_f64(keys::EXECUTION_TIME_MS), Some(1000.0));
    }
}
