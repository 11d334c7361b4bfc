// src/provider/command.rs - Model adapter backed by an external command
//
// The prompt is written to the command's stdin and the response is read from
// stdout. Output may be plain text, or a JSON object with a `response` field
// and optional `tokens_used`, `cost` and `finish_reason`.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{calculate_cost, estimate_tokens, FinishReason, Generation, ModelProvider};
use crate::infra::config::ModelConfig;
use crate::infra::errors::BenchError;

pub struct CommandProvider {
    name: String,
    command: String,
    args: Vec<String>,
    input_price_per_mtok: f64,
    output_price_per_mtok: f64,
}

#[derive(Deserialize)]
struct StructuredOutput {
    response: String,
    #[serde(default)]
    tokens_used: Option<u64>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

impl CommandProvider {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            input_price_per_mtok: 0.0,
            output_price_per_mtok: 0.0,
        }
    }

    pub fn with_prices(mut self, input_per_mtok: f64, output_per_mtok: f64) -> Self {
        self.input_price_per_mtok = input_per_mtok;
        self.output_price_per_mtok = output_per_mtok;
        self
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, BenchError> {
        if config.command.trim().is_empty() {
            return Err(BenchError::Config(format!(
                "model '{}': command provider needs a command",
                config.name
            )));
        }
        Ok(Self::new(&config.name, &config.command, config.args.clone())
            .with_prices(config.input_price_per_mtok, config.output_price_per_mtok))
    }

    fn error(&self, message: impl Into<String>, retriable: bool) -> BenchError {
        BenchError::Provider {
            provider: self.name.clone(),
            message: message.into(),
            retriable,
        }
    }

    fn interpret(&self, prompt: &str, stdout: &str) -> Generation {
        let input_tokens = estimate_tokens(prompt);

        if let Ok(structured) = serde_json::from_str::<StructuredOutput>(stdout.trim()) {
            let tokens_used = structured
                .tokens_used
                .unwrap_or_else(|| input_tokens + estimate_tokens(&structured.response));
            let cost = structured.cost.unwrap_or_else(|| {
                calculate_cost(
                    input_tokens,
                    tokens_used.saturating_sub(input_tokens),
                    self.input_price_per_mtok,
                    self.output_price_per_mtok,
                )
            });
            return Generation {
                response: structured.response,
                tokens_used,
                cost,
                finish_reason: structured.finish_reason.unwrap_or_default(),
            };
        }

        let output_tokens = estimate_tokens(stdout);
        Generation {
            response: stdout.to_string(),
            tokens_used: input_tokens + output_tokens,
            cost: calculate_cost(
                input_tokens,
                output_tokens,
                self.input_price_per_mtok,
                self.output_price_per_mtok,
            ),
            finish_reason: FinishReason::Stop,
        }
    }
}

#[async_trait]
impl ModelProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, BenchError> {
        tracing::debug!(model = %self.name, "Running: {} {:?}", self.command, self.args);

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(format!("failed to start '{}': {}", self.command, e), false))?;

        // Feed stdin from its own task so a chatty child cannot fill stdout
        // while we are still writing.
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = prompt.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    tracing::debug!("Command closed stdin early: {}", e);
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.error(format!("waiting for command: {e}"), true))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(
                format!("exited with {}: {}", output.status, stderr.trim()),
                false,
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(self.interpret(prompt, &stdout))
    }
}
