// src/evaluator/functional.rs - Compilation and violation re-check
//
// Compiles the generated code where a toolchain exists, then decides whether
// the rule's violation is gone and whether new ones appeared. A missing or
// timed-out toolchain records `compiles = Unknown`, never `true`; languages
// without a compile step leave `compiles` out.

use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::imports::{default_import_hints, inject_missing_imports, missing_packages, strip_imports};
use super::utils::{run_tool, tool_available, write_source};
use super::{EvaluationInput, Evaluator};
use crate::benchmark::schema::Language;
use crate::core::metrics::{keys, EvaluationMetrics, MetricValue};
use crate::infra::config::{FunctionalConfig, ImportHint};
use crate::infra::errors::BenchError;

const ANALYZER_TIMEOUT: Duration = Duration::from_secs(60);

const PYTHON_SYNTAX_CHECK: &str = "import ast,sys; ast.parse(sys.stdin.read())";

#[allow(clippy::unwrap_used)]
static PUBLIC_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"public\s+(?:(?:abstract|final|sealed|static)\s+)*(?:class|interface|enum|record)\s+(\w+)")
        .unwrap()
});

#[allow(clippy::unwrap_used)]
static ANY_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|interface|enum|record)\s+([A-Za-z_]\w*)").unwrap()
});

/// Outcome of one compile attempt.
#[derive(Debug, Clone, PartialEq)]
enum Compiled {
    Ok,
    Failed(String),
    /// Toolchain missing or timed out.
    Unknown,
    /// The language has no compile step here.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
struct CompileReport {
    outcome: Compiled,
    injected: usize,
    stripped: usize,
}

impl CompileReport {
    fn bare(outcome: Compiled) -> Self {
        Self {
            outcome,
            injected: 0,
            stripped: 0,
        }
    }

    fn record(self, language: Language, metrics: &mut EvaluationMetrics) -> Result<(), BenchError> {
        match self.outcome {
            Compiled::Ok => metrics.insert(keys::COMPILES, true)?,
            Compiled::Failed(error) => {
                metrics.insert(keys::COMPILES, false)?;
                metrics.insert(keys::COMPILATION_ERROR, error)?;
            }
            Compiled::Unknown => metrics.insert(keys::COMPILES, MetricValue::Unknown)?,
            Compiled::Unsupported => return Ok(()),
        }
        if language == Language::Java {
            metrics.insert(keys::INJECTED_IMPORTS, self.injected)?;
            metrics.insert(keys::STRIPPED_IMPORTS, self.stripped)?;
        }
        Ok(())
    }
}

/// Result of the violation re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationCheck {
    pub resolved: bool,
    pub new_violations: usize,
}

impl ViolationCheck {
    /// Reported when the check itself could not run.
    const CONSERVATIVE: ViolationCheck = ViolationCheck {
        resolved: false,
        new_violations: 0,
    };
}

struct CompiledPattern {
    rule_id: String,
    regex: Regex,
}

pub struct FunctionalEvaluator {
    config: FunctionalConfig,
    patterns: Vec<CompiledPattern>,
    hints: Vec<ImportHint>,
}

impl FunctionalEvaluator {
    /// Fails on an invalid violation pattern.
    pub fn new(config: FunctionalConfig) -> Result<Self, BenchError> {
        let patterns = config
            .violation_patterns
            .iter()
            .map(|p| {
                Regex::new(&p.pattern)
                    .map(|regex| CompiledPattern {
                        rule_id: p.rule_id.clone(),
                        regex,
                    })
                    .map_err(|e| {
                        BenchError::Config(format!(
                            "invalid violation pattern for rule '{}': {}",
                            p.rule_id, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let hints = if config.import_hints.is_empty() {
            default_import_hints()
        } else {
            config.import_hints.clone()
        };

        Ok(Self {
            config,
            patterns,
            hints,
        })
    }

    fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.config.compile_timeout_secs.max(1))
    }

    async fn check_compilation(&self, code: &str, language: Language) -> CompileReport {
        match language {
            Language::Java => self.compile_java(code).await,
            Language::Python => CompileReport::bare(self.compile_python(code).await),
            _ => CompileReport::bare(Compiled::Unsupported),
        }
    }

    async fn compile_python(&self, code: &str) -> Compiled {
        match run_tool(
            "python3",
            ["-c", PYTHON_SYNTAX_CHECK],
            Some(code),
            None,
            self.compile_timeout(),
        )
        .await
        {
            Ok(Some(out)) if out.success => Compiled::Ok,
            Ok(Some(out)) => Compiled::Failed(last_error_line(&out.stderr)),
            Ok(None) => Compiled::Unknown,
            Err(e) => {
                tracing::debug!("Python syntax check unavailable: {}", e);
                Compiled::Unknown
            }
        }
    }

    async fn compile_java(&self, code: &str) -> CompileReport {
        if !tool_available("javac").await {
            return CompileReport::bare(Compiled::Unknown);
        }

        let (code, injected) = if self.config.auto_imports {
            inject_missing_imports(code, &self.hints)
        } else {
            (code.to_string(), Vec::new())
        };
        let mut report = CompileReport {
            outcome: Compiled::Unknown,
            injected: injected.len(),
            stripped: 0,
        };

        let first = self.javac(&code).await;
        let Compiled::Failed(error) = &first else {
            report.outcome = first;
            return report;
        };

        let packages = missing_packages(error);
        if packages.is_empty() {
            report.outcome = first;
            return report;
        }
        let (stripped_code, stripped) = strip_imports(&code, &packages);
        if stripped == 0 {
            report.outcome = first;
            return report;
        }

        tracing::debug!(
            "Retrying javac without {} import(s) from {:?}",
            stripped,
            packages
        );
        let second = self.javac(&stripped_code).await;
        if second == Compiled::Ok {
            report.stripped = stripped;
            report.outcome = second;
        } else {
            report.outcome = first;
        }
        report
    }

    async fn javac(&self, code: &str) -> Compiled {
        let Some(class_name) = java_type_name(code) else {
            return Compiled::Failed("no class, interface, enum or record declaration found".into());
        };

        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Cannot create compile directory: {}", e);
                return Compiled::Unknown;
            }
        };
        let source = match write_source(dir.path(), &format!("{class_name}.java"), code).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Cannot write Java source: {}", e);
                return Compiled::Unknown;
            }
        };
        let out_dir = dir.path().join("classes");

        let mut args: Vec<String> = vec!["-d".into(), out_dir.display().to_string()];
        if let Some(cp) = &self.config.stub_classpath {
            args.push("-cp".into());
            args.push(cp.clone());
        }
        args.push(source.display().to_string());

        match run_tool("javac", &args, None, Some(dir.path()), self.compile_timeout()).await {
            Ok(Some(out)) if out.success => Compiled::Ok,
            Ok(Some(out)) => {
                let text = if out.stderr.trim().is_empty() {
                    out.stdout
                } else {
                    out.stderr
                };
                Compiled::Failed(text.trim().to_string())
            }
            Ok(None) => Compiled::Unknown,
            Err(e) => {
                tracing::warn!("javac did not finish: {}", e);
                Compiled::Unknown
            }
        }
    }

    async fn check_violations(&self, input: &EvaluationInput) -> ViolationCheck {
        if input.generated_code.trim().is_empty() {
            return ViolationCheck::CONSERVATIVE;
        }
        match &self.config.analyzer_command {
            Some(command) => self.check_with_analyzer(command, input).await,
            None => self.check_with_patterns(input),
        }
    }

    async fn check_with_analyzer(&self, command: &str, input: &EvaluationInput) -> ViolationCheck {
        let original = self.analyze(command, &input.original_code, input.language).await;
        let generated = self.analyze(command, &input.generated_code, input.language).await;
        match (original, generated) {
            (Ok(before), Ok(after)) => ViolationCheck {
                resolved: !after.contains(&input.context.rule_id),
                new_violations: after.difference(&before).count(),
            },
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Static analysis failed: {}", e);
                ViolationCheck::CONSERVATIVE
            }
        }
    }

    /// Run `<command> <file>` and collect one rule ID per output line.
    async fn analyze(
        &self,
        command: &str,
        code: &str,
        language: Language,
    ) -> Result<BTreeSet<String>, BenchError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| BenchError::Config("analyzer_command is empty".into()))?;
        let dir = tempfile::tempdir()?;
        let file =
            write_source(dir.path(), &format!("snippet.{}", language.extension()), code).await?;

        let mut args: Vec<String> = parts.map(String::from).collect();
        args.push(file.display().to_string());

        let out = run_tool(program, &args, None, Some(dir.path()), ANALYZER_TIMEOUT)
            .await?
            .ok_or_else(|| BenchError::evaluator("functional", format!("{program} not found")))?;
        let exited_normally = out.success
            || out
                .exit_code
                .is_some_and(|c| self.config.analyzer_ok_exit_codes.contains(&c));
        if !exited_normally {
            return Err(BenchError::evaluator(
                "functional",
                format!("{program} exited with {:?}: {}", out.exit_code, out.stderr.trim()),
            ));
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn check_with_patterns(&self, input: &EvaluationInput) -> ViolationCheck {
        let rule_id = input.context.rule_id.as_str();
        let mut own: Vec<Regex> = self
            .patterns
            .iter()
            .filter(|p| p.rule_id == rule_id)
            .map(|p| p.regex.clone())
            .collect();
        if let Some(literal) = input.context.legacy_pattern.as_deref() {
            if let Ok(regex) = Regex::new(&regex::escape(literal)) {
                own.push(regex);
            }
        }

        let resolved = if own.is_empty() {
            normalize_ws(&input.generated_code) != normalize_ws(&input.original_code)
        } else {
            !own.iter().any(|r| r.is_match(&input.generated_code))
        };

        let new_violations = self
            .patterns
            .iter()
            .filter(|p| p.rule_id != rule_id)
            .filter(|p| {
                p.regex.is_match(&input.generated_code) && !p.regex.is_match(&input.original_code)
            })
            .map(|p| p.rule_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        ViolationCheck {
            resolved,
            new_violations,
        }
    }
}

/// Name javac expects the file to carry: the public type, else the first type.
fn java_type_name(code: &str) -> Option<String> {
    PUBLIC_TYPE
        .captures(code)
        .or_else(|| ANY_TYPE.captures(code))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("syntax error")
        .trim()
        .to_string()
}

fn normalize_ws(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Evaluator for FunctionalEvaluator {
    fn name(&self) -> &'static str {
        "functional"
    }

    fn keys(&self) -> &'static [&'static str] {
        &[
            keys::COMPILES,
            keys::COMPILATION_ERROR,
            keys::INJECTED_IMPORTS,
            keys::STRIPPED_IMPORTS,
            keys::FUNCTIONAL_CORRECTNESS,
            keys::INTRODUCES_VIOLATIONS,
            keys::NEW_VIOLATION_COUNT,
            keys::MATCHES_EXPECTED,
        ]
    }

    async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
        let mut metrics = EvaluationMetrics::new();

        if self.config.compile_check {
            self.check_compilation(&input.generated_code, input.language)
                .await
                .record(input.language, &mut metrics)?;
        }

        if self.config.static_analysis_rerun {
            let check = self.check_violations(input).await;
            metrics.insert(keys::FUNCTIONAL_CORRECTNESS, check.resolved)?;
            metrics.insert(keys::INTRODUCES_VIOLATIONS, check.new_violations > 0)?;
            metrics.insert(keys::NEW_VIOLATION_COUNT, check.new_violations)?;
        }

        if let Some(expected) = &input.expected_code {
            metrics.insert(
                keys::MATCHES_EXPECTED,
                expected.trim() == input.generated_code.trim(),
            )?;
        }

        Ok(metrics)
    }
}
