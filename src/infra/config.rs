// src/infra/config.rs - Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::ranking::WeightScheme;
use crate::infra::errors::BenchError;

pub const DEFAULT_CONFIG_FILE: &str = "fixbench.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub evaluators: EvaluatorsConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelConfig>,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidance: Vec<GuidanceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Models evaluated concurrently per test case (1 = sequential).
    pub parallel: usize,
    pub limit: Option<usize>,
    pub provider_timeout_secs: u64,
    pub output_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: 1,
            limit: None,
            provider_timeout_secs: 120,
            output_dir: "results".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub scheme: WeightScheme,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorsConfig {
    pub functional: FunctionalConfig,
    pub quality: QualityConfig,
    pub security: SecurityConfig,
    pub efficiency: EfficiencyConfig,
    pub explainability: ExplainabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionalConfig {
    pub enabled: bool,
    pub compile_check: bool,
    pub static_analysis_rerun: bool,
    /// External analyzer invoked as `<cmd> <file>`; prints one violated rule ID per line.
    pub analyzer_command: Option<String>,
    /// Analyzer exit codes that mean "ran normally"; many linters exit 1
    /// when they report findings (or, like grep, when they find none).
    pub analyzer_ok_exit_codes: Vec<i32>,
    pub auto_imports: bool,
    /// Extra classpath handed to `javac -cp` (stub jars for third-party APIs).
    pub stub_classpath: Option<String>,
    pub compile_timeout_secs: u64,
    pub violation_patterns: Vec<ViolationPattern>,
    /// Replaces the built-in annotation/type -> import table when non-empty.
    pub import_hints: Vec<ImportHint>,
}

impl Default for FunctionalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compile_check: true,
            static_analysis_rerun: true,
            analyzer_command: None,
            analyzer_ok_exit_codes: vec![0, 1],
            auto_imports: true,
            stub_classpath: None,
            compile_timeout_secs: 30,
            violation_patterns: Vec::new(),
            import_hints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationPattern {
    pub rule_id: String,
    /// Regex whose presence in the code means the rule is violated.
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHint {
    /// Annotation or type token, e.g. `@Inject` or `EntityManager`.
    pub token: String,
    #[serde(default)]
    pub legacy: Option<String>,
    #[serde(default)]
    pub jakarta: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub enabled: bool,
    pub tools: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tools: vec!["pylint".into(), "radon".into(), "black".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub tools: Vec<String>,
    pub migration_checks: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tools: vec!["bandit".into()],
            migration_checks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 30,
            poll_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainabilityConfig {
    pub enabled: bool,
    pub use_llm_grader: bool,
    /// Name of a `[[models]]` entry used as the grader.
    pub grader_model: Option<String>,
}

impl Default for ExplainabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_llm_grader: false,
            grader_model: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub input_price_per_mtok: f64,
    #[serde(default)]
    pub output_price_per_mtok: f64,
    #[serde(default)]
    pub retries: u32,
}

fn default_provider() -> String {
    "command".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub default: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_PROMPT.into(),
        }
    }
}

pub const DEFAULT_PROMPT: &str = "\
You are fixing a static-analysis violation as part of a code migration.

Rule: {{ rule_id }}
Description: {{ rule_description }}
{% if rule_message %}Analyzer message: {{ rule_message }}
{% endif %}{% if migration_guidance %}
Migration guidance:
{{ migration_guidance }}
{% endif %}
Context: {{ context }}

Original {{ language }} code:
```{{ language }}
{{ code_snippet }}
```

Respond with:
FIXED CODE:
```{{ language }}
<complete fixed code>
```

EXPLANATION:
<what you changed and why>
";

/// One `[[guidance]]` entry. `source`/`target` of `None` act as wildcards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuidanceEntry {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub base_guidance: String,
    #[serde(default)]
    pub patterns: Vec<GuidancePattern>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuidancePattern {
    pub name: String,
    pub guidance: String,
}

impl Config {
    /// Load `fixbench.toml` from the working directory, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        for model in &mut config.models {
            model.args = model.args.iter().map(|a| expand_env(a)).collect();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.run.parallel == 0 {
            return Err(BenchError::Config("run.parallel must be at least 1".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(BenchError::Config(format!(
                    "duplicate model name '{}'",
                    model.name
                )));
            }
        }
        let grader = &self.evaluators.explainability;
        if grader.use_llm_grader {
            if let Some(name) = &grader.grader_model {
                if !self.models.iter().any(|m| &m.name == name) {
                    return Err(BenchError::Config(format!(
                        "grader_model '{}' is not a configured model",
                        name
                    )));
                }
            }
        }
        for vp in &self.evaluators.functional.violation_patterns {
            regex::Regex::new(&vp.pattern).map_err(|e| {
                BenchError::Config(format!("bad pattern for rule '{}': {}", vp.rule_id, e))
            })?;
        }
        Ok(())
    }

    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Expand a whole-value `${VAR}` reference; other strings pass through.
pub fn expand_env(value: &str) -> String {
    if let Some(var) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        return std::env::var(var).unwrap_or_default();
    }
    value.to_string()
}
