// src/benchmark/schema.rs - Test suite data model and YAML loading

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::infra::errors::BenchError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Java,
    Python,
    Javascript,
    Typescript,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Go => "go",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Python => "py",
            Language::Javascript => "js",
            Language::Typescript => "ts",
            Language::Go => "go",
        }
    }

    /// Prefix that starts a single-line comment.
    pub fn line_comment(&self) -> &'static str {
        match self {
            Language::Python => "#",
            _ => "//",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete instance of code violating a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub code_snippet: String,
    #[serde(default)]
    pub expected_fix: Option<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub setup_code: Option<String>,
    #[serde(default)]
    pub test_code: Option<String>,
    #[serde(default)]
    pub expected_metrics: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: RuleSeverity,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Transformation hint, e.g. `@Stateless -> @ApplicationScoped`.
    #[serde(default)]
    pub migration_pattern: Option<String>,
    /// URL (or local path) of the ruleset document defining this rule.
    #[serde(default)]
    pub source: Option<String>,
}

impl Rule {
    /// Left-hand side of `migration_pattern` when written as `old -> new`.
    pub fn legacy_pattern(&self) -> Option<&str> {
        let pattern = self.migration_pattern.as_deref()?;
        let (old, _) = pattern.split_once("->")?;
        let old = old.trim();
        (!old.is_empty()).then_some(old)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Custom prompt template overriding the configured default.
    #[serde(default)]
    pub prompt: Option<String>,
}

fn default_version() -> String {
    "1.0.0".into()
}

impl TestSuite {
    pub fn test_case_count(&self) -> usize {
        self.rules.iter().map(|r| r.test_cases.len()).sum()
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn migration_source(&self) -> Option<&str> {
        self.metadata_str("migration_source")
    }

    pub fn migration_target(&self) -> Option<&str> {
        self.metadata_str("migration_target")
    }

    pub fn from_yaml(text: &str) -> Result<Self, BenchError> {
        let suite: TestSuite = serde_yml::from_str(text)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Load a suite from a YAML file, or merge every `*.yaml`/`*.yml` in a
    /// directory (sorted by file name) into one suite.
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        if !path.is_dir() {
            let text = std::fs::read_to_string(path)?;
            return Self::from_yaml(&text);
        }

        let mut files: Vec<_> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "yaml" || e == "yml")
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(BenchError::Suite(format!(
                "no .yaml files found in {}",
                path.display()
            )));
        }

        let mut merged: Option<TestSuite> = None;
        for file in &files {
            tracing::debug!("Loading suite file {}", file.display());
            let text = std::fs::read_to_string(file)?;
            let suite: TestSuite = serde_yml::from_str(&text).map_err(|e| {
                BenchError::Suite(format!("{}: {}", file.display(), e))
            })?;
            match merged.as_mut() {
                None => merged = Some(suite),
                Some(acc) => {
                    acc.rules.extend(suite.rules);
                    for (k, v) in suite.metadata {
                        acc.metadata.entry(k).or_insert(v);
                    }
                    if acc.prompt.is_none() {
                        acc.prompt = suite.prompt;
                    }
                }
            }
        }

        let mut suite = merged.ok_or_else(|| BenchError::Suite("empty suite".into()))?;
        if files.len() > 1 {
            suite.name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&suite.name)
                .to_string();
        }
        suite.validate()?;
        Ok(suite)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        for rule in &self.rules {
            if rule.rule_id.trim().is_empty() {
                return Err(BenchError::Suite("rule with empty rule_id".into()));
            }
            let mut seen = HashSet::new();
            for tc in &rule.test_cases {
                if !seen.insert(tc.id.as_str()) {
                    return Err(BenchError::Suite(format!(
                        "duplicate test case id '{}' in rule '{}'",
                        tc.id, rule.rule_id
                    )));
                }
                if tc.code_snippet.trim().is_empty() {
                    return Err(BenchError::Suite(format!(
                        "test case '{}' in rule '{}' has an empty code_snippet",
                        tc.id, rule.rule_id
                    )));
                }
            }
        }
        Ok(())
    }
}
