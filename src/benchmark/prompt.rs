// src/benchmark/prompt.rs - Prompt rendering with migration guidance

use minijinja::{context, Environment};

use crate::benchmark::schema::{Rule, TestCase, TestSuite};
use crate::infra::config::GuidanceEntry;
use crate::infra::errors::BenchError;

/// A rendered prompt plus a tag recording where its template came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub text: String,
    /// `default`, `custom`, or either with a `+config:<source>-to-<target>` suffix.
    pub source: String,
}

pub struct PromptBuilder {
    env: Environment<'static>,
    default_template: String,
    guidance: Vec<GuidanceEntry>,
}

impl PromptBuilder {
    pub fn new(default_template: impl Into<String>, guidance: Vec<GuidanceEntry>) -> Self {
        Self {
            env: Environment::new(),
            default_template: default_template.into(),
            guidance,
        }
    }

    pub fn build(
        &self,
        suite: &TestSuite,
        rule: &Rule,
        test_case: &TestCase,
        rule_message: &str,
    ) -> Result<BuiltPrompt, BenchError> {
        let (template, mut source) = match suite.prompt.as_deref() {
            Some(custom) if !custom.trim().is_empty() => (custom, "custom".to_string()),
            _ => (self.default_template.as_str(), "default".to_string()),
        };

        let migration_source = suite.migration_source();
        let migration_target = suite.migration_target();
        let mut migration_guidance = String::new();
        if migration_source.is_some() || migration_target.is_some() {
            if let Some(entry) = self.find_guidance(migration_source, migration_target) {
                migration_guidance = guidance_text(entry);
                source = format!(
                    "{}+config:{}-to-{}",
                    source,
                    migration_source.unwrap_or("any"),
                    migration_target.unwrap_or("any")
                );
            }
        }

        let text = self
            .env
            .render_str(
                template,
                context! {
                    rule_id => rule.rule_id,
                    rule_description => rule.description,
                    rule_message => rule_message,
                    migration_guidance => migration_guidance,
                    language => test_case.language.as_str(),
                    code_snippet => test_case.code_snippet,
                    context => test_case.context,
                },
            )
            .map_err(|e| BenchError::Config(format!("prompt template: {e}")))?;

        Ok(BuiltPrompt { text, source })
    }

    /// Exact (source, target) match, then a target-only entry when no source
    /// is given, then the catch-all entry.
    pub fn find_guidance(
        &self,
        source: Option<&str>,
        target: Option<&str>,
    ) -> Option<&GuidanceEntry> {
        if source.is_none() && target.is_none() {
            return None;
        }

        if let Some(entry) = self
            .guidance
            .iter()
            .find(|g| g.source.as_deref() == source && g.target.as_deref() == target)
        {
            return Some(entry);
        }

        if source.is_none() && target.is_some() {
            if let Some(entry) = self
                .guidance
                .iter()
                .find(|g| g.source.is_none() && g.target.as_deref() == target)
            {
                return Some(entry);
            }
        }

        self.guidance
            .iter()
            .find(|g| g.source.is_none() && g.target.is_none())
    }
}

fn guidance_text(entry: &GuidanceEntry) -> String {
    let mut parts: Vec<String> = Vec::new();
    let base = entry.base_guidance.trim();
    if !base.is_empty() {
        parts.push(base.to_string());
    }
    for pattern in &entry.patterns {
        let guidance = pattern.guidance.trim();
        if !pattern.name.is_empty() && !guidance.is_empty() {
            parts.push(format!("{}:\n{}", pattern.name, guidance));
        }
    }
    parts.join("\n\n")
}
