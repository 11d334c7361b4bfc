// src/benchmark/mod.rs - Test suites, prompts, and rule sources

pub mod prompt;
pub mod rule_fetcher;
pub mod schema;

pub use prompt::{BuiltPrompt, PromptBuilder};
pub use rule_fetcher::RuleFetcher;
pub use schema::{Language, Rule, RuleSeverity, TestCase, TestSuite};
