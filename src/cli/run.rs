// src/cli/run.rs - `fixbench run` and `fixbench validate`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::progress::spawn_progress_printer;
use super::rank::render_rankings;
use crate::benchmark::{PromptBuilder, RuleFetcher, TestSuite};
use crate::core::aggregate::aggregate_by_model;
use crate::core::engine::EvaluationEngine;
use crate::core::ranking::{rank_models, WeightScheme};
use crate::core::results::write_results;
use crate::evaluator::EvaluatorRegistry;
use crate::infra::config::{Config, ModelConfig};
use crate::provider::{build_provider, ModelProvider};

/// Flags of `fixbench run` that override `[run]` settings.
pub struct RunArgs {
    pub suite: PathBuf,
    pub models: Vec<String>,
    pub parallel: Option<usize>,
    pub limit: Option<usize>,
    pub output: Option<PathBuf>,
    pub scheme: Option<WeightScheme>,
    pub quiet: bool,
}

/// Configured models, restricted to `names` when any are given.
pub fn select_models<'a>(
    config: &'a Config,
    names: &[String],
) -> anyhow::Result<Vec<&'a ModelConfig>> {
    if config.models.is_empty() {
        anyhow::bail!("no models configured; add [[models]] entries to the config file");
    }
    if names.is_empty() {
        return Ok(config.models.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            config
                .model(name)
                .ok_or_else(|| anyhow::anyhow!("unknown model '{}'", name))
        })
        .collect()
}

fn build_grader(
    config: &Config,
    selected: &[&ModelConfig],
) -> anyhow::Result<Option<Arc<dyn ModelProvider>>> {
    let ex = &config.evaluators.explainability;
    if !ex.enabled || !ex.use_llm_grader {
        return Ok(None);
    }
    let model = match &ex.grader_model {
        Some(name) => config.model(name),
        None => selected.first().copied(),
    };
    match model {
        Some(m) => {
            tracing::info!("Explanation grader: {}", m.name);
            Ok(Some(build_provider(m)?))
        }
        None => Ok(None),
    }
}

pub async fn run_suite(args: RunArgs, config: &Config) -> anyhow::Result<()> {
    let suite = TestSuite::load(&args.suite)?;
    let selected = select_models(config, &args.models)?;

    let models = selected
        .iter()
        .map(|m| build_provider(m))
        .collect::<Result<Vec<_>, _>>()?;
    let grader = build_grader(config, &selected)?;
    let registry = Arc::new(EvaluatorRegistry::from_config(config, grader)?);
    tracing::info!(
        "Suite '{}': {} rule(s), evaluators: {}",
        suite.name,
        suite.rules.len(),
        registry.names().join(", ")
    );

    let parallel = args.parallel.unwrap_or(config.run.parallel).max(1);
    let engine = EvaluationEngine::new(
        models,
        registry,
        PromptBuilder::new(config.prompts.default.clone(), config.guidance.clone()),
        Arc::new(RuleFetcher::new()),
    )
    .with_parallel(parallel)
    .with_limit(args.limit.or(config.run.limit))
    .with_provider_timeout(Duration::from_secs(config.run.provider_timeout_secs));

    let (tx, rx) = mpsc::channel(256);
    let printer = spawn_progress_printer(rx, parallel, args.quiet);
    let results = engine.evaluate(&suite, tx).await;
    printer.await?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.run.output_dir));
    let path = write_results(&output, &results)?;
    eprintln!("Results written to {}", path.display());

    if results.is_empty() {
        return Ok(());
    }
    let scheme = args.scheme.unwrap_or(config.ranking.scheme);
    let rankings = rank_models(&aggregate_by_model(&results), scheme);
    print!("{}", render_rankings(&rankings, scheme));
    Ok(())
}

pub fn run_validate(path: &Path) -> anyhow::Result<()> {
    let suite = TestSuite::load(path)?;
    println!(
        "{}: {} rule(s), {} test case(s)",
        suite.name,
        suite.rules.len(),
        suite.test_case_count()
    );
    for rule in &suite.rules {
        println!("  {} ({} test case(s))", rule.rule_id, rule.test_cases.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(names: &[&str]) -> Config {
        let mut config = Config::default();
        config.models = names
            .iter()
            .map(|n| ModelConfig {
                name: n.to_string(),
                provider: "command".into(),
                command: "cat".into(),
                ..Default::default()
            })
            .collect();
        config
    }

    #[test]
    fn test_select_all_models_by_default() {
        let config = config_with(&["a", "b"]);
        let selected = select_models(&config, &[]).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_named_models_in_given_order() {
        let config = config_with(&["a", "b", "c"]);
        let selected = select_models(&config, &["c".into(), "a".into()]).unwrap();
        let names: Vec<&str> = selected.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[test]
    fn test_select_unknown_model_fails() {
        let config = config_with(&["a"]);
        let err = select_models(&config, &["zzz".into()]).unwrap_err();
        assert!(err.to_string().contains("zzz"));
        assert!(select_models(&Config::default(), &[]).is_err());
    }

    #[test]
    fn test_grader_only_when_enabled() {
        let mut config = config_with(&["a", "judge"]);
        let selected = select_models(&config, &[]).unwrap();
        assert!(build_grader(&config, &selected).unwrap().is_none());

        config.evaluators.explainability.use_llm_grader = true;
        config.evaluators.explainability.grader_model = Some("judge".into());
        let selected = select_models(&config, &["a".into()]).unwrap();
        let grader = build_grader(&config, &selected).unwrap().unwrap();
        assert_eq!(grader.name(), "judge");
    }

    #[test]
    fn test_validate_reports_missing_file() {
        assert!(run_validate(Path::new("/nonexistent/suite.yaml")).is_err());
    }
}
