// src/main.rs - fixbench entry point

use clap::Parser;

use fixbench::cli::run::{run_suite, run_validate, RunArgs};
use fixbench::cli::{history, rank, Cli, Commands};
use fixbench::infra::config::Config;
use fixbench::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // Respects RUST_LOG when set
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run {
            suite,
            models,
            parallel,
            limit,
            output,
            scheme,
            quiet,
        } => {
            let args = RunArgs {
                suite,
                models,
                parallel,
                limit,
                output,
                scheme: scheme.map(Into::into),
                quiet,
            };
            run_suite(args, &config).await
        }
        Commands::Validate { suite } => run_validate(&suite),
        Commands::Rank {
            results,
            scheme,
            json,
        } => {
            let scheme = scheme.map(Into::into).unwrap_or(config.ranking.scheme);
            rank::run_rank(&results, scheme, json)
        }
        Commands::FailingRules {
            history: args,
            threshold,
            min_tests,
        } => history::run_failing_rules(&args, &config, threshold, min_tests),
        Commands::Regressions {
            history: args,
            threshold,
            lookback_days,
            comparison_days,
        } => history::run_regressions(&args, &config, threshold, lookback_days, comparison_days),
        Commands::Models {
            history: args,
            rule,
        } => history::run_models(&args, &config, rule.as_deref()),
        Commands::Trend {
            rule_id,
            history: args,
            model,
        } => history::run_trend(&args, &config, &rule_id, model.as_deref()),
    }
}
