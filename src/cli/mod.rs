// src/cli/mod.rs - CLI definition (clap derive)

pub mod history;
pub mod progress;
pub mod rank;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::ranking::WeightScheme;

#[derive(Parser)]
#[command(
    name = "fixbench",
    about = "Benchmark LLMs on automated code-migration fixes",
    version
)]
pub struct Cli {
    /// Config file path (default: ./fixbench.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a benchmark suite against the configured models
    Run {
        /// Suite YAML file, or a directory of YAML files
        suite: PathBuf,
        /// Only these models (comma separated names from [[models]])
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        /// Models evaluated concurrently per test case
        #[arg(short, long)]
        parallel: Option<usize>,
        /// Stop after this many test cases
        #[arg(short, long)]
        limit: Option<usize>,
        /// Directory for the results file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ranking weight scheme
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },
    /// Check that a suite loads and is well formed
    Validate {
        suite: PathBuf,
    },
    /// Rank models from one or more results files or directories
    Rank {
        #[arg(required = true)]
        results: Vec<PathBuf>,
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rules whose pass rate is below a threshold
    FailingRules {
        #[command(flatten)]
        history: HistoryArgs,
        /// Pass rate threshold in percent
        #[arg(long, default_value = "50")]
        threshold: f64,
        /// Ignore rules with fewer results
        #[arg(long, default_value = "3")]
        min_tests: usize,
    },
    /// (rule, model) pairs whose pass rate dropped recently
    Regressions {
        #[command(flatten)]
        history: HistoryArgs,
        /// Minimum drop in percentage points
        #[arg(long, default_value = "10")]
        threshold: f64,
        /// Recent window in days
        #[arg(long, default_value = "7")]
        lookback_days: i64,
        /// Historical window in days, measured from now
        #[arg(long, default_value = "30")]
        comparison_days: i64,
    },
    /// Compare models over stored results
    Models {
        #[command(flatten)]
        history: HistoryArgs,
        /// Restrict to one rule
        #[arg(long)]
        rule: Option<String>,
    },
    /// Daily pass rate of one rule
    Trend {
        rule_id: String,
        #[command(flatten)]
        history: HistoryArgs,
        #[arg(long)]
        model: Option<String>,
    },
}

/// Where stored results come from and how far back to look.
#[derive(clap::Args, Clone)]
pub struct HistoryArgs {
    /// Results files or directories (default: the configured output_dir)
    #[arg(long = "results")]
    pub results: Vec<PathBuf>,
    /// Only results from the last N days
    #[arg(long, default_value = "30")]
    pub days: i64,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SchemeArg {
    Classic,
    Extended,
}

impl From<SchemeArg> for WeightScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Classic => WeightScheme::Classic,
            SchemeArg::Extended => WeightScheme::Extended,
        }
    }
}
