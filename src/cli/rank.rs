// src/cli/rank.rs - Ranking table and `fixbench rank`

use std::path::PathBuf;

use crate::core::aggregate::aggregate_by_model;
use crate::core::ranking::{rank_models, ModelRanking, WeightScheme};
use crate::core::results::load_history;

pub fn render_rankings(rankings: &[ModelRanking], scheme: WeightScheme) -> String {
    let mut out = format!("Model ranking ({} weights)\n", scheme);
    out.push_str(&format!(
        "{:>3}  {:<25} {:>7} {:>7} {:>8} {:>9} {:>10} {:>9}\n",
        "#", "model", "score", "pass%", "compile%", "passed", "avg ms", "cost $"
    ));
    for (i, r) in rankings.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<25} {:>7.2} {:>7.1} {:>8.1} {:>9} {:>10.0} {:>9.4}\n",
            i + 1,
            r.model_name,
            r.score,
            r.pass_rate,
            r.compile_rate,
            format!("{}/{}", r.tests_passed, r.tests_total),
            r.avg_response_time_ms,
            r.total_cost
        ));
    }
    out
}

pub fn run_rank(files: &[PathBuf], scheme: WeightScheme, json: bool) -> anyhow::Result<()> {
    let results = load_history(files)?;
    if results.is_empty() {
        anyhow::bail!("no results found in {:?}", files);
    }
    let rankings = rank_models(&aggregate_by_model(&results), scheme);
    if json {
        println!("{}", serde_json::to_string_pretty(&rankings)?);
    } else {
        print!("{}", render_rankings(&rankings, scheme));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::tests::result;
    use crate::core::metrics::EvaluationMetrics;

    #[test]
    fn test_render_rankings_orders_rows() {
        let results = vec![
            result("weak", "r1", false, EvaluationMetrics::new()),
            result("strong", "r1", true, EvaluationMetrics::new()),
        ];
        let rankings = rank_models(&aggregate_by_model(&results), WeightScheme::Classic);
        let text = render_rankings(&rankings, WeightScheme::Classic);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("classic"));
        assert!(lines[2].contains("strong"));
        assert!(lines[3].contains("weak"));
    }

    #[test]
    fn test_run_rank_requires_results() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_rank(&[dir.path().to_path_buf()], WeightScheme::Extended, false).unwrap_err();
        assert!(err.to_string().contains("no results"));
    }
}
