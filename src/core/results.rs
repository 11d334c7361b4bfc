// src/core/results.rs - Results files on disk

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::core::types::EvaluationResult;
use crate::infra::errors::BenchError;

const RESULTS_PREFIX: &str = "results_";

/// Write `results` as pretty JSON to `<dir>/results_<timestamp>.json`.
pub fn write_results(dir: &Path, results: &[EvaluationResult]) -> Result<PathBuf, BenchError> {
    std::fs::create_dir_all(dir)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();

    let mut path = dir.join(format!("{RESULTS_PREFIX}{stamp}.json"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{RESULTS_PREFIX}{stamp}_{n}.json"));
        n += 1;
    }

    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;
    tracing::info!("Wrote {} result(s) to {}", results.len(), path.display());
    Ok(path)
}

pub fn read_results(path: &Path) -> Result<Vec<EvaluationResult>, BenchError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read every given file, expanding directories to their `results_*.json`
/// files in name order.
pub fn load_history(paths: &[PathBuf]) -> Result<Vec<EvaluationResult>, BenchError> {
    let mut results = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_results_file(p))
                .collect();
            files.sort();
            for file in files {
                results.extend(read_results(&file)?);
            }
        } else {
            results.extend(read_results(path)?);
        }
    }
    Ok(results)
}

fn is_results_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with(RESULTS_PREFIX) && name.ends_with(".json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::tests::result;
    use crate::core::metrics::{keys, EvaluationMetrics};

    #[test]
    fn test_write_then_read_preserves_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut metrics = EvaluationMetrics::new();
        metrics.insert(keys::FUNCTIONAL_CORRECTNESS, true).unwrap();
        metrics.insert(keys::COMPILES, Option::<bool>::None).unwrap();
        metrics.insert(keys::RESPONSE_TIME_MS, 812.5).unwrap();
        let results = vec![result("m1", "r1", true, metrics), result("m2", "r1", false, EvaluationMetrics::new())];

        let path = write_results(dir.path(), &results).unwrap();
        assert!(is_results_file(&path));
        let back = read_results(&path).unwrap();
        assert_eq!(back, results);
        assert!(back[0].metrics.is_unknown(keys::COMPILES));
    }

    #[test]
    fn test_same_second_writes_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![result("m1", "r1", true, EvaluationMetrics::new())];
        let a = write_results(dir.path(), &results).unwrap();
        let b = write_results(dir.path(), &results).unwrap();
        assert_ne!(a, b);
        assert_eq!(load_history(&[dir.path().to_path_buf()]).unwrap().len(), 2);
    }

    #[test]
    fn test_load_history_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.json"), "not results").unwrap();
        write_results(dir.path(), &[result("m1", "r1", false, EvaluationMetrics::new())]).unwrap();
        assert_eq!(load_history(&[dir.path().to_path_buf()]).unwrap().len(), 1);
    }
}
