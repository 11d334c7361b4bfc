// src/cli/progress.rs - Terminal progress renderer for evaluation runs
//
// The single consumer of engine progress events. All output goes to stderr
// so stdout stays clean for rankings and JSON.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::types::ProgressEvent;

fn glyph(passed: bool) -> &'static str {
    if passed {
        "✓ PASS"
    } else {
        "✗ FAIL"
    }
}

/// Render one event, or `None` for events that print nothing.
///
/// With `parallel == 1` each result is printed as it lands; otherwise the
/// batch summary (sorted by model name) is printed once all models finish.
pub fn format_event(event: &ProgressEvent, parallel: usize) -> Option<String> {
    match event {
        ProgressEvent::SuiteStart {
            suite,
            rules,
            models,
            total_evaluations,
            parallel,
        } => Some(format!(
            "Evaluating test suite: {}\nRules: {}  Models: {}  Evaluations: {}  Workers: {}",
            suite, rules, models, total_evaluations, parallel
        )),
        ProgressEvent::RuleStart {
            rule_id,
            test_cases,
        } => Some(format!("Rule: {} ({} test case(s))", rule_id, test_cases)),
        ProgressEvent::TestCaseStart { test_case_id, .. } => {
            Some(format!("  Test case: {}", test_case_id))
        }
        ProgressEvent::ResultReady {
            model_name,
            passed,
            failure_reason,
            completed,
            total,
            ..
        } => {
            if parallel > 1 {
                return None;
            }
            let mut line = format!(
                "    [{}/{}] {:<25} {}",
                completed,
                total,
                model_name,
                glyph(*passed)
            );
            if let Some(reason) = failure_reason {
                line.push_str(&format!("  ({})", reason));
            }
            Some(line)
        }
        ProgressEvent::BatchComplete { results, .. } => {
            if parallel <= 1 {
                return None;
            }
            let lines: Vec<String> = results
                .iter()
                .map(|(model, passed)| format!("      {:<25} {}", model, glyph(*passed)))
                .collect();
            Some(lines.join("\n"))
        }
        ProgressEvent::LimitReached { limit } => {
            Some(format!("Reached test case limit ({})", limit))
        }
        ProgressEvent::Complete {
            total,
            passed,
            cost,
        } => Some(format!(
            "[done] {}/{} passed, cost=${:.4}",
            passed, total, cost
        )),
    }
}

/// Spawn the consumer task. It ends when the engine drops its sender.
pub fn spawn_progress_printer(
    mut rx: mpsc::Receiver<ProgressEvent>,
    parallel: usize,
    quiet: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            if let Some(text) = format_event(&event, parallel) {
                eprintln!("{}", text);
            }
        }
    })
}
