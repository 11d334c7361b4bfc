// src/evaluator/utils.rs - Helpers shared by evaluators

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::infra::errors::BenchError;

/// Captured output of an external tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Whether `program` resolves on `PATH`. The lookup walks the filesystem,
/// so it runs on the blocking pool.
pub async fn tool_available(program: &str) -> bool {
    let program = program.to_string();
    tokio::task::spawn_blocking(move || which::which(program).is_ok())
        .await
        .unwrap_or(false)
}

/// Run `program` with a timeout.
///
/// Returns `Ok(None)` when the program is not installed and a `Timeout`
/// error when it does not finish in time (the child is killed).
pub async fn run_tool<I, S>(
    program: &str,
    args: I,
    stdin: Option<&str>,
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<Option<ToolOutput>, BenchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if !tool_available(program).await {
        tracing::debug!("{} not available, skipping", program);
        return Ok(None);
    }

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn()?;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let bytes = input.as_bytes().to_vec();
        tokio::spawn(async move {
            let _ = pipe.write_all(&bytes).await;
        });
    }

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            Ok(Some(ToolOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }))
        }
        Err(_) => Err(BenchError::Timeout {
            what: program.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// Write `code` to `<dir>/<file_name>` and return the path.
pub async fn write_source(
    dir: &Path,
    file_name: &str,
    code: &str,
) -> Result<PathBuf, BenchError> {
    let path = dir.join(file_name);
    tokio::fs::write(&path, code).await?;
    Ok(path)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub non_blank: usize,
    /// Lines carrying code, including those with a trailing comment.
    pub code: usize,
    /// Lines carrying a comment, including trailing comments.
    pub comment: usize,
}

impl LineCounts {
    /// Comment lines over non-blank lines, in [0, 1].
    pub fn comment_density(&self) -> f64 {
        if self.non_blank == 0 {
            0.0
        } else {
            self.comment as f64 / self.non_blank as f64
        }
    }
}

/// Count lines for a language whose line comment starts with
/// `comment_prefix`. `/* */` blocks are recognised for `//` languages.
pub fn count_lines(code: &str, comment_prefix: &str) -> LineCounts {
    let mut counts = LineCounts::default();
    let mut in_block = false;
    let trailing = format!(" {comment_prefix}");

    for line in code.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        counts.non_blank += 1;
        if in_block {
            counts.comment += 1;
            if trimmed.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if trimmed.starts_with(comment_prefix) {
            counts.comment += 1;
        } else if comment_prefix == "//" && trimmed.starts_with("/*") {
            counts.comment += 1;
            in_block = !trimmed.contains("*/");
        } else {
            counts.code += 1;
            if trimmed.contains(&trailing) {
                counts.comment += 1;
            }
        }
    }

    counts
}
