// src/evaluator/security.rs - Security anti-pattern and migration regression checks
//
// Python code goes through bandit when it is configured and installed.
// Otherwise a fixed table of line detectors runs, plus Java migration checks
// that compare the original and generated annotations.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::utils::{run_tool, write_source};
use super::{EvaluationInput, Evaluator};
use crate::benchmark::schema::Language;
use crate::core::metrics::{keys, EvaluationMetrics, MetricValue};
use crate::core::types::{IssueSeverity, SecurityIssue};
use crate::infra::config::SecurityConfig;
use crate::infra::errors::BenchError;

const BANDIT_TIMEOUT: Duration = Duration::from_secs(30);

struct Detector {
    kind: &'static str,
    severity: IssueSeverity,
    description: &'static str,
    pattern: Regex,
    /// Same-line match that cancels the finding.
    unless: Option<Regex>,
}

const AUTH_ANNOTATIONS: &[&str] = &[
    "@RolesAllowed",
    "@PermitAll",
    "@DenyAll",
    "@Authenticated",
    "@Secured",
    "@PreAuthorize",
];

const ENDPOINT_ANNOTATIONS: &[&str] = &[
    "@Path",
    "@GET",
    "@POST",
    "@PUT",
    "@DELETE",
    "@PATCH",
    "@RequestMapping",
    "@GetMapping",
    "@PostMapping",
    "@PutMapping",
    "@DeleteMapping",
];

#[allow(clippy::unwrap_used)]
fn detector(
    kind: &'static str,
    severity: IssueSeverity,
    description: &'static str,
    pattern: &str,
    unless: Option<&str>,
) -> Detector {
    Detector {
        kind,
        severity,
        description,
        pattern: Regex::new(pattern).unwrap(),
        unless: unless.map(|u| Regex::new(u).unwrap()),
    }
}

static DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    use IssueSeverity::*;
    vec![
        detector(
            "SQL_INJECTION",
            High,
            "SQL statement built by string concatenation or formatting",
            r#"(?i)(?:\b(?:select|insert|update|delete)\b[^"'\n]*["']+\s*\+)|(?:\bexecute(?:Query|Update)?\s*\(\s*f?["'][^"'\n]*["']\s*[+%])|(?:\bexecute\s*\(\s*f["'])"#,
            None,
        ),
        detector(
            "HARDCODED_CREDENTIALS",
            High,
            "Credential assigned from a string literal",
            r#"(?i)\b\w*(?:password|passwd|pwd|secret|api_?key|access_?token)\w*\s*[:=]\s*["'][^"'\n]{3,}["']"#,
            None,
        ),
        detector(
            "XXE",
            Medium,
            "XML parser created without disabling external entities",
            r"DocumentBuilderFactory\.newInstance|SAXParserFactory\.newInstance|XMLInputFactory\.newInstance|\betree\.(?:parse|fromstring)\s*\(|\bminidom\.parse|\bxml\.sax\.parse",
            None,
        ),
        detector(
            "WEAK_RANDOM",
            Low,
            "Non-cryptographic random number generator",
            r"\bnew\s+Random\s*\(|\bMath\.random\s*\(|\brandom\.(?:random|randint|choice|randrange)\s*\(",
            None,
        ),
        detector(
            "PATH_TRAVERSAL",
            Medium,
            "File path built from concatenated input",
            r#"(?:\bnew\s+File(?:InputStream|Reader|OutputStream|Writer)?|\bPaths\.get|\bPath\.of|\bopen)\s*\([^)\n]*\+\s*\w"#,
            None,
        ),
        detector(
            "INSECURE_DESERIALIZATION",
            High,
            "Deserialization of untrusted data",
            r"\bnew\s+ObjectInputStream\s*\(|\.readObject\s*\(|\bpickle\.loads?\s*\(|\bmarshal\.loads\s*\(|\byaml\.load\s*\(",
            Some(r"SafeLoader|safe_load"),
        ),
    ]
});

#[allow(clippy::unwrap_used)]
static XXE_MITIGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"disallow-doctype-decl|FEATURE_SECURE_PROCESSING|SUPPORT_DTD|defusedxml").unwrap()
});

#[allow(clippy::unwrap_used)]
static TRANSACTION_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@Transactional\b|@TransactionAttribute\b").unwrap());

#[allow(clippy::unwrap_used)]
static PERSISTENCE_WRITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(?:persist|merge|remove|flush)\s*\(").unwrap());

/// Count occurrences of an annotation, not counting longer names it prefixes.
fn count_annotation(code: &str, annotation: &str) -> usize {
    code.match_indices(annotation)
        .filter(|(idx, _)| {
            !code[idx + annotation.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
        .count()
}

/// Run the detector table over `code`, one issue per detector per line.
pub fn scan_patterns(code: &str, language: Language) -> Vec<SecurityIssue> {
    let comment = language.line_comment();
    let xxe_mitigated = XXE_MITIGATION.is_match(code);
    let mut issues = Vec::new();

    for (idx, line) in code.lines().enumerate() {
        if line.trim_start().starts_with(comment) {
            continue;
        }
        for d in DETECTORS.iter() {
            if d.kind == "XXE" && xxe_mitigated {
                continue;
            }
            if !d.pattern.is_match(line) {
                continue;
            }
            if d.unless.as_ref().is_some_and(|u| u.is_match(line)) {
                continue;
            }
            issues.push(SecurityIssue {
                kind: d.kind.to_string(),
                severity: d.severity,
                description: d.description.to_string(),
                line: Some(idx + 1),
            });
        }
    }
    issues
}

/// Security regressions a migration can introduce: dropped authorization,
/// newly exposed endpoints, lost transaction boundaries.
pub fn migration_checks(original: &str, generated: &str) -> Vec<SecurityIssue> {
    let mut issues = Vec::new();

    for annotation in AUTH_ANNOTATIONS {
        let before = count_annotation(original, annotation);
        let after = count_annotation(generated, annotation);
        if before > after {
            issues.push(SecurityIssue {
                kind: "LOST_AUTHORIZATION".into(),
                severity: IssueSeverity::High,
                description: format!("{annotation} dropped ({before} -> {after})"),
                line: None,
            });
        }
    }

    let endpoints = |code: &str| -> usize {
        ENDPOINT_ANNOTATIONS
            .iter()
            .map(|a| count_annotation(code, a))
            .sum()
    };
    let generated_auth: usize = AUTH_ANNOTATIONS
        .iter()
        .map(|a| count_annotation(generated, a))
        .sum();
    let (endpoints_before, endpoints_after) = (endpoints(original), endpoints(generated));
    if endpoints_after > endpoints_before && generated_auth == 0 {
        issues.push(SecurityIssue {
            kind: "UNPROTECTED_ENDPOINT".into(),
            severity: IssueSeverity::Medium,
            description: format!(
                "{} new endpoint annotation(s) without any authorization annotation",
                endpoints_after - endpoints_before
            ),
            line: None,
        });
    }

    if TRANSACTION_ANNOTATION.is_match(original)
        && !TRANSACTION_ANNOTATION.is_match(generated)
        && PERSISTENCE_WRITE.is_match(generated)
    {
        issues.push(SecurityIssue {
            kind: "MISSING_TRANSACTION".into(),
            severity: IssueSeverity::Medium,
            description: "Persistence writes lost their transaction boundary".into(),
            line: None,
        });
    }

    issues
}

#[derive(Debug, Deserialize)]
struct BanditReport {
    #[serde(default)]
    results: Vec<BanditResult>,
}

#[derive(Debug, Deserialize)]
struct BanditResult {
    test_id: String,
    issue_severity: String,
    #[serde(default)]
    issue_text: String,
    #[serde(default)]
    line_number: Option<usize>,
}

pub fn parse_bandit(json: &str) -> Result<Vec<SecurityIssue>, BenchError> {
    let report: BanditReport = serde_json::from_str(json)?;
    Ok(report
        .results
        .into_iter()
        .map(|r| SecurityIssue {
            severity: match r.issue_severity.to_ascii_uppercase().as_str() {
                "HIGH" => IssueSeverity::High,
                "MEDIUM" => IssueSeverity::Medium,
                _ => IssueSeverity::Low,
            },
            kind: r.test_id,
            description: r.issue_text,
            line: r.line_number,
        })
        .collect())
}

pub struct SecurityEvaluator {
    config: SecurityConfig,
}

impl SecurityEvaluator {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// `None` when bandit is not configured, not installed, or unreadable.
    async fn run_bandit(&self, code: &str) -> Option<Vec<SecurityIssue>> {
        if !self.config.tools.iter().any(|t| t == "bandit") {
            return None;
        }
        let dir = tempfile::tempdir().ok()?;
        let file = write_source(dir.path(), "candidate.py", code).await.ok()?;
        let arg = file.display().to_string();
        let out = match run_tool("bandit", ["-f", "json", "-q", arg.as_str()], None, None, BANDIT_TIMEOUT).await {
            Ok(Some(out)) => out,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("bandit failed: {}", e);
                return None;
            }
        };
        match parse_bandit(&out.stdout) {
            Ok(issues) => Some(issues),
            Err(e) => {
                tracing::warn!("Unreadable bandit output: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Evaluator for SecurityEvaluator {
    fn name(&self) -> &'static str {
        "security"
    }

    fn keys(&self) -> &'static [&'static str] {
        &[
            keys::SECURITY_ISSUES,
            keys::HIGH_SEVERITY_SECURITY,
            keys::ISSUE_TYPES,
            keys::ISSUES,
        ]
    }

    async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
        let code = &input.generated_code;

        let bandit = if input.language == Language::Python {
            self.run_bandit(code).await
        } else {
            None
        };
        let mut issues = match bandit {
            Some(issues) => issues,
            None => scan_patterns(code, input.language),
        };
        if self.config.migration_checks && input.language == Language::Java {
            issues.extend(migration_checks(&input.original_code, code));
        }

        let high = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::High)
            .count();
        let mut types: Vec<String> = Vec::new();
        for issue in &issues {
            if !types.contains(&issue.kind) {
                types.push(issue.kind.clone());
            }
        }

        let mut metrics = EvaluationMetrics::new();
        metrics.insert(keys::SECURITY_ISSUES, issues.len())?;
        metrics.insert(keys::HIGH_SEVERITY_SECURITY, high)?;
        metrics.insert(keys::ISSUE_TYPES, MetricValue::List(types))?;
        metrics.insert(keys::ISSUES, MetricValue::Issues(issues))?;
        Ok(metrics)
    }
}
