// src/benchmark/rule_fetcher.rs - Resolve rule messages from external rulesets
//
// Owned by one run and passed explicitly. Lookups are cached by
// `<source>#<rule_id>`; failures are logged and degrade to an empty message.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_yml::Value;

use crate::infra::errors::BenchError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleInfo {
    pub rule_id: String,
    pub message: String,
    pub description: String,
    pub category: String,
    pub effort: i64,
    pub labels: Vec<String>,
}

pub struct RuleFetcher {
    client: reqwest::Client,
    cache: Mutex<HashMap<String, RuleInfo>>,
}

impl Default for RuleFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Message text for `rule_id`, or an empty string if it cannot be resolved.
    pub async fn rule_message(&self, source: &str, rule_id: &str) -> String {
        match self.fetch_rule(source, rule_id).await {
            Ok(Some(info)) => info.message,
            Ok(None) => {
                tracing::warn!("Rule '{}' not found in {}", rule_id, source);
                String::new()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch rule '{}' from {}: {}", rule_id, source, e);
                String::new()
            }
        }
    }

    pub async fn fetch_rule(
        &self,
        source: &str,
        rule_id: &str,
    ) -> Result<Option<RuleInfo>, BenchError> {
        let cache_key = format!("{source}#{rule_id}");
        if let Some(hit) = self.cached(&cache_key) {
            return Ok(Some(hit));
        }

        let text = match local_path(source) {
            Some(path) => tokio::fs::read_to_string(&path).await?,
            None => {
                let raw = convert_to_raw_url(source).ok_or_else(|| {
                    BenchError::Config(format!("cannot convert to raw URL: {source}"))
                })?;
                tracing::debug!("Fetching ruleset {}", raw);
                let response = self
                    .client
                    .get(&raw)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| BenchError::Other(anyhow::anyhow!("GET {raw}: {e}")))?;
                response
                    .text()
                    .await
                    .map_err(|e| BenchError::Other(anyhow::anyhow!("GET {raw}: {e}")))?
            }
        };

        let document: Value = serde_yml::from_str(&text)?;
        let found = find_rule_by_id(&document, rule_id);
        if let Some(info) = &found {
            self.cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(cache_key, info.clone());
        }
        Ok(found)
    }

    fn cached(&self, key: &str) -> Option<RuleInfo> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn local_path(source: &str) -> Option<PathBuf> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return None;
    }
    if let Ok(url) = url::Url::parse(source) {
        if url.scheme() == "file" {
            return url.to_file_path().ok();
        }
    }
    Some(PathBuf::from(source))
}

/// `https://github.com/<user>/<repo>/blob/<ref>/<path>` to the matching
/// `raw.githubusercontent.com` URL. Raw URLs pass through unchanged.
pub fn convert_to_raw_url(source: &str) -> Option<String> {
    let url = url::Url::parse(source).ok()?;
    match url.host_str()? {
        "raw.githubusercontent.com" => Some(source.to_string()),
        "github.com" => {
            let segments: Vec<&str> = url.path_segments()?.collect();
            if segments.len() < 4 || segments[2] != "blob" {
                return None;
            }
            Some(format!(
                "https://raw.githubusercontent.com/{}/{}/{}",
                segments[0],
                segments[1],
                segments[3..].join("/")
            ))
        }
        _ => None,
    }
}

/// Search a flat list of rules, or items with a nested `rules:` list.
pub fn find_rule_by_id(document: &Value, rule_id: &str) -> Option<RuleInfo> {
    let items = document.as_sequence()?;
    for item in items {
        if !item.is_mapping() {
            continue;
        }
        if item.get("ruleID").and_then(Value::as_str) == Some(rule_id) {
            return Some(rule_info(item));
        }
        if let Some(nested) = item.get("rules").and_then(Value::as_sequence) {
            if let Some(rule) = nested
                .iter()
                .find(|r| r.get("ruleID").and_then(Value::as_str) == Some(rule_id))
            {
                return Some(rule_info(rule));
            }
        }
    }
    None
}

fn rule_info(item: &Value) -> RuleInfo {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    RuleInfo {
        rule_id: text("ruleID"),
        message: text("message"),
        description: text("description"),
        category: text("category"),
        effort: item.get("effort").and_then(Value::as_i64).unwrap_or(0),
        labels: item
            .get("labels")
            .and_then(Value::as_sequence)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    }
}
