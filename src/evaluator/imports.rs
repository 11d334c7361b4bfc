// src/evaluator/imports.rs - Java import repair before compilation
//
// Injection adds imports for well-known annotations and types that a snippet
// uses without importing. Stripping removes imports whose package javac
// reports as missing, for a single retry.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::infra::config::ImportHint;

#[allow(clippy::unwrap_used)]
static PACKAGE_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*package\s+[\w.]+\s*;").unwrap());

#[allow(clippy::unwrap_used)]
static IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+(?:static\s+)?([\w.]+(?:\.\*)?)\s*;").unwrap());

#[allow(clippy::unwrap_used)]
static MISSING_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"package ([\w.]+) does not exist").unwrap());

fn hint(token: &str, legacy: Option<&str>, jakarta: Option<&str>) -> ImportHint {
    ImportHint {
        token: token.to_string(),
        legacy: legacy.map(String::from),
        jakarta: jakarta.map(String::from),
    }
}

/// Built-in token to import table, used when the config supplies none.
pub fn default_import_hints() -> Vec<ImportHint> {
    vec![
        hint("@Stateless", Some("javax.ejb.Stateless"), None),
        hint("@EJB", Some("javax.ejb.EJB"), None),
        hint(
            "@ApplicationScoped",
            None,
            Some("jakarta.enterprise.context.ApplicationScoped"),
        ),
        hint("@Inject", None, Some("jakarta.inject.Inject")),
        hint(
            "@PersistenceContext",
            Some("javax.persistence.PersistenceContext"),
            Some("jakarta.persistence.PersistenceContext"),
        ),
        hint(
            "EntityManager",
            Some("javax.persistence.EntityManager"),
            Some("jakarta.persistence.EntityManager"),
        ),
        hint(
            "@Transactional",
            Some("javax.transaction.Transactional"),
            Some("jakarta.transaction.Transactional"),
        ),
    ]
}

fn existing_imports(code: &str) -> HashSet<String> {
    code.lines()
        .filter_map(|line| IMPORT_LINE.captures(line))
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn is_imported(existing: &HashSet<String>, class: &str) -> bool {
    if existing.contains(class) {
        return true;
    }
    match class.rsplit_once('.') {
        Some((package, _)) => existing.contains(&format!("{package}.*")),
        None => false,
    }
}

/// `token` occurs as a whole identifier (so `@Inject` does not match `@InjectMock`).
fn uses_token(code: &str, token: &str) -> bool {
    code.match_indices(token).any(|(idx, _)| {
        let next = code[idx + token.len()..].chars().next();
        let prev = code[..idx].chars().next_back();
        let boundary = |c: Option<char>| !c.is_some_and(|c| c.is_alphanumeric() || c == '_');
        boundary(next) && (token.starts_with('@') || boundary(prev))
    })
}

/// Add missing imports for hinted tokens. Snippets with a `package`
/// declaration are treated as complete and left alone.
///
/// When a hint has both variants, the jakarta one is chosen if the snippet
/// already mentions `jakarta`. Returns the new code and the classes added.
pub fn inject_missing_imports(code: &str, hints: &[ImportHint]) -> (String, Vec<String>) {
    if PACKAGE_DECL.is_match(code) {
        return (code.to_string(), Vec::new());
    }

    let existing = existing_imports(code);
    let prefers_jakarta = code.contains("jakarta");
    let mut to_add: Vec<String> = Vec::new();

    for hint in hints {
        if !uses_token(code, &hint.token) {
            continue;
        }
        let candidates: Vec<&str> = [hint.legacy.as_deref(), hint.jakarta.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if candidates.iter().any(|c| is_imported(&existing, c)) {
            continue;
        }
        let chosen = match (hint.legacy.as_deref(), hint.jakarta.as_deref()) {
            (Some(legacy), Some(jakarta)) => {
                if prefers_jakarta {
                    jakarta
                } else {
                    legacy
                }
            }
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => continue,
        };
        if !to_add.iter().any(|a| a == chosen) {
            to_add.push(chosen.to_string());
        }
    }

    if to_add.is_empty() {
        return (code.to_string(), to_add);
    }

    let lines: Vec<&str> = code.lines().collect();
    let insert_at = lines
        .iter()
        .position(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with("//") && !t.starts_with("/*") && !t.starts_with('*')
        })
        .unwrap_or(0);

    let mut out: Vec<String> = lines[..insert_at].iter().map(|l| l.to_string()).collect();
    out.extend(to_add.iter().map(|class| format!("import {class};")));
    out.push(String::new());
    out.extend(lines[insert_at..].iter().map(|l| l.to_string()));

    let mut joined = out.join("\n");
    if code.ends_with('\n') {
        joined.push('\n');
    }
    (joined, to_add)
}

/// Packages javac reported as nonexistent, in order of first mention.
pub fn missing_packages(compiler_output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MISSING_PACKAGE
        .captures_iter(compiler_output)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Remove import lines that resolve into one of `packages`. Returns the new
/// code and how many lines were removed.
pub fn strip_imports(code: &str, packages: &[String]) -> (String, usize) {
    let mut removed = 0;
    let kept: Vec<&str> = code
        .lines()
        .filter(|line| {
            let Some(path) = IMPORT_LINE
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
            else {
                return true;
            };
            let hit = packages
                .iter()
                .any(|p| path.strip_prefix(p.as_str()).is_some_and(|rest| rest.starts_with('.')));
            if hit {
                removed += 1;
            }
            !hit
        })
        .collect();

    let mut joined = kept.join("\n");
    if code.ends_with('\n') {
        joined.push('\n');
    }
    (joined, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injects_single_legacy_import() {
        let code = "@Stateless\npublic class OrderService {}\n";
        let (out, added) = inject_missing_imports(code, &default_import_hints());
        assert_eq!(added, vec!["javax.ejb.Stateless"]);
        assert_eq!(
            out,
            "import javax.ejb.Stateless;\n\n@Stateless\npublic class OrderService {}\n"
        );
    }

    #[test]
    fn test_prefers_jakarta_when_present() {
        let code = "import jakarta.inject.Inject;\n\npublic class A {\n    @PersistenceContext\n    EntityManager em;\n}";
        let (out, added) = inject_missing_imports(code, &default_import_hints());
        assert_eq!(
            added,
            vec![
                "jakarta.persistence.PersistenceContext",
                "jakarta.persistence.EntityManager"
            ]
        );
        assert!(out.starts_with("import jakarta.persistence.PersistenceContext;"));
    }

    #[test]
    fn test_defaults_to_legacy_variant() {
        let code = "public class A {\n    @Transactional\n    public void save() {}\n}";
        let (_, added) = inject_missing_imports(code, &default_import_hints());
        assert_eq!(added, vec!["javax.transaction.Transactional"]);
    }

    #[test]
    fn test_skips_existing_and_wildcard_imports() {
        let code = "import javax.ejb.*;\nimport jakarta.inject.Inject;\n@Stateless @EJB @Inject\nclass A {}";
        let (out, added) = inject_missing_imports(code, &default_import_hints());
        assert!(added.is_empty());
        assert_eq!(out, code);
    }

    #[test]
    fn test_package_declaration_disables_injection() {
        let code = "package com.acme;\n\n@Stateless\npublic class A {}";
        let (out, added) = inject_missing_imports(code, &default_import_hints());
        assert!(added.is_empty());
        assert_eq!(out, code);
    }

    #[test]
    fn test_token_boundaries() {
        assert!(uses_token("@Inject\nFoo f;", "@Inject"));
        assert!(!uses_token("@InjectMock Foo f;", "@Inject"));
        assert!(!uses_token("MyEntityManagerFactory f;", "EntityManager"));
        assert!(uses_token("private EntityManager em;", "EntityManager"));
    }

    #[test]
    fn test_insert_after_leading_comments() {
        let code = "// header\n/* block */\n@EJB\nclass A {}";
        let (out, _) = inject_missing_imports(code, &default_import_hints());
        assert_eq!(out, "// header\n/* block */\nimport javax.ejb.EJB;\n\n@EJB\nclass A {}");
    }

    #[test]
    fn test_missing_packages_from_javac_output() {
        let out = "A.java:1: error: package io.quarkus.runtime does not exist\n\
                   import io.quarkus.runtime.Startup;\n\
                   A.java:2: error: package io.quarkus.runtime does not exist\n\
                   A.java:3: error: package org.acme.util does not exist\n";
        assert_eq!(
            missing_packages(out),
            vec!["io.quarkus.runtime", "org.acme.util"]
        );
    }

    #[test]
    fn test_strip_only_reported_packages() {
        let code = "import io.quarkus.runtime.Startup;\nimport static org.acme.util.Helpers.run;\nimport java.util.List;\nimport io.quarkus.runtimex.Other;\nclass A {}\n";
        let (out, removed) = strip_imports(
            code,
            &["io.quarkus.runtime".to_string(), "org.acme.util".to_string()],
        );
        assert_eq!(removed, 2);
        assert_eq!(
            out,
            "import java.util.List;\nimport io.quarkus.runtimex.Other;\nclass A {}\n"
        );
    }
}
