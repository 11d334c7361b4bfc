// src/evaluator/mod.rs - Evaluator trait, registry, and metrics aggregation
//
// Evaluators run in a fixed order and each owns a disjoint key namespace.
// A failing evaluator is logged and its keys stay absent; the rest proceed.

pub mod efficiency;
pub mod explainability;
pub mod functional;
pub mod imports;
pub mod quality;
pub mod security;
pub mod utils;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::benchmark::schema::Language;
use crate::core::metrics::EvaluationMetrics;
use crate::infra::config::Config;
use crate::infra::errors::BenchError;
use crate::provider::ModelProvider;

/// Everything an evaluator may look at for one generated fix.
#[derive(Debug, Clone, Default)]
pub struct EvaluationInput {
    pub original_code: String,
    pub generated_code: String,
    pub expected_code: Option<String>,
    pub language: Language,
    pub context: EvaluationContext,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub rule_id: String,
    /// Literal the rule flags in legacy code, from `migration_pattern`.
    pub legacy_pattern: Option<String>,
    pub explanation: String,
    pub setup_code: Option<String>,
    pub test_code: Option<String>,
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Metric keys this evaluator may emit. Must not overlap any other
    /// registered evaluator.
    fn keys(&self) -> &'static [&'static str];

    async fn evaluate(&self, input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError>;
}

/// Ordered set of enabled evaluators, built once from configuration.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn Evaluator>>,
    owners: HashMap<&'static str, &'static str>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an evaluator. Claiming a key owned by an earlier evaluator is a
    /// configuration error.
    pub fn register(&mut self, evaluator: Box<dyn Evaluator>) -> Result<(), BenchError> {
        for key in evaluator.keys() {
            if let Some(owner) = self.owners.get(key) {
                return Err(BenchError::Config(format!(
                    "metric key '{}' claimed by both '{}' and '{}'",
                    key,
                    owner,
                    evaluator.name()
                )));
            }
        }
        for key in evaluator.keys() {
            self.owners.insert(key, evaluator.name());
        }
        self.evaluators.push(evaluator);
        Ok(())
    }

    /// Functional, quality, security, efficiency, explainability; disabled
    /// ones are skipped.
    pub fn from_config(
        config: &Config,
        grader: Option<Arc<dyn ModelProvider>>,
    ) -> Result<Self, BenchError> {
        let ev = &config.evaluators;
        let mut registry = Self::new();
        if ev.functional.enabled {
            registry.register(Box::new(functional::FunctionalEvaluator::new(
                ev.functional.clone(),
            )?))?;
        }
        if ev.quality.enabled {
            registry.register(Box::new(quality::QualityEvaluator::new(
                ev.quality.clone(),
            )))?;
        }
        if ev.security.enabled {
            registry.register(Box::new(security::SecurityEvaluator::new(
                ev.security.clone(),
            )))?;
        }
        if ev.efficiency.enabled {
            registry.register(Box::new(efficiency::EfficiencyEvaluator::new(
                ev.efficiency.clone(),
            )))?;
        }
        if ev.explainability.enabled {
            let grader = if ev.explainability.use_llm_grader {
                grader
            } else {
                None
            };
            registry.register(Box::new(explainability::ExplainabilityEvaluator::new(
                grader,
            )))?;
        }
        Ok(registry)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.evaluators.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Run every evaluator in order and merge their outputs.
    ///
    /// An evaluator that errors, emits a key outside its namespace, or
    /// collides with an earlier key contributes nothing.
    pub async fn run(&self, input: &EvaluationInput) -> EvaluationMetrics {
        let mut merged = EvaluationMetrics::new();

        for evaluator in &self.evaluators {
            let name = evaluator.name();
            let partial = match evaluator.evaluate(input).await {
                Ok(partial) => partial,
                Err(e) => {
                    tracing::warn!(evaluator = name, "Evaluator failed: {}", e);
                    continue;
                }
            };

            if let Some(stray) = partial
                .keys()
                .find(|k| !evaluator.keys().iter().any(|owned| owned == k))
            {
                tracing::warn!(
                    evaluator = name,
                    "Evaluator emitted undeclared metric '{}', dropping its output",
                    stray
                );
                continue;
            }

            if let Err(e) = merged.merge_from(&partial, name) {
                tracing::warn!(evaluator = name, "Dropping evaluator output: {}", e);
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::keys;

    struct Fixed {
        name: &'static str,
        keys: &'static [&'static str],
        emit: Vec<(&'static str, bool)>,
    }

    #[async_trait]
    impl Evaluator for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn keys(&self) -> &'static [&'static str] {
            self.keys
        }
        async fn evaluate(&self, _input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
            let mut m = EvaluationMetrics::new();
            for (k, v) in &self.emit {
                m.insert(k, *v)?;
            }
            Ok(m)
        }
    }

    struct Broken;

    #[async_trait]
    impl Evaluator for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn keys(&self) -> &'static [&'static str] {
            &[keys::HAS_EXPLANATION]
        }
        async fn evaluate(&self, _input: &EvaluationInput) -> Result<EvaluationMetrics, BenchError> {
            Err(BenchError::evaluator("broken", "boom"))
        }
    }

    #[test]
    fn test_register_rejects_overlapping_keys() {
        let mut reg = EvaluatorRegistry::new();
        reg.register(Box::new(Fixed {
            name: "a",
            keys: &[keys::COMPILES],
            emit: vec![],
        }))
        .unwrap();
        let err = reg
            .register(Box::new(Fixed {
                name: "b",
                keys: &[keys::COMPILES],
                emit: vec![],
            }))
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_evaluator_leaves_keys_absent() {
        let mut reg = EvaluatorRegistry::new();
        reg.register(Box::new(Broken)).unwrap();
        reg.register(Box::new(Fixed {
            name: "ok",
            keys: &[keys::COMPILES],
            emit: vec![(keys::COMPILES, true)],
        }))
        .unwrap();

        let m = reg.run(&EvaluationInput::default()).await;
        assert_eq!(m.get_bool(keys::COMPILES), Some(true));
        assert!(!m.contains(keys::HAS_EXPLANATION));
    }

    #[tokio::test]
    async fn test_undeclared_key_drops_output() {
        let mut reg = EvaluatorRegistry::new();
        reg.register(Box::new(Fixed {
            name: "sneaky",
            keys: &[keys::HAS_EXPLANATION],
            emit: vec![
                (keys::HAS_EXPLANATION, true),
                (keys::FUNCTIONAL_CORRECTNESS, true),
            ],
        }))
        .unwrap();
        let m = reg.run(&EvaluationInput::default()).await;
        assert!(m.is_empty());
    }

    #[test]
    fn test_from_config_order_and_defaults() {
        let reg = EvaluatorRegistry::from_config(&Config::default(), None).unwrap();
        assert_eq!(
            reg.names(),
            vec!["functional", "quality", "security", "explainability"]
        );

        let mut config = Config::default();
        config.evaluators.efficiency.enabled = true;
        config.evaluators.quality.enabled = false;
        let reg = EvaluatorRegistry::from_config(&config, None).unwrap();
        assert_eq!(
            reg.names(),
            vec!["functional", "security", "efficiency", "explainability"]
        );
    }
}
