//! Named pipeline definitions.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{FallbackStrategy, PipelineBuilder, PipelineDefinition};
use crate::core::{Task, TaskKind, TaskPriority};
use crate::errors::PipelineValidationError;

/// Id of the built-in four-step pipeline.
pub const MEDICAL_ANALYSIS: &str = "medical_analysis";

/// The built-in pipeline: classify, extract, validate, recommend.
///
/// # Errors
///
/// Never in practice; the steps are fixed and valid.
pub fn medical_analysis() -> Result<PipelineDefinition, PipelineValidationError> {
    PipelineBuilder::new(MEDICAL_ANALYSIS)
        .name("Medical analysis")
        .description("Classify, extract, validate and recommend on pediatric health input")
        .step(
            Task::new("classify_input", TaskKind::Classification)
                .with_priority(TaskPriority::High)
                .with_timeout_ms(5_000),
        )
        .step(
            Task::new("extract_medical_data", TaskKind::Analysis)
                .with_priority(TaskPriority::High)
                .with_dependency("classify_input")
                .with_timeout_ms(10_000),
        )
        .step(
            Task::new("validate_data", TaskKind::Validation)
                .with_priority(TaskPriority::Critical)
                .with_dependency("extract_medical_data")
                .with_timeout_ms(3_000),
        )
        .step(
            Task::new("generate_recommendations", TaskKind::Recommendation)
                .with_priority(TaskPriority::Medium)
                .with_dependency("validate_data")
                .with_timeout_ms(5_000),
        )
        .with_fallback(FallbackStrategy::Simplify)
        .with_max_retries(3)
        .with_timeout_ms(30_000)
        .build()
}

/// Concurrent map of pipeline id to definition.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    definitions: DashMap<String, Arc<PipelineDefinition>>,
}

impl PipelineRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in pipelines.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        if let Ok(def) = medical_analysis() {
            registry.insert(def);
        }
        registry
    }

    /// Validates `definition` and registers it, replacing any previous
    /// definition with the same id.
    ///
    /// # Errors
    ///
    /// Returns the validation error; nothing is registered.
    pub fn register(&self, definition: PipelineDefinition) -> Result<(), PipelineValidationError> {
        definition.validate()?;
        self.insert(definition);
        Ok(())
    }

    fn insert(&self, definition: PipelineDefinition) {
        debug!(pipeline = %definition.id, steps = definition.steps.len(), "Registering pipeline");
        self.definitions
            .insert(definition.id.clone(), Arc::new(definition));
    }

    /// Looks up a definition.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<PipelineDefinition>> {
        self.definitions.get(id).map(|d| Arc::clone(d.value()))
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.definitions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Removes a definition.
    pub fn remove(&self, id: &str) -> Option<Arc<PipelineDefinition>> {
        self.definitions.remove(id).map(|(_, d)| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_shape() {
        let registry = PipelineRegistry::with_defaults();
        let def = registry.get(MEDICAL_ANALYSIS).unwrap();

        let ids: Vec<&str> = def.steps.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            ["classify_input", "extract_medical_data", "validate_data", "generate_recommendations"]
        );
        assert_eq!(def.max_retries, 3);
        assert_eq!(def.fallback_strategy, FallbackStrategy::Simplify);
        assert_eq!(def.step("validate_data").unwrap().priority, TaskPriority::Critical);
        assert_eq!(def.step("extract_medical_data").unwrap().timeout_ms, 10_000);
    }

    #[test]
    fn test_register_rejects_invalid() {
        let registry = PipelineRegistry::new();
        let mut def = PipelineDefinition::new("bad");
        def.steps.push(Task::new("a", TaskKind::Analysis).with_dependency("a"));
        assert!(registry.register(def).is_err());
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn test_register_replace_and_remove() {
        let registry = PipelineRegistry::with_defaults();
        let quick = PipelineBuilder::new("quick")
            .step(Task::new("classify", TaskKind::Classification))
            .build()
            .unwrap();
        registry.register(quick).unwrap();
        assert_eq!(registry.ids(), vec!["medical_analysis", "quick"]);
        assert!(registry.remove("quick").is_some());
        assert!(registry.get("quick").is_none());
    }
}
