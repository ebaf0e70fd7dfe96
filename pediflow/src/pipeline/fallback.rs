//! Whole-run failures and the results each fallback strategy produces.

use std::any::Any;
use thiserror::Error;

use super::{consolidate, ConsolidatedResult, FallbackStrategy, PipelineDefinition};
use crate::core::{Task, TaskKind, TaskPriority, TaskResult};
use crate::errors::PipelineValidationError;
use crate::utils::panic_message;

/// Confidence reported by a simplified result.
pub const SIMPLIFIED_CONFIDENCE: f64 = 0.5;

/// Why a run failed as a whole, as opposed to a task failing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunFailure {
    /// The definition did not pass validation.
    #[error("{0}")]
    Definition(#[from] PipelineValidationError),

    /// A task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The run's state machine was driven incorrectly.
    #[error("{0}")]
    State(String),
}

impl RunFailure {
    /// Wraps a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panicked(panic_message(payload))
    }
}

/// The two tasks the simplify strategy runs: the definition's first
/// classification step and a dependency-free local validation.
#[must_use]
pub fn simplified_steps(definition: &PipelineDefinition) -> [Task; 2] {
    let classify = definition
        .steps
        .iter()
        .find(|t| t.kind == TaskKind::Classification)
        .map_or_else(
            || Task::new("classify_input", TaskKind::Classification),
            |t| Task {
                dependencies: Vec::new(),
                ..t.clone()
            },
        );
    let validate = definition
        .steps
        .iter()
        .find(|t| t.kind == TaskKind::Validation)
        .map_or_else(
            || Task::new("validate_data", TaskKind::Validation).with_priority(TaskPriority::Critical),
            |t| Task {
                dependencies: Vec::new(),
                ..t.clone()
            },
        );
    [classify, validate]
}

/// The result of the simplify strategy over its two task results.
#[must_use]
pub fn simplified_result(pipeline_id: &str, results: &[TaskResult], failure: &RunFailure) -> ConsolidatedResult {
    let mut merged = consolidate(pipeline_id, results)
        .with_fallback(FallbackStrategy::Simplify)
        .with_message("Simplified analysis: classification and local validation only");
    merged.confidence = SIMPLIFIED_CONFIDENCE;
    merged.simplified = true;
    merged.error = Some(failure.to_string());
    merged
}

/// The result of the human strategy.
#[must_use]
pub fn human_result(pipeline_id: &str, failure: &RunFailure) -> ConsolidatedResult {
    let mut result = ConsolidatedResult::failed(pipeline_id, failure.to_string())
        .with_fallback(FallbackStrategy::Human)
        .with_message("Human review is required to process this input");
    result.requires_human_review = true;
    result
}

/// The result of the skip strategy.
#[must_use]
pub fn skipped_result(pipeline_id: &str, failure: &RunFailure) -> ConsolidatedResult {
    let mut result = ConsolidatedResult::failed(pipeline_id, failure.to_string())
        .with_fallback(FallbackStrategy::Skip)
        .with_message("Processing was skipped");
    result.skipped = true;
    result
}

/// The result once the retry strategy has used up its re-runs.
#[must_use]
pub fn retries_exhausted_result(pipeline_id: &str, failure: &RunFailure) -> ConsolidatedResult {
    ConsolidatedResult::failed(pipeline_id, failure.to_string())
        .with_fallback(FallbackStrategy::Retry)
        .with_message("Pipeline failed after re-running")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::medical_analysis;

    #[test]
    fn test_panic_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(RunFailure::from_panic(boxed.as_ref()), RunFailure::Panicked("boom".into()));
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(RunFailure::from_panic(owned.as_ref()).to_string(), "task panicked: owned");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(RunFailure::from_panic(other.as_ref()).to_string(), "task panicked: unknown panic");
    }

    #[test]
    fn test_simplified_steps_drop_dependencies() {
        let def = medical_analysis().unwrap();
        let [classify, validate] = simplified_steps(&def);
        assert_eq!(classify.id, "classify_input");
        assert_eq!(validate.id, "validate_data");
        assert!(validate.dependencies.is_empty());
    }

    #[test]
    fn test_marker_results() {
        let failure = RunFailure::Panicked("boom".to_string());
        let human = human_result("p", &failure);
        assert!(human.requires_human_review && !human.success);
        assert_eq!(human.error.as_deref(), Some("task panicked: boom"));

        let skipped = skipped_result("p", &failure);
        assert!(skipped.skipped && !skipped.success);
        assert_eq!(skipped.fallback, Some(FallbackStrategy::Skip));

        let simplified = simplified_result("p", &[], &failure);
        assert!(simplified.simplified);
        assert!((simplified.confidence - SIMPLIFIED_CONFIDENCE).abs() < f64::EPSILON);
    }
}
