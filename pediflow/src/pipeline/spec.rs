//! Pipeline definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::builder::validate_steps;
use super::RetryPolicy;
use crate::core::Task;
use crate::errors::PipelineValidationError;

/// Recovery applied when a run fails as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Re-run the whole pipeline, a bounded number of times.
    Retry,
    /// Classification plus local validation only.
    #[default]
    Simplify,
    /// Hand the input to a human.
    Human,
    /// Give up and mark the result skipped.
    Skip,
}

impl fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Retry => "retry",
            Self::Simplify => "simplify",
            Self::Human => "human",
            Self::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// A named, ordered, dependency-annotated list of tasks plus its retry and
/// fallback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    /// Registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the pipeline is for.
    #[serde(default)]
    pub description: String,
    /// Tasks in execution order.
    pub steps: Vec<Task>,
    /// Recovery for whole-run failures.
    #[serde(default)]
    pub fallback_strategy: FallbackStrategy,
    /// Retries allowed per task after its first attempt.
    #[serde(default)]
    pub max_retries: u32,
    /// Budget for a whole run. Tasks still pending when it runs out are
    /// recorded as timeout failures.
    #[serde(default = "default_run_timeout_ms")]
    pub timeout_ms: u64,
    /// Delay schedule between task retries.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Whole-pipeline re-runs allowed by the retry fallback.
    #[serde(default = "default_fallback_reruns")]
    pub fallback_reruns: u32,
}

fn default_run_timeout_ms() -> u64 {
    30_000
}

fn default_fallback_reruns() -> u32 {
    1
}

impl PipelineDefinition {
    /// A definition with no steps and default settings. Prefer
    /// [`PipelineBuilder`](super::PipelineBuilder), which validates.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            steps: Vec::new(),
            fallback_strategy: FallbackStrategy::default(),
            max_retries: 0,
            timeout_ms: default_run_timeout_ms(),
            retry: RetryPolicy::default(),
            fallback_reruns: default_fallback_reruns(),
        }
    }

    /// The run budget as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Looks up a step by id.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&Task> {
        self.steps.iter().find(|t| t.id == id)
    }

    /// Re-checks the definition-time rules.
    ///
    /// # Errors
    ///
    /// Returns the first rule the steps break.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        validate_steps(&self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskKind;
    use serde_json::json;

    #[test]
    fn test_deserialize_with_defaults() {
        let def: PipelineDefinition = serde_json::from_value(json!({
            "id": "quick",
            "name": "Quick check",
            "steps": [{"id": "classify", "kind": "classification"}]
        }))
        .unwrap();
        assert_eq!(def.fallback_strategy, FallbackStrategy::Simplify);
        assert_eq!(def.fallback_reruns, 1);
        assert_eq!(def.timeout(), Duration::from_secs(30));
        assert_eq!(def.step("classify").map(|t| t.kind), Some(TaskKind::Classification));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_hand_built_definition_is_checked() {
        let mut def = PipelineDefinition::new("broken");
        def.steps
            .push(Task::new("validate", TaskKind::Validation).with_dependency("extract"));
        let err = def.validate().unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-MISSING_DEP"));
    }

    #[test]
    fn test_fallback_strategy_wire_names() {
        assert_eq!(serde_json::to_value(FallbackStrategy::Human).unwrap(), json!("human"));
        assert_eq!(FallbackStrategy::Skip.to_string(), "skip");
    }
}
