//! Error types for pediflow.
//!
//! Two families live here. [`PediflowError`] is what escapes public entry
//! points (definition errors, configuration, logging bootstrap). [`TaskError`]
//! is the serialisable failure record a task result carries; it never escapes
//! as a Rust error because task failures are data, not control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::gateway::GatewayError;

/// The main error type for pediflow operations.
#[derive(Debug, Error)]
pub enum PediflowError {
    /// A pipeline definition could not be resolved or failed validation.
    #[error("{0}")]
    Definition(#[from] PipelineValidationError),

    /// The completion gateway could not be constructed or used.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for PediflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Diagnostic metadata attached to definition errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiagnosticInfo {
    /// Error code (e.g., "PIPELINE-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl DiagnosticInfo {
    /// Creates new diagnostic info. The fix hint defaults to the stock
    /// suggestion for the code, if there is one.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = DiagnosticHints::get(&code).map(str::to_string);
        Self {
            code,
            summary: summary.into(),
            fix_hint,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline definition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The task ids involved in the error.
    pub tasks: Vec<String>,
    /// Optional diagnostic info.
    pub info: Option<DiagnosticInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tasks: Vec::new(),
            info: None,
        }
    }

    /// Sets the tasks involved.
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_info(mut self, info: DiagnosticInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Returns the diagnostic code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.code.as_str())
    }

    /// No pipeline is registered under `pipeline_id`.
    #[must_use]
    pub fn unknown_pipeline(pipeline_id: &str) -> Self {
        Self::new(format!("Pipeline '{pipeline_id}' not found")).with_info(
            DiagnosticInfo::new("PIPELINE-UNKNOWN", "Unknown pipeline id")
                .with_context_entry("pipeline", pipeline_id),
        )
    }
}

/// Error raised when a cycle is detected in the task graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of tasks forming the cycle.
    pub cycle_path: Vec<String>,
    /// Diagnostic info.
    pub info: DiagnosticInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = DiagnosticInfo::new(
            "PIPELINE-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", cycle_path.join(" -> ")),
        );
        Self { cycle_path, info }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            tasks: err.cycle_path.clone(),
            info: Some(err.info),
        }
    }
}

/// Stock suggestions for definition error codes.
pub struct DiagnosticHints;

impl DiagnosticHints {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "PIPELINE-EMPTY" => Some("Add at least one task to the pipeline before building."),
            "PIPELINE-DUPLICATE_TASK" => Some("Give every task in a pipeline a distinct id."),
            "PIPELINE-SELF_DEP" => Some("Remove the task from its own dependency list."),
            "PIPELINE-MISSING_DEP" => Some(
                "Ensure all dependencies reference tasks that exist in the pipeline. \
                 Check for typos in task ids.",
            ),
            "PIPELINE-CYCLE" => Some("Remove one of the dependencies in the cycle to break it."),
            "PIPELINE-FORWARD_REF" => {
                Some("Declare every task after the tasks it depends on.")
            }
            "PIPELINE-UNKNOWN" => Some("Register the pipeline before running it, or check the id."),
            _ => None,
        }
    }
}

/// Classification of a task-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// A declared dependency has no successful result.
    DependencyUnmet,
    /// The gateway failed at the transport or HTTP level.
    GatewayNetworkError,
    /// The gateway rejected the call because the quota is exhausted.
    GatewayQuotaExceeded,
    /// The attempt exceeded its time budget.
    GatewayTimeout,
    /// The completion text did not decode into the expected shape.
    ResponseParseError,
    /// Anything else that went wrong inside the executor.
    Internal,
}

impl TaskErrorKind {
    /// Stable marker text carried in the error message.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::DependencyUnmet => "dependencies not met",
            Self::GatewayNetworkError => "network error",
            Self::GatewayQuotaExceeded => "quota exceeded",
            Self::GatewayTimeout => "timeout",
            Self::ResponseParseError => "response not parseable",
            Self::Internal => "internal error",
        }
    }

    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::GatewayNetworkError | Self::GatewayTimeout | Self::ResponseParseError
        )
    }

    fn user_message(self) -> &'static str {
        match self {
            Self::DependencyUnmet => "An earlier step failed, so this step could not run.",
            Self::GatewayNetworkError => "Could not reach the assistant. Please try again.",
            Self::GatewayQuotaExceeded => "The assistant limit was reached. Please try again later.",
            Self::GatewayTimeout => "The analysis took too long. Please try again.",
            Self::ResponseParseError => {
                "The text could not be processed. Try more specific information."
            }
            Self::Internal => "An unexpected error occurred. Please try again.",
        }
    }
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Failure record embedded in a failed task result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    /// The failure classification.
    pub kind: TaskErrorKind,
    /// Technical message, always prefixed with the kind's marker.
    pub message: String,
    /// Message suitable for showing to a parent.
    pub user_message: String,
    /// Whether retrying may help.
    pub retryable: bool,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl TaskError {
    /// Creates a task error; `detail` is appended after the kind's marker.
    #[must_use]
    pub fn new(kind: TaskErrorKind, detail: impl AsRef<str>) -> Self {
        let detail = detail.as_ref();
        let message = if detail.is_empty() {
            kind.marker().to_string()
        } else {
            format!("{}: {detail}", kind.marker())
        };
        Self {
            kind,
            message,
            user_message: kind.user_message().to_string(),
            retryable: kind.is_retryable(),
            timestamp: Utc::now(),
        }
    }

    /// Failure for a task whose dependencies have no successful result.
    #[must_use]
    pub fn dependency_unmet(task_id: &str, missing: &[String]) -> Self {
        Self::new(
            TaskErrorKind::DependencyUnmet,
            format!("task '{task_id}' requires [{}]", missing.join(", ")),
        )
    }

    /// Failure for an attempt that ran past `timeout_ms`.
    #[must_use]
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(TaskErrorKind::GatewayTimeout, format!("attempt exceeded {timeout_ms} ms"))
    }

    /// Failure for a task cut off, or never started, because the run's
    /// budget of `budget_ms` ran out.
    #[must_use]
    pub fn budget_exhausted(budget_ms: u64) -> Self {
        Self::new(
            TaskErrorKind::GatewayTimeout,
            format!("pipeline exhausted its {budget_ms} ms budget"),
        )
    }

    /// Failure for completion text that did not decode.
    #[must_use]
    pub fn parse(detail: impl AsRef<str>) -> Self {
        Self::new(TaskErrorKind::ResponseParseError, detail)
    }
}

impl From<&GatewayError> for TaskError {
    fn from(err: &GatewayError) -> Self {
        Self::new(err.task_error_kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_info_defaults_hint() {
        let info = DiagnosticInfo::new("PIPELINE-CYCLE", "cycle")
            .with_context_entry("task", "a");

        assert_eq!(info.code, "PIPELINE-CYCLE");
        assert!(info.fix_hint.is_some());
        assert_eq!(info.context.get("task"), Some(&"a".to_string()));
    }

    #[test]
    fn test_unknown_pipeline_code() {
        let err = PipelineValidationError::unknown_pipeline("nope");
        assert_eq!(err.code(), Some("PIPELINE-UNKNOWN"));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert!(err.to_string().contains("a -> b -> a"));

        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.code(), Some("PIPELINE-CYCLE"));
        assert_eq!(validation.tasks.len(), 3);
    }

    #[test]
    fn test_task_error_markers() {
        let err = TaskError::dependency_unmet("validate", &["extract".to_string()]);
        assert_eq!(err.kind, TaskErrorKind::DependencyUnmet);
        assert!(err.message.starts_with("dependencies not met"));
        assert!(!err.retryable);

        let err = TaskError::parse("missing field `classification`");
        assert!(err.message.starts_with("response not parseable"));
        assert!(err.retryable);

        let err = TaskError::timeout(50);
        assert!(err.message.starts_with("timeout"));
    }

    #[test]
    fn test_quota_is_not_retryable() {
        assert!(!TaskErrorKind::GatewayQuotaExceeded.is_retryable());
        assert!(TaskErrorKind::GatewayNetworkError.is_retryable());
    }

    #[test]
    fn test_task_error_serializes_camel_case() {
        let err = TaskError::new(TaskErrorKind::Internal, "");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "internal");
        assert!(json.get("userMessage").is_some());
        assert_eq!(json["message"], "internal error");
    }
}
