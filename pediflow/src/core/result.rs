//! Task result record.

use serde::{Deserialize, Serialize};

use super::{Task, TaskKind, TaskPayload};
use crate::errors::TaskError;

/// Agent label recorded on failed results.
pub const ERROR_AGENT: &str = "error";

/// Outcome of one task: the final attempt after retries.
///
/// Built through the factory methods so the success flag, payload and error
/// never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task_id: String,
    /// The kind of the task.
    pub kind: TaskKind,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TaskPayload>,
    /// Failure record on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// Confidence, 0..1. Always 0 on failure.
    pub confidence: f64,
    /// Wall-clock duration of the attempt.
    pub processing_time_ms: f64,
    /// Which specialization handled the task.
    pub agent_used: String,
}

impl TaskResult {
    /// Creates a successful result. Confidence is clamped to 0..1.
    #[must_use]
    pub fn success(task: &Task, data: TaskPayload, confidence: f64, processing_time_ms: f64) -> Self {
        Self {
            task_id: task.id.clone(),
            kind: task.kind,
            success: true,
            data: Some(data),
            error: None,
            confidence: confidence.clamp(0.0, 1.0),
            processing_time_ms,
            agent_used: task.kind.agent_label().to_string(),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(task: &Task, error: TaskError, processing_time_ms: f64) -> Self {
        Self {
            task_id: task.id.clone(),
            kind: task.kind,
            success: false,
            data: None,
            error: Some(error),
            confidence: 0.0,
            processing_time_ms,
            agent_used: ERROR_AGENT.to_string(),
        }
    }

    /// Synthetic failure for a task that never ran because `missing`
    /// dependencies had no successful result.
    #[must_use]
    pub fn dependency_unmet(task: &Task, missing: &[String]) -> Self {
        Self::failure(task, TaskError::dependency_unmet(&task.id, missing), 0.0)
    }

    /// Returns true if the result is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// The failure message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
