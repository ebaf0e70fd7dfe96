//! Task definition.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{TaskKind, TaskPriority};

/// Default per-attempt time budget.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5_000;

/// A unit of pipeline work. Immutable once part of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique id within its pipeline.
    pub id: String,
    /// What the task does.
    pub kind: TaskKind,
    /// Informational urgency.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Ids of tasks that must have succeeded before this one runs.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Maximum duration of one attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TASK_TIMEOUT_MS
}

impl Task {
    /// Creates a task with medium priority, no dependencies and the default timeout.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            kind,
            priority: TaskPriority::default(),
            dependencies: Vec::new(),
            timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a dependency. Repeated ids are ignored.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        let dep = dep.into();
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    /// Adds several dependencies.
    #[must_use]
    pub fn with_dependencies<I, S>(self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        deps.into_iter().fold(self, Self::with_dependency)
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The per-attempt timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_task_builder() {
        let task = Task::new("extract", TaskKind::Analysis)
            .with_priority(TaskPriority::High)
            .with_dependencies(["classify", "classify"])
            .with_timeout_ms(10_000);

        assert_eq!(task.dependencies, vec!["classify".to_string()]);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_task_deserialize_defaults() {
        let task: Task =
            serde_json::from_str(r#"{"id": "validate", "kind": "validation"}"#).unwrap();
        assert_eq!(task.timeout_ms, DEFAULT_TASK_TIMEOUT_MS);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.dependencies.is_empty());
    }
}
