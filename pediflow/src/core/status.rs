//! Task kind, priority and run status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Label the input (content type, urgency, specialists).
    Classification,
    /// Extract structured medical data using the classification.
    Analysis,
    /// Check extracted values against the local ruleset. No gateway call.
    Validation,
    /// Turn validation findings into advice.
    Recommendation,
}

impl TaskKind {
    /// All kinds, in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::Classification,
        Self::Analysis,
        Self::Validation,
        Self::Recommendation,
    ];

    /// Fixed label of the specialization that handles this kind.
    #[must_use]
    pub fn agent_label(self) -> &'static str {
        match self {
            Self::Classification => "classifier",
            Self::Analysis => "medical_analyzer",
            Self::Validation => "medical_validator",
            Self::Recommendation => "recommendation_engine",
        }
    }

    /// Returns true if executing this kind calls the completion gateway.
    #[must_use]
    pub fn uses_gateway(self) -> bool {
        !matches!(self, Self::Validation)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Analysis => write!(f, "analysis"),
            Self::Validation => write!(f, "validation"),
            Self::Recommendation => write!(f, "recommendation"),
        }
    }
}

/// Informational urgency of a task or finding. Never affects ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Routine.
    Low,
    /// Default.
    #[default]
    Medium,
    /// Should be surfaced promptly.
    High,
    /// Needs immediate attention.
    Critical,
}

impl TaskPriority {
    /// Returns true for high and critical.
    #[must_use]
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// The lifecycle status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not started.
    #[default]
    Pending,
    /// Tasks are being processed.
    Running,
    /// Every task was attempted. Individual tasks may still have failed.
    Completed,
    /// The definition could not be resolved or an error escaped the run.
    Failed,
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this status.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_display() {
        assert_eq!(TaskKind::Classification.to_string(), "classification");
        assert_eq!(TaskKind::Recommendation.to_string(), "recommendation");
    }

    #[test]
    fn test_agent_labels() {
        assert_eq!(TaskKind::Classification.agent_label(), "classifier");
        assert_eq!(TaskKind::Analysis.agent_label(), "medical_analyzer");
        assert_eq!(TaskKind::Validation.agent_label(), "medical_validator");
        assert_eq!(TaskKind::Recommendation.agent_label(), "recommendation_engine");
    }

    #[test]
    fn test_only_validation_skips_gateway() {
        let local: Vec<_> = TaskKind::ALL.iter().filter(|k| !k.uses_gateway()).collect();
        assert_eq!(local, vec![&TaskKind::Validation]);
    }

    #[test]
    fn test_priority_serialize() {
        let json = serde_json::to_string(&TaskPriority::Critical).unwrap();
        assert_eq!(json, r#""critical""#);
        let parsed: TaskPriority = serde_json::from_str(r#""high""#).unwrap();
        assert!(parsed.is_urgent());
        assert!(!TaskPriority::default().is_urgent());
    }

    #[test]
    fn test_run_status_transitions() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Failed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
