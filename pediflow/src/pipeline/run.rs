//! One execution of a pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::ConsolidatedResult;
use crate::core::{RunContext, RunStatus, TaskResult};
use crate::errors::PediflowError;
use crate::utils::{now_utc, prefixed_id, Timestamp};

/// State of one run: its input, the retained task results and, once every
/// task has been attempted or a fallback applied, the consolidated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    run_id: String,
    pipeline_id: String,
    input: Value,
    context: RunContext,
    status: RunStatus,
    results: Vec<TaskResult>,
    consolidated: Option<ConsolidatedResult>,
    error: Option<String>,
    started_at: Timestamp,
    ended_at: Option<Timestamp>,
}

impl PipelineRun {
    /// A pending run.
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>, input: Value, context: RunContext) -> Self {
        Self {
            run_id: prefixed_id("run"),
            pipeline_id: pipeline_id.into(),
            input,
            context,
            status: RunStatus::Pending,
            results: Vec::new(),
            consolidated: None,
            error: None,
            started_at: now_utc(),
            ended_at: None,
        }
    }

    /// Unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The pipeline being run.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// The run's input.
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// The run's context.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Retained results, one per attempted task, in execution order.
    #[must_use]
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    /// The retained result for `task_id`.
    #[must_use]
    pub fn result(&self, task_id: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task_id == task_id)
    }

    /// Returns true if `task_id` has a successful result.
    #[must_use]
    pub fn succeeded(&self, task_id: &str) -> bool {
        self.result(task_id).is_some_and(|r| r.success)
    }

    /// The consolidated result, once available.
    #[must_use]
    pub fn consolidated(&self) -> Option<&ConsolidatedResult> {
        self.consolidated.as_ref()
    }

    /// Consumes the run, returning its consolidated result.
    #[must_use]
    pub fn into_consolidated(self) -> Option<ConsolidatedResult> {
        self.consolidated
    }

    /// Why the run failed, if it did.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the run was created.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// When the run reached a terminal state.
    #[must_use]
    pub fn ended_at(&self) -> Option<Timestamp> {
        self.ended_at
    }

    fn transition(&mut self, next: RunStatus) -> Result<(), PediflowError> {
        if !self.status.can_transition_to(next) {
            return Err(PediflowError::Internal(format!(
                "run {} cannot move from {:?} to {next:?}",
                self.run_id, self.status
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(now_utc());
        }
        Ok(())
    }

    /// Moves a pending run to running.
    ///
    /// # Errors
    ///
    /// Returns [`PediflowError::Internal`] unless the run is pending.
    pub fn start(&mut self) -> Result<(), PediflowError> {
        self.transition(RunStatus::Running)
    }

    /// Stores `result`, replacing an earlier result for the same task.
    pub fn record(&mut self, result: TaskResult) {
        match self.results.iter_mut().find(|r| r.task_id == result.task_id) {
            Some(existing) => {
                warn!(run = %self.run_id, task = %result.task_id, "Replacing task result");
                *existing = result;
            }
            None => self.results.push(result),
        }
    }

    /// Finishes a running run with its consolidated result.
    ///
    /// # Errors
    ///
    /// Returns [`PediflowError::Internal`] unless the run is running.
    pub fn complete(&mut self, consolidated: ConsolidatedResult) -> Result<(), PediflowError> {
        self.transition(RunStatus::Completed)?;
        self.consolidated = Some(consolidated);
        Ok(())
    }

    /// Marks the run failed. A run that already ended keeps its status.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        if self.transition(RunStatus::Failed).is_err() {
            warn!(run = %self.run_id, status = ?self.status, error = %error, "Run already ended");
        }
        self.error = Some(error);
    }

    /// Attaches the result a fallback produced for a failed run.
    pub fn set_fallback_result(&mut self, consolidated: ConsolidatedResult) {
        self.consolidated = Some(consolidated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Task, TaskKind};
    use crate::errors::TaskError;
    use crate::pipeline::consolidate;
    use serde_json::json;

    fn run() -> PipelineRun {
        PipelineRun::new("p", json!("input"), RunContext::new())
    }

    #[test]
    fn test_lifecycle() {
        let mut run = run();
        assert_eq!(run.status(), RunStatus::Pending);
        assert!(run.run_id().starts_with("run_"));

        run.start().unwrap();
        assert!(run.start().is_err());
        let merged = consolidate("p", run.results());
        run.complete(merged).unwrap();

        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.ended_at().is_some());
        assert!(run.consolidated().is_some());
    }

    #[test]
    fn test_complete_requires_running() {
        let mut run = run();
        assert!(run.complete(consolidate("p", &[])).is_err());
        assert!(run.consolidated().is_none());
    }

    #[test]
    fn test_fail_from_pending_and_running() {
        let mut pending = run();
        pending.fail("bad definition");
        assert_eq!(pending.status(), RunStatus::Failed);
        assert_eq!(pending.error(), Some("bad definition"));

        let mut running = run();
        running.start().unwrap();
        running.fail("timeout");
        assert_eq!(running.status(), RunStatus::Failed);
    }

    #[test]
    fn test_record_keeps_one_result_per_task() {
        let mut run = run();
        let task = Task::new("classify", TaskKind::Classification);
        run.record(TaskResult::failure(&task, TaskError::timeout(5), 5.0));
        run.record(TaskResult::failure(&task, TaskError::timeout(6), 6.0));
        assert_eq!(run.results().len(), 1);
        assert!((run.results()[0].processing_time_ms - 6.0).abs() < f64::EPSILON);
        assert!(!run.succeeded("classify"));
    }
}
