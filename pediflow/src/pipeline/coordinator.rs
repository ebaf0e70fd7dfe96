//! The pipeline coordinator.
//!
//! Runs a definition's tasks strictly in declared order. Each task is gated
//! on its dependencies, executed, and retried with backoff while its
//! failure is retryable. Task failures are recorded and never stop the run.
//! The run budget is a deadline: the task in flight when it passes, and every
//! task after it, is recorded as a timeout failure. Only a whole-run failure
//! (a definition that does not validate, or a panic inside a task) reaches
//! the fallback.

use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::fallback::{
    human_result, retries_exhausted_result, simplified_result, simplified_steps, skipped_result,
    RunFailure,
};
use super::{consolidate, ConsolidatedResult, FallbackStrategy, PipelineDefinition, PipelineRegistry, PipelineRun, MEDICAL_ANALYSIS};
use crate::core::{RunContext, Task, TaskResult};
use crate::errors::{PediflowError, PipelineValidationError, TaskError};
use crate::events::{
    EventSink, NoOpEventSink, PIPELINE_COMPLETED, PIPELINE_FAILED, PIPELINE_FALLBACK,
    PIPELINE_STARTED, TASK_COMPLETED, TASK_DEPENDENCIES_UNMET, TASK_FAILED, TASK_RETRYING,
    TASK_RETRY_EXHAUSTED, TASK_STARTED,
};
use crate::executor::{StepInput, TaskExecutor};
use crate::utils::{duration_ms, saturating_ms};

/// Selects definitions from a registry and runs them.
pub struct PipelineCoordinator {
    registry: Arc<PipelineRegistry>,
    executor: Arc<TaskExecutor>,
    events: Arc<dyn EventSink>,
}

impl PipelineCoordinator {
    /// Creates a coordinator with the built-in pipelines and no event sink.
    #[must_use]
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            registry: Arc::new(PipelineRegistry::with_defaults()),
            executor: Arc::new(executor),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PipelineRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The registry in use.
    #[must_use]
    pub fn registry(&self) -> &Arc<PipelineRegistry> {
        &self.registry
    }

    /// The executor in use.
    #[must_use]
    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    /// Runs the built-in medical analysis pipeline.
    ///
    /// # Errors
    ///
    /// See [`PipelineCoordinator::run_pipeline`].
    pub async fn process_input(
        &self,
        input: Value,
        context: RunContext,
    ) -> Result<ConsolidatedResult, PediflowError> {
        self.run_pipeline(MEDICAL_ANALYSIS, input, context).await
    }

    /// Runs the pipeline registered under `pipeline_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PediflowError::Definition`] with code `PIPELINE-UNKNOWN`
    /// when no such pipeline is registered. Every other failure is reported
    /// inside the consolidated result.
    pub async fn run_pipeline(
        &self,
        pipeline_id: &str,
        input: Value,
        context: RunContext,
    ) -> Result<ConsolidatedResult, PediflowError> {
        let Some(definition) = self.registry.get(pipeline_id) else {
            warn!(pipeline = pipeline_id, "Unknown pipeline");
            return Err(PipelineValidationError::unknown_pipeline(pipeline_id).into());
        };
        let run = self.run_definition(&definition, input, context).await;
        let run_id = run.run_id().to_string();
        run.into_consolidated().ok_or_else(|| {
            PediflowError::Internal(format!("run {run_id} ended without a result"))
        })
    }

    /// Runs any definition, applying its fallback on whole-run failure.
    /// The returned run always carries a consolidated result.
    pub async fn run_definition(
        &self,
        definition: &PipelineDefinition,
        input: Value,
        context: RunContext,
    ) -> PipelineRun {
        let mut reruns = 0;
        loop {
            let mut run = PipelineRun::new(definition.id.clone(), input.clone(), context.clone());
            let Err(failure) = self.attempt(definition, &mut run).await else {
                return run;
            };

            error!(pipeline = %definition.id, run = %run.run_id(), error = %failure, "Pipeline run failed");
            run.fail(failure.to_string());
            self.events.try_emit(
                PIPELINE_FAILED,
                Some(json!({
                    "pipeline": definition.id,
                    "run": run.run_id(),
                    "error": failure.to_string(),
                })),
            );

            let strategy = definition.fallback_strategy;
            if strategy == FallbackStrategy::Retry && reruns < definition.fallback_reruns {
                reruns += 1;
                warn!(pipeline = %definition.id, rerun = reruns, "Re-running pipeline");
                self.emit_fallback(definition, strategy, &failure);
                continue;
            }

            self.emit_fallback(definition, strategy, &failure);
            let consolidated = match strategy {
                FallbackStrategy::Retry => retries_exhausted_result(&definition.id, &failure),
                FallbackStrategy::Simplify => {
                    self.simplify(definition, &input, &context, &failure).await
                }
                FallbackStrategy::Human => human_result(&definition.id, &failure),
                FallbackStrategy::Skip => skipped_result(&definition.id, &failure),
            };
            run.set_fallback_result(consolidated);
            return run;
        }
    }

    fn emit_fallback(
        &self,
        definition: &PipelineDefinition,
        strategy: FallbackStrategy,
        failure: &RunFailure,
    ) {
        info!(pipeline = %definition.id, strategy = %strategy, "Applying fallback");
        self.events.try_emit(
            PIPELINE_FALLBACK,
            Some(json!({
                "pipeline": definition.id,
                "strategy": strategy,
                "error": failure.to_string(),
            })),
        );
    }

    async fn attempt(
        &self,
        definition: &PipelineDefinition,
        run: &mut PipelineRun,
    ) -> Result<(), RunFailure> {
        definition.validate()?;
        run.start().map_err(|e| RunFailure::State(e.to_string()))?;

        info!(pipeline = %definition.id, run = %run.run_id(), steps = definition.steps.len(), "Pipeline started");
        self.events
            .emit(
                PIPELINE_STARTED,
                Some(json!({"pipeline": definition.id, "run": run.run_id()})),
            )
            .await;

        let deadline = Instant::now() + definition.timeout();
        AssertUnwindSafe(self.run_tasks(definition, run, deadline))
            .catch_unwind()
            .await
            .map_err(|panic| RunFailure::from_panic(panic.as_ref()))?;

        let consolidated = consolidate(&definition.id, run.results());
        info!(
            pipeline = %definition.id,
            run = %run.run_id(),
            success = consolidated.success,
            confidence = consolidated.confidence,
            "Pipeline completed"
        );
        self.events
            .emit(
                PIPELINE_COMPLETED,
                Some(json!({
                    "pipeline": definition.id,
                    "run": run.run_id(),
                    "success": consolidated.success,
                    "confidence": consolidated.confidence,
                })),
            )
            .await;
        run.complete(consolidated)
            .map_err(|e| RunFailure::State(e.to_string()))
    }

    async fn run_tasks(
        &self,
        definition: &PipelineDefinition,
        run: &mut PipelineRun,
        deadline: Instant,
    ) {
        for task in &definition.steps {
            let missing: Vec<String> = task
                .dependencies
                .iter()
                .filter(|dep| !run.succeeded(dep))
                .cloned()
                .collect();
            if !missing.is_empty() {
                warn!(pipeline = %definition.id, task = %task.id, missing = ?missing, "Dependencies not met");
                self.events.try_emit(
                    TASK_DEPENDENCIES_UNMET,
                    Some(json!({"pipeline": definition.id, "task": task.id, "missing": missing})),
                );
                run.record(TaskResult::dependency_unmet(task, &missing));
                continue;
            }

            let input = step_input(task, run);
            self.events.try_emit(
                TASK_STARTED,
                Some(json!({"pipeline": definition.id, "task": task.id, "kind": task.kind})),
            );
            let started = Instant::now();
            let result = if started >= deadline {
                TaskResult::failure(task, TaskError::budget_exhausted(definition.timeout_ms), 0.0)
            } else {
                let work = self.execute_with_retry(definition, task, &input, run.context());
                match tokio::time::timeout_at(deadline, work).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            pipeline = %definition.id,
                            task = %task.id,
                            budget_ms = definition.timeout_ms,
                            "Run budget exhausted"
                        );
                        TaskResult::failure(
                            task,
                            TaskError::budget_exhausted(definition.timeout_ms),
                            duration_ms(started.elapsed()),
                        )
                    }
                }
            };

            let event = if result.success { TASK_COMPLETED } else { TASK_FAILED };
            self.events.try_emit(
                event,
                Some(json!({
                    "pipeline": definition.id,
                    "task": task.id,
                    "confidence": result.confidence,
                    "error": result.error_message(),
                })),
            );
            run.record(result);
        }
    }

    async fn execute_with_retry(
        &self,
        definition: &PipelineDefinition,
        task: &Task,
        input: &StepInput,
        context: &RunContext,
    ) -> TaskResult {
        let mut result = self.executor.execute(task, input, context).await;
        let mut attempt = 0;

        while !result.success && attempt < definition.max_retries {
            let retryable = result.error.as_ref().is_some_and(|e| e.retryable);
            if !retryable {
                break;
            }
            attempt += 1;
            let delay = definition.retry.delay_for(attempt);
            warn!(
                pipeline = %definition.id,
                task = %task.id,
                attempt,
                delay_ms = saturating_ms(delay),
                error = ?result.error_message(),
                "Retrying task"
            );
            self.events.try_emit(
                TASK_RETRYING,
                Some(json!({
                    "pipeline": definition.id,
                    "task": task.id,
                    "attempt": attempt,
                    "delayMs": saturating_ms(delay),
                })),
            );
            tokio::time::sleep(delay).await;
            result = self.executor.execute(task, input, context).await;
        }

        if !result.success && attempt > 0 && attempt == definition.max_retries {
            warn!(pipeline = %definition.id, task = %task.id, attempts = attempt + 1, "Retries exhausted");
            self.events.try_emit(
                TASK_RETRY_EXHAUSTED,
                Some(json!({"pipeline": definition.id, "task": task.id, "attempts": attempt + 1})),
            );
        }
        result
    }

    async fn simplify(
        &self,
        definition: &PipelineDefinition,
        input: &Value,
        context: &RunContext,
        failure: &RunFailure,
    ) -> ConsolidatedResult {
        let [classify, validate] = simplified_steps(definition);
        let step = StepInput::new(input.clone());
        let work = async {
            let classified = self.executor.execute(&classify, &step, context).await;
            let validated = self.executor.execute(&validate, &step, context).await;
            vec![classified, validated]
        };
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(results) => simplified_result(&definition.id, &results, failure),
            Err(panic) => {
                let inner = RunFailure::from_panic(panic.as_ref());
                error!(pipeline = %definition.id, error = %inner, "Simplified analysis failed");
                ConsolidatedResult::failed(&definition.id, inner.to_string())
                    .with_fallback(FallbackStrategy::Simplify)
            }
        }
    }
}

/// Gathers upstream payloads for `task`: the latest success of each kind,
/// overridden by the task's own declared dependencies.
fn step_input(task: &Task, run: &PipelineRun) -> StepInput {
    let mut input = StepInput::new(run.input().clone());
    for payload in run.results().iter().filter(|r| r.success).filter_map(|r| r.data.as_ref()) {
        input.absorb(payload);
    }
    for dep in &task.dependencies {
        if let Some(payload) = run
            .result(dep)
            .filter(|r| r.success)
            .and_then(|r| r.data.as_ref())
        {
            input.absorb(payload);
        }
    }
    input
}
