//! Runs one task against the gateway or the ruleset.
//!
//! [`TaskExecutor::execute`] never fails: gateway errors, timeouts and
//! undecodable replies all come back as a failed [`TaskResult`]. Retries and
//! dependency gating belong to the coordinator.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::{
    AnalysisPayload, ClassificationPayload, RunContext, Task, TaskKind, TaskPayload, TaskResult,
    ValidationPayload,
};
use crate::errors::TaskError;
use crate::gateway::CompletionGateway;
use crate::prompts::{DefaultPromptBuilder, PromptBuilder, PromptRequest};
use crate::utils::duration_ms;
use crate::validation::{validate_medication, MedicalValidator};

/// Confidence recorded when a payload does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// What a task sees: the run's original input plus upstream payloads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepInput {
    /// The input the run was started with.
    pub original: Value,
    /// Upstream classification.
    pub classification: Option<ClassificationPayload>,
    /// Upstream analysis.
    pub analysis: Option<AnalysisPayload>,
    /// Upstream validation.
    pub validation: Option<ValidationPayload>,
}

impl StepInput {
    /// Input with no upstream payloads.
    #[must_use]
    pub fn new(original: Value) -> Self {
        Self {
            original,
            ..Self::default()
        }
    }

    /// Sets the upstream classification.
    #[must_use]
    pub fn with_classification(mut self, payload: ClassificationPayload) -> Self {
        self.classification = Some(payload);
        self
    }

    /// Sets the upstream analysis.
    #[must_use]
    pub fn with_analysis(mut self, payload: AnalysisPayload) -> Self {
        self.analysis = Some(payload);
        self
    }

    /// Sets the upstream validation.
    #[must_use]
    pub fn with_validation(mut self, payload: ValidationPayload) -> Self {
        self.validation = Some(payload);
        self
    }

    /// Records an upstream payload in the slot for its kind.
    pub fn absorb(&mut self, payload: &TaskPayload) {
        match payload {
            TaskPayload::Classification(p) => self.classification = Some(p.clone()),
            TaskPayload::Analysis(p) => self.analysis = Some(p.clone()),
            TaskPayload::Validation(p) => self.validation = Some(p.clone()),
            TaskPayload::Recommendation(_) => {}
        }
    }

    /// The original input as prompt text. Strings are used verbatim.
    #[must_use]
    pub fn rendered_input(&self) -> String {
        match &self.original {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Executes tasks by kind.
pub struct TaskExecutor {
    gateway: Arc<dyn CompletionGateway>,
    prompts: Arc<dyn PromptBuilder>,
    validator: Arc<MedicalValidator>,
}

impl TaskExecutor {
    /// Creates an executor with the default prompts and ruleset.
    #[must_use]
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            gateway,
            prompts: Arc::new(DefaultPromptBuilder::new()),
            validator: Arc::new(MedicalValidator::new()),
        }
    }

    /// Replaces the prompt builder.
    #[must_use]
    pub fn with_prompts(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<MedicalValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// The ruleset used by validation tasks.
    #[must_use]
    pub fn validator(&self) -> &MedicalValidator {
        &self.validator
    }

    /// Runs one attempt of `task`.
    pub async fn execute(&self, task: &Task, input: &StepInput, context: &RunContext) -> TaskResult {
        let started = Instant::now();
        let outcome = match task.kind {
            TaskKind::Validation => Ok(self.validate(input, context)),
            _ => self.complete(task, input, context).await,
        };
        let elapsed = duration_ms(started.elapsed());

        match outcome {
            Ok(payload) => {
                let confidence = payload.confidence().unwrap_or(DEFAULT_CONFIDENCE);
                debug!(task = %task.id, kind = %task.kind, confidence, "Task attempt succeeded");
                TaskResult::success(task, payload, confidence, elapsed)
            }
            Err(error) => {
                warn!(
                    task = %task.id,
                    kind = %task.kind,
                    error_kind = %error.kind,
                    error = %error.message,
                    "Task attempt failed"
                );
                TaskResult::failure(task, error, elapsed)
            }
        }
    }

    /// Runs the ruleset over the upstream analysis, or over the original
    /// input when it is an object and no analysis is available.
    #[must_use]
    pub fn validate(&self, input: &StepInput, context: &RunContext) -> TaskPayload {
        let age = context.patient_age_months;
        let values: Map<String, Value> = match (&input.analysis, &input.original) {
            (Some(analysis), _) => analysis.measurements.clone(),
            (None, Value::Object(map)) => map.clone(),
            (None, _) => Map::new(),
        };

        let mut result = self.validator.validate(&values, age);
        if let Some(medication) = input.analysis.as_ref().and_then(|a| a.medication.as_ref()) {
            result = result.merge(validate_medication(medication));
        }

        TaskPayload::Validation(ValidationPayload {
            result,
            original_data: Value::Object(values),
        })
    }

    async fn complete(
        &self,
        task: &Task,
        input: &StepInput,
        context: &RunContext,
    ) -> Result<TaskPayload, TaskError> {
        let rendered = input.rendered_input();
        let request = match task.kind {
            TaskKind::Classification => PromptRequest::Classify {
                input: &rendered,
                context,
            },
            TaskKind::Analysis => PromptRequest::Analyze {
                input: &rendered,
                classification: input.classification.as_ref(),
                context,
            },
            TaskKind::Recommendation | TaskKind::Validation => PromptRequest::Recommend {
                validation: input.validation.as_ref(),
                analysis: input.analysis.as_ref(),
                context,
            },
        };
        let messages = self.prompts.build(&request).to_messages();

        let text = match tokio::time::timeout(task.timeout(), self.gateway.complete(&messages)).await
        {
            Err(_) => return Err(TaskError::timeout(task.timeout_ms)),
            Ok(Err(err)) => return Err(TaskError::from(&err)),
            Ok(Ok(text)) => text,
        };

        TaskPayload::decode(task.kind, &text).map_err(TaskError::parse)
    }
}
