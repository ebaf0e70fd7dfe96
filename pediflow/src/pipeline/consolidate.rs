//! Merging task results into one consolidated result.

use serde::{Deserialize, Serialize};

use super::FallbackStrategy;
use crate::core::{
    AnalysisPayload, ClassificationPayload, RecommendationPayload, TaskPayload, TaskResult,
    ValidationPayload,
};

/// Per-kind lookup of the first successful payload of each kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedData {
    /// Classification payload.
    pub classification: Option<ClassificationPayload>,
    /// Analysis payload.
    pub analysis: Option<AnalysisPayload>,
    /// Validation payload.
    pub validation: Option<ValidationPayload>,
    /// Recommendation payload.
    pub recommendation: Option<RecommendationPayload>,
}

/// The single object a run returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedResult {
    /// The pipeline that produced it.
    pub pipeline_id: String,
    /// True only when no task failed.
    pub success: bool,
    /// Mean confidence of the successful tasks, 0 when none succeeded.
    pub confidence: f64,
    /// Payloads by kind.
    pub data: ConsolidatedData,
    /// One entry per failed task, `"<task id>: <message>"`.
    pub errors: Vec<String>,
    /// Sum of the retained results' durations.
    pub processing_time_ms: f64,
    /// Tasks that succeeded.
    pub steps_completed: usize,
    /// Tasks with a retained result.
    pub total_steps: usize,
    /// Produced by the simplify fallback.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simplified: bool,
    /// Produced by the human fallback.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_human_review: bool,
    /// Produced by the skip fallback.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    /// The fallback that produced this result, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackStrategy>,
    /// Note for the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The run failure that triggered a fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsolidatedResult {
    /// An empty, unsuccessful result carrying `error`.
    #[must_use]
    pub fn failed(pipeline_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            success: false,
            confidence: 0.0,
            data: ConsolidatedData::default(),
            errors: Vec::new(),
            processing_time_ms: 0.0,
            steps_completed: 0,
            total_steps: 0,
            simplified: false,
            requires_human_review: false,
            skipped: false,
            fallback: None,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Marks the result as produced by `strategy`.
    #[must_use]
    pub fn with_fallback(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback = Some(strategy);
        self
    }

    /// Sets the caller note.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Merges `results` into a consolidated result. Pure.
#[must_use]
pub fn consolidate(pipeline_id: &str, results: &[TaskResult]) -> ConsolidatedResult {
    let mut data = ConsolidatedData::default();
    let mut errors = Vec::new();
    let mut confidence_sum = 0.0;
    let mut succeeded = 0usize;
    let mut processing_time_ms = 0.0;

    for result in results {
        processing_time_ms += result.processing_time_ms;
        if result.success {
            succeeded += 1;
            confidence_sum += result.confidence;
        } else {
            let message = result.error_message().unwrap_or("unknown error");
            errors.push(format!("{}: {message}", result.task_id));
        }

        match &result.data {
            Some(TaskPayload::Classification(p)) if data.classification.is_none() => {
                data.classification = Some(p.clone());
            }
            Some(TaskPayload::Analysis(p)) if data.analysis.is_none() => {
                data.analysis = Some(p.clone());
            }
            Some(TaskPayload::Validation(p)) if data.validation.is_none() => {
                data.validation = Some(p.clone());
            }
            Some(TaskPayload::Recommendation(p)) if data.recommendation.is_none() => {
                data.recommendation = Some(p.clone());
            }
            _ => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let confidence = if succeeded == 0 {
        0.0
    } else {
        confidence_sum / succeeded as f64
    };

    ConsolidatedResult {
        pipeline_id: pipeline_id.to_string(),
        success: errors.is_empty(),
        confidence,
        data,
        errors,
        processing_time_ms,
        steps_completed: succeeded,
        total_steps: results.len(),
        simplified: false,
        requires_human_review: false,
        skipped: false,
        fallback: None,
        message: None,
        error: None,
    }
}
