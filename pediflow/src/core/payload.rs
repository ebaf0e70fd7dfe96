//! Typed task payloads and the strict decode step for completion text.
//!
//! Completion text is decoded leniently at the envelope level (code fences
//! and surrounding prose are tolerated) and strictly at the shape level: each
//! task kind has one payload struct, and anything that does not deserialize
//! into it is a parse failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{TaskKind, TaskPriority};
use crate::utils::parse_json_block;
use crate::validation::{Medication, ValidationResult};

/// Output of a classification task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationPayload {
    /// Content label (weight, temperature, symptom, ...).
    pub classification: String,
    /// Classifier confidence, 0..1.
    pub confidence: f64,
    /// How urgent the content looks.
    #[serde(default, alias = "priority", skip_serializing_if = "Option::is_none")]
    pub urgency: Option<TaskPriority>,
    /// measurement, observation, document, note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Whether the content needs a human to look at it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_attention: Option<bool>,
    /// Free-text rationale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Specialists the classifier thinks should weigh in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_specialists: Vec<String>,
    /// Any values the classifier pulled out on the way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,
}

/// Output of an analysis (extraction) task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    /// Reported symptoms.
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Field name to a number or a `{ "value": n, "unit": .. }` object.
    #[serde(default, alias = "vitalSigns")]
    pub measurements: Map<String, Value>,
    /// Behaviour changes mentioned in the input.
    #[serde(default)]
    pub behavioral_changes: Vec<String>,
    /// Alerts raised by the analyzer.
    #[serde(default)]
    pub alerts: Vec<String>,
    /// Recommendations from the analyzer.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Whether a clinician should be involved.
    #[serde(default)]
    pub requires_medical_attention: bool,
    /// Urgency of the findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// Analyzer confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// A medication mentioned in the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication: Option<Medication>,
}

/// Output of a validation task: the ruleset verdict plus what was checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPayload {
    /// The ruleset verdict.
    #[serde(flatten)]
    pub result: ValidationResult,
    /// The values that were validated.
    pub original_data: Value,
}

/// Output of a recommendation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationPayload {
    /// The advice itself.
    pub recommendations: Vec<String>,
    /// Follow-up actions.
    #[serde(default)]
    pub next_steps: Vec<String>,
    /// How soon to act.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<TaskPriority>,
    /// Whether a professional should be consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_professional: Option<bool>,
    /// Engine confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A successful task's payload, one variant per task kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Classification output.
    Classification(ClassificationPayload),
    /// Analysis output.
    Analysis(AnalysisPayload),
    /// Validation output.
    Validation(ValidationPayload),
    /// Recommendation output.
    Recommendation(RecommendationPayload),
}

impl TaskPayload {
    /// Decodes completion text into the payload for `kind`.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the text holds no JSON
    /// object, the object has the wrong shape, or `kind` is validation
    /// (validation payloads are never decoded from completion text).
    pub fn decode(kind: TaskKind, text: &str) -> Result<Self, String> {
        let value = parse_json_block(text).map_err(|e| e.to_string())?;
        if !value.is_object() {
            return Err("expected a JSON object".to_string());
        }
        Self::from_value(kind, value)
    }

    /// Shape-checks an already parsed value.
    ///
    /// # Errors
    ///
    /// See [`TaskPayload::decode`].
    pub fn from_value(kind: TaskKind, value: Value) -> Result<Self, String> {
        match kind {
            TaskKind::Classification => {
                let payload: ClassificationPayload =
                    serde_json::from_value(value).map_err(|e| e.to_string())?;
                if payload.classification.trim().is_empty() {
                    return Err("classification label is empty".to_string());
                }
                Ok(Self::Classification(payload))
            }
            TaskKind::Analysis => serde_json::from_value(value)
                .map(Self::Analysis)
                .map_err(|e| e.to_string()),
            TaskKind::Recommendation => serde_json::from_value(value)
                .map(Self::Recommendation)
                .map_err(|e| e.to_string()),
            TaskKind::Validation => {
                Err("validation payloads are produced locally, not decoded".to_string())
            }
        }
    }

    /// The task kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Classification(_) => TaskKind::Classification,
            Self::Analysis(_) => TaskKind::Analysis,
            Self::Validation(_) => TaskKind::Validation,
            Self::Recommendation(_) => TaskKind::Recommendation,
        }
    }

    /// Confidence reported inside the payload, if any.
    #[must_use]
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Classification(p) => Some(p.confidence),
            Self::Analysis(p) => p.confidence,
            Self::Validation(p) => Some(p.result.confidence),
            Self::Recommendation(p) => p.confidence,
        }
    }

    /// Returns the classification payload, if this is one.
    #[must_use]
    pub fn as_classification(&self) -> Option<&ClassificationPayload> {
        match self {
            Self::Classification(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the analysis payload, if this is one.
    #[must_use]
    pub fn as_analysis(&self) -> Option<&AnalysisPayload> {
        match self {
            Self::Analysis(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the validation payload, if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationPayload> {
        match self {
            Self::Validation(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the recommendation payload, if this is one.
    #[must_use]
    pub fn as_recommendation(&self) -> Option<&RecommendationPayload> {
        match self {
            Self::Recommendation(p) => Some(p),
            _ => None,
        }
    }
}
