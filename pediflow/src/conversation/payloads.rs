//! Shapes of the conversation agents' replies, and the session's final result.
//!
//! The classifier and the medical specialist answer with the pipeline's
//! [`ClassificationPayload`](crate::core::ClassificationPayload) and
//! [`AnalysisPayload`](crate::core::AnalysisPayload).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One extracted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMeasurement {
    /// Numeric value.
    pub value: f64,
    /// Unit as written.
    #[serde(default)]
    pub unit: String,
    /// When it was taken, if stated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Reply of the data extraction agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPayload {
    /// Measurement name to reading.
    #[serde(default)]
    pub measurements: BTreeMap<String, ExtractedMeasurement>,
    /// Dates mentioned in the input.
    #[serde(default)]
    pub dates: Vec<String>,
    /// Other quantities (feeding volume, sleep hours, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub quantities: Map<String, Value>,
    /// Extractor confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ExtractionPayload {
    /// The measurements in the shape the validation ruleset reads.
    #[must_use]
    pub fn to_validator_input(&self) -> Map<String, Value> {
        self.measurements
            .iter()
            .map(|(name, m)| (name.clone(), json!({"value": m.value, "unit": m.unit})))
            .collect()
    }
}

/// Verdict of the safety validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    /// Nothing of concern.
    Safe,
    /// Keep an eye on it.
    Caution,
    /// Act soon.
    Warning,
    /// Act now.
    Critical,
}

impl fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Reply of the safety validation agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReviewPayload {
    /// Overall verdict.
    pub safety_status: SafetyStatus,
    /// Per-measurement notes.
    #[serde(default)]
    pub validated_measurements: Value,
    /// Identified risk factors.
    #[serde(default)]
    pub risk_factors: Vec<String>,
    /// Safety advice.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Validator confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Reply of the synthesis agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisPayload {
    /// Executive summary.
    #[serde(default)]
    pub summary: String,
    /// The most important findings.
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Prioritised advice.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Follow-up actions.
    #[serde(default)]
    pub next_steps: Vec<String>,
    /// Overall safety level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_level: Option<String>,
    /// Synthesiser confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// What a completed session hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    /// The synthesiser's reply.
    pub synthesis: SynthesisPayload,
    /// The synthesiser's recommendations.
    pub recommendations: Vec<String>,
    /// Synthesiser confidence, 0.8 when it reported none.
    pub confidence: f64,
    /// Overall safety level, `"unknown"` when none was reported.
    pub safety_level: String,
    /// Everything the data extractor attached to its messages, merged.
    pub extracted_data: Value,
    /// Plain-text recap of the session.
    pub conversation_summary: String,
}

/// A measurement flagged for the safety validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalMeasurement {
    /// Measurement name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Numeric value.
    pub value: f64,
    /// Unit as written.
    #[serde(default)]
    pub unit: String,
}

impl CriticalMeasurement {
    /// The deterministic verdict for this reading.
    #[must_use]
    pub fn assessment(&self) -> &'static str {
        match self.kind.as_str() {
            "temperature" if self.value > 39.0 => "CRITICAL: high fever",
            "temperature" if self.value > 38.0 => "WARNING: fever",
            "weight" if self.value < 2.5 => "WARNING: low weight",
            "weight" if self.value > 6.0 => "WARNING: high weight",
            "temperature" | "weight" => "normal",
            _ => "needs review",
        }
    }
}

impl fmt::Display for CriticalMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}{}", self.kind, self.value, self.unit)
    }
}

/// Readings that are flagged for the safety validator: a temperature above
/// 38, or a weight below 2.5 or above 6.
#[must_use]
pub fn critical_measurements(extraction: &ExtractionPayload) -> Vec<CriticalMeasurement> {
    let flag = |kind: &str, test: fn(f64) -> bool| {
        extraction
            .measurements
            .get(kind)
            .filter(|m| test(m.value))
            .map(|m| CriticalMeasurement {
                kind: kind.to_string(),
                value: m.value,
                unit: m.unit.clone(),
            })
    };
    [
        flag("temperature", |v| v > 38.0),
        flag("weight", |v| !(2.5..=6.0).contains(&v)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EXTRACTION_JSON, SAFETY_JSON};

    fn reading(kind: &str, value: f64) -> CriticalMeasurement {
        CriticalMeasurement {
            kind: kind.to_string(),
            value,
            unit: String::new(),
        }
    }

    #[test]
    fn test_fixture_shapes() {
        let extraction: ExtractionPayload = serde_json::from_str(EXTRACTION_JSON).unwrap();
        assert_eq!(extraction.measurements.len(), 2);
        assert_eq!(extraction.to_validator_input()["weight"]["value"], json!(5.2));

        let safety: SafetyReviewPayload = serde_json::from_str(SAFETY_JSON).unwrap();
        assert_eq!(safety.safety_status, SafetyStatus::Caution);
    }

    #[test]
    fn test_critical_measurements() {
        let extraction: ExtractionPayload = serde_json::from_str(
            r#"{"measurements": {
                "temperature": {"value": 38.0, "unit": "C"},
                "weight": {"value": 2.4, "unit": "kg"},
                "height": {"value": 400, "unit": "cm"}
            }}"#,
        )
        .unwrap();
        let flagged = critical_measurements(&extraction);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].to_string(), "weight: 2.4kg");
    }

    #[test]
    fn test_assessments() {
        assert_eq!(reading("temperature", 39.5).assessment(), "CRITICAL: high fever");
        assert_eq!(reading("temperature", 38.5).assessment(), "WARNING: fever");
        assert_eq!(reading("temperature", 37.0).assessment(), "normal");
        assert_eq!(reading("weight", 2.0).assessment(), "WARNING: low weight");
        assert_eq!(reading("weight", 6.5).assessment(), "WARNING: high weight");
        assert_eq!(reading("heartRate", 190.0).assessment(), "needs review");
    }
}
