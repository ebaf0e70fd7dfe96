//! Canned completion replies and pre-wired gateways.

use crate::prompts::{
    ROLE_CLASSIFIER, ROLE_CONVERSATION_CLASSIFIER, ROLE_DATA_EXTRACTOR, ROLE_MEDICAL_ANALYZER,
    ROLE_MEDICAL_REVIEWER, ROLE_RECOMMENDER, ROLE_SAFETY_VALIDATOR, ROLE_SYNTHESIZER,
};

use super::ScriptedGateway;

/// A temperature reading classified as high urgency.
pub const CLASSIFICATION_JSON: &str = r#"{
  "classification": "temperature",
  "confidence": 0.9,
  "contentType": "measurement",
  "urgency": "high",
  "requiresAttention": true,
  "reasoning": "The parent reports a fever",
  "requiredSpecialists": ["medical_analyzer", "data_extractor"]
}"#;

/// Analysis with an in-range temperature and weight.
pub const ANALYSIS_JSON: &str = r#"```json
{
  "symptoms": ["fever", "irritability"],
  "measurements": {
    "temperature": {"value": 38.5, "unit": "C"},
    "weight": {"value": 7.8, "unit": "kg"}
  },
  "behavioralChanges": ["sleeping less"],
  "alerts": [],
  "recommendations": ["Keep the baby hydrated"],
  "requiresMedicalAttention": false,
  "priority": "medium",
  "confidence": 0.85
}
```"#;

/// Analysis whose temperature is outside the absolute range.
pub const CRITICAL_ANALYSIS_JSON: &str = r#"{
  "symptoms": ["fever"],
  "measurements": {"temperature": 43},
  "alerts": ["Very high temperature"],
  "requiresMedicalAttention": true,
  "priority": "critical",
  "confidence": 0.7
}"#;

/// Recommendations for the parent.
pub const RECOMMENDATION_JSON: &str = r#"{
  "recommendations": ["Offer fluids often", "Recheck the temperature in two hours"],
  "nextSteps": ["Call the pediatrician if the fever passes 39 C"],
  "urgency": "medium",
  "requiresProfessional": false,
  "confidence": 0.75
}"#;

/// Conversation extraction with a feverish temperature.
pub const EXTRACTION_JSON: &str = r#"{
  "measurements": {
    "temperature": {"value": 38.6, "unit": "C", "timestamp": "2024-05-01T08:00:00Z"},
    "weight": {"value": 5.2, "unit": "kg"}
  },
  "dates": ["2024-05-01"],
  "confidence": 0.88
}"#;

/// Conversation safety review.
pub const SAFETY_JSON: &str = r#"{
  "safetyStatus": "caution",
  "validatedMeasurements": {"temperature": 38.6},
  "riskFactors": ["fever"],
  "recommendations": ["Monitor the temperature"],
  "confidence": 0.8
}"#;

/// Conversation synthesis.
pub const SYNTHESIS_JSON: &str = r#"{
  "summary": "Mild fever with normal weight",
  "keyFindings": ["Temperature 38.6 C"],
  "recommendations": ["Offer fluids", "Monitor the temperature"],
  "nextSteps": ["See a pediatrician if the fever lasts more than 48 hours"],
  "safetyLevel": "caution",
  "confidence": 0.82
}"#;

/// A gateway answering every pipeline role with the canned replies.
#[must_use]
pub fn pipeline_gateway() -> ScriptedGateway {
    ScriptedGateway::new()
        .route_ok(ROLE_CLASSIFIER, CLASSIFICATION_JSON)
        .route_ok(ROLE_MEDICAL_ANALYZER, ANALYSIS_JSON)
        .route_ok(ROLE_RECOMMENDER, RECOMMENDATION_JSON)
}

/// A gateway answering every conversation role with the canned replies.
#[must_use]
pub fn conversation_gateway() -> ScriptedGateway {
    ScriptedGateway::new()
        .route_ok(ROLE_CONVERSATION_CLASSIFIER, CLASSIFICATION_JSON)
        .route_ok(ROLE_MEDICAL_REVIEWER, ANALYSIS_JSON)
        .route_ok(ROLE_DATA_EXTRACTOR, EXTRACTION_JSON)
        .route_ok(ROLE_SAFETY_VALIDATOR, SAFETY_JSON)
        .route_ok(ROLE_SYNTHESIZER, SYNTHESIS_JSON)
}
