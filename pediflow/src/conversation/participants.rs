//! The agents taking part in a session.

use serde::{Deserialize, Serialize};

/// Phase 1 classifier.
pub const CLASSIFIER: &str = "classifier";
/// Phase 2 medical specialist.
pub const MEDICAL_ANALYZER: &str = "medical_analyzer";
/// Phase 2 data extractor.
pub const DATA_EXTRACTOR: &str = "data_extractor";
/// Phase 3 safety validator.
pub const SAFETY_VALIDATOR: &str = "safety_validator";
/// Phase 4 synthesiser.
pub const SYNTHESIZER: &str = "recommendation_synthesizer";
/// Recommended for urgent input. Not a participant.
pub const EMERGENCY_ADVISOR: &str = "emergency_advisor";
/// Sender of session-level alerts.
pub const SYSTEM: &str = "system";

/// An agent's identity and remit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Stable id used in `from`/`to`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// coordinator, specialist or safety.
    pub role: String,
    /// Areas of expertise.
    pub specializations: Vec<String>,
    /// What the agent may do.
    pub capabilities: Vec<String>,
    /// What the agent must not do.
    pub constraints: Vec<String>,
}

impl Participant {
    fn new(id: &str, name: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            specializations: Vec::new(),
            capabilities: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn specializing(mut self, items: &[&str]) -> Self {
        self.specializations = items.iter().map(ToString::to_string).collect();
        self
    }

    fn capable_of(mut self, items: &[&str]) -> Self {
        self.capabilities = items.iter().map(ToString::to_string).collect();
        self
    }

    fn constrained_by(mut self, items: &[&str]) -> Self {
        self.constraints = items.iter().map(ToString::to_string).collect();
        self
    }
}

/// The five agents every session starts with.
#[must_use]
pub fn default_participants() -> Vec<Participant> {
    vec![
        Participant::new(CLASSIFIER, "Classifier Agent", "coordinator")
            .specializing(&["classification", "routing"])
            .capable_of(&["analyze_input_type", "determine_urgency", "route_to_specialists"])
            .constrained_by(&["no_medical_diagnosis", "no_prescriptions"]),
        Participant::new(MEDICAL_ANALYZER, "Medical Agent", "specialist")
            .specializing(&["medical_analysis", "symptom_recognition", "health_assessment"])
            .capable_of(&[
                "extract_symptoms",
                "identify_medical_entities",
                "assess_urgency",
                "recommend_actions",
            ])
            .constrained_by(&[
                "no_diagnosis",
                "no_prescriptions",
                "always_recommend_professional_consultation",
            ]),
        Participant::new(DATA_EXTRACTOR, "Extraction Agent", "specialist")
            .specializing(&["data_extraction", "measurement_processing"])
            .capable_of(&["extract_measurements", "parse_dates", "identify_patterns"])
            .constrained_by(&["validate_ranges", "flag_anomalies"]),
        Participant::new(SAFETY_VALIDATOR, "Validation Agent", "safety")
            .specializing(&["safety_validation", "risk_assessment"])
            .capable_of(&["validate_measurements", "assess_safety", "flag_critical_values"])
            .constrained_by(&["strict_validation", "conservative_assessment"]),
        Participant::new(SYNTHESIZER, "Synthesis Agent", "coordinator")
            .specializing(&["synthesis", "recommendation_generation"])
            .capable_of(&["synthesize_findings", "generate_recommendations", "prioritize_actions"])
            .constrained_by(&["evidence_based", "safe_recommendations"]),
    ]
}
