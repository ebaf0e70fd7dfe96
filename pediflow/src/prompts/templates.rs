//! Default prompt templates.

use serde_json::Value;
use std::fmt::Write as _;

use super::{
    AgentPrompt, PromptBuilder, PromptRequest, ROLE_CLASSIFIER, ROLE_CONVERSATION_CLASSIFIER,
    ROLE_DATA_EXTRACTOR, ROLE_MEDICAL_ANALYZER, ROLE_MEDICAL_REVIEWER, ROLE_RECOMMENDER,
    ROLE_SAFETY_VALIDATOR, ROLE_SYNTHESIZER,
};
use crate::conversation::ConversationMessage;
use crate::core::{AnalysisPayload, ClassificationPayload, RunContext, ValidationPayload};
use crate::validation::ValidationResult;

const CLASSIFICATION_FORMAT: &str = r#"{
  "classification": "weight|height|temperature|medication|symptom|milestone|administrative",
  "confidence": 0.0-1.0,
  "contentType": "measurement|observation|document|note",
  "urgency": "low|medium|high|critical",
  "requiresAttention": boolean,
  "reasoning": string,
  "requiredSpecialists": string[]
}"#;

const ANALYSIS_FORMAT: &str = r#"{
  "symptoms": string[],
  "measurements": { "<field>": { "value": number, "unit": string } },
  "behavioralChanges": string[],
  "alerts": string[],
  "recommendations": string[],
  "requiresMedicalAttention": boolean,
  "priority": "low|medium|high|critical",
  "confidence": 0.0-1.0,
  "medication": { "name": string, "dose": string, "frequency": string, "duration": string } | null
}"#;

const RECOMMENDATION_FORMAT: &str = r#"{
  "recommendations": string[],
  "nextSteps": string[],
  "urgency": "low|medium|high|critical",
  "requiresProfessional": boolean,
  "confidence": 0.0-1.0
}"#;

const EXTRACTION_FORMAT: &str = r#"{
  "measurements": { "<field>": { "value": number, "unit": string, "timestamp": string } },
  "dates": string[],
  "confidence": 0.0-1.0
}"#;

const SAFETY_FORMAT: &str = r#"{
  "safetyStatus": "safe|caution|warning|critical",
  "validatedMeasurements": object,
  "riskFactors": string[],
  "recommendations": string[],
  "confidence": 0.0-1.0
}"#;

const SYNTHESIS_FORMAT: &str = r#"{
  "summary": string,
  "keyFindings": string[],
  "recommendations": string[],
  "nextSteps": string[],
  "safetyLevel": "safe|caution|warning|critical",
  "confidence": 0.0-1.0
}"#;

/// Templates asking for JSON in the shape of the typed payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl DefaultPromptBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PromptBuilder for DefaultPromptBuilder {
    fn build(&self, request: &PromptRequest<'_>) -> AgentPrompt {
        match *request {
            PromptRequest::Classify { input, context } => classify(input, context),
            PromptRequest::Analyze {
                input,
                classification,
                context,
            } => analyze(input, classification, context),
            PromptRequest::Recommend {
                validation,
                analysis,
                context,
            } => recommend(validation, analysis, context),
            PromptRequest::ConversationClassify { input, topic } => {
                conversation_classify(input, topic)
            }
            PromptRequest::MedicalReview { input, history } => medical_review(input, history),
            PromptRequest::ExtractData { input } => extract_data(input),
            PromptRequest::SafetyReview {
                input,
                findings,
                local,
            } => safety_review(input, findings, local),
            PromptRequest::Synthesize { input, findings } => synthesize(input, findings),
        }
    }
}

fn system(role: &str, capabilities: &[&str], constraints: &[&str], task: &str, format: &str) -> String {
    let mut out = String::from(role);
    out.push_str("\n\nCAPABILITIES:\n");
    for c in capabilities {
        let _ = writeln!(out, "- {c}");
    }
    out.push_str("\nCONSTRAINTS:\n");
    for c in constraints {
        let _ = writeln!(out, "- {c}");
    }
    let _ = write!(
        out,
        "\nTASK: {task}\n\nRespond with a single JSON object in this format:\n{format}"
    );
    out
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn to_pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value).map_or_else(|_| "null".to_string(), |v| pretty(&v))
}

fn classify(input: &str, context: &RunContext) -> AgentPrompt {
    AgentPrompt {
        system: system(
            ROLE_CLASSIFIER,
            &[
                "Classify pediatric health content",
                "Detect content that needs urgent attention",
                "Prioritise information",
            ],
            &[
                "Classify only, never diagnose",
                "Do not give medical recommendations",
            ],
            "Classify the following pediatric health content.",
            CLASSIFICATION_FORMAT,
        ),
        user: format!(
            "Analyze the following content: \"{input}\"\n\nAdditional context: {}",
            context.to_value()
        ),
    }
}

fn analyze(
    input: &str,
    classification: Option<&ClassificationPayload>,
    context: &RunContext,
) -> AgentPrompt {
    let upstream = classification.map_or_else(|| "none".to_string(), to_pretty);
    let mut system = system(
        ROLE_MEDICAL_ANALYZER,
        &[
            "Extract symptoms and measurements",
            "Identify medical alerts",
            "Spot medications with their dosing",
        ],
        &[
            "Do not diagnose conditions",
            "Do not prescribe medication",
            "Always recommend consulting a pediatrician when in doubt",
        ],
        "Extract structured medical data from the content.",
        ANALYSIS_FORMAT,
    );
    let _ = write!(system, "\n\nCLASSIFICATION RECEIVED:\n{upstream}");
    AgentPrompt {
        system,
        user: format!(
            "Analyze the following medical content: \"{input}\"\n\nPatient context: {}",
            context.to_value()
        ),
    }
}

fn recommend(
    validation: Option<&ValidationPayload>,
    analysis: Option<&AnalysisPayload>,
    context: &RunContext,
) -> AgentPrompt {
    let mut user = String::from("Validation findings:\n");
    match validation {
        Some(v) => {
            let r = &v.result;
            for (label, items) in [
                ("Critical alerts", &r.critical_alerts),
                ("Errors", &r.errors),
                ("Warnings", &r.warnings),
            ] {
                if !items.is_empty() {
                    let _ = writeln!(user, "{label}: {}", items.join("; "));
                }
            }
            if r.violation_count() == 0 {
                user.push_str("All values are within expected ranges.\n");
            }
            let _ = writeln!(user, "Validation confidence: {:.2}", r.confidence);
        }
        None => user.push_str("No validation was available.\n"),
    }
    if let Some(a) = analysis {
        if !a.symptoms.is_empty() {
            let _ = writeln!(user, "Symptoms: {}", a.symptoms.join(", "));
        }
        if !a.alerts.is_empty() {
            let _ = writeln!(user, "Analyzer alerts: {}", a.alerts.join("; "));
        }
    }
    let _ = write!(user, "\nPatient context: {}", context.to_value());

    AgentPrompt {
        system: system(
            ROLE_RECOMMENDER,
            &[
                "Turn validation findings into practical advice for parents",
                "Say when a professional should be involved",
            ],
            &[
                "Never prescribe medication",
                "Escalate any critical alert to a pediatrician",
            ],
            "Write recommendations for the parent based on the findings.",
            RECOMMENDATION_FORMAT,
        ),
        user,
    }
}

fn conversation_classify(input: &str, topic: &str) -> AgentPrompt {
    AgentPrompt {
        system: system(
            ROLE_CONVERSATION_CLASSIFIER,
            &[
                "Classify the parent's message",
                "Decide which specialists should join the conversation",
            ],
            &["Classify only, never diagnose"],
            "Classify the message and list the specialists the team needs.",
            CLASSIFICATION_FORMAT,
        ),
        user: format!("Conversation topic: {topic}\n\nMessage: \"{input}\""),
    }
}

fn medical_review(input: &str, history: &[ConversationMessage]) -> AgentPrompt {
    let mut user = format!("Message: \"{input}\"\n\nConversation so far:\n");
    if history.is_empty() {
        user.push_str("(none)\n");
    }
    for message in history {
        let _ = writeln!(user, "{}: {}", message.from, message.content);
    }
    AgentPrompt {
        system: system(
            ROLE_MEDICAL_REVIEWER,
            &[
                "Identify symptoms and behavioural changes",
                "Raise alerts for anything concerning",
            ],
            &["Do not diagnose", "Do not prescribe medication"],
            "Review the message medically, taking the conversation into account.",
            ANALYSIS_FORMAT,
        ),
        user,
    }
}

fn extract_data(input: &str) -> AgentPrompt {
    AgentPrompt {
        system: system(
            ROLE_DATA_EXTRACTOR,
            &[
                "Extract measurements with their units",
                "Extract dates and times",
            ],
            &["Only report values that appear in the message"],
            "Extract every measurement and date from the message.",
            EXTRACTION_FORMAT,
        ),
        user: format!("Message: \"{input}\""),
    }
}

fn safety_review(input: &str, findings: &Value, local: &ValidationResult) -> AgentPrompt {
    AgentPrompt {
        system: system(
            ROLE_SAFETY_VALIDATOR,
            &[
                "Check findings against pediatric safety ranges",
                "Identify risk factors",
            ],
            &[
                "Err on the side of caution",
                "Escalate anything critical",
            ],
            "Assess how safe the situation described by the team's findings is.",
            SAFETY_FORMAT,
        ),
        user: format!(
            "Message: \"{input}\"\n\nTeam findings:\n{}\n\nRuleset verdict:\n{}",
            pretty(findings),
            to_pretty(local)
        ),
    }
}

fn synthesize(input: &str, findings: &Value) -> AgentPrompt {
    AgentPrompt {
        system: system(
            ROLE_SYNTHESIZER,
            &[
                "Combine the team's findings into one answer",
                "Write clear next steps for the parent",
            ],
            &["Do not contradict the safety review"],
            "Synthesize the findings into a final answer for the parent.",
            SYNTHESIS_FORMAT,
        ),
        user: format!("Message: \"{input}\"\n\nAll findings:\n{}", pretty(findings)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChatRole;
    use crate::validation::MedicalValidator;
    use serde_json::json;

    #[test]
    fn test_every_request_starts_with_its_role() {
        let builder = DefaultPromptBuilder::new();
        let ctx = RunContext::new();
        let findings = json!({});
        let local = ValidationResult::default();
        let cases = [
            (PromptRequest::Classify { input: "x", context: &ctx }, ROLE_CLASSIFIER),
            (
                PromptRequest::Analyze { input: "x", classification: None, context: &ctx },
                ROLE_MEDICAL_ANALYZER,
            ),
            (
                PromptRequest::Recommend { validation: None, analysis: None, context: &ctx },
                ROLE_RECOMMENDER,
            ),
            (
                PromptRequest::ConversationClassify { input: "x", topic: "general" },
                ROLE_CONVERSATION_CLASSIFIER,
            ),
            (PromptRequest::MedicalReview { input: "x", history: &[] }, ROLE_MEDICAL_REVIEWER),
            (PromptRequest::ExtractData { input: "x" }, ROLE_DATA_EXTRACTOR),
            (
                PromptRequest::SafetyReview { input: "x", findings: &findings, local: &local },
                ROLE_SAFETY_VALIDATOR,
            ),
            (PromptRequest::Synthesize { input: "x", findings: &findings }, ROLE_SYNTHESIZER),
        ];
        for (request, role) in cases {
            assert!(builder.build(&request).system.starts_with(role), "{role}");
        }
    }

    #[test]
    fn test_recommend_includes_validation_findings() {
        let result = MedicalValidator::new().validate(
            json!({"temperature": 43}).as_object().unwrap(),
            None,
        );
        let payload = ValidationPayload {
            result,
            original_data: json!({"temperature": 43}),
        };
        let prompt = DefaultPromptBuilder::new().build(&PromptRequest::Recommend {
            validation: Some(&payload),
            analysis: None,
            context: &RunContext::new().with_patient_age(4.0),
        });
        assert!(prompt.user.contains("Critical alerts"));
        assert!(prompt.user.contains("\"patientAge\":4.0"));
    }

    #[test]
    fn test_to_messages_orders_system_first() {
        let prompt = DefaultPromptBuilder::new().build(&PromptRequest::ExtractData { input: "5kg" });
        let messages = prompt.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains("5kg"));
    }
}
