//! The four-phase multi-agent conversation.
//!
//! Phase 1 classifies the input and must succeed; its failure ends the
//! session in [`SessionStatus::Error`]. Phase 2 runs the medical review and
//! the data extraction concurrently. Phase 3 checks safety and answers the
//! questions addressed to the validator. Phase 4 synthesises a final
//! result. A failure in phases 2 to 4 becomes an alert message and the
//! session continues.

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{
    critical_measurements, ConversationMessage, CriticalMeasurement, ExtractionPayload,
    FinalResult, MessageType, SafetyReviewPayload, Session, SessionStatus, SessionStore,
    SynthesisPayload, CLASSIFIER, DATA_EXTRACTOR, EMERGENCY_ADVISOR, MEDICAL_ANALYZER,
    SAFETY_VALIDATOR, SYNTHESIZER, SYSTEM,
};
use crate::core::{AnalysisPayload, ClassificationPayload};
use crate::events::{
    EventSink, NoOpEventSink, SESSION_COMPLETED, SESSION_ERROR, SESSION_PHASE, SESSION_STARTED,
};
use crate::executor::DEFAULT_CONFIDENCE;
use crate::gateway::{CompletionGateway, GatewayError};
use crate::prompts::{DefaultPromptBuilder, PromptBuilder, PromptRequest};
use crate::utils::{now_utc, panic_message, parse_json_block, saturating_ms};
use crate::validation::MedicalValidator;

/// Topic used when the caller gives none.
pub const DEFAULT_TOPIC: &str = "health_analysis";

/// Budget for one agent call.
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 10_000;

const SUMMARY_INPUT_CHARS: usize = 50;

/// Why one agent call produced nothing usable.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The gateway rejected or failed the call.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The reply did not have the expected shape.
    #[error("response not parseable: {0}")]
    Parse(String),

    /// The call ran past its budget.
    #[error("agent exceeded its {0} ms budget")]
    Timeout(u64),

    /// The call panicked.
    #[error("agent panicked: {0}")]
    Panicked(String),
}

/// Runs conversations and keeps their sessions.
pub struct ConversationSystem {
    gateway: Arc<dyn CompletionGateway>,
    prompts: Arc<dyn PromptBuilder>,
    validator: Arc<MedicalValidator>,
    events: Arc<dyn EventSink>,
    store: Arc<SessionStore>,
    agent_timeout: Duration,
}

impl ConversationSystem {
    /// Creates a system with the default prompts, ruleset and an empty store.
    #[must_use]
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            gateway,
            prompts: Arc::new(DefaultPromptBuilder::new()),
            validator: Arc::new(MedicalValidator::new()),
            events: Arc::new(NoOpEventSink),
            store: Arc::new(SessionStore::new()),
            agent_timeout: Duration::from_millis(DEFAULT_AGENT_TIMEOUT_MS),
        }
    }

    /// Replaces the prompt builder.
    #[must_use]
    pub fn with_prompts(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the ruleset used in phase 3.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<MedicalValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Shares an existing session store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the budget for each agent call.
    #[must_use]
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// The session store.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// A snapshot of the session with `id`.
    #[must_use]
    pub fn session(&self, id: &str) -> Option<Session> {
        self.store.get(id)
    }

    /// Snapshots of every stored session.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.store.all()
    }

    /// Drops finished sessions from the store.
    pub fn clear_finished(&self) -> usize {
        self.store.clear_finished()
    }

    /// Runs a full conversation about `input`. Never fails: errors end the
    /// session in [`SessionStatus::Error`] with a system alert.
    pub async fn start_conversation(&self, input: impl Into<String>, topic: Option<&str>) -> Session {
        let mut session = Session::new(input, topic.unwrap_or(DEFAULT_TOPIC));
        self.store.save(&session);
        info!(session = %session.id, topic = %session.topic, "Conversation started");
        self.events
            .emit(
                SESSION_STARTED,
                Some(json!({"session": session.id, "topic": session.topic})),
            )
            .await;

        match self.run_phases(&mut session).await {
            Ok(()) => {
                session.finish(SessionStatus::Completed);
                info!(session = %session.id, messages = session.messages.len(), "Conversation completed");
                self.events
                    .emit(
                        SESSION_COMPLETED,
                        Some(json!({
                            "session": session.id,
                            "messages": session.messages.len(),
                            "hasResult": session.final_result.is_some(),
                        })),
                    )
                    .await;
            }
            Err(err) => {
                error!(session = %session.id, error = %err, "Conversation failed");
                session.finish(SessionStatus::Error);
                session.push(
                    ConversationMessage::new(SYSTEM, MessageType::Alert, format!("Processing error: {err}"))
                        .with_data(json!({"error": err.to_string()})),
                );
                self.events
                    .emit(
                        SESSION_ERROR,
                        Some(json!({"session": session.id, "error": err.to_string()})),
                    )
                    .await;
            }
        }

        self.store.save(&session);
        session
    }

    async fn run_phases(&self, session: &mut Session) -> Result<(), AgentError> {
        self.classification_phase(session).await?;
        self.analysis_phase(session).await;
        self.validation_phase(session).await;
        self.synthesis_phase(session).await;
        Ok(())
    }

    fn enter_phase(&self, session: &mut Session, status: SessionStatus, phase: &str) {
        session.status = status;
        self.store.save(session);
        debug!(session = %session.id, phase, status = ?status, "Entering phase");
        self.events.try_emit(
            SESSION_PHASE,
            Some(json!({"session": session.id, "phase": phase, "status": status})),
        );
    }

    async fn classification_phase(&self, session: &mut Session) -> Result<(), AgentError> {
        self.enter_phase(session, SessionStatus::Active, "classification");
        let request = PromptRequest::ConversationClassify {
            input: &session.input,
            topic: &session.topic,
        };
        let (classification, raw) = self.ask::<ClassificationPayload>(CLASSIFIER, &request).await?;

        session.push(
            ConversationMessage::new(
                CLASSIFIER,
                MessageType::Analysis,
                format!("Classified the input as: {}", classification.classification),
            )
            .with_data(raw)
            .with_confidence(Some(classification.confidence)),
        );
        let required = required_agents(&classification);
        session.push(
            ConversationMessage::new(
                CLASSIFIER,
                MessageType::Recommendation,
                format!("Recommend involving these specialists: {}", required.join(", ")),
            )
            .with_data(json!({"requiredAgents": required})),
        );
        Ok(())
    }

    async fn analysis_phase(&self, session: &mut Session) {
        self.enter_phase(session, SessionStatus::Active, "analysis");
        let medical_request = PromptRequest::MedicalReview {
            input: &session.input,
            history: &session.messages,
        };
        let extraction_request = PromptRequest::ExtractData {
            input: &session.input,
        };
        let (medical, extraction) = futures::join!(
            self.ask::<AnalysisPayload>(MEDICAL_ANALYZER, &medical_request),
            self.ask::<ExtractionPayload>(DATA_EXTRACTOR, &extraction_request),
        );

        let messages = medical_messages(medical)
            .into_iter()
            .chain(extraction_messages(extraction));
        for message in messages {
            session.push(message);
        }
    }

    async fn validation_phase(&self, session: &mut Session) {
        self.enter_phase(session, SessionStatus::Deliberating, "validation");
        let measurements = latest_extraction(session)
            .map(|e| e.to_validator_input())
            .unwrap_or_default();
        let local = self.validator.validate(&measurements, None);
        let findings = analysis_data(session);
        let request = PromptRequest::SafetyReview {
            input: &session.input,
            findings: &findings,
            local: &local,
        };
        let review = self.ask::<SafetyReviewPayload>(SAFETY_VALIDATOR, &request).await;

        if !local.is_valid {
            let flagged: Vec<&str> = local
                .critical_alerts
                .iter()
                .chain(&local.errors)
                .chain(&local.warnings)
                .map(String::as_str)
                .collect();
            session.push(
                ConversationMessage::new(
                    SAFETY_VALIDATOR,
                    MessageType::Alert,
                    format!("Ruleset findings: {}", flagged.join("; ")),
                )
                .with_data(json!({"validation": local})),
            );
        }

        match review {
            Ok((review, raw)) => session.push(
                ConversationMessage::new(
                    SAFETY_VALIDATOR,
                    MessageType::Analysis,
                    format!("Validation complete. Safety status: {}", review.safety_status),
                )
                .with_data(raw)
                .with_confidence(review.confidence),
            ),
            Err(err) => {
                warn!(session = %session.id, agent = SAFETY_VALIDATOR, error = %err, "Safety review failed");
                session.push(failure_alert(
                    SAFETY_VALIDATOR,
                    "Validation failed. Extra caution recommended.",
                    &err,
                ));
            }
        }

        let questions: Vec<ConversationMessage> = session
            .messages
            .iter()
            .filter(|m| m.message_type == MessageType::Question && m.is_addressed_to(SAFETY_VALIDATOR))
            .cloned()
            .collect();
        for question in questions {
            session.push(
                ConversationMessage::new(SAFETY_VALIDATOR, MessageType::Response, answer(&question))
                    .with_to(question.from.clone())
                    .with_data(json!({"originalQuestion": question.id})),
            );
        }
    }

    async fn synthesis_phase(&self, session: &mut Session) {
        self.enter_phase(session, SessionStatus::Concluding, "synthesis");
        let findings = all_findings(session);
        let request = PromptRequest::Synthesize {
            input: &session.input,
            findings: &findings,
        };

        match self.ask::<SynthesisPayload>(SYNTHESIZER, &request).await {
            Ok((synthesis, raw)) => {
                session.push(
                    ConversationMessage::new(
                        SYNTHESIZER,
                        MessageType::Conclusion,
                        "Synthesized the team's findings into one assessment.",
                    )
                    .with_data(raw)
                    .with_confidence(synthesis.confidence),
                );
                session.final_result = Some(FinalResult {
                    recommendations: synthesis.recommendations.clone(),
                    confidence: synthesis.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                    safety_level: synthesis
                        .safety_level
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    extracted_data: extracted_data(session),
                    conversation_summary: conversation_summary(session),
                    synthesis,
                });
            }
            Err(err) => {
                warn!(session = %session.id, agent = SYNTHESIZER, error = %err, "Synthesis failed");
                session.push(failure_alert(
                    SYNTHESIZER,
                    "Synthesis failed. Review the individual analyses.",
                    &err,
                ));
            }
        }
    }

    /// One agent call: prompt, bounded completion, strict decode. Returns
    /// the typed reply and the raw object it came from.
    async fn ask<T: DeserializeOwned>(
        &self,
        agent: &str,
        request: &PromptRequest<'_>,
    ) -> Result<(T, Value), AgentError> {
        let messages = self.prompts.build(request).to_messages();
        let call = AssertUnwindSafe(self.gateway.complete(&messages)).catch_unwind();
        let text = match tokio::time::timeout(self.agent_timeout, call).await {
            Err(_) => return Err(AgentError::Timeout(saturating_ms(self.agent_timeout))),
            Ok(Err(panic)) => return Err(AgentError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(reply)) => reply?,
        };

        let raw = parse_json_block(&text).map_err(|e| AgentError::Parse(e.to_string()))?;
        if !raw.is_object() {
            return Err(AgentError::Parse("expected a JSON object".to_string()));
        }
        let payload = serde_json::from_value(raw.clone()).map_err(|e| AgentError::Parse(e.to_string()))?;
        debug!(agent, "Agent replied");
        Ok((payload, raw))
    }
}

fn required_agents(classification: &ClassificationPayload) -> Vec<&'static str> {
    let mut agents = vec![MEDICAL_ANALYZER, DATA_EXTRACTOR, SAFETY_VALIDATOR];
    if classification.urgency.is_some_and(|u| u.is_urgent()) {
        agents.push(EMERGENCY_ADVISOR);
    }
    agents
}

fn failure_alert(agent: &str, content: &str, err: &AgentError) -> ConversationMessage {
    ConversationMessage::new(agent, MessageType::Alert, content).with_data(json!({"error": err.to_string()}))
}

fn medical_messages(reply: Result<(AnalysisPayload, Value), AgentError>) -> Vec<ConversationMessage> {
    let (analysis, raw) = match reply {
        Ok(reply) => reply,
        Err(err) => {
            warn!(agent = MEDICAL_ANALYZER, error = %err, "Medical review failed");
            return vec![failure_alert(
                MEDICAL_ANALYZER,
                "Medical analysis failed. Manual review recommended.",
                &err,
            )];
        }
    };

    let mut messages = vec![ConversationMessage::new(
        MEDICAL_ANALYZER,
        MessageType::Analysis,
        format!(
            "Medical analysis complete. Identified {} potential symptoms.",
            analysis.symptoms.len()
        ),
    )
    .with_data(raw)
    .with_confidence(analysis.confidence)];

    if !analysis.alerts.is_empty() {
        messages.push(
            ConversationMessage::new(
                MEDICAL_ANALYZER,
                MessageType::Alert,
                format!("Attention: detected the following alerts: {}", analysis.alerts.join(", ")),
            )
            .with_to(SAFETY_VALIDATOR)
            .with_data(json!({"alerts": analysis.alerts})),
        );
    }
    messages
}

fn extraction_messages(reply: Result<(ExtractionPayload, Value), AgentError>) -> Vec<ConversationMessage> {
    let (extraction, raw) = match reply {
        Ok(reply) => reply,
        Err(err) => {
            warn!(agent = DATA_EXTRACTOR, error = %err, "Data extraction failed");
            return vec![failure_alert(
                DATA_EXTRACTOR,
                "Data extraction failed. Some data may be missing.",
                &err,
            )];
        }
    };

    let mut messages = vec![ConversationMessage::new(
        DATA_EXTRACTOR,
        MessageType::Analysis,
        format!(
            "Data extraction complete. Found {} measurements.",
            extraction.measurements.len()
        ),
    )
    .with_data(raw)
    .with_confidence(extraction.confidence)];

    let critical = critical_measurements(&extraction);
    if !critical.is_empty() {
        let listed: Vec<String> = critical.iter().map(ToString::to_string).collect();
        messages.push(
            ConversationMessage::new(
                DATA_EXTRACTOR,
                MessageType::Question,
                format!("Please validate these critical measurements: {}", listed.join(", ")),
            )
            .with_to(SAFETY_VALIDATOR)
            .with_data(json!({"criticalMeasurements": critical})),
        );
    }
    messages
}

fn latest_extraction(session: &Session) -> Option<ExtractionPayload> {
    session
        .messages_from(DATA_EXTRACTOR)
        .filter(|m| m.message_type == MessageType::Analysis)
        .filter_map(|m| m.data.clone())
        .find_map(|data| serde_json::from_value(data).ok())
}

/// Analysis payloads keyed by the agent that sent them.
fn analysis_data(session: &Session) -> Value {
    let data: Map<String, Value> = session
        .messages
        .iter()
        .filter(|m| m.message_type == MessageType::Analysis)
        .filter_map(|m| m.data.clone().map(|d| (m.from.clone(), d)))
        .collect();
    Value::Object(data)
}

fn all_findings(session: &Session) -> Value {
    let mut findings = match analysis_data(session) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let alerts: Vec<Value> = session
        .messages
        .iter()
        .filter(|m| m.message_type == MessageType::Alert)
        .map(|m| json!({"from": m.from, "content": m.content, "data": m.data}))
        .collect();
    let confidences: Vec<f64> = session
        .messages
        .iter()
        .filter(|m| m.message_type == MessageType::Analysis)
        .filter_map(|m| m.confidence)
        .collect();
    findings.insert("alerts".to_string(), Value::Array(alerts));
    findings.insert("confidence".to_string(), json!(confidences));
    Value::Object(findings)
}

/// The extractor's analysis and question payloads merged into one object.
fn extracted_data(session: &Session) -> Value {
    let mut merged = Map::new();
    for message in session
        .messages_from(DATA_EXTRACTOR)
        .filter(|m| matches!(m.message_type, MessageType::Analysis | MessageType::Question))
    {
        if let Some(Value::Object(data)) = &message.data {
            merged.extend(data.clone());
        }
    }
    Value::Object(merged)
}

fn conversation_summary(session: &Session) -> String {
    let prefix: String = session.input.chars().take(SUMMARY_INPUT_CHARS).collect();
    let names: Vec<&str> = session.participants.iter().map(|p| p.name.as_str()).collect();
    let seconds = (now_utc() - session.started_at).num_seconds();
    [
        format!("Multi-agent conversation for: \"{prefix}...\""),
        format!("Participants: {}", names.join(", ")),
        format!("Messages exchanged: {}", session.messages.len()),
        format!("Duration: {seconds} seconds"),
    ]
    .join("\n")
}

fn answer(question: &ConversationMessage) -> String {
    let measurements: Vec<CriticalMeasurement> = question
        .data
        .as_ref()
        .and_then(|d| d.get("criticalMeasurements"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    if measurements.is_empty() {
        return "Reviewed the data; it is within safe parameters.".to_string();
    }
    let verdicts: Vec<String> = measurements
        .iter()
        .map(|m| format!("{m} - {}", m.assessment()))
        .collect();
    format!("Validated the critical measurements. {}", verdicts.join(". "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskPriority;

    fn classification(urgency: Option<TaskPriority>) -> ClassificationPayload {
        ClassificationPayload {
            classification: "symptom".to_string(),
            confidence: 0.9,
            urgency,
            content_type: None,
            requires_attention: None,
            reasoning: None,
            required_specialists: Vec::new(),
            extracted_data: None,
        }
    }

    #[test]
    fn test_required_agents_by_urgency() {
        assert!(!required_agents(&classification(None)).contains(&EMERGENCY_ADVISOR));
        assert!(!required_agents(&classification(Some(TaskPriority::Medium))).contains(&EMERGENCY_ADVISOR));
        assert!(required_agents(&classification(Some(TaskPriority::High))).contains(&EMERGENCY_ADVISOR));
        assert!(required_agents(&classification(Some(TaskPriority::Critical))).contains(&EMERGENCY_ADVISOR));
    }

    #[test]
    fn test_answer_without_measurements() {
        let question = ConversationMessage::new(MEDICAL_ANALYZER, MessageType::Question, "ok?");
        assert_eq!(answer(&question), "Reviewed the data; it is within safe parameters.");
    }

    #[test]
    fn test_answer_with_measurements() {
        let question = ConversationMessage::new(DATA_EXTRACTOR, MessageType::Question, "check")
            .with_data(json!({"criticalMeasurements": [
                {"type": "temperature", "value": 39.4, "unit": "C"},
                {"type": "weight", "value": 2.1, "unit": "kg"}
            ]}));
        assert_eq!(
            answer(&question),
            "Validated the critical measurements. temperature: 39.4C - CRITICAL: high fever. \
             weight: 2.1kg - WARNING: low weight"
        );
    }

    #[test]
    fn test_summary_truncates_input() {
        let session = Session::new("x".repeat(80), DEFAULT_TOPIC);
        let summary = conversation_summary(&session);
        let first = summary.lines().next().unwrap();
        assert_eq!(first, format!("Multi-agent conversation for: \"{}...\"", "x".repeat(50)));
        assert!(summary.contains("Messages exchanged: 0"));
    }
}
