//! Prompt construction.
//!
//! A [`PromptBuilder`] turns a typed [`PromptRequest`] into a system/user
//! pair. Builders are pure and swappable; the executor and the conversation
//! system only ever see the trait.
//!
//! Every system prompt produced by [`DefaultPromptBuilder`] begins with one
//! of the `ROLE_*` lines below, which is a stable handle for routing and
//! inspection.

mod templates;

pub use templates::DefaultPromptBuilder;

use serde_json::Value;

use crate::conversation::ConversationMessage;
use crate::core::{AnalysisPayload, ClassificationPayload, RunContext, ValidationPayload};
use crate::gateway::ChatMessage;
use crate::validation::ValidationResult;

/// Role line of the pipeline classifier.
pub const ROLE_CLASSIFIER: &str = "You are the pediatric content classifier.";
/// Role line of the pipeline analyzer.
pub const ROLE_MEDICAL_ANALYZER: &str = "You are the pediatric medical data analyst.";
/// Role line of the pipeline recommendation engine.
pub const ROLE_RECOMMENDER: &str = "You are the pediatric recommendation engine.";
/// Role line of the conversation classifier.
pub const ROLE_CONVERSATION_CLASSIFIER: &str =
    "You are the classifier agent of a pediatric care team.";
/// Role line of the conversation medical specialist.
pub const ROLE_MEDICAL_REVIEWER: &str =
    "You are the medical specialist agent of a pediatric care team.";
/// Role line of the conversation data extractor.
pub const ROLE_DATA_EXTRACTOR: &str = "You are the data extraction agent of a pediatric care team.";
/// Role line of the conversation safety validator.
pub const ROLE_SAFETY_VALIDATOR: &str =
    "You are the safety validation agent of a pediatric care team.";
/// Role line of the conversation synthesizer.
pub const ROLE_SYNTHESIZER: &str = "You are the synthesis agent of a pediatric care team.";

/// What to build a prompt for.
#[derive(Debug, Clone, Copy)]
pub enum PromptRequest<'a> {
    /// Pipeline classification of raw input.
    Classify {
        /// Rendered input.
        input: &'a str,
        /// Run context.
        context: &'a RunContext,
    },
    /// Pipeline extraction, informed by the classification.
    Analyze {
        /// Rendered input.
        input: &'a str,
        /// Upstream classification, if one succeeded.
        classification: Option<&'a ClassificationPayload>,
        /// Run context.
        context: &'a RunContext,
    },
    /// Pipeline recommendations from validation findings.
    Recommend {
        /// Upstream validation, if one succeeded.
        validation: Option<&'a ValidationPayload>,
        /// Upstream analysis, if one succeeded.
        analysis: Option<&'a AnalysisPayload>,
        /// Run context.
        context: &'a RunContext,
    },
    /// Conversation phase 1.
    ConversationClassify {
        /// Parent's text.
        input: &'a str,
        /// Session topic.
        topic: &'a str,
    },
    /// Conversation phase 2, medical branch.
    MedicalReview {
        /// Parent's text.
        input: &'a str,
        /// Messages so far.
        history: &'a [ConversationMessage],
    },
    /// Conversation phase 2, extraction branch.
    ExtractData {
        /// Parent's text.
        input: &'a str,
    },
    /// Conversation phase 3.
    SafetyReview {
        /// Parent's text.
        input: &'a str,
        /// Analysis data keyed by agent.
        findings: &'a Value,
        /// Local ruleset verdict over the extracted measurements.
        local: &'a ValidationResult,
    },
    /// Conversation phase 4.
    Synthesize {
        /// Parent's text.
        input: &'a str,
        /// Everything the team found.
        findings: &'a Value,
    },
}

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPrompt {
    /// Instructions.
    pub system: String,
    /// The request.
    pub user: String,
}

impl AgentPrompt {
    /// The pair as chat messages, system first.
    #[must_use]
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Produces prompts for every task and phase.
pub trait PromptBuilder: Send + Sync {
    /// Builds the prompt for `request`.
    fn build(&self, request: &PromptRequest<'_>) -> AgentPrompt;
}
