//! Messages exchanged between agents in a session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::utils::{now_utc, prefixed_id, Timestamp};

/// What a message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Findings of one agent.
    Analysis,
    /// A request addressed to another agent.
    Question,
    /// The answer to a question.
    Response,
    /// Advice to the rest of the team.
    Recommendation,
    /// Something that needs attention, including phase failures.
    Alert,
    /// The final synthesis.
    Conclusion,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Analysis => "analysis",
            Self::Question => "question",
            Self::Response => "response",
            Self::Recommendation => "recommendation",
            Self::Alert => "alert",
            Self::Conclusion => "conclusion",
        };
        f.write_str(s)
    }
}

/// One entry in a session's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Unique id, `msg_...`.
    pub id: String,
    /// Sending agent.
    pub from: String,
    /// Receiving agent; `None` is a broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Message type.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Human-readable text.
    pub content: String,
    /// Structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// When the message was appended.
    pub timestamp: Timestamp,
    /// Sender's confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ConversationMessage {
    /// A broadcast message with no payload.
    #[must_use]
    pub fn new(from: impl Into<String>, message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            id: prefixed_id("msg"),
            from: from.into(),
            to: None,
            message_type,
            content: content.into(),
            data: None,
            timestamp: now_utc(),
            confidence: None,
        }
    }

    /// Addresses the message to one agent.
    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the sender's confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Returns true if no recipient is set.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    /// Returns true if `agent` is the recipient.
    #[must_use]
    pub fn is_addressed_to(&self, agent: &str) -> bool {
        self.to.as_deref() == Some(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_wire_shape() {
        let message = ConversationMessage::new("data_extractor", MessageType::Question, "check this")
            .with_to("safety_validator")
            .with_data(json!({"criticalMeasurements": []}));

        assert!(message.id.starts_with("msg_"));
        assert!(message.is_addressed_to("safety_validator"));
        assert!(!message.is_broadcast());

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], json!("question"));
        assert_eq!(value["to"], json!("safety_validator"));
        assert!(value.get("confidence").is_none());
    }
}
