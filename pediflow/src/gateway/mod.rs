//! Completion gateway seam.
//!
//! The core never talks to a model directly. It holds an
//! `Arc<dyn CompletionGateway>` and sends chat messages through it. This
//! module provides the trait, the shared guards every real deployment wraps
//! around it (rate limiter with quota flag, circuit breaker), and an
//! OpenAI-compatible HTTP implementation behind the `openai` feature.

mod circuit_breaker;
mod guarded;
#[cfg(feature = "openai")]
mod openai;
mod rate_limit;

pub use circuit_breaker::{Admission, CircuitBreaker, CircuitState};
pub use guarded::GuardedGateway;
#[cfg(feature = "openai")]
pub use openai::OpenAiGateway;
pub use rate_limit::RateLimiter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::errors::TaskErrorKind;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions.
    System,
    /// The request.
    User,
    /// A previous model turn.
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One chat message sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: ChatRole,
    /// The text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Failures the gateway can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The call did not finish in time.
    #[error("request timed out")]
    Timeout,

    /// Quota exhausted (HTTP 429 or the shared quota flag is set).
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The circuit breaker for the operation is open.
    #[error("circuit open for '{operation}'")]
    CircuitOpen {
        /// The guarded operation.
        operation: String,
    },

    /// The response did not have the expected envelope.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No credentials are configured.
    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Maps onto the task-level error taxonomy.
    #[must_use]
    pub fn task_error_kind(&self) -> TaskErrorKind {
        match self {
            Self::Timeout => TaskErrorKind::GatewayTimeout,
            Self::QuotaExceeded | Self::Http { status: 429, .. } => {
                TaskErrorKind::GatewayQuotaExceeded
            }
            Self::InvalidResponse(_) => TaskErrorKind::ResponseParseError,
            Self::Network(_)
            | Self::Http { .. }
            | Self::CircuitOpen { .. }
            | Self::NotConfigured(_) => TaskErrorKind::GatewayNetworkError,
        }
    }

    /// Returns true if the error means the quota is exhausted.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        self.task_error_kind() == TaskErrorKind::GatewayQuotaExceeded
    }
}

/// A single text-completion capability: messages in, text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Sends `messages` and returns the completion text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(GatewayError::Timeout.task_error_kind(), TaskErrorKind::GatewayTimeout);
        assert!(GatewayError::QuotaExceeded.is_quota());
        assert!(GatewayError::Http { status: 429, message: String::new() }.is_quota());
        assert_eq!(
            GatewayError::Http { status: 500, message: "boom".into() }.task_error_kind(),
            TaskErrorKind::GatewayNetworkError
        );
        assert_eq!(
            GatewayError::CircuitOpen { operation: "chat".into() }.task_error_kind(),
            TaskErrorKind::GatewayNetworkError
        );
    }

    #[test]
    fn test_chat_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }

    #[tokio::test]
    async fn test_mock_gateway() {
        let mut mock = MockCompletionGateway::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok("{}".to_string()));

        let reply = mock.complete(&[ChatMessage::user("hello")]).await;
        assert_eq!(reply, Ok("{}".to_string()));
    }
}
