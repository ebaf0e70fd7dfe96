//! Conversation sessions and the in-memory store that keeps them.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{default_participants, ConversationMessage, FinalResult, Participant};
use crate::utils::{now_utc, prefixed_id, Timestamp};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, no phase has run.
    Starting,
    /// Classification and specialist analysis.
    Active,
    /// Safety validation.
    Deliberating,
    /// Synthesis.
    Concluding,
    /// Every phase ran.
    Completed,
    /// An error escaped a phase.
    Error,
}

impl SessionStatus {
    /// Returns true for completed and error.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One multi-agent conversation about a single input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique id, `session_...`.
    pub id: String,
    /// What the conversation is about.
    pub topic: String,
    /// The parent's text.
    pub input: String,
    /// Agents taking part.
    pub participants: Vec<Participant>,
    /// Append-only log.
    pub messages: Vec<ConversationMessage>,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Creation time.
    pub started_at: Timestamp,
    /// Set once the session is finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// Set by a successful synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<FinalResult>,
}

impl Session {
    /// A starting session with the default participants.
    #[must_use]
    pub fn new(input: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: prefixed_id("session"),
            topic: topic.into(),
            input: input.into(),
            participants: default_participants(),
            messages: Vec::new(),
            status: SessionStatus::Starting,
            started_at: now_utc(),
            ended_at: None,
            final_result: None,
        }
    }

    /// Appends a message to the log.
    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    /// Moves to a terminal status and stamps the end time.
    pub fn finish(&mut self, status: SessionStatus) {
        self.status = status;
        self.ended_at = Some(now_utc());
    }

    /// Messages sent by `agent`.
    pub fn messages_from<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a ConversationMessage> + 'a {
        self.messages.iter().filter(move |m| m.from == agent)
    }
}

/// Sessions by id, shared by every conversation a system runs.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `session`.
    pub fn save(&self, session: &Session) {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
    }

    /// A snapshot of the session with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    /// Snapshots of every session, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.read().values().cloned().collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Drops completed and failed sessions; returns how many were dropped.
    pub fn clear_finished(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.status.is_finished());
        before - sessions.len()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_lifecycle() {
        let store = SessionStore::new();
        let mut running = Session::new("a", "health_analysis");
        running.status = SessionStatus::Active;
        let mut done = Session::new("b", "health_analysis");
        done.finish(SessionStatus::Completed);
        let mut failed = Session::new("c", "health_analysis");
        failed.finish(SessionStatus::Error);

        for session in [&running, &done, &failed] {
            store.save(session);
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&done.id).unwrap().status, SessionStatus::Completed);

        assert_eq!(store.clear_finished(), 2);
        let left = store.all();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, running.id);
    }

    #[test]
    fn test_session_defaults() {
        let session = Session::new("Fever", "health_analysis");
        assert!(session.id.starts_with("session_"));
        assert_eq!(session.status, SessionStatus::Starting);
        assert_eq!(session.participants.len(), 5);
        assert!(session.ended_at.is_none());
    }
}
