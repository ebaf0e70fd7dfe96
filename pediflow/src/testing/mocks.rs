//! Test doubles for the gateway and event seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

use crate::events::EventSink;
use crate::gateway::{ChatMessage, ChatRole, CompletionGateway, GatewayError};

#[derive(Debug, Clone)]
enum Outcome {
    Reply(String),
    Fail(GatewayError),
    Panic(String),
}

#[derive(Debug, Clone)]
struct Step {
    delay: Option<Duration>,
    outcome: Outcome,
}

impl Step {
    fn now(outcome: Outcome) -> Self {
        Self {
            delay: None,
            outcome,
        }
    }
}

#[derive(Debug)]
struct Route {
    marker: String,
    steps: VecDeque<Step>,
}

impl Route {
    /// Pops the next step, repeating the last one forever.
    fn next(&mut self) -> Option<Step> {
        if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        }
    }
}

/// A gateway that replays scripted outcomes.
///
/// Routed replies are matched first: a route applies when any system
/// message contains its marker, and its last step repeats once the others
/// are used up. Calls no route claims consume the ordered script; an empty
/// script answers with a network error.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Step>>,
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGateway {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        self.script.lock().push_back(step);
        self
    }

    fn push_route(self, marker: impl Into<String>, step: Step) -> Self {
        let marker = marker.into();
        {
            let mut routes = self.routes.lock();
            match routes.iter_mut().find(|r| r.marker == marker) {
                Some(route) => route.steps.push_back(step),
                None => routes.push(Route {
                    marker,
                    steps: VecDeque::from([step]),
                }),
            }
        }
        self
    }

    /// Queues a successful reply.
    #[must_use]
    pub fn then_ok(self, text: impl Into<String>) -> Self {
        self.push(Step::now(Outcome::Reply(text.into())))
    }

    /// Queues a failure.
    #[must_use]
    pub fn then_err(self, err: GatewayError) -> Self {
        self.push(Step::now(Outcome::Fail(err)))
    }

    /// Queues a successful reply that arrives after `delay`.
    #[must_use]
    pub fn then_delay(self, delay: Duration, text: impl Into<String>) -> Self {
        self.push(Step {
            delay: Some(delay),
            outcome: Outcome::Reply(text.into()),
        })
    }

    /// Queues a panic inside the call.
    #[must_use]
    pub fn then_panic(self, message: impl Into<String>) -> Self {
        self.push(Step::now(Outcome::Panic(message.into())))
    }

    /// Answers calls whose system prompt contains `marker` with `text`.
    #[must_use]
    pub fn route_ok(self, marker: impl Into<String>, text: impl Into<String>) -> Self {
        self.push_route(marker, Step::now(Outcome::Reply(text.into())))
    }

    /// Fails calls whose system prompt contains `marker`.
    #[must_use]
    pub fn route_err(self, marker: impl Into<String>, err: GatewayError) -> Self {
        self.push_route(marker, Step::now(Outcome::Fail(err)))
    }

    /// Panics on calls whose system prompt contains `marker`.
    #[must_use]
    pub fn route_panic(self, marker: impl Into<String>, message: impl Into<String>) -> Self {
        self.push_route(marker, Step::now(Outcome::Panic(message.into())))
    }

    /// Number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every call's messages, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }

    /// Number of calls whose system prompt contains `marker`.
    #[must_use]
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|messages| system_contains(messages, marker))
            .count()
    }

    fn next_step(&self, messages: &[ChatMessage]) -> Option<Step> {
        let routed = self
            .routes
            .lock()
            .iter_mut()
            .find(|r| system_contains(messages, &r.marker))
            .and_then(Route::next);
        routed.or_else(|| self.script.lock().pop_front())
    }
}

fn system_contains(messages: &[ChatMessage], marker: &str) -> bool {
    messages
        .iter()
        .any(|m| m.role == ChatRole::System && m.content.contains(marker))
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        self.calls.lock().push(messages.to_vec());
        let Some(step) = self.next_step(messages) else {
            return Err(GatewayError::Network("no scripted reply".to_string()));
        };
        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }
        match step.outcome {
            Outcome::Reply(text) => Ok(text),
            Outcome::Fail(err) => Err(err),
            Outcome::Panic(message) => panic!("{message}"),
        }
    }
}

/// An event sink that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<(String, Option<Value>)>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.lock().clone()
    }

    /// Recorded event names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Number of events named `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|(n, _)| n == name).count()
    }

    /// Data of every event named `name`.
    #[must_use]
    pub fn data_of(&self, name: &str) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .filter_map(|(_, d)| d.clone())
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.lock().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_exhausted() {
        let gateway = ScriptedGateway::new()
            .then_err(GatewayError::Timeout)
            .then_ok("{}");
        assert_eq!(gateway.complete(&[]).await, Err(GatewayError::Timeout));
        assert_eq!(gateway.complete(&[]).await, Ok("{}".to_string()));
        assert!(matches!(
            gateway.complete(&[]).await,
            Err(GatewayError::Network(_))
        ));
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test]
    async fn test_routes_match_system_prompt_and_repeat() {
        let gateway = ScriptedGateway::new()
            .route_ok("classifier", "first")
            .route_ok("classifier", "second")
            .then_ok("fallthrough");
        let routed = [ChatMessage::system("You are the classifier"), ChatMessage::user("hi")];
        let other = [ChatMessage::user("classifier")];

        assert_eq!(gateway.complete(&routed).await.unwrap(), "first");
        assert_eq!(gateway.complete(&routed).await.unwrap(), "second");
        assert_eq!(gateway.complete(&routed).await.unwrap(), "second");
        assert_eq!(gateway.complete(&other).await.unwrap(), "fallthrough");
        assert_eq!(gateway.calls_matching("classifier"), 3);
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingEventSink::new();
        sink.emit("a", Some(serde_json::json!({"n": 1}))).await;
        sink.try_emit("b", None);
        sink.try_emit("a", None);
        assert_eq!(sink.names(), vec!["a", "b", "a"]);
        assert_eq!(sink.count("a"), 2);
        assert_eq!(sink.data_of("a").len(), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
