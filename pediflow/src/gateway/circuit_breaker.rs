//! Per-operation circuit breaker.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::GatewayError;
use crate::utils::saturating_ms;

/// Breaker state for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// One trial call is allowed through.
    HalfOpen,
}

#[derive(Debug)]
struct Entry {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Tracks consecutive failures per operation name and rejects calls while
/// an operation's breaker is open.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    entries: DashMap<String, Entry>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(60_000))
    }
}

impl CircuitBreaker {
    /// Creates a breaker that opens after `failure_threshold` consecutive
    /// failures and stays open for `cooldown`.
    #[must_use]
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            entries: DashMap::new(),
        }
    }

    /// Admits or rejects a call for `operation`.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and
    /// admits exactly one trial call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CircuitOpen`] while the breaker rejects calls.
    pub fn check(&self, operation: &str) -> Result<(), GatewayError> {
        let mut entry = self.entries.entry(operation.to_string()).or_default();
        match entry.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled = entry
                    .opened_at
                    .is_some_and(|opened| opened.elapsed() >= self.cooldown);
                if cooled {
                    info!(operation, "Circuit half-open, admitting trial call");
                    entry.state = CircuitState::HalfOpen;
                    entry.trial_in_flight = true;
                    Ok(())
                } else {
                    Err(open_error(operation))
                }
            }
            CircuitState::HalfOpen => {
                if entry.trial_in_flight {
                    Err(open_error(operation))
                } else {
                    entry.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Like [`check`](Self::check), but returns an [`Admission`] that settles
    /// the call when it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::CircuitOpen`] while the breaker rejects calls.
    pub fn admit<'a>(&'a self, operation: &'a str) -> Result<Admission<'a>, GatewayError> {
        self.check(operation)?;
        Ok(Admission {
            breaker: self,
            operation,
            sent: false,
            settled: false,
        })
    }

    /// Records a successful call: closes the breaker and resets the count.
    pub fn record_success(&self, operation: &str) {
        let mut entry = self.entries.entry(operation.to_string()).or_default();
        if entry.state != CircuitState::Closed {
            info!(operation, "Circuit closed");
        }
        *entry = Entry::default();
    }

    /// Records a failed call. Opens the breaker at the threshold, or
    /// immediately when the failing call was the half-open trial.
    pub fn record_failure(&self, operation: &str) {
        let mut entry = self.entries.entry(operation.to_string()).or_default();
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.trial_in_flight = false;

        let reopen = entry.state == CircuitState::HalfOpen;
        if reopen || entry.consecutive_failures >= self.failure_threshold {
            if entry.state != CircuitState::Open {
                warn!(
                    operation,
                    failures = entry.consecutive_failures,
                    cooldown_ms = saturating_ms(self.cooldown),
                    "Circuit opened"
                );
            }
            entry.state = CircuitState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    /// Releases an admitted call that never reached the upstream.
    pub fn abandon(&self, operation: &str) {
        if let Some(mut entry) = self.entries.get_mut(operation) {
            entry.trial_in_flight = false;
        }
    }

    /// Current state for `operation`.
    #[must_use]
    pub fn state(&self, operation: &str) -> CircuitState {
        self.entries
            .get(operation)
            .map_or(CircuitState::Closed, |e| e.state)
    }

    /// Consecutive failures recorded for `operation`.
    #[must_use]
    pub fn failures(&self, operation: &str) -> u32 {
        self.entries
            .get(operation)
            .map_or(0, |e| e.consecutive_failures)
    }

    /// Forgets all state for `operation`.
    pub fn reset(&self, operation: &str) {
        self.entries.remove(operation);
    }
}

/// One call admitted by [`CircuitBreaker::admit`].
///
/// Dropped without being settled, a call that reached the upstream counts
/// as a failure and one that did not is released. A caller timeout that
/// drops the call therefore never leaves a half-open trial in flight.
#[derive(Debug)]
#[must_use = "dropping an admission settles the call"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    operation: &'a str,
    sent: bool,
    settled: bool,
}

impl Admission<'_> {
    /// Marks the call as handed to the upstream.
    pub fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// Records success.
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.operation);
    }

    /// Records failure.
    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.operation);
    }

    /// Releases the admission without recording an outcome.
    pub fn release(mut self) {
        self.settled = true;
        self.breaker.abandon(self.operation);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.sent {
            warn!(operation = self.operation, "Call dropped in flight, counting it as a failure");
            self.breaker.record_failure(self.operation);
        } else {
            self.breaker.abandon(self.operation);
        }
    }
}

fn open_error(operation: &str) -> GatewayError {
    GatewayError::CircuitOpen {
        operation: operation.to_string(),
    }
}
