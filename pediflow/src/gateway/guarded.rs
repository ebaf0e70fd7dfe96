//! A gateway wrapped in the shared breaker and rate limiter.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{ChatMessage, CircuitBreaker, CompletionGateway, GatewayError, RateLimiter};

/// Operation name used when none is given.
pub const DEFAULT_OPERATION: &str = "chat_completion";

/// Composes breaker, then limiter, then the inner gateway.
///
/// A quota rejection from upstream sets the limiter's quota flag so every
/// other caller sharing the limiter stops immediately.
pub struct GuardedGateway {
    inner: Arc<dyn CompletionGateway>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    operation: String,
}

impl GuardedGateway {
    /// Wraps `inner` with the given shared guards.
    #[must_use]
    pub fn new(
        inner: Arc<dyn CompletionGateway>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            inner,
            limiter,
            breaker,
            operation: DEFAULT_OPERATION.to_string(),
        }
    }

    /// Sets the breaker key.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// The shared limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The shared breaker.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl CompletionGateway for GuardedGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        let mut admission = self.breaker.admit(&self.operation)?;

        if let Err(err) = self.limiter.acquire().await {
            admission.release();
            return Err(err);
        }

        admission.mark_sent();
        match self.inner.complete(messages).await {
            Ok(text) => {
                admission.succeed();
                Ok(text)
            }
            Err(err) => {
                debug!(operation = %self.operation, error = %err, "Gateway call failed");
                if err.is_quota() {
                    self.limiter.mark_quota_exceeded();
                }
                admission.fail();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CircuitState, MockCompletionGateway};
    use crate::testing::ScriptedGateway;
    use std::time::Duration;

    fn guards() -> (Arc<RateLimiter>, Arc<CircuitBreaker>) {
        (
            Arc::new(RateLimiter::unlimited()),
            Arc::new(CircuitBreaker::new(2, Duration::from_secs(60))),
        )
    }

    #[tokio::test]
    async fn test_quota_error_sets_shared_flag() {
        let (limiter, breaker) = guards();
        let inner = Arc::new(ScriptedGateway::new().then_err(GatewayError::QuotaExceeded));
        let gateway = GuardedGateway::new(inner.clone(), limiter.clone(), breaker);

        let first = gateway.complete(&[ChatMessage::user("a")]).await;
        assert_eq!(first, Err(GatewayError::QuotaExceeded));
        assert!(limiter.is_quota_exceeded());

        // Second call never reaches the inner gateway.
        let second = gateway.complete(&[ChatMessage::user("b")]).await;
        assert_eq!(second, Err(GatewayError::QuotaExceeded));
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_inner_gateway() {
        let (limiter, breaker) = guards();
        breaker.record_failure(DEFAULT_OPERATION);
        breaker.record_failure(DEFAULT_OPERATION);
        assert_eq!(breaker.state(DEFAULT_OPERATION), CircuitState::Open);

        let mut inner = MockCompletionGateway::new();
        inner.expect_complete().never();
        let gateway = GuardedGateway::new(Arc::new(inner), limiter, breaker);

        let result = gateway.complete(&[ChatMessage::user("a")]).await;
        assert!(matches!(result, Err(GatewayError::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_does_not_wedge_breaker() {
        let limiter = Arc::new(RateLimiter::unlimited());
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(10)));
        breaker.record_failure(DEFAULT_OPERATION);
        tokio::time::advance(Duration::from_secs(11)).await;

        let inner = Arc::new(
            ScriptedGateway::new()
                .then_delay(Duration::from_secs(10), "{}")
                .then_ok("{}"),
        );
        let gateway = GuardedGateway::new(inner.clone(), limiter, breaker.clone());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), gateway.complete(&[])).await;
        assert!(cancelled.is_err());
        assert_eq!(breaker.state(DEFAULT_OPERATION), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(gateway.complete(&[]).await, Ok("{}".to_string()));
        assert_eq!(breaker.state(DEFAULT_OPERATION), CircuitState::Closed);
        assert_eq!(inner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_success_resets_breaker() {
        let (limiter, breaker) = guards();
        let inner = Arc::new(
            ScriptedGateway::new()
                .then_err(GatewayError::Network("reset".into()))
                .then_ok("{}"),
        );
        let gateway = GuardedGateway::new(inner, limiter, breaker.clone()).with_operation("x");

        assert!(gateway.complete(&[]).await.is_err());
        assert_eq!(breaker.failures("x"), 1);
        assert_eq!(gateway.complete(&[]).await, Ok("{}".to_string()));
        assert_eq!(breaker.failures("x"), 0);
    }
}
