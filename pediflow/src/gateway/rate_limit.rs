//! Minimum-interval rate limiter with a shared quota flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::GatewayError;
use crate::utils::saturating_ms;

/// Serialises gateway calls so that successive calls start at least
/// `min_interval` apart, and short-circuits every call while the quota flag
/// is set.
///
/// One instance is shared (behind an `Arc`) by everything that talks to the
/// same upstream.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
    quota_exceeded: AtomicBool,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl RateLimiter {
    /// Creates a limiter with the given minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
            quota_exceeded: AtomicBool::new(false),
        }
    }

    /// A limiter that never waits. Still honours the quota flag.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The configured minimum interval.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits for this caller's slot.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::QuotaExceeded`] immediately while the quota
    /// flag is set.
    pub async fn acquire(&self) -> Result<(), GatewayError> {
        self.check_quota()?;

        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.min_interval;
            let now = Instant::now();
            if next > now {
                debug!(wait_ms = saturating_ms(next - now), "Rate limiting gateway call");
                tokio::time::sleep_until(next).await;
            }
        }

        // The flag may have been set while this caller slept.
        self.check_quota()?;
        *last = Some(Instant::now());
        Ok(())
    }

    /// Sets the quota flag. Every later `acquire` fails until [`reset_quota`](Self::reset_quota).
    pub fn mark_quota_exceeded(&self) {
        if !self.quota_exceeded.swap(true, Ordering::SeqCst) {
            warn!("Gateway quota exceeded; rejecting further calls until reset");
        }
    }

    /// Clears the quota flag.
    pub fn reset_quota(&self) {
        self.quota_exceeded.store(false, Ordering::SeqCst);
    }

    /// Returns true while the quota flag is set.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        self.quota_exceeded.load(Ordering::SeqCst)
    }

    fn check_quota(&self) -> Result<(), GatewayError> {
        if self.is_quota_exceeded() {
            Err(GatewayError::QuotaExceeded)
        } else {
            Ok(())
        }
    }
}
