//! Per-client request pacing.

use core::time::Duration;
use std::time::Instant;
use tracing::trace;

/// Spaces wire requests at least `1 / requests_per_second` apart.
///
/// Each client owns its limiter, so two clients never slow each other down.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// A limiter allowing `requests_per_second`; `None` or 0 disables it.
    pub fn new(requests_per_second: Option<u32>) -> Self {
        let interval = match requests_per_second {
            Some(rate) if rate > 0 => Duration::from_secs(1) / rate,
            _ => Duration::ZERO,
        };
        Self {
            interval,
            last_request: None,
        }
    }

    /// Minimum spacing between requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long [`RateLimiter::acquire`] would block at `now`.
    pub fn delay_at(&self, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Block until the next request is allowed, then record it.
    pub fn acquire(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        let wait = self.delay_at(Instant::now());
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "rate limited");
            std::thread::sleep(wait);
        }
        self.last_request = Some(Instant::now());
    }
}
