//! Outbound request pacing
//!
//! Enforces a minimum interval between requests for one scrape job. Each
//! orchestrator owns its own limiter clock; this is deliberately not a
//! distributed or cross-job limiter.

use std::time::{Duration, Instant};

/// Paces outbound requests to a configured per-minute budget
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Creates a limiter; `requests_per_minute == 0` disables pacing
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            last_request: None,
        }
    }

    /// Suspends the caller until the next request is allowed
    ///
    /// Computes `min_interval = 60 / requests_per_minute` and sleeps for
    /// whatever portion of it has not yet elapsed since the last recorded
    /// request, then stamps the current time as the new marker. The first
    /// call never waits.
    pub async fn check_rate_limit(&mut self) {
        if self.requests_per_minute == 0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute));

        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                let wait = min_interval - elapsed;
                tracing::trace!("Rate limit: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        self.last_request = Some(Instant::now());
    }
}
