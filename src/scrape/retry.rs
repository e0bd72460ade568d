//! Bounded retries around page navigation
//!
//! Navigation is the only retried operation in the engine, and every error
//! it raises is treated as retryable: transient network conditions are
//! indistinguishable from the outside, and a bounded fixed-delay retry
//! costs little relative to losing a whole page of listings.

use crate::browser::{BrowserError, PageFetcher};
use std::time::Duration;

/// How often and how patiently a navigation is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Fetches a URL, retrying failed navigations under the given policy
///
/// On each failure short of the attempt budget the policy delay elapses
/// before the next try; once the budget is exhausted the last error is
/// re-raised unmodified.
pub async fn fetch_with_retry<F>(
    policy: &RetryPolicy,
    fetcher: &mut F,
    url: &str,
) -> Result<String, BrowserError>
where
    F: PageFetcher + ?Sized,
{
    let mut attempt = 1;
    loop {
        match fetcher.fetch_page(url).await {
            Ok(html) => return Ok(html),
            Err(e) if attempt < policy.max_attempts => {
                tracing::warn!(
                    "Navigation to {} failed (attempt {}/{}): {}",
                    url,
                    attempt,
                    policy.max_attempts,
                    e
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
