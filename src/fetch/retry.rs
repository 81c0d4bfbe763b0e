//! Exponential backoff for transient HTTP failures.
//!
//! # Retry Strategy
//!
//! - Connect errors, timeouts and HTTP 429/500/502/503/504 are retried
//! - Delay: `min(base * 2^(attempt-1), max_delay) + random_jitter(0..250ms)`
//! - A `Retry-After: <seconds>` header replaces the computed delay (capped)
//! - Anything else is returned to the caller immediately

use crate::error::CrawlError;
use rand::{Rng, rng};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry budget and backoff curve for one HTTP client.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: Duration,
    /// Cap for computed and server-requested delays.
    max_delay: Duration,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

enum Failure {
    Status(Response),
    Transport(reqwest::Error),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Status(resp) => write!(f, "HTTP {}", resp.status().as_u16()),
            Failure::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(31) as u32);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `request` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// A retryable status that survives every attempt is returned as the
    /// final response so the caller can report the status itself.
    pub async fn send<F, Fut>(&self, url: &str, mut request: F) -> Result<Response, CrawlError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let failure = match request().await {
                Ok(resp) if is_retryable_status(resp.status()) => Failure::Status(resp),
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => Failure::Transport(e),
                Err(e) => return Err(CrawlError::transport(url, e)),
            };

            attempt += 1;
            let attempt_dt = attempt_t0.elapsed();
            let total_dt = total_t0.elapsed();

            if attempt > self.max_retries {
                error!(
                    %url,
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_total = total_dt.as_millis() as u64,
                    error = %failure,
                    "request exhausted retries"
                );
                return match failure {
                    Failure::Status(resp) => Ok(resp),
                    Failure::Transport(e) => Err(CrawlError::transport(url, e)),
                };
            }

            let hinted = match &failure {
                Failure::Status(resp) => retry_after(resp.headers()),
                Failure::Transport(_) => None,
            };
            let delay = match hinted {
                Some(d) => d.min(self.max_delay),
                None => {
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    self.backoff(attempt) + Duration::from_millis(jitter_ms)
                }
            };

            warn!(
                %url,
                attempt,
                max = self.max_retries,
                elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                ?delay,
                error = %failure,
                "request failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Parse a `Retry-After` header given in whole seconds.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(16));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
        assert_eq!(policy.backoff(64), Duration::from_secs(30));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::NOT_IMPLEMENTED));
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 7 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
