//! Fixed-delay retry policy.
//!
//! Every failure is retried the same way, whatever its cause, until the
//! attempt budget is spent. Attempts are sequential; the wait happens only
//! between attempts.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WatchError;

/// Configuration for the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts (including the first one).
    pub num_retries: u32,
    /// Delay between two attempts in milliseconds.
    pub wait_time_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            num_retries: 120,
            wait_time_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn new(num_retries: u32, wait_time_ms: u64) -> Self {
        Self {
            num_retries,
            wait_time_ms,
        }
    }

    /// Number of attempts actually made. A budget of zero still tries once.
    pub fn attempts(&self) -> u32 {
        self.num_retries.max(1)
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }

    /// Returns the delay before the attempt following `attempt` (1-based),
    /// or `None` once the budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts() {
            return None;
        }
        Some(self.wait_time())
    }
}

/// Run `op` until it succeeds or the budget in `config` is exhausted.
///
/// On exhaustion the error of the last attempt is returned.
pub async fn retry<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> Result<T, WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WatchError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => match config.next_delay(attempt) {
                Some(delay) => {
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        what,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(attempt, error = %e, what, "max retries exceeded");
                    return Err(e);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[test]
    fn defaults_match_thirty_second_ceiling() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.num_retries, 120);
        assert_eq!(cfg.wait_time(), Duration::from_millis(250));
    }

    #[test]
    fn next_delay_is_fixed_until_budget_spent() {
        let cfg = RetryConfig::new(3, 40);
        assert_eq!(cfg.next_delay(1), Some(Duration::from_millis(40)));
        assert_eq!(cfg.next_delay(2), Some(Duration::from_millis(40)));
        assert!(cfg.next_delay(3).is_none());
    }

    #[test]
    fn zero_budget_still_tries_once() {
        let cfg = RetryConfig::new(0, 10);
        assert_eq!(cfg.attempts(), 1);
        assert!(cfg.next_delay(1).is_none());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig::new(5, 1);
        let out = retry(&cfg, "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(WatchError::Http("connection refused".into()))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error_after_exact_attempts() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig::new(4, 10);
        let started = Instant::now();
        let err = retry(&cfg, "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(WatchError::Http(format!("attempt {n}")))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.to_string(), "HTTP error: attempt 4");
        // Three waits between four attempts.
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
