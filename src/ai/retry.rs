//! Retry Policy
//!
//! Bounded exponential backoff around a fallible async operation.
//!
//! The delay before retry `n` (zero-based) is `base_delay * 2^n` plus a jitter
//! drawn uniformly from `[0, jitter)`, where `jitter` is a fixed unit (one
//! second by default) independent of the base. After `max_attempts` failures
//! the last error is returned unchanged.
//!
//! ## Usage
//!
//! ```ignore
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let text = policy.run("generate", || provider.generate(prompt)).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::constants::retry as retry_constants;
use crate::types::Result;

/// Largest exponent applied to the base delay
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Exclusive upper bound of the uniform jitter
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: Duration::from_millis(retry_constants::DEFAULT_JITTER_MS),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
        .with_jitter(Duration::from_millis(config.jitter_ms))
    }

    /// Retry without sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO).with_jitter(Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff before the retry that follows failed attempt `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(factor) + random_jitter(self.jitter)
    }

    /// Run `op` until it succeeds or attempts are exhausted
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts = attempt + 1, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Giving up after final attempt"
                        );
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Uniform jitter in `[0, bound)`
fn random_jitter(bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    bound.mul_f64(rand::rng().random::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReportError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_fails_then_succeeds() {
        let policy = RetryPolicy::immediate(3);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = policy
            .run("flaky", move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ReportError::generation("transient"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_fails_after_max_attempts() {
        let policy = RetryPolicy::immediate(4);
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run("broken", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(ReportError::search(format!("failure {}", n))) }
            })
            .await;

        // Last error is surfaced unchanged
        assert!(result.unwrap_err().to_string().contains("failure 3"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_first_success_makes_one_call() {
        let policy = RetryPolicy::immediate(5);
        let calls = AtomicU32::new(0);

        let value = policy
            .run("ok", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ReportError>(7) }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_grows_exponentially_within_jitter() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.jitter, Duration::from_secs(1));

        for attempt in 0..4 {
            let floor = Duration::from_millis(100 * (1 << attempt));
            let delay = policy.delay_for(attempt);
            assert!(delay >= floor);
            assert!(delay < floor + Duration::from_secs(1));
        }
    }

    #[test]
    fn test_jitter_unit_independent_of_base() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let base = Duration::from_millis(10);

        // Jitter spans a full second, so some draws land well past base + 10ms
        let delays: Vec<Duration> = (0..200).map(|_| policy.delay_for(0)).collect();
        assert!(delays.iter().all(|d| *d >= base && *d < base + Duration::from_secs(1)));
        assert!(delays.iter().any(|d| *d > base + Duration::from_millis(10)));
    }

    #[test]
    fn test_from_config_uses_jitter_setting() {
        let config = RetryConfig {
            max_attempts: 4,
            base_delay_ms: 200,
            jitter_ms: 0,
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::immediate(2).delay_for(3), Duration::ZERO);
    }
}
