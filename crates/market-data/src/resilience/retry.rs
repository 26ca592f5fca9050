//! Bounded exponential-backoff retry policy.
//!
//! ```text
//! ATTEMPT --ok--> DONE
//!    |
//!    +--retryable, attempts left--> WAIT --> ATTEMPT
//!    |
//!    +--non-retryable or exhausted--> FAILED (original error)
//! ```

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::{MarketDataError, RetryClass};

/// Default total number of attempts (first call included).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait before the first retry.
const DEFAULT_BASE_WAIT: Duration = Duration::from_secs(1);

/// Default cap on any single wait.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Retry configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Wait before the first retry (`min_wait`).
    pub base_wait: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
    /// Cap on any single wait (`max_wait`).
    pub max_wait: Duration,
    /// Overall budget for all attempts and waits.
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_wait: DEFAULT_BASE_WAIT,
            multiplier: 2.0,
            max_wait: DEFAULT_MAX_WAIT,
            deadline: None,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based).
    ///
    /// `min(max_wait, base_wait * multiplier^retry)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let scale = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let seconds = self.base_wait.as_secs_f64() * scale;
        let capped = seconds.min(self.max_wait.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }
}

/// Per-call retry bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryContext {
    /// 1-based number of the attempt in flight.
    pub attempt: u32,
    /// Wait that preceded this attempt.
    pub delay: Duration,
    pub max_attempts: u32,
}

impl RetryContext {
    fn first(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            delay: Duration::ZERO,
            max_attempts,
        }
    }

    fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// Retry executor.
#[derive(Clone, Debug, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A policy that performs a single attempt.
    pub fn no_retry() -> Self {
        Self::new(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails terminally or attempts run out.
    ///
    /// The final error is returned as produced by `op`. When a deadline is
    /// configured and expires, including during a backoff wait,
    /// [`MarketDataError::Timeout`] is returned at once.
    pub async fn run<T, F, Fut>(&self, provider: &str, op: F) -> Result<T, MarketDataError>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run_attempts(provider, op))
                .await
                .unwrap_or_else(|_| {
                    warn!(
                        "Retry budget of {:?} exhausted for provider '{}'",
                        deadline, provider
                    );
                    Err(MarketDataError::Timeout {
                        provider: provider.to_string(),
                    })
                }),
            None => self.run_attempts(provider, op).await,
        }
    }

    async fn run_attempts<T, F, Fut>(&self, provider: &str, mut op: F) -> Result<T, MarketDataError>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut ctx = RetryContext::first(self.config.max_attempts.max(1));

        loop {
            let err = match op(ctx).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.retry_class() == RetryClass::Never {
                debug!(
                    "Provider '{}' failed with non-retryable {:?} on attempt {}",
                    provider, err, ctx.attempt
                );
                return Err(err);
            }

            if !ctx.has_attempts_left() {
                warn!(
                    "Provider '{}' failed after {} attempts: {}",
                    provider, ctx.attempt, err
                );
                return Err(err);
            }

            let delay = self.config.delay_for(ctx.attempt - 1);
            debug!(
                "Provider '{}' attempt {}/{} failed ({}), retrying in {:?}",
                provider, ctx.attempt, ctx.max_attempts, err, delay
            );
            tokio::time::sleep(delay).await;

            ctx = RetryContext {
                attempt: ctx.attempt + 1,
                delay,
                max_attempts: ctx.max_attempts,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn unavailable() -> MarketDataError {
        MarketDataError::Upstream {
            provider: "TEST".to_string(),
            status: 503,
        }
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let config = RetryConfig {
            base_wait: Duration::from_secs(1),
            multiplier: 2.0,
            max_wait: Duration::from_secs(8),
            ..RetryConfig::default()
        };

        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(2), Duration::from_secs(4));
        assert_eq!(config.delay_for(3), Duration::from_secs(8));
        assert_eq!(config.delay_for(4), Duration::from_secs(8)); // capped
        assert_eq!(config.delay_for(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_wait, Duration::from_secs(1));
        assert_eq!(config.max_wait, Duration::from_secs(10));
        assert!(config.deadline.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = policy
            .run("TEST", |ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if ctx.attempt < 3 {
                        Err(unavailable())
                    } else {
                        Ok(ctx.attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // base + base * 2
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_after_one_attempt() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run("TEST", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(MarketDataError::Unauthorized {
                        provider: "TEST".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(MarketDataError::Unauthorized { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run("TEST", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(MarketDataError::RateLimited {
                        provider: "TEST".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(MarketDataError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_original_error() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run("TEST", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(MarketDataError::Upstream { status: 503, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_backoff_wait() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_wait: Duration::from_secs(5),
            deadline: Some(Duration::from_secs(2)),
            ..RetryConfig::default()
        });
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), _> = policy
            .run("TEST", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                }
            })
            .await;

        assert!(matches!(result, Err(MarketDataError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_no_retry_policy_runs_once() {
        let policy = RetryPolicy::no_retry();
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .run("TEST", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
