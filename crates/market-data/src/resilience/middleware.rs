//! Fetcher wrappers that apply retry and circuit breaking around the I/O
//! step. Both wrappers delegate the pure transform steps untouched.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::{CircuitBreaker, RetryPolicy};
use crate::errors::MarketDataError;
use crate::fetcher::Fetcher;

/// Retries `extract_data` according to a [`RetryPolicy`].
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    type Query = F::Query;
    type Request = F::Request;
    type Record = F::Record;
    type Output = F::Output;

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn transform_query(&self, query: &Self::Query) -> Result<Self::Request, MarketDataError> {
        self.inner.transform_query(query)
    }

    async fn extract_data(
        &self,
        request: Self::Request,
    ) -> Result<Vec<Self::Record>, MarketDataError> {
        let inner = &self.inner;
        self.policy
            .run(inner.id(), move |_| inner.extract_data(request.clone()))
            .await
    }

    fn transform_data(&self, query: &Self::Query, records: Vec<Self::Record>) -> Vec<Self::Output> {
        self.inner.transform_data(query, records)
    }
}

/// Consults a shared [`CircuitBreaker`] before `extract_data`.
///
/// An open circuit fails fast with [`MarketDataError::CircuitOpen`]. Only
/// errors that say something about upstream health are recorded as
/// failures; an unknown symbol leaves the circuit as it was.
pub struct BreakerGuardedFetcher<F> {
    inner: F,
    breaker: Arc<CircuitBreaker>,
}

impl<F> BreakerGuardedFetcher<F> {
    pub fn new(inner: F, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for BreakerGuardedFetcher<F> {
    type Query = F::Query;
    type Request = F::Request;
    type Record = F::Record;
    type Output = F::Output;

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn transform_query(&self, query: &Self::Query) -> Result<Self::Request, MarketDataError> {
        self.inner.transform_query(query)
    }

    async fn extract_data(
        &self,
        request: Self::Request,
    ) -> Result<Vec<Self::Record>, MarketDataError> {
        if !self.breaker.is_available() {
            debug!(
                "Circuit for '{}' is open, skipping upstream call",
                self.breaker.provider()
            );
            return Err(MarketDataError::CircuitOpen {
                provider: self.breaker.provider().to_string(),
            });
        }

        match self.inner.extract_data(request).await {
            Ok(records) => {
                self.breaker.record_success();
                Ok(records)
            }
            Err(err) => {
                if err.indicates_outage() {
                    self.breaker.record_failure();
                }
                Err(err)
            }
        }
    }

    fn transform_data(&self, query: &Self::Query, records: Vec<Self::Record>) -> Vec<Self::Output> {
        self.inner.transform_data(query, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetcherExt;
    use crate::resilience::{CircuitBreakerConfig, CircuitState, RetryConfig};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted outcomes; succeeds with `[42]` once the script runs out.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<MarketDataError>>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(errors: Vec<MarketDataError>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(errors.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        type Query = ();
        type Request = ();
        type Record = u32;
        type Output = u32;

        fn id(&self) -> &str {
            "SCRIPTED"
        }

        fn transform_query(&self, _query: &()) -> Result<(), MarketDataError> {
            Ok(())
        }

        async fn extract_data(&self, _request: ()) -> Result<Vec<u32>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(err) => Err(err),
                None => Ok(vec![42]),
            }
        }

        fn transform_data(&self, _query: &(), records: Vec<u32>) -> Vec<u32> {
            records
        }
    }

    fn unavailable() -> MarketDataError {
        MarketDataError::Upstream {
            provider: "SCRIPTED".to_string(),
            status: 503,
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_wait: Duration::from_millis(100),
            multiplier: 2.0,
            max_wait: Duration::from_secs(1),
            deadline: None,
        })
    }

    fn breaker(threshold: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::with_config(
            "SCRIPTED",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: Duration::from_secs(30),
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_fetcher_recovers() {
        let spy = ScriptedFetcher::new(vec![unavailable(), unavailable()]);
        let fetcher = spy.clone().with_retry(fast_retry(3));

        let result = fetcher.try_fetch(&()).await.unwrap();
        assert_eq!(result, vec![42]);
        assert_eq!(spy.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_fetcher_does_not_retry_symbol_not_found() {
        let spy = ScriptedFetcher::new(vec![MarketDataError::SymbolNotFound("XYZ".to_string())]);
        let fetcher = spy.clone().with_retry(fast_retry(3));

        assert!(matches!(
            fetcher.try_fetch(&()).await,
            Err(MarketDataError::SymbolNotFound(_))
        ));
        assert_eq!(spy.calls(), 1);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_io() {
        let spy = ScriptedFetcher::new(vec![]);
        let cb = breaker(1);
        cb.record_failure();
        let fetcher = spy.clone().with_breaker(cb);

        assert!(matches!(
            fetcher.try_fetch(&()).await,
            Err(MarketDataError::CircuitOpen { .. })
        ));
        assert_eq!(spy.calls(), 0);
    }

    #[tokio::test]
    async fn test_breaker_counts_only_outages() {
        let spy = ScriptedFetcher::new(vec![
            MarketDataError::SymbolNotFound("XYZ".to_string()),
            unavailable(),
        ]);
        let cb = breaker(5);
        let fetcher = spy.clone().with_breaker(cb.clone());

        let _ = fetcher.try_fetch(&()).await;
        assert_eq!(cb.failure_count(), 0);

        let _ = fetcher.try_fetch(&()).await;
        assert_eq!(cb.failure_count(), 1);

        assert_eq!(fetcher.try_fetch(&()).await.unwrap(), vec![42]);
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_count_as_one_breaker_failure() {
        let spy = ScriptedFetcher::new(vec![unavailable(), unavailable(), unavailable()]);
        let cb = breaker(2);
        let fetcher = spy.clone().with_retry(fast_retry(3)).with_breaker(cb.clone());

        assert!(fetcher.try_fetch(&()).await.is_err());
        assert_eq!(spy.calls(), 3);
        assert_eq!(cb.failure_count(), 1);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_then_probes_after_cooldown() {
        let spy = ScriptedFetcher::new(vec![unavailable(), unavailable()]);
        let cb = breaker(2);
        let fetcher = spy.clone().with_breaker(cb.clone()).graceful();

        assert!(fetcher.fetch(&()).await.is_empty());
        assert!(fetcher.fetch(&()).await.is_empty());
        assert_eq!(cb.state(), CircuitState::Open);

        // Rejected without I/O while open.
        assert!(fetcher.fetch(&()).await.is_empty());
        assert_eq!(spy.calls(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(fetcher.fetch(&()).await, vec![42]);
        assert_eq!(spy.calls(), 3);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
