use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use super::{Fetcher, LogThrottle};
use crate::errors::MarketDataError;

/// A source the resolver can consult. Never fails: an empty result means
/// "nothing usable from here".
#[async_trait]
pub trait DataSource<Q, R>: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &Q) -> Vec<R>;
}

/// Graceful-degradation boundary around a fetcher.
///
/// Any error from any step (including an open breaker or exhausted retries)
/// becomes an empty result. Each error class is logged at most once per
/// throttle window so a sustained outage does not flood the logs.
pub struct GracefulFetcher<F> {
    inner: F,
    throttle: LogThrottle,
}

impl<F: Fetcher> GracefulFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            throttle: LogThrottle::default(),
        }
    }

    pub fn with_log_window(inner: F, window: Duration) -> Self {
        Self {
            inner,
            throttle: LogThrottle::new(window),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Fetch results, degrading every failure to an empty list.
    pub async fn fetch(&self, query: &F::Query) -> Vec<F::Output> {
        match self.inner.try_fetch(query).await {
            Ok(results) => results,
            Err(err) => {
                self.report(&err);
                Vec::new()
            }
        }
    }

    /// Warn once per error class per window; other occurrences are dropped.
    /// Returns whether a line was written.
    fn report(&self, err: &MarketDataError) -> bool {
        if !self.throttle.should_log(err.code()) {
            return false;
        }
        warn!(
            "Provider '{}' degraded to empty result: {} (further '{}' errors suppressed for {:?})",
            self.inner.id(),
            err,
            err.code(),
            self.throttle.window()
        );
        true
    }
}

#[async_trait]
impl<F> DataSource<F::Query, F::Output> for GracefulFetcher<F>
where
    F: Fetcher,
{
    fn name(&self) -> &str {
        self.inner.id()
    }

    async fn fetch(&self, query: &F::Query) -> Vec<F::Output> {
        GracefulFetcher::fetch(self, query).await
    }
}
