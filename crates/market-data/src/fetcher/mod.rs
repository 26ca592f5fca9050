//! Fetcher contract.
//!
//! A fetcher turns one query into zero or more typed results in three
//! steps:
//!
//! ```text
//! Query --transform_query--> Request --extract_data--> [Record] --transform_data--> [Output]
//!          (pure)                        (I/O)                        (pure, lossy)
//! ```
//!
//! Resilience is layered on by wrapping, not by the fetcher itself:
//!
//! ```ignore
//! let primary = VciFetcher::new(VciConfig::default())?
//!     .with_retry(RetryPolicy::default())
//!     .with_breaker(vci_breaker.clone())
//!     .graceful();
//! ```
//!
//! [`GracefulFetcher`] is the boundary where every error becomes an empty
//! result; it is also the [`DataSource`] the resolver consumes.

mod graceful;
mod pool;
mod throttle;

pub use graceful::{DataSource, GracefulFetcher};
pub use pool::BlockingPool;
pub use throttle::LogThrottle;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::resilience::{BreakerGuardedFetcher, CircuitBreaker, RetryPolicy, RetryingFetcher};

/// One data source's request/response mapping.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Normalized query type.
    type Query: Send + Sync;
    /// Provider-specific request. Cloned for every retry attempt.
    type Request: Clone + Send + Sync;
    /// Raw record as returned by the provider.
    type Record: Send;
    /// Typed result.
    type Output: Send;

    /// Provider identifier used in logs, breakers and traces.
    fn id(&self) -> &str;

    /// Map a query to a provider request. Must not perform I/O.
    fn transform_query(&self, query: &Self::Query) -> Result<Self::Request, MarketDataError>;

    /// Call the provider. The only I/O step.
    ///
    /// Implementations enforce a timeout and classify every failure into
    /// [`MarketDataError`]; provider-specific error types never escape.
    async fn extract_data(
        &self,
        request: Self::Request,
    ) -> Result<Vec<Self::Record>, MarketDataError>;

    /// Map raw records to results, skipping (and logging) malformed ones.
    fn transform_data(&self, query: &Self::Query, records: Vec<Self::Record>) -> Vec<Self::Output>;

    /// Run the three steps without degradation.
    async fn try_fetch(&self, query: &Self::Query) -> Result<Vec<Self::Output>, MarketDataError> {
        let request = self.transform_query(query)?;
        let records = self.extract_data(request).await?;
        Ok(self.transform_data(query, records))
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for Arc<F> {
    type Query = F::Query;
    type Request = F::Request;
    type Record = F::Record;
    type Output = F::Output;

    fn id(&self) -> &str {
        (**self).id()
    }

    fn transform_query(&self, query: &Self::Query) -> Result<Self::Request, MarketDataError> {
        (**self).transform_query(query)
    }

    async fn extract_data(
        &self,
        request: Self::Request,
    ) -> Result<Vec<Self::Record>, MarketDataError> {
        (**self).extract_data(request).await
    }

    fn transform_data(&self, query: &Self::Query, records: Vec<Self::Record>) -> Vec<Self::Output> {
        (**self).transform_data(query, records)
    }
}

/// Construction-time composition of fetcher wrappers.
pub trait FetcherExt: Fetcher + Sized {
    /// Retry `extract_data` according to `policy`.
    fn with_retry(self, policy: RetryPolicy) -> RetryingFetcher<Self> {
        RetryingFetcher::new(self, policy)
    }

    /// Guard `extract_data` with a shared provider breaker.
    fn with_breaker(self, breaker: Arc<CircuitBreaker>) -> BreakerGuardedFetcher<Self> {
        BreakerGuardedFetcher::new(self, breaker)
    }

    /// Degrade every failure into an empty result.
    fn graceful(self) -> GracefulFetcher<Self> {
        GracefulFetcher::new(self)
    }
}

impl<F: Fetcher> FetcherExt for F {}
