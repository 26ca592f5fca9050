//! Quotefeed Market Data Crate
//!
//! Resilient resolution of historical market data: typed fetchers wrapped
//! in retry and circuit breaking, a fallback chain across providers, and a
//! two-tier (fresh / stale) cache.
//!
//! # Architecture
//!
//! ```text
//!                      +----------------------+
//!   HistoryQuery ----> |   FallbackResolver   |
//!                      +----------------------+
//!                        |  1. fresh cache tier
//!                        |  2. primary   (GracefulFetcher <- BreakerGuardedFetcher <- RetryingFetcher <- VciFetcher)
//!                        |  3. secondary (GracefulFetcher <- ... <- YahooFetcher | CsvFetcher)
//!                        |  4. stale cache tier
//!                        v
//!                 Resolved<Quote> | DataNotFound
//! ```
//!
//! # Core Types
//!
//! - [`Fetcher`] - three-step query/extract/transform contract
//! - [`GracefulFetcher`] / [`DataSource`] - degradation boundary consumed by the resolver
//! - [`RetryPolicy`] - bounded exponential backoff
//! - [`CircuitBreaker`] - per-provider breaker, shared by `Arc`
//! - [`CacheStore`] - key/value store with TTLs
//! - [`FallbackResolver`] - the resolution algorithm
//! - [`MarketDataError`] - closed error taxonomy

pub mod cache;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod provider;
pub mod resilience;
pub mod resolver;

pub use cache::{CacheConfig, CacheEntry, CacheKeys, CacheStore, CacheableQuery, MemoryCacheStore};
#[cfg(feature = "redis")]
pub use cache::RedisCacheStore;
pub use config::ResilienceConfig;
pub use errors::{MarketDataError, RetryClass};
pub use fetcher::{BlockingPool, DataSource, Fetcher, FetcherExt, GracefulFetcher, LogThrottle};
pub use models::{Freshness, HistoryQuery, Interval, ProviderId, Quote, ResolutionSource, Resolved};
pub use provider::{CsvConfig, CsvFetcher, VciConfig, VciFetcher, YahooConfig, YahooFetcher};
pub use resilience::{
    BreakerGuardedFetcher, CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState,
    RetryConfig, RetryContext, RetryPolicy, RetryingFetcher,
};
pub use resolver::{
    AttemptOutcome, FallbackResolver, FallbackResolverBuilder, ResolutionTrace, ResolveOptions,
    SourceAttempt,
};
