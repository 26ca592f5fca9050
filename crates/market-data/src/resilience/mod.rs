//! Resilience building blocks: retry with backoff and per-provider circuit
//! breakers, plus the fetcher wrappers that apply them.

mod circuit_breaker;
mod middleware;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState};
pub use middleware::{BreakerGuardedFetcher, RetryingFetcher};
pub use retry::{RetryConfig, RetryContext, RetryPolicy};
