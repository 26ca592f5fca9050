//! Grouped tuning for one resolution stack.

use std::sync::Arc;

use crate::cache::CacheConfig;
use crate::provider::VciConfig;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy};

/// Everything needed to assemble fetchers and a resolver, read once at
/// startup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub vci: VciConfig,
}

impl ResilienceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.clone())
    }

    /// A new breaker for `provider`. Build one per provider and share it.
    pub fn breaker_for(&self, provider: &'static str) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::with_config(provider, self.breaker.clone()))
    }
}
