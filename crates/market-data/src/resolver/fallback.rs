use std::sync::Arc;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::trace::{AttemptOutcome, ResolutionTrace};
use crate::cache::{CacheConfig, CacheEntry, CacheKeys, CacheStore, CacheableQuery};
use crate::errors::MarketDataError;
use crate::fetcher::{DataSource, LogThrottle};
use crate::models::{Freshness, ResolutionSource, Resolved};

const FRESH_TIER: &str = "cache:fresh";
const STALE_TIER: &str = "cache:stale";

/// Per-call switches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolveOptions {
    /// Ignore the fresh tier and go to the providers. The result is still
    /// written back and the stale tier is still a last resort.
    pub skip_cache: bool,
    /// Accept stale data when every live source fails. When false, a stale
    /// hit surfaces as [`MarketDataError::StaleData`].
    pub allow_stale: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            skip_cache: false,
            allow_stale: true,
        }
    }
}

impl ResolveOptions {
    pub fn refresh() -> Self {
        Self {
            skip_cache: true,
            ..Self::default()
        }
    }
}

/// Fallback chain over cache and live sources.
///
/// Resolution order:
///
/// 1. fresh cache tier
/// 2. primary source, then the secondary source if configured
/// 3. stale cache tier
///
/// The first non-empty answer wins. Live answers are written back to both
/// tiers. Only full exhaustion is an error ([`MarketDataError::DataNotFound`]).
/// Cache failures never surface: reads degrade to misses and writes are
/// logged. Failed resolutions are logged once per error class per minute.
pub struct FallbackResolver<Q, R> {
    primary: Arc<dyn DataSource<Q, R>>,
    secondary: Option<Arc<dyn DataSource<Q, R>>>,
    cache: Option<Arc<dyn CacheStore>>,
    config: CacheConfig,
    failure_log: LogThrottle,
}

impl<Q, R> FallbackResolver<Q, R>
where
    Q: CacheableQuery,
    R: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn builder(primary: Arc<dyn DataSource<Q, R>>) -> FallbackResolverBuilder<Q, R> {
        FallbackResolverBuilder {
            primary,
            secondary: None,
            cache: None,
            config: CacheConfig::default(),
        }
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Resolve with default options.
    pub async fn resolve(&self, query: &Q) -> Result<Resolved<R>, MarketDataError> {
        self.resolve_with(query, ResolveOptions::default()).await
    }

    pub async fn resolve_with(
        &self,
        query: &Q,
        options: ResolveOptions,
    ) -> Result<Resolved<R>, MarketDataError> {
        self.resolve_traced(query, options).await.0
    }

    /// Resolve and also return the record of every source consulted.
    pub async fn resolve_traced(
        &self,
        query: &Q,
        options: ResolveOptions,
    ) -> (Result<Resolved<R>, MarketDataError>, ResolutionTrace) {
        let mut trace = ResolutionTrace::new();
        let keys = self.keys_for(query);
        let result = self.run_chain(query, keys.as_ref(), options, &mut trace).await;

        match &result {
            Ok(resolved) => debug!(
                "Resolved {} from {} [{}]",
                query, resolved.source, trace
            ),
            Err(err) => {
                self.report_failure(query, err, &trace);
            }
        }
        (result, trace)
    }

    /// Remove both cache tiers for `query`. Returns true if anything was
    /// deleted.
    pub async fn invalidate(&self, query: &Q) -> bool {
        let (Some(cache), Some(keys)) = (&self.cache, self.keys_for(query)) else {
            return false;
        };

        let mut deleted = false;
        for key in [&keys.fresh, &keys.stale] {
            match cache.delete(key).await {
                Ok(removed) => deleted |= removed,
                Err(err) => warn!("Failed to invalidate cache key {}: {}", key, err),
            }
        }

        if deleted {
            info!("Invalidated cached data for {}", query);
        }
        deleted
    }

    async fn run_chain(
        &self,
        query: &Q,
        keys: Option<&CacheKeys>,
        options: ResolveOptions,
        trace: &mut ResolutionTrace,
    ) -> Result<Resolved<R>, MarketDataError> {
        if !options.skip_cache {
            if let Some(key) = keys.map(|k| k.fresh.as_str()) {
                if let Some(entry) = self.read_tier(FRESH_TIER, key, trace).await {
                    return Ok(Resolved {
                        results: entry.results,
                        freshness: Freshness::Fresh,
                        source: ResolutionSource::Cache,
                    });
                }
            }
        }

        let sources = std::iter::once(&self.primary).chain(self.secondary.as_ref());
        for (position, source) in sources.enumerate() {
            if position > 0 {
                info!(
                    "Falling back to secondary source '{}' for {}",
                    source.name(),
                    query
                );
            }

            let results = source.fetch(query).await;
            trace.record_source(source.name(), results.len());
            if results.is_empty() {
                continue;
            }

            self.write_back(keys, &results).await;
            return Ok(Resolved {
                results,
                freshness: Freshness::Fresh,
                source: ResolutionSource::Provider(source.name().to_string()),
            });
        }

        if let Some(key) = keys.map(|k| k.stale.as_str()) {
            if let Some(entry) = self.read_tier(STALE_TIER, key, trace).await {
                if !options.allow_stale {
                    return Err(MarketDataError::StaleData {
                        query: query.to_string(),
                        cached_at: entry.created_at,
                    });
                }

                warn!(
                    "All live sources failed for {}, serving stale data cached at {}",
                    query, entry.created_at
                );
                return Ok(Resolved {
                    results: entry.results,
                    freshness: Freshness::Stale {
                        cached_at: entry.created_at,
                    },
                    source: ResolutionSource::StaleCache,
                });
            }
        }

        Err(MarketDataError::DataNotFound {
            query: query.to_string(),
            attempted_sources: trace.attempted_sources(),
        })
    }

    /// Returns whether a line was written.
    fn report_failure(&self, query: &Q, err: &MarketDataError, trace: &ResolutionTrace) -> bool {
        if !self.failure_log.should_log(err.code()) {
            return false;
        }
        warn!(
            "Resolution failed for {}: {} [{}] (further '{}' failures suppressed for {:?})",
            query,
            err,
            trace,
            err.code(),
            self.failure_log.window()
        );
        true
    }

    fn keys_for(&self, query: &Q) -> Option<CacheKeys> {
        self.cache.as_ref()?;
        match CacheKeys::for_query(&self.config.prefix, query) {
            Ok(keys) => Some(keys),
            Err(err) => {
                warn!(
                    "Cannot derive cache keys for {}, caching disabled for this call: {}",
                    query, err
                );
                None
            }
        }
    }

    /// Read and decode one tier. Store and decode failures are misses.
    async fn read_tier(
        &self,
        tier: &str,
        key: &str,
        trace: &mut ResolutionTrace,
    ) -> Option<CacheEntry<R>> {
        let cache = self.cache.as_ref()?;

        let bytes = match cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                trace.record_cache(tier, AttemptOutcome::Miss);
                return None;
            }
            Err(err) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, err);
                trace.record_cache(
                    tier,
                    AttemptOutcome::StoreError {
                        message: err.to_string(),
                    },
                );
                return None;
            }
        };

        match CacheEntry::<R>::from_bytes(&bytes) {
            Ok(entry) if !entry.results.is_empty() => {
                trace.record_cache(
                    tier,
                    AttemptOutcome::Hit {
                        records: entry.results.len(),
                    },
                );
                Some(entry)
            }
            Ok(_) => {
                trace.record_cache(tier, AttemptOutcome::Miss);
                None
            }
            Err(err) => {
                warn!("Discarding undecodable cache entry {}: {}", key, err);
                trace.record_cache(tier, AttemptOutcome::Miss);
                None
            }
        }
    }

    /// Write both tiers in one batch. Best effort.
    async fn write_back(&self, keys: Option<&CacheKeys>, results: &[R]) {
        let (Some(cache), Some(keys)) = (&self.cache, keys) else {
            return;
        };

        let entry = CacheEntry::new(results.iter().collect::<Vec<&R>>(), &self.config);
        let bytes = match entry.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to encode cache entry for {}: {}", keys.fresh, err);
                return;
            }
        };

        let batch = vec![
            (keys.fresh.clone(), bytes.clone(), self.config.fresh_ttl),
            (keys.stale.clone(), bytes, self.config.stale_ttl),
        ];
        if let Err(err) = cache.set_many(batch).await {
            warn!("Failed to write cache entries for {}: {}", keys.fresh, err);
        }
    }
}

/// Builder for [`FallbackResolver`].
pub struct FallbackResolverBuilder<Q, R> {
    primary: Arc<dyn DataSource<Q, R>>,
    secondary: Option<Arc<dyn DataSource<Q, R>>>,
    cache: Option<Arc<dyn CacheStore>>,
    config: CacheConfig,
}

impl<Q, R> FallbackResolverBuilder<Q, R> {
    pub fn secondary(mut self, source: Arc<dyn DataSource<Q, R>>) -> Self {
        self.secondary = Some(source);
        self
    }

    /// Without a store the resolver runs in provider-only mode.
    pub fn cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FallbackResolver<Q, R> {
        FallbackResolver {
            primary: self.primary,
            secondary: self.secondary,
            cache: self.cache,
            config: self.config,
            failure_log: LogThrottle::default(),
        }
    }
}
