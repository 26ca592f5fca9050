//! Two-tier cache glue.
//!
//! Every successful resolution is written twice in one batch: a fresh entry
//! with a short TTL that satisfies reads directly, and a stale entry with a
//! long TTL that is only consulted after every live source has failed.
//!
//! Keys have the shape `{prefix}:{namespace}:{fresh|stale}:{hash}` where
//! `hash` is the first 128 bits of SHA-256 over the query's JSON form.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryCacheStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisCacheStore;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::MarketDataError;

/// Default lifetime of the fresh tier.
const DEFAULT_FRESH_TTL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of the stale tier.
const DEFAULT_STALE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_PREFIX: &str = "quotefeed";

/// Bytes of the SHA-256 digest kept in a key.
const KEY_HASH_BYTES: usize = 16;

/// Key/value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MarketDataError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MarketDataError>;

    /// Remove `key`. Returns true if something was removed.
    async fn delete(&self, key: &str) -> Result<bool, MarketDataError>;

    /// Write several entries. Backends that can do so apply the batch
    /// atomically; the default writes them one by one.
    async fn set_many(&self, entries: Vec<(String, Vec<u8>, Duration)>) -> Result<(), MarketDataError> {
        for (key, value, ttl) in entries {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }
}

/// A query the resolver can cache.
///
/// The JSON form must be identical for equal normalized queries; the
/// `Display` form is used in logs and error context.
pub trait CacheableQuery: Serialize + fmt::Display + Send + Sync {
    /// Key namespace, one per query kind.
    fn namespace(&self) -> &'static str;
}

/// Cache tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    pub fresh_ttl: Duration,
    pub stale_ttl: Duration,
    /// Leading key segment, lets several deployments share one store.
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: DEFAULT_FRESH_TTL,
            stale_ttl: DEFAULT_STALE_TTL,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// The pair of keys derived from one query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CacheKeys {
    pub fresh: String,
    pub stale: String,
}

impl CacheKeys {
    pub fn for_query<Q: CacheableQuery>(prefix: &str, query: &Q) -> Result<Self, MarketDataError> {
        let payload = serde_json::to_vec(query)?;
        let digest = Sha256::digest(&payload);
        let hash = hex::encode(&digest[..KEY_HASH_BYTES]);
        let namespace = query.namespace();

        Ok(Self {
            fresh: format!("{}:{}:fresh:{}", prefix, namespace, hash),
            stale: format!("{}:{}:stale:{}", prefix, namespace, hash),
        })
    }
}

/// What is stored under both keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<R> {
    pub results: Vec<R>,
    pub created_at: DateTime<Utc>,
    pub fresh_ttl_secs: u64,
    pub stale_ttl_secs: u64,
}

impl<R> CacheEntry<R> {
    pub fn new(results: Vec<R>, config: &CacheConfig) -> Self {
        Self {
            results,
            created_at: Utc::now(),
            fresh_ttl_secs: config.fresh_ttl.as_secs(),
            stale_ttl_secs: config.stale_ttl.as_secs(),
        }
    }
}

impl<R: Serialize> CacheEntry<R> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MarketDataError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<R: for<'de> Deserialize<'de>> CacheEntry<R> {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MarketDataError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
