use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::CacheStore;
use crate::errors::MarketDataError;

/// Entry count that triggers the first sweep of expired entries on write.
const DEFAULT_PURGE_THRESHOLD: usize = 1024;

/// Longest lifetime an entry can get. Larger TTLs are clamped to it.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

#[derive(Clone, Debug)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, MemoryEntry>,
    /// Size at which the next write sweeps expired entries.
    purge_at: usize,
    min_purge_at: usize,
}

impl Entries {
    fn insert(&mut self, key: String, entry: MemoryEntry, now: Instant) {
        self.map.insert(key, entry);
        if self.map.len() >= self.purge_at {
            self.map.retain(|_, entry| entry.is_live(now));
            // next sweep once the live set has doubled
            self.purge_at = (self.map.len() * 2).max(self.min_purge_at);
        }
    }
}

/// In-process cache store.
///
/// Expired entries are invisible to reads. They are swept on write once the
/// map grows past a threshold, by [`purge_expired`](Self::purge_expired), or
/// by being overwritten.
#[derive(Clone, Debug)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<Entries>>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::with_purge_threshold(DEFAULT_PURGE_THRESHOLD)
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep expired entries on write whenever `threshold` entries are held.
    pub fn with_purge_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            inner: Arc::new(RwLock::new(Entries {
                map: HashMap::new(),
                purge_at: threshold,
                min_purge_at: threshold,
            })),
        }
    }

    /// Remaining lifetime of a live entry.
    pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.inner.read().await;
        entries
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.write().await;
        let before = entries.map.len();
        entries.map.retain(|_, entry| entry.is_live(now));
        before - entries.map.len()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.map.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MarketDataError> {
        let now = Instant::now();
        let entries = self.inner.read().await;
        Ok(entries
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MarketDataError> {
        let now = Instant::now();
        let entry = MemoryEntry {
            value,
            expires_at: expiry(now, ttl),
        };
        self.inner.write().await.insert(key.to_string(), entry, now);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, MarketDataError> {
        let now = Instant::now();
        let removed = self.inner.write().await.map.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn set_many(&self, entries: Vec<(String, Vec<u8>, Duration)>) -> Result<(), MarketDataError> {
        let now = Instant::now();
        let mut state = self.inner.write().await;
        for (key, value, ttl) in entries {
            let entry = MemoryEntry {
                value,
                expires_at: expiry(now, ttl),
            };
            state.insert(key, entry, now);
        }
        Ok(())
    }
}
