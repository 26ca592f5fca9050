use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::CacheStore;
use crate::errors::MarketDataError;

/// Redis-backed cache store.
///
/// Uses `GET`, `SET key value EX ttl` and `DEL`. Batches run as a
/// `MULTI/EXEC` pipeline. The connection manager reconnects on its own,
/// so a Redis restart only costs the calls made while it was down.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> Result<Self, MarketDataError> {
        let client = redis::Client::open(url).map_err(MarketDataError::cache)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(MarketDataError::cache)?;
        debug!("Connected cache store to Redis");
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

/// Redis rejects `EX 0`; anything below a second is rounded up.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, MarketDataError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(MarketDataError::cache)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), MarketDataError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(MarketDataError::cache)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, MarketDataError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await.map_err(MarketDataError::cache)?;
        Ok(removed > 0)
    }

    async fn set_many(&self, entries: Vec<(String, Vec<u8>, Duration)>) -> Result<(), MarketDataError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value, ttl) in entries {
            pipe.set_ex(key, value, ttl_secs(ttl)).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(MarketDataError::cache)?;
        Ok(())
    }
}
