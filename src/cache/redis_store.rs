//! Redis-backed [`CacheStore`] (feature `redis`).

use super::backend::{ttl_secs, CacheResult, CacheStore};
use super::key::CacheKey;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Shared store reached over a multiplexed, auto-reconnecting connection.
///
/// Clones share the underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!(url = %url, "redis cache store connected");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<Vec<u8>>>(key.as_str()).await?)
    }

    async fn set_ex(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key.as_str(), value, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.as_str()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
