//! Per-scope list of cache keys, persisted in the store itself.

use super::backend::{CacheResult, CacheStore};
use super::key::{CacheKey, ScopeIdentity, ScopeKeyBuilder};
use std::time::Duration;

/// Bookkeeping for scope-wide invalidation.
///
/// The registry is a JSON array of keys stored under `cachekeys|<scope>`.
/// Updates are read-modify-write with no lock: a concurrent registration and reset
/// can interleave, in which case an entry may outlive the reset until its TTL.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    key: CacheKey,
    ttl: Duration,
}

impl KeyRegistry {
    pub fn new(scope: &ScopeIdentity, ttl: Duration) -> Self {
        Self {
            key: ScopeKeyBuilder::registry_key(scope),
            ttl,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Registered keys in write order; a missing registry is empty.
    pub async fn load(&self, store: &dyn CacheStore) -> CacheResult<Vec<CacheKey>> {
        match store.get(&self.key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Persist an empty list with a fresh TTL.
    pub async fn reset(&self, store: &dyn CacheStore) -> CacheResult<()> {
        self.save(store, &[]).await
    }

    /// Replace the registered keys, refreshing the TTL.
    pub async fn save(&self, store: &dyn CacheStore, keys: &[CacheKey]) -> CacheResult<()> {
        let bytes = serde_json::to_vec(keys)?;
        store.set_ex(&self.key, &bytes, self.ttl).await
    }
}
