//! Cache store abstraction and in-process implementations.

use super::key::CacheKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Failure talking to, or decoding from, a cache store.
///
/// Never surfaced to callers of the read-through layer.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache value could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Key-value store with per-entry expiry (`GET` / `SETEX` / `DEL`).
///
/// Values are opaque, pre-serialized bytes. Expiry is the store's job.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;
    /// Store `value` under `key` for `ttl`, rounded down to whole seconds (minimum one).
    async fn set_ex(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()>;
    async fn delete(&self, key: &CacheKey) -> CacheResult<()>;
    fn name(&self) -> &'static str;
}

/// Whole-second TTL as sent to the store.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[derive(Clone)]
struct StoredEntry {
    data: Vec<u8>,
    ttl: Duration,
    expires_at: Instant,
}

impl StoredEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let ttl = Duration::from_secs(ttl_secs(ttl));
        Self {
            data,
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process store with TTL enforcement. Shared by clones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> CacheError {
        CacheError::Unavailable("memory store lock poisoned".to_string())
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| !e.is_expired()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(key.as_str())
                    .map(|e| !e.is_expired())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// TTL the live entry was stored with.
    pub fn ttl(&self, key: &CacheKey) -> Option<Duration> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key.as_str())
            .filter(|e| !e.is_expired())
            .map(|e| e.ttl)
    }

    /// Force an entry past its expiry, as if its TTL had elapsed.
    pub fn expire(&self, key: &CacheKey) {
        if let Ok(mut entries) = self.entries.write() {
            if let Some(entry) = entries.get_mut(key.as_str()) {
                entry.expires_at = Instant::now();
            }
        }
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, e)| !e.is_expired())
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        if let Some(entry) = entries.get(key.as_str()) {
            if entry.is_expired() {
                entries.remove(key.as_str());
                return Ok(None);
            }
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.retain(|_, e| !e.is_expired());
        entries.insert(key.to_string(), StoredEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        self.entries
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(key.as_str());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store that keeps nothing; every read misses.
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for NullStore {
    async fn get(&self, _: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set_ex(&self, _: &CacheKey, _: &[u8], _: Duration) -> CacheResult<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> CacheResult<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
