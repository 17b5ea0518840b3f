//! Scoped read-through cache in front of a [`RecordApi`].

use super::backend::{CacheError, CacheStore};
use super::filter::{discriminator_for, parse_filter, FilterOp};
use super::key::{CacheKey, ScopeIdentity, ScopeKeyBuilder};
use super::registry::KeyRegistry;
use crate::transport::RecordApi;
use crate::types::{CreateRequest, DeleteRequest, Record, RetrieveMultipleRequest};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How writes invalidate cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidationPolicy {
    /// Clear every key registered for the scope after any write.
    #[default]
    ScopeWide,
    /// Delete only the key(s) derived from the written record's discriminator.
    Targeted,
}

/// What to do when the cache store fails. Errors are never surfaced either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheErrorPolicy {
    /// Log, then behave as a miss (reads) or a no-op (writes).
    #[default]
    FallbackToOrigin,
    /// Like `FallbackToOrigin`, and stop consulting the store for the rest of this scope.
    DisableOnError,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of cached read results.
    pub entity_ttl: Duration,
    /// Lifetime of the scope's key registry.
    pub registry_ttl: Duration,
    pub invalidation: InvalidationPolicy,
    pub on_cache_error: CacheErrorPolicy,
    /// Filter fields whose value may key a cached read.
    pub discriminator_fields: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entity_ttl: Duration::from_secs(600),
            registry_ttl: Duration::from_secs(600),
            invalidation: InvalidationPolicy::ScopeWide,
            on_cache_error: CacheErrorPolicy::FallbackToOrigin,
            discriminator_fields: vec!["emailaddress1".to_string()],
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridable via:
    /// - `CRM_CACHE_ENABLED` (`0` / `false` disables)
    /// - `CRM_CACHE_ENTITY_TTL_SECS`
    /// - `CRM_CACHE_REGISTRY_TTL_SECS`
    /// - `CRM_CACHE_INVALIDATION` (`scope` or `targeted`)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = env::var("CRM_CACHE_ENABLED") {
            config.enabled = !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off");
        }
        if let Some(secs) = env_secs("CRM_CACHE_ENTITY_TTL_SECS") {
            config.entity_ttl = secs;
        }
        if let Some(secs) = env_secs("CRM_CACHE_REGISTRY_TTL_SECS") {
            config.registry_ttl = secs;
        }
        if let Ok(v) = env::var("CRM_CACHE_INVALIDATION") {
            match v.trim().to_ascii_lowercase().as_str() {
                "targeted" => config.invalidation = InvalidationPolicy::Targeted,
                "scope" | "scope_wide" | "scope-wide" => {
                    config.invalidation = InvalidationPolicy::ScopeWide
                }
                other => warn!(value = %other, "unknown CRM_CACHE_INVALIDATION, keeping scope-wide"),
            }
        }
        config
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_entity_ttl(mut self, ttl: Duration) -> Self {
        self.entity_ttl = ttl;
        self
    }

    pub fn with_registry_ttl(mut self, ttl: Duration) -> Self {
        self.registry_ttl = ttl;
        self
    }

    pub fn with_invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.invalidation = policy;
        self
    }

    pub fn with_cache_error_policy(mut self, policy: CacheErrorPolicy) -> Self {
        self.on_cache_error = policy;
        self
    }

    pub fn with_discriminator_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discriminator_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    fn is_discriminator_field(&self, field: &str) -> bool {
        self.discriminator_fields
            .iter()
            .any(|f| f.eq_ignore_ascii_case(field))
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    /// Reads forwarded without consulting the cache.
    pub bypasses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    bypasses: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
        }
    }
}

/// Read-through cache for one execution scope.
///
/// Reads keyed by a recognized filter discriminator are served from the store
/// when present and populated from `origin` otherwise. Writes go straight to
/// `origin` and then invalidate per [`InvalidationPolicy`].
///
/// Population is not deduplicated: concurrent reads of the same missing key
/// may each hit the origin, and the last store write wins.
pub struct ReadThroughCache<A: RecordApi> {
    origin: A,
    store: Arc<dyn CacheStore>,
    scope: ScopeIdentity,
    registry: KeyRegistry,
    config: CacheConfig,
    stats: AtomicStats,
    disabled: AtomicBool,
}

impl<A: RecordApi> ReadThroughCache<A> {
    /// The registry TTL is raised to `entity_ttl` when configured shorter, so
    /// no registered entry outlives its registry.
    pub fn new(origin: A, store: Arc<dyn CacheStore>, scope: ScopeIdentity, mut config: CacheConfig) -> Self {
        if config.registry_ttl < config.entity_ttl {
            warn!(
                scope = %scope,
                registry_ttl_secs = config.registry_ttl.as_secs(),
                entity_ttl_secs = config.entity_ttl.as_secs(),
                "registry TTL shorter than entity TTL; using entity TTL"
            );
            config.registry_ttl = config.entity_ttl;
        }
        let registry = KeyRegistry::new(&scope, config.registry_ttl);
        Self {
            origin,
            store,
            scope,
            registry,
            config,
            stats: AtomicStats::default(),
            disabled: AtomicBool::new(false),
        }
    }

    pub fn scope(&self) -> &ScopeIdentity {
        &self.scope
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn origin(&self) -> &A {
        &self.origin
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    /// Key a read would be cached under, or `None` if it bypasses the cache.
    pub fn read_key(&self, request: &RetrieveMultipleRequest) -> Option<CacheKey> {
        if request.has_projection() {
            return None;
        }
        let clause = parse_filter(request.filter.as_deref()?)?;
        if clause.value.is_empty() || !self.config.is_discriminator_field(&clause.field) {
            return None;
        }
        Some(ScopeKeyBuilder::entity_key(
            &self.scope,
            &request.collection,
            &clause.discriminator(),
        ))
    }

    /// Clear every key registered for this scope and reset the registry.
    ///
    /// Runs after writes under [`InvalidationPolicy::ScopeWide`]; call it
    /// directly when the execution context ends.
    pub async fn end_scope(&self) {
        if !self.store_active() {
            return;
        }
        let Some(keys) = self.registered_keys().await else {
            return;
        };

        let results = join_all(keys.iter().map(|key| self.store.delete(key))).await;
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(()) => {
                    self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => self.cache_failed("delete", key, e),
            }
        }

        if let Err(e) = self.registry.reset(self.store.as_ref()).await {
            self.cache_failed("reset registry", self.registry.key(), e);
        }
        debug!(scope = %self.scope, cleared = keys.len(), "scope cache cleared");
    }

    fn store_active(&self) -> bool {
        self.config.enabled && !self.disabled.load(Ordering::Relaxed)
    }

    fn cache_failed(&self, op: &'static str, key: &CacheKey, err: CacheError) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            scope = %self.scope,
            backend = self.store.name(),
            op,
            key = %key,
            error = %err,
            "cache store failure; falling back to origin"
        );
        if self.config.on_cache_error == CacheErrorPolicy::DisableOnError
            && !self.disabled.swap(true, Ordering::Relaxed)
        {
            warn!(scope = %self.scope, "cache disabled for the remainder of this scope");
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Vec<Record>> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                self.cache_failed("get", key, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => Some(records),
            Err(e) => {
                self.cache_failed("decode", key, e.into());
                None
            }
        }
    }

    async fn populate(&self, key: &CacheKey, records: &[Record]) {
        let bytes = match serde_json::to_vec(records) {
            Ok(bytes) => bytes,
            Err(e) => return self.cache_failed("encode", key, e.into()),
        };
        if let Err(e) = self.store.set_ex(key, &bytes, self.config.entity_ttl).await {
            return self.cache_failed("set", key, e);
        }
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        debug!(scope = %self.scope, key = %key, "cache populated");

        if !self.register(key).await {
            // Every live entry must be listed in the registry.
            self.delete_key(key).await;
        }
    }

    /// Keys currently registered for the scope.
    ///
    /// A registry that does not decode counts as an error and reads as empty,
    /// so the next save overwrites it. `None` means the store could not be read.
    async fn registered_keys(&self) -> Option<Vec<CacheKey>> {
        match self.registry.load(self.store.as_ref()).await {
            Ok(keys) => Some(keys),
            Err(e @ CacheError::Codec(_)) => {
                self.cache_failed("decode registry", self.registry.key(), e);
                Some(Vec::new())
            }
            Err(e) => {
                self.cache_failed("load registry", self.registry.key(), e);
                None
            }
        }
    }

    /// Add `key` to the registry; false if it could not be recorded.
    async fn register(&self, key: &CacheKey) -> bool {
        let Some(mut keys) = self.registered_keys().await else {
            return false;
        };
        if keys.contains(key) {
            return true;
        }
        keys.push(key.clone());
        match self.registry.save(self.store.as_ref(), &keys).await {
            Ok(()) => true,
            Err(e) => {
                self.cache_failed("register", key, e);
                false
            }
        }
    }

    async fn delete_key(&self, key: &CacheKey) {
        match self.store.delete(key).await {
            Ok(()) => {
                self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                debug!(scope = %self.scope, key = %key, "cache entry invalidated");
            }
            Err(e) => self.cache_failed("delete", key, e),
        }
    }

    /// Targeted invalidation: every read form keyed on `value`.
    async fn invalidate_value(&self, collection: &str, value: &str) {
        for op in FilterOp::ALL {
            let key = ScopeKeyBuilder::entity_key(&self.scope, collection, &discriminator_for(op, value));
            self.delete_key(&key).await;
        }
    }

    async fn invalidate_after_create(&self, request: &CreateRequest, created: &Record) {
        if !self.store_active() {
            return;
        }
        match self.config.invalidation {
            InvalidationPolicy::ScopeWide => self.end_scope().await,
            InvalidationPolicy::Targeted => {
                let value = self
                    .config
                    .discriminator_fields
                    .iter()
                    .find_map(|f| created.get(f).and_then(|v| v.as_str()))
                    .or_else(|| {
                        self.config
                            .discriminator_fields
                            .iter()
                            .find_map(|f| request.entity.get(f).and_then(|v| v.as_str()))
                    });
                match value {
                    Some(value) => self.invalidate_value(&request.collection, value).await,
                    None => debug!(
                        collection = %request.collection,
                        "created record has no discriminator; nothing to invalidate"
                    ),
                }
            }
        }
    }

    async fn invalidate_after_delete(&self, request: &DeleteRequest) {
        if !self.store_active() {
            return;
        }
        match self.config.invalidation {
            InvalidationPolicy::ScopeWide => self.end_scope().await,
            InvalidationPolicy::Targeted => match request.discriminator.as_deref() {
                Some(value) => self.invalidate_value(&request.collection, value).await,
                None => debug!(
                    collection = %request.collection,
                    key = %request.key,
                    "delete carries no discriminator; nothing to invalidate"
                ),
            },
        }
    }
}

#[async_trait]
impl<A: RecordApi> RecordApi for ReadThroughCache<A> {
    async fn create(&self, request: &CreateRequest) -> Result<Record> {
        let created = self.origin.create(request).await?;
        self.invalidate_after_create(request, &created).await;
        Ok(created)
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<bool> {
        let deleted = self.origin.delete(request).await?;
        self.invalidate_after_delete(request).await;
        Ok(deleted)
    }

    async fn retrieve_multiple(&self, request: &RetrieveMultipleRequest) -> Result<Vec<Record>> {
        let key = match self.read_key(request) {
            Some(key) if self.store_active() => key,
            _ => {
                self.stats.bypasses.fetch_add(1, Ordering::Relaxed);
                return self.origin.retrieve_multiple(request).await;
            }
        };

        if let Some(records) = self.lookup(&key).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!(scope = %self.scope, key = %key, "cache hit");
            return Ok(records);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(scope = %self.scope, key = %key, "cache miss");

        let records = self.origin.retrieve_multiple(request).await?;
        if self.store_active() {
            self.populate(&key, &records).await;
        }
        Ok(records)
    }
}
