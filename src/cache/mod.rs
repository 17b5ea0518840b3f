//! 作用域读穿缓存：按执行上下文缓存查询结果，写入后失效。
//!
//! # Scoped Read-Through Cache
//!
//! Caches record lookups for the lifetime of one execution scope (run,
//! scenario, requestor) so repeated identical reads skip the remote API.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ReadThroughCache`] | Wraps any [`RecordApi`](crate::transport::RecordApi), serving reads from the store |
//! | [`CacheConfig`] | TTLs, invalidation policy, store-failure policy, discriminator fields |
//! | [`CacheStore`] | `GET` / `SETEX` / `DEL` abstraction over the backing store |
//! | [`MemoryStore`] | In-process store with TTL enforcement |
//! | [`NullStore`] | Store that keeps nothing |
//! | [`ScopeKeyBuilder`] | Deterministic key derivation from scope, collection and discriminator |
//! | [`KeyRegistry`] | Per-scope list of written keys, used for scope-wide clears |
//!
//! ## Keys
//!
//! A read filtered as `startswith(emailaddress1, 'a@example.com')` on
//! `contacts` in scope `run1 / scn1 / req1` is stored under
//! `contacts|a@example.com|run1|scn1|req1`; the scope's registry lives under
//! `cachekeys|run1|scn1|req1`.
//!
//! ## Example
//!
//! ```rust
//! use crm_gate::cache::{CacheConfig, MemoryStore, ReadThroughCache, ScopeIdentity};
//! use crm_gate::transport::RecordApi;
//! use std::sync::Arc;
//!
//! fn scoped<A: RecordApi>(origin: A) -> ReadThroughCache<A> {
//!     ReadThroughCache::new(
//!         origin,
//!         Arc::new(MemoryStore::new()),
//!         ScopeIdentity::new(["run1", "scn1", "req1"]),
//!         CacheConfig::from_env(),
//!     )
//! }
//! ```
//!
//! Store failures are logged and never returned to the caller.

mod backend;
mod filter;
mod key;
mod manager;
#[cfg(feature = "redis")]
mod redis_store;
mod registry;

pub use backend::{CacheError, CacheResult, CacheStore, MemoryStore, NullStore};
pub use filter::{parse_filter, FilterClause, FilterOp};
pub use key::{CacheKey, ScopeIdentity, ScopeKeyBuilder, KEY_DELIMITER, REGISTRY_SENTINEL};
pub use manager::{CacheConfig, CacheErrorPolicy, CacheStats, InvalidationPolicy, ReadThroughCache};
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use registry::KeyRegistry;
