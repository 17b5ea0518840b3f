//! # crm-gate
//!
//! 面向 CRM 记录 API 的认证访问网关与作用域读穿缓存。
//!
//! Authenticated access to a CRM record API (OData Web API) plus a scoped
//! read-through cache for repeated lookups.
//!
//! ## Overview
//!
//! A connection resolves its credential lazily and exactly once: the first
//! operation probes the resource, discovers the tenant from the bearer
//! challenge and exchanges client credentials for a token. Every concurrent
//! operation on that connection waits on the same resolution and shares its
//! outcome, success or failure.
//!
//! Reads can be wrapped in a [`ReadThroughCache`] bound to an execution scope.
//! Writes pass through and invalidate what the scope has cached.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crm_gate::auth::AuthConfig;
//! use crm_gate::cache::{CacheConfig, MemoryStore, ReadThroughCache, ScopeIdentity};
//! use crm_gate::transport::{HttpTransport, RecordApi};
//! use crm_gate::types::RetrieveMultipleRequest;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> crm_gate::Result<()> {
//!     let transport = HttpTransport::new(AuthConfig::from_env()?)?;
//!     let cache = ReadThroughCache::new(
//!         transport,
//!         Arc::new(MemoryStore::new()),
//!         ScopeIdentity::new(["run1", "scn1", "req1"]),
//!         CacheConfig::from_env(),
//!     );
//!
//!     let contacts = cache
//!         .retrieve_multiple(
//!             &RetrieveMultipleRequest::new("contacts")
//!                 .with_filter("startswith(emailaddress1, 'a@example.com')")
//!                 .with_count(true),
//!         )
//!         .await?;
//!     println!("{} matching contacts", contacts.len());
//!
//!     cache.end_scope().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Credential gate, tenant discovery, token acquisition |
//! | [`transport`] | Authenticated record operations and failure classification |
//! | [`cache`] | Scoped read-through cache, key derivation, stores |
//! | [`types`] | Request and record shapes |
//! | [`error`] | Crate error type |

pub mod auth;
pub mod cache;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use auth::{AuthConfig, CredentialGate};
pub use cache::{CacheConfig, ReadThroughCache, ScopeIdentity};
pub use transport::{HttpTransport, RecordApi};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
