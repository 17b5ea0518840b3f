//! # Authentication Module
//!
//! Resolves the credential for one connection exactly once.
//!
//! ## Flow
//!
//! 1. Unauthenticated probe of `{resource}/api/data`
//! 2. Tenant id read from the `WWW-Authenticate` bearer challenge
//! 3. Client-credentials exchange against `{authority}/{tenant}/oauth2/token`
//! 4. The resulting [`Credential`] hands out bearer tokens, refreshing on demand
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CredentialGate`] | Single-flight resolution shared by all callers on a connection |
//! | [`AuthConfig`] | Resource URL, client id / secret, authority host |
//! | [`TokenProvider`] | Bearer token source invoked per request |
//! | [`EXPECTED_AUTH_FIELDS`] | Fields the caller's auth context must supply |

mod challenge;
mod config;
mod gate;
mod token;

pub use challenge::extract_tenant_id;
pub use config::{AuthConfig, AuthField, AuthFieldType, DEFAULT_AUTHORITY_HOST, EXPECTED_AUTH_FIELDS};
pub use gate::{Credential, CredentialGate, CredentialPhase};
pub use token::{ClientCredentialsProvider, TokenProvider};

/// Cloneable credential failure, shared by every waiter on a failed gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("{0}")]
    Discovery(String),
    #[error("{0}")]
    Token(String),
    #[error("{}", crate::error::INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,
}
