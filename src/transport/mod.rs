//! # Transport Module
//!
//! Authenticated access to the record API.
//!
//! Every operation on [`HttpTransport`] first waits on the connection's
//! [`CredentialGate`](crate::auth::CredentialGate), then issues the OData call
//! and runs failures through [`classify`].

mod classify;
mod http;

pub use classify::classify;
pub use http::{HttpTransport, TransportConfig};

use crate::types::{CreateRequest, DeleteRequest, Record, RetrieveMultipleRequest};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The create / delete / retrieveMultiple capability set.
///
/// Implemented by the raw transport and by the read-through cache, so callers
/// can hold either behind the same interface.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// Create a record; returns its representation when requested, else an empty record.
    async fn create(&self, request: &CreateRequest) -> Result<Record>;

    async fn delete(&self, request: &DeleteRequest) -> Result<bool>;

    /// Filtered read; the response envelope is already unwrapped.
    async fn retrieve_multiple(&self, request: &RetrieveMultipleRequest) -> Result<Vec<Record>>;
}

#[async_trait]
impl<T: RecordApi + ?Sized> RecordApi for Arc<T> {
    async fn create(&self, request: &CreateRequest) -> Result<Record> {
        (**self).create(request).await
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<bool> {
        (**self).delete(request).await
    }

    async fn retrieve_multiple(&self, request: &RetrieveMultipleRequest) -> Result<Vec<Record>> {
        (**self).retrieve_multiple(request).await
    }
}

/// Raw failure of a record API call, before classification.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// HTTP status, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Other(_) => None,
        }
    }

    /// True for connection-level failures (refused, DNS resolution, TLS).
    pub fn is_connect(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect(),
            _ => false,
        }
    }
}
