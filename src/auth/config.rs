//! Authentication settings for one connection.

use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::env;
use url::Url;

/// Default token authority. Tests point this at a mock server.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Kind of value an auth field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFieldType {
    Url,
    String,
}

/// Declaration of one field the caller's auth context must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthField {
    pub field: &'static str,
    pub field_type: AuthFieldType,
    pub description: &'static str,
}

/// Fields required to authenticate a connection, in declaration order.
pub const EXPECTED_AUTH_FIELDS: &[AuthField] = &[
    AuthField {
        field: "resource",
        field_type: AuthFieldType::Url,
        description: "Resource URL",
    },
    AuthField {
        field: "clientId",
        field_type: AuthFieldType::String,
        description: "Client Id",
    },
    AuthField {
        field: "clientSecret",
        field_type: AuthFieldType::String,
        description: "Client Secret",
    },
];

/// Credentials and endpoints for one authenticated connection.
#[derive(Clone)]
pub struct AuthConfig {
    /// Organization URL, without trailing slash (e.g. `https://org.crm.dynamics.com`).
    pub resource: String,
    pub client_id: String,
    pub client_secret: String,
    /// Base of the token authority; the tenant id is appended to it.
    pub authority_host: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("resource", &self.resource)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(
        resource: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let resource = normalize_url("resource", resource.into())?;
        Ok(Self {
            resource,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        })
    }

    /// Override the token authority (primarily for testing with mock servers).
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Result<Self> {
        self.authority_host = normalize_url("authority_host", host.into())?;
        Ok(self)
    }

    /// Build from a caller-supplied auth metadata map keyed by
    /// [`EXPECTED_AUTH_FIELDS`].
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self> {
        let get = |field: &str| -> Result<String> {
            metadata
                .get(field)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::configuration_with_context(
                        "missing auth field",
                        ErrorContext::new()
                            .with_field_path(field)
                            .with_source("auth_config"),
                    )
                })
        };
        Self::new(get("resource")?, get("clientId")?, get("clientSecret")?)
    }

    /// Build from the environment.
    ///
    /// - `CRM_RESOURCE`, `CRM_CLIENT_ID`, `CRM_CLIENT_SECRET` (required)
    /// - `CRM_AUTHORITY_HOST` (default `https://login.microsoftonline.com`)
    pub fn from_env() -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            env::var(name).map_err(|_| {
                Error::configuration_with_context(
                    "environment variable not set",
                    ErrorContext::new()
                        .with_field_path(name)
                        .with_source("auth_config"),
                )
            })
        };
        let config = Self::new(
            get("CRM_RESOURCE")?,
            get("CRM_CLIENT_ID")?,
            get("CRM_CLIENT_SECRET")?,
        )?;
        match env::var("CRM_AUTHORITY_HOST") {
            Ok(host) => config.with_authority_host(host),
            Err(_) => Ok(config),
        }
    }

    /// URL of the unauthenticated probe used to obtain the bearer challenge.
    pub fn probe_url(&self) -> String {
        format!("{}/api/data", self.resource)
    }

    /// Token endpoint for a resolved tenant.
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/token", self.authority_host, tenant_id)
    }
}

fn normalize_url(field: &str, raw: String) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/').to_string();
    Url::parse(&trimmed).map_err(|e| {
        Error::configuration_with_context(
            "invalid URL",
            ErrorContext::new()
                .with_field_path(field)
                .with_details(e.to_string())
                .with_source("auth_config"),
        )
    })?;
    Ok(trimmed)
}
