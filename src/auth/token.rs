//! Bearer token acquisition via the client-credentials grant.

use super::{AuthConfig, AuthFailure};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Tokens are refreshed this long before the authority says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Source of bearer tokens, invoked by the transport on every call.
///
/// Implementations cache and refresh internally; callers only ask.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthFailure>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<ExpiresIn>,
}

// The v1 endpoint reports `expires_in` as a string; v2 as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Secs(u64),
    Text(String),
}

impl ExpiresIn {
    fn as_secs(&self) -> u64 {
        match self {
            ExpiresIn::Secs(s) => *s,
            ExpiresIn::Text(t) => t.trim().parse().unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Exchanges client id / secret for a token scoped to one tenant.
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    token_url: String,
    resource: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(http: reqwest::Client, config: &AuthConfig, tenant_id: &str) -> Self {
        Self {
            http,
            token_url: config.token_url(tenant_id),
            resource: config.resource.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn exchange(&self) -> Result<CachedToken, AuthFailure> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", self.resource.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthFailure::Token(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            warn!(status = status.as_u16(), detail = %detail, "token exchange rejected");
            return Err(match status.as_u16() {
                400 | 401 => AuthFailure::InvalidCredentials,
                code => AuthFailure::Token(format!("HTTP {}: {}", code, detail)),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::Token(format!("malformed token response: {}", e)))?;

        let lifetime = Duration::from_secs(
            token
                .expires_in
                .as_ref()
                .map(ExpiresIn::as_secs)
                .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        );
        debug!(lifetime_secs = lifetime.as_secs(), "bearer token acquired");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn access_token(&self) -> Result<String, AuthFailure> {
        // Holding the lock across the exchange keeps refreshes single-flight.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
