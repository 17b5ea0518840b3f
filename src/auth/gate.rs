//! One-time tenant discovery and token acquisition per connection.

use super::challenge::extract_tenant_id;
use super::token::{ClientCredentialsProvider, TokenProvider};
use super::{AuthConfig, AuthFailure};
use crate::Result;
use arc_swap::ArcSwap;
use reqwest::header::WWW_AUTHENTICATE;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

/// Where a connection's credential resolution currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialPhase {
    Uninitialized,
    ResolvingTenant,
    AcquiringToken,
    Ready,
    Failed,
}

/// A resolved credential: the tenant plus a token source bound to it.
pub struct Credential {
    tenant_id: String,
    tokens: Arc<dyn TokenProvider>,
}

impl Credential {
    pub fn new(tenant_id: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tokens,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Current bearer token, refreshed by the provider when needed.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.tokens.access_token().await?)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

/// Single-flight gate in front of every data call on one connection.
///
/// Construction is inert; the first [`ready`](Self::ready) call runs
/// discovery and the token exchange. Concurrent and later callers share that
/// outcome, success or failure. A failed gate stays failed.
pub struct CredentialGate {
    config: AuthConfig,
    http: reqwest::Client,
    connection_id: Uuid,
    phase: ArcSwap<CredentialPhase>,
    outcome: OnceCell<std::result::Result<Arc<Credential>, AuthFailure>>,
}

impl CredentialGate {
    pub fn new(config: AuthConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            connection_id: Uuid::new_v4(),
            phase: ArcSwap::from_pointee(CredentialPhase::Uninitialized),
            outcome: OnceCell::new(),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn phase(&self) -> CredentialPhase {
        **self.phase.load()
    }

    /// Wait for the connection's credential, resolving it if nobody has yet.
    pub async fn ready(&self) -> Result<Arc<Credential>> {
        let outcome = self.outcome.get_or_init(|| self.resolve()).await;
        outcome.clone().map_err(Into::into)
    }

    fn set_phase(&self, phase: CredentialPhase) {
        self.phase.store(Arc::new(phase));
    }

    async fn resolve(&self) -> std::result::Result<Arc<Credential>, AuthFailure> {
        let result = self.discover_and_exchange().await;
        match &result {
            Ok(credential) => {
                self.set_phase(CredentialPhase::Ready);
                info!(
                    connection_id = %self.connection_id,
                    tenant_id = %credential.tenant_id(),
                    "credential ready"
                );
            }
            Err(failure) => {
                self.set_phase(CredentialPhase::Failed);
                warn!(
                    connection_id = %self.connection_id,
                    error = %failure,
                    "credential resolution failed"
                );
            }
        }
        result
    }

    async fn discover_and_exchange(&self) -> std::result::Result<Arc<Credential>, AuthFailure> {
        self.set_phase(CredentialPhase::ResolvingTenant);
        let tenant_id = self.discover_tenant().await?;

        self.set_phase(CredentialPhase::AcquiringToken);
        let provider = ClientCredentialsProvider::new(self.http.clone(), &self.config, &tenant_id);
        provider.access_token().await?;

        Ok(Arc::new(Credential::new(tenant_id, Arc::new(provider))))
    }

    async fn discover_tenant(&self) -> std::result::Result<String, AuthFailure> {
        let response = self
            .http
            .get(self.config.probe_url())
            .send()
            .await
            .map_err(|e| AuthFailure::Discovery(format!("bearer challenge probe failed: {}", e)))?;

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok());
        extract_tenant_id(challenge)
    }
}
