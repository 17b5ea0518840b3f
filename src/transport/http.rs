use super::classify::classify;
use super::{RecordApi, TransportError};
use crate::auth::{AuthConfig, Credential, CredentialGate};
use crate::types::request::strip_annotations;
use crate::types::{CreateRequest, DeleteRequest, Record, RetrieveMultipleRequest};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// HTTP-level settings for the record API.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_version: "v9.0".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridable via `CRM_API_VERSION` and `CRM_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_version = env::var("CRM_API_VERSION").unwrap_or(defaults.api_version);
        let timeout = env::var("CRM_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        Self {
            api_version,
            timeout,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct CollectionEnvelope {
    #[serde(default)]
    value: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Authenticated OData transport for one connection.
pub struct HttpTransport {
    http: reqwest::Client,
    gate: Arc<CredentialGate>,
    web_api_url: Url,
}

impl HttpTransport {
    /// Create an inert transport; nothing touches the network until
    /// [`connect`](Self::connect) or the first operation.
    pub fn new(auth: AuthConfig) -> Result<Self> {
        Self::with_config(auth, TransportConfig::from_env())
    }

    pub fn with_config(auth: AuthConfig, config: TransportConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        let raw = format!("{}/api/data/{}/", auth.resource, config.api_version);
        let web_api_url = Url::parse(&raw).map_err(|e| {
            Error::configuration_with_context(
                "invalid web API URL",
                ErrorContext::new()
                    .with_field_path("resource")
                    .with_details(e.to_string())
                    .with_source("transport_config"),
            )
        })?;

        let gate = Arc::new(CredentialGate::new(auth, http.clone()));
        Ok(Self {
            http,
            gate,
            web_api_url,
        })
    }

    /// Resolve the connection's credential. Idempotent and shared.
    pub async fn connect(&self) -> Result<Arc<Credential>> {
        self.gate.ready().await
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn connection_id(&self) -> Uuid {
        self.gate.connection_id()
    }

    pub fn web_api_url(&self) -> &Url {
        &self.web_api_url
    }

    /// `{web api}/{collection}`; the collection must be a plain entity set name.
    fn collection_url(&self, collection: &str) -> Result<Url> {
        validate_entity_set(collection)?;
        self.segment_url(collection)
    }

    /// `{web api}/{collection}({key})`, with the key percent-encoded as part
    /// of a single path segment.
    fn record_url(&self, collection: &str, key: &str) -> Result<Url> {
        validate_entity_set(collection)?;
        if key.is_empty() {
            return Err(invalid_path("key", "record key is empty"));
        }
        self.segment_url(&format!("{}({})", collection, key))
    }

    fn segment_url(&self, segment: &str) -> Result<Url> {
        let mut url = self.web_api_url.clone();
        url.path_segments_mut()
            .map_err(|_| invalid_path("resource", "web API URL cannot take path segments"))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let credential = self.gate.ready().await?;
        let token = credential.access_token().await?;

        let response = request
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header("OData-Version", "4.0")
            .header("OData-MaxVersion", "4.0")
            .send()
            .await
            .map_err(|e| classify(TransportError::Http(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(classify(TransportError::Status {
            status: status.as_u16(),
            message,
        }))
    }
}

fn validate_entity_set(collection: &str) -> Result<()> {
    let mut chars = collection.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(invalid_path("collection", format!("not an entity set name: {:?}", collection)))
    }
}

fn invalid_path(field: &str, details: impl Into<String>) -> Error {
    Error::configuration_with_context(
        "invalid request path",
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("transport"),
    )
}

#[async_trait]
impl RecordApi for HttpTransport {
    async fn create(&self, request: &CreateRequest) -> Result<Record> {
        let url = self.collection_url(&request.collection)?;
        let mut builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request.entity);
        if request.return_representation {
            builder = builder.header("Prefer", "return=representation");
        }

        let response = self.execute(builder).await?;
        debug!(
            connection_id = %self.connection_id(),
            collection = %request.collection,
            "record created"
        );

        if !request.return_representation {
            return Ok(Record::new());
        }
        let record: Record = response
            .json()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        Ok(strip_annotations(record))
    }

    async fn delete(&self, request: &DeleteRequest) -> Result<bool> {
        let url = self.record_url(&request.collection, &request.key)?;
        self.execute(self.http.delete(url)).await?;
        debug!(
            connection_id = %self.connection_id(),
            collection = %request.collection,
            key = %request.key,
            "record deleted"
        );
        Ok(true)
    }

    async fn retrieve_multiple(&self, request: &RetrieveMultipleRequest) -> Result<Vec<Record>> {
        let mut url = self.collection_url(&request.collection)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(filter) = &request.filter {
                query.append_pair("$filter", filter);
            }
            if let Some(select) = request.select.as_ref().filter(|s| !s.is_empty()) {
                query.append_pair("$select", &select.join(","));
            }
            if request.count == Some(true) {
                query.append_pair("$count", "true");
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self.execute(self.http.get(url)).await?;
        let envelope: CollectionEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        Ok(envelope.value.into_iter().map(strip_annotations).collect())
    }
}
