use crate::auth::AuthFailure;
use crate::transport::TransportError;
use thiserror::Error;

/// Message surfaced for every credential-shaped transport failure.
pub const INVALID_CREDENTIALS_MESSAGE: &str =
    "Credentials are invalid. Please check them and try again.";

/// Structured error context for configuration problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field or configuration key that caused the error (e.g., "clientId", "CRM_RESOURCE")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected format, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "auth_config", "transport_config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the gate, transport and cache layers.
///
/// Cache backend failures never show up here: the read-through layer
/// recovers them locally (see [`crate::cache::CacheErrorPolicy`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Tenant identifier could not be extracted from the bearer challenge.
    #[error("Authentication error: {message}")]
    AuthDiscovery { message: String },

    /// The authority refused the client-credential exchange.
    #[error("Authentication error: unable to acquire token: {message}")]
    TokenAcquisition { message: String },

    /// A 400 / 401 / connection failure from the record API.
    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True for failures that are terminal for the connection's credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::AuthDiscovery { .. } | Error::TokenAcquisition { .. } | Error::InvalidCredentials
        )
    }
}

impl From<AuthFailure> for Error {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Discovery(message) => Error::AuthDiscovery { message },
            AuthFailure::Token(message) => Error::TokenAcquisition { message },
            AuthFailure::InvalidCredentials => Error::InvalidCredentials,
        }
    }
}
