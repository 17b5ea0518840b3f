//! Tenant discovery from a bearer challenge.

use super::AuthFailure;
use once_cell::sync::Lazy;
use regex::Regex;

static TENANT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.microsoftonline\.com/([a-zA-Z0-9-]+)/").expect("tenant pattern compiles")
});

/// Extract the tenant identifier from a `WWW-Authenticate` header value.
///
/// `None` means the probe response carried no challenge at all.
pub fn extract_tenant_id(header: Option<&str>) -> Result<String, AuthFailure> {
    let header = header.ok_or_else(|| {
        AuthFailure::Discovery("unable to retrieve tenant ID using resource URL.".to_string())
    })?;

    TENANT_PATTERN
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            AuthFailure::Discovery(
                "unable to extract tenant ID from bearer challenge.".to_string(),
            )
        })
}
