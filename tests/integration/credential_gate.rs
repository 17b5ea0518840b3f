//! Credential resolution: once per connection, shared by every caller

use crate::integration::mock_server::{MockServerFixture, TENANT};
use crm_gate::auth::{AuthConfig, CredentialPhase};
use crm_gate::error::INVALID_CREDENTIALS_MESSAGE;
use crm_gate::transport::{HttpTransport, RecordApi, TransportConfig};
use crm_gate::types::RetrieveMultipleRequest;
use crm_gate::Error;
use futures::future::join_all;
use std::time::Duration;

const FILTER: &str = "startswith(emailaddress1, 'a@example.com')";

fn lookup() -> RetrieveMultipleRequest {
    RetrieveMultipleRequest::new("contacts").with_filter(FILTER)
}

#[tokio::test]
async fn test_concurrent_operations_share_one_resolution() {
    let fixture = MockServerFixture::new().await;
    let (probe, token) = fixture.mock_authority().await;
    let data = fixture
        .mock_lookup("contacts", FILTER, r#"{"value":[{"contactid":"c1"}]}"#, 10)
        .await;

    let transport = fixture.transport();
    assert_eq!(transport.gate().phase(), CredentialPhase::Uninitialized);

    let request = lookup();
    let results = join_all((0..10).map(|_| transport.retrieve_multiple(&request))).await;
    for result in results {
        assert_eq!(result.unwrap().len(), 1);
    }

    let credential = transport.connect().await.unwrap();
    assert_eq!(credential.tenant_id(), TENANT);
    assert_eq!(transport.gate().phase(), CredentialPhase::Ready);

    probe.assert_async().await;
    token.assert_async().await;
    data.assert_async().await;
}

#[tokio::test]
async fn test_discovery_failure_is_shared_and_terminal() {
    let fixture = MockServerFixture::new().await;
    let probe = fixture.mock_probe(401, None, 1).await;
    let token = fixture.mock_token(0).await;
    let data = fixture.mock_api("GET", "contacts", 200, r#"{"value":[]}"#, 0).await;

    let transport = fixture.transport();
    let request = lookup();
    let results = join_all((0..5).map(|_| transport.retrieve_multiple(&request))).await;

    let messages: Vec<String> = results
        .into_iter()
        .map(|r| {
            let err = r.unwrap_err();
            assert!(matches!(err, Error::AuthDiscovery { .. }), "got {:?}", err);
            err.to_string()
        })
        .collect();
    assert!(messages.iter().all(|m| m == &messages[0]));
    assert!(messages[0].starts_with("Authentication error:"));

    // Later operations on the same connection fail the same way without re-probing.
    let again = transport.retrieve_multiple(&request).await.unwrap_err();
    assert_eq!(again.to_string(), messages[0]);
    assert_eq!(transport.gate().phase(), CredentialPhase::Failed);

    probe.assert_async().await;
    token.assert_async().await;
    data.assert_async().await;
}

#[tokio::test]
async fn test_rejected_client_secret_is_invalid_credentials() {
    let fixture = MockServerFixture::new().await;
    let probe = fixture.mock_challenge(1).await;
    let token = fixture
        .mock_token_response(
            401,
            r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret"}"#,
            1,
        )
        .await;

    let transport = fixture.transport();
    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
    assert_eq!(err.to_string(), INVALID_CREDENTIALS_MESSAGE);
    assert!(err.is_auth_failure());

    probe.assert_async().await;
    token.assert_async().await;
}

#[tokio::test]
async fn test_authority_outage_is_token_acquisition_error() {
    let fixture = MockServerFixture::new().await;
    let _probe = fixture.mock_challenge(1).await;
    let _token = fixture
        .mock_token_response(503, r#"{"error":"temporarily_unavailable"}"#, 1)
        .await;

    let err = fixture.transport().connect().await.unwrap_err();
    assert!(matches!(err, Error::TokenAcquisition { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_each_connection_resolves_independently() {
    let fixture = MockServerFixture::new().await;
    let probe = fixture.mock_challenge(2).await;
    let token = fixture.mock_token(2).await;

    let first = fixture.transport();
    let second = fixture.transport();
    assert_ne!(first.connection_id(), second.connection_id());

    first.connect().await.unwrap();
    first.connect().await.unwrap();
    second.connect().await.unwrap();

    probe.assert_async().await;
    token.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_resource_fails_discovery() {
    let auth = AuthConfig::new("http://127.0.0.1:1", "client-id", "client-secret").unwrap();
    let transport = HttpTransport::with_config(
        auth,
        TransportConfig::new().with_timeout(Duration::from_secs(2)),
    )
    .unwrap();

    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, Error::AuthDiscovery { .. }), "got {:?}", err);
}
