//! Record operations and failure classification over HTTP

use crate::integration::mock_server::{MockServerFixture, ACCESS_TOKEN};
use crm_gate::error::INVALID_CREDENTIALS_MESSAGE;
use crm_gate::transport::{RecordApi, TransportError};
use crm_gate::types::{CreateRequest, DeleteRequest, Record, RetrieveMultipleRequest};
use crm_gate::Error;
use mockito::Matcher;
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

#[tokio::test]
async fn test_401_from_api_is_invalid_credentials() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let _data = fixture
        .mock_api("GET", "contacts", 401, r#"{"error":{"code":"0x80048306","message":"Unauthorized"}}"#, 1)
        .await;

    let err = fixture
        .transport()
        .retrieve_multiple(&RetrieveMultipleRequest::new("contacts"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
    assert_eq!(err.to_string(), INVALID_CREDENTIALS_MESSAGE);
}

#[tokio::test]
async fn test_400_from_api_is_invalid_credentials() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let _data = fixture
        .mock_api("POST", "contacts", 400, r#"{"error":{"message":"Bad Request"}}"#, 1)
        .await;

    let err = fixture
        .transport()
        .create(&CreateRequest::new("contacts", record(json!({"lastname": "Doe"}))))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
}

#[tokio::test]
async fn test_server_error_passes_through_unchanged() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let _data = fixture
        .mock_api(
            "GET",
            "contacts",
            500,
            r#"{"error":{"code":"0x80040216","message":"An unexpected error occurred."}}"#,
            1,
        )
        .await;

    let err = fixture
        .transport()
        .retrieve_multiple(&RetrieveMultipleRequest::new("contacts"))
        .await
        .unwrap_err();
    match err {
        Error::Transport(TransportError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "An unexpected error occurred.");
        }
        other => panic!("expected pass-through status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_keeps_status() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let _data = fixture.mock_api("DELETE", "contacts(c404)", 404, "", 1).await;

    let err = fixture
        .transport()
        .delete(&DeleteRequest::new("contacts", "c404"))
        .await
        .unwrap_err();
    match err {
        Error::Transport(e) => assert_eq!(e.status(), Some(404)),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retrieve_multiple_sends_query_and_unwraps_envelope() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let data = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/api/data/v9.0/contacts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("$filter".into(), "statecode eq 0".into()),
                Matcher::UrlEncoded("$select".into(), "fullname,emailaddress1".into()),
                Matcher::UrlEncoded("$count".into(), "true".into()),
            ]))
            .match_header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str())
            .match_header("odata-version", "4.0")
            .with_status(200)
            .with_body(
                r#"{"@odata.context":"ctx","@odata.count":2,"value":[
                    {"@odata.etag":"W/\"1\"","fullname":"Ann","emailaddress1":"ann@example.com"},
                    {"@odata.etag":"W/\"2\"","fullname":"Bob","emailaddress1":"bob@example.com"}
                ]}"#,
            )
            .expect(1)
            .create_async()
            .await
    };

    let records = fixture
        .transport()
        .retrieve_multiple(
            &RetrieveMultipleRequest::new("contacts")
                .with_filter("statecode eq 0")
                .with_select(["fullname", "emailaddress1"])
                .with_count(true),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["fullname"], "Ann");
    assert!(records.iter().all(|r| !r.contains_key("@odata.etag")));
    data.assert_async().await;
}

#[tokio::test]
async fn test_create_returns_representation() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let data = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/api/data/v9.0/contacts")
            .match_header("prefer", "return=representation")
            .match_body(Matcher::PartialJson(json!({"emailaddress1": "new@example.com"})))
            .with_status(201)
            .with_body(r#"{"@odata.etag":"W/\"7\"","contactid":"c7","emailaddress1":"new@example.com"}"#)
            .expect(1)
            .create_async()
            .await
    };

    let created = fixture
        .transport()
        .create(&CreateRequest::new(
            "contacts",
            record(json!({"emailaddress1": "new@example.com"})),
        ))
        .await
        .unwrap();

    assert_eq!(created["contactid"], "c7");
    assert!(!created.contains_key("@odata.etag"));
    data.assert_async().await;
}

#[tokio::test]
async fn test_create_without_representation_returns_empty_record() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let _data = fixture.mock_api("POST", "leads", 204, "", 1).await;

    let created = fixture
        .transport()
        .create(
            &CreateRequest::new("leads", record(json!({"subject": "x"})))
                .with_return_representation(false),
        )
        .await
        .unwrap();
    assert!(created.is_empty());
}

#[tokio::test]
async fn test_delete_addresses_record_by_key() {
    let fixture = MockServerFixture::new().await;
    let _auth = fixture.mock_authority().await;
    let data = fixture.mock_api("DELETE", "contacts(c1)", 204, "", 1).await;

    let deleted = fixture
        .transport()
        .delete(&DeleteRequest::new("contacts", "c1"))
        .await
        .unwrap();
    assert!(deleted);
    data.assert_async().await;
}
