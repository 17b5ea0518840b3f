//! Mock record API and authority for integration tests

use crm_gate::auth::AuthConfig;
use crm_gate::transport::{HttpTransport, TransportConfig};
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const TENANT: &str = "tenant-a";
pub const ACCESS_TOKEN: &str = "tok-1";

/// Route logs to the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One mock server acting as both the resource and the token authority.
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        init_tracing();
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(&self.base_url, "client-id", "client-secret")
            .and_then(|c| c.with_authority_host(&self.base_url))
            .expect("mock server URL is valid")
    }

    /// Fresh transport, i.e. a fresh connection with its own credential gate.
    pub fn transport(&self) -> HttpTransport {
        let config = TransportConfig::new().with_timeout(Duration::from_secs(5));
        HttpTransport::with_config(self.auth_config(), config).expect("transport builds")
    }

    /// Unauthenticated probe answering with a bearer challenge for [`TENANT`].
    pub async fn mock_challenge(&self, expect: usize) -> Mock {
        let challenge = format!(
            "Bearer authorization_uri=https://login.microsoftonline.com/{}/oauth2/authorize, resource_id={}",
            TENANT, self.base_url
        );
        self.mock_probe(401, Some(&challenge), expect).await
    }

    pub async fn mock_probe(&self, status: usize, challenge: Option<&str>, expect: usize) -> Mock {
        let mut server = self.server.lock().await;
        let mut mock = server.mock("GET", "/api/data").with_status(status);
        if let Some(challenge) = challenge {
            mock = mock.with_header("www-authenticate", challenge);
        }
        mock.expect(expect).create_async().await
    }

    pub async fn mock_token(&self, expect: usize) -> Mock {
        self.mock_token_response(
            200,
            &format!(r#"{{"token_type":"Bearer","expires_in":"3599","access_token":"{}"}}"#, ACCESS_TOKEN),
            expect,
        )
        .await
    }

    pub async fn mock_token_response(&self, status: usize, body: &str, expect: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", format!("/{}/oauth2/token", TENANT).as_str())
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            ]))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(expect)
            .create_async()
            .await
    }

    /// Challenge plus token exchange, each expected exactly once.
    pub async fn mock_authority(&self) -> (Mock, Mock) {
        (self.mock_challenge(1).await, self.mock_token(1).await)
    }

    /// Authenticated `GET {collection}?$filter=...` returning `body`.
    pub async fn mock_lookup(&self, collection: &str, filter: &str, body: &str, expect: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("GET", format!("/api/data/v9.0/{}", collection).as_str())
            .match_query(Matcher::UrlEncoded("$filter".into(), filter.into()))
            .match_header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(expect)
            .create_async()
            .await
    }

    /// Any authenticated call on `method path` answering `status` / `body`.
    pub async fn mock_api(&self, method: &str, path: &str, status: usize, body: &str, expect: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock(method, Matcher::Regex(format!("^/api/data/v9.0/{}", regex_escape(path))))
            .match_header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(expect)
            .create_async()
            .await
    }
}

fn regex_escape(path: &str) -> String {
    path.chars()
        .flat_map(|c| match c {
            '(' | ')' | '.' | '$' | '?' | '*' | '+' | '[' | ']' | '|' => vec!['\\', c],
            other => vec![other],
        })
        .collect()
}
