//! Common test utilities and fixtures.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use sso_integration_tests::{IDP_CERT_PEM, IDP_KEY_PEM};
use sso_protocol_saml::SigningMaterial;
use sso_server::{create_router, AppState, ServerConfig};

/// Header the test resolver trusts for the subject.
pub const USER_HEADER: &str = "x-authenticated-user";

/// Header the test resolver trusts for the email address.
pub const EMAIL_HEADER: &str = "x-authenticated-email";

/// A response collected into memory.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// The `Location` header.
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|v| v.to_str().ok())
    }

    /// All `Set-Cookie` headers.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Value of a hidden form input.
    pub fn form_field(&self, name: &str) -> Option<String> {
        let marker = format!(r#"name="{name}" value=""#);
        let start = self.body.find(&marker)? + marker.len();
        let len = self.body[start..].find('"')?;
        Some(self.body[start..start + len].to_string())
    }
}

/// Test environment wrapping the application router.
pub struct TestEnv {
    pub router: Router,
    pub config: ServerConfig,
}

impl TestEnv {
    /// Creates an environment with the fixture key pair.
    pub fn new() -> anyhow::Result<Self> {
        Self::with(ServerConfig::for_testing(), IDP_KEY_PEM)
    }

    /// Creates an environment with a custom configuration and signing key.
    pub fn with(config: ServerConfig, key_pem: &str) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sso_protocol_saml=debug,sso_server=debug")
            .with_test_writer()
            .try_init();

        let material = SigningMaterial::from_pem(key_pem, Some(IDP_CERT_PEM))?;
        let state = AppState::new(config.clone(), material, None)?;
        Ok(Self {
            router: create_router(&state),
            config,
        })
    }

    /// Sends a GET, optionally as a signed-in user.
    pub async fn get(&self, uri: &str, user: Option<&str>) -> anyhow::Result<TestResponse> {
        let mut request = Request::builder().uri(uri);
        if let Some(user) = user {
            request = request
                .header(USER_HEADER, user)
                .header(EMAIL_HEADER, format!("{user}@example.com"));
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty())?)
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await?.to_bytes();

        Ok(TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec())?,
        })
    }
}
