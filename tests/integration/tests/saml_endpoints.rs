//! SAML endpoint integration tests.
//!
//! Tests for the SSO, SLO and metadata endpoints through the full router.

use axum::http::StatusCode;
use sso_crypto::Certificate;
use sso_integration_tests::{fixture_path, IDP_CERT_PEM, OTHER_KEY_PEM};
use sso_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use sso_protocol_saml::{IdpLogoutMode, XmlSignatureVerifier};
use sso_server::{Server, ServerConfig};

use crate::common::TestEnv;

const AUTHN_REQUEST: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_authn-1" Version="2.0" IssueInstant="2026-01-01T00:00:00Z" Destination="https://idp.example.com/saml/sso" AssertionConsumerServiceURL="https://sp.example.com/saml/acs"><saml:Issuer>https://sp.example.com</saml:Issuer><samlp:NameIDPolicy Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress" AllowCreate="true"/></samlp:AuthnRequest>"#;

const LOGOUT_REQUEST_NO_SESSION_INDEX: &str = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_logout-1" Version="2.0" IssueInstant="2026-01-01T00:00:00Z" Destination="https://idp.example.com/saml/slo"><saml:Issuer>https://sp.example.com</saml:Issuer><saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">ada@example.com</saml:NameID></samlp:LogoutRequest>"#;

fn redirect_param(xml: &str) -> anyhow::Result<String> {
    Ok(HttpRedirectBinding::encode(xml)?)
}

fn verifier() -> anyhow::Result<XmlSignatureVerifier> {
    Ok(XmlSignatureVerifier::from_pem(&[IDP_CERT_PEM])?)
}

/// Tests that the IdP metadata endpoint returns valid, stable XML.
#[tokio::test]
async fn test_saml_metadata_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let first = env.get("/saml/metadata", None).await?;
    assert_eq!(first.status, StatusCode::OK);

    let content_type = first
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert_eq!(content_type, "application/samlmetadata+xml");

    assert!(first.body.contains(r#"entityID="https://idp.example.com/saml/metadata""#));
    assert!(first.body.contains(r#"Location="https://idp.example.com/saml/sso""#));
    assert!(first.body.contains(r#"Location="https://idp.example.com/saml/slo""#));

    let cert_b64 = Certificate::from_pem(IDP_CERT_PEM)?.to_base64();
    assert!(first.body.contains(&cert_b64), "metadata should carry the signing certificate");

    let second = env.get("/saml/metadata", None).await?;
    assert_eq!(first.body, second.body, "metadata must be byte-identical across calls");

    Ok(())
}

/// SP-initiated SSO with RelayState posts exactly one RelayState back.
#[tokio::test]
async fn test_sp_initiated_sso_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let uri = format!(
        "/saml/sso?SAMLRequest={}&RelayState=r1",
        redirect_param(AUTHN_REQUEST)?
    );

    let response = env.get(&uri, Some("ada")).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(r#"action="https://sp.example.com/saml/acs""#));
    assert_eq!(response.body.matches(r#"name="RelayState""#).count(), 1);
    assert_eq!(response.form_field("RelayState").as_deref(), Some("r1"));

    let encoded = response
        .form_field("SAMLResponse")
        .ok_or_else(|| anyhow::anyhow!("no SAMLResponse field"))?;
    let xml = HttpPostBinding::decode(&encoded)?;

    assert!(xml.contains(r#"InResponseTo="_authn-1""#));
    assert!(xml.contains(">ada@example.com</saml:NameID>"));
    assert!(xml.contains("<saml:Audience>https://sp.example.com</saml:Audience>"));

    // The signature sits right after the first Issuer.
    let issuer_end = xml
        .find("</saml:Issuer>")
        .ok_or_else(|| anyhow::anyhow!("no Issuer"))?
        + "</saml:Issuer>".len();
    assert!(xml[issuer_end..].starts_with("<ds:Signature"));

    let signature = verifier()?.verify(&xml)?;
    assert!(signature.reference_uri.starts_with("#_"));

    Ok(())
}

/// IdP-initiated SSO carries no RelayState and no InResponseTo.
#[tokio::test]
async fn test_idp_initiated_sso() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let response = env.get("/saml/sso", Some("grace")).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.body.contains("RelayState"));

    let encoded = response
        .form_field("SAMLResponse")
        .ok_or_else(|| anyhow::anyhow!("no SAMLResponse field"))?;
    let xml = HttpPostBinding::decode(&encoded)?;
    assert!(!xml.contains("InResponseTo"));
    verifier()?.verify(&xml)?;

    Ok(())
}

/// A browser without a session is sent to the login page with the original
/// parameters intact.
#[tokio::test]
async fn test_sso_without_session_redirects_to_login() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let saml_request = redirect_param(AUTHN_REQUEST)?;
    let uri = format!("/saml/sso?SAMLRequest={saml_request}&RelayState=deep%2Flink");

    let response = env.get(&uri, None).await?;
    assert_eq!(response.status, StatusCode::FOUND);

    let location = response
        .location()
        .ok_or_else(|| anyhow::anyhow!("no Location"))?;
    let url = url::Url::parse(&format!("https://idp.example.com{location}"))?;
    assert_eq!(url.path(), "/login");

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let raw = url::form_urlencoded::parse(format!("v={saml_request}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| anyhow::anyhow!("cannot unescape request"))?;
    assert_eq!(
        pairs,
        vec![
            ("SAMLRequest".to_string(), raw),
            ("RelayState".to_string(), "deep/link".to_string()),
        ]
    );

    Ok(())
}

/// Garbage on the SSO endpoint is a client error with a generic page.
#[tokio::test]
async fn test_sso_rejects_malformed_request() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let response = env.get("/saml/sso?SAMLRequest=not-deflate", Some("ada")).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(!response.body.contains("DEFLATE"));
    assert!(!response.body.contains("SAMLResponse"));

    Ok(())
}

/// A mismatched signing key never emits a Response.
#[tokio::test]
async fn test_sso_with_mismatched_key_emits_nothing() -> anyhow::Result<()> {
    let env = TestEnv::with(ServerConfig::for_testing(), OTHER_KEY_PEM)?;

    let response = env.get("/saml/sso", Some("ada")).await?;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.body.contains("SAMLResponse"));
    assert!(!response.body.contains("PRIVATE KEY"));

    Ok(())
}

/// The server refuses to start with a key that fails the self-check.
#[test]
fn test_server_refuses_mismatched_key() {
    let mut config = ServerConfig::for_testing();
    config.signing_key_path = fixture_path("other_key.pem");
    config.signing_cert_path = fixture_path("idp_cert.pem");
    assert!(Server::new(config).is_err());

    let mut config = ServerConfig::for_testing();
    config.signing_key_path = fixture_path("idp_key.pem");
    config.signing_cert_path = fixture_path("idp_cert.pem");
    assert!(Server::new(config).is_ok());
}

/// SP-initiated logout without SessionIndex still yields a signed
/// LogoutResponse.
#[tokio::test]
async fn test_sp_initiated_logout() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let uri = format!(
        "/saml/slo?SAMLRequest={}&RelayState=r2",
        redirect_param(LOGOUT_REQUEST_NO_SESSION_INDEX)?
    );

    let response = env.get(&uri, Some("ada")).await?;
    assert_eq!(response.status, StatusCode::FOUND);

    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("sso_session=;"));
    assert!(cookies[0].contains("Max-Age=0"));

    let location = response
        .location()
        .ok_or_else(|| anyhow::anyhow!("no Location"))?;
    assert!(location.starts_with("https://sp.example.com/saml/slo?SAMLResponse="));

    let decoded = HttpRedirectBinding::decode_url(location)?;
    assert_eq!(decoded.message_type, SamlMessageType::Response);
    assert_eq!(decoded.relay_state.as_deref(), Some("r2"));
    assert!(decoded.xml.contains(r#"InResponseTo="_logout-1""#));
    assert!(decoded.xml.contains("ada@example.com"));
    assert!(!decoded.xml.contains("SessionIndex"));
    verifier()?.verify(&decoded.xml)?;

    Ok(())
}

/// A SAMLRequest that is not DEFLATE falls back to the static logout page.
#[tokio::test]
async fn test_logout_with_malformed_request_falls_back() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let response = env
        .get("/saml/slo?SAMLRequest=PHNhbWxwOkxvZ291dFJlcXVlc3Q%2B", Some("ada"))
        .await?;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.location(),
        Some("https://sp.example.com/logged-out?fallback=true")
    );
    assert_eq!(response.set_cookies().len(), 1);

    Ok(())
}

/// A logout target outside the configured host is never followed.
#[tokio::test]
async fn test_logout_host_mismatch_falls_back() -> anyhow::Result<()> {
    let mut config = ServerConfig::for_testing();
    config.sp_logout_host = Some("portal.example.org".to_string());
    let env = TestEnv::with(config, sso_integration_tests::IDP_KEY_PEM)?;

    let uri = format!(
        "/saml/slo?SAMLRequest={}",
        redirect_param(LOGOUT_REQUEST_NO_SESSION_INDEX)?
    );
    let response = env.get(&uri, Some("ada")).await?;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.location(),
        Some("https://sp.example.com/logged-out?fallback=true")
    );

    Ok(())
}

/// IdP-initiated logout redirects straight to the SP logout page.
#[tokio::test]
async fn test_idp_initiated_logout() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let response = env.get("/saml/slo", None).await?;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.location(),
        Some("https://sp.example.com/logged-out?idp_logout=true")
    );
    assert_eq!(response.set_cookies().len(), 1);

    Ok(())
}

/// In SAML logout mode the SP's LogoutResponse ends the exchange instead of
/// triggering another LogoutRequest.
#[tokio::test]
async fn test_idp_logout_request_round_trip() -> anyhow::Result<()> {
    let mut config = ServerConfig::for_testing();
    config.idp_logout_mode = IdpLogoutMode::SamlRequest;
    let env = TestEnv::with(config, sso_integration_tests::IDP_KEY_PEM)?;

    let started = env.get("/saml/slo", Some("ada")).await?;
    assert_eq!(started.status, StatusCode::FOUND);
    let location = started
        .location()
        .ok_or_else(|| anyhow::anyhow!("no Location"))?;
    let request = HttpRedirectBinding::decode_url(location)?;
    assert_eq!(request.message_type, SamlMessageType::Request);
    assert!(request.xml.contains(">ada@example.com</saml:NameID>"));

    let request_id = request
        .xml
        .split(r#" ID=""#)
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .ok_or_else(|| anyhow::anyhow!("LogoutRequest has no ID"))?;
    let reply = format!(
        r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_sp-reply-1" InResponseTo="{request_id}" Version="2.0" IssueInstant="2026-01-01T00:00:00Z"><saml:Issuer>https://sp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status></samlp:LogoutResponse>"#
    );

    let finished = env
        .get(
            &format!("/saml/slo?SAMLResponse={}", redirect_param(&reply)?),
            Some("ada"),
        )
        .await?;
    assert_eq!(finished.status, StatusCode::FOUND);
    assert_eq!(finished.location(), Some("https://sp.example.com/logged-out"));
    assert_eq!(finished.set_cookies().len(), 1);

    Ok(())
}

/// Health endpoint for load balancers.
#[tokio::test]
async fn test_health_endpoint() -> anyhow::Result<()> {
    let env = TestEnv::new()?;

    let response = env.get("/health", None).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "ok");

    Ok(())
}
