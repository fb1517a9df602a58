//! SSO and SLO orchestration.
//!
//! [`Orchestrator`] composes the bindings, parser, builder and signer into
//! the two browser flows. It knows which message goes where but returns
//! plain outcomes; turning them into HTTP responses is left to the
//! endpoints.

mod metadata;
mod slo;
mod sso;

pub use slo::{states as slo_states, SloFlow};
pub use sso::{states as sso_states, SsoFlow};

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::Engine;
use tracing::{debug, info, warn};

use crate::bindings::{HttpRedirectBinding, InboundBinding, SamlMessageType};
use crate::builder::AssertionBuilder;
use crate::error::{SamlError, SamlResult};
use crate::parser::RequestParser;
use crate::settings::{FlowSettings, IdpLogoutMode, IdpSettings, ServiceProviderSettings};
use crate::signature::{SigningMaterial, XmlSigner};
use crate::types::{MessageKind, Principal};

/// Local authenticator collaborator.
///
/// Looks at the browser's request and reports who is signed in, if anyone.
/// Credentials are never verified here.
#[async_trait]
pub trait PrincipalResolver: Send + Sync + 'static {
    /// Resolves the principal for a request.
    async fn resolve(&self, headers: &HeaderMap) -> SamlResult<Option<Principal>>;
}

/// Result of an SSO request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsoOutcome {
    /// No session; send the browser to the login page.
    Login {
        /// Login page URL with the original parameters attached.
        location: String,
    },
    /// Auto-submitting form carrying the signed Response.
    Respond {
        /// HTML page.
        form: String,
        /// `ID` of the Response.
        response_id: Option<String>,
    },
}

/// A redirect-bound message received at the SLO endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutMessage<'a> {
    /// `SAMLRequest`: the SP starts a logout.
    Request(&'a str),
    /// `SAMLResponse`: the SP answers a LogoutRequest this IdP sent.
    Response(&'a str),
}

/// Which logout branch produced a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SloBranch {
    /// Signed LogoutResponse to the SP SLO URL.
    LogoutResponse,
    /// The SP-initiated path failed; static SP logout page.
    Fallback,
    /// IdP-initiated; static SP logout page.
    IdpDirect,
    /// IdP-initiated; signed LogoutRequest to the SP SLO URL.
    IdpLogoutRequest,
    /// The SP answered the IdP's LogoutRequest; static SP logout page.
    LogoutComplete,
}

/// Result of an SLO request. Always a redirect, always clearing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SloOutcome {
    /// Redirect target.
    pub location: String,
    /// Branch taken.
    pub branch: SloBranch,
    /// `Set-Cookie` value expiring the local session.
    pub clear_cookie: String,
}

/// The IdP protocol engine.
///
/// Immutable after construction and shared behind an `Arc`; reloading key
/// material means building a new orchestrator.
#[derive(Debug)]
pub struct Orchestrator {
    idp: IdpSettings,
    sp: ServiceProviderSettings,
    flow: FlowSettings,
    builder: AssertionBuilder,
    signer: XmlSigner,
    expected_logout_host: Option<String>,
    metadata: String,
}

impl Orchestrator {
    /// Creates the engine and renders the metadata document.
    ///
    /// The metadata advertises `metadata_certificate` when given, otherwise
    /// the signing certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidKeyMaterial`] if there is no certificate
    /// to advertise.
    pub fn new(
        idp: IdpSettings,
        sp: ServiceProviderSettings,
        flow: FlowSettings,
        material: Arc<SigningMaterial>,
        metadata_certificate: Option<Vec<u8>>,
    ) -> SamlResult<Self> {
        let certificate_der = metadata_certificate
            .or_else(|| material.certificate_der().map(<[u8]>::to_vec))
            .ok_or_else(|| {
                SamlError::InvalidKeyMaterial("no certificate to publish in metadata".to_string())
            })?;
        let certificate_b64 = base64::engine::general_purpose::STANDARD.encode(certificate_der);
        let metadata = metadata::render_metadata(&idp, &certificate_b64);

        let builder = AssertionBuilder::new(&idp.entity_id, &sp.entity_id);
        let signer =
            XmlSigner::new(material).with_canonicalizer(flow.canonicalization.canonicalizer());
        let expected_logout_host = sp.expected_logout_host();

        Ok(Self {
            idp,
            sp,
            flow,
            builder,
            signer,
            expected_logout_host,
            metadata,
        })
    }

    /// IdP settings.
    #[must_use]
    pub fn idp_settings(&self) -> &IdpSettings {
        &self.idp
    }

    /// SP settings.
    #[must_use]
    pub fn service_provider(&self) -> &ServiceProviderSettings {
        &self.sp
    }

    /// Flow settings.
    #[must_use]
    pub fn flow_settings(&self) -> &FlowSettings {
        &self.flow
    }

    /// The message builder.
    #[must_use]
    pub fn builder(&self) -> &AssertionBuilder {
        &self.builder
    }

    /// The document signer.
    #[must_use]
    pub fn signer(&self) -> &XmlSigner {
        &self.signer
    }

    /// Metadata rendered at construction.
    #[must_use]
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// `Set-Cookie` value that expires the local session cookie.
    #[must_use]
    pub fn clear_session_cookie(&self) -> String {
        format!(
            "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Lax",
            self.flow.session_cookie
        )
    }

    /// Handles a browser arriving at the SSO endpoint.
    ///
    /// With a `SAMLRequest` the flow is SP-initiated and the Response answers
    /// it; without one the Response is unsolicited and carries no
    /// `RelayState`.
    ///
    /// # Errors
    ///
    /// Binding and parse errors for a bad request; key and signing errors
    /// when the Response cannot be signed. Nothing is emitted on error.
    pub async fn single_sign_on<R: PrincipalResolver + ?Sized>(
        &self,
        resolver: &R,
        headers: &HeaderMap,
        saml_request: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<SsoOutcome> {
        let flow = match saml_request {
            Some(raw) => {
                let request = RequestParser::parse(InboundBinding::Redirect, raw, relay_state)?;
                if request.kind != MessageKind::AuthnRequest {
                    return Err(SamlError::InvalidRequest(format!(
                        "{:?} sent to the SSO endpoint",
                        request.kind
                    )));
                }
                if let Some(acs) = request.assertion_consumer_service_url.as_deref() {
                    if acs != self.sp.acs_url {
                        warn!(
                            requested = acs,
                            configured = %self.sp.acs_url,
                            "Ignoring AssertionConsumerServiceURL from request"
                        );
                    }
                }
                info!(request_id = %request.id, issuer = ?request.issuer, "Received AuthnRequest");
                SsoFlow::sp_initiated(request, raw)
            }
            None => {
                if relay_state.is_some() {
                    debug!("Dropping RelayState without SAMLRequest");
                }
                info!("Starting IdP-initiated SSO");
                SsoFlow::idp_initiated()
            }
        };

        let flow = flow.begin();
        let Some(principal) = resolver.resolve(headers).await? else {
            debug!("No local session, redirecting to login");
            return Ok(SsoOutcome::Login {
                location: flow.login_location(&self.flow.login_url),
            });
        };

        let issued = flow.authenticated(principal).issue(self)?;
        info!(
            response_id = ?issued.response_id(),
            in_response_to = ?issued.request().map(|r| r.id.as_str()),
            acs = %self.sp.acs_url,
            "Issued signed SAML Response"
        );

        let response_id = issued.response_id().map(str::to_string);
        Ok(SsoOutcome::Respond {
            form: issued.into_form(),
            response_id,
        })
    }

    /// Handles a browser arriving at the SLO endpoint.
    ///
    /// Never fails: every error on the SP-initiated path ends in the static
    /// fallback redirect. A LogoutResponse ends the IdP-initiated exchange
    /// and never starts another one.
    pub async fn single_logout<R: PrincipalResolver + ?Sized>(
        &self,
        resolver: &R,
        headers: &HeaderMap,
        message: Option<LogoutMessage<'_>>,
        relay_state: Option<&str>,
    ) -> SloOutcome {
        let clear_cookie = self.clear_session_cookie();

        let (location, branch) = match message {
            Some(LogoutMessage::Request(raw)) => match self.sp_initiated_logout(raw, relay_state) {
                Ok(location) => (location, SloBranch::LogoutResponse),
                Err(e) => {
                    warn!(error = %e, "SP-initiated logout failed, using fallback redirect");
                    self.fallback_logout()
                }
            },
            Some(LogoutMessage::Response(raw)) => match Self::logout_response_received(raw) {
                Ok(()) => (self.sp.logout_url.clone(), SloBranch::LogoutComplete),
                Err(e) => {
                    warn!(error = %e, "Unusable LogoutResponse, using fallback redirect");
                    self.fallback_logout()
                }
            },
            None => self.idp_initiated_logout(resolver, headers).await,
        };

        info!(branch = ?branch, "Completed logout");
        SloOutcome {
            location,
            branch,
            clear_cookie,
        }
    }

    fn fallback_logout(&self) -> (String, SloBranch) {
        (
            append_query(&self.sp.logout_url, &[("fallback", "true")]),
            SloBranch::Fallback,
        )
    }

    fn sp_initiated_logout(&self, raw: &str, relay_state: Option<&str>) -> SamlResult<String> {
        let request = RequestParser::parse(InboundBinding::Redirect, raw, relay_state)?;
        if request.kind != MessageKind::LogoutRequest {
            return Err(SamlError::InvalidRequest(format!(
                "{:?} sent as SAMLRequest to the SLO endpoint",
                request.kind
            )));
        }
        info!(
            request_id = %request.id,
            has_name_id = request.name_id.is_some(),
            has_session_index = request.session_index.is_some(),
            "Received LogoutRequest"
        );

        Ok(SloFlow::new(request).respond(self)?.into_location())
    }

    fn logout_response_received(raw: &str) -> SamlResult<()> {
        let response = RequestParser::parse(InboundBinding::Redirect, raw, None)?;
        if response.kind != MessageKind::LogoutResponse {
            return Err(SamlError::InvalidRequest(format!(
                "{:?} sent as SAMLResponse to the SLO endpoint",
                response.kind
            )));
        }
        info!(
            response_id = %response.id,
            issuer = ?response.issuer,
            "Received LogoutResponse"
        );
        Ok(())
    }

    async fn idp_initiated_logout<R: PrincipalResolver + ?Sized>(
        &self,
        resolver: &R,
        headers: &HeaderMap,
    ) -> (String, SloBranch) {
        if self.flow.idp_logout_mode == IdpLogoutMode::SamlRequest {
            let principal = match resolver.resolve(headers).await {
                Ok(principal) => principal,
                Err(e) => {
                    warn!(error = %e, "Principal lookup failed during logout");
                    None
                }
            };

            if let Some(principal) = principal {
                match self.idp_logout_request(&principal) {
                    Ok(location) => return (location, SloBranch::IdpLogoutRequest),
                    Err(e) => warn!(error = %e, "Cannot send LogoutRequest, redirecting directly"),
                }
            }
        }

        (
            append_query(&self.sp.logout_url, &[("idp_logout", "true")]),
            SloBranch::IdpDirect,
        )
    }

    fn idp_logout_request(&self, principal: &Principal) -> SamlResult<String> {
        let format = self.flow.name_id_format;
        let xml = self.builder.build_logout_request(
            principal.name_id_for(format),
            format,
            &self.sp.slo_url,
        );
        let signed = self.signer.sign(&xml)?;
        let location = HttpRedirectBinding::redirect_url(
            &self.sp.slo_url,
            SamlMessageType::Request,
            signed.as_str(),
            None,
        )?;
        self.check_logout_target(&location)?;
        Ok(location)
    }

    /// Fails unless `location` targets the configured SP logout host.
    pub(crate) fn check_logout_target(&self, location: &str) -> SamlResult<()> {
        slo::check_host(location, self.expected_logout_host.as_deref())
    }
}

/// Appends URL-escaped query parameters to `base`.
pub(crate) fn append_query(base: &str, params: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        url.push(separator);
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
        separator = '&';
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::HttpRedirectBinding;
    use crate::signature::XmlSignatureVerifier;
    use crate::types::NameIdFormat;

    const KEY_PEM: &str = include_str!("../../../../tests/fixtures/idp_key.pem");
    const CERT_PEM: &str = include_str!("../../../../tests/fixtures/idp_cert.pem");
    const OTHER_KEY_PEM: &str = include_str!("../../../../tests/fixtures/other_key.pem");

    struct Fixed(Option<Principal>);

    #[async_trait]
    impl PrincipalResolver for Fixed {
        async fn resolve(&self, _headers: &HeaderMap) -> SamlResult<Option<Principal>> {
            Ok(self.0.clone())
        }
    }

    fn signed_in() -> Fixed {
        Fixed(Some(Principal::new("u-1").with_email("ada@example.com")))
    }

    fn orchestrator_with(key_pem: &str, flow: FlowSettings) -> Orchestrator {
        let material = SigningMaterial::from_pem(key_pem, Some(CERT_PEM)).unwrap();
        Orchestrator::new(
            IdpSettings::from_base_url("https://idp.example.com", "https://idp.example.com"),
            ServiceProviderSettings {
                entity_id: "https://sp.example.com".to_string(),
                acs_url: "https://sp.example.com/acs".to_string(),
                slo_url: "https://sp.example.com/slo".to_string(),
                logout_url: "https://sp.example.com/logged-out".to_string(),
                logout_host: None,
            },
            flow,
            Arc::new(material),
            None,
        )
        .unwrap()
    }

    fn orchestrator() -> Orchestrator {
        orchestrator_with(KEY_PEM, FlowSettings::default())
    }

    fn encoded(xml: &str) -> String {
        let escaped = HttpRedirectBinding::encode(xml).unwrap();
        urlencoding::decode(&escaped).unwrap().into_owned()
    }

    fn authn_request() -> String {
        encoded(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_req-1" Version="2.0" AssertionConsumerServiceURL="https://elsewhere.example.net/acs"><saml:Issuer>https://sp.example.com</saml:Issuer></samlp:AuthnRequest>"#,
        )
    }

    fn form_field(form: &str, name: &str) -> Option<String> {
        let marker = format!(r#"name="{name}" value=""#);
        let start = form.find(&marker)? + marker.len();
        let len = form[start..].find('"')?;
        Some(form[start..start + len].to_string())
    }

    #[tokio::test]
    async fn sp_initiated_sso_answers_request() {
        let engine = orchestrator();
        let outcome = engine
            .single_sign_on(&signed_in(), &HeaderMap::new(), Some(&authn_request()), Some("r1"))
            .await
            .unwrap();

        let SsoOutcome::Respond { form, response_id } = outcome else {
            panic!("expected a response form");
        };
        assert!(response_id.is_some());
        assert!(form.contains(r#"action="https://sp.example.com/acs""#));
        assert_eq!(form.matches(r#"name="RelayState""#).count(), 1);
        assert_eq!(form_field(&form, "RelayState").as_deref(), Some("r1"));

        let response = crate::bindings::HttpPostBinding::decode(
            &form_field(&form, "SAMLResponse").unwrap(),
        )
        .unwrap();
        assert!(response.contains(r#"InResponseTo="_req-1""#));
        XmlSignatureVerifier::from_pem(&[CERT_PEM])
            .unwrap()
            .verify(&response)
            .unwrap();
    }

    #[tokio::test]
    async fn idp_initiated_sso_has_no_relay_state() {
        let outcome = orchestrator()
            .single_sign_on(&signed_in(), &HeaderMap::new(), None, Some("ignored"))
            .await
            .unwrap();

        let SsoOutcome::Respond { form, .. } = outcome else {
            panic!("expected a response form");
        };
        assert!(!form.contains("RelayState"));
        let response =
            crate::bindings::HttpPostBinding::decode(&form_field(&form, "SAMLResponse").unwrap())
                .unwrap();
        assert!(!response.contains("InResponseTo"));
    }

    #[tokio::test]
    async fn no_session_redirects_to_login_with_original_parameters() {
        let raw = authn_request();
        let outcome = orchestrator()
            .single_sign_on(&Fixed(None), &HeaderMap::new(), Some(&raw), Some("r 1"))
            .await
            .unwrap();

        let SsoOutcome::Login { location } = outcome else {
            panic!("expected a login redirect");
        };
        let url = url::Url::parse(&format!("https://idp.example.com{location}")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("SAMLRequest".to_string(), raw),
                ("RelayState".to_string(), "r 1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_sso_request_is_client_error() {
        let err = orchestrator()
            .single_sign_on(&signed_in(), &HeaderMap::new(), Some("bm90IGRlZmxhdGU="), None)
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn bad_key_emits_nothing() {
        let err = orchestrator_with(OTHER_KEY_PEM, FlowSettings::default())
            .single_sign_on(&signed_in(), &HeaderMap::new(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::InvalidKeyMaterial(_)));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn sp_initiated_logout_without_session_index() {
        let raw = encoded(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_lo-1" Version="2.0"><saml:Issuer>https://sp.example.com</saml:Issuer><saml:NameID>ada@example.com</saml:NameID></samlp:LogoutRequest>"#,
        );
        let outcome = orchestrator()
            .single_logout(
                &signed_in(),
                &HeaderMap::new(),
                Some(LogoutMessage::Request(&raw)),
                Some("r2"),
            )
            .await;

        assert_eq!(outcome.branch, SloBranch::LogoutResponse);
        assert!(outcome.clear_cookie.starts_with("sso_session=;"));
        let decoded = HttpRedirectBinding::decode_url(&outcome.location).unwrap();
        assert_eq!(decoded.message_type, SamlMessageType::Response);
        assert_eq!(decoded.relay_state.as_deref(), Some("r2"));
        assert!(decoded.xml.contains(r#"InResponseTo="_lo-1""#));
        assert!(decoded.xml.contains("ada@example.com"));
        assert!(!decoded.xml.contains("SessionIndex"));
        XmlSignatureVerifier::new(Vec::new()).verify(&decoded.xml).unwrap();
    }

    #[tokio::test]
    async fn undecodable_logout_falls_back() {
        let outcome = orchestrator()
            .single_logout(
                &signed_in(),
                &HeaderMap::new(),
                Some(LogoutMessage::Request("%%%not-base64")),
                None,
            )
            .await;
        assert_eq!(outcome.branch, SloBranch::Fallback);
        assert_eq!(outcome.location, "https://sp.example.com/logged-out?fallback=true");
    }

    #[tokio::test]
    async fn logout_to_foreign_host_falls_back() {
        let mut engine = orchestrator();
        engine.expected_logout_host = Some("other.example.com".to_string());
        let raw = encoded(
            r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_lo-2"/>"#,
        );
        let outcome = engine
            .single_logout(
                &signed_in(),
                &HeaderMap::new(),
                Some(LogoutMessage::Request(&raw)),
                None,
            )
            .await;
        assert_eq!(outcome.branch, SloBranch::Fallback);
    }

    #[tokio::test]
    async fn idp_initiated_logout_modes() {
        let direct = orchestrator()
            .single_logout(&signed_in(), &HeaderMap::new(), None, None)
            .await;
        assert_eq!(direct.branch, SloBranch::IdpDirect);
        assert_eq!(direct.location, "https://sp.example.com/logged-out?idp_logout=true");

        let saml = orchestrator_with(
            KEY_PEM,
            FlowSettings {
                idp_logout_mode: IdpLogoutMode::SamlRequest,
                name_id_format: NameIdFormat::Email,
                ..FlowSettings::default()
            },
        );
        let outcome = saml.single_logout(&signed_in(), &HeaderMap::new(), None, None).await;
        assert_eq!(outcome.branch, SloBranch::IdpLogoutRequest);
        let decoded = HttpRedirectBinding::decode_url(&outcome.location).unwrap();
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert!(decoded.xml.contains(">ada@example.com</saml:NameID>"));

        let anonymous = saml.single_logout(&Fixed(None), &HeaderMap::new(), None, None).await;
        assert_eq!(anonymous.branch, SloBranch::IdpDirect);
    }

    #[tokio::test]
    async fn logout_response_ends_idp_initiated_logout() {
        let saml = orchestrator_with(
            KEY_PEM,
            FlowSettings {
                idp_logout_mode: IdpLogoutMode::SamlRequest,
                ..FlowSettings::default()
            },
        );
        let started = saml.single_logout(&signed_in(), &HeaderMap::new(), None, None).await;
        assert_eq!(started.branch, SloBranch::IdpLogoutRequest);

        let reply = encoded(
            r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_sp-lr-1" InResponseTo="_x" Version="2.0"><saml:Issuer>https://sp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status></samlp:LogoutResponse>"#,
        );
        let finished = saml
            .single_logout(
                &signed_in(),
                &HeaderMap::new(),
                Some(LogoutMessage::Response(&reply)),
                None,
            )
            .await;
        assert_eq!(finished.branch, SloBranch::LogoutComplete);
        assert_eq!(finished.location, "https://sp.example.com/logged-out");

        let garbage = saml
            .single_logout(
                &signed_in(),
                &HeaderMap::new(),
                Some(LogoutMessage::Response("%%%")),
                None,
            )
            .await;
        assert_eq!(garbage.branch, SloBranch::Fallback);
    }

    #[tokio::test]
    async fn sso_accepts_only_authn_requests() {
        for root in ["Response", "ArtifactResolve", "LogoutResponse"] {
            let raw = encoded(&format!(
                r#"<samlp:{root} xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_other-1" Version="2.0"/>"#
            ));
            let err = orchestrator()
                .single_sign_on(&signed_in(), &HeaderMap::new(), Some(&raw), None)
                .await
                .unwrap_err();
            assert!(matches!(err, SamlError::InvalidRequest(_)), "{root}");
        }
    }

    #[test]
    fn metadata_uses_signing_certificate_by_default() {
        let engine = orchestrator();
        let cert_b64 = engine.signer().material().certificate_base64().unwrap();
        assert!(engine.metadata().contains(&cert_b64));
        assert_eq!(engine.metadata(), orchestrator().metadata());
    }

    #[test]
    fn query_parameters_are_escaped() {
        assert_eq!(
            append_query("https://a.example/x?y=1", &[("k", "a b&c")]),
            "https://a.example/x?y=1&k=a%20b%26c"
        );
    }
}
