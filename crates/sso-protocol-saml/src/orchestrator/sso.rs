//! Single Sign-On flow state machine.
//!
//! Type-safe states for one SSO transaction. A response can only be issued
//! from [`states::Authenticated`], which can only be reached with a
//! principal in hand.

use std::marker::PhantomData;

use chrono::Utc;

use crate::bindings::HttpPostBinding;
use crate::error::SamlResult;
use crate::types::{IdentityAssertion, Principal, ProtocolMessage};

use super::{append_query, Orchestrator};

/// SSO flow states.
pub mod states {
    /// Flow created; nothing about the browser is known yet.
    #[derive(Debug, Clone, Copy)]
    pub struct Unauthenticated;

    /// Waiting on the local authenticator.
    #[derive(Debug, Clone, Copy)]
    pub struct Authenticating;

    /// A principal is known.
    #[derive(Debug, Clone, Copy)]
    pub struct Authenticated;

    /// A signed Response has been produced.
    #[derive(Debug, Clone, Copy)]
    pub struct ResponseIssued;
}

/// SSO flow context.
///
/// `request` is `None` for IdP-initiated SSO.
#[derive(Debug)]
pub struct SsoFlow<S> {
    request: Option<ProtocolMessage>,
    raw_request: Option<String>,
    principal: Option<Principal>,
    response_id: Option<String>,
    form: Option<String>,
    _state: PhantomData<S>,
}

impl SsoFlow<states::Unauthenticated> {
    /// Starts a flow for a parsed AuthnRequest.
    ///
    /// `raw_request` is the `SAMLRequest` value as received; it is handed to
    /// the login page unchanged.
    #[must_use]
    pub fn sp_initiated(request: ProtocolMessage, raw_request: impl Into<String>) -> Self {
        Self {
            request: Some(request),
            raw_request: Some(raw_request.into()),
            principal: None,
            response_id: None,
            form: None,
            _state: PhantomData,
        }
    }

    /// Starts an unsolicited flow.
    #[must_use]
    pub fn idp_initiated() -> Self {
        Self {
            request: None,
            raw_request: None,
            principal: None,
            response_id: None,
            form: None,
            _state: PhantomData,
        }
    }

    /// Hands the flow to the local authenticator.
    #[must_use]
    pub fn begin(self) -> SsoFlow<states::Authenticating> {
        SsoFlow {
            request: self.request,
            raw_request: self.raw_request,
            principal: None,
            response_id: None,
            form: None,
            _state: PhantomData,
        }
    }
}

impl<S> SsoFlow<S> {
    /// The AuthnRequest, if SP-initiated.
    #[must_use]
    pub fn request(&self) -> Option<&ProtocolMessage> {
        self.request.as_ref()
    }

    fn relay_state(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.relay_state.as_deref())
    }
}

impl SsoFlow<states::Authenticating> {
    /// Location of the login page for a browser with no session.
    ///
    /// `SAMLRequest` and `RelayState` are passed on so the browser can
    /// re-enter the SSO endpoint after signing in.
    #[must_use]
    pub fn login_location(&self, login_url: &str) -> String {
        let mut params = Vec::new();
        if let Some(raw) = &self.raw_request {
            params.push(("SAMLRequest", raw.as_str()));
        }
        if let Some(rs) = self.relay_state() {
            params.push(("RelayState", rs));
        }
        append_query(login_url, &params)
    }

    /// The authenticator produced a principal.
    #[must_use]
    pub fn authenticated(self, principal: Principal) -> SsoFlow<states::Authenticated> {
        SsoFlow {
            request: self.request,
            raw_request: self.raw_request,
            principal: Some(principal),
            response_id: None,
            form: None,
            _state: PhantomData,
        }
    }
}

impl SsoFlow<states::Authenticated> {
    /// Builds, signs and POST-binds the Response to the configured ACS.
    ///
    /// # Errors
    ///
    /// Returns the signer's error; nothing is emitted on failure.
    pub fn issue(self, orchestrator: &Orchestrator) -> SamlResult<SsoFlow<states::ResponseIssued>> {
        let Some(principal) = self.principal.as_ref() else {
            return Err(crate::SamlError::Internal(
                "authenticated flow without principal".to_string(),
            ));
        };

        let flow = orchestrator.flow_settings();
        let validity = chrono::Duration::from_std(flow.assertion_validity)
            .map_err(|e| crate::SamlError::Internal(format!("assertion validity out of range: {e}")))?;
        let assertion =
            IdentityAssertion::for_principal(principal, flow.name_id_format, validity, Utc::now());

        let acs_url = &orchestrator.service_provider().acs_url;
        let in_response_to = self.request.as_ref().map(|r| r.id.as_str());
        let response_xml = orchestrator
            .builder()
            .build_response(&assertion, in_response_to, acs_url);
        let response_id = crate::signature::root_id(&response_xml)?;
        let signed = orchestrator.signer().sign(&response_xml)?;

        let form = HttpPostBinding::encode_response(signed.as_str(), acs_url, self.relay_state());

        Ok(SsoFlow {
            request: self.request,
            raw_request: self.raw_request,
            principal: self.principal,
            response_id,
            form: Some(form),
            _state: PhantomData,
        })
    }
}

impl SsoFlow<states::ResponseIssued> {
    /// `ID` of the issued Response.
    #[must_use]
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    /// The principal the Response was issued for.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Consumes the flow, returning the auto-submitting form.
    #[must_use]
    pub fn into_form(self) -> String {
        self.form.unwrap_or_default()
    }
}
