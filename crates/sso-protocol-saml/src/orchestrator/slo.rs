//! Single Logout flow state machine.

use std::marker::PhantomData;

use crate::bindings::{HttpRedirectBinding, SamlMessageType};
use crate::error::{SamlError, SamlResult};
use crate::types::ProtocolMessage;

use super::Orchestrator;

/// SLO flow states.
pub mod states {
    /// A LogoutRequest has been parsed.
    #[derive(Debug, Clone, Copy)]
    pub struct LogoutRequested;

    /// A signed LogoutResponse has been redirect-bound.
    #[derive(Debug, Clone, Copy)]
    pub struct LogoutResponseIssued;
}

/// SP-initiated logout context.
#[derive(Debug)]
pub struct SloFlow<S> {
    request: ProtocolMessage,
    location: Option<String>,
    _state: PhantomData<S>,
}

impl SloFlow<states::LogoutRequested> {
    /// Starts from a parsed LogoutRequest.
    #[must_use]
    pub fn new(request: ProtocolMessage) -> Self {
        Self {
            request,
            location: None,
            _state: PhantomData,
        }
    }

    /// The LogoutRequest.
    #[must_use]
    pub fn request(&self) -> &ProtocolMessage {
        &self.request
    }

    /// Builds, signs and redirect-binds the LogoutResponse.
    ///
    /// NameID and SessionIndex are echoed only when the request carried
    /// them.
    ///
    /// # Errors
    ///
    /// Signing and binding errors, or [`SamlError::RedirectTargetMismatch`]
    /// if the bound URL leaves the configured SP logout host.
    pub fn respond(
        self,
        orchestrator: &Orchestrator,
    ) -> SamlResult<SloFlow<states::LogoutResponseIssued>> {
        let slo_url = &orchestrator.service_provider().slo_url;
        let xml = orchestrator.builder().build_logout_response(
            &self.request.id,
            slo_url,
            self.request.name_id.as_deref(),
            self.request.session_index.as_deref(),
        );
        let signed = orchestrator.signer().sign(&xml)?;

        let location = HttpRedirectBinding::redirect_url(
            slo_url,
            SamlMessageType::Response,
            signed.as_str(),
            self.request.relay_state.as_deref(),
        )?;
        orchestrator.check_logout_target(&location)?;

        Ok(SloFlow {
            request: self.request,
            location: Some(location),
            _state: PhantomData,
        })
    }
}

impl SloFlow<states::LogoutResponseIssued> {
    /// Consumes the flow, returning the redirect location.
    #[must_use]
    pub fn into_location(self) -> String {
        self.location.unwrap_or_default()
    }
}

/// Verifies that `location` targets `expected_host`.
pub(super) fn check_host(location: &str, expected_host: Option<&str>) -> SamlResult<()> {
    let actual = url::Url::parse(location)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();
    let expected = expected_host.unwrap_or_default();

    if expected.is_empty() || actual != expected {
        return Err(SamlError::RedirectTargetMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
