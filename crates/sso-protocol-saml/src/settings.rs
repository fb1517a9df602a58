//! Plain settings the protocol engine is constructed from.
//!
//! Nothing here reads the environment; the server crate maps its own
//! configuration onto these structs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::signature::CanonicalizationMethod;
use crate::types::NameIdFormat;

/// How this IdP identifies itself and where it is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpSettings {
    /// Entity ID written into every `Issuer` and the metadata.
    pub entity_id: String,
    /// Public URL of the SSO endpoint.
    pub sso_url: String,
    /// Public URL of the SLO endpoint.
    pub slo_url: String,
}

impl IdpSettings {
    /// Derives endpoint URLs from a public base URL.
    #[must_use]
    pub fn from_base_url(entity_id: impl Into<String>, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            entity_id: entity_id.into(),
            sso_url: format!("{base}/saml/sso"),
            slo_url: format!("{base}/saml/slo"),
        }
    }
}

/// The single Service Provider this IdP serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProviderSettings {
    /// SP entity ID, used as the assertion audience.
    pub entity_id: String,
    /// Assertion Consumer Service URL; responses always go here.
    pub acs_url: String,
    /// SP single logout URL that receives LogoutResponse/LogoutRequest.
    pub slo_url: String,
    /// Static SP page used for direct and fallback logout redirects.
    pub logout_url: String,
    /// Host every logout redirect must target. Defaults to the host of
    /// `logout_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_host: Option<String>,
}

impl ServiceProviderSettings {
    /// The host logout redirects are checked against, lower-cased.
    #[must_use]
    pub fn expected_logout_host(&self) -> Option<String> {
        self.logout_host
            .as_deref()
            .map(str::to_string)
            .or_else(|| {
                url::Url::parse(&self.logout_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
            })
            .map(|h| h.to_ascii_lowercase())
    }
}

/// Behaviour of an IdP-initiated logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdpLogoutMode {
    /// Redirect straight to the SP logout page.
    #[default]
    Direct,
    /// Send a signed LogoutRequest to the SP SLO URL when the principal is
    /// known.
    #[serde(rename = "saml")]
    SamlRequest,
}

impl IdpLogoutMode {
    /// Parses a configuration value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "saml" | "saml-request" | "samlrequest" => Some(Self::SamlRequest),
            _ => None,
        }
    }
}

/// Knobs for the SSO and SLO flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSettings {
    /// Login page that receives unauthenticated browsers.
    pub login_url: String,
    /// Name of the local session cookie cleared on logout.
    pub session_cookie: String,
    /// Lifetime of an issued assertion.
    pub assertion_validity: Duration,
    /// NameID format of issued assertions.
    pub name_id_format: NameIdFormat,
    /// Canonicalization used when signing.
    pub canonicalization: CanonicalizationMethod,
    /// IdP-initiated logout behaviour.
    pub idp_logout_mode: IdpLogoutMode,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            login_url: "/login".to_string(),
            session_cookie: "sso_session".to_string(),
            assertion_validity: Duration::from_secs(300),
            name_id_format: NameIdFormat::default(),
            canonicalization: CanonicalizationMethod::default(),
            idp_logout_mode: IdpLogoutMode::default(),
        }
    }
}
