//! Inbound protocol messages.

use serde::Serialize;

/// Which SAML request a message is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    /// `samlp:AuthnRequest`.
    AuthnRequest,
    /// `samlp:LogoutRequest`.
    LogoutRequest,
    /// `samlp:LogoutResponse`, the SP answering an IdP-initiated logout.
    LogoutResponse,
    /// Anything else, by local name.
    Other(String),
}

impl MessageKind {
    /// Classifies a root element local name.
    #[must_use]
    pub fn from_local_name(name: &str) -> Self {
        match name {
            "AuthnRequest" => Self::AuthnRequest,
            "LogoutRequest" => Self::LogoutRequest,
            "LogoutResponse" => Self::LogoutResponse,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The fields the IdP needs from an inbound request.
///
/// Only `id` is guaranteed; every other field may be absent and callers
/// degrade instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolMessage {
    /// Root element kind.
    pub kind: MessageKind,
    /// Request `ID`, echoed as `InResponseTo`.
    pub id: String,
    /// Issuer entity ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// NameID element content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<String>,
    /// NameID `Format` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_format: Option<String>,
    /// SessionIndex element content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,
    /// Root `Destination` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Requested ACS URL. Recorded only; responses go to the configured ACS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,
    /// RelayState that accompanied the message, untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,
}

impl ProtocolMessage {
    /// Returns true for a LogoutRequest.
    #[must_use]
    pub fn is_logout_request(&self) -> bool {
        self.kind == MessageKind::LogoutRequest
    }
}
