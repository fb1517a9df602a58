//! SAML bindings implementation.
//!
//! This module implements the two SAML 2.0 bindings the IdP speaks:
//!
//! - **HTTP-Redirect Binding** - inbound requests and outbound logout
//!   messages; raw DEFLATE, base64, URL escaping
//! - **HTTP-POST Binding** - outbound responses; base64 inside an
//!   auto-submitting HTML form
//!
//! # Usage
//!
//! ```rust,ignore
//! use sso_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};
//!
//! let xml = HttpRedirectBinding::decode(&query.saml_request)?;
//! let url = HttpRedirectBinding::redirect_url(
//!     "https://sp.example.com/slo",
//!     SamlMessageType::Response,
//!     &logout_response_xml,
//!     relay_state.as_deref(),
//! )?;
//! let html = HttpPostBinding::encode_response(&response_xml, acs_url, relay_state.as_deref());
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

/// Which side of an exchange a bound message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// AuthnRequest or LogoutRequest.
    Request,
    /// Response or LogoutResponse.
    Response,
}

impl SamlMessageType {
    /// Returns the form/query parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// A message recovered from a full redirect URL.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// Which parameter carried it.
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
}

/// Inbound binding a raw parameter arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundBinding {
    /// Query parameter of a GET (deflated).
    Redirect,
    /// Form field of a POST (not deflated).
    Post,
}

impl InboundBinding {
    /// Undoes the binding envelope and returns the XML text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::MalformedBinding`] if any layer fails.
    pub fn decode(self, raw: &str) -> crate::SamlResult<String> {
        match self {
            Self::Redirect => HttpRedirectBinding::decode(raw),
            Self::Post => HttpPostBinding::decode(raw),
        }
    }
}

/// Normalizes a base64 parameter as received from a browser.
///
/// Form decoding turns an unescaped `+` into a space and some clients wrap
/// long values, so spaces map back to `+` and line breaks are dropped.
fn normalize_base64(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .map(|c| if c == ' ' { '+' } else { c })
        .collect()
}

fn utf8(bytes: Vec<u8>) -> crate::SamlResult<String> {
    let xml = String::from_utf8(bytes)
        .map_err(|e| crate::SamlError::MalformedBinding(format!("invalid UTF-8 in message: {e}")))?;
    if xml.trim().is_empty() {
        return Err(crate::SamlError::MalformedBinding(
            "message decoded to an empty document".to_string(),
        ));
    }
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_restores_plus() {
        assert_eq!(normalize_base64("ab c+d\r\n=="), "ab+c+d==");
    }

    #[test]
    fn inbound_dispatch() {
        let encoded = HttpRedirectBinding::encode("<a/>").unwrap();
        let raw = urlencoding::decode(&encoded).unwrap();
        assert_eq!(InboundBinding::Redirect.decode(&raw).unwrap(), "<a/>");
        assert_eq!(
            InboundBinding::Post
                .decode(&HttpPostBinding::encode("<a/>"))
                .unwrap(),
            "<a/>"
        );
    }

    #[test]
    fn empty_payload_is_malformed() {
        assert!(matches!(
            InboundBinding::Post.decode(""),
            Err(crate::SamlError::MalformedBinding(_))
        ));
    }
}
