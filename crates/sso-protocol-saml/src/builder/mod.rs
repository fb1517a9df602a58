//! SAML message construction.
//!
//! [`AssertionBuilder`] renders the three documents the IdP emits. Every
//! document declares `samlp` and `saml` on its root and carries a
//! `saml:Issuer` as the root's first child, which is where the signer
//! splices the enveloped signature. No XML declaration is emitted; the
//! canonical form drops it anyway.

mod logout;
mod response;

use chrono::{DateTime, Utc};

/// Timestamp format for `IssueInstant`, `NotBefore` and friends.
const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Builds Response, LogoutResponse and LogoutRequest XML.
#[derive(Debug, Clone)]
pub struct AssertionBuilder {
    issuer: String,
    audience: String,
}

impl AssertionBuilder {
    /// Creates a builder issuing as `idp_entity_id` to `sp_entity_id`.
    #[must_use]
    pub fn new(idp_entity_id: impl Into<String>, sp_entity_id: impl Into<String>) -> Self {
        Self {
            issuer: idp_entity_id.into(),
            audience: sp_entity_id.into(),
        }
    }

    /// The IdP entity ID written into every `Issuer`.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The SP entity ID written into `AudienceRestriction`.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    fn issuer_element(&self) -> String {
        format!("<saml:Issuer>{}</saml:Issuer>", xml_escape(&self.issuer))
    }
}

/// Generates a message ID: `_` followed by a UUIDv4.
#[must_use]
pub fn generate_id() -> String {
    format!("_{}", uuid::Uuid::new_v4())
}

/// Formats an instant as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format(INSTANT_FORMAT).to_string()
}

/// Escapes text and attribute values.
#[must_use]
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Opening tag of a protocol root element, without the closing `>`.
fn open_root(element: &str, id: &str, issued_at: DateTime<Utc>, destination: &str) -> String {
    format!(
        r#"<samlp:{element} xmlns:samlp="{samlp}" xmlns:saml="{saml}" ID="{id}" Version="2.0" IssueInstant="{instant}" Destination="{destination}""#,
        samlp = crate::types::SAMLP_NS,
        saml = crate::types::SAML_NS,
        id = xml_escape(id),
        instant = format_instant(issued_at),
        destination = xml_escape(destination),
    )
}

fn in_response_to_attr(in_response_to: Option<&str>) -> String {
    in_response_to
        .map(|id| format!(r#" InResponseTo="{}""#, xml_escape(id)))
        .unwrap_or_default()
}

fn success_status() -> String {
    format!(
        r#"<samlp:Status><samlp:StatusCode Value="{}"/></samlp:Status>"#,
        crate::types::status_codes::SUCCESS
    )
}
