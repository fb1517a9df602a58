//! `samlp:Response` rendering.

use std::fmt::Write;

use super::{generate_id, in_response_to_attr, success_status, xml_escape, AssertionBuilder};
use crate::types::{
    IdentityAssertion, ATTRNAME_FORMAT_BASIC, AUTHN_CONTEXT_PASSWORD_PROTECTED_TRANSPORT, CM_BEARER,
};

impl AssertionBuilder {
    /// Renders a successful `samlp:Response` carrying one assertion.
    ///
    /// `InResponseTo` is written on the Response and on the
    /// `SubjectConfirmationData` only when `in_response_to` is given, which
    /// makes an IdP-initiated response the same call with `None`.
    #[must_use]
    pub fn build_response(
        &self,
        assertion: &IdentityAssertion,
        in_response_to: Option<&str>,
        destination: &str,
    ) -> String {
        let issued_at = assertion.issued_at();
        let instant = super::format_instant(issued_at);
        let not_before = super::format_instant(assertion.valid_from());
        let not_on_or_after = super::format_instant(assertion.valid_until());
        let irt = in_response_to_attr(in_response_to);
        let issuer = self.issuer_element();

        let mut xml = super::open_root("Response", &generate_id(), issued_at, destination);
        xml.push_str(&irt);
        xml.push('>');
        xml.push_str(&issuer);
        xml.push_str(&success_status());

        let _ = write!(
            xml,
            r#"<saml:Assertion ID="{id}" Version="2.0" IssueInstant="{instant}">{issuer}"#,
            id = generate_id(),
        );

        let _ = write!(
            xml,
            concat!(
                r#"<saml:Subject><saml:NameID Format="{format}">{name_id}</saml:NameID>"#,
                r#"<saml:SubjectConfirmation Method="{method}">"#,
                r#"<saml:SubjectConfirmationData NotOnOrAfter="{not_on_or_after}" Recipient="{recipient}"{irt}/>"#,
                r#"</saml:SubjectConfirmation></saml:Subject>"#,
            ),
            format = assertion.name_id_format().uri(),
            name_id = xml_escape(assertion.subject_id()),
            method = CM_BEARER,
            recipient = xml_escape(destination),
            not_on_or_after = not_on_or_after,
            irt = irt,
        );

        let _ = write!(
            xml,
            concat!(
                r#"<saml:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_on_or_after}">"#,
                r#"<saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction>"#,
                r#"</saml:Conditions>"#,
            ),
            audience = xml_escape(self.audience()),
            not_before = not_before,
            not_on_or_after = not_on_or_after,
        );

        let _ = write!(
            xml,
            concat!(
                r#"<saml:AuthnStatement AuthnInstant="{instant}" SessionIndex="{session}">"#,
                r#"<saml:AuthnContext><saml:AuthnContextClassRef>{class}</saml:AuthnContextClassRef></saml:AuthnContext>"#,
                r#"</saml:AuthnStatement>"#,
            ),
            session = xml_escape(assertion.session_index()),
            class = AUTHN_CONTEXT_PASSWORD_PROTECTED_TRANSPORT,
            instant = instant,
        );

        if !assertion.attributes().is_empty() {
            xml.push_str("<saml:AttributeStatement>");
            for (name, value) in assertion.attributes() {
                let _ = write!(
                    xml,
                    r#"<saml:Attribute Name="{name}" NameFormat="{name_format}"><saml:AttributeValue>{value}</saml:AttributeValue></saml:Attribute>"#,
                    name = xml_escape(name),
                    name_format = ATTRNAME_FORMAT_BASIC,
                    value = xml_escape(value),
                );
            }
            xml.push_str("</saml:AttributeStatement>");
        }

        xml.push_str("</saml:Assertion></samlp:Response>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RequestParser;
    use crate::types::{MessageKind, NameIdFormat, Principal};
    use chrono::{Duration, TimeZone, Utc};

    fn assertion(principal: &Principal) -> IdentityAssertion {
        IdentityAssertion::for_principal(
            principal,
            NameIdFormat::Email,
            Duration::seconds(300),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    fn builder() -> AssertionBuilder {
        AssertionBuilder::new("https://idp.example.com", "https://sp.example.com")
    }

    #[test]
    fn response_structure() {
        let principal = Principal::new("u-1")
            .with_email("alice@example.com")
            .with_attribute("role", "admin");
        let xml = builder().build_response(&assertion(&principal), Some("_req-1"), "https://sp.example.com/acs");

        assert!(xml.starts_with("<samlp:Response "));
        assert!(!xml.contains("<?xml"));
        assert_eq!(xml.matches(r#"InResponseTo="_req-1""#).count(), 2);
        assert!(xml.contains(r#"Destination="https://sp.example.com/acs""#));
        assert!(xml.contains("urn:oasis:names:tc:SAML:2.0:status:Success"));
        assert!(xml.contains(
            r#"<saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">alice@example.com</saml:NameID>"#
        ));
        assert!(xml.contains(r#"NotBefore="2024-05-01T12:00:00Z" NotOnOrAfter="2024-05-01T12:05:00Z""#));
        assert!(xml.contains("<saml:Audience>https://sp.example.com</saml:Audience>"));
        assert!(xml.contains(&format!(
            "<saml:AuthnContextClassRef>{AUTHN_CONTEXT_PASSWORD_PROTECTED_TRANSPORT}</saml:AuthnContextClassRef>"
        )));
        assert!(xml.contains(r#"Method="urn:oasis:names:tc:SAML:2.0:cm:bearer""#));

        let email = xml.find(r#"Name="email""#).unwrap();
        let role = xml.find(r#"Name="role""#).unwrap();
        assert!(email < role);

        // Issuer is the first child, where the signature goes.
        let after_root = xml.find('>').unwrap() + 1;
        assert!(xml[after_root..].starts_with("<saml:Issuer>https://idp.example.com</saml:Issuer>"));

        // Well-formed and readable by the inbound parser.
        let parsed = RequestParser::parse_xml(&xml, None).unwrap();
        assert_eq!(parsed.kind, MessageKind::Other("Response".to_string()));
        assert_eq!(parsed.issuer.as_deref(), Some("https://idp.example.com"));
    }

    #[test]
    fn unsolicited_response_has_no_in_response_to() {
        let xml = builder().build_response(&assertion(&Principal::new("u-2")), None, "https://sp.example.com/acs");
        assert!(!xml.contains("InResponseTo"));
        assert!(!xml.contains("AttributeStatement"));
    }

    #[test]
    fn values_are_escaped() {
        let principal = Principal::new("u-3").with_attribute("note", "a < b & \"c\"");
        let xml = builder().build_response(&assertion(&principal), Some("_\"x"), "https://sp/acs?a=1&b=2");

        assert!(xml.contains("a &lt; b &amp; &quot;c&quot;"));
        assert!(xml.contains(r#"InResponseTo="_&quot;x""#));
        assert!(xml.contains(r#"Destination="https://sp/acs?a=1&amp;b=2""#));
    }
}
