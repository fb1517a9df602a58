//! HTTP-POST Binding implementation.
//!
//! Responses are base64-encoded (no compression) into a hidden form field
//! that the browser submits to the SP on load.

use base64::Engine;

use crate::error::SamlResult;

use super::{normalize_base64, utf8, SamlMessageType};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes XML as a POST field value.
    #[must_use]
    pub fn encode(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }

    /// Decodes a POST field value back into XML.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::MalformedBinding`] if the value is not
    /// base64 of UTF-8 text.
    pub fn decode(value: &str) -> SamlResult<String> {
        let decoded = base64::engine::general_purpose::STANDARD.decode(normalize_base64(value))?;
        utf8(decoded)
    }

    /// Renders an auto-submitting form posting a SAML response to `destination`.
    ///
    /// The `RelayState` input is rendered only when `relay_state` is given.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::render_form(xml, destination, relay_state, SamlMessageType::Response)
    }

    fn render_form(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let encoded = Self::encode(xml);
        let param_name = message_type.form_param();

        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Signing you in</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            html_escape(destination),
            param_name,
            encoded,
            relay_state_input
        )
    }
}

/// Escapes HTML special characters.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(html: &'a str, name: &str) -> Option<&'a str> {
        let marker = format!("name=\"{name}\" value=\"");
        let start = html.find(&marker)? + marker.len();
        let end = html[start..].find('"')?;
        Some(&html[start..start + end])
    }

    #[test]
    fn form_posts_to_destination_with_relay_state() {
        let xml = r#"<samlp:Response ID="_r">test</samlp:Response>"#;
        let html = HttpPostBinding::encode_response(xml, "https://sp.example.com/acs?x=1&y=2", Some("r1"));

        assert!(html.contains(r#"action="https://sp.example.com/acs?x=1&amp;y=2""#));
        assert!(html.contains("document.forms[0].submit()"));
        assert_eq!(html.matches("name=\"RelayState\"").count(), 1);
        assert_eq!(field(&html, "RelayState"), Some("r1"));

        let encoded = field(&html, "SAMLResponse").unwrap();
        assert_eq!(HttpPostBinding::decode(encoded).unwrap(), xml);
    }

    #[test]
    fn form_without_relay_state() {
        let html = HttpPostBinding::encode_response("<samlp:Response/>", "https://sp.example.com", None);
        assert!(!html.contains("RelayState"));
    }

    #[test]
    fn relay_state_is_escaped() {
        let html = HttpPostBinding::encode_response(
            "<x/>",
            "https://sp.example.com",
            Some(r#""><script>alert(1)</script>"#),
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            HttpPostBinding::decode("!!not-base64!!"),
            Err(crate::SamlError::MalformedBinding(_))
        ));
    }
}
