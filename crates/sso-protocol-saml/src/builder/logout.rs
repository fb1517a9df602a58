//! Logout message rendering.

use chrono::Utc;

use super::{generate_id, open_root, success_status, xml_escape, AssertionBuilder};
use crate::types::{logout_reasons, NameIdFormat};

impl AssertionBuilder {
    /// Renders a successful `samlp:LogoutResponse`.
    ///
    /// The NameID and SessionIndex of the request being answered are echoed
    /// inside `samlp:Extensions`, each only when supplied. Extensions only
    /// admits foreign namespaces, so both use the assertion prefix.
    #[must_use]
    pub fn build_logout_response(
        &self,
        in_response_to: &str,
        destination: &str,
        name_id: Option<&str>,
        session_index: Option<&str>,
    ) -> String {
        let mut xml = open_root("LogoutResponse", &generate_id(), Utc::now(), destination);
        xml.push_str(&format!(r#" InResponseTo="{}">"#, xml_escape(in_response_to)));
        xml.push_str(&self.issuer_element());

        if name_id.is_some() || session_index.is_some() {
            xml.push_str("<samlp:Extensions>");
            if let Some(name_id) = name_id {
                xml.push_str(&format!("<saml:NameID>{}</saml:NameID>", xml_escape(name_id)));
            }
            if let Some(index) = session_index {
                xml.push_str(&format!(
                    "<saml:SessionIndex>{}</saml:SessionIndex>",
                    xml_escape(index)
                ));
            }
            xml.push_str("</samlp:Extensions>");
        }

        xml.push_str(&success_status());
        xml.push_str("</samlp:LogoutResponse>");
        xml
    }

    /// Renders an IdP-initiated `samlp:LogoutRequest` for `name_id`.
    #[must_use]
    pub fn build_logout_request(
        &self,
        name_id: &str,
        name_id_format: NameIdFormat,
        destination: &str,
    ) -> String {
        let mut xml = open_root("LogoutRequest", &generate_id(), Utc::now(), destination);
        xml.push_str(&format!(r#" Reason="{}">"#, logout_reasons::USER));
        xml.push_str(&self.issuer_element());
        xml.push_str(&format!(
            r#"<saml:NameID Format="{}">{}</saml:NameID>"#,
            name_id_format.uri(),
            xml_escape(name_id)
        ));
        xml.push_str("</samlp:LogoutRequest>");
        xml
    }
}
