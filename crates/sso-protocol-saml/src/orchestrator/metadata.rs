//! IdP metadata document.

use crate::builder::xml_escape;
use crate::settings::IdpSettings;
use crate::types::{NameIdFormat, BINDING_HTTP_REDIRECT, MD_NS, SAMLP_NS, XMLDSIG_NS};

/// Renders the EntityDescriptor for this IdP.
///
/// Both services are advertised on HTTP-Redirect; every supported NameID
/// format is listed.
pub(crate) fn render_metadata(idp: &IdpSettings, certificate_b64: &str) -> String {
    let name_id_formats: String = NameIdFormat::ALL
        .iter()
        .map(|f| format!("\n        <md:NameIDFormat>{}</md:NameIDFormat>", f.uri()))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="{md}" entityID="{entity_id}">
    <md:IDPSSODescriptor WantAuthnRequestsSigned="false" protocolSupportEnumeration="{samlp}">
        <md:KeyDescriptor use="signing">
            <ds:KeyInfo xmlns:ds="{ds}">
                <ds:X509Data>
                    <ds:X509Certificate>{certificate_b64}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>
        <md:SingleLogoutService Binding="{redirect}" Location="{slo_url}"/>{name_id_formats}
        <md:SingleSignOnService Binding="{redirect}" Location="{sso_url}"/>
    </md:IDPSSODescriptor>
</md:EntityDescriptor>
"#,
        md = MD_NS,
        samlp = SAMLP_NS,
        ds = XMLDSIG_NS,
        entity_id = xml_escape(&idp.entity_id),
        redirect = BINDING_HTTP_REDIRECT,
        slo_url = xml_escape(&idp.slo_url),
        sso_url = xml_escape(&idp.sso_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_contains_required_elements() {
        let idp = IdpSettings::from_base_url("https://idp.example.com", "https://idp.example.com");
        let metadata = render_metadata(&idp, "MIIC");

        assert!(metadata.contains(r#"entityID="https://idp.example.com""#));
        assert!(metadata.contains("<ds:X509Certificate>MIIC</ds:X509Certificate>"));
        assert!(metadata.contains(r#"Location="https://idp.example.com/saml/sso""#));
        assert!(metadata.contains(r#"Location="https://idp.example.com/saml/slo""#));
        assert_eq!(metadata.matches("<md:NameIDFormat>").count(), NameIdFormat::ALL.len());
        assert!(!metadata.contains("HTTP-POST"));
        assert_eq!(
            metadata.matches(&format!(r#"Binding="{BINDING_HTTP_REDIRECT}""#)).count(),
            2
        );
    }

    #[test]
    fn metadata_is_well_formed() {
        let idp = IdpSettings::from_base_url("urn:idp&co", "https://idp.example.com");
        let metadata = render_metadata(&idp, "MIIC");
        use crate::signature::{Canonicalizer, ExclusiveC14n};
        assert!(ExclusiveC14n.canonicalize(&metadata).is_ok());
    }
}
