//! Enveloped signature verification.
//!
//! Checks documents produced by [`super::XmlSigner`] or by any peer that
//! signs the whole document with an RSA enveloped signature.

use std::sync::Arc;

use base64::Engine;
use sso_crypto::{Certificate, HashAlgorithm, RsaAlgorithm};
use tracing::debug;

use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;

use super::signer::root_id;
use super::{Canonicalizer, ExclusiveC14n, XmlSignature};

/// XML signature verifier.
///
/// With no trusted certificates configured, the certificate embedded in
/// `KeyInfo` is used as-is.
#[derive(Debug, Clone)]
pub struct XmlSignatureVerifier {
    trusted_certificates: Vec<Vec<u8>>,
    canonicalizer: Arc<dyn Canonicalizer>,
}

impl XmlSignatureVerifier {
    /// Creates a verifier trusting the given DER certificates.
    #[must_use]
    pub fn new(trusted_certificates: Vec<Vec<u8>>) -> Self {
        Self {
            trusted_certificates,
            canonicalizer: Arc::new(ExclusiveC14n),
        }
    }

    /// Creates a verifier from PEM-encoded certificates.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidKeyMaterial`] if a PEM block is damaged.
    pub fn from_pem(certificates_pem: &[&str]) -> SamlResult<Self> {
        let certs = certificates_pem
            .iter()
            .map(|pem| Certificate::from_pem(pem).map(|c| c.der().to_vec()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(certs))
    }

    /// Replaces the canonicalizer.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Verifies the enveloped signature on `xml`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the signature is missing,
    /// references something other than the document element, or fails the
    /// digest or RSA check.
    pub fn verify(&self, xml: &str) -> SamlResult<XmlSignature> {
        let (sig_start, sig_end) = locate_element(xml, "Signature")
            .ok_or_else(|| invalid("no Signature element found"))?;
        let signature_xml = &xml[sig_start..sig_end];
        let signature = extract_signature(signature_xml)?;

        let expected_reference = root_id(xml)?.map(|id| format!("#{id}")).unwrap_or_default();
        if signature.reference_uri != expected_reference {
            return Err(invalid(format!(
                "reference '{}' does not point at the document element",
                signature.reference_uri
            )));
        }

        let cert = self.find_certificate(&signature)?;

        let unsigned = format!("{}{}", &xml[..sig_start], &xml[sig_end..]);
        self.verify_digest(&unsigned, &signature)?;
        self.verify_signature_value(signature_xml, &signature, &cert)?;

        debug!(
            reference = %signature.reference_uri,
            certificate = %cert.info(),
            "Verified SAML signature"
        );
        Ok(signature)
    }

    /// Picks the certificate to verify with.
    fn find_certificate(&self, signature: &XmlSignature) -> SamlResult<Certificate> {
        if let Some(cert_b64) = &signature.x509_certificate {
            let cert = Certificate::from_base64(cert_b64)
                .map_err(|e| invalid(format!("invalid embedded certificate: {e}")))?;

            if self.trusted_certificates.is_empty()
                || self.trusted_certificates.iter().any(|tc| tc == cert.der())
            {
                return Ok(cert);
            }
            return Err(invalid("embedded certificate is not trusted"));
        }

        let der = self
            .trusted_certificates
            .first()
            .ok_or_else(|| invalid("no certificate available"))?;
        Certificate::from_der(der).map_err(|e| invalid(format!("invalid trusted certificate: {e}")))
    }

    fn verify_digest(&self, unsigned_xml: &str, signature: &XmlSignature) -> SamlResult<()> {
        let canonical = self
            .canonicalizer
            .canonicalize(unsigned_xml)
            .map_err(|e| invalid(format!("cannot canonicalize document: {e}")))?;
        let calculated = base64::engine::general_purpose::STANDARD.encode(sso_crypto::hash(
            signature.digest_algorithm,
            canonical.as_bytes(),
        ));

        if calculated != signature.digest_value {
            return Err(invalid("digest value mismatch"));
        }
        Ok(())
    }

    fn verify_signature_value(
        &self,
        signature_xml: &str,
        signature: &XmlSignature,
        cert: &Certificate,
    ) -> SamlResult<()> {
        if !cert.is_rsa() {
            return Err(invalid("certificate does not carry an RSA key"));
        }

        let (start, end) = locate_element(signature_xml, "SignedInfo")
            .ok_or_else(|| invalid("no SignedInfo element found"))?;
        let signed_info = with_ds_declaration(&signature_xml[start..end]);
        let canonical = self
            .canonicalizer
            .canonicalize(&signed_info)
            .map_err(|e| invalid(format!("cannot canonicalize SignedInfo: {e}")))?;

        let signature_bytes = base64::engine::general_purpose::STANDARD
            .decode(&signature.signature_value)
            .map_err(|e| invalid(format!("invalid signature encoding: {e}")))?;

        sso_crypto::rsa_verify(
            cert.public_key(),
            canonical.as_bytes(),
            &signature_bytes,
            signature.signature_algorithm,
        )
        .map_err(|_| invalid("signature verification failed"))
    }
}

fn invalid(message: impl Into<String>) -> SamlError {
    SamlError::SignatureInvalid(message.into())
}

/// Extracts the signature fields from a `Signature` element.
fn extract_signature(xml: &str) -> SamlResult<XmlSignature> {
    let signature_algorithm = extract_attribute(xml, "SignatureMethod", "Algorithm")
        .and_then(|uri| RsaAlgorithm::from_xml_dsig_uri(&uri))
        .ok_or_else(|| invalid("unsupported signature algorithm"))?;

    let digest_algorithm = extract_attribute(xml, "DigestMethod", "Algorithm")
        .and_then(|uri| {
            [HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512]
                .into_iter()
                .find(|alg| alg.xml_dsig_uri() == uri)
        })
        .ok_or_else(|| invalid("unsupported digest algorithm"))?;

    let reference_uri = extract_attribute(xml, "Reference", "URI")
        .ok_or_else(|| invalid("no Reference URI found"))?;

    let digest_value = extract_element_content(xml, "DigestValue")
        .ok_or_else(|| invalid("no DigestValue found"))?;

    let signature_value = extract_element_content(xml, "SignatureValue")
        .ok_or_else(|| invalid("no SignatureValue found"))?;

    let x509_certificate = extract_element_content(xml, "X509Certificate");

    Ok(XmlSignature {
        signature_algorithm,
        digest_algorithm,
        reference_uri,
        digest_value: strip_whitespace(&digest_value),
        signature_value: strip_whitespace(&signature_value),
        x509_certificate: x509_certificate.as_deref().map(strip_whitespace),
    })
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Finds the opening tag of `local` with an optional prefix.
fn find_start_tag(xml: &str, local: &str) -> Option<(usize, String)> {
    xml.match_indices('<').find_map(|(pos, _)| {
        let rest = &xml[pos + 1..];
        if rest.starts_with(['/', '?', '!']) {
            return None;
        }
        let name_len = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
        let qname = &rest[..name_len];
        let this_local = qname.rsplit(':').next().unwrap_or(qname);
        (this_local == local).then(|| (pos, qname.to_string()))
    })
}

/// Byte range of the first `local` element, start tag through end tag.
fn locate_element(xml: &str, local: &str) -> Option<(usize, usize)> {
    let (start, qname) = find_start_tag(xml, local)?;
    let close = format!("</{qname}>");
    let end = start + xml[start..].find(&close)? + close.len();
    Some((start, end))
}

fn extract_attribute(xml: &str, element: &str, attribute: &str) -> Option<String> {
    let (start, _) = find_start_tag(xml, element)?;
    let tag_end = start + xml[start..].find('>')?;
    let tag = &xml[start..tag_end];

    let pattern = format!(" {attribute}=\"");
    let value_start = tag.find(&pattern)? + pattern.len();
    let value_len = tag[value_start..].find('"')?;
    quick_xml::escape::unescape(&tag[value_start..value_start + value_len])
        .ok()
        .map(std::borrow::Cow::into_owned)
}

fn extract_element_content(xml: &str, element: &str) -> Option<String> {
    let (start, qname) = find_start_tag(xml, element)?;
    let content_start = start + xml[start..].find('>')? + 1;
    let close = format!("</{qname}>");
    let content_len = xml[content_start..].find(&close)?;
    Some(xml[content_start..content_start + content_len].to_string())
}

/// Ensures a `ds:`-prefixed SignedInfo declares its prefix when cut out of
/// its parent.
fn with_ds_declaration(signed_info: &str) -> String {
    let Some(tag_end) = signed_info.find('>') else {
        return signed_info.to_string();
    };
    let open_tag = &signed_info[..tag_end];
    if !open_tag.starts_with("<ds:") || open_tag.contains("xmlns:ds=") {
        return signed_info.to_string();
    }
    let name_end = open_tag
        .find(|c: char| c.is_whitespace())
        .unwrap_or(open_tag.len());
    format!(
        r#"{} xmlns:ds="{XMLDSIG_NS}"{}"#,
        &signed_info[..name_end],
        &signed_info[name_end..]
    )
}
