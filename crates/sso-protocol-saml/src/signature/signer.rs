//! Enveloped XML signature creation.

use std::sync::Arc;

use base64::Engine;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use sso_crypto::{
    pem_to_der, Certificate, CertificateInfo, CryptoError, HashAlgorithm, RsaAlgorithm,
    RsaPrivateKey,
};
use tracing::{debug, error};

use crate::error::{SamlError, SamlResult};

use super::{Canonicalizer, ExclusiveC14n, ENVELOPED_SIGNATURE, EXC_C14N};
use crate::types::XMLDSIG_NS;

/// Private key and certificate the IdP signs with.
///
/// The key stays opaque DER; it is parsed and re-checked on every signing
/// call so a broken key can never produce a document.
#[derive(Clone)]
pub struct SigningMaterial {
    private_key_der: Vec<u8>,
    certificate_der: Option<Vec<u8>>,
}

impl std::fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("private_key", &"<redacted>")
            .field("has_certificate", &self.certificate_der.is_some())
            .finish()
    }
}

impl SigningMaterial {
    /// Wraps DER key bytes (PKCS#8 or PKCS#1) and an optional DER certificate.
    #[must_use]
    pub fn new(private_key_der: Vec<u8>, certificate_der: Option<Vec<u8>>) -> Self {
        Self {
            private_key_der,
            certificate_der,
        }
    }

    /// Creates material from PEM-encoded key and certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidKeyMaterial`] if the PEM armour is missing
    /// or damaged. Key validity is not checked here.
    pub fn from_pem(private_key_pem: &str, certificate_pem: Option<&str>) -> SamlResult<Self> {
        let private_key_der = pem_to_der(private_key_pem, "PRIVATE KEY")
            .or_else(|_| pem_to_der(private_key_pem, "RSA PRIVATE KEY"))?;

        let certificate_der = certificate_pem
            .map(|pem| pem_to_der(pem, "CERTIFICATE"))
            .transpose()?;

        Ok(Self::new(private_key_der, certificate_der))
    }

    /// The DER certificate, if any.
    #[must_use]
    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.certificate_der.as_deref()
    }

    /// The certificate as unwrapped base64, as embedded in `X509Certificate`.
    #[must_use]
    pub fn certificate_base64(&self) -> Option<String> {
        self.certificate_der
            .as_deref()
            .map(|der| base64::engine::general_purpose::STANDARD.encode(der))
    }

    /// Log-safe certificate metadata, if a parseable certificate is present.
    #[must_use]
    pub fn certificate_info(&self) -> Option<CertificateInfo> {
        self.certificate_der
            .as_deref()
            .and_then(|der| Certificate::from_der(der).ok())
            .map(|cert| cert.info().clone())
    }

    /// Parses the key and proves it usable.
    ///
    /// A probe message is signed and verified with the key's own public half
    /// and, when a certificate is present, with the certificate's key.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidKeyMaterial`] if the key does not parse,
    /// the certificate is not an RSA certificate, or either verification
    /// fails.
    pub fn checked_key(&self) -> SamlResult<RsaPrivateKey> {
        let key = RsaPrivateKey::from_der(&self.private_key_der)?;

        let certificate = self
            .certificate_der
            .as_deref()
            .map(Certificate::from_der)
            .transpose()?;

        if let Some(cert) = &certificate {
            if !cert.is_rsa() {
                return Err(SamlError::InvalidKeyMaterial(
                    "certificate does not carry an RSA key".to_string(),
                ));
            }
        }

        key.probe(certificate.as_ref().map(Certificate::public_key))
            .map_err(|e| match e {
                CryptoError::Verification => SamlError::InvalidKeyMaterial(
                    "private key does not match its certificate".to_string(),
                ),
                other => other.into(),
            })?;

        Ok(key)
    }

    /// Runs [`Self::checked_key`] and discards the key.
    ///
    /// # Errors
    ///
    /// See [`Self::checked_key`].
    pub fn self_check(&self) -> SamlResult<()> {
        self.checked_key().map(|_| ())
    }
}

/// A document carrying an enveloped signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument {
    xml: String,
}

impl SignedDocument {
    /// The signed XML.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consumes the document, returning the XML.
    #[must_use]
    pub fn into_xml(self) -> String {
        self.xml
    }

    /// Digest algorithm of the reference.
    #[must_use]
    pub const fn digest_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Sha256
    }

    /// Algorithm of the signature value.
    #[must_use]
    pub const fn signature_algorithm(&self) -> RsaAlgorithm {
        RsaAlgorithm::Rs256
    }
}

/// XML document signer.
///
/// Produces a `ds:Signature` over the whole document and splices it in
/// right after the first `Issuer` element.
#[derive(Debug, Clone)]
pub struct XmlSigner {
    material: Arc<SigningMaterial>,
    canonicalizer: Arc<dyn Canonicalizer>,
}

impl XmlSigner {
    /// Creates a signer using Exclusive C14N.
    #[must_use]
    pub fn new(material: Arc<SigningMaterial>) -> Self {
        Self {
            material,
            canonicalizer: Arc::new(ExclusiveC14n),
        }
    }

    /// Replaces the canonicalizer.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// The material this signer uses.
    #[must_use]
    pub fn material(&self) -> &SigningMaterial {
        &self.material
    }

    /// The canonicalizer this signer uses.
    #[must_use]
    pub fn canonicalizer(&self) -> &dyn Canonicalizer {
        self.canonicalizer.as_ref()
    }

    /// Signs `xml`.
    ///
    /// # Errors
    ///
    /// [`SamlError::InvalidKeyMaterial`] if the key fails its self-check,
    /// [`SamlError::Signing`] if the document has no `Issuer` or cannot be
    /// canonicalized, or if the RSA operation fails. Failures are logged with
    /// certificate metadata.
    pub fn sign(&self, xml: &str) -> SamlResult<SignedDocument> {
        self.sign_inner(xml).inspect_err(|e| {
            let certificate = self
                .material
                .certificate_info()
                .map_or_else(|| "none".to_string(), |info| info.to_string());
            error!(error = %e, %certificate, "Failed to sign SAML document");
        })
    }

    fn sign_inner(&self, xml: &str) -> SamlResult<SignedDocument> {
        let key = self.material.checked_key()?;

        let insert_at = find_issuer_end(xml)
            .ok_or_else(|| SamlError::Signing("document has no Issuer element".to_string()))?;
        let reference = root_id(xml)?.map(|id| format!("#{id}")).unwrap_or_default();

        let canonical = self
            .canonicalizer
            .canonicalize(xml)
            .map_err(|e| SamlError::Signing(format!("canonicalization failed: {e}")))?;
        let digest = base64::engine::general_purpose::STANDARD
            .encode(sso_crypto::sha256(canonical.as_bytes()));

        let signed_info = self
            .canonicalizer
            .canonicalize(&build_signed_info(&reference, &digest))
            .map_err(|e| SamlError::Signing(format!("SignedInfo canonicalization failed: {e}")))?;

        let signature_value = key
            .sign(RsaAlgorithm::Rs256, signed_info.as_bytes())
            .map_err(|e| SamlError::Signing(e.to_string()))?;
        let signature_b64 = base64::engine::general_purpose::STANDARD.encode(signature_value);

        let signature_element = build_signature_element(
            &signed_info,
            &signature_b64,
            self.material.certificate_base64().as_deref(),
        );

        debug!(
            reference = %reference,
            canonicalizer = self.canonicalizer.name(),
            "Signed SAML document"
        );

        Ok(SignedDocument {
            xml: insert_signature(xml, insert_at, &signature_element),
        })
    }
}

/// Byte offset just past the first `Issuer` end tag, whatever its prefix.
pub(crate) fn find_issuer_end(xml: &str) -> Option<usize> {
    if let Some(pos) = xml.find("</saml:Issuer>") {
        return Some(pos + "</saml:Issuer>".len());
    }

    xml.match_indices("</").find_map(|(pos, _)| {
        let rest = &xml[pos + 2..];
        let close = rest.find('>')?;
        let name = rest[..close].trim_end();
        let local = name.rsplit(':').next().unwrap_or(name);
        (local == "Issuer").then_some(pos + 2 + close + 1)
    })
}

/// `ID` attribute of the document element.
pub(crate) fn root_id(xml: &str) -> SamlResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.as_ref() == b"ID" {
                        return Ok(Some(attr.unescape_value()?.into_owned()));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Builds the SignedInfo element.
///
/// Written in canonical form with its own `xmlns:ds`, so it canonicalizes to
/// itself standalone and inside the signature.
fn build_signed_info(reference: &str, digest_b64: &str) -> String {
    format!(
        concat!(
            r#"<ds:SignedInfo xmlns:ds="{ds}">"#,
            r#"<ds:CanonicalizationMethod Algorithm="{c14n}"></ds:CanonicalizationMethod>"#,
            r#"<ds:SignatureMethod Algorithm="{sig}"></ds:SignatureMethod>"#,
            r#"<ds:Reference URI="{reference}">"#,
            r#"<ds:Transforms>"#,
            r#"<ds:Transform Algorithm="{enveloped}"></ds:Transform>"#,
            r#"<ds:Transform Algorithm="{c14n}"></ds:Transform>"#,
            r#"</ds:Transforms>"#,
            r#"<ds:DigestMethod Algorithm="{digest_alg}"></ds:DigestMethod>"#,
            r#"<ds:DigestValue>{digest}</ds:DigestValue>"#,
            r#"</ds:Reference>"#,
            r#"</ds:SignedInfo>"#,
        ),
        ds = XMLDSIG_NS,
        c14n = EXC_C14N,
        sig = RsaAlgorithm::Rs256.xml_dsig_uri(),
        reference = crate::builder::xml_escape(reference),
        enveloped = ENVELOPED_SIGNATURE,
        digest_alg = HashAlgorithm::Sha256.xml_dsig_uri(),
        digest = digest_b64,
    )
}

/// Builds the complete Signature element.
fn build_signature_element(
    signed_info: &str,
    signature_value: &str,
    certificate_b64: Option<&str>,
) -> String {
    let mut signature = format!(
        r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}<ds:SignatureValue>{signature_value}</ds:SignatureValue>"#
    );

    if let Some(cert) = certificate_b64 {
        signature.push_str(&format!(
            "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>"
        ));
    }

    signature.push_str("</ds:Signature>");
    signature
}

/// Inserts the signature into the XML document.
fn insert_signature(xml: &str, position: usize, signature: &str) -> String {
    format!("{}{}{}", &xml[..position], signature, &xml[position..])
}
