//! XML Digital Signature support.
//!
//! Messages are signed with an enveloped RSA-SHA256 signature whose
//! reference covers the whole document. [`XmlSigner`] produces it and
//! [`XmlSignatureVerifier`] checks it; both take their canonicalization
//! strategy as a [`Canonicalizer`].

mod canonicalize;
mod signer;
mod verifier;

pub use canonicalize::*;
pub use signer::*;
pub use verifier::*;

pub(crate) use signer::root_id;

use sso_crypto::{HashAlgorithm, RsaAlgorithm};

/// Exclusive XML Canonicalization 1.0 (omits comments).
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Enveloped signature transform.
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Fields of a `<ds:Signature>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSignature {
    /// Algorithm of the signature value.
    pub signature_algorithm: RsaAlgorithm,
    /// Algorithm of the reference digest.
    pub digest_algorithm: HashAlgorithm,
    /// Reference URI, `#<ID>` or empty for the whole document.
    pub reference_uri: String,
    /// Base64 digest value.
    pub digest_value: String,
    /// Base64 signature value.
    pub signature_value: String,
    /// Embedded base64 DER certificate.
    pub x509_certificate: Option<String>,
}
