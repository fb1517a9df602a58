//! PEM and X.509 helpers.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use x509_parser::{prelude::*, public_key::PublicKey};

use crate::error::{CryptoError, CryptoResult};

/// Strips the PEM armour labelled `label` and decodes the payload.
///
/// Only the first block with a matching label is decoded; surrounding text
/// (such as `openssl` "Bag Attributes" output) is ignored.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPem`] if the block is missing or the
/// payload is not base64.
pub fn pem_to_der(pem: &str, label: &str) -> CryptoResult<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem
        .find(&begin)
        .map(|pos| pos + begin.len())
        .ok_or_else(|| CryptoError::InvalidPem(format!("no {label} block")))?;
    let end_pos = pem[start..]
        .find(&end)
        .map(|pos| start + pos)
        .ok_or_else(|| CryptoError::InvalidPem(format!("unterminated {label} block")))?;

    let b64: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    STANDARD
        .decode(b64)
        .map_err(|e| CryptoError::InvalidPem(format!("{label} payload: {e}")))
}

/// Non-secret certificate metadata, suitable for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial number, hex with `:` separators.
    pub serial: String,
    /// Start of validity.
    pub not_before: String,
    /// End of validity.
    pub not_after: String,
}

impl fmt::Display for CertificateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subject=\"{}\" serial={} valid={}..{}",
            self.subject, self.serial, self.not_before, self.not_after
        )
    }
}

/// A parsed X.509 certificate.
///
/// Holds the original DER alongside what the signing path needs from it, so
/// the borrowed parser structures never escape this module.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    public_key: Vec<u8>,
    is_rsa: bool,
    info: CertificateInfo,
}

impl Certificate {
    /// Parses a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidCertificate`] if parsing fails.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("parse error: {e}")))?;

        let spki = cert.public_key();
        let is_rsa = matches!(spki.parsed(), Ok(PublicKey::RSA(_)));
        let validity = cert.validity();

        let info = CertificateInfo {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before: validity.not_before.to_string(),
            not_after: validity.not_after.to_string(),
        };

        Ok(Self {
            der: der.to_vec(),
            public_key: spki.subject_public_key.data.to_vec(),
            is_rsa,
            info,
        })
    }

    /// Parses a PEM `CERTIFICATE` block.
    ///
    /// # Errors
    ///
    /// Returns an error if the armour or the certificate is invalid.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        Self::from_der(&pem_to_der(pem, "CERTIFICATE")?)
    }

    /// Parses base64 DER, tolerating embedded whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not base64 or not a certificate.
    pub fn from_base64(b64: &str) -> CryptoResult<Self> {
        let compact: String = b64.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(compact)
            .map_err(|e| CryptoError::InvalidCertificate(format!("base64: {e}")))?;
        Self::from_der(&der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the DER encoding as unwrapped base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// Returns the subject public key bytes (PKCS#1 `RSAPublicKey` for RSA).
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Returns true if the subject key is RSA.
    #[must_use]
    pub const fn is_rsa(&self) -> bool {
        self.is_rsa
    }

    /// Returns log-safe metadata.
    #[must_use]
    pub const fn info(&self) -> &CertificateInfo {
        &self.info
    }
}
