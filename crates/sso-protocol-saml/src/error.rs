//! SAML error types.
//!
//! One taxonomy for the whole engine. The orchestrator decides per flow
//! which variants are recoverable (logout falls back to a static redirect)
//! and which surface as an error page (SSO).

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The binding envelope could not be undone (URL, base64, DEFLATE or
    /// UTF-8 layer).
    #[error("malformed binding: {0}")]
    MalformedBinding(String),

    /// The decoded message could not be understood at all.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The signing key is unusable or does not match the certificate.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Producing the enveloped signature failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// An enveloped signature did not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// A computed redirect target points somewhere other than the configured
    /// host.
    #[error("redirect target mismatch: expected host {expected}, got {actual}")]
    RedirectTargetMismatch {
        /// The configured host.
        expected: String,
        /// The host of the computed URL.
        actual: String,
    },

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the SAML status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::MalformedBinding(_)
            | Self::InvalidRequest(_)
            | Self::SignatureInvalid(_)
            | Self::XmlParse(_) => crate::types::status_codes::REQUESTER,
            Self::InvalidKeyMaterial(_)
            | Self::Signing(_)
            | Self::RedirectTargetMismatch { .. }
            | Self::Internal(_) => crate::types::status_codes::RESPONDER,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::MalformedBinding(_)
            | Self::InvalidRequest(_)
            | Self::SignatureInvalid(_)
            | Self::XmlParse(_) => 400,
            _ => 500,
        }
    }

    /// Returns true if the caller sent something unusable, as opposed to a
    /// fault on this side.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::MalformedBinding(format!("base64: {err}"))
    }
}

impl From<sso_crypto::CryptoError> for SamlError {
    fn from(err: sso_crypto::CryptoError) -> Self {
        use sso_crypto::CryptoError;
        match err {
            CryptoError::InvalidKey(_)
            | CryptoError::InvalidCertificate(_)
            | CryptoError::InvalidPem(_)
            | CryptoError::Verification => Self::InvalidKeyMaterial(err.to_string()),
            CryptoError::Signing(_) => Self::Signing(err.to_string()),
        }
    }
}
