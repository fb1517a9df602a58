//! Error type for cryptographic operations.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Cryptographic operation errors.
///
/// Messages describe *what* failed, never the key bytes involved.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The private key could not be parsed or has the wrong type.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The certificate could not be parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// PEM armour was missing or its payload was not base64.
    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    /// The signing primitive failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Verification failed.
    #[error("signature verification failed")]
    Verification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_error_is_generic() {
        assert_eq!(
            CryptoError::Verification.to_string(),
            "signature verification failed"
        );
    }
}
