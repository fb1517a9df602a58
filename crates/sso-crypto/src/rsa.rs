//! RSA PKCS#1 v1.5 signing and verification.
//!
//! SAML interoperability still hinges on `rsa-sha256`, so unlike the JOSE
//! side of a deployment this module accepts SHA-256 as well as the larger
//! digests.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        self, KeyPair, RsaKeyPair, UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA256,
        RSA_PKCS1_2048_8192_SHA384, RSA_PKCS1_2048_8192_SHA512,
    },
};

use crate::{
    algorithm::RsaAlgorithm,
    error::{CryptoError, CryptoResult},
};

const PROBE_MESSAGE: &[u8] = b"sso-crypto key probe";

/// An RSA private key parsed from DER.
pub struct RsaPrivateKey {
    key_pair: RsaKeyPair,
}

impl RsaPrivateKey {
    /// Parses an RSA private key from PKCS#8 or PKCS#1 DER.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if neither encoding parses or the
    /// key is not RSA.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::from_pkcs8(der)
            .or_else(|_| RsaKeyPair::from_der(der))
            .map_err(|e| CryptoError::InvalidKey(format!("not a usable RSA private key: {e}")))?;
        Ok(Self { key_pair })
    }

    /// Returns the modulus length in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        self.key_pair.public_modulus_len() * 8
    }

    /// Returns the PKCS#1 `RSAPublicKey` DER for this key.
    #[must_use]
    pub fn public_key_der(&self) -> Vec<u8> {
        self.key_pair.public_key().as_ref().to_vec()
    }

    /// Signs `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Signing`] if the primitive fails.
    pub fn sign(&self, algorithm: RsaAlgorithm, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let padding = match algorithm {
            RsaAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
            RsaAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
            RsaAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
        };

        let rng = SystemRandom::new();
        let mut sig = vec![0u8; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(padding, &rng, data, &mut sig)
            .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
        Ok(sig)
    }

    /// Signs a fixed probe message and verifies it with this key's own
    /// public half and, when given, with `expected_public_key` as well.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Signing`] if the probe cannot be produced and
    /// [`CryptoError::Verification`] if either verification fails.
    pub fn probe(&self, expected_public_key: Option<&[u8]>) -> CryptoResult<()> {
        let sig = self.sign(RsaAlgorithm::Rs256, PROBE_MESSAGE)?;
        rsa_verify(
            &self.public_key_der(),
            PROBE_MESSAGE,
            &sig,
            RsaAlgorithm::Rs256,
        )?;
        if let Some(public_key) = expected_public_key {
            rsa_verify(public_key, PROBE_MESSAGE, &sig, RsaAlgorithm::Rs256)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("modulus_bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}

/// Verifies an RSA signature against a PKCS#1 `RSAPublicKey`.
///
/// # Errors
///
/// Returns [`CryptoError::Verification`] if the signature does not verify.
pub fn rsa_verify(
    public_key_der: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: RsaAlgorithm,
) -> CryptoResult<()> {
    let verification_alg: &'static dyn signature::VerificationAlgorithm = match algorithm {
        RsaAlgorithm::Rs256 => &RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::Rs384 => &RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::Rs512 => &RSA_PKCS1_2048_8192_SHA512,
    };

    UnparsedPublicKey::new(verification_alg, public_key_der)
        .verify(data, sig)
        .map_err(|_| CryptoError::Verification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{pem_to_der, Certificate};

    const KEY_PEM: &str = include_str!("../../../tests/fixtures/idp_key.pem");
    const OTHER_KEY_PEM: &str = include_str!("../../../tests/fixtures/other_key.pem");
    const EC_KEY_PEM: &str = include_str!("../../../tests/fixtures/ec_key.pem");
    const CERT_PEM: &str = include_str!("../../../tests/fixtures/idp_cert.pem");

    fn load(pem: &str) -> RsaPrivateKey {
        let der = pem_to_der(pem, "PRIVATE KEY").unwrap();
        RsaPrivateKey::from_der(&der).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let key = load(KEY_PEM);
        assert_eq!(key.modulus_bits(), 2048);

        let sig = key.sign(RsaAlgorithm::Rs256, b"payload").unwrap();
        assert_eq!(sig.len(), 256);
        rsa_verify(&key.public_key_der(), b"payload", &sig, RsaAlgorithm::Rs256).unwrap();

        let tampered = rsa_verify(&key.public_key_der(), b"other", &sig, RsaAlgorithm::Rs256);
        assert!(matches!(tampered, Err(CryptoError::Verification)));
    }

    #[test]
    fn probe_against_matching_certificate() {
        let key = load(KEY_PEM);
        let cert = Certificate::from_pem(CERT_PEM).unwrap();
        key.probe(Some(cert.public_key())).unwrap();
    }

    #[test]
    fn probe_detects_mismatched_certificate() {
        let key = load(OTHER_KEY_PEM);
        let cert = Certificate::from_pem(CERT_PEM).unwrap();
        assert!(key.probe(None).is_ok());
        assert!(matches!(
            key.probe(Some(cert.public_key())),
            Err(CryptoError::Verification)
        ));
    }

    #[test]
    fn rejects_non_rsa_and_garbage_keys() {
        let ec = pem_to_der(EC_KEY_PEM, "PRIVATE KEY").unwrap();
        assert!(matches!(
            RsaPrivateKey::from_der(&ec),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(RsaPrivateKey::from_der(b"not a key").is_err());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let rendered = format!("{:?}", load(KEY_PEM));
        assert!(rendered.contains("modulus_bits: 2048"));
    }
}
