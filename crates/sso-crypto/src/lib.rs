//! # sso-crypto
//!
//! Cryptographic primitives for the SAML SSO bridge, built on aws-lc-rs.
//!
//! SAML 2.0 service providers overwhelmingly expect RSA PKCS#1 v1.5 with
//! SHA-256 (`rsa-sha256`) and SHA-256 reference digests, so this crate
//! exposes exactly that family plus the SHA-384/SHA-512 variants:
//!
//! - [`hash`] - message digests
//! - [`rsa`] - RSA private key handling, signing and verification
//! - [`certificate`] - PEM de-armouring and X.509 inspection
//!
//! Key material never leaves [`rsa::RsaPrivateKey`]; only signatures and
//! public key bytes are handed back to callers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod certificate;
pub mod error;
pub mod hash;
pub mod rsa;

pub use algorithm::{HashAlgorithm, RsaAlgorithm};
pub use certificate::{pem_to_der, Certificate, CertificateInfo};
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash, sha256, sha384, sha512};
pub use rsa::{rsa_verify, RsaPrivateKey};
