//! Key material shared by the integration tests.
//!
//! The key and certificate are a throwaway RSA-2048 pair generated for
//! tests; `OTHER_KEY_PEM` is an unrelated RSA key used for mismatch cases.

/// IdP private key (PKCS#8).
pub const IDP_KEY_PEM: &str = include_str!("../../fixtures/idp_key.pem");

/// Self-signed certificate for [`IDP_KEY_PEM`].
pub const IDP_CERT_PEM: &str = include_str!("../../fixtures/idp_cert.pem");

/// RSA key that does not match [`IDP_CERT_PEM`].
pub const OTHER_KEY_PEM: &str = include_str!("../../fixtures/other_key.pem");

/// Path of a fixture file, for configuration that takes paths.
#[must_use]
pub fn fixture_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../fixtures")
        .join(name)
}
