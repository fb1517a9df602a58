//! Principal lookup for the SAML endpoints.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};
use sso_protocol_saml::{Principal, PrincipalResolver, SamlError, SamlResult};

/// Trusts a fronting authentication proxy.
///
/// The proxy authenticates the browser and forwards the subject (and
/// optionally the email address) in request headers. Requests without the
/// subject header have no session. The proxy must strip these headers from
/// client traffic.
#[derive(Debug, Clone)]
pub struct TrustedHeaderResolver {
    subject_header: HeaderName,
    email_header: HeaderName,
}

impl TrustedHeaderResolver {
    /// Creates a resolver reading the given headers.
    ///
    /// # Errors
    ///
    /// Returns an error if a header name is invalid.
    pub fn new(subject_header: &str, email_header: &str) -> anyhow::Result<Self> {
        Ok(Self {
            subject_header: HeaderName::try_from(subject_header)?,
            email_header: HeaderName::try_from(email_header)?,
        })
    }

    fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> SamlResult<Option<&'a str>> {
        headers
            .get(name)
            .map(|v| {
                v.to_str()
                    .map(str::trim)
                    .map_err(|_| SamlError::InvalidRequest(format!("header {name} is not text")))
            })
            .transpose()
            .map(|v| v.filter(|s| !s.is_empty()))
    }
}

#[async_trait]
impl PrincipalResolver for TrustedHeaderResolver {
    async fn resolve(&self, headers: &HeaderMap) -> SamlResult<Option<Principal>> {
        let Some(subject) = Self::header(headers, &self.subject_header)? else {
            return Ok(None);
        };

        let mut principal = Principal::new(subject);
        if let Some(email) = Self::header(headers, &self.email_header)? {
            principal = principal.with_email(email);
        }
        Ok(Some(principal))
    }
}
