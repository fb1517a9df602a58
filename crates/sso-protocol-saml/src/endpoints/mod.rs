//! SAML endpoint handlers.
//!
//! This module provides Axum HTTP handlers for the IdP endpoints:
//!
//! - **SSO Endpoint** - Single Sign-On service (receives AuthnRequests)
//! - **SLO Endpoint** - Single Logout service (always clears the session)
//! - **Metadata Endpoint** - Serves IdP metadata
//!
//! # Example
//!
//! ```rust,ignore
//! use sso_protocol_saml::endpoints::{saml_router, SamlState};
//! use axum::Router;
//!
//! let app = Router::new()
//!     .merge(saml_router())
//!     .with_state(SamlState::new(orchestrator, resolver));
//! ```

mod metadata;
mod router;
mod slo;
mod sso;
mod state;

pub use metadata::*;
pub use router::*;
pub use slo::*;
pub use sso::*;
pub use state::*;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::SamlError;

/// Query parameters of a redirect-bound request.
#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    /// The SAML request (deflated, base64).
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,

    /// The SAML response (deflated, base64).
    #[serde(rename = "SAMLResponse")]
    pub saml_response: Option<String>,

    /// Relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Generic error page. Only the status class is shown to the browser.
fn error_response(err: &SamlError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if err.is_client_error() {
        "The sign-in request could not be processed."
    } else {
        "The sign-in service is temporarily unavailable."
    };
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Error</title></head>
<body>
<h1>Sign-in Error</h1>
<p>{message}</p>
</body>
</html>"#
    );
    (status, Html(html)).into_response()
}

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => error_response(&SamlError::Internal(
            "redirect location is not a valid header value".to_string(),
        )),
    }
}
