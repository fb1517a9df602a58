//! SAML router configuration.

use axum::{routing::get, Router};

use super::metadata::idp_metadata;
use super::slo::single_logout;
use super::sso::single_sign_on;
use super::state::SamlState;
use crate::orchestrator::PrincipalResolver;

/// Creates the SAML protocol router.
///
/// | Method | Path             | Handler          |
/// |--------|------------------|------------------|
/// | GET    | `/saml/metadata` | `idp_metadata`   |
/// | GET    | `/saml/sso`      | `single_sign_on` |
/// | GET    | `/saml/slo`      | `single_logout`  |
pub fn saml_router<R: PrincipalResolver>() -> Router<SamlState<R>> {
    Router::new()
        .route("/saml/metadata", get(idp_metadata::<R>))
        .route("/saml/sso", get(single_sign_on::<R>))
        .route("/saml/slo", get(single_logout::<R>))
}
