//! IdP Metadata endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::state::SamlState;
use crate::orchestrator::PrincipalResolver;

/// Content type of SAML metadata.
pub const METADATA_CONTENT_TYPE: &str = "application/samlmetadata+xml";

/// GET handler for the metadata endpoint. Serves the document rendered at
/// start-up.
pub async fn idp_metadata<R: PrincipalResolver>(
    State(state): State<SamlState<R>>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, METADATA_CONTENT_TYPE)],
        state.orchestrator.metadata().to_string(),
    )
}
