//! Router configuration.
//!
//! This module creates the main Axum router that combines all endpoints.

use axum::{http::StatusCode, routing::get, Router};
use tower_http::trace::TraceLayer;

use sso_protocol_saml::endpoints::saml_router;

use crate::state::AppState;

/// Creates the main application router.
pub fn create_router(state: &AppState) -> Router {
    let saml = saml_router().with_state(state.saml_state());

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(saml)
        .merge(health)
        .layer(TraceLayer::new_for_http())
}

/// Load balancer health check.
async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
