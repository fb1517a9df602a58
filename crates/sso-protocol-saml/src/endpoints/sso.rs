//! Single Sign-On endpoint.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use tracing::{error, warn};

use super::state::SamlState;
use super::{error_response, found, RedirectParams};
use crate::orchestrator::{PrincipalResolver, SsoOutcome};

/// GET handler for the SSO endpoint (HTTP-Redirect binding).
///
/// Answers with a login redirect or the auto-submitting Response form.
pub async fn single_sign_on<R: PrincipalResolver>(
    State(state): State<SamlState<R>>,
    headers: HeaderMap,
    Query(params): Query<RedirectParams>,
) -> Response {
    let outcome = state
        .orchestrator
        .single_sign_on(
            state.resolver.as_ref(),
            &headers,
            params.saml_request.as_deref(),
            params.relay_state.as_deref(),
        )
        .await;

    match outcome {
        Ok(SsoOutcome::Login { location }) => found(&location),
        Ok(SsoOutcome::Respond { form, .. }) => Html(form).into_response(),
        Err(e) => {
            if e.is_client_error() {
                warn!(error = %e, "Rejected SSO request");
            } else {
                error!(error = %e, "SSO request failed");
            }
            error_response(&e)
        }
    }
}
