//! Single Logout endpoint.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use tracing::warn;

use super::state::SamlState;
use super::{found, RedirectParams};
use crate::orchestrator::{LogoutMessage, PrincipalResolver};

/// GET handler for the SLO endpoint (HTTP-Redirect binding).
///
/// Always a redirect carrying exactly one `Set-Cookie` that expires the
/// local session.
pub async fn single_logout<R: PrincipalResolver>(
    State(state): State<SamlState<R>>,
    headers: HeaderMap,
    params: Result<Query<RedirectParams>, QueryRejection>,
) -> Response {
    let params = params.map_or_else(
        |rejection| {
            warn!(error = %rejection, "Unreadable logout query, using fallback");
            RedirectParams {
                saml_request: Some(String::new()),
                saml_response: None,
                relay_state: None,
            }
        },
        |Query(params)| params,
    );

    let message = match (&params.saml_request, &params.saml_response) {
        (Some(request), _) => Some(LogoutMessage::Request(request)),
        (None, Some(response)) => Some(LogoutMessage::Response(response)),
        (None, None) => None,
    };

    let outcome = state
        .orchestrator
        .single_logout(
            state.resolver.as_ref(),
            &headers,
            message,
            params.relay_state.as_deref(),
        )
        .await;

    let mut response = found(&outcome.location);
    match HeaderValue::from_str(&outcome.clear_cookie) {
        Ok(cookie) => {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
        Err(e) => warn!(error = %e, "Session cookie name is not a valid header value"),
    }
    response
}
