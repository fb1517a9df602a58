//! SAML endpoint state.

use std::sync::Arc;

use crate::orchestrator::{Orchestrator, PrincipalResolver};

/// State shared by the SAML handlers.
pub struct SamlState<R>
where
    R: PrincipalResolver,
{
    /// The protocol engine.
    pub orchestrator: Arc<Orchestrator>,
    /// Local authenticator.
    pub resolver: Arc<R>,
}

impl<R: PrincipalResolver> SamlState<R> {
    /// Creates a new SAML state.
    pub fn new(orchestrator: Arc<Orchestrator>, resolver: Arc<R>) -> Self {
        Self {
            orchestrator,
            resolver,
        }
    }
}

impl<R: PrincipalResolver> Clone for SamlState<R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            resolver: Arc::clone(&self.resolver),
        }
    }
}
