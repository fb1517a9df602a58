//! Application state management.

use std::sync::Arc;

use sso_crypto::pem_to_der;
use sso_protocol_saml::endpoints::SamlState;
use sso_protocol_saml::{Orchestrator, SigningMaterial};
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::resolver::TrustedHeaderResolver;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,

    /// The SAML protocol engine.
    pub orchestrator: Arc<Orchestrator>,

    /// Principal lookup.
    pub resolver: Arc<TrustedHeaderResolver>,
}

impl AppState {
    /// Builds the state from configuration and already loaded key material.
    ///
    /// The key is not checked here; see [`AppState::load`].
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be constructed or a header name
    /// is invalid.
    pub fn new(
        config: ServerConfig,
        material: SigningMaterial,
        metadata_certificate: Option<Vec<u8>>,
    ) -> anyhow::Result<Self> {
        let orchestrator = Orchestrator::new(
            config.idp_settings(),
            config.service_provider_settings(),
            config.flow_settings(),
            Arc::new(material),
            metadata_certificate,
        )?;
        let resolver =
            TrustedHeaderResolver::new(&config.principal_header, &config.principal_email_header)?;

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            resolver: Arc::new(resolver),
        })
    }

    /// Reads the PEM files named in `config`, self-checks the key and builds
    /// the state.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or the key fails its
    /// self-check; the server does not start with unusable key material.
    pub fn load(config: ServerConfig) -> anyhow::Result<Self> {
        let key_pem = ServerConfig::read_pem(&config.signing_key_path)?;
        let cert_pem = ServerConfig::read_pem(&config.signing_cert_path)?;
        let material = SigningMaterial::from_pem(&key_pem, Some(&cert_pem))?;

        if let Err(e) = material.self_check() {
            let certificate = material
                .certificate_info()
                .map_or_else(|| "unparseable".to_string(), |info| info.to_string());
            error!(error = %e, %certificate, "Signing key failed self-check");
            return Err(e.into());
        }
        if let Some(info) = material.certificate_info() {
            info!(certificate = %info, "Signing key loaded");
        }

        let metadata_certificate = config
            .metadata_cert_path
            .as_deref()
            .map(|path| -> anyhow::Result<Vec<u8>> {
                Ok(pem_to_der(&ServerConfig::read_pem(path)?, "CERTIFICATE")?)
            })
            .transpose()?;

        Self::new(config, material, metadata_certificate)
    }

    /// Gets the state for the SAML endpoints.
    pub fn saml_state(&self) -> SamlState<TrustedHeaderResolver> {
        SamlState::new(Arc::clone(&self.orchestrator), Arc::clone(&self.resolver))
    }

    /// Returns the server configuration.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }
}
