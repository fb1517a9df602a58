//! Server configuration.
//!
//! Configuration is loaded from `SSO_*` environment variables with sensible
//! defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use sso_protocol_saml::signature::CanonicalizationMethod;
use sso_protocol_saml::{
    FlowSettings, IdpLogoutMode, IdpSettings, NameIdFormat, ServiceProviderSettings,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Public base URL of this IdP (used in metadata and Destinations).
    pub base_url: String,

    /// IdP entity ID.
    pub idp_entity_id: String,

    /// SP entity ID (assertion audience).
    pub sp_entity_id: String,

    /// SP Assertion Consumer Service URL.
    pub sp_acs_url: String,

    /// SP single logout URL.
    pub sp_slo_url: String,

    /// SP static logout page.
    pub sp_logout_url: String,

    /// Host logout redirects must target; defaults to the logout page host.
    pub sp_logout_host: Option<String>,

    /// Login page for browsers without a session.
    pub login_url: String,

    /// Local session cookie name.
    pub session_cookie: String,

    /// Header carrying the authenticated subject, set by the fronting proxy.
    pub principal_header: String,

    /// Header carrying the authenticated email address.
    pub principal_email_header: String,

    /// Assertion lifetime in seconds.
    pub assertion_validity_secs: u64,

    /// NameID format of issued assertions.
    pub name_id_format: NameIdFormat,

    /// Canonicalization used when signing.
    pub canonicalization: CanonicalizationMethod,

    /// IdP-initiated logout behaviour.
    pub idp_logout_mode: IdpLogoutMode,

    /// PEM private key (PKCS#8 or PKCS#1).
    pub signing_key_path: PathBuf,

    /// PEM signing certificate.
    pub signing_cert_path: PathBuf,

    /// PEM certificate advertised in metadata, if not the signing one.
    pub metadata_cert_path: Option<PathBuf>,

    /// Log level.
    pub log_level: String,
}

/// Longest accepted assertion lifetime, one day.
pub const MAX_ASSERTION_VALIDITY_SECS: u64 = 24 * 60 * 60;

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an optional variable, keeping `default` when it is unset.
fn parse_or<T>(name: &str, value: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .with_context(|| format!("invalid {name} '{v}'"))
    })
}

fn checked_validity(secs: u64) -> anyhow::Result<u64> {
    if secs == 0 || secs > MAX_ASSERTION_VALIDITY_SECS {
        anyhow::bail!(
            "SSO_ASSERTION_VALIDITY_SECS must be between 1 and {MAX_ASSERTION_VALIDITY_SECS}, got {secs}"
        );
    }
    Ok(secs)
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a number does not
    /// parse, the assertion lifetime is out of range, or an enumerated value
    /// is not recognised.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let host = env("SSO_HOST").unwrap_or(defaults.host);
        let port = parse_or("SSO_PORT", env("SSO_PORT"), defaults.port)?;

        let base_url = env("SSO_BASE_URL").unwrap_or_else(|| format!("http://{host}:{port}"));
        let idp_entity_id =
            env("SSO_IDP_ENTITY_ID").unwrap_or_else(|| format!("{base_url}/saml/metadata"));

        let sp_entity_id = env("SSO_SP_ENTITY_ID")
            .ok_or_else(|| anyhow::anyhow!("SSO_SP_ENTITY_ID environment variable is required"))?;
        let sp_acs_url = env("SSO_SP_ACS_URL")
            .ok_or_else(|| anyhow::anyhow!("SSO_SP_ACS_URL environment variable is required"))?;
        let sp_slo_url = env("SSO_SP_SLO_URL")
            .ok_or_else(|| anyhow::anyhow!("SSO_SP_SLO_URL environment variable is required"))?;
        let sp_logout_url = env("SSO_SP_LOGOUT_URL").unwrap_or_else(|| sp_slo_url.clone());
        let sp_logout_host = env("SSO_SP_LOGOUT_HOST");

        let login_url = env("SSO_LOGIN_URL").unwrap_or(defaults.login_url);
        let session_cookie = env("SSO_SESSION_COOKIE").unwrap_or(defaults.session_cookie);
        let principal_header = env("SSO_PRINCIPAL_HEADER").unwrap_or(defaults.principal_header);
        let principal_email_header =
            env("SSO_PRINCIPAL_EMAIL_HEADER").unwrap_or(defaults.principal_email_header);

        let assertion_validity_secs = checked_validity(parse_or(
            "SSO_ASSERTION_VALIDITY_SECS",
            env("SSO_ASSERTION_VALIDITY_SECS"),
            defaults.assertion_validity_secs,
        )?)?;

        let name_id_format = match env("SSO_NAME_ID_FORMAT") {
            Some(v) => NameIdFormat::from_name(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown SSO_NAME_ID_FORMAT '{v}'"))?,
            None => defaults.name_id_format,
        };
        let canonicalization = match env("SSO_CANONICALIZATION") {
            Some(v) => CanonicalizationMethod::from_name(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown SSO_CANONICALIZATION '{v}'"))?,
            None => defaults.canonicalization,
        };
        let idp_logout_mode = match env("SSO_IDP_LOGOUT_MODE") {
            Some(v) => IdpLogoutMode::from_name(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown SSO_IDP_LOGOUT_MODE '{v}'"))?,
            None => defaults.idp_logout_mode,
        };

        let signing_key_path = env("SSO_SIGNING_KEY_PATH")
            .map_or(defaults.signing_key_path, PathBuf::from);
        let signing_cert_path = env("SSO_SIGNING_CERT_PATH")
            .map_or(defaults.signing_cert_path, PathBuf::from);
        let metadata_cert_path = env("SSO_METADATA_CERT_PATH").map(PathBuf::from);

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            host,
            port,
            base_url,
            idp_entity_id,
            sp_entity_id,
            sp_acs_url,
            sp_slo_url,
            sp_logout_url,
            sp_logout_host,
            login_url,
            session_cookie,
            principal_header,
            principal_email_header,
            assertion_validity_secs,
            name_id_format,
            canonicalization,
            idp_logout_mode,
            signing_key_path,
            signing_cert_path,
            metadata_cert_path,
            log_level,
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            base_url: "https://idp.example.com".to_string(),
            idp_entity_id: "https://idp.example.com/saml/metadata".to_string(),
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Reads a PEM file.
    ///
    /// # Errors
    ///
    /// Returns an error naming the file if it cannot be read.
    pub fn read_pem(path: &std::path::Path) -> anyhow::Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    /// Returns the assertion lifetime.
    #[must_use]
    pub const fn assertion_validity(&self) -> Duration {
        Duration::from_secs(self.assertion_validity_secs)
    }

    /// IdP settings for the protocol engine.
    #[must_use]
    pub fn idp_settings(&self) -> IdpSettings {
        IdpSettings::from_base_url(&self.idp_entity_id, &self.base_url)
    }

    /// SP settings for the protocol engine.
    #[must_use]
    pub fn service_provider_settings(&self) -> ServiceProviderSettings {
        ServiceProviderSettings {
            entity_id: self.sp_entity_id.clone(),
            acs_url: self.sp_acs_url.clone(),
            slo_url: self.sp_slo_url.clone(),
            logout_url: self.sp_logout_url.clone(),
            logout_host: self.sp_logout_host.clone(),
        }
    }

    /// Flow settings for the protocol engine.
    #[must_use]
    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            login_url: self.login_url.clone(),
            session_cookie: self.session_cookie.clone(),
            assertion_validity: self.assertion_validity(),
            name_id_format: self.name_id_format,
            canonicalization: self.canonicalization,
            idp_logout_mode: self.idp_logout_mode,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            idp_entity_id: "http://localhost:8080/saml/metadata".to_string(),
            sp_entity_id: "https://sp.example.com".to_string(),
            sp_acs_url: "https://sp.example.com/saml/acs".to_string(),
            sp_slo_url: "https://sp.example.com/saml/slo".to_string(),
            sp_logout_url: "https://sp.example.com/logged-out".to_string(),
            sp_logout_host: None,
            login_url: "/login".to_string(),
            session_cookie: "sso_session".to_string(),
            principal_header: "x-authenticated-user".to_string(),
            principal_email_header: "x-authenticated-email".to_string(),
            assertion_validity_secs: 300,
            name_id_format: NameIdFormat::default(),
            canonicalization: CanonicalizationMethod::default(),
            idp_logout_mode: IdpLogoutMode::default(),
            signing_key_path: PathBuf::from("certs/idp_key.pem"),
            signing_cert_path: PathBuf::from("certs/idp_cert.pem"),
            metadata_cert_path: None,
            log_level: "info".to_string(),
        }
    }
}
