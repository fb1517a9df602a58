//! # SSO Bridge Server
//!
//! Main entry point for the SAML SSO bridge.

#![forbid(unsafe_code)]

use sso_server::{Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("SSO bridge starting...");

    Server::new(config)?.run().await
}
