//! SAML 2.0 Identity Provider protocol engine.
//!
//! This crate brokers browser SSO between a local authenticator and a single
//! Service Provider:
//!
//! - **Bindings** - HTTP-Redirect (raw DEFLATE) and HTTP-POST
//! - **Request parsing** - AuthnRequest and LogoutRequest, tolerant of
//!   prefix variation
//! - **Message building** - Response, LogoutResponse and LogoutRequest
//! - **XML signature** - enveloped RSA-SHA256 signatures over Exclusive C14N
//! - **Orchestration** - the SSO and SLO flows as typed state machines
//!
//! # Architecture
//!
//! - [`types`] - Core SAML types and data structures
//! - [`bindings`] - POST and Redirect binding implementations
//! - [`parser`] - Inbound request extraction
//! - [`builder`] - Outbound message rendering
//! - [`signature`] - Canonicalization, signing and verification
//! - [`orchestrator`] - SSO/SLO flows over the pieces above
//! - [`endpoints`] - Axum HTTP handlers for SAML endpoints
//! - [`settings`] - Plain configuration structs
//! - [`error`] - Error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sso_protocol_saml::{endpoints::{saml_router, SamlState}, Orchestrator};
//!
//! let orchestrator = Arc::new(Orchestrator::new(idp, sp, flow, material, None)?);
//! let app = axum::Router::new()
//!     .merge(saml_router())
//!     .with_state(SamlState::new(orchestrator, Arc::new(resolver)));
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod builder;
pub mod endpoints;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod settings;
pub mod signature;
pub mod types;

pub use builder::AssertionBuilder;
pub use error::{SamlError, SamlResult};
pub use orchestrator::{
    LogoutMessage, Orchestrator, PrincipalResolver, SloBranch, SloOutcome, SsoOutcome,
};
pub use parser::RequestParser;
pub use settings::{FlowSettings, IdpLogoutMode, IdpSettings, ServiceProviderSettings};
pub use signature::{SigningMaterial, XmlSigner, XmlSignatureVerifier};
pub use types::*;
