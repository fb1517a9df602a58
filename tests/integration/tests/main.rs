//! End-to-End Integration Tests
//!
//! These tests drive the complete server router in-process with
//! `tower::ServiceExt::oneshot`, using the PEM fixtures under
//! `tests/fixtures`.

mod common;
mod saml_endpoints;
