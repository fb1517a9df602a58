//! SAML 2.0 types and data structures.

mod constants;
mod identity;
mod message;

pub use constants::*;
pub use identity::*;
pub use message::*;
