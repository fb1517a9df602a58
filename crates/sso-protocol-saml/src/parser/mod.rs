//! Inbound request parsing.
//!
//! [`RequestParser::parse`] undoes the binding, then reads the message with a
//! streaming XML reader that only looks at local names, so `samlp:`, `saml2p:`
//! or no prefix at all parse the same. When that pass cannot produce an `ID`
//! (malformed XML, unexpected structure) an independent pattern extractor
//! fills whatever it can recover. Both paths feed the same
//! [`ProtocolMessage`].

mod pattern;
mod structured;

use tracing::debug;

use crate::bindings::InboundBinding;
use crate::error::{SamlError, SamlResult};
use crate::types::{MessageKind, ProtocolMessage};

/// Longest accepted request `ID`.
const MAX_ID_LEN: usize = 256;

/// Longest accepted value for any other field; longer values are dropped.
const MAX_FIELD_LEN: usize = 4096;

/// Fields recovered by one extraction pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Extracted {
    pub root: Option<String>,
    pub id: Option<String>,
    pub issuer: Option<String>,
    pub name_id: Option<String>,
    pub name_id_format: Option<String>,
    pub session_index: Option<String>,
    pub destination: Option<String>,
    pub acs_url: Option<String>,
}

impl Extracted {
    fn is_complete(&self) -> bool {
        self.root.is_some() && self.id.is_some()
    }

    /// Fills fields still missing from `other`.
    fn fill_from(&mut self, other: Self) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.root, other.root);
        fill(&mut self.id, other.id);
        fill(&mut self.issuer, other.issuer);
        fill(&mut self.name_id, other.name_id);
        fill(&mut self.name_id_format, other.name_id_format);
        fill(&mut self.session_index, other.session_index);
        fill(&mut self.destination, other.destination);
        fill(&mut self.acs_url, other.acs_url);
    }
}

/// Parses inbound AuthnRequest and LogoutRequest messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParser;

impl RequestParser {
    /// Decodes `raw` per `binding` and extracts a [`ProtocolMessage`].
    ///
    /// `relay_state` is carried through untouched.
    ///
    /// # Errors
    ///
    /// [`SamlError::MalformedBinding`] if the binding cannot be undone, and
    /// [`SamlError::InvalidRequest`] if neither pass recovers an `ID`.
    pub fn parse(
        binding: InboundBinding,
        raw: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<ProtocolMessage> {
        let xml = binding.decode(raw)?;
        Self::parse_xml(&xml, relay_state)
    }

    /// Extracts a [`ProtocolMessage`] from already decoded XML.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidRequest`] if no usable `ID` is found.
    pub fn parse_xml(xml: &str, relay_state: Option<&str>) -> SamlResult<ProtocolMessage> {
        let mut fields = match structured::extract(xml) {
            Ok(fields) => fields,
            Err(e) => {
                debug!(error = %e, "Structured parse failed, using pattern extraction");
                Extracted::default()
            }
        };

        if !fields.is_complete() {
            debug!("Structured parse incomplete, filling from pattern extraction");
            fields.fill_from(pattern::extract(xml));
        }

        let id = fields
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SamlError::InvalidRequest("request carries no ID".to_string()))?;
        if id.len() > MAX_ID_LEN {
            return Err(SamlError::InvalidRequest(format!(
                "request ID exceeds {MAX_ID_LEN} characters"
            )));
        }

        let bounded = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && v.len() <= MAX_FIELD_LEN)
        };

        let message = ProtocolMessage {
            kind: fields
                .root
                .as_deref()
                .map_or_else(|| MessageKind::Other(String::new()), MessageKind::from_local_name),
            id,
            issuer: bounded(fields.issuer),
            name_id: bounded(fields.name_id),
            name_id_format: bounded(fields.name_id_format),
            session_index: bounded(fields.session_index),
            destination: bounded(fields.destination),
            assertion_consumer_service_url: bounded(fields.acs_url),
            relay_state: relay_state.map(String::from),
        };

        debug!(
            kind = ?message.kind,
            id = %message.id,
            issuer = message.issuer.as_deref().unwrap_or("-"),
            has_name_id = message.name_id.is_some(),
            has_session_index = message.session_index.is_some(),
            "Parsed SAML request"
        );

        Ok(message)
    }
}
