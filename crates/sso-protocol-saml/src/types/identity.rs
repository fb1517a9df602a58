//! The authenticated principal and the assertion issued about it.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use super::NameIdFormat;

/// A principal as reported by the local authenticator.
///
/// The authenticator has already verified credentials; nothing here is
/// checked again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier.
    pub subject: String,

    /// Email address, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Additional attributes, in release order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl Principal {
    /// Creates a principal with only a subject.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Returns the value released as the NameID for `format`.
    ///
    /// Email format prefers the email address and falls back to the subject.
    #[must_use]
    pub fn name_id_for(&self, format: NameIdFormat) -> &str {
        match (format, &self.email) {
            (NameIdFormat::Email, Some(email)) => email,
            _ => &self.subject,
        }
    }
}

/// What the IdP asserts about a principal for one response.
///
/// Built once per response and consumed by the builder; it has no setters
/// so the validity window cannot drift from `issued_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAssertion {
    subject_id: String,
    name_id_format: NameIdFormat,
    attributes: Vec<(String, String)>,
    session_index: String,
    issued_at: DateTime<Utc>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

impl IdentityAssertion {
    /// Builds the assertion for `principal`, valid for `validity` from `now`.
    ///
    /// `now` is truncated to whole seconds so the rendered timestamps and the
    /// stored values agree. The email, when present, is released first as the
    /// `email` attribute, followed by the principal's attributes in order.
    #[must_use]
    pub fn for_principal(
        principal: &Principal,
        name_id_format: NameIdFormat,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let issued_at = now.duration_trunc(Duration::seconds(1)).unwrap_or(now);

        let mut attributes = Vec::with_capacity(principal.attributes.len() + 1);
        if let Some(email) = &principal.email {
            attributes.push(("email".to_string(), email.clone()));
        }
        attributes.extend(principal.attributes.iter().cloned());

        Self {
            subject_id: principal.name_id_for(name_id_format).to_string(),
            name_id_format,
            attributes,
            session_index: crate::builder::generate_id(),
            issued_at,
            valid_from: issued_at,
            valid_until: issued_at
                .checked_add_signed(validity)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// NameID value.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// NameID format.
    #[must_use]
    pub const fn name_id_format(&self) -> NameIdFormat {
        self.name_id_format
    }

    /// Released attributes, in order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Session index the SP echoes back on logout.
    #[must_use]
    pub fn session_index(&self) -> &str {
        &self.session_index
    }

    /// Issue instant.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Start of the validity window.
    #[must_use]
    pub const fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// End of the validity window (exclusive).
    #[must_use]
    pub const fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }
}
