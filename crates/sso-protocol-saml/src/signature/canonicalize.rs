//! XML canonicalization.
//!
//! [`ExclusiveC14n`] implements Exclusive XML Canonicalization 1.0 without
//! comments over a streaming reader. [`TrimmedText`] passes the serialized
//! text through with only the XML declaration and outer whitespace removed;
//! it is only sound when the producer already emits canonical XML.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::PrefixDeclaration;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};

/// Namespace bound to the reserved `xml` prefix.
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Turns an XML fragment into the exact bytes that are digested or signed.
pub trait Canonicalizer: fmt::Debug + Send + Sync {
    /// Short name for logs and configuration.
    fn name(&self) -> &'static str;

    /// Canonicalizes `xml`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::XmlParse`] if the input is not well-formed.
    fn canonicalize(&self, xml: &str) -> SamlResult<String>;
}

/// Selectable canonicalization strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalizationMethod {
    /// [`ExclusiveC14n`].
    #[default]
    Exclusive,
    /// [`TrimmedText`].
    Trimmed,
}

impl CanonicalizationMethod {
    /// Parses a configuration value.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "exclusive" | "exc-c14n" | "exc_c14n" => Some(Self::Exclusive),
            "trimmed" | "trimmed-text" => Some(Self::Trimmed),
            _ => None,
        }
    }

    /// Returns the implementation for this method.
    #[must_use]
    pub fn canonicalizer(self) -> Arc<dyn Canonicalizer> {
        match self {
            Self::Exclusive => Arc::new(ExclusiveC14n),
            Self::Trimmed => Arc::new(TrimmedText),
        }
    }
}

/// The serialized text, minus XML declaration and surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimmedText;

impl Canonicalizer for TrimmedText {
    fn name(&self) -> &'static str {
        "trimmed"
    }

    fn canonicalize(&self, xml: &str) -> SamlResult<String> {
        let mut rest = xml.trim_start();
        if rest.starts_with("<?xml") {
            let end = rest
                .find("?>")
                .ok_or_else(|| SamlError::XmlParse("unterminated XML declaration".to_string()))?;
            rest = rest[end + 2..].trim_start();
        }
        Ok(rest.trim_end().to_string())
    }
}

/// Exclusive XML Canonicalization 1.0, without comments.
///
/// - namespace declarations are emitted only where visibly utilized and not
///   already in effect from an output ancestor, sorted by prefix
/// - attributes sorted by namespace URI, then local name
/// - empty elements expanded to start/end pairs
/// - C14N escaping for text and attribute values
/// - XML declaration, DOCTYPE, comments and anything outside the document
///   element dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct ExclusiveC14n;

impl Canonicalizer for ExclusiveC14n {
    fn name(&self) -> &'static str {
        "exclusive"
    }

    fn canonicalize(&self, xml: &str) -> SamlResult<String> {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.trim_text(false);

        let mut out = String::with_capacity(xml.len());
        let mut scopes = Scopes::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => scopes.open(&e, &mut out)?,
                Event::End(e) => {
                    out.push_str("</");
                    out.push_str(utf8(e.name().as_ref())?);
                    out.push('>');
                    scopes.close();
                }
                Event::Text(t) if scopes.depth() > 0 => {
                    escape_text(&mut out, &text_value(&t)?);
                }
                Event::CData(c) if scopes.depth() > 0 => {
                    escape_text(&mut out, &normalize_newlines(utf8(&c)?));
                }
                Event::PI(pi) if scopes.depth() > 0 => {
                    out.push_str("<?");
                    out.push_str(utf8(&pi)?);
                    out.push_str("?>");
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if scopes.depth() != 0 {
            return Err(SamlError::XmlParse("unclosed element".to_string()));
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct Frame {
    /// Declarations in the source on this element.
    declared: Vec<(String, String)>,
    /// Declarations emitted on this element.
    rendered: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    fn depth(&self) -> usize {
        self.frames.len()
    }

    fn in_scope(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.declared.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn rendered(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.rendered.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn resolve(&self, prefix: &str) -> SamlResult<String> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE.to_string());
        }
        match self.in_scope(prefix) {
            Some(uri) => Ok(uri.to_string()),
            None if prefix.is_empty() => Ok(String::new()),
            None => Err(SamlError::XmlParse(format!("unbound prefix '{prefix}'"))),
        }
    }

    /// Writes the canonical start tag of `e` and pushes its scope.
    fn open(&mut self, e: &BytesStart<'_>, out: &mut String) -> SamlResult<()> {
        let qname = utf8(e.name().as_ref())?.to_string();
        let mut frame = Frame::default();
        let mut plain: Vec<(String, String)> = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let value = attribute_value(&attr)?;
            match attr.key.as_namespace_binding() {
                Some(PrefixDeclaration::Default) => frame.declared.push((String::new(), value)),
                Some(PrefixDeclaration::Named(p)) => {
                    let prefix = utf8(p)?;
                    if prefix != "xml" {
                        frame.declared.push((prefix.to_string(), value));
                    }
                }
                None => plain.push((utf8(attr.key.as_ref())?.to_string(), value)),
            }
        }
        self.frames.push(frame);

        let mut utilized = vec![prefix_of(&qname).to_string()];
        for (name, _) in &plain {
            let prefix = prefix_of(name);
            if !prefix.is_empty() && !utilized.iter().any(|p| p == prefix) {
                utilized.push(prefix.to_string());
            }
        }

        let mut namespaces = Vec::new();
        for prefix in utilized.into_iter().filter(|p| p != "xml") {
            let uri = self.resolve(&prefix)?;
            let current = self.rendered(&prefix);
            let already = match current {
                Some(rendered) => rendered == uri,
                None => uri.is_empty(),
            };
            if !already {
                namespaces.push((prefix, uri));
            }
        }
        namespaces.sort();

        let mut attributes = Vec::with_capacity(plain.len());
        for (name, value) in plain {
            let prefix = prefix_of(&name);
            let uri = if prefix.is_empty() {
                String::new()
            } else {
                self.resolve(prefix)?
            };
            let local = local_of(&name).to_string();
            attributes.push((uri, local, name, value));
        }
        attributes.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        out.push('<');
        out.push_str(&qname);
        for (prefix, uri) in &namespaces {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            escape_attribute(out, uri);
            out.push('"');
        }
        for (_, _, name, value) in &attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_attribute(out, value);
            out.push('"');
        }
        out.push('>');

        if let Some(frame) = self.frames.last_mut() {
            frame.rendered = namespaces;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.frames.pop();
    }
}

fn prefix_of(qname: &str) -> &str {
    qname.split_once(':').map_or("", |(prefix, _)| prefix)
}

fn local_of(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::XmlParse(format!("invalid UTF-8: {e}")))
}

/// Line-end normalization as an XML processor performs it.
fn normalize_newlines(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn unescape(raw: &str) -> SamlResult<String> {
    quick_xml::escape::unescape(raw)
        .map(Cow::into_owned)
        .map_err(|e| SamlError::XmlParse(format!("bad reference: {e}")))
}

fn text_value(raw: &[u8]) -> SamlResult<String> {
    unescape(&normalize_newlines(utf8(raw)?))
}

/// Attribute-value normalization: literal whitespace becomes a space,
/// character references survive.
fn attribute_value(attr: &Attribute<'_>) -> SamlResult<String> {
    let raw = utf8(&attr.value)?;
    let normalized: String = raw
        .replace("\r\n", " ")
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect();
    unescape(&normalized)
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
