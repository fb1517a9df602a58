//! Structured extraction over a streaming XML reader.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::Extracted;
use crate::error::SamlResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Issuer,
    NameId,
    SessionIndex,
}

/// Reads the message by local names only.
///
/// Returns whatever could be read before the end of input; an `Err` means
/// the document is not well-formed.
pub(super) fn extract(xml: &str) -> SamlResult<Extracted> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Extracted::default();
    let mut depth = 0usize;
    let mut capture: Option<(Field, usize)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if let Some(field) = open_element(&e, depth, &mut out)? {
                    if capture.is_none() {
                        capture = Some((field, depth));
                        text.clear();
                    }
                }
            }
            Event::Empty(e) => {
                open_element(&e, depth + 1, &mut out)?;
            }
            Event::Text(t) => {
                if capture.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if let Some((field, at)) = capture {
                    if at == depth {
                        store(&mut out, field, std::mem::take(&mut text));
                        capture = None;
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

/// Records attributes of an opening tag and reports whether its content
/// should be captured.
fn open_element(e: &BytesStart<'_>, depth: usize, out: &mut Extracted) -> SamlResult<Option<Field>> {
    let local = e.local_name();

    if depth == 1 && out.root.is_none() {
        out.root = Some(String::from_utf8_lossy(local.as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.local_name().as_ref() {
                b"ID" => out.id = Some(value),
                b"Destination" => out.destination = Some(value),
                b"AssertionConsumerServiceURL" => out.acs_url = Some(value),
                _ => {}
            }
        }
        return Ok(None);
    }

    let field = match local.as_ref() {
        b"Issuer" if depth == 2 && out.issuer.is_none() => Some(Field::Issuer),
        b"NameID" if out.name_id.is_none() => {
            for attr in e.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                if attr.key.local_name().as_ref() == b"Format" {
                    out.name_id_format = Some(attr.unescape_value()?.into_owned());
                }
            }
            Some(Field::NameId)
        }
        b"SessionIndex" if out.session_index.is_none() => Some(Field::SessionIndex),
        _ => None,
    };

    Ok(field)
}

fn store(out: &mut Extracted, field: Field, value: String) {
    let slot = match field {
        Field::Issuer => &mut out.issuer,
        Field::NameId => &mut out.name_id,
        Field::SessionIndex => &mut out.session_index,
    };
    *slot = Some(value);
}
