//! Tolerant pattern extraction.
//!
//! Works on raw text, so it recovers fields from documents the XML reader
//! rejects. Prefixes are ignored by matching on the part after `:`.
//! Every lookup is a single forward walk over the text.

use super::Extracted;

/// Documents longer than this are not scanned.
pub(super) const MAX_INPUT_LEN: usize = 64 * 1024;

/// Recovers what it can from `xml`. Never fails.
pub(super) fn extract(xml: &str) -> Extracted {
    if xml.len() > MAX_INPUT_LEN {
        return Extracted::default();
    }
    let Some(root) = first_tag(xml) else {
        return Extracted::default();
    };

    let name_id_tag = find_open_tag(xml, "NameID");

    Extracted {
        root: Some(local_name(root.name).to_string()),
        id: attribute(root.text, "ID"),
        issuer: element_content(xml, "Issuer"),
        name_id: name_id_tag.and_then(|tag| content_after(xml, tag)),
        name_id_format: name_id_tag.and_then(|tag| attribute(tag.text, "Format")),
        session_index: element_content(xml, "SessionIndex"),
        destination: attribute(root.text, "Destination"),
        acs_url: attribute(root.text, "AssertionConsumerServiceURL"),
    }
}

#[derive(Debug, Clone, Copy)]
struct Tag<'a> {
    /// Qualified name.
    name: &'a str,
    /// The whole opening tag, `<` through `>`.
    text: &'a str,
    /// Byte offset just past `>`.
    end: usize,
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Tags in document order.
///
/// A tag runs to the next `>`, or stops short of the next `<` when the `>`
/// is missing, and the walk resumes where the tag ended.
fn tags(xml: &str) -> impl Iterator<Item = Tag<'_>> {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        let start = cursor + xml[cursor..].find('<')?;
        let body = start + 1;
        let stop = xml[body..]
            .find(['<', '>'])
            .map_or(xml.len(), |pos| body + pos);
        let end = if xml[stop..].starts_with('>') { stop + 1 } else { stop };
        cursor = end;

        let inner = &xml[body..stop];
        let name_len = inner
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(inner.len());
        Some(Tag {
            name: &inner[..name_len],
            text: &xml[start..end],
            end,
        })
    })
}

/// First element opening tag, skipping declarations, comments and PIs.
fn first_tag(xml: &str) -> Option<Tag<'_>> {
    tags(xml).find(|tag| !tag.name.is_empty() && !tag.name.starts_with(['?', '!']))
}

fn find_open_tag<'a>(xml: &'a str, local: &str) -> Option<Tag<'a>> {
    tags(xml).find(|tag| !tag.name.is_empty() && local_name(tag.name) == local)
}

fn content_after(xml: &str, tag: Tag<'_>) -> Option<String> {
    if tag.text.ends_with("/>") {
        return None;
    }
    let body = &xml[tag.end..];
    let end = body.find("</").unwrap_or(body.len());
    let value = unescape(body[..end].trim());
    (!value.is_empty()).then_some(value)
}

fn element_content(xml: &str, local: &str) -> Option<String> {
    find_open_tag(xml, local).and_then(|tag| content_after(xml, tag))
}

/// Reads `name="..."` or `name='...'` from an opening tag.
fn attribute(tag: &str, name: &str) -> Option<String> {
    let mut search = 0;
    while let Some(found) = tag[search..].find(name) {
        let pos = search + found;
        search = pos + name.len();

        let preceded_ok = tag[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_whitespace() || c == ':');
        let after = tag[search..].trim_start();
        let Some(after_eq) = after.strip_prefix('=') else {
            continue;
        };
        if !preceded_ok {
            continue;
        }

        let after_eq = after_eq.trim_start();
        let quote = after_eq.chars().next()?;
        if quote != '"' && quote != '\'' {
            continue;
        }
        let value = &after_eq[1..];
        let end = value.find(quote)?;
        return Some(unescape(&value[..end]));
    }
    None
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
