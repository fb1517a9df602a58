//! HTTP-Redirect Binding implementation.
//!
//! Messages travel as a query parameter: raw DEFLATE (RFC 1951, no zlib
//! header), then base64, then URL escaping.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};

use super::{normalize_base64, utf8, DecodedMessage, SamlMessageType};

/// Upper bound on an inflated message.
const MAX_INFLATED_LEN: u64 = 512 * 1024;

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes XML into a ready-to-append query value.
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub fn encode(xml: &str) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);
        Ok(urlencoding::encode(&encoded).into_owned())
    }

    /// Decodes a `SAMLRequest`/`SAMLResponse` value back into XML.
    ///
    /// Accepts the value either still URL-escaped or already decoded by the
    /// web framework.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MalformedBinding`] if the value is not escaped
    /// base64 of a raw DEFLATE stream holding UTF-8 text.
    pub fn decode(value: &str) -> SamlResult<String> {
        let url_decoded = urlencoding::decode(value)
            .map_err(|e| SamlError::MalformedBinding(format!("URL decode error: {e}")))?;

        let compressed = base64::engine::general_purpose::STANDARD
            .decode(normalize_base64(&url_decoded))?;

        utf8(deflate_decompress(&compressed)?)
    }

    /// Builds a complete redirect URL for `xml` under `base`.
    ///
    /// The message parameter is joined with `?` or `&` depending on whether
    /// `base` already carries a query; `RelayState` follows when present.
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub fn redirect_url(
        base: &str,
        message_type: SamlMessageType,
        xml: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let encoded = Self::encode(xml)?;
        let separator = if base.contains('?') { '&' } else { '?' };

        let mut url = format!("{base}{separator}{}={encoded}", message_type.form_param());
        if let Some(rs) = relay_state {
            url.push_str("&RelayState=");
            url.push_str(&urlencoding::encode(rs));
        }

        Ok(url)
    }

    /// Decodes the message carried by a full redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, carries no SAML parameter,
    /// or the parameter does not decode.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::MalformedBinding(format!("invalid URL: {e}")))?;

        let mut message = None;
        let mut relay_state = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "SAMLRequest" => message = Some((value.into_owned(), SamlMessageType::Request)),
                "SAMLResponse" => message = Some((value.into_owned(), SamlMessageType::Response)),
                "RelayState" => relay_state = Some(value.into_owned()),
                _ => {}
            }
        }

        let (encoded, message_type) = message.ok_or_else(|| {
            SamlError::MalformedBinding("no SAMLRequest or SAMLResponse parameter".to_string())
        })?;

        Ok(DecodedMessage {
            xml: Self::decode(&encoded)?,
            message_type,
            relay_state,
        })
    }
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Internal(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Internal(format!("compression finish error: {e}")))
}

/// Decompresses raw DEFLATE data.
///
/// Output beyond [`MAX_INFLATED_LEN`] is rejected rather than buffered.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_INFLATED_LEN + 1)
        .read_to_end(&mut out)
        .map_err(|e| SamlError::MalformedBinding(format!("deflate: {e}")))?;

    if out.len() as u64 > MAX_INFLATED_LEN {
        return Err(SamlError::MalformedBinding(format!(
            "inflated message exceeds {MAX_INFLATED_LEN} bytes"
        )));
    }
    Ok(out)
}
