//! Transport encoding for the contents API.
//!
//! The remote store carries file bodies as base64 of the raw bytes. Text is
//! always UTF-8 before it is base64-encoded, so every codepoint survives the
//! round trip. Decoding is strict: malformed base64 or invalid UTF-8 is an
//! error, never a string full of replacement characters.

use base64::{Engine as _, engine::general_purpose};

use crate::error::{NoteError, Result};

/// Encode text for transport: UTF-8 bytes, then standard base64.
pub fn encode_text(text: &str) -> String {
    encode_bytes(text.as_bytes())
}

/// Decode transport text back into a string.
pub fn decode_text(transport: &str) -> Result<String> {
    let bytes = decode_bytes(transport)?;
    utf8_text(bytes)
}

/// Encode raw bytes as standard base64.
pub fn encode_bytes(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring ASCII whitespace.
///
/// The contents API wraps its base64 payload with a newline every 60 columns.
pub fn decode_bytes(transport: &str) -> Result<Vec<u8>> {
    let compact: String = transport
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| NoteError::Decoding(format!("invalid base64: {}", e)))
}

/// Decode base64 that may use the URL-safe alphabet and may lack padding.
///
/// Encrypted token bundles are produced by external tooling that is not
/// consistent about either, so bundle fields go through this instead of
/// [`decode_bytes`].
pub fn decode_lenient(encoded: &str) -> Result<Vec<u8>> {
    let mut normalized: String = encoded
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }

    general_purpose::STANDARD
        .decode(normalized.as_bytes())
        .map_err(|e| NoteError::Decoding(format!("invalid base64 '{}': {}", encoded, e)))
}

/// Strict UTF-8 conversion.
pub fn utf8_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| NoteError::Decoding(format!("invalid UTF-8: {}", e)))
}
