//! Encoding detection and transcoding.
//!
//! Implements byte-order-mark sniffing and transcoding of the input byte
//! stream to UTF-8, bridging to `encoding_rs` for character encoding
//! conversion. The parser itself consumes UTF-8; this module is the
//! boundary that feeds it.
//!
//! BOM resolution order:
//!
//! 1. `EF BB BF` → UTF-8
//! 2. `00 00 FE FF` → UTF-32BE
//! 3. `FF FE 00 00` → UTF-32LE
//! 4. `FE FF` → UTF-16BE
//! 5. `FF FE` → UTF-16LE
//! 6. no BOM → raw UTF-8
//!
//! UTF-32 is decoded manually (`encoding_rs` does not carry it); the
//! UTF-16 variants and anything named by an `encoding` declaration go
//! through `encoding_rs`.

use std::fmt;

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// The encoding indicated by a byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    /// UTF-8, with or without a BOM.
    Utf8,
    /// UTF-16 big-endian (`FE FF`).
    Utf16Be,
    /// UTF-16 little-endian (`FF FE`).
    Utf16Le,
    /// UTF-32 big-endian (`00 00 FE FF`).
    Utf32Be,
    /// UTF-32 little-endian (`FF FE 00 00`).
    Utf32Le,
}

/// Detects the encoding of an XML byte stream from its byte-order mark.
///
/// Returns the detected encoding and the number of BOM bytes to skip.
/// Without a BOM the input defaults to UTF-8.
///
/// # Examples
///
/// ```
/// use oxdom::encoding::{detect_encoding, DetectedEncoding};
///
/// let (enc, skip) = detect_encoding(b"\xEF\xBB\xBFhello");
/// assert_eq!(enc, DetectedEncoding::Utf8);
/// assert_eq!(skip, 3);
///
/// let (enc, skip) = detect_encoding(b"<root/>");
/// assert_eq!(enc, DetectedEncoding::Utf8);
/// assert_eq!(skip, 0);
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (DetectedEncoding, usize) {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        (DetectedEncoding::Utf8, 3)
    } else if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        (DetectedEncoding::Utf32Be, 4)
    } else if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        (DetectedEncoding::Utf32Le, 4)
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        (DetectedEncoding::Utf16Be, 2)
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        (DetectedEncoding::Utf16Le, 2)
    } else {
        (DetectedEncoding::Utf8, 0)
    }
}

/// Transcodes bytes from a named encoding into a UTF-8 `String` via
/// `encoding_rs`.
///
/// # Errors
///
/// Returns `EncodingError` if the encoding name is not recognized or the
/// input contains malformed sequences.
pub fn transcode(bytes: &[u8], encoding_name: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(encoding_name.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {encoding_name}")))?;
    let (result, _used_encoding, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {encoding_name}"
        )));
    }
    Ok(result.into_owned())
}

/// Decodes raw XML bytes into UTF-8, resolving the BOM first and then
/// honoring an `encoding` declaration when present.
///
/// # Errors
///
/// Returns `EncodingError` if the bytes contain invalid sequences for the
/// detected encoding or the declared encoding is unsupported.
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (detected, bom_skip) = detect_encoding(bytes);
    let content = &bytes[bom_skip..];

    match detected {
        DetectedEncoding::Utf8 => {
            if let Ok(s) = std::str::from_utf8(content) {
                // Valid UTF-8; an encoding declaration may still name a
                // different (ASCII-compatible) encoding.
                if let Some(declared) = extract_xml_decl_encoding(s) {
                    if !is_utf8_label(&declared) {
                        return transcode(content, &declared);
                    }
                }
                return Ok(s.to_string());
            }
            // Not valid UTF-8 and no BOM: the declaration is ASCII, so a
            // declared encoding can still be extracted from raw bytes.
            if let Some(declared) = extract_encoding_from_ascii_bytes(content) {
                return transcode(content, &declared);
            }
            Err(EncodingError::new("input is not valid UTF-8"))
        }
        DetectedEncoding::Utf16Be => transcode(content, "UTF-16BE"),
        DetectedEncoding::Utf16Le => transcode(content, "UTF-16LE"),
        DetectedEncoding::Utf32Be => decode_utf32(content, true),
        DetectedEncoding::Utf32Le => decode_utf32(content, false),
    }
}

/// Decodes UTF-32 code units into a UTF-8 string.
fn decode_utf32(bytes: &[u8], big_endian: bool) -> Result<String, EncodingError> {
    if bytes.len() % 4 != 0 {
        return Err(EncodingError::new(
            "UTF-32 input length is not a multiple of four",
        ));
    }
    let mut out = String::with_capacity(bytes.len() / 4);
    for unit in bytes.chunks_exact(4) {
        let value = if big_endian {
            u32::from_be_bytes([unit[0], unit[1], unit[2], unit[3]])
        } else {
            u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])
        };
        let ch = char::from_u32(value).ok_or_else(|| {
            EncodingError::new(format!("invalid UTF-32 code point U+{value:04X}"))
        })?;
        out.push(ch);
    }
    Ok(out)
}

/// Extracts the `encoding` attribute value from an XML declaration with a
/// lightweight scan (no full parse).
fn extract_xml_decl_encoding(text: &str) -> Option<String> {
    let decl_end = text.find("?>")?;
    let decl = &text[..decl_end];
    if !decl.starts_with("<?xml") {
        return None;
    }
    let enc_pos = decl.find("encoding")?;
    let after = decl[enc_pos + "encoding".len()..].trim_start();
    let after = after.strip_prefix('=')?.trim_start();
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &after[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Extracts the `encoding` attribute from raw bytes treated as ASCII.
/// Used when the input is not valid UTF-8 and carries no BOM.
fn extract_encoding_from_ascii_bytes(bytes: &[u8]) -> Option<String> {
    let limit = bytes.len().min(200);
    let scan = &bytes[..limit];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let decl_end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[..decl_end];

    let needle = b"encoding";
    let enc_pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let after = skip_ascii_whitespace(&decl[enc_pos + needle.len()..]);
    if after.first() != Some(&b'=') {
        return None;
    }
    let after = skip_ascii_whitespace(&after[1..]);
    let quote = *after.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let rest = &after[1..];
    let end = rest.iter().position(|&b| b == quote)?;
    let name = &rest[..end];
    if name.iter().all(u8::is_ascii) {
        Some(String::from_utf8_lossy(name).into_owned())
    } else {
        None
    }
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

fn is_utf8_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
}
