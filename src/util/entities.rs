//! Entity table: entity name ↔ replacement text.
//!
//! The table is pre-seeded with the five predefined XML entities
//! (`lt`, `gt`, `amp`, `apos`, `quot`). Entities declared in a DOCTYPE
//! internal subset are inserted during parsing and resolved on lookup.
//!
//! [`decode`] resolves character references (`&#N;`, `&#xH;`) and named
//! references against a table; [`encode`] always escapes the five
//! predefined specials regardless of table contents.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{ErrorKind, XmlError};

/// A mapping from entity name to replacement text.
#[derive(Debug, Clone)]
pub struct EntityTable {
    map: HashMap<String, String>,
}

impl EntityTable {
    /// Creates a table seeded with the five predefined XML entities.
    #[must_use]
    pub fn new() -> Self {
        let mut map = HashMap::with_capacity(8);
        map.insert("lt".to_string(), "<".to_string());
        map.insert("gt".to_string(), ">".to_string());
        map.insert("amp".to_string(), "&".to_string());
        map.insert("apos".to_string(), "'".to_string());
        map.insert("quot".to_string(), "\"".to_string());
        Self { map }
    }

    /// Adds or replaces a custom entity.
    pub fn insert(&mut self, name: &str, replacement: &str) {
        self.map.insert(name.to_string(), replacement.to_string());
    }

    /// Looks up the replacement text for an entity name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Returns `true` if the table knows the given entity name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Returns the number of known entities (including the predefined five).
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `false` always; the predefined entities are never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes the five predefined specials (`& < > ' "`) as named entity
/// references.
///
/// Returns the input unchanged (borrowed) when it contains none of them.
#[must_use]
pub fn encode(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '\'', '"']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Resolves all character and entity references in `text` against `table`.
///
/// Returns the input unchanged (borrowed) when it contains no `&`.
///
/// # Errors
///
/// Returns `unknown-entity` for a named reference missing from the table,
/// and `unexpected-char` for a malformed reference.
pub fn decode<'a>(text: &'a str, table: &EntityTable) -> Result<Cow<'a, str>, XmlError> {
    if !text.contains('&') {
        return Ok(Cow::Borrowed(text));
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let semi = rest.find(';').ok_or_else(|| {
            XmlError::new(ErrorKind::UnexpectedChar, "unterminated entity reference")
        })?;
        let body = &rest[1..semi];
        decode_reference(body, table, &mut out)?;
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

/// Resolves one reference body (the text between `&` and `;`) into `out`.
pub(crate) fn decode_reference(
    body: &str,
    table: &EntityTable,
    out: &mut String,
) -> Result<(), XmlError> {
    if let Some(digits) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        let value = u32::from_str_radix(digits, 16).map_err(|_| {
            XmlError::new(
                ErrorKind::UnexpectedChar,
                format!("invalid hex character reference '&#{};'", &body[1..]),
            )
        })?;
        out.push(char_for(value)?);
    } else if let Some(digits) = body.strip_prefix('#') {
        let value = digits.parse::<u32>().map_err(|_| {
            XmlError::new(
                ErrorKind::UnexpectedChar,
                format!("invalid decimal character reference '&#{digits};'"),
            )
        })?;
        out.push(char_for(value)?);
    } else if let Some(replacement) = table.get(body) {
        out.push_str(replacement);
    } else {
        return Err(XmlError::new(
            ErrorKind::UnknownEntity,
            format!("unknown entity '&{body};'"),
        ));
    }
    Ok(())
}

fn char_for(value: u32) -> Result<char, XmlError> {
    char::from_u32(value).ok_or_else(|| {
        XmlError::new(
            ErrorKind::UnexpectedChar,
            format!("character reference U+{value:04X} is not a character"),
        )
    })
}
