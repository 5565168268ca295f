//! XML character classification (XML 1.0 §2.3).
//!
//! Total predicates over single code points. The rest of the engine
//! operates on UTF-8 `&str` input; byte-oriented fast paths in the reader
//! defer to these predicates for anything outside ASCII.

/// Returns `true` if `c` is XML whitespace (`#x20 | #x9 | #xD | #xA`).
#[must_use]
pub fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Returns `true` if every character of `s` satisfies [`is_space`].
///
/// The empty string counts as all-whitespace.
#[must_use]
pub fn is_all_space(s: &str) -> bool {
    s.chars().all(is_space)
}

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
#[must_use]
pub fn is_name_start(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 `[4a]`.
#[must_use]
pub fn is_name_char(c: char) -> bool {
    is_name_start(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Returns `true` if `c` is an ASCII decimal digit.
#[must_use]
pub fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// Returns `true` if `c` is an ASCII hexadecimal digit.
#[must_use]
pub fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Returns `true` if `c` may appear in an XML declaration version string
/// (`VersionNum ::= ([a-zA-Z0-9_.:] | '-')+`).
#[must_use]
pub fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// Returns `true` if `s` is a non-empty version string made entirely of
/// version characters.
#[must_use]
pub fn is_version_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_version_char)
}
