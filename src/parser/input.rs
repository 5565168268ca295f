//! Low-level input handling for the parser.
//!
//! [`Reader`] presents a forward cursor over the source with single-unit
//! lookahead, 1-based line/column tracking for diagnostics, and the
//! reading primitives the parser state machine is built from: name
//! reading per the XML name production, quoted literals, attribute values
//! with entity decoding, raw runs up to a delimiter, and text runs up to
//! the next `<`.
//!
//! End of input in the middle of a token, or a character violating the
//! grammar, raises an [`XmlError`] carrying the source location.

use crate::error::{ErrorKind, SourceLocation, XmlError};
use crate::util::chars;
use crate::util::entities::{self, EntityTable};

/// A forward cursor over UTF-8 XML source.
pub(crate) struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    // --- Position ---

    /// Returns `true` if all input has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The current source location.
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    // --- Peeking ---

    /// The byte at the cursor, without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// The byte at `cursor + offset`, without consuming.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// The character at the cursor, without consuming it.
    pub fn peek_char(&self) -> Option<char> {
        if self.at_end() {
            return None;
        }
        std::str::from_utf8(&self.input[self.pos..])
            .ok()
            .and_then(|s| s.chars().next())
    }

    /// Returns `true` if the remaining input starts with `s`.
    pub fn looking_at(&self, s: &[u8]) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    // --- Advancing ---

    /// Advances by `count` bytes (ASCII only), updating line/column.
    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            if self.pos < self.input.len() {
                if self.input[self.pos] == b'\n' {
                    self.line += 1;
                    self.column = 1;
                } else {
                    self.column += 1;
                }
                self.pos += 1;
            }
        }
    }

    fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += ch.len_utf8();
    }

    /// Consumes the byte at the cursor iff it equals `b`.
    pub fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.advance(1);
            true
        } else {
            false
        }
    }

    /// Consumes and returns the next character, normalizing `\r\n` and a
    /// bare `\r` to `\n` (XML 1.0 §2.11).
    pub fn next_char(&mut self) -> Result<char, XmlError> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.fatal(ErrorKind::UnexpectedEof, "unexpected end of input"))?;
        self.advance_char(ch);
        if ch == '\r' {
            if self.peek() == Some(b'\n') {
                self.advance(1);
            }
            return Ok('\n');
        }
        Ok(ch)
    }

    // --- Expectations ---

    /// Consumes the next byte and requires it to be `expected`.
    pub fn expect_byte(&mut self, expected: u8) -> Result<(), XmlError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(b) => Err(self.fatal(
                ErrorKind::UnexpectedChar,
                format!("expected '{}', found '{}'", expected as char, b as char),
            )),
            None => Err(self.fatal(
                ErrorKind::UnexpectedEof,
                format!("expected '{}', found end of input", expected as char),
            )),
        }
    }

    /// Consumes bytes and requires them to match `expected`.
    pub fn expect_str(&mut self, expected: &[u8]) -> Result<(), XmlError> {
        for &b in expected {
            self.expect_byte(b)?;
        }
        Ok(())
    }

    // --- Whitespace ---

    /// Advances over XML whitespace. Returns `true` if any was consumed.
    pub fn skip_spaces(&mut self) -> bool {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                self.advance(1);
            } else {
                break;
            }
        }
        self.pos > start
    }

    /// Requires at least one whitespace character and advances over the
    /// run.
    pub fn skip_spaces_required(&mut self) -> Result<(), XmlError> {
        if self.skip_spaces() {
            Ok(())
        } else {
            Err(self.fatal(ErrorKind::UnexpectedChar, "whitespace required"))
        }
    }

    /// Copies a whitespace run into `buf`, preserving it verbatim.
    pub fn read_spaces(&mut self, buf: &mut String) {
        while let Some(b) = self.peek() {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                buf.push(b as char);
                self.advance(1);
            } else {
                break;
            }
        }
    }

    // --- Names (XML 1.0 §2.3) ---

    /// Reads an XML `Name`: a name-start character followed by name
    /// characters.
    pub fn read_name(&mut self) -> Result<String, XmlError> {
        let start = self.pos;
        let first = self.peek_char().ok_or_else(|| {
            self.fatal(ErrorKind::UnexpectedEof, "expected name, found end of input")
        })?;
        if !chars::is_name_start(first) {
            return Err(self.fatal(
                ErrorKind::InvalidName,
                format!("invalid name start character '{first}'"),
            ));
        }
        self.advance_char(first);
        while let Some(ch) = self.peek_char() {
            if chars::is_name_char(ch) {
                self.advance_char(ch);
            } else {
                break;
            }
        }
        Ok(self.lexeme(start))
    }

    /// Reads a name atom inside DOCTYPE choice grammars, where keywords
    /// like `#PCDATA`, `#REQUIRED`, `#IMPLIED`, and `#FIXED` carry a
    /// leading `#`.
    pub fn read_choice_name(&mut self) -> Result<String, XmlError> {
        if self.peek() == Some(b'#') {
            let start = self.pos;
            self.advance(1);
            self.read_name()?;
            return Ok(self.lexeme(start));
        }
        self.read_name()
    }

    /// Reads an `Nmtoken`: one or more name characters, with no
    /// constraint on the first (enumeration items may start with digits).
    pub fn read_nmtoken(&mut self) -> Result<String, XmlError> {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if chars::is_name_char(ch) {
                self.advance_char(ch);
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.fatal(ErrorKind::InvalidName, "expected a name token"));
        }
        Ok(self.lexeme(start))
    }

    fn lexeme(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    // --- Quoted literals ---

    /// Reads a quoted literal (single or double quotes) without entity
    /// decoding — system literals, public IDs, enumerations.
    pub fn read_quoted(&mut self) -> Result<String, XmlError> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            Some(b) => {
                return Err(self.fatal(
                    ErrorKind::UnexpectedChar,
                    format!("expected quoted literal, found '{}'", b as char),
                ));
            }
            None => {
                return Err(self.fatal(
                    ErrorKind::UnexpectedEof,
                    "expected quoted literal, found end of input",
                ));
            }
        };
        self.advance(1);
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let value = self.lexeme(start);
                self.advance(1);
                return Ok(value);
            }
            self.advance_char(self.peek_char().unwrap_or('\u{FFFD}'));
        }
        Err(self.fatal(
            ErrorKind::UnexpectedEof,
            "end of input inside quoted literal",
        ))
    }

    /// Reads a quoted attribute value, decoding character and entity
    /// references through `entities` and normalizing embedded whitespace
    /// to spaces.
    pub fn read_attribute_value(
        &mut self,
        buf: &mut String,
        entities: &EntityTable,
    ) -> Result<(), XmlError> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => {
                return Err(self.fatal(
                    ErrorKind::UnexpectedChar,
                    "attribute value must be quoted",
                ));
            }
        };
        self.advance(1);
        loop {
            match self.peek() {
                None => {
                    return Err(self.fatal(
                        ErrorKind::UnexpectedEof,
                        "end of input inside attribute value",
                    ));
                }
                Some(b) if b == quote => {
                    self.advance(1);
                    return Ok(());
                }
                Some(b'&') => self.read_reference(buf, entities)?,
                Some(b'<') => {
                    return Err(self.fatal(
                        ErrorKind::UnexpectedChar,
                        "'<' not allowed in attribute values",
                    ));
                }
                Some(_) => {
                    let ch = self.next_char()?;
                    // Attribute-value normalization (XML 1.0 §3.3.3)
                    if ch == '\n' || ch == '\t' {
                        buf.push(' ');
                    } else {
                        buf.push(ch);
                    }
                }
            }
        }
    }

    /// Reads one `&…;` reference at the cursor, appending the replacement
    /// text to `buf`.
    pub fn read_reference(
        &mut self,
        buf: &mut String,
        entities: &EntityTable,
    ) -> Result<(), XmlError> {
        let loc = self.location();
        self.expect_byte(b'&')?;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b';' {
                let body = self.lexeme(start);
                self.advance(1);
                return entities::decode_reference(&body, entities, buf)
                    .map_err(|e| XmlError::at(e.kind, e.message, loc));
            }
            if matches!(b, b'<' | b'&') || b.is_ascii_whitespace() {
                break;
            }
            self.advance(1);
        }
        Err(XmlError::at(
            ErrorKind::UnexpectedChar,
            "unterminated entity reference",
            loc,
        ))
    }

    // --- Raw runs ---

    /// Copies characters into `buf` until `delimiter` is matched. The
    /// delimiter is consumed and not copied. Returns `false` if end of
    /// input is reached first.
    pub fn read_until(&mut self, buf: &mut String, delimiter: &[u8]) -> bool {
        loop {
            if self.looking_at(delimiter) {
                self.advance(delimiter.len());
                return true;
            }
            if self.at_end() {
                return false;
            }
            match self.next_char() {
                Ok(ch) => buf.push(ch),
                Err(_) => return false,
            }
        }
    }

    /// Reads element text into `buf` up to the next `<` (or end of
    /// input), decoding character and entity references. Returns `true`
    /// when the run consisted solely of whitespace.
    pub fn read_text(
        &mut self,
        buf: &mut String,
        entities: &EntityTable,
    ) -> Result<bool, XmlError> {
        let mut all_whitespace = true;
        loop {
            match self.peek() {
                None | Some(b'<') => break,
                Some(b'&') => {
                    let before = buf.len();
                    self.read_reference(buf, entities)?;
                    if !chars::is_all_space(&buf[before..]) {
                        all_whitespace = false;
                    }
                }
                Some(_) => {
                    let ch = self.next_char()?;
                    if !chars::is_space(ch) {
                        all_whitespace = false;
                    }
                    buf.push(ch);
                }
            }
        }
        Ok(all_whitespace)
    }

    // --- Errors ---

    /// Creates an error pinned to the current location.
    pub fn fatal(&self, kind: ErrorKind, message: impl Into<String>) -> XmlError {
        XmlError::at(kind, message, self.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_advance() {
        let mut r = Reader::new("abc");
        assert_eq!(r.peek(), Some(b'a'));
        assert_eq!(r.peek_at(1), Some(b'b'));
        r.advance(1);
        assert_eq!(r.peek(), Some(b'b'));
        r.advance(2);
        assert!(r.at_end());
    }

    #[test]
    fn test_line_column_tracking() {
        let mut r = Reader::new("ab\ncd");
        assert_eq!(r.location().line, 1);
        assert_eq!(r.location().column, 1);
        r.advance(2);
        assert_eq!(r.location().column, 3);
        r.advance(1);
        assert_eq!(r.location().line, 2);
        assert_eq!(r.location().column, 1);
    }

    #[test]
    fn test_next_char_cr_normalization() {
        let mut r = Reader::new("a\r\nb\rc");
        assert_eq!(r.next_char().unwrap(), 'a');
        assert_eq!(r.next_char().unwrap(), '\n');
        assert_eq!(r.next_char().unwrap(), 'b');
        assert_eq!(r.next_char().unwrap(), '\n');
        assert_eq!(r.next_char().unwrap(), 'c');
    }

    #[test]
    fn test_eat() {
        let mut r = Reader::new("<a");
        assert!(r.eat(b'<'));
        assert!(!r.eat(b'<'));
        assert!(r.eat(b'a'));
    }

    #[test]
    fn test_read_name() {
        let mut r = Reader::new("foo:bar baz");
        assert_eq!(r.read_name().unwrap(), "foo:bar");
        assert_eq!(r.peek(), Some(b' '));
    }

    #[test]
    fn test_read_name_rejects_bad_start() {
        let mut r = Reader::new("1abc");
        let err = r.read_name().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidName);
    }

    #[test]
    fn test_read_name_at_eof() {
        let mut r = Reader::new("");
        let err = r.read_name().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_choice_name_hash_keyword() {
        let mut r = Reader::new("#PCDATA|x");
        assert_eq!(r.read_choice_name().unwrap(), "#PCDATA");
        assert_eq!(r.peek(), Some(b'|'));
    }

    #[test]
    fn test_read_quoted() {
        let mut r = Reader::new("'hello' rest");
        assert_eq!(r.read_quoted().unwrap(), "hello");

        let mut r = Reader::new("\"dual\"");
        assert_eq!(r.read_quoted().unwrap(), "dual");
    }

    #[test]
    fn test_read_quoted_unterminated() {
        let mut r = Reader::new("'oops");
        let err = r.read_quoted().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_attribute_value_decodes() {
        let table = EntityTable::new();
        let mut r = Reader::new("\"a &amp; b\"");
        let mut buf = String::new();
        r.read_attribute_value(&mut buf, &table).unwrap();
        assert_eq!(buf, "a & b");
    }

    #[test]
    fn test_read_attribute_value_normalizes_whitespace() {
        let table = EntityTable::new();
        let mut r = Reader::new("\"a\tb\nc\"");
        let mut buf = String::new();
        r.read_attribute_value(&mut buf, &table).unwrap();
        assert_eq!(buf, "a b c");
    }

    #[test]
    fn test_read_attribute_value_rejects_lt() {
        let table = EntityTable::new();
        let mut r = Reader::new("\"a < b\"");
        let mut buf = String::new();
        let err = r.read_attribute_value(&mut buf, &table).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedChar);
    }

    #[test]
    fn test_read_reference_unknown_entity() {
        let table = EntityTable::new();
        let mut r = Reader::new("&bogus;");
        let mut buf = String::new();
        let err = r.read_reference(&mut buf, &table).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownEntity);
        assert!(err.location.is_some());
    }

    #[test]
    fn test_read_until_found() {
        let mut r = Reader::new("some -- content-->tail");
        let mut buf = String::new();
        assert!(r.read_until(&mut buf, b"-->"));
        assert_eq!(buf, "some -- content");
        assert_eq!(r.peek(), Some(b't'));
    }

    #[test]
    fn test_read_until_eof() {
        let mut r = Reader::new("no terminator");
        let mut buf = String::new();
        assert!(!r.read_until(&mut buf, b"-->"));
    }

    #[test]
    fn test_read_text_decodes_and_flags_whitespace() {
        let table = EntityTable::new();
        let mut r = Reader::new("hello &lt;tag&gt;<next");
        let mut buf = String::new();
        let all_ws = r.read_text(&mut buf, &table).unwrap();
        assert!(!all_ws);
        assert_eq!(buf, "hello <tag>");
        assert_eq!(r.peek(), Some(b'<'));
    }

    #[test]
    fn test_read_text_all_whitespace() {
        let table = EntityTable::new();
        let mut r = Reader::new("  \n\t <x");
        let mut buf = String::new();
        let all_ws = r.read_text(&mut buf, &table).unwrap();
        assert!(all_ws);
        assert_eq!(buf, "  \n\t ");
    }

    #[test]
    fn test_skip_spaces() {
        let mut r = Reader::new("  \t\nabc");
        assert!(r.skip_spaces());
        assert_eq!(r.peek(), Some(b'a'));
        assert!(!r.skip_spaces());
        assert!(r.skip_spaces_required().is_err());
    }

    #[test]
    fn test_expect_str() {
        let mut r = Reader::new("<!DOCTYPE");
        assert!(r.expect_str(b"<!DOCTYPE").is_ok());

        let mut r = Reader::new("<!DOCTYPO");
        let err = r.expect_str(b"<!DOCTYPE").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedChar);
    }
}
