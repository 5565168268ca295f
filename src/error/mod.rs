//! Error types for parsing and tree mutation.
//!
//! Every failure in the engine surfaces as an [`XmlError`] carrying an
//! [`ErrorKind`], a human-readable message, and — for parser errors — the
//! [`SourceLocation`] where the problem was detected. The parser does not
//! attempt recovery: the first error aborts the parse, and the caller
//! should discard the partial document. Tree mutations that fail leave the
//! tree unchanged.

use std::fmt;

/// Classifies a failure of the parser or a tree operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// End of input during a construct that required more.
    UnexpectedEof,
    /// A literal character did not match the required character or set.
    UnexpectedChar,
    /// A required multi-character delimiter (`-->`, `]]>`, `?>`) was not
    /// found before end of input.
    UnexpectedString,
    /// A token failed the XML name production.
    InvalidName,
    /// A second attribute with the same name on one element.
    AttributeDuplicated,
    /// `</X>` did not match the open `<Y …>`.
    MismatchedEndTag,
    /// `&name;` was not found in the entity table.
    UnknownEntity,
    /// The declaration `version` literal failed the version-string grammar.
    InvalidVersion,
    /// The declaration `standalone` literal was neither `yes` nor `no`.
    InvalidStandalone,
    /// A tree mutation violated the document invariants (wrong parent,
    /// disallowed child type, self or ancestor as target, cross-document
    /// move).
    InvalidOp,
    /// A whitespace node was given a value containing non-whitespace.
    NotAllWhitespace,
    /// A node list detected a structural change to the underlying list
    /// while iterating.
    ListChanged,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnexpectedEof => "unexpected-eof",
            Self::UnexpectedChar => "unexpected-char",
            Self::UnexpectedString => "unexpected-string",
            Self::InvalidName => "invalid-name",
            Self::AttributeDuplicated => "attribute-duplicated",
            Self::MismatchedEndTag => "mismatched-end-tag",
            Self::UnknownEntity => "unknown-entity",
            Self::InvalidVersion => "invalid-version",
            Self::InvalidStandalone => "invalid-standalone",
            Self::InvalidOp => "invalid-op",
            Self::NotAllWhitespace => "not-all-whitespace",
            Self::ListChanged => "list-changed",
        };
        f.write_str(name)
    }
}

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error type returned by parsing and tree operations.
#[derive(Debug, Clone)]
pub struct XmlError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred, when known. Tree mutation
    /// errors carry no source location.
    pub location: Option<SourceLocation>,
}

impl XmlError {
    /// Creates an error with no source location (tree mutation failures).
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Creates an error pinned to a source location (parser failures).
    pub fn at(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location: Some(location),
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} at {}: {}", self.kind, loc, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for XmlError {}
