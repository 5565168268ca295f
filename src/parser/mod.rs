//! XML 1.0 parser.
//!
//! A hand-rolled recursive descent parser building a [`Document`] tree.
//! The parser is hand-rolled (not combinator-based) because the engine
//! needs fine-grained control over parse state: nodes are appended
//! through the ordinary tree operations so the document invariants are
//! checked uniformly, and the optional SAX hooks fire per node as the
//! tree grows.

pub(crate) mod input;
mod xml;

use crate::error::XmlError;
use crate::sax::SaxHooks;
use crate::tree::Document;

/// Parse options, a small bit set controlling parser behavior.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use oxdom::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .preserve_whitespace(true)
///     .validate(true);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Retain whitespace between markup as (significant-)whitespace nodes
    /// instead of dropping it.
    pub preserve_whitespace: bool,
    /// Fire the [`SaxHooks`] callbacks per node during parse.
    pub use_sax: bool,
    /// Intern names and namespace URIs into the document symbol table.
    pub use_symbol_table: bool,
    /// Enforce the name production, attribute-name uniqueness, and
    /// keyword legality.
    pub validate: bool,
}

impl ParseOptions {
    /// Enables or disables whitespace preservation.
    #[must_use]
    pub fn preserve_whitespace(mut self, yes: bool) -> Self {
        self.preserve_whitespace = yes;
        self
    }

    /// Enables or disables the SAX callbacks.
    #[must_use]
    pub fn use_sax(mut self, yes: bool) -> Self {
        self.use_sax = yes;
        self
    }

    /// Enables or disables symbol-table interning.
    #[must_use]
    pub fn use_symbol_table(mut self, yes: bool) -> Self {
        self.use_symbol_table = yes;
        self
    }

    /// Enables or disables parse-time validation.
    #[must_use]
    pub fn validate(mut self, yes: bool) -> Self {
        self.validate = yes;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns the earliest `XmlError` if the input is not well-formed.
pub fn parse_str(input: &str) -> Result<Document, XmlError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// # Errors
///
/// Returns the earliest `XmlError` if the input is not well-formed.
pub fn parse_str_with_options(
    input: &str,
    options: &ParseOptions,
) -> Result<Document, XmlError> {
    let mut parser = xml::XmlParser::new(input, options, None);
    parser.parse()
}

/// Parses an XML string, firing SAX hooks per node when `use_sax` is set.
///
/// # Errors
///
/// Returns the earliest `XmlError` if the input is not well-formed.
pub fn parse_str_with_hooks(
    input: &str,
    options: &ParseOptions,
    hooks: &mut dyn SaxHooks,
) -> Result<Document, XmlError> {
    let mut parser = xml::XmlParser::new(input, options, Some(hooks));
    parser.parse()
}
