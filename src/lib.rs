//! # oxdom
//!
//! A streaming XML 1.0 tokenizing parser coupled to a mutable in-memory
//! document tree (DOM), with a serializer that round-trips the tree back to
//! XML text (optionally pretty-printed).
//!
//! The engine validates well-formedness while parsing, builds a typed tree
//! of nodes (document, declaration, element, attribute, text, CDATA,
//! comment, processing instruction, DOCTYPE and its children, entity,
//! notation, whitespace), and exposes navigation, mutation, and query
//! operations over the tree.
//!
//! ## Quick Start
//!
//! ```
//! use oxdom::Document;
//!
//! let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
//! let root = doc.document_element().unwrap();
//! assert_eq!(doc.node_name(root), "root");
//! assert_eq!(doc.serialize(false), "<root><child>Hello</child></root>");
//! ```

pub mod encoding;
pub mod error;
pub mod parser;
pub mod sax;
pub mod serial;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use error::{ErrorKind, SourceLocation, XmlError};
pub use parser::ParseOptions;
pub use tree::{Document, NodeId, NodeType};
