//! XML serialization.
//!
//! Serializes a `Document` tree back to XML text with correct escaping,
//! either compact (byte-faithful round trips) or pretty-printed.

pub mod xml;

pub use xml::{serialize, XmlWriter};
