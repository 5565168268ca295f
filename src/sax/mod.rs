//! SAX-style callbacks fired while the tree parser builds the document.
//!
//! Unlike a pure streaming API, these hooks run against the tree under
//! construction: each callback receives the document and the id of the
//! node that was just inserted, and returns a boolean "keep". Returning
//! `false` removes the node from its parent (for elements, the removal
//! happens when the element closes, after its subtree has been parsed).
//!
//! Hooks only fire when [`ParseOptions::use_sax`](crate::ParseOptions) is
//! set.
//!
//! # Examples
//!
//! ```
//! use oxdom::sax::SaxHooks;
//! use oxdom::{Document, NodeId, ParseOptions};
//!
//! struct CountElements {
//!     count: usize,
//! }
//!
//! impl SaxHooks for CountElements {
//!     fn on_element_begin(&mut self, _doc: &Document, _element: NodeId) -> bool {
//!         self.count += 1;
//!         true
//!     }
//! }
//!
//! let options = ParseOptions::default().use_sax(true);
//! let mut hooks = CountElements { count: 0 };
//! Document::parse_str_with_hooks("<root><a/><b/></root>", &options, &mut hooks).unwrap();
//! assert_eq!(hooks.count, 3);
//! ```

use crate::tree::{Document, NodeId};

/// Per-node callbacks fired during parsing. All methods default to
/// keeping the node, so implementors override only what they need.
#[allow(unused_variables)]
pub trait SaxHooks {
    /// Fired after an attribute is appended to its element.
    /// Returning `false` removes the attribute.
    fn on_attribute(&mut self, doc: &Document, element: NodeId, attribute: NodeId) -> bool {
        true
    }

    /// Fired after an element is opened and its attributes are parsed.
    /// Returning `false` removes the element (with everything parsed into
    /// it) when it closes.
    fn on_element_begin(&mut self, doc: &Document, element: NodeId) -> bool {
        true
    }

    /// Fired when an element is closed.
    /// Returning `false` removes the element from its parent.
    fn on_element_end(&mut self, doc: &Document, element: NodeId) -> bool {
        true
    }

    /// Fired after any non-element, non-attribute node is inserted.
    /// Returning `false` removes the node.
    fn on_other_node(&mut self, doc: &Document, node: NodeId) -> bool {
        true
    }
}

/// A no-op hook set that keeps every node. Useful as a base or for
/// testing.
pub struct KeepAll;

impl SaxHooks for KeepAll {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseOptions;

    #[test]
    fn test_default_hooks_keep_everything() {
        let options = ParseOptions::default().use_sax(true);
        let mut hooks = KeepAll;
        let doc =
            Document::parse_str_with_hooks("<root><a/><!--c--></root>", &options, &mut hooks)
                .unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.children(root).count(), 2);
    }

    #[test]
    fn test_hooks_silent_without_use_sax() {
        struct Panicky;
        impl SaxHooks for Panicky {
            fn on_element_begin(&mut self, _doc: &Document, _element: NodeId) -> bool {
                panic!("must not fire when use_sax is off");
            }
        }
        let options = ParseOptions::default();
        let mut hooks = Panicky;
        let doc = Document::parse_str_with_hooks("<root/>", &options, &mut hooks).unwrap();
        assert!(doc.document_element().is_some());
    }
}
