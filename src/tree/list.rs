//! Lazy node lists.
//!
//! A [`NodeList`] is a value type iterating the attributes of a node, its
//! direct children, or its whole subtree in preorder — plus a flat mode
//! over an explicit vector. The list does not borrow the document;
//! operations take the document as a parameter, which permits tree
//! mutation between steps. Every traversal step cross-checks the revision
//! counter of the list's subject nodes and fails with `list-changed` when
//! the underlying list was structurally modified.
//!
//! An optional filter predicate is consulted after each advance; while it
//! returns `false` the iterator advances again.
//!
//! Deep traversal visits the subtree root itself first, then descends:
//! entering a node with children pushes a resume point
//! `(parent, next-sibling-of-current)` and when a level is exhausted the
//! most recent resume point is popped.

use std::rc::Rc;

use super::{Document, NodeId};
use crate::error::{ErrorKind, XmlError};

/// Expected nesting depth of normal documents; the deep-traversal resume
/// stack starts with this capacity and grows past it only for deeper
/// trees.
const DEFAULT_XML_LEVELS: usize = 200;

/// Which list a [`NodeList`] walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Attributes,
    ChildNodes,
    ChildNodesDeep,
    Flat,
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Unstarted,
    At(NodeId),
    AtFlat(usize),
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Resume {
    parent: NodeId,
    resume: Option<NodeId>,
    revision: u32,
}

/// Filter predicate: consulted per candidate; `false` skips it.
#[derive(Clone)]
enum Filter {
    Plain(fn(&Document, NodeId) -> bool),
    Dyn(Rc<dyn Fn(&Document, NodeId) -> bool>),
}

impl Filter {
    fn accepts(&self, doc: &Document, id: NodeId) -> bool {
        match self {
            Self::Plain(f) => f(doc, id),
            Self::Dyn(f) => f(doc, id),
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// A lazy list of nodes with four modes: attributes, direct children,
/// deep (preorder) traversal, and an explicit flat vector.
#[derive(Debug, Clone)]
pub struct NodeList {
    mode: Mode,
    origin: Option<NodeId>,
    origin_revision: u32,
    flat: Vec<NodeId>,
    cursor: Cursor,
    stack: Vec<Resume>,
    len: Option<usize>,
    filter: Option<Filter>,
}

impl NodeList {
    pub(crate) fn attributes(doc: &Document, node: NodeId) -> Self {
        Self::new(Mode::Attributes, doc, node)
    }

    pub(crate) fn children(doc: &Document, node: NodeId) -> Self {
        Self::new(Mode::ChildNodes, doc, node)
    }

    pub(crate) fn deep(doc: &Document, node: NodeId) -> Self {
        let mut list = Self::new(Mode::ChildNodesDeep, doc, node);
        list.stack.reserve(DEFAULT_XML_LEVELS);
        list
    }

    fn new(mode: Mode, doc: &Document, node: NodeId) -> Self {
        Self {
            mode,
            origin: Some(node),
            origin_revision: doc.revision(node),
            flat: Vec::new(),
            cursor: Cursor::Unstarted,
            stack: Vec::new(),
            len: None,
            filter: None,
        }
    }

    /// Creates a flat list over an explicit set of nodes.
    #[must_use]
    pub fn from_nodes(nodes: Vec<NodeId>) -> Self {
        Self {
            mode: Mode::Flat,
            origin: None,
            origin_revision: 0,
            flat: nodes,
            cursor: Cursor::Unstarted,
            stack: Vec::new(),
            len: None,
            filter: None,
        }
    }

    /// Attaches a plain filter predicate.
    #[must_use]
    pub fn with_filter(mut self, filter: fn(&Document, NodeId) -> bool) -> Self {
        self.filter = Some(Filter::Plain(filter));
        self
    }

    /// Attaches a capturing filter predicate.
    #[must_use]
    pub fn with_dyn_filter(mut self, filter: impl Fn(&Document, NodeId) -> bool + 'static) -> Self {
        self.filter = Some(Filter::Dyn(Rc::new(filter)));
        self
    }

    /// An independent copy for re-iteration, starting from the current
    /// position.
    #[must_use]
    pub fn save(&self) -> Self {
        self.clone()
    }

    /// Returns the list to its start and re-synchronizes the revision
    /// snapshot, making the list usable after tree mutation.
    pub fn reset(&mut self, doc: &Document) {
        self.cursor = Cursor::Unstarted;
        self.stack.clear();
        self.len = None;
        if let Some(origin) = self.origin {
            self.origin_revision = doc.revision(origin);
        }
    }

    /// The current front node, or `None` when the list is exhausted.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` if the underlying list was structurally
    /// modified since the list was created (or last reset).
    pub fn front(&mut self, doc: &Document) -> Result<Option<NodeId>, XmlError> {
        self.ensure_started(doc)?;
        Ok(match self.cursor {
            Cursor::At(id) => Some(id),
            Cursor::AtFlat(i) => self.flat.get(i).copied(),
            _ => None,
        })
    }

    /// Returns `true` when no nodes remain.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn is_empty(&mut self, doc: &Document) -> Result<bool, XmlError> {
        Ok(self.front(doc)?.is_none())
    }

    /// Advances past the current front.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn move_front(&mut self, doc: &Document) -> Result<(), XmlError> {
        self.ensure_started(doc)?;
        self.advance_raw(doc)?;
        self.settle(doc)?;
        self.len = None;
        Ok(())
    }

    /// Returns the current front and advances past it.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn pop_front(&mut self, doc: &Document) -> Result<Option<NodeId>, XmlError> {
        let front = self.front(doc)?;
        if front.is_some() {
            self.advance_raw(doc)?;
            self.settle(doc)?;
        }
        self.len = None;
        Ok(front)
    }

    /// The `i`-th node from the current position, without advancing.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn item(&self, doc: &Document, i: usize) -> Result<Option<NodeId>, XmlError> {
        let mut walker = self.save();
        for _ in 0..i {
            if walker.pop_front(doc)?.is_none() {
                return Ok(None);
            }
        }
        walker.front(doc)
    }

    /// The number of nodes from the current position to the end.
    ///
    /// Lazily memoized; invalidated by [`pop_front`](Self::pop_front) and
    /// [`move_front`](Self::move_front), recomputed by walking a snapshot.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn len(&mut self, doc: &Document) -> Result<usize, XmlError> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let mut walker = self.save();
        let mut count = 0;
        while walker.pop_front(doc)?.is_some() {
            count += 1;
        }
        self.len = Some(count);
        Ok(count)
    }

    /// The position of `node` relative to the current position, or `None`
    /// when it is not in the remainder of the list.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn index_of(&self, doc: &Document, node: NodeId) -> Result<Option<usize>, XmlError> {
        let mut walker = self.save();
        let mut index = 0;
        while let Some(id) = walker.pop_front(doc)? {
            if id == node {
                return Ok(Some(index));
            }
            index += 1;
        }
        Ok(None)
    }

    /// The last node of the list.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn back(&self, doc: &Document) -> Result<Option<NodeId>, XmlError> {
        let mut walker = self.save();
        let mut last = None;
        while let Some(id) = walker.pop_front(doc)? {
            last = Some(id);
        }
        Ok(last)
    }

    /// Collects the remaining nodes without consuming the list.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification.
    pub fn to_vec(&self, doc: &Document) -> Result<Vec<NodeId>, XmlError> {
        let mut walker = self.save();
        let mut out = Vec::new();
        while let Some(id) = walker.pop_front(doc)? {
            out.push(id);
        }
        Ok(out)
    }

    /// Detaches every remaining node from its parent. The list is
    /// exhausted afterwards.
    ///
    /// # Errors
    ///
    /// Fails with `list-changed` on structural modification detected
    /// before any node is removed.
    pub fn remove_all(&mut self, doc: &mut Document) -> Result<(), XmlError> {
        let victims = self.to_vec(doc)?;
        for id in victims {
            doc.detach(id);
        }
        self.cursor = Cursor::Done;
        self.stack.clear();
        self.len = Some(0);
        if let Some(origin) = self.origin {
            self.origin_revision = doc.revision(origin);
        }
        Ok(())
    }

    // --- Traversal machinery ---

    fn check_origin(&self, doc: &Document) -> Result<(), XmlError> {
        if let Some(origin) = self.origin {
            if doc.revision(origin) != self.origin_revision {
                return Err(list_changed());
            }
        }
        Ok(())
    }

    /// Revision check for a sibling advance at the current depth: the
    /// innermost resume entry knows the parent, the origin covers depth
    /// one.
    fn check_level(&self, doc: &Document) -> Result<(), XmlError> {
        match self.stack.last() {
            Some(entry) => {
                if doc.revision(entry.parent) != entry.revision {
                    Err(list_changed())
                } else {
                    Ok(())
                }
            }
            None => self.check_origin(doc),
        }
    }

    fn ensure_started(&mut self, doc: &Document) -> Result<(), XmlError> {
        if !matches!(self.cursor, Cursor::Unstarted) {
            self.check_origin(doc)?;
            return Ok(());
        }
        self.check_origin(doc)?;
        self.cursor = match self.mode {
            Mode::Attributes => match self.origin.and_then(|o| doc.first_attribute(o)) {
                Some(first) => Cursor::At(first),
                None => Cursor::Done,
            },
            Mode::ChildNodes => match self.origin.and_then(|o| doc.first_child(o)) {
                Some(first) => Cursor::At(first),
                None => Cursor::Done,
            },
            // Deep traversal yields the subtree root itself first.
            Mode::ChildNodesDeep => match self.origin {
                Some(origin) => Cursor::At(origin),
                None => Cursor::Done,
            },
            Mode::Flat => {
                if self.flat.is_empty() {
                    Cursor::Done
                } else {
                    Cursor::AtFlat(0)
                }
            }
        };
        self.settle(doc)
    }

    fn advance_raw(&mut self, doc: &Document) -> Result<(), XmlError> {
        match self.cursor {
            Cursor::Unstarted | Cursor::Done => Ok(()),
            Cursor::AtFlat(i) => {
                self.cursor = if i + 1 < self.flat.len() {
                    Cursor::AtFlat(i + 1)
                } else {
                    Cursor::Done
                };
                Ok(())
            }
            Cursor::At(current) => match self.mode {
                Mode::Attributes | Mode::ChildNodes => {
                    self.check_origin(doc)?;
                    self.cursor = match doc.next_sibling(current) {
                        Some(next) => Cursor::At(next),
                        None => Cursor::Done,
                    };
                    Ok(())
                }
                Mode::ChildNodesDeep => self.advance_deep(doc, current),
                Mode::Flat => unreachable!("flat mode uses AtFlat cursors"),
            },
        }
    }

    fn advance_deep(&mut self, doc: &Document, current: NodeId) -> Result<(), XmlError> {
        let at_origin = self.origin == Some(current);

        // Descend into children first.
        if let Some(child) = doc.first_child(current) {
            let resume = if at_origin {
                None // never escape the subtree past the origin
            } else {
                doc.next_sibling(current)
            };
            self.stack.push(Resume {
                parent: current,
                resume,
                revision: doc.revision(current),
            });
            self.cursor = Cursor::At(child);
            return Ok(());
        }

        // Then try the next sibling at this depth.
        if !at_origin {
            self.check_level(doc)?;
            if let Some(next) = doc.next_sibling(current) {
                self.cursor = Cursor::At(next);
                return Ok(());
            }
        }

        // Level exhausted: pop resume points.
        while let Some(entry) = self.stack.pop() {
            if doc.revision(entry.parent) != entry.revision {
                return Err(list_changed());
            }
            if let Some(next) = entry.resume {
                self.cursor = Cursor::At(next);
                return Ok(());
            }
        }
        self.cursor = Cursor::Done;
        Ok(())
    }

    fn settle(&mut self, doc: &Document) -> Result<(), XmlError> {
        let Some(filter) = self.filter.clone() else {
            return Ok(());
        };
        loop {
            let candidate = match self.cursor {
                Cursor::At(id) => id,
                Cursor::AtFlat(i) => match self.flat.get(i) {
                    Some(&id) => id,
                    None => return Ok(()),
                },
                _ => return Ok(()),
            };
            if filter.accepts(doc, candidate) {
                return Ok(());
            }
            self.advance_raw(doc)?;
        }
    }
}

fn list_changed() -> XmlError {
    XmlError::new(
        ErrorKind::ListChanged,
        "underlying list was structurally modified during iteration",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeType;

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let catalog = doc.create_element("catalog");
        doc.append_child(root, catalog).unwrap();
        for i in 0..3 {
            let book = doc.create_element("book");
            doc.append_child(catalog, book).unwrap();
            doc.set_attribute(book, "id", &format!("bk{i}")).unwrap();
            let title = doc.create_element("title");
            doc.append_child(book, title).unwrap();
            let text = doc.create_text("Some Title");
            doc.append_child(title, text).unwrap();
        }
        (doc, catalog)
    }

    #[test]
    fn test_children_mode() {
        let (doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, false);
        assert_eq!(list.len(&doc).unwrap(), 3);
        let first = list.pop_front(&doc).unwrap().unwrap();
        assert_eq!(doc.node_name(first), "book");
        assert_eq!(list.len(&doc).unwrap(), 2);
    }

    #[test]
    fn test_deep_mode_counts_subtree() {
        let (doc, catalog) = sample();
        // catalog + 3 * (book + title + text)
        let mut list = doc.get_child_nodes(catalog, true);
        assert_eq!(list.len(&doc).unwrap(), 1 + 3 * 3);
    }

    #[test]
    fn test_deep_mode_preorder() {
        let (doc, catalog) = sample();
        let list = doc.get_child_nodes(catalog, true);
        let names: Vec<String> = list
            .to_vec(&doc)
            .unwrap()
            .into_iter()
            .map(|id| doc.node_name(id).to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "catalog", "book", "title", "#text", "book", "title", "#text", "book", "title",
                "#text"
            ]
        );
    }

    #[test]
    fn test_attributes_mode() {
        let (doc, catalog) = sample();
        let book = doc.first_child(catalog).unwrap();
        let mut list = doc.get_attributes(book);
        assert_eq!(list.len(&doc).unwrap(), 1);
        let attr = list.pop_front(&doc).unwrap().unwrap();
        assert_eq!(doc.node_name(attr), "id");
        assert!(list.pop_front(&doc).unwrap().is_none());
    }

    #[test]
    fn test_flat_mode() {
        let (doc, catalog) = sample();
        let nodes: Vec<NodeId> = doc.children(catalog).collect();
        let mut list = NodeList::from_nodes(nodes.clone());
        assert_eq!(list.len(&doc).unwrap(), 3);
        assert_eq!(list.item(&doc, 2).unwrap(), Some(nodes[2]));
        assert_eq!(list.back(&doc).unwrap(), Some(nodes[2]));
        assert_eq!(list.index_of(&doc, nodes[1]).unwrap(), Some(1));
    }

    #[test]
    fn test_filter_skips_candidates() {
        let (doc, catalog) = sample();
        let book = doc.first_child(catalog).unwrap();
        // book's children: only elements (the title), skipping nothing else
        let mut list = doc
            .get_child_nodes(catalog, true)
            .with_filter(|d, id| d.node_type(id) == NodeType::Text);
        assert_eq!(list.len(&doc).unwrap(), 3);
        let _ = book;
    }

    #[test]
    fn test_front_is_stable() {
        let (doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, false);
        let a = list.front(&doc).unwrap();
        let b = list.front(&doc).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_item_does_not_consume() {
        let (doc, catalog) = sample();
        let list = doc.get_child_nodes(catalog, false);
        let second = list.item(&doc, 1).unwrap().unwrap();
        let names: Vec<NodeId> = list.to_vec(&doc).unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names[1], second);
    }

    #[test]
    fn test_mutation_detected() {
        let (mut doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, false);
        list.front(&doc).unwrap();

        let extra = doc.create_element("book");
        doc.append_child(catalog, extra).unwrap();

        let err = list.pop_front(&doc).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ListChanged);
    }

    #[test]
    fn test_mutation_detected_in_deep_mode() {
        let (mut doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, true);
        // Walk into the first book's subtree.
        for _ in 0..3 {
            list.pop_front(&doc).unwrap();
        }

        let extra = doc.create_element("book");
        doc.append_child(catalog, extra).unwrap();

        // The walk eventually returns to the catalog level and must fail.
        let result: Result<Vec<_>, _> = (0..10).map(|_| list.pop_front(&doc)).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_reset_after_mutation() {
        let (mut doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, false);
        list.front(&doc).unwrap();

        let extra = doc.create_element("book");
        doc.append_child(catalog, extra).unwrap();
        assert!(list.pop_front(&doc).is_err());

        list.reset(&doc);
        assert_eq!(list.len(&doc).unwrap(), 4);
    }

    #[test]
    fn test_save_is_independent() {
        let (doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, false);
        list.pop_front(&doc).unwrap();

        let mut saved = list.save();
        list.pop_front(&doc).unwrap();

        // The copy still sees the element the original moved past.
        assert_eq!(saved.len(&doc).unwrap(), 2);
    }

    #[test]
    fn test_remove_all() {
        let (mut doc, catalog) = sample();
        let mut list = doc.get_child_nodes(catalog, false);
        list.remove_all(&mut doc).unwrap();
        assert_eq!(doc.children(catalog).count(), 0);
        assert_eq!(list.len(&doc).unwrap(), 0);
    }

    #[test]
    fn test_empty_list() {
        let mut doc = Document::new();
        let e = doc.create_element("lonely");
        let mut list = doc.get_child_nodes(e, false);
        assert!(list.is_empty(&doc).unwrap());
        assert_eq!(list.front(&doc).unwrap(), None);
        assert_eq!(list.pop_front(&doc).unwrap(), None);
        assert_eq!(list.len(&doc).unwrap(), 0);
    }
}
