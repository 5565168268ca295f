//! Arena-based XML document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the
//! [`Document`] and are referenced by [`NodeId`] — a typed handle pairing
//! the owning document's tag with a `NonZeroU32` arena index. The tag
//! makes cross-document misuse detectable: a handle minted by one document
//! is rejected by every other document with `invalid-op`.
//!
//! Children and attributes are kept on separate doubly-linked sibling
//! lists threaded through the arena (parent, first/last child, first/last
//! attribute, prev/next sibling). Insertion order is preserved. Every node
//! carries a revision counter that is bumped whenever its child or
//! attribute list changes structurally; node lists snapshot it to detect
//! concurrent modification.
//!
//! Nodes are created exclusively through factory methods on the owning
//! `Document`. A node is detached until appended to a parent; removal
//! detaches; detached nodes may be re-attached elsewhere within the same
//! document. Dropping the `Document` frees every node it owns.

mod list;
mod node;
mod strings;

pub use list::NodeList;
pub use node::{
    AttlistItem, AttlistKeyword, AttlistType, ContentModel, ContentParticle, ExternalIdKind,
    NodeKind, NodeType, Occurrence, ParticleKind,
};
pub use strings::{EncodeState, XmlString};

use std::borrow::Cow;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{ErrorKind, XmlError};
use crate::parser::ParseOptions;
use crate::sax::SaxHooks;
use crate::util::chars;
use crate::util::dict::Dict;
use crate::util::entities::EntityTable;
use crate::util::pool::BufferPool;
use crate::util::qname::QName;

/// Source of fresh per-document tags.
static NEXT_DOCUMENT_TAG: AtomicU32 = AtomicU32::new(1);

/// A typed handle to a node: the owning document's tag plus an arena index.
///
/// `NodeId` is `Copy` and cheap to pass around. Handles from one document
/// are never valid in another; mutation entry points verify this and fail
/// with `invalid-op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    doc: u32,
    index: NonZeroU32,
}

impl NodeId {
    #[allow(clippy::cast_possible_truncation, clippy::expect_used)]
    fn from_index(doc: u32, index: usize) -> Self {
        Self {
            doc,
            index: NonZeroU32::new(index as u32).expect("node index must be non-zero"),
        }
    }

    fn as_index(self) -> usize {
        self.index.get() as usize
    }
}

/// Storage for a single node: its kind payload plus tree links.
#[derive(Debug)]
pub struct NodeData {
    /// The node variant and its payload.
    pub kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    first_attribute: Option<NodeId>,
    last_attribute: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    /// Bumped on every structural change to this node's child or
    /// attribute list.
    revision: u32,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            first_attribute: None,
            last_attribute: None,
            prev_sibling: None,
            next_sibling: None,
            revision: 0,
        }
    }
}

/// An XML document: the root node, the arena behind every node, and the
/// supporting machinery (buffer pool, symbol table, entity table, parse
/// options, default namespace, name comparator).
#[derive(Debug)]
pub struct Document {
    tag: u32,
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    root: NodeId,
    options: ParseOptions,
    dict: Dict,
    entities: EntityTable,
    buffers: BufferPool,
    default_uri: Option<Arc<str>>,
    name_eq: fn(&str, &str) -> bool,
    loading: bool,
}

/// The default (exact) name comparison.
fn names_equal_exact(a: &str, b: &str) -> bool {
    a == b
}

/// ASCII case-insensitive name comparison, substitutable via
/// [`Document::set_name_comparator`].
pub fn names_equal_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl Document {
    /// Creates a new empty document with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Creates a new empty document with the given parse options.
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        let tag = NEXT_DOCUMENT_TAG.fetch_add(1, Ordering::Relaxed);
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document)); // placeholder
        nodes.push(NodeData::new(NodeKind::Document)); // root
        let root = NodeId::from_index(tag, 1);
        Self {
            tag,
            nodes,
            root,
            options,
            dict: Dict::new(),
            entities: EntityTable::new(),
            buffers: BufferPool::new(),
            default_uri: None,
            name_eq: names_equal_exact,
            loading: false,
        }
    }

    // --- Parse / serialize entry points ---

    /// Parses an XML string into a `Document` with default options.
    ///
    /// # Errors
    ///
    /// Returns the earliest parse error if the input is not well-formed.
    pub fn parse_str(input: &str) -> Result<Self, XmlError> {
        crate::parser::parse_str(input)
    }

    /// Parses an XML string with the given options.
    ///
    /// # Errors
    ///
    /// Returns the earliest parse error if the input is not well-formed.
    pub fn parse_str_with_options(
        input: &str,
        options: &ParseOptions,
    ) -> Result<Self, XmlError> {
        crate::parser::parse_str_with_options(input, options)
    }

    /// Parses an XML string, firing the given SAX hooks per node when
    /// `use_sax` is set in the options.
    ///
    /// # Errors
    ///
    /// Returns the earliest parse error if the input is not well-formed.
    pub fn parse_str_with_hooks(
        input: &str,
        options: &ParseOptions,
        hooks: &mut dyn SaxHooks,
    ) -> Result<Self, XmlError> {
        crate::parser::parse_str_with_hooks(input, options, hooks)
    }

    /// Parses raw bytes, resolving a byte-order mark and transcoding to
    /// UTF-8 first.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded or the XML is not
    /// well-formed.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        Self::parse_bytes_with_options(bytes, &ParseOptions::default())
    }

    /// Parses raw bytes with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded or the XML is not
    /// well-formed.
    pub fn parse_bytes_with_options(
        bytes: &[u8],
        options: &ParseOptions,
    ) -> Result<Self, XmlError> {
        let text = crate::encoding::decode_to_utf8(bytes)
            .map_err(|e| XmlError::new(ErrorKind::UnexpectedChar, e.message))?;
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
        crate::parser::parse_str_with_options(text, options)
    }

    /// Reads and parses an XML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoded, or parsed.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, XmlError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            XmlError::new(
                ErrorKind::InvalidOp,
                format!("cannot read {}: {e}", path.display()),
            )
        })?;
        Self::parse_bytes(&bytes)
    }

    /// Serializes the document to XML text.
    ///
    /// With `pretty` set, children are placed on indented lines; otherwise
    /// no whitespace is added and a parse/serialize round trip reproduces
    /// the input.
    #[must_use]
    pub fn serialize(&self, pretty: bool) -> String {
        crate::serial::serialize(self, pretty)
    }

    /// Writes one node (and its subtree) through an XML writer.
    pub fn write_node(&self, id: NodeId, writer: &mut crate::serial::XmlWriter) {
        crate::serial::xml::write_node(self, id, writer);
    }

    /// Serializes the document and writes it to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), XmlError> {
        let path = path.as_ref();
        std::fs::write(path, self.serialize(pretty)).map_err(|e| {
            XmlError::new(
                ErrorKind::InvalidOp,
                format!("cannot write {}: {e}", path.display()),
            )
        })
    }

    // --- Document-level accessors ---

    /// The document root node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The single top-level element, if any.
    #[must_use]
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node_type(id) == NodeType::Element)
    }

    /// The XML declaration node, if any.
    #[must_use]
    pub fn declaration(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node_type(id) == NodeType::Declaration)
    }

    /// The DOCTYPE node, if any.
    #[must_use]
    pub fn doctype(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node_type(id) == NodeType::DocumentType)
    }

    /// The declaration's `version` pseudo-attribute value.
    #[must_use]
    pub fn version(&self) -> Option<Cow<'_, str>> {
        self.declaration_attr("version")
    }

    /// The declaration's `encoding` pseudo-attribute value.
    #[must_use]
    pub fn encoding(&self) -> Option<Cow<'_, str>> {
        self.declaration_attr("encoding")
    }

    /// The declaration's `standalone` pseudo-attribute value.
    #[must_use]
    pub fn standalone(&self) -> Option<Cow<'_, str>> {
        self.declaration_attr("standalone")
    }

    fn declaration_attr(&self, name: &str) -> Option<Cow<'_, str>> {
        let decl = self.declaration()?;
        self.attribute_value(decl, name)
    }

    /// The parse options this document was created with.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// The document's entity table.
    #[must_use]
    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Mutable access to the entity table (custom entities may be added
    /// before serialization or further mutation).
    pub fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.entities
    }

    /// The document's buffer pool.
    #[must_use]
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffers
    }

    /// Sets the default namespace URI used when deriving qualified names.
    pub fn set_default_uri(&mut self, uri: Option<&str>) {
        self.default_uri = uri.map(|u| self.intern_or(u));
    }

    /// Substitutes the name-comparison function (default: exact match).
    pub fn set_name_comparator(&mut self, cmp: fn(&str, &str) -> bool) {
        self.name_eq = cmp;
    }

    /// Compares two names using the document's comparator.
    #[must_use]
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        (self.name_eq)(a, b)
    }

    /// Returns `true` while a `parse` call is building this document.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) fn set_entities(&mut self, entities: EntityTable) {
        self.entities = entities;
    }

    pub(crate) fn set_buffer_pool(&mut self, buffers: BufferPool) {
        self.buffers = buffers;
    }

    // --- Node access ---

    fn data(&self, id: NodeId) -> &NodeData {
        assert_eq!(id.doc, self.tag, "node does not belong to this document");
        &self.nodes[id.as_index()]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        assert_eq!(id.doc, self.tag, "node does not belong to this document");
        &mut self.nodes[id.as_index()]
    }

    /// Returns `true` if this document minted the handle.
    #[must_use]
    pub fn owns(&self, id: NodeId) -> bool {
        id.doc == self.tag && id.as_index() < self.nodes.len()
    }

    fn ensure_owner(&self, id: NodeId) -> Result<(), XmlError> {
        if self.owns(id) {
            Ok(())
        } else {
            Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node belongs to a different document",
            ))
        }
    }

    /// The kind (variant + payload) of a node.
    #[must_use]
    pub fn node_kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    /// The payload-free type tag of a node.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> NodeType {
        self.data(id).kind.node_type()
    }

    /// The node's name (qualified name, or a `#…` sentinel for anonymous
    /// kinds).
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> &str {
        self.data(id).kind.name()
    }

    /// The qualified name of an element or attribute node.
    #[must_use]
    pub fn qname(&self, id: NodeId) -> Option<&QName> {
        match &self.data(id).kind {
            NodeKind::Element { name } | NodeKind::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The raw stored value of a node, uninterpreted.
    #[must_use]
    pub fn node_value_raw(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Attribute { value, .. } => Some(value.raw()),
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => Some(content.raw()),
            NodeKind::ProcessingInstruction { data, .. } => data.as_ref().map(XmlString::raw),
            NodeKind::Whitespace { content } | NodeKind::SignificantWhitespace { content } => {
                Some(content)
            }
            NodeKind::Entity { value, .. } => value.as_ref().map(XmlString::raw),
            _ => None,
        }
    }

    /// The decoded value of a node (entity references resolved).
    ///
    /// Falls back to the raw value when decoding fails (an encoded value
    /// referencing an entity missing from the table).
    #[must_use]
    pub fn node_value(&self, id: NodeId) -> Option<Cow<'_, str>> {
        let decoded = match &self.data(id).kind {
            NodeKind::Attribute { value, .. } => value.decoded_form(&self.entities),
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => content.decoded_form(&self.entities),
            NodeKind::ProcessingInstruction { data, .. } => {
                return data
                    .as_ref()
                    .map(|d| d.decoded_form(&self.entities).unwrap_or_else(|_| Cow::Borrowed(d.raw())));
            }
            NodeKind::Whitespace { content } | NodeKind::SignificantWhitespace { content } => {
                return Some(Cow::Borrowed(content.as_str()));
            }
            NodeKind::Entity { value, .. } => {
                return value.as_ref().map(|v| Cow::Borrowed(v.raw()));
            }
            _ => return None,
        };
        match decoded {
            Ok(v) => Some(v),
            Err(_) => self.node_value_raw(id).map(Cow::Borrowed),
        }
    }

    /// The concatenated text content of a node and all its descendants
    /// (text and CDATA nodes).
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.data(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => {
                if let Ok(v) = content.decoded_form(&self.entities) {
                    out.push_str(&v);
                }
            }
            NodeKind::SignificantWhitespace { content } => out.push_str(content),
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Depth of a node below the document root (the root is at level 0).
    #[must_use]
    pub fn level(&self, id: NodeId) -> u32 {
        let mut level = 0;
        let mut current = self.data(id).parent;
        while let Some(p) = current {
            level += 1;
            current = self.data(p).parent;
        }
        level
    }

    /// Total number of allocated nodes (live and detached).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1 // placeholder at index 0
    }

    pub(crate) fn revision(&self, id: NodeId) -> u32 {
        self.data(id).revision
    }

    // --- Navigation ---

    /// The parent of a node (the owning element, for attribute nodes).
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// The first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).first_child
    }

    /// The last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).last_child
    }

    /// The first attribute of a node.
    #[must_use]
    pub fn first_attribute(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).first_attribute
    }

    /// The last attribute of a node.
    #[must_use]
    pub fn last_attribute(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).last_attribute
    }

    /// The next sibling of a node (within its child or attribute list).
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).next_sibling
    }

    /// The previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).prev_sibling
    }

    /// Iterates over the children of a node.
    pub fn children(&self, id: NodeId) -> Siblings<'_> {
        Siblings {
            doc: self,
            next: self.data(id).first_child,
        }
    }

    /// Iterates over the attributes of a node.
    pub fn attributes(&self, id: NodeId) -> Siblings<'_> {
        Siblings {
            doc: self,
            next: self.data(id).first_attribute,
        }
    }

    /// Iterates over a node and its ancestors, walking up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    // --- Factories ---

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(self.tag, index)
    }

    fn intern_or(&mut self, s: &str) -> Arc<str> {
        if self.options.use_symbol_table {
            self.dict.intern(s)
        } else {
            Arc::from(s)
        }
    }

    pub(crate) fn make_qname(&mut self, name: &str) -> QName {
        let default_uri = self.default_uri.clone();
        if self.options.use_symbol_table {
            let dict = &mut self.dict;
            QName::with_interner(name, default_uri.as_ref(), &mut |s| dict.intern(s))
        } else {
            QName::new(name, default_uri.as_ref())
        }
    }

    /// Creates a detached element node.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let name = self.make_qname(name);
        self.alloc(NodeKind::Element { name })
    }

    /// Creates a detached attribute node with a plain (decoded) value.
    pub fn create_attribute(&mut self, name: &str, value: &str) -> NodeId {
        self.create_attribute_xml(name, XmlString::decoded(value))
    }

    pub(crate) fn create_attribute_xml(&mut self, name: &str, value: XmlString) -> NodeId {
        let name = self.make_qname(name);
        self.alloc(NodeKind::Attribute { name, value })
    }

    /// Creates a detached text node with a plain (decoded) value.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create_text_xml(XmlString::decoded(text))
    }

    pub(crate) fn create_text_xml(&mut self, content: XmlString) -> NodeId {
        self.alloc(NodeKind::Text { content })
    }

    /// Creates a detached CDATA node.
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` if the content contains `]]>`, which cannot
    /// be represented in a CDATA section.
    pub fn create_cdata(&mut self, text: &str) -> Result<NodeId, XmlError> {
        if text.contains("]]>") {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "CDATA content must not contain ']]>'",
            ));
        }
        Ok(self.alloc(NodeKind::CData {
            content: XmlString::verbatim(text),
        }))
    }

    /// Creates a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment {
            content: XmlString::encoded(text),
        })
    }

    /// Creates a detached processing-instruction node.
    pub fn create_processing_instruction(
        &mut self,
        target: &str,
        data: Option<&str>,
    ) -> NodeId {
        let target = self.intern_or(target);
        self.alloc(NodeKind::ProcessingInstruction {
            target,
            data: data.map(XmlString::encoded),
        })
    }

    /// Creates a detached XML declaration node. Its pseudo-attributes are
    /// set with [`append_attribute_named`](Self::append_attribute_named).
    pub fn create_declaration(&mut self) -> NodeId {
        self.alloc(NodeKind::Declaration)
    }

    /// Creates a detached DOCTYPE node.
    pub fn create_document_type(
        &mut self,
        name: &str,
        external_id: ExternalIdKind,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> NodeId {
        let name = self.intern_or(name);
        self.alloc(NodeKind::DocumentType {
            name,
            external_id,
            public_id: public_id.map(XmlString::decoded),
            system_id: system_id.map(XmlString::decoded),
        })
    }

    /// Creates a detached entity-declaration node.
    pub fn create_entity(
        &mut self,
        name: &str,
        parameter: bool,
        value: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
        ndata: Option<&str>,
    ) -> NodeId {
        let name = self.intern_or(name);
        let ndata = ndata.map(|n| self.intern_or(n));
        self.alloc(NodeKind::Entity {
            name,
            parameter,
            // The replacement text is taken as written, escapes intact.
            value: value.map(XmlString::check),
            public_id: public_id.map(XmlString::decoded),
            system_id: system_id.map(XmlString::decoded),
            ndata,
        })
    }

    /// Creates a detached entity-reference node.
    pub fn create_entity_reference(&mut self, name: &str) -> NodeId {
        let name = self.intern_or(name);
        self.alloc(NodeKind::EntityReference { name })
    }

    /// Creates a detached notation-declaration node.
    pub fn create_notation(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> NodeId {
        let name = self.intern_or(name);
        self.alloc(NodeKind::Notation {
            name,
            public_id: public_id.map(XmlString::decoded),
            system_id: system_id.map(XmlString::decoded),
        })
    }

    /// Creates a detached attribute-list declaration node.
    pub fn create_attribute_list(&mut self, element: &str, items: Vec<AttlistItem>) -> NodeId {
        let element = self.intern_or(element);
        self.alloc(NodeKind::AttributeListDecl { element, items })
    }

    /// Creates a detached element-declaration node.
    pub fn create_element_decl(&mut self, name: &str, content: ContentModel) -> NodeId {
        let name = self.intern_or(name);
        self.alloc(NodeKind::ElementDecl { name, content })
    }

    /// Creates a detached document-level whitespace node.
    ///
    /// # Errors
    ///
    /// Fails with `not-all-whitespace` if any character is not XML
    /// whitespace.
    pub fn create_whitespace(&mut self, content: &str) -> Result<NodeId, XmlError> {
        Self::check_whitespace(content)?;
        Ok(self.alloc(NodeKind::Whitespace {
            content: content.to_string(),
        }))
    }

    /// Creates a detached significant-whitespace node.
    ///
    /// # Errors
    ///
    /// Fails with `not-all-whitespace` if any character is not XML
    /// whitespace.
    pub fn create_significant_whitespace(&mut self, content: &str) -> Result<NodeId, XmlError> {
        Self::check_whitespace(content)?;
        Ok(self.alloc(NodeKind::SignificantWhitespace {
            content: content.to_string(),
        }))
    }

    fn check_whitespace(content: &str) -> Result<(), XmlError> {
        if chars::is_all_space(content) {
            Ok(())
        } else {
            Err(XmlError::new(
                ErrorKind::NotAllWhitespace,
                "whitespace node value contains non-whitespace characters",
            ))
        }
    }

    /// Creates a detached document fragment.
    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::DocumentFragment)
    }

    // --- Mutation ---

    /// Appends `child` at the end of `parent`'s child list.
    ///
    /// Detaches `child` from any previous parent first. If `child` is a
    /// document fragment, its children are moved instead and the fragment
    /// is left empty.
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` when the parent forbids children, the child
    /// type is not permitted, the child is the parent or one of its
    /// ancestors, the document already has a declaration / DOCTYPE /
    /// element child, or either handle belongs to a different document.
    /// On error the tree is unchanged.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), XmlError> {
        self.ensure_owner(parent)?;
        self.ensure_owner(child)?;

        if self.node_type(child) == NodeType::DocumentFragment {
            return self.append_fragment(parent, child);
        }

        self.check_insertable(parent, child, None)?;
        self.detach(child);
        self.link_last_child(parent, child);
        Ok(())
    }

    fn append_fragment(&mut self, parent: NodeId, fragment: NodeId) -> Result<(), XmlError> {
        let moved: Vec<NodeId> = self.children(fragment).collect();
        // Validate the whole batch before moving anything, so a failure
        // leaves both the fragment and the target untouched. The batch
        // itself may not contain two nodes of a singleton document type.
        let mut batch_singletons: Vec<NodeType> = Vec::new();
        for &child in &moved {
            self.check_insertable(parent, child, None)?;
            let child_type = self.node_type(child);
            if self.node_type(parent) == NodeType::Document
                && matches!(
                    child_type,
                    NodeType::Declaration | NodeType::DocumentType | NodeType::Element
                )
            {
                if batch_singletons.contains(&child_type) {
                    return Err(XmlError::new(
                        ErrorKind::InvalidOp,
                        format!("document already has a {child_type:?} child"),
                    ));
                }
                batch_singletons.push(child_type);
            }
        }
        for child in moved {
            self.detach(child);
            self.link_last_child(parent, child);
        }
        Ok(())
    }

    /// Inserts `new` into `parent`'s child list immediately before
    /// `reference`.
    ///
    /// # Errors
    ///
    /// As [`append_child`](Self::append_child); additionally fails with
    /// `invalid-op` when `reference` is not a child of `parent`.
    pub fn insert_child_before(
        &mut self,
        parent: NodeId,
        new: NodeId,
        reference: NodeId,
    ) -> Result<(), XmlError> {
        self.ensure_owner(parent)?;
        self.ensure_owner(new)?;
        self.ensure_owner(reference)?;
        if self.data(reference).parent != Some(parent) {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "reference node is not a child of the target parent",
            ));
        }
        self.check_insertable(parent, new, None)?;
        self.detach(new);

        // `reference` may have moved to the front during the detach.
        let prev = self.data(reference).prev_sibling;
        self.data_mut(new).parent = Some(parent);
        self.data_mut(new).next_sibling = Some(reference);
        self.data_mut(new).prev_sibling = prev;
        self.data_mut(reference).prev_sibling = Some(new);
        match prev {
            Some(p) => self.data_mut(p).next_sibling = Some(new),
            None => self.data_mut(parent).first_child = Some(new),
        }
        self.data_mut(parent).revision += 1;
        Ok(())
    }

    /// Inserts `new` into `parent`'s child list immediately after
    /// `reference`.
    ///
    /// # Errors
    ///
    /// As [`insert_child_before`](Self::insert_child_before).
    pub fn insert_child_after(
        &mut self,
        parent: NodeId,
        new: NodeId,
        reference: NodeId,
    ) -> Result<(), XmlError> {
        self.ensure_owner(parent)?;
        self.ensure_owner(reference)?;
        if self.data(reference).parent != Some(parent) {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "reference node is not a child of the target parent",
            ));
        }
        match self.data(reference).next_sibling {
            Some(next) => self.insert_child_before(parent, new, next),
            None => self.append_child(parent, new),
        }
    }

    /// Removes `old` from `parent` and inserts `new` in its former
    /// position.
    ///
    /// # Errors
    ///
    /// As [`insert_child_before`](Self::insert_child_before); the tree is
    /// unchanged on failure.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
    ) -> Result<(), XmlError> {
        self.ensure_owner(parent)?;
        self.ensure_owner(new)?;
        self.ensure_owner(old)?;
        if self.data(old).parent != Some(parent) {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node to replace is not a child of the target parent",
            ));
        }
        // Validate as if `old` were already gone so that e.g. replacing
        // the document element with another element passes the
        // at-most-one check.
        self.check_insertable(parent, new, Some(old))?;
        let successor = self.data(old).next_sibling;
        self.detach(old);
        match successor {
            Some(next) => self.insert_child_before(parent, new, next),
            None => self.append_child(parent, new),
        }
    }

    /// Removes `child` from `parent`, leaving it detached.
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` when `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), XmlError> {
        self.ensure_owner(parent)?;
        self.ensure_owner(child)?;
        if self.data(child).parent != Some(parent) {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node is not a child of the target parent",
            ));
        }
        self.detach(child);
        Ok(())
    }

    /// Detaches every child of `node`; with `deep`, dismantles the
    /// detached subtrees as well.
    pub fn remove_child_nodes(&mut self, node: NodeId, deep: bool) {
        while let Some(child) = self.data(node).first_child {
            self.detach(child);
            if deep {
                self.remove_child_nodes(child, true);
                self.remove_attributes(child);
            }
        }
    }

    /// Detaches every attribute of `node`.
    pub fn remove_attributes(&mut self, node: NodeId) {
        while let Some(attr) = self.data(node).first_attribute {
            self.detach(attr);
        }
    }

    /// Detaches all attributes and dismantles all child subtrees.
    pub fn remove_all(&mut self, node: NodeId) {
        self.remove_attributes(node);
        self.remove_child_nodes(node, true);
    }

    /// Appends an attribute node to an element (or declaration).
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` when the target does not allow attributes
    /// or the node is not an attribute; fails with `attribute-duplicated`
    /// when an attribute of the same name exists — unless the document is
    /// loading without `validate`, which permits raw duplicates.
    pub fn append_attribute(&mut self, element: NodeId, attr: NodeId) -> Result<(), XmlError> {
        self.ensure_owner(element)?;
        self.ensure_owner(attr)?;
        if !self.node_type(element).allows_attributes() {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node does not allow attributes",
            ));
        }
        if self.node_type(attr) != NodeType::Attribute {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node is not an attribute",
            ));
        }
        let check_duplicates = !self.loading || self.options.validate;
        if check_duplicates {
            let name = self.node_name(attr).to_string();
            if self.find_attribute(element, &name).is_some() {
                return Err(XmlError::new(
                    ErrorKind::AttributeDuplicated,
                    format!("duplicate attribute '{name}'"),
                ));
            }
        }
        self.detach(attr);
        self.link_last_attribute(element, attr);
        Ok(())
    }

    /// Returns the attribute named `name`, creating (and appending) an
    /// empty one when absent.
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` when the target does not allow attributes.
    pub fn append_attribute_named(
        &mut self,
        element: NodeId,
        name: &str,
    ) -> Result<NodeId, XmlError> {
        self.ensure_owner(element)?;
        if !self.node_type(element).allows_attributes() {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node does not allow attributes",
            ));
        }
        if let Some(existing) = self.find_attribute(element, name) {
            return Ok(existing);
        }
        let attr = self.create_attribute(name, "");
        self.link_last_attribute(element, attr);
        Ok(attr)
    }

    /// Removes an attribute node from its element.
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` when `attr` is not an attribute of
    /// `element`.
    pub fn remove_attribute(&mut self, element: NodeId, attr: NodeId) -> Result<(), XmlError> {
        self.ensure_owner(element)?;
        self.ensure_owner(attr)?;
        if self.node_type(attr) != NodeType::Attribute
            || self.data(attr).parent != Some(element)
        {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node is not an attribute of the target element",
            ));
        }
        self.detach(attr);
        Ok(())
    }

    /// Removes the attribute named `name`, if present, returning it.
    pub fn remove_attribute_named(&mut self, element: NodeId, name: &str) -> Option<NodeId> {
        let attr = self.find_attribute(element, name)?;
        self.detach(attr);
        Some(attr)
    }

    /// Sets the value of the attribute named `name`, creating it when
    /// absent.
    ///
    /// # Errors
    ///
    /// Fails with `invalid-op` when the target does not allow attributes.
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        name: &str,
        value: &str,
    ) -> Result<NodeId, XmlError> {
        let attr = self.append_attribute_named(element, name)?;
        if let NodeKind::Attribute { value: stored, .. } = &mut self.data_mut(attr).kind {
            *stored = XmlString::decoded(value);
        }
        Ok(attr)
    }

    /// Detaches a node from its parent's child or attribute list. A node
    /// with no parent is left as is.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.data(id).parent else {
            return;
        };
        let prev = self.data(id).prev_sibling;
        let next = self.data(id).next_sibling;
        let is_attribute = self.node_type(id) == NodeType::Attribute;

        match prev {
            Some(p) => self.data_mut(p).next_sibling = next,
            None if is_attribute => self.data_mut(parent).first_attribute = next,
            None => self.data_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.data_mut(n).prev_sibling = prev,
            None if is_attribute => self.data_mut(parent).last_attribute = prev,
            None => self.data_mut(parent).last_child = prev,
        }

        let node = self.data_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        self.data_mut(parent).revision += 1;
    }

    fn link_last_child(&mut self, parent: NodeId, child: NodeId) {
        self.data_mut(child).parent = Some(parent);
        if let Some(last) = self.data(parent).last_child {
            self.data_mut(last).next_sibling = Some(child);
            self.data_mut(child).prev_sibling = Some(last);
        } else {
            self.data_mut(parent).first_child = Some(child);
        }
        self.data_mut(parent).last_child = Some(child);
        self.data_mut(parent).revision += 1;
    }

    fn link_last_attribute(&mut self, element: NodeId, attr: NodeId) {
        self.data_mut(attr).parent = Some(element);
        if let Some(last) = self.data(element).last_attribute {
            self.data_mut(last).next_sibling = Some(attr);
            self.data_mut(attr).prev_sibling = Some(last);
        } else {
            self.data_mut(element).first_attribute = Some(attr);
        }
        self.data_mut(element).last_attribute = Some(attr);
        self.data_mut(element).revision += 1;
    }

    fn check_insertable(
        &self,
        parent: NodeId,
        child: NodeId,
        replacing: Option<NodeId>,
    ) -> Result<(), XmlError> {
        let parent_type = self.node_type(parent);
        let child_type = self.node_type(child);

        if !parent_type.allows_children() {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                format!("{parent_type:?} nodes do not allow children"),
            ));
        }
        if !parent_type.accepts_child(child_type) {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                format!("a {child_type:?} node cannot be a child of a {parent_type:?} node"),
            ));
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(XmlError::new(
                ErrorKind::InvalidOp,
                "node cannot be inserted as a descendant of itself",
            ));
        }
        // The document holds at most one declaration, one DOCTYPE, and one
        // element.
        if parent_type == NodeType::Document
            && matches!(
                child_type,
                NodeType::Declaration | NodeType::DocumentType | NodeType::Element
            )
        {
            let already = self.children(parent).any(|c| {
                c != child && Some(c) != replacing && self.node_type(c) == child_type
            });
            if already {
                return Err(XmlError::new(
                    ErrorKind::InvalidOp,
                    format!("document already has a {child_type:?} child"),
                ));
            }
        }
        Ok(())
    }

    // --- Queries ---

    /// Finds an attribute by name (wildcard `"*"` matches any).
    #[must_use]
    pub fn find_attribute(&self, element: NodeId, name: &str) -> Option<NodeId> {
        self.attributes(element)
            .find(|&a| name == "*" || self.names_equal(self.node_name(a), name))
    }

    /// Finds an attribute by local name and namespace URI (either may be
    /// the wildcard `"*"`).
    #[must_use]
    pub fn find_attribute_ns(
        &self,
        element: NodeId,
        local: &str,
        uri: &str,
    ) -> Option<NodeId> {
        self.attributes(element).find(|&a| {
            let Some(q) = self.qname(a) else { return false };
            (local == "*" || self.names_equal(q.local(), local))
                && (uri == "*" || q.namespace() == Some(uri))
        })
    }

    /// Finds the attribute whose name is `id`, matched case-insensitively.
    #[must_use]
    pub fn find_attribute_by_id(&self, element: NodeId) -> Option<NodeId> {
        self.attributes(element)
            .find(|&a| self.node_name(a).eq_ignore_ascii_case("id"))
    }

    /// The decoded value of the attribute named `name`, if present.
    #[must_use]
    pub fn attribute_value(&self, element: NodeId, name: &str) -> Option<Cow<'_, str>> {
        let attr = self.find_attribute(element, name)?;
        self.node_value(attr)
    }

    /// Finds the first child element with the given name (wildcard `"*"`
    /// matches any element). Only direct children are considered.
    #[must_use]
    pub fn find_element(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).find(|&c| {
            self.node_type(c) == NodeType::Element
                && (name == "*" || self.names_equal(self.node_name(c), name))
        })
    }

    /// Finds the first child element by local name and namespace URI
    /// (either may be the wildcard `"*"`).
    #[must_use]
    pub fn find_element_ns(&self, parent: NodeId, local: &str, uri: &str) -> Option<NodeId> {
        self.children(parent).find(|&c| {
            if self.node_type(c) != NodeType::Element {
                return false;
            }
            let Some(q) = self.qname(c) else { return false };
            (local == "*" || self.names_equal(q.local(), local))
                && (uri == "*" || q.namespace() == Some(uri))
        })
    }

    /// Recursively finds the element whose `id` attribute (matched
    /// case-insensitively) has the given value.
    #[must_use]
    pub fn get_element_by_id(&self, start: NodeId, id: &str) -> Option<NodeId> {
        if self.node_type(start) == NodeType::Element {
            if let Some(attr) = self.find_attribute_by_id(start) {
                if self.node_value(attr).as_deref() == Some(id) {
                    return Some(start);
                }
            }
        }
        self.children(start)
            .find_map(|c| self.get_element_by_id(c, id))
    }

    /// The node's attributes as a [`NodeList`].
    #[must_use]
    pub fn get_attributes(&self, node: NodeId) -> NodeList {
        NodeList::attributes(self, node)
    }

    /// The node's children as a [`NodeList`]. With `deep`, the list walks
    /// the node itself and every descendant in preorder.
    #[must_use]
    pub fn get_child_nodes(&self, node: NodeId, deep: bool) -> NodeList {
        if deep {
            NodeList::deep(self, node)
        } else {
            NodeList::children(self, node)
        }
    }

    /// The node's direct element children as a [`NodeList`].
    #[must_use]
    pub fn get_elements(&self, node: NodeId) -> NodeList {
        NodeList::children(self, node)
            .with_filter(|doc, id| doc.node_type(id) == NodeType::Element)
    }

    /// Every descendant element matching `name` (wildcard `"*"` matches
    /// any element), in preorder.
    #[must_use]
    pub fn get_elements_by_tag_name(&self, node: NodeId, name: &str) -> NodeList {
        let name = name.to_string();
        NodeList::deep(self, node).with_dyn_filter(move |doc, id| {
            doc.node_type(id) == NodeType::Element
                && (name == "*" || doc.names_equal(doc.node_name(id), &name))
        })
    }

    /// Every descendant element matching a local name and namespace URI
    /// (either may be the wildcard `"*"`), in preorder.
    #[must_use]
    pub fn get_elements_by_tag_name_ns(
        &self,
        node: NodeId,
        local: &str,
        uri: &str,
    ) -> NodeList {
        let local = local.to_string();
        let uri = uri.to_string();
        NodeList::deep(self, node).with_dyn_filter(move |doc, id| {
            if doc.node_type(id) != NodeType::Element {
                return false;
            }
            let Some(q) = doc.qname(id) else { return false };
            (local == "*" || doc.names_equal(q.local(), &local))
                && (uri == "*" || q.namespace() == Some(uri.as_str()))
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Plain iterators ---

/// Iterator over a sibling chain (children or attributes of one node).
pub struct Siblings<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.data(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.data(current).parent;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new();
        assert_eq!(doc.node_type(doc.root()), NodeType::Document);
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.node_name(doc.root()), "#document");
    }

    #[test]
    fn test_create_and_append_element() {
        let mut doc = Document::new();
        let root = doc.root();
        let elem = doc.create_element("item");
        doc.append_child(root, elem).unwrap();

        assert_eq!(doc.first_child(root), Some(elem));
        assert_eq!(doc.last_child(root), Some(elem));
        assert_eq!(doc.parent(elem), Some(root));
        assert_eq!(doc.node_name(elem), "item");
        assert_eq!(doc.level(elem), 1);
    }

    #[test]
    fn test_sibling_links() {
        let mut doc = Document::new();
        let root = doc.root();
        let parent = doc.create_element("p");
        doc.append_child(root, parent).unwrap();

        let a = doc.create_text("A");
        let b = doc.create_text("B");
        let c = doc.create_text("C");
        doc.append_child(parent, a).unwrap();
        doc.append_child(parent, b).unwrap();
        doc.append_child(parent, c).unwrap();

        assert_eq!(doc.children(parent).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.prev_sibling(c), Some(b));
        assert_eq!(doc.prev_sibling(a), None);
        assert_eq!(doc.next_sibling(c), None);
    }

    #[test]
    fn test_document_rejects_second_element() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.create_element("a");
        let second = doc.create_element("b");
        doc.append_child(root, first).unwrap();
        let err = doc.append_child(root, second).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
        // Tree unchanged
        assert_eq!(doc.children(root).count(), 1);
    }

    #[test]
    fn test_document_rejects_text_child() {
        let mut doc = Document::new();
        let root = doc.root();
        let text = doc.create_text("loose");
        let err = doc.append_child(root, text).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_leaf_rejects_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let elem = doc.create_element("e");
        doc.append_child(root, elem).unwrap();
        let text = doc.create_text("t");
        doc.append_child(elem, text).unwrap();

        let more = doc.create_text("more");
        let err = doc.append_child(text, more).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_self_append_rejected() {
        let mut doc = Document::new();
        let elem = doc.create_element("e");
        let err = doc.append_child(elem, elem).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_ancestor_append_rejected() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.create_element("outer");
        let inner = doc.create_element("inner");
        doc.append_child(root, outer).unwrap();
        doc.append_child(outer, inner).unwrap();

        let err = doc.append_child(inner, outer).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_cross_document_append_rejected() {
        let mut d1 = Document::new();
        let mut d2 = Document::new();
        let foreign = d1.create_element("foreign");
        let local = d2.create_element("local");
        d2.append_child(d2.root(), local).unwrap();

        let err = d2.append_child(local, foreign).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_reappend_moves_node() {
        let mut doc = Document::new();
        let root = doc.root();
        let parent = doc.create_element("p");
        doc.append_child(root, parent).unwrap();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(parent, a).unwrap();
        doc.append_child(parent, b).unwrap();

        // Moving a under b detaches it from parent first.
        doc.append_child(b, a).unwrap();
        assert_eq!(doc.children(parent).collect::<Vec<_>>(), vec![b]);
        assert_eq!(doc.parent(a), Some(b));
    }

    #[test]
    fn test_insert_child_before_and_after() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        doc.append_child(root, p).unwrap();

        let a = doc.create_text("a");
        let c = doc.create_text("c");
        doc.append_child(p, a).unwrap();
        doc.append_child(p, c).unwrap();

        let b = doc.create_text("b");
        doc.insert_child_before(p, b, c).unwrap();
        assert_eq!(doc.children(p).collect::<Vec<_>>(), vec![a, b, c]);

        let d = doc.create_text("d");
        doc.insert_child_after(p, d, c).unwrap();
        assert_eq!(doc.children(p).collect::<Vec<_>>(), vec![a, b, c, d]);
    }

    #[test]
    fn test_insert_before_wrong_parent() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        let q = doc.create_element("q");
        doc.append_child(root, p).unwrap();
        doc.append_child(p, q).unwrap();

        let x = doc.create_text("x");
        let err = doc.insert_child_before(root, x, q).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_replace_child() {
        let mut doc = Document::new();
        let root = doc.root();
        let old = doc.create_element("old");
        doc.append_child(root, old).unwrap();

        let new = doc.create_element("new");
        doc.replace_child(root, new, old).unwrap();
        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![new]);
        assert_eq!(doc.parent(old), None);
    }

    #[test]
    fn test_remove_child() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        doc.append_child(root, p).unwrap();
        let a = doc.create_text("a");
        doc.append_child(p, a).unwrap();

        doc.remove_child(p, a).unwrap();
        assert_eq!(doc.children(p).count(), 0);
        assert_eq!(doc.parent(a), None);

        // Detached nodes can be re-attached.
        doc.append_child(p, a).unwrap();
        assert_eq!(doc.children(p).count(), 1);
    }

    #[test]
    fn test_remove_child_nodes_deep() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        let q = doc.create_element("q");
        let t = doc.create_text("t");
        doc.append_child(root, p).unwrap();
        doc.append_child(p, q).unwrap();
        doc.append_child(q, t).unwrap();

        doc.remove_child_nodes(p, true);
        assert_eq!(doc.children(p).count(), 0);
        assert_eq!(doc.children(q).count(), 0);
        assert_eq!(doc.parent(t), None);
    }

    #[test]
    fn test_attributes() {
        let mut doc = Document::new();
        let root = doc.root();
        let e = doc.create_element("e");
        doc.append_child(root, e).unwrap();

        let a1 = doc.create_attribute("x", "1");
        let a2 = doc.create_attribute("y", "2");
        doc.append_attribute(e, a1).unwrap();
        doc.append_attribute(e, a2).unwrap();

        assert_eq!(doc.first_attribute(e), Some(a1));
        assert_eq!(doc.last_attribute(e), Some(a2));
        assert_eq!(doc.attribute_value(e, "x").as_deref(), Some("1"));
        assert_eq!(doc.attribute_value(e, "y").as_deref(), Some("2"));
        assert_eq!(doc.attribute_value(e, "z"), None);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut doc = Document::new();
        let e = doc.create_element("e");
        let a1 = doc.create_attribute("x", "1");
        let a2 = doc.create_attribute("x", "2");
        doc.append_attribute(e, a1).unwrap();
        let err = doc.append_attribute(e, a2).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeDuplicated);
    }

    #[test]
    fn test_append_attribute_named_get_or_create() {
        let mut doc = Document::new();
        let e = doc.create_element("e");
        let a = doc.append_attribute_named(e, "x").unwrap();
        let again = doc.append_attribute_named(e, "x").unwrap();
        assert_eq!(a, again);
        assert_eq!(doc.attributes(e).count(), 1);
    }

    #[test]
    fn test_set_attribute() {
        let mut doc = Document::new();
        let e = doc.create_element("e");
        doc.set_attribute(e, "x", "1").unwrap();
        doc.set_attribute(e, "x", "2").unwrap();
        assert_eq!(doc.attributes(e).count(), 1);
        assert_eq!(doc.attribute_value(e, "x").as_deref(), Some("2"));
    }

    #[test]
    fn test_attributes_on_text_rejected() {
        let mut doc = Document::new();
        let t = doc.create_text("t");
        let a = doc.create_attribute("x", "1");
        let err = doc.append_attribute(t, a).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_remove_attribute() {
        let mut doc = Document::new();
        let e = doc.create_element("e");
        let a = doc.create_attribute("x", "1");
        doc.append_attribute(e, a).unwrap();
        doc.remove_attribute(e, a).unwrap();
        assert_eq!(doc.attributes(e).count(), 0);

        assert!(doc.remove_attribute_named(e, "x").is_none());
    }

    #[test]
    fn test_fragment_append_moves_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        doc.append_child(root, p).unwrap();

        let frag = doc.create_fragment();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(frag, a).unwrap();
        doc.append_child(frag, b).unwrap();

        doc.append_child(p, frag).unwrap();
        assert_eq!(doc.children(p).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(doc.children(frag).count(), 0);
    }

    #[test]
    fn test_whitespace_factory_validates() {
        let mut doc = Document::new();
        assert!(doc.create_whitespace(" \t\n").is_ok());
        let err = doc.create_whitespace(" x ").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAllWhitespace);
        let err = doc.create_significant_whitespace("a").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAllWhitespace);
    }

    #[test]
    fn test_cdata_factory_rejects_terminator() {
        let mut doc = Document::new();
        let err = doc.create_cdata("a ]]> b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
        assert!(doc.create_cdata("plain").is_ok());
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        let t1 = doc.create_text("hello ");
        let b = doc.create_element("b");
        let t2 = doc.create_text("world");
        doc.append_child(root, p).unwrap();
        doc.append_child(p, t1).unwrap();
        doc.append_child(p, b).unwrap();
        doc.append_child(b, t2).unwrap();

        assert_eq!(doc.text_content(p), "hello world");
    }

    #[test]
    fn test_find_element_and_wildcard() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        doc.append_child(root, p).unwrap();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(p, a).unwrap();
        doc.append_child(p, b).unwrap();

        assert_eq!(doc.find_element(p, "b"), Some(b));
        assert_eq!(doc.find_element(p, "*"), Some(a));
        assert_eq!(doc.find_element(p, "missing"), None);
    }

    #[test]
    fn test_get_element_by_id() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        doc.append_child(root, p).unwrap();
        let child = doc.create_element("child");
        doc.append_child(p, child).unwrap();
        doc.set_attribute(child, "ID", "target").unwrap();

        // Case-insensitive match on the attribute name "id"
        assert_eq!(doc.get_element_by_id(root, "target"), Some(child));
        assert_eq!(doc.get_element_by_id(root, "other"), None);
    }

    #[test]
    fn test_case_insensitive_comparator() {
        let mut doc = Document::new();
        doc.set_name_comparator(names_equal_ignore_case);
        let root = doc.root();
        let p = doc.create_element("Item");
        doc.append_child(root, p).unwrap();
        assert_eq!(doc.find_element(root, "ITEM"), Some(p));
    }

    #[test]
    fn test_declaration_attrs() {
        let mut doc = Document::new();
        let root = doc.root();
        let decl = doc.create_declaration();
        doc.append_child(root, decl).unwrap();
        doc.set_attribute(decl, "version", "1.0").unwrap();
        doc.set_attribute(decl, "encoding", "UTF-8").unwrap();

        assert_eq!(doc.version().as_deref(), Some("1.0"));
        assert_eq!(doc.encoding().as_deref(), Some("UTF-8"));
        assert_eq!(doc.standalone(), None);
    }

    #[test]
    fn test_second_declaration_rejected() {
        let mut doc = Document::new();
        let root = doc.root();
        let d1 = doc.create_declaration();
        let d2 = doc.create_declaration();
        doc.append_child(root, d1).unwrap();
        assert_eq!(
            doc.append_child(root, d2).unwrap_err().kind,
            ErrorKind::InvalidOp
        );
    }

    #[test]
    fn test_revision_bumped_by_mutation() {
        let mut doc = Document::new();
        let root = doc.root();
        let before = doc.revision(root);
        let e = doc.create_element("e");
        doc.append_child(root, e).unwrap();
        assert!(doc.revision(root) > before);

        let mid = doc.revision(root);
        doc.remove_child(root, e).unwrap();
        assert!(doc.revision(root) > mid);
    }

    #[test]
    fn test_level() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let t = doc.create_text("t");
        doc.append_child(root, a).unwrap();
        doc.append_child(a, b).unwrap();
        doc.append_child(b, t).unwrap();

        assert_eq!(doc.level(root), 0);
        assert_eq!(doc.level(a), 1);
        assert_eq!(doc.level(b), 2);
        assert_eq!(doc.level(t), 3);
    }
}
