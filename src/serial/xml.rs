//! XML serializer.
//!
//! [`XmlWriter`] accumulates output text and carries the two counters the
//! pretty-printer needs: the current node level (indent depth) and the
//! "only one text child" suppression count that keeps `<a>text</a>` on
//! one line. [`serialize`] walks the tree and emits each node through the
//! writer.
//!
//! Encoding on write: content whose stored state is already encoded is
//! emitted verbatim; everything else has the five specials replaced with
//! the canonical entities. CDATA contents are never escaped (the tree
//! refuses to hold CDATA containing `]]>`).

use crate::tree::{
    AttlistItem, AttlistKeyword, AttlistType, Document, ExternalIdKind, NodeId, NodeKind,
    NodeType, XmlString,
};

/// Indent unit for pretty output.
const INDENT: &str = "  ";

/// Accumulating XML writer with pretty-printing state.
pub struct XmlWriter {
    out: String,
    pretty: bool,
    node_level: u32,
    only_one_node_text: u32,
}

impl XmlWriter {
    /// Creates a writer; `pretty` enables indentation.
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Self {
            out: String::new(),
            pretty,
            node_level: 0,
            only_one_node_text: 0,
        }
    }

    /// Consumes the writer, returning the output text.
    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }

    // --- Raw output ---

    /// Appends one character.
    pub fn put(&mut self, c: char) {
        self.out.push(c);
    }

    /// Appends a string verbatim.
    pub fn put_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Appends a space followed by `s`.
    pub fn put_with_pre_space(&mut self, s: &str) {
        self.out.push(' ');
        self.out.push_str(s);
    }

    /// Appends `s` as a quoted literal, choosing `"` unless the literal
    /// itself contains `"`, in which case `'` is used.
    pub fn put_quoted(&mut self, s: &str) {
        let quote = if s.contains('"') { '\'' } else { '"' };
        self.out.push(quote);
        self.out.push_str(s);
        self.out.push(quote);
    }

    // --- Pretty-printing state ---

    /// Enters one nesting level.
    pub fn inc_node_level(&mut self) {
        self.node_level += 1;
    }

    /// Leaves one nesting level.
    pub fn dec_node_level(&mut self) {
        self.node_level = self.node_level.saturating_sub(1);
    }

    /// Enters a single-text-child region where indentation is suppressed.
    pub fn inc_only_one_node_text(&mut self) {
        self.only_one_node_text += 1;
    }

    /// Leaves a single-text-child region.
    pub fn dec_only_one_node_text(&mut self) {
        self.only_one_node_text = self.only_one_node_text.saturating_sub(1);
    }

    /// In pretty mode, starts a new indented line for the next child.
    /// Suppressed inside single-text-child regions and at the very start
    /// of the output. Compact mode emits nothing.
    pub fn child_break(&mut self) {
        if !self.pretty || self.only_one_node_text > 0 {
            return;
        }
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        for _ in 0..self.node_level {
            self.out.push_str(INDENT);
        }
    }

    // --- Structural helpers ---

    /// `<name`
    pub fn put_element_name_begin(&mut self, name: &str) {
        self.out.push('<');
        self.out.push_str(name);
    }

    /// `>`
    pub fn put_element_name_end(&mut self) {
        self.out.push('>');
    }

    /// `</name>`
    pub fn put_element_end(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    /// `/>`
    pub fn put_element_empty(&mut self) {
        self.out.push_str("/>");
    }

    /// ` name="encoded-value"`
    ///
    /// The value must already be encoded; the encoder escapes `"`, so the
    /// double quote is always safe.
    pub fn put_attribute(&mut self, name: &str, encoded_value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(encoded_value);
        self.out.push('"');
    }

    /// `<![CDATA[raw]]>` — contents are emitted verbatim.
    pub fn put_cdata(&mut self, raw: &str) {
        self.out.push_str("<![CDATA[");
        self.out.push_str(raw);
        self.out.push_str("]]>");
    }

    /// `<!--encoded-->` — contents are emitted verbatim.
    pub fn put_comment(&mut self, encoded: &str) {
        self.out.push_str("<!--");
        self.out.push_str(encoded);
        self.out.push_str("-->");
    }

    /// `<?target data?>`
    pub fn put_processing_instruction(&mut self, target: &str, data: Option<&str>) {
        self.out.push_str("<?");
        self.out.push_str(target);
        if let Some(data) = data {
            self.put_with_pre_space(data);
        }
        self.out.push_str("?>");
    }

    /// `<!DOCTYPE name`
    pub fn put_document_type_begin(&mut self, name: &str) {
        self.out.push_str("<!DOCTYPE ");
        self.out.push_str(name);
    }

    /// Closes a DOCTYPE; `had_subset` selects `]>` over `>`.
    pub fn put_document_type_end(&mut self, had_subset: bool) {
        if had_subset {
            self.out.push(']');
        }
        self.out.push('>');
    }

    /// `<!ATTLIST element`
    pub fn put_document_type_attribute_list_begin(&mut self, element: &str) {
        self.out.push_str("<!ATTLIST ");
        self.out.push_str(element);
    }

    /// Closes an ATTLIST declaration.
    pub fn put_document_type_attribute_list_end(&mut self) {
        self.out.push('>');
    }

    /// `<!ELEMENT name`
    pub fn put_document_type_element_begin(&mut self, name: &str) {
        self.out.push_str("<!ELEMENT ");
        self.out.push_str(name);
    }

    /// Closes an ELEMENT declaration.
    pub fn put_document_type_element_end(&mut self) {
        self.out.push('>');
    }

    /// A complete `<!NOTATION …>` declaration.
    pub fn put_notation(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) {
        self.out.push_str("<!NOTATION ");
        self.out.push_str(name);
        match (public_id, system_id) {
            (Some(public), Some(system)) => {
                self.put_str(" PUBLIC ");
                self.put_quoted(public);
                self.put(' ');
                self.put_quoted(system);
            }
            (Some(public), None) => {
                self.put_str(" PUBLIC ");
                self.put_quoted(public);
            }
            (None, Some(system)) => {
                self.put_str(" SYSTEM ");
                self.put_quoted(system);
            }
            (None, None) => {}
        }
        self.out.push('>');
    }

    /// A complete `<!ENTITY …>` declaration.
    pub fn put_entity_general(
        &mut self,
        name: &str,
        parameter: bool,
        value: Option<&str>,
        public_id: Option<&str>,
        system_id: Option<&str>,
        ndata: Option<&str>,
    ) {
        self.out.push_str("<!ENTITY ");
        if parameter {
            self.out.push_str("% ");
        }
        self.out.push_str(name);
        if let Some(value) = value {
            self.put(' ');
            self.put_quoted(value);
        } else {
            match (public_id, system_id) {
                (Some(public), Some(system)) => {
                    self.put_str(" PUBLIC ");
                    self.put_quoted(public);
                    self.put(' ');
                    self.put_quoted(system);
                }
                (None, Some(system)) => {
                    self.put_str(" SYSTEM ");
                    self.put_quoted(system);
                }
                _ => {}
            }
            if let Some(ndata) = ndata {
                self.put_str(" NDATA ");
                self.put_str(ndata);
            }
        }
        self.out.push('>');
    }

    /// `&name;`
    pub fn put_entity_reference(&mut self, name: &str) {
        self.out.push('&');
        self.out.push_str(name);
        self.out.push(';');
    }
}

/// Serializes a document to an XML string.
///
/// # Examples
///
/// ```
/// use oxdom::Document;
/// use oxdom::serial::serialize;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// assert_eq!(serialize(&doc, false), "<root><child>Hello</child></root>");
/// ```
#[must_use]
pub fn serialize(doc: &Document, pretty: bool) -> String {
    let mut writer = XmlWriter::new(pretty);
    for child in doc.children(doc.root()) {
        write_node(doc, child, &mut writer);
    }
    if pretty {
        writer.put('\n');
    }
    writer.finish()
}

/// Writes one node (and its subtree) through the writer.
pub fn write_node(doc: &Document, id: NodeId, w: &mut XmlWriter) {
    match doc.node_kind(id) {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, w);
            }
        }

        NodeKind::Declaration => {
            w.child_break();
            w.put_str("<?xml");
            for attr in doc.attributes(id) {
                write_attribute(doc, attr, w);
            }
            w.put_str("?>");
        }

        NodeKind::DocumentType {
            name,
            external_id,
            public_id,
            system_id,
        } => {
            w.child_break();
            w.put_document_type_begin(name);
            match external_id {
                ExternalIdKind::System => {
                    if let Some(system) = system_id {
                        w.put_str(" SYSTEM ");
                        w.put_quoted(system.raw());
                    }
                }
                ExternalIdKind::Public => {
                    if let Some(public) = public_id {
                        w.put_str(" PUBLIC ");
                        w.put_quoted(public.raw());
                    }
                    if let Some(system) = system_id {
                        w.put(' ');
                        w.put_quoted(system.raw());
                    }
                }
                ExternalIdKind::None => {}
            }
            let had_subset = doc.first_child(id).is_some();
            if had_subset {
                w.put_str(" [");
                w.inc_node_level();
                for child in doc.children(id) {
                    write_node(doc, child, w);
                }
                w.dec_node_level();
                w.child_break();
            }
            w.put_document_type_end(had_subset);
        }

        NodeKind::Element { name } => {
            w.child_break();
            w.put_element_name_begin(name.full());
            for attr in doc.attributes(id) {
                write_attribute(doc, attr, w);
            }
            if doc.first_child(id).is_none() {
                w.put_element_empty();
            } else {
                w.put_element_name_end();
                let only_text = single_text_child(doc, id);
                if only_text {
                    w.inc_only_one_node_text();
                }
                w.inc_node_level();
                for child in doc.children(id) {
                    write_node(doc, child, w);
                }
                w.dec_node_level();
                w.child_break();
                if only_text {
                    w.dec_only_one_node_text();
                }
                w.put_element_end(name.full());
            }
        }

        NodeKind::Attribute { .. } => write_attribute(doc, id, w),

        NodeKind::Text { content } => {
            w.child_break();
            w.put_str(&content.encoded_form());
        }

        NodeKind::CData { content } => {
            w.child_break();
            w.put_cdata(content.raw());
        }

        NodeKind::Comment { content } => {
            w.child_break();
            w.put_comment(&content.encoded_form());
        }

        NodeKind::ProcessingInstruction { target, data } => {
            w.child_break();
            w.put_processing_instruction(target, data.as_ref().map(XmlString::raw));
        }

        NodeKind::Whitespace { content } | NodeKind::SignificantWhitespace { content } => {
            w.put_str(content);
        }

        NodeKind::Entity {
            name,
            parameter,
            value,
            public_id,
            system_id,
            ndata,
        } => {
            w.child_break();
            w.put_entity_general(
                name,
                *parameter,
                value.as_ref().map(|v| v.encoded_form()).as_deref(),
                public_id.as_ref().map(XmlString::raw),
                system_id.as_ref().map(XmlString::raw),
                ndata.as_deref(),
            );
        }

        NodeKind::EntityReference { name } => {
            w.put_entity_reference(name);
        }

        NodeKind::Notation {
            name,
            public_id,
            system_id,
        } => {
            w.child_break();
            w.put_notation(
                name,
                public_id.as_ref().map(XmlString::raw),
                system_id.as_ref().map(XmlString::raw),
            );
        }

        NodeKind::AttributeListDecl { element, items } => {
            w.child_break();
            w.put_document_type_attribute_list_begin(element);
            for item in items {
                write_attlist_item(item, w);
            }
            w.put_document_type_attribute_list_end();
        }

        NodeKind::ElementDecl { name, content } => {
            w.child_break();
            w.put_document_type_element_begin(name);
            w.put_with_pre_space(&content.to_string());
            w.put_document_type_element_end();
        }

        NodeKind::DocumentFragment => {
            for child in doc.children(id) {
                write_node(doc, child, w);
            }
        }
    }
}

fn write_attribute(doc: &Document, attr: NodeId, w: &mut XmlWriter) {
    if let NodeKind::Attribute { name, value } = doc.node_kind(attr) {
        w.put_attribute(name.full(), &value.encoded_form());
    }
}

fn write_attlist_item(item: &AttlistItem, w: &mut XmlWriter) {
    w.put_with_pre_space(&item.name);
    match &item.item_type {
        AttlistType::Named(name) => w.put_with_pre_space(name),
        AttlistType::Enumeration(values) => {
            w.put(' ');
            put_enumeration(values, w);
        }
        AttlistType::Notation(values) => {
            w.put_str(" NOTATION ");
            put_enumeration(values, w);
        }
    }
    match item.keyword {
        Some(AttlistKeyword::Required) => w.put_with_pre_space("#REQUIRED"),
        Some(AttlistKeyword::Implied) => w.put_with_pre_space("#IMPLIED"),
        Some(AttlistKeyword::Fixed) => w.put_with_pre_space("#FIXED"),
        None => {}
    }
    if let Some(default) = &item.default {
        w.put(' ');
        w.put_quoted(&default.encoded_form());
    }
}

fn put_enumeration(values: &[std::sync::Arc<str>], w: &mut XmlWriter) {
    w.put('(');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            w.put('|');
        }
        w.put_str(value);
    }
    w.put(')');
}

/// `true` when the element's children are exactly one text-ish node, so
/// pretty output keeps `<a>text</a>` on one line.
fn single_text_child(doc: &Document, element: NodeId) -> bool {
    let Some(first) = doc.first_child(element) else {
        return false;
    };
    doc.next_sibling(first).is_none()
        && matches!(doc.node_type(first), NodeType::Text | NodeType::CData)
}
