//! Core XML 1.0 parser state machine.
//!
//! The top-level loop runs while input remains: whitespace at document
//! level is discarded (or kept as whitespace nodes under
//! `preserve_whitespace`), anything else must open with `<` and is
//! dispatched on the token that follows — `xml` after `<?` to the
//! declaration, `--`/`[CDATA[`/`DOCTYPE`/`ELEMENT`/`ENTITY`/`ATTLIST`/
//! `NOTATION` after `<!` to their handlers, any other `<?target` to a
//! processing instruction, and everything else to element parsing.
//!
//! Nodes are allocated through the document factory and appended with the
//! ordinary tree operations, so the document invariants (permitted
//! children, single declaration/DOCTYPE/element, ancestry) are checked
//! uniformly — a misplaced construct fails as `invalid-op` at its source
//! location.

use std::mem;
use std::sync::Arc;

use crate::error::{ErrorKind, XmlError};
use crate::sax::SaxHooks;
use crate::tree::{
    AttlistItem, AttlistKeyword, AttlistType, ContentModel, ContentParticle, Document,
    ExternalIdKind, NodeId, Occurrence, ParticleKind, XmlString,
};
use crate::util::chars;
use crate::util::entities::EntityTable;
use crate::util::pool::BufferPool;

use super::input::Reader;
use super::ParseOptions;

/// The tree-building XML parser.
pub(crate) struct XmlParser<'a, 'h> {
    input: Reader<'a>,
    doc: Document,
    options: ParseOptions,
    /// Working entity table; seeded with the predefined five, extended by
    /// DOCTYPE-declared entities, installed into the document at the end.
    entities: EntityTable,
    /// Working buffer pool; installed into the document at the end.
    buffers: BufferPool,
    hooks: Option<&'h mut dyn SaxHooks>,
}

impl<'a, 'h> XmlParser<'a, 'h> {
    pub fn new(
        input: &'a str,
        options: &ParseOptions,
        hooks: Option<&'h mut dyn SaxHooks>,
    ) -> Self {
        Self {
            input: Reader::new(input),
            doc: Document::with_options(*options),
            options: *options,
            entities: EntityTable::new(),
            buffers: BufferPool::new(),
            hooks,
        }
    }

    /// Main entry point. Parses the entire input into a document.
    pub fn parse(&mut self) -> Result<Document, XmlError> {
        self.doc.set_loading(true);
        let outcome = self.parse_document();
        self.doc.set_loading(false);
        outcome?;

        let entities = mem::replace(&mut self.entities, EntityTable::new());
        self.doc.set_entities(entities);
        self.doc.set_buffer_pool(mem::take(&mut self.buffers));
        Ok(mem::take(&mut self.doc))
    }

    fn parse_document(&mut self) -> Result<(), XmlError> {
        loop {
            match self.input.peek() {
                None => return Ok(()),
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.document_whitespace()?,
                Some(b'<') => {
                    let root = self.doc.root();
                    self.parse_node(root)?;
                }
                Some(b) => {
                    return Err(self.input.fatal(
                        ErrorKind::UnexpectedChar,
                        format!("expected '<', found '{}'", b as char),
                    ));
                }
            }
        }
    }

    fn document_whitespace(&mut self) -> Result<(), XmlError> {
        if !self.options.preserve_whitespace {
            self.input.skip_spaces();
            return Ok(());
        }
        let mut buf = self.buffers.acquire();
        self.input.read_spaces(&mut buf);
        let ws = self.doc.create_whitespace(buf.value())?;
        drop(buf);
        let root = self.doc.root();
        self.append(root, ws)?;
        self.fire_other(ws);
        Ok(())
    }

    // --- Dispatch ---

    /// Parses one construct opening with `<` into `parent`.
    fn parse_node(&mut self, parent: NodeId) -> Result<(), XmlError> {
        match self.input.peek_at(1) {
            Some(b'?') => {
                self.input.advance(2);
                let target = self.input.read_name()?;
                if target == "xml" {
                    self.parse_declaration(parent)
                } else {
                    self.parse_pi(parent, &target)
                }
            }
            Some(b'!') => {
                if self.input.looking_at(b"<!--") {
                    self.input.advance(4);
                    self.parse_comment(parent)
                } else if self.input.looking_at(b"<![CDATA[") {
                    self.input.advance(9);
                    self.parse_cdata(parent)
                } else {
                    self.input.advance(2);
                    let keyword = self.input.read_name()?;
                    match keyword.as_str() {
                        "DOCTYPE" => self.parse_doctype(parent),
                        "ELEMENT" => self.parse_element_decl(parent),
                        "ENTITY" => self.parse_entity_decl(parent),
                        "ATTLIST" => self.parse_attlist_decl(parent),
                        "NOTATION" => self.parse_notation_decl(parent),
                        other => Err(self.input.fatal(
                            ErrorKind::UnexpectedString,
                            format!("unrecognized declaration '<!{other}'"),
                        )),
                    }
                }
            }
            _ => self.parse_element(parent).map(|_| ()),
        }
    }

    // --- Elements ---

    fn parse_element(&mut self, parent: NodeId) -> Result<NodeId, XmlError> {
        self.input.expect_byte(b'<')?;
        let name = self.input.read_name()?;
        let elem = self.doc.create_element(&name);
        self.append(parent, elem)?;

        loop {
            let had_space = self.input.skip_spaces();
            match self.input.peek() {
                Some(b'/' | b'>') => break,
                None => {
                    return Err(self
                        .input
                        .fatal(ErrorKind::UnexpectedEof, "end of input inside start tag"));
                }
                Some(_) => {
                    if !had_space {
                        return Err(self.input.fatal(
                            ErrorKind::UnexpectedChar,
                            "whitespace required before attribute",
                        ));
                    }
                    self.parse_attribute(elem)?;
                }
            }
        }

        let keep_begin = self.fire_element_begin(elem);

        if self.input.eat(b'/') {
            self.input.expect_byte(b'>')?;
        } else {
            self.input.expect_byte(b'>')?;
            self.parse_content(elem)?;
            self.input.expect_str(b"</")?;
            let end_loc = self.input.location();
            let end_name = self.input.read_name()?;
            if end_name != name {
                return Err(XmlError::at(
                    ErrorKind::MismatchedEndTag,
                    format!("expected </{name}>, found </{end_name}>"),
                    end_loc,
                ));
            }
            self.input.skip_spaces();
            self.input.expect_byte(b'>')?;
        }

        let keep_end = self.fire_element_end(elem);
        if !keep_begin || !keep_end {
            self.doc.detach(elem);
        }
        Ok(elem)
    }

    fn parse_content(&mut self, parent: NodeId) -> Result<(), XmlError> {
        loop {
            if self.input.at_end() {
                return Err(self
                    .input
                    .fatal(ErrorKind::UnexpectedEof, "end of input in element content"));
            }
            if self.input.looking_at(b"</") {
                return Ok(());
            }
            if self.input.peek() == Some(b'<') {
                self.parse_node(parent)?;
            } else {
                self.parse_text(parent)?;
            }
        }
    }

    fn parse_text(&mut self, parent: NodeId) -> Result<(), XmlError> {
        let mut buf = self.buffers.acquire();
        let all_whitespace = self.input.read_text(&mut buf, &self.entities)?;
        if buf.is_empty() {
            return Ok(());
        }
        let content = buf.take_value();
        drop(buf);

        if all_whitespace {
            // Whitespace-only runs inside elements are dropped unless
            // preservation is on.
            if self.options.preserve_whitespace {
                let ws = self.doc.create_significant_whitespace(&content)?;
                self.append(parent, ws)?;
                self.fire_other(ws);
            }
            return Ok(());
        }

        let text = self.doc.create_text_xml(XmlString::decoded(content));
        self.append(parent, text)?;
        self.fire_other(text);
        Ok(())
    }

    // --- Attributes (shared by element tags and the XML declaration) ---

    fn parse_attribute(&mut self, owner: NodeId) -> Result<NodeId, XmlError> {
        let loc = self.input.location();
        let name = self.input.read_name()?;
        self.input.skip_spaces();
        self.input.expect_byte(b'=')?;
        self.input.skip_spaces();

        let mut buf = self.buffers.acquire();
        self.input.read_attribute_value(&mut buf, &self.entities)?;
        let value = buf.take_value();
        drop(buf);

        let attr = self
            .doc
            .create_attribute_xml(&name, XmlString::decoded(value));
        self.doc
            .append_attribute(owner, attr)
            .map_err(|e| XmlError::at(e.kind, e.message, loc))?;
        if !self.fire_attribute(owner, attr) {
            self.doc.detach(attr);
        }
        Ok(attr)
    }

    // --- XML declaration ---

    fn parse_declaration(&mut self, parent: NodeId) -> Result<(), XmlError> {
        let decl = self.doc.create_declaration();
        self.append(parent, decl)?;

        loop {
            let had_space = self.input.skip_spaces();
            if self.input.looking_at(b"?>") {
                self.input.advance(2);
                break;
            }
            if self.input.at_end() {
                return Err(self.input.fatal(
                    ErrorKind::UnexpectedString,
                    "'?>' not found before end of input",
                ));
            }
            if !had_space {
                return Err(self.input.fatal(
                    ErrorKind::UnexpectedChar,
                    "whitespace required before declaration attribute",
                ));
            }
            self.parse_attribute(decl)?;
        }

        self.validate_declaration(decl)?;
        self.fire_other(decl);
        Ok(())
    }

    fn validate_declaration(&self, decl: NodeId) -> Result<(), XmlError> {
        if let Some(version) = self.doc.attribute_value(decl, "version") {
            if !chars::is_version_string(&version) {
                return Err(self.input.fatal(
                    ErrorKind::InvalidVersion,
                    format!("invalid version string '{version}'"),
                ));
            }
        }
        if let Some(standalone) = self.doc.attribute_value(decl, "standalone") {
            if standalone != "yes" && standalone != "no" {
                return Err(self.input.fatal(
                    ErrorKind::InvalidStandalone,
                    format!("standalone must be 'yes' or 'no', found '{standalone}'"),
                ));
            }
        }
        Ok(())
    }

    // --- Processing instructions ---

    fn parse_pi(&mut self, parent: NodeId, target: &str) -> Result<(), XmlError> {
        let data = if self.input.skip_spaces() {
            let mut buf = self.buffers.acquire();
            if !self.input.read_until(&mut buf, b"?>") {
                return Err(self.input.fatal(
                    ErrorKind::UnexpectedString,
                    "'?>' not found before end of input",
                ));
            }
            let data = buf.take_value();
            if data.is_empty() {
                None
            } else {
                Some(data)
            }
        } else {
            self.input.expect_str(b"?>")?;
            None
        };

        let pi = self
            .doc
            .create_processing_instruction(target, data.as_deref());
        self.append(parent, pi)?;
        self.fire_other(pi);
        Ok(())
    }

    // --- Comments ---

    fn parse_comment(&mut self, parent: NodeId) -> Result<(), XmlError> {
        let mut buf = self.buffers.acquire();
        if !self.input.read_until(&mut buf, b"-->") {
            return Err(self.input.fatal(
                ErrorKind::UnexpectedString,
                "'-->' not found before end of input",
            ));
        }
        let content = buf.take_value();
        drop(buf);

        let comment = self.doc.create_comment(&content);
        self.append(parent, comment)?;
        self.fire_other(comment);
        Ok(())
    }

    // --- CDATA ---

    fn parse_cdata(&mut self, parent: NodeId) -> Result<(), XmlError> {
        let mut buf = self.buffers.acquire();
        if !self.input.read_until(&mut buf, b"]]>") {
            return Err(self.input.fatal(
                ErrorKind::UnexpectedString,
                "']]>' not found before end of input",
            ));
        }
        let content = buf.take_value();
        drop(buf);

        let loc = self.input.location();
        let cdata = self
            .doc
            .create_cdata(&content)
            .map_err(|e| XmlError::at(e.kind, e.message, loc))?;
        self.append(parent, cdata)?;
        self.fire_other(cdata);
        Ok(())
    }

    // --- DOCTYPE ---

    fn parse_doctype(&mut self, parent: NodeId) -> Result<(), XmlError> {
        self.input.skip_spaces_required()?;
        let name = self.input.read_name()?;
        self.input.skip_spaces();

        let mut external_id = ExternalIdKind::None;
        let mut public_id = None;
        let mut system_id = None;
        if self.input.looking_at(b"SYSTEM") {
            self.input.advance(6);
            external_id = ExternalIdKind::System;
            self.input.skip_spaces_required()?;
            system_id = Some(self.input.read_quoted()?);
            self.input.skip_spaces();
        } else if self.input.looking_at(b"PUBLIC") {
            self.input.advance(6);
            external_id = ExternalIdKind::Public;
            self.input.skip_spaces_required()?;
            public_id = Some(self.input.read_quoted()?);
            self.input.skip_spaces_required()?;
            system_id = Some(self.input.read_quoted()?);
            self.input.skip_spaces();
        }

        let doctype = self.doc.create_document_type(
            &name,
            external_id,
            public_id.as_deref(),
            system_id.as_deref(),
        );
        self.append(parent, doctype)?;

        if self.input.eat(b'[') {
            self.parse_internal_subset(doctype)?;
            self.input.skip_spaces();
        }
        self.input.expect_byte(b'>')?;
        self.fire_other(doctype);
        Ok(())
    }

    /// Parses the internal subset between `[` and `]` into children of
    /// the DOCTYPE node.
    fn parse_internal_subset(&mut self, doctype: NodeId) -> Result<(), XmlError> {
        loop {
            if matches!(self.input.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
                self.subset_whitespace(doctype)?;
                continue;
            }
            match self.input.peek() {
                None => {
                    return Err(self.input.fatal(
                        ErrorKind::UnexpectedEof,
                        "end of input in DOCTYPE internal subset",
                    ));
                }
                Some(b']') => {
                    self.input.advance(1);
                    return Ok(());
                }
                Some(b'%') => self.parse_parameter_reference(doctype)?,
                Some(b'<') => {
                    if self.input.looking_at(b"<!--") {
                        self.input.advance(4);
                        self.parse_comment(doctype)?;
                    } else if self.input.looking_at(b"<?") {
                        self.input.advance(2);
                        let target = self.input.read_name()?;
                        self.parse_pi(doctype, &target)?;
                    } else if self.input.looking_at(b"<!") {
                        self.input.advance(2);
                        let keyword = self.input.read_name()?;
                        match keyword.as_str() {
                            "ELEMENT" => self.parse_element_decl(doctype)?,
                            "ENTITY" => self.parse_entity_decl(doctype)?,
                            "ATTLIST" => self.parse_attlist_decl(doctype)?,
                            "NOTATION" => self.parse_notation_decl(doctype)?,
                            other => {
                                return Err(self.input.fatal(
                                    ErrorKind::UnexpectedString,
                                    format!("unrecognized declaration '<!{other}' in internal subset"),
                                ));
                            }
                        }
                    } else {
                        return Err(self.input.fatal(
                            ErrorKind::UnexpectedChar,
                            "unknown construct in DOCTYPE internal subset",
                        ));
                    }
                }
                Some(b) => {
                    return Err(self.input.fatal(
                        ErrorKind::UnexpectedChar,
                        format!("unexpected '{}' in DOCTYPE internal subset", b as char),
                    ));
                }
            }
        }
    }

    fn subset_whitespace(&mut self, doctype: NodeId) -> Result<(), XmlError> {
        if !self.options.preserve_whitespace {
            self.input.skip_spaces();
            return Ok(());
        }
        let mut buf = self.buffers.acquire();
        self.input.read_spaces(&mut buf);
        let ws = self.doc.create_whitespace(buf.value())?;
        drop(buf);
        self.append(doctype, ws)?;
        self.fire_other(ws);
        Ok(())
    }

    /// A `%name;` parameter-entity reference in the internal subset is
    /// preserved as a Text child of the DOCTYPE node; no expansion is
    /// performed.
    fn parse_parameter_reference(&mut self, doctype: NodeId) -> Result<(), XmlError> {
        self.input.expect_byte(b'%')?;
        let name = self.input.read_name()?;
        let mut token = String::with_capacity(name.len() + 2);
        token.push('%');
        token.push_str(&name);
        if self.input.eat(b';') {
            token.push(';');
        }
        let text = self.doc.create_text_xml(XmlString::decoded(token));
        self.append(doctype, text)?;
        self.fire_other(text);
        Ok(())
    }

    // --- <!ENTITY ...> ---

    fn parse_entity_decl(&mut self, parent: NodeId) -> Result<(), XmlError> {
        self.input.skip_spaces_required()?;
        let parameter = self.input.eat(b'%');
        if parameter {
            self.input.skip_spaces_required()?;
        }
        let name = self.input.read_name()?;
        self.input.skip_spaces_required()?;

        let mut value = None;
        let mut public_id = None;
        let mut system_id = None;
        let mut ndata = None;

        if matches!(self.input.peek(), Some(b'"' | b'\'')) {
            value = Some(self.input.read_quoted()?);
        } else if self.input.looking_at(b"SYSTEM") {
            self.input.advance(6);
            self.input.skip_spaces_required()?;
            system_id = Some(self.input.read_quoted()?);
        } else if self.input.looking_at(b"PUBLIC") {
            self.input.advance(6);
            self.input.skip_spaces_required()?;
            public_id = Some(self.input.read_quoted()?);
            self.input.skip_spaces_required()?;
            system_id = Some(self.input.read_quoted()?);
        } else {
            return Err(self.input.fatal(
                ErrorKind::UnexpectedChar,
                "expected entity value, SYSTEM, or PUBLIC",
            ));
        }

        if system_id.is_some() {
            self.input.skip_spaces();
            if self.input.looking_at(b"NDATA") {
                self.input.advance(5);
                self.input.skip_spaces_required()?;
                ndata = Some(self.input.read_name()?);
            }
        }

        self.input.skip_spaces();
        self.input.expect_byte(b'>')?;

        let entity = self.doc.create_entity(
            &name,
            parameter,
            value.as_deref(),
            public_id.as_deref(),
            system_id.as_deref(),
            ndata.as_deref(),
        );
        self.append(parent, entity)?;

        // General internal entities become resolvable in document content.
        if !parameter {
            if let Some(replacement) = &value {
                self.entities.insert(&name, replacement);
            }
        }
        self.fire_other(entity);
        Ok(())
    }

    // --- <!NOTATION ...> ---

    fn parse_notation_decl(&mut self, parent: NodeId) -> Result<(), XmlError> {
        self.input.skip_spaces_required()?;
        let name = self.input.read_name()?;
        self.input.skip_spaces_required()?;

        let mut public_id = None;
        let mut system_id = None;
        if self.input.looking_at(b"SYSTEM") {
            self.input.advance(6);
            self.input.skip_spaces_required()?;
            system_id = Some(self.input.read_quoted()?);
        } else if self.input.looking_at(b"PUBLIC") {
            self.input.advance(6);
            self.input.skip_spaces_required()?;
            public_id = Some(self.input.read_quoted()?);
            self.input.skip_spaces();
            if matches!(self.input.peek(), Some(b'"' | b'\'')) {
                system_id = Some(self.input.read_quoted()?);
            }
        } else {
            return Err(self.input.fatal(
                ErrorKind::UnexpectedString,
                "expected SYSTEM or PUBLIC in notation declaration",
            ));
        }

        self.input.skip_spaces();
        self.input.expect_byte(b'>')?;

        let notation =
            self.doc
                .create_notation(&name, public_id.as_deref(), system_id.as_deref());
        self.append(parent, notation)?;
        self.fire_other(notation);
        Ok(())
    }

    // --- <!ELEMENT ...> ---

    fn parse_element_decl(&mut self, parent: NodeId) -> Result<(), XmlError> {
        self.input.skip_spaces_required()?;
        let name = self.input.read_name()?;
        self.input.skip_spaces_required()?;

        let content = if self.input.peek() == Some(b'(') {
            ContentModel::Group(self.parse_content_particle()?)
        } else {
            let keyword = self.input.read_name()?;
            match keyword.as_str() {
                "ANY" => ContentModel::Any,
                "EMPTY" => ContentModel::Empty,
                other => {
                    return Err(self.input.fatal(
                        ErrorKind::InvalidName,
                        format!("expected ANY, EMPTY, or '(', found '{other}'"),
                    ));
                }
            }
        };

        self.input.skip_spaces();
        self.input.expect_byte(b'>')?;

        let decl = self.doc.create_element_decl(&name, content);
        self.append(parent, decl)?;
        self.fire_other(decl);
        Ok(())
    }

    /// Parses one parenthesized group of the element-content choice
    /// grammar: atoms are names, separated consistently by `|`
    /// (alternatives) or `,` (sequence), with an optional trailing
    /// multiplicity on every atom or group. Nesting is unbounded.
    fn parse_content_particle(&mut self) -> Result<ContentParticle, XmlError> {
        self.input.expect_byte(b'(')?;
        let mut items = Vec::new();
        let mut separator: Option<u8> = None;

        loop {
            self.input.skip_spaces();
            let item = if self.input.peek() == Some(b'(') {
                self.parse_content_particle()?
            } else {
                let atom = self.input.read_choice_name()?;
                let occurrence = self.read_occurrence();
                ContentParticle {
                    kind: ParticleKind::Name(Arc::from(atom.as_str())),
                    occurrence,
                }
            };
            items.push(item);

            self.input.skip_spaces();
            match self.input.peek() {
                Some(b')') => {
                    self.input.advance(1);
                    break;
                }
                Some(sep @ (b'|' | b',')) => {
                    if separator.is_some_and(|prev| prev != sep) {
                        return Err(self.input.fatal(
                            ErrorKind::UnexpectedChar,
                            "'|' and ',' mixed in one content-model group",
                        ));
                    }
                    separator = Some(sep);
                    self.input.advance(1);
                }
                Some(b) => {
                    return Err(self.input.fatal(
                        ErrorKind::UnexpectedChar,
                        format!("unexpected '{}' in content model", b as char),
                    ));
                }
                None => {
                    return Err(self
                        .input
                        .fatal(ErrorKind::UnexpectedEof, "end of input in content model"));
                }
            }
        }

        let occurrence = self.read_occurrence();
        let kind = match separator {
            Some(b',') => ParticleKind::Seq(items),
            _ => ParticleKind::Choice(items),
        };
        Ok(ContentParticle { kind, occurrence })
    }

    fn read_occurrence(&mut self) -> Occurrence {
        match self.input.peek() {
            Some(b'?') => {
                self.input.advance(1);
                Occurrence::Optional
            }
            Some(b'*') => {
                self.input.advance(1);
                Occurrence::ZeroOrMore
            }
            Some(b'+') => {
                self.input.advance(1);
                Occurrence::OneOrMore
            }
            _ => Occurrence::Once,
        }
    }

    // --- <!ATTLIST ...> ---

    fn parse_attlist_decl(&mut self, parent: NodeId) -> Result<(), XmlError> {
        self.input.skip_spaces_required()?;
        let element = self.input.read_name()?;

        let mut items = Vec::new();
        loop {
            self.input.skip_spaces();
            if self.input.eat(b'>') {
                break;
            }
            if self.input.at_end() {
                return Err(self.input.fatal(
                    ErrorKind::UnexpectedEof,
                    "end of input in attribute-list declaration",
                ));
            }
            items.push(self.parse_attlist_item()?);
        }

        let decl = self.doc.create_attribute_list(&element, items);
        self.append(parent, decl)?;
        self.fire_other(decl);
        Ok(())
    }

    /// One `<!ATTLIST>` item: name, then an enumerated type or a type
    /// name (possibly `NOTATION (…)`), then an optional default keyword
    /// and an optional quoted default value.
    fn parse_attlist_item(&mut self) -> Result<AttlistItem, XmlError> {
        let name = self.input.read_name()?;
        self.input.skip_spaces_required()?;

        let item_type = if self.input.peek() == Some(b'(') {
            AttlistType::Enumeration(self.parse_enumeration()?)
        } else {
            let type_name = self.input.read_name()?;
            if type_name == "NOTATION" {
                self.input.skip_spaces_required()?;
                AttlistType::Notation(self.parse_enumeration()?)
            } else {
                AttlistType::Named(Arc::from(type_name.as_str()))
            }
        };

        self.input.skip_spaces();
        let keyword = if self.input.peek() == Some(b'#') {
            let kw = self.input.read_choice_name()?;
            Some(match kw.as_str() {
                "#REQUIRED" => AttlistKeyword::Required,
                "#IMPLIED" => AttlistKeyword::Implied,
                "#FIXED" => AttlistKeyword::Fixed,
                other => {
                    return Err(self.input.fatal(
                        ErrorKind::InvalidName,
                        format!("unknown default keyword '{other}'"),
                    ));
                }
            })
        } else {
            None
        };

        self.input.skip_spaces();
        let default = if matches!(self.input.peek(), Some(b'"' | b'\'')) {
            Some(XmlString::check(self.input.read_quoted()?))
        } else {
            None
        };

        Ok(AttlistItem {
            name: Arc::from(name.as_str()),
            item_type,
            keyword,
            default,
        })
    }

    fn parse_enumeration(&mut self) -> Result<Vec<Arc<str>>, XmlError> {
        self.input.expect_byte(b'(')?;
        let mut names = Vec::new();
        loop {
            self.input.skip_spaces();
            let name = self.input.read_nmtoken()?;
            names.push(Arc::from(name.as_str()));
            self.input.skip_spaces();
            match self.input.peek() {
                Some(b')') => {
                    self.input.advance(1);
                    return Ok(names);
                }
                Some(b'|') => self.input.advance(1),
                Some(b) => {
                    return Err(self.input.fatal(
                        ErrorKind::UnexpectedChar,
                        format!("unexpected '{}' in enumeration", b as char),
                    ));
                }
                None => {
                    return Err(self
                        .input
                        .fatal(ErrorKind::UnexpectedEof, "end of input in enumeration"));
                }
            }
        }
    }

    // --- Helpers ---

    /// Appends through the ordinary tree operation, pinning failures to
    /// the current source location.
    fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), XmlError> {
        let loc = self.input.location();
        self.doc
            .append_child(parent, child)
            .map_err(|e| XmlError::at(e.kind, e.message, loc))
    }

    fn fire_attribute(&mut self, element: NodeId, attribute: NodeId) -> bool {
        if !self.options.use_sax {
            return true;
        }
        match self.hooks.as_mut() {
            Some(h) => h.on_attribute(&self.doc, element, attribute),
            None => true,
        }
    }

    fn fire_element_begin(&mut self, element: NodeId) -> bool {
        if !self.options.use_sax {
            return true;
        }
        match self.hooks.as_mut() {
            Some(h) => h.on_element_begin(&self.doc, element),
            None => true,
        }
    }

    fn fire_element_end(&mut self, element: NodeId) -> bool {
        if !self.options.use_sax {
            return true;
        }
        match self.hooks.as_mut() {
            Some(h) => h.on_element_end(&self.doc, element),
            None => true,
        }
    }

    fn fire_other(&mut self, node: NodeId) {
        if !self.options.use_sax {
            return;
        }
        let keep = match self.hooks.as_mut() {
            Some(h) => h.on_other_node(&self.doc, node),
            None => true,
        };
        if !keep {
            self.doc.detach(node);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, NodeType};
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Document {
        Document::parse_str(input).unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    #[test]
    fn test_parse_empty_element() {
        let doc = parse("<root/>");
        let root = doc.document_element().unwrap();
        assert_eq!(doc.node_name(root), "root");
        assert_eq!(doc.first_child(root), None);
    }

    #[test]
    fn test_parse_element_with_text() {
        let doc = parse("<greeting>Hello, world!</greeting>");
        let root = doc.document_element().unwrap();
        assert_eq!(doc.text_content(root), "Hello, world!");
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse("<a><b><c/></b></a>");
        let a = doc.document_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let c = doc.first_child(b).unwrap();
        assert_eq!(doc.node_name(a), "a");
        assert_eq!(doc.node_name(b), "b");
        assert_eq!(doc.node_name(c), "c");
    }

    #[test]
    fn test_parse_attributes() {
        let doc = parse("<div id=\"main\" class='big'/>");
        let root = doc.document_element().unwrap();
        assert_eq!(doc.attribute_value(root, "id").as_deref(), Some("main"));
        assert_eq!(doc.attribute_value(root, "class").as_deref(), Some("big"));
    }

    #[test]
    fn test_attribute_value_decoded() {
        let doc = parse("<a v=\"&amp;&lt;&gt;&apos;&quot;\"/>");
        let root = doc.document_element().unwrap();
        assert_eq!(doc.attribute_value(root, "v").as_deref(), Some("&<>'\""));
    }

    #[test]
    fn test_parse_declaration() {
        let doc = parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?><r/>");
        assert_eq!(doc.version().as_deref(), Some("1.0"));
        assert_eq!(doc.encoding().as_deref(), Some("UTF-8"));
        assert_eq!(doc.standalone(), None);
    }

    #[test]
    fn test_declaration_standalone_validated() {
        let err = Document::parse_str("<?xml version=\"1.0\" standalone=\"maybe\"?><r/>")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidStandalone);

        let doc = parse("<?xml version=\"1.0\" standalone=\"no\"?><r/>");
        assert_eq!(doc.standalone().as_deref(), Some("no"));
    }

    #[test]
    fn test_declaration_version_validated() {
        let err = Document::parse_str("<?xml version=\"1 0\"?><r/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidVersion);
    }

    #[test]
    fn test_parse_comment_with_double_hyphens() {
        let doc = parse("<c><!----comment----></c>");
        let c = doc.document_element().unwrap();
        let comment = doc.first_child(c).unwrap();
        assert_eq!(doc.node_type(comment), NodeType::Comment);
        assert_eq!(doc.node_value_raw(comment), Some("--comment--"));
    }

    #[test]
    fn test_parse_cdata() {
        let doc = parse("<r><![CDATA[data &<>]]></r>");
        let r = doc.document_element().unwrap();
        let cdata = doc.first_child(r).unwrap();
        assert_eq!(doc.node_type(cdata), NodeType::CData);
        assert_eq!(doc.node_value_raw(cdata), Some("data &<>"));
    }

    #[test]
    fn test_parse_pi() {
        let doc = parse("<?my-target some data?><r/>");
        let pi = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.node_type(pi), NodeType::ProcessingInstruction);
        assert_eq!(doc.node_name(pi), "my-target");
        assert_eq!(doc.node_value_raw(pi), Some("some data"));
    }

    #[test]
    fn test_parse_entity_references_in_text() {
        let doc = parse("<r>&amp; &lt; &gt; &apos; &quot; &#65; &#x42;</r>");
        let r = doc.document_element().unwrap();
        assert_eq!(doc.text_content(r), "& < > ' \" A B");
    }

    #[test]
    fn test_unknown_entity_fails() {
        let err = Document::parse_str("<r>&nope;</r>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownEntity);
        assert!(err.location.is_some());
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = Document::parse_str("<a><b></a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MismatchedEndTag);
    }

    #[test]
    fn test_unexpected_eof() {
        let err = Document::parse_str("<a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_unterminated_comment() {
        let err = Document::parse_str("<a><!-- no end</a>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedString);
    }

    #[test]
    fn test_duplicate_attribute_with_validate() {
        let options = ParseOptions::default().validate(true);
        let err =
            Document::parse_str_with_options("<r a=\"1\" a=\"2\"/>", &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeDuplicated);
    }

    #[test]
    fn test_duplicate_attribute_tolerated_when_loading() {
        let doc = parse("<r a=\"1\" a=\"2\"/>");
        let r = doc.document_element().unwrap();
        assert_eq!(doc.attributes(r).count(), 2);
    }

    #[test]
    fn test_whitespace_dropped_by_default() {
        let doc = parse("<r>\n  <a/>\n  <b/>\n</r>");
        let r = doc.document_element().unwrap();
        assert_eq!(doc.children(r).count(), 2);
    }

    #[test]
    fn test_whitespace_preserved_on_request() {
        let options = ParseOptions::default().preserve_whitespace(true);
        let doc = Document::parse_str_with_options("<r>\n  <a/>\n</r>", &options).unwrap();
        let r = doc.document_element().unwrap();
        let kinds: Vec<NodeType> = doc.children(r).map(|c| doc.node_type(c)).collect();
        assert_eq!(
            kinds,
            vec![
                NodeType::SignificantWhitespace,
                NodeType::Element,
                NodeType::SignificantWhitespace
            ]
        );
    }

    #[test]
    fn test_mixed_content() {
        let doc = parse("<p>Hello <b>world</b>!</p>");
        let p = doc.document_element().unwrap();
        let children: Vec<NodeId> = doc.children(p).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(doc.node_value(children[0]).as_deref(), Some("Hello "));
        assert_eq!(doc.node_name(children[1]), "b");
        assert_eq!(doc.node_value(children[2]).as_deref(), Some("!"));
    }

    #[test]
    fn test_prefixed_names_split() {
        let doc = parse("<svg:rect a:b=\"1\"/>");
        let root = doc.document_element().unwrap();
        let q = doc.qname(root).unwrap();
        assert_eq!(q.prefix(), Some("svg"));
        assert_eq!(q.local(), "rect");
        assert_eq!(q.full(), "svg:rect");

        let attr = doc.first_attribute(root).unwrap();
        let aq = doc.qname(attr).unwrap();
        assert_eq!(aq.prefix(), Some("a"));
        assert_eq!(aq.local(), "b");
    }

    #[test]
    fn test_doctype_system() {
        let doc = parse("<!DOCTYPE myDoc SYSTEM \"http://x/y\"><r/>");
        let dt = doc.doctype().unwrap();
        match doc.node_kind(dt) {
            NodeKind::DocumentType {
                name,
                external_id,
                public_id,
                system_id,
            } => {
                assert_eq!(&**name, "myDoc");
                assert_eq!(*external_id, ExternalIdKind::System);
                assert!(public_id.is_none());
                assert_eq!(system_id.as_ref().map(XmlString::raw), Some("http://x/y"));
            }
            other => panic!("expected DocumentType, got {other:?}"),
        }
    }

    #[test]
    fn test_doctype_public() {
        let doc = parse(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" \
             \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\"><html/>",
        );
        let dt = doc.doctype().unwrap();
        match doc.node_kind(dt) {
            NodeKind::DocumentType {
                external_id,
                public_id,
                ..
            } => {
                assert_eq!(*external_id, ExternalIdKind::Public);
                assert_eq!(
                    public_id.as_ref().map(XmlString::raw),
                    Some("-//W3C//DTD XHTML 1.0//EN")
                );
            }
            other => panic!("expected DocumentType, got {other:?}"),
        }
    }

    #[test]
    fn test_doctype_internal_subset_children() {
        let doc = parse(
            "<!DOCTYPE myDoc SYSTEM \"http://x/y\" [\n  \
             <!ELEMENT e ANY>\n  \
             <!ENTITY r \"replacement\">\n  \
             <!ATTLIST f g CDATA #REQUIRED>\n]>\n<r/>",
        );
        let dt = doc.doctype().unwrap();
        let kinds: Vec<NodeType> = doc.children(dt).map(|c| doc.node_type(c)).collect();
        assert_eq!(
            kinds,
            vec![
                NodeType::ElementDecl,
                NodeType::Entity,
                NodeType::AttributeListDecl
            ]
        );
    }

    #[test]
    fn test_doctype_entity_becomes_resolvable() {
        let doc = parse("<!DOCTYPE d [<!ENTITY r \"replacement\">]><d>&r;</d>");
        let d = doc.document_element().unwrap();
        assert_eq!(doc.text_content(d), "replacement");
        assert_eq!(doc.entities().get("r"), Some("replacement"));
    }

    #[test]
    fn test_doctype_element_content_model() {
        let doc = parse("<!DOCTYPE d [<!ELEMENT d (a,b?,(c|d)*)>]><d/>");
        let dt = doc.doctype().unwrap();
        let decl = doc.first_child(dt).unwrap();
        match doc.node_kind(decl) {
            NodeKind::ElementDecl { content, .. } => {
                assert_eq!(content.to_string(), "(a,b?,(c|d)*)");
            }
            other => panic!("expected ElementDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_doctype_pcdata_atom() {
        let doc = parse("<!DOCTYPE d [<!ELEMENT d (#PCDATA|x)*>]><d/>");
        let dt = doc.doctype().unwrap();
        let decl = doc.first_child(dt).unwrap();
        match doc.node_kind(decl) {
            NodeKind::ElementDecl { content, .. } => {
                assert_eq!(content.to_string(), "(#PCDATA|x)*");
            }
            other => panic!("expected ElementDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_doctype_mixed_separators_rejected() {
        let err = Document::parse_str("<!DOCTYPE d [<!ELEMENT d (a,b|c)>]><d/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedChar);
    }

    #[test]
    fn test_doctype_attlist_items() {
        let doc = parse(
            "<!DOCTYPE d [<!ATTLIST f g CDATA #REQUIRED h (on|off) \"on\" \
             i NOTATION (n1|n2) #IMPLIED>]><d/>",
        );
        let dt = doc.doctype().unwrap();
        let decl = doc.first_child(dt).unwrap();
        match doc.node_kind(decl) {
            NodeKind::AttributeListDecl { element, items } => {
                assert_eq!(&**element, "f");
                assert_eq!(items.len(), 3);
                assert_eq!(&*items[0].name, "g");
                assert_eq!(items[0].item_type, AttlistType::Named(Arc::from("CDATA")));
                assert_eq!(items[0].keyword, Some(AttlistKeyword::Required));
                assert!(items[0].default.is_none());

                assert!(matches!(items[1].item_type, AttlistType::Enumeration(_)));
                assert_eq!(items[1].keyword, None);
                assert_eq!(items[1].default.as_ref().map(XmlString::raw), Some("on"));

                assert!(matches!(items[2].item_type, AttlistType::Notation(_)));
                assert_eq!(items[2].keyword, Some(AttlistKeyword::Implied));
            }
            other => panic!("expected AttributeListDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_doctype_notation() {
        let doc = parse("<!DOCTYPE d [<!NOTATION gif SYSTEM \"image/gif\">]><d/>");
        let dt = doc.doctype().unwrap();
        let notation = doc.first_child(dt).unwrap();
        match doc.node_kind(notation) {
            NodeKind::Notation {
                name, system_id, ..
            } => {
                assert_eq!(&**name, "gif");
                assert_eq!(system_id.as_ref().map(XmlString::raw), Some("image/gif"));
            }
            other => panic!("expected Notation, got {other:?}"),
        }
    }

    #[test]
    fn test_doctype_parameter_reference_kept_as_text() {
        let doc = parse("<!DOCTYPE d [%common;]><d/>");
        let dt = doc.doctype().unwrap();
        let text = doc.first_child(dt).unwrap();
        assert_eq!(doc.node_type(text), NodeType::Text);
        assert_eq!(doc.node_value_raw(text), Some("%common;"));
    }

    #[test]
    fn test_doctype_parameter_entity_declaration() {
        let doc = parse("<!DOCTYPE d [<!ENTITY % p \"x\">]><d/>");
        let dt = doc.doctype().unwrap();
        let ent = doc.first_child(dt).unwrap();
        match doc.node_kind(ent) {
            NodeKind::Entity {
                name, parameter, ..
            } => {
                assert_eq!(&**name, "p");
                assert!(parameter);
            }
            other => panic!("expected Entity, got {other:?}"),
        }
        // Parameter entities do not join the general entity table.
        assert!(!doc.entities().contains("p"));
    }

    #[test]
    fn test_unparsed_entity_with_ndata() {
        let doc =
            parse("<!DOCTYPE d [<!ENTITY img SYSTEM \"a.gif\" NDATA gif>]><d/>");
        let dt = doc.doctype().unwrap();
        let ent = doc.first_child(dt).unwrap();
        match doc.node_kind(ent) {
            NodeKind::Entity { ndata, .. } => {
                assert_eq!(ndata.as_deref(), Some("gif"));
            }
            other => panic!("expected Entity, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_decl_outside_doctype_rejected() {
        let err = Document::parse_str("<!ENTITY r \"x\"><r/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_second_root_element_rejected() {
        let err = Document::parse_str("<a/><b/>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOp);
    }

    #[test]
    fn test_sax_drops_elements() {
        struct DropNamed(&'static str);
        impl SaxHooks for DropNamed {
            fn on_element_end(&mut self, doc: &Document, element: NodeId) -> bool {
                doc.node_name(element) != self.0
            }
        }

        let options = ParseOptions::default().use_sax(true);
        let mut hooks = DropNamed("skip");
        let doc = Document::parse_str_with_hooks(
            "<r><keep/><skip><inner/></skip><keep/></r>",
            &options,
            &mut hooks,
        )
        .unwrap();
        let r = doc.document_element().unwrap();
        let names: Vec<&str> = doc.children(r).map(|c| doc.node_name(c)).collect();
        assert_eq!(names, vec!["keep", "keep"]);
    }

    #[test]
    fn test_sax_drops_attributes() {
        struct DropDataAttrs;
        impl SaxHooks for DropDataAttrs {
            fn on_attribute(
                &mut self,
                doc: &Document,
                _element: NodeId,
                attribute: NodeId,
            ) -> bool {
                !doc.node_name(attribute).starts_with("data-")
            }
        }

        let options = ParseOptions::default().use_sax(true);
        let mut hooks = DropDataAttrs;
        let doc = Document::parse_str_with_hooks(
            "<r id=\"1\" data-x=\"2\" class=\"3\"/>",
            &options,
            &mut hooks,
        )
        .unwrap();
        let r = doc.document_element().unwrap();
        let names: Vec<&str> = doc.attributes(r).map(|a| doc.node_name(a)).collect();
        assert_eq!(names, vec!["id", "class"]);
    }

    #[test]
    fn test_sax_drops_comments() {
        struct NoComments;
        impl SaxHooks for NoComments {
            fn on_other_node(&mut self, doc: &Document, node: NodeId) -> bool {
                doc.node_type(node) != NodeType::Comment
            }
        }

        let options = ParseOptions::default().use_sax(true);
        let mut hooks = NoComments;
        let doc = Document::parse_str_with_hooks(
            "<r><!--gone--><kept/></r>",
            &options,
            &mut hooks,
        )
        .unwrap();
        let r = doc.document_element().unwrap();
        assert_eq!(doc.children(r).count(), 1);
    }

    #[test]
    fn test_symbol_table_interning() {
        let options = ParseOptions::default().use_symbol_table(true);
        let doc =
            Document::parse_str_with_options("<item><item/><item/></item>", &options).unwrap();
        let root = doc.document_element().unwrap();
        let children: Vec<NodeId> = doc.children(root).collect();
        let q0 = doc.qname(children[0]).unwrap();
        let q1 = doc.qname(children[1]).unwrap();
        // Interned names share one allocation.
        assert!(std::ptr::eq(q0.full(), q1.full()));
    }

    #[test]
    fn test_error_location_reported() {
        let err = Document::parse_str("<a>\n  <b>\n</a>").unwrap_err();
        let loc = err.location.unwrap();
        assert_eq!(loc.line, 3);
    }
}
