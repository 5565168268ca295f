//! Node type definitions.
//!
//! [`NodeKind`] is the sum type over every node variant in a document
//! tree, each carrying its variant-specific payload. Navigation links
//! (parent, children, attributes, siblings) live in `NodeData`, not here.
//! [`NodeType`] is the payload-free tag used for the permitted-children
//! rules that tree mutation enforces.

use std::fmt;
use std::sync::Arc;

use super::strings::XmlString;
use crate::util::qname::QName;

/// The payload-free tag of a node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// The document root — exactly one per `Document`.
    Document,
    /// The XML declaration `<?xml …?>`.
    Declaration,
    /// A `<!DOCTYPE …>` declaration.
    DocumentType,
    /// An element node, e.g. `<item id="1">`.
    Element,
    /// An attribute on an element (or a declaration pseudo-attribute).
    Attribute,
    /// Character data.
    Text,
    /// A CDATA section.
    CData,
    /// A comment.
    Comment,
    /// A processing instruction `<?target …?>`.
    ProcessingInstruction,
    /// Whitespace between markup at document level.
    Whitespace,
    /// Whitespace inside element content, retained when whitespace
    /// preservation is on.
    SignificantWhitespace,
    /// An `<!ENTITY …>` declaration inside a DOCTYPE.
    Entity,
    /// An unexpanded entity reference.
    EntityReference,
    /// A `<!NOTATION …>` declaration inside a DOCTYPE.
    Notation,
    /// An `<!ATTLIST …>` declaration inside a DOCTYPE.
    AttributeListDecl,
    /// An `<!ELEMENT …>` declaration inside a DOCTYPE.
    ElementDecl,
    /// A detached container whose children move on append.
    DocumentFragment,
}

impl NodeType {
    /// Returns `true` if nodes of this type carry an attribute list.
    #[must_use]
    pub fn allows_attributes(self) -> bool {
        matches!(self, Self::Element | Self::Declaration)
    }

    /// Returns `true` if nodes of this type carry a child list.
    #[must_use]
    pub fn allows_children(self) -> bool {
        matches!(
            self,
            Self::Document | Self::DocumentType | Self::Element | Self::DocumentFragment
        )
    }

    /// Returns `true` if a node of type `child` may be appended to a node
    /// of this type.
    #[must_use]
    pub fn accepts_child(self, child: NodeType) -> bool {
        match self {
            Self::Document => matches!(
                child,
                Self::Declaration
                    | Self::DocumentType
                    | Self::Element
                    | Self::Comment
                    | Self::ProcessingInstruction
                    | Self::Whitespace
                    | Self::SignificantWhitespace
            ),
            Self::DocumentType => matches!(
                child,
                Self::Comment
                    | Self::ProcessingInstruction
                    | Self::Entity
                    | Self::EntityReference
                    | Self::Notation
                    | Self::AttributeListDecl
                    | Self::ElementDecl
                    | Self::Text
                    | Self::Whitespace
                    | Self::SignificantWhitespace
            ),
            Self::Element => matches!(
                child,
                Self::Element
                    | Self::Text
                    | Self::CData
                    | Self::Comment
                    | Self::ProcessingInstruction
                    | Self::EntityReference
                    | Self::Whitespace
                    | Self::SignificantWhitespace
            ),
            Self::DocumentFragment => !matches!(
                child,
                Self::Document | Self::Declaration | Self::DocumentType
            ),
            _ => false,
        }
    }
}

/// The external-ID keyword of a DOCTYPE declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalIdKind {
    /// No external ID.
    None,
    /// `SYSTEM "literal"`.
    System,
    /// `PUBLIC "pubid" "literal"`.
    Public,
}

/// The declared type of one `<!ATTLIST>` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttlistType {
    /// A bare type name: `CDATA`, `ID`, `IDREF`, `NMTOKEN`, ...
    Named(Arc<str>),
    /// An enumerated type: `(a|b|c)`.
    Enumeration(Vec<Arc<str>>),
    /// A notation type: `NOTATION (a|b|c)`.
    Notation(Vec<Arc<str>>),
}

/// The default-declaration keyword of an `<!ATTLIST>` item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttlistKeyword {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED`
    Fixed,
}

/// One attribute definition inside an `<!ATTLIST>` declaration.
#[derive(Debug, Clone)]
pub struct AttlistItem {
    /// The attribute name.
    pub name: Arc<str>,
    /// The declared type.
    pub item_type: AttlistType,
    /// The default-declaration keyword, if present.
    pub keyword: Option<AttlistKeyword>,
    /// The quoted default value, if present.
    pub default: Option<XmlString>,
}

/// The content model of an `<!ELEMENT>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// `<!ELEMENT name ANY>`
    Any,
    /// `<!ELEMENT name EMPTY>`
    Empty,
    /// A parenthesized choice tree.
    Group(ContentParticle),
}

/// One particle of an element content model, with its multiplicity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentParticle {
    /// The particle itself.
    pub kind: ParticleKind,
    /// The trailing `?`, `*`, or `+` indicator.
    pub occurrence: Occurrence,
}

/// The kind of a content-model particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticleKind {
    /// A single name atom (including `#PCDATA`).
    Name(Arc<str>),
    /// A sequence `(a,b,c)`.
    Seq(Vec<ContentParticle>),
    /// A choice `(a|b|c)`.
    Choice(Vec<ContentParticle>),
}

/// Multiplicity indicator after an atom or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Exactly once (no indicator).
    Once,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Group(particle) => write!(f, "{particle}"),
        }
    }
}

impl fmt::Display for ContentParticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParticleKind::Name(name) => write!(f, "{name}")?,
            ParticleKind::Seq(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")?;
            }
            ParticleKind::Choice(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")?;
            }
        }
        match self.occurrence {
            Occurrence::Once => {}
            Occurrence::Optional => write!(f, "?")?,
            Occurrence::ZeroOrMore => write!(f, "*")?,
            Occurrence::OneOrMore => write!(f, "+")?,
        }
        Ok(())
    }
}

/// The kind of a node and its variant-specific payload.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node.
    Document,

    /// The XML declaration. Its `version`/`encoding`/`standalone`
    /// pseudo-attributes are stored as ordinary attribute nodes on its
    /// attribute list.
    Declaration,

    /// A `<!DOCTYPE>` declaration. The internal subset is represented as
    /// parsed children of this node.
    DocumentType {
        /// The declared root element name.
        name: Arc<str>,
        /// Which external-ID keyword was present.
        external_id: ExternalIdKind,
        /// The PUBLIC identifier literal, if any.
        public_id: Option<XmlString>,
        /// The SYSTEM literal, if any.
        system_id: Option<XmlString>,
    },

    /// An element node.
    Element {
        /// The element's qualified name.
        name: QName,
    },

    /// An attribute node.
    Attribute {
        /// The attribute's qualified name.
        name: QName,
        /// The attribute value.
        value: XmlString,
    },

    /// A text node.
    Text {
        /// The character data.
        content: XmlString,
    },

    /// A CDATA section; contents are verbatim and never escaped.
    CData {
        /// The CDATA contents.
        content: XmlString,
    },

    /// A comment node (without the `<!--`/`-->` delimiters).
    Comment {
        /// The comment text.
        content: XmlString,
    },

    /// A processing instruction.
    ProcessingInstruction {
        /// The PI target.
        target: Arc<str>,
        /// The PI data, if any.
        data: Option<XmlString>,
    },

    /// Document-level whitespace.
    Whitespace {
        /// The whitespace run; every character satisfies the whitespace
        /// predicate.
        content: String,
    },

    /// Whitespace inside element content.
    SignificantWhitespace {
        /// The whitespace run; every character satisfies the whitespace
        /// predicate.
        content: String,
    },

    /// An `<!ENTITY>` declaration.
    Entity {
        /// The entity name.
        name: Arc<str>,
        /// `true` for a parameter entity (`<!ENTITY % name …>`).
        parameter: bool,
        /// The replacement text for an internal entity.
        value: Option<XmlString>,
        /// The PUBLIC identifier for an external entity.
        public_id: Option<XmlString>,
        /// The SYSTEM literal for an external entity.
        system_id: Option<XmlString>,
        /// The `NDATA` notation name for an unparsed entity.
        ndata: Option<Arc<str>>,
    },

    /// An unexpanded entity reference.
    EntityReference {
        /// The referenced entity name.
        name: Arc<str>,
    },

    /// A `<!NOTATION>` declaration.
    Notation {
        /// The notation name.
        name: Arc<str>,
        /// The PUBLIC identifier, if any.
        public_id: Option<XmlString>,
        /// The SYSTEM literal, if any.
        system_id: Option<XmlString>,
    },

    /// An `<!ATTLIST>` declaration; holds its definitions privately
    /// rather than as child nodes.
    AttributeListDecl {
        /// The element the list applies to.
        element: Arc<str>,
        /// The attribute definitions, in declaration order.
        items: Vec<AttlistItem>,
    },

    /// An `<!ELEMENT>` declaration; holds its content model privately
    /// rather than as child nodes.
    ElementDecl {
        /// The declared element name.
        name: Arc<str>,
        /// The declared content model.
        content: ContentModel,
    },

    /// A detached container; appending it to a parent moves its children
    /// instead.
    DocumentFragment,
}

impl NodeKind {
    /// The payload-free tag of this variant.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Document => NodeType::Document,
            Self::Declaration => NodeType::Declaration,
            Self::DocumentType { .. } => NodeType::DocumentType,
            Self::Element { .. } => NodeType::Element,
            Self::Attribute { .. } => NodeType::Attribute,
            Self::Text { .. } => NodeType::Text,
            Self::CData { .. } => NodeType::CData,
            Self::Comment { .. } => NodeType::Comment,
            Self::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            Self::Whitespace { .. } => NodeType::Whitespace,
            Self::SignificantWhitespace { .. } => NodeType::SignificantWhitespace,
            Self::Entity { .. } => NodeType::Entity,
            Self::EntityReference { .. } => NodeType::EntityReference,
            Self::Notation { .. } => NodeType::Notation,
            Self::AttributeListDecl { .. } => NodeType::AttributeListDecl,
            Self::ElementDecl { .. } => NodeType::ElementDecl,
            Self::DocumentFragment => NodeType::DocumentFragment,
        }
    }

    /// The node's name: the qualified name for named kinds, a fixed
    /// sentinel for anonymous kinds.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Document => "#document",
            Self::Declaration => "xml",
            Self::DocumentType { name, .. }
            | Self::Entity { name, .. }
            | Self::EntityReference { name }
            | Self::Notation { name, .. }
            | Self::ElementDecl { name, .. } => name,
            Self::Element { name } | Self::Attribute { name, .. } => name.full(),
            Self::Text { .. } => "#text",
            Self::CData { .. } => "#cdata-section",
            Self::Comment { .. } => "#comment",
            Self::ProcessingInstruction { target, .. } => target,
            Self::Whitespace { .. } => "#whitespace",
            Self::SignificantWhitespace { .. } => "#significant-whitespace",
            Self::AttributeListDecl { element, .. } => element,
            Self::DocumentFragment => "#document-fragment",
        }
    }
}
