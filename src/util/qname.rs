//! Qualified name (`QName`) handling.
//!
//! A `QName` is a name of the form `prefix:localname` or just `localname`.
//! The namespace URI is derived mechanically at construction: the reserved
//! `xml` and `xmlns` prefixes resolve to their well-known URIs, everything
//! else defers to the owning document's default URI. No namespace
//! well-formedness validation is performed beyond this.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

use std::sync::Arc;

/// The well-known XML namespace URI, pre-bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The well-known xmlns namespace URI.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Splits a `QName` into its prefix and local name parts.
///
/// Returns `(Some(prefix), localname)` if the name contains a colon,
/// or `(None, localname)` if it does not.
///
/// # Examples
///
/// ```
/// use oxdom::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// A qualified name: prefix, local part, full form, and namespace URI.
///
/// All components are shared `Arc<str>` — the currency of the document
/// symbol table, so that interned names cost one allocation per distinct
/// string.
#[derive(Debug, Clone)]
pub struct QName {
    prefix: Option<Arc<str>>,
    local: Arc<str>,
    full: Arc<str>,
    namespace: Option<Arc<str>>,
}

impl QName {
    /// Builds a `QName` from a raw name, deriving the namespace URI.
    ///
    /// `default_uri` is the owning document's default namespace, used when
    /// the name is not in the reserved `xml`/`xmlns` space.
    #[must_use]
    pub fn new(name: &str, default_uri: Option<&Arc<str>>) -> Self {
        Self::with_interner(name, default_uri, &mut |s| Arc::from(s))
    }

    /// Builds a `QName`, interning every component through `intern`.
    pub fn with_interner(
        name: &str,
        default_uri: Option<&Arc<str>>,
        intern: &mut dyn FnMut(&str) -> Arc<str>,
    ) -> Self {
        let (prefix, local) = split_qname(name);
        let namespace = match prefix {
            Some("xmlns") => Some(intern(XMLNS_NAMESPACE)),
            None if local == "xmlns" => Some(intern(XMLNS_NAMESPACE)),
            Some("xml") => Some(intern(XML_NAMESPACE)),
            _ => default_uri.map(Arc::clone),
        };
        let local_arc = intern(local);
        let full = if prefix.is_some() {
            intern(name)
        } else {
            Arc::clone(&local_arc)
        };
        Self {
            prefix: prefix.map(|p| intern(p)),
            local: local_arc,
            full,
            namespace,
        }
    }

    /// The namespace prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The local part of the name.
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// The full name: `prefix:local` when a prefix is present, else the
    /// local name.
    #[must_use]
    pub fn full(&self) -> &str {
        &self.full
    }

    /// The derived namespace URI, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.full == other.full && self.namespace == other.namespace
    }
}

impl Eq for QName {}
