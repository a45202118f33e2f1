//! Node tests.
//!
//! A [`Test`] is one of four variants: a kind test (`node()`, `text()`, ...),
//! a name test with one of four [`NameMode`]s, an extended kind test carrying
//! a name and a type annotation (`element(n, T)`), and the compile-time only
//! [`InvDocTest`] which matches a fixed set of nodes of one store.
use compact_str::CompactString;
use core::fmt;

use crate::error::{Error, ErrorCode};
use crate::model::{NodeKind, NodeStore, QName};

const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KindTest {
    AnyNode,
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction(Option<CompactString>),
}

impl KindTest {
    fn node_kind(&self) -> Option<NodeKind> {
        Some(match self {
            KindTest::AnyNode => return None,
            KindTest::Document => NodeKind::Document,
            KindTest::Element => NodeKind::Element,
            KindTest::Attribute => NodeKind::Attribute,
            KindTest::Text => NodeKind::Text,
            KindTest::Comment => NodeKind::Comment,
            KindTest::ProcessingInstruction(_) => NodeKind::ProcessingInstruction,
        })
    }

    fn matches<S: NodeStore + ?Sized>(&self, store: &S, pre: usize) -> bool {
        match self {
            KindTest::AnyNode => true,
            KindTest::ProcessingInstruction(Some(target)) => {
                store.kind(pre) == NodeKind::ProcessingInstruction && store.name(pre) == Some(target.as_str())
            }
            k => k.node_kind() == Some(store.kind(pre)),
        }
    }
}

/// Which parts of a qualified name a [`NameTest`] compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameMode {
    /// `*`
    Wildcard,
    /// `*:local`
    Local,
    /// `prefix:*`
    Uri,
    /// `prefix:local` or `local`
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameTest {
    /// Element or attribute.
    pub kind: NodeKind,
    pub mode: NameMode,
    pub local: Option<CompactString>,
    /// `None` means "no namespace" unless a prefix is pending resolution.
    pub uri: Option<CompactString>,
    pub prefix: Option<CompactString>,
}

impl NameTest {
    pub fn wildcard(kind: NodeKind) -> Self {
        Self { kind, mode: NameMode::Wildcard, local: None, uri: None, prefix: None }
    }

    /// Unprefixed name in no namespace.
    pub fn full(kind: NodeKind, local: &str) -> Self {
        Self { kind, mode: NameMode::Full, local: Some(local.into()), uri: None, prefix: None }
    }

    pub fn qualified(kind: NodeKind, uri: &str, local: &str) -> Self {
        Self { kind, mode: NameMode::Full, local: Some(local.into()), uri: Some(uri.into()), prefix: None }
    }

    /// `prefix:local` with the prefix still to be resolved.
    pub fn prefixed(kind: NodeKind, prefix: &str, local: &str) -> Self {
        Self {
            kind,
            mode: NameMode::Full,
            local: Some(local.into()),
            uri: None,
            prefix: Some(prefix.into()),
        }
    }

    pub fn local_name(kind: NodeKind, local: &str) -> Self {
        Self { kind, mode: NameMode::Local, local: Some(local.into()), uri: None, prefix: None }
    }

    pub fn namespace(kind: NodeKind, uri: &str) -> Self {
        Self { kind, mode: NameMode::Uri, local: None, uri: Some(uri.into()), prefix: None }
    }

    /// `prefix:*` with the prefix still to be resolved.
    pub fn prefixed_namespace(kind: NodeKind, prefix: &str) -> Self {
        Self { kind, mode: NameMode::Uri, local: None, uri: None, prefix: Some(prefix.into()) }
    }

    pub fn unresolved_prefix(&self) -> Option<&str> {
        match (&self.prefix, &self.uri) {
            (Some(p), None) => Some(p.as_str()),
            _ => None,
        }
    }

    /// Bind the prefix (or the default element namespace for unprefixed
    /// element names) to a namespace URI. Unknown prefixes are left unresolved.
    pub fn resolve<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a str>,
        default_element_ns: Option<&str>,
    ) -> NameTest {
        let mut out = self.clone();
        if out.uri.is_some() || !matches!(out.mode, NameMode::Full | NameMode::Uri) {
            return out;
        }
        match &out.prefix {
            Some(p) => out.uri = lookup(p).map(CompactString::from),
            None if out.kind == NodeKind::Element => {
                out.uri = default_element_ns.filter(|ns| !ns.is_empty()).map(CompactString::from)
            }
            None => {}
        }
        out
    }

    fn local_constraint(&self) -> Option<&str> {
        match self.mode {
            NameMode::Local | NameMode::Full => self.local.as_deref(),
            _ => None,
        }
    }

    // Some(None) constrains to "no namespace"
    fn uri_constraint(&self) -> Option<Option<&str>> {
        match self.mode {
            NameMode::Uri | NameMode::Full => Some(self.uri.as_deref().filter(|u| !u.is_empty())),
            _ => None,
        }
    }

    pub fn matches<S: NodeStore + ?Sized>(&self, store: &S, pre: usize) -> bool {
        if store.kind(pre) != self.kind {
            return false;
        }
        if let Some(local) = self.local_constraint()
            && store.name(pre) != Some(local)
        {
            return false;
        }
        match self.uri_constraint() {
            Some(uri) => store.namespace(pre).filter(|u| !u.is_empty()) == uri,
            None => true,
        }
    }

    fn intersect(&self, other: &NameTest) -> Result<Option<NameTest>, Error> {
        if let Some(p) = self.unresolved_prefix().or(other.unresolved_prefix()) {
            return Err(unresolved(p));
        }
        if self.kind != other.kind {
            return Ok(None);
        }
        let local = match (self.local_constraint(), other.local_constraint()) {
            (Some(a), Some(b)) if a != b => return Ok(None),
            (a, b) => a.or(b),
        };
        let uri = match (self.uri_constraint(), other.uri_constraint()) {
            (Some(a), Some(b)) if a != b => return Ok(None),
            (a, b) => a.or(b),
        };
        let mode = match (local.is_some(), uri.is_some()) {
            (true, true) => NameMode::Full,
            (true, false) => NameMode::Local,
            (false, true) => NameMode::Uri,
            (false, false) => NameMode::Wildcard,
        };
        let prefix = if self.uri_constraint().is_some() { self.prefix.clone() } else { other.prefix.clone() };
        Ok(Some(NameTest {
            kind: self.kind,
            mode,
            local: local.map(CompactString::from),
            uri: uri.flatten().map(CompactString::from),
            prefix,
        }))
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.local.as_deref().unwrap_or("*");
        match self.mode {
            NameMode::Wildcard => f.write_str("*"),
            NameMode::Local => write!(f, "*:{local}"),
            NameMode::Uri | NameMode::Full => {
                let local = if self.mode == NameMode::Uri { "*" } else { local };
                match (&self.prefix, &self.uri) {
                    (Some(p), _) => write!(f, "{p}:{local}"),
                    (None, Some(uri)) => write!(f, "Q{{{uri}}}{local}"),
                    (None, None) => f.write_str(local),
                }
            }
        }
    }
}

/// `element(name, type)` / `attribute(name, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtTest {
    pub kind: NodeKind,
    pub name: Option<NameTest>,
    pub type_name: Option<QName>,
}

impl ExtTest {
    // Nodes in the store are untyped, so only their super types can match.
    fn type_matches(&self) -> bool {
        let Some(t) = &self.type_name else { return true };
        let in_xs = t.ns_uri.as_deref() == Some(XS_NS) || (t.ns_uri.is_none() && t.prefix.as_deref() == Some("xs"));
        in_xs
            && match self.kind {
                NodeKind::Element => matches!(t.local.as_str(), "untyped" | "anyType"),
                NodeKind::Attribute => {
                    matches!(t.local.as_str(), "untypedAtomic" | "anyAtomicType" | "anySimpleType")
                }
                _ => false,
            }
    }

    fn matches<S: NodeStore + ?Sized>(&self, store: &S, pre: usize) -> bool {
        store.kind(pre) == self.kind
            && self.name.as_ref().is_none_or(|n| n.matches(store, pre))
            && self.type_matches()
    }
}

impl fmt::Display for ExtTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kw = if self.kind == NodeKind::Attribute { "attribute" } else { "element" };
        write!(f, "{kw}(")?;
        match &self.name {
            Some(n) => write!(f, "{n}")?,
            None => f.write_str("*")?,
        }
        if let Some(t) = &self.type_name {
            write!(f, ", {t}")?;
        }
        f.write_str(")")
    }
}

/// Fixed set of nodes, stored as sorted pre values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvDocTest {
    pres: Vec<usize>,
}

impl InvDocTest {
    pub fn new(mut pres: Vec<usize>) -> Self {
        pres.sort_unstable();
        pres.dedup();
        Self { pres }
    }

    pub fn pres(&self) -> &[usize] {
        &self.pres
    }

    pub fn contains(&self, pre: usize) -> bool {
        self.pres.binary_search(&pre).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Test {
    Kind(KindTest),
    Name(NameTest),
    Ext(ExtTest),
    InvDoc(InvDocTest),
}

impl Test {
    pub fn node() -> Self {
        Test::Kind(KindTest::AnyNode)
    }
    pub fn document() -> Self {
        Test::Kind(KindTest::Document)
    }
    pub fn text() -> Self {
        Test::Kind(KindTest::Text)
    }
    pub fn any_element() -> Self {
        Test::Kind(KindTest::Element)
    }
    pub fn element(local: &str) -> Self {
        Test::Name(NameTest::full(NodeKind::Element, local))
    }
    pub fn attribute(local: &str) -> Self {
        Test::Name(NameTest::full(NodeKind::Attribute, local))
    }

    pub fn matches<S: NodeStore + ?Sized>(&self, store: &S, pre: usize) -> bool {
        match self {
            Test::Kind(k) => k.matches(store, pre),
            Test::Name(n) => n.matches(store, pre),
            Test::Ext(e) => e.matches(store, pre),
            Test::InvDoc(d) => d.contains(pre),
        }
    }

    /// Node kind every match has, if the test restricts it.
    pub fn node_kind(&self) -> Option<NodeKind> {
        match self {
            Test::Kind(k) => k.node_kind(),
            Test::Name(n) => Some(n.kind),
            Test::Ext(e) => Some(e.kind),
            Test::InvDoc(_) => None,
        }
    }

    /// Whether a node of `kind` can pass this test.
    pub fn may_match(&self, kind: NodeKind) -> bool {
        self.node_kind().is_none_or(|k| k == kind)
    }

    pub fn is_any_node(&self) -> bool {
        matches!(self, Test::Kind(KindTest::AnyNode))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Test::Kind(KindTest::Document))
    }

    /// The local name a match must have (full and local-name modes).
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Test::Name(n) => n.local_constraint(),
            Test::Ext(ExtTest { name: Some(n), .. }) => n.local_constraint(),
            _ => None,
        }
    }

    /// Fully qualified attribute name test: matches at most one attribute per element.
    pub fn is_single_attribute(&self) -> bool {
        matches!(self, Test::Name(NameTest { kind: NodeKind::Attribute, mode: NameMode::Full, .. }))
    }

    pub fn unresolved_prefix(&self) -> Option<&str> {
        match self {
            Test::Name(n) => n.unresolved_prefix(),
            Test::Ext(ExtTest { name: Some(n), .. }) => n.unresolved_prefix(),
            _ => None,
        }
    }

    /// Returns a copy with every name test resolved against the given bindings.
    pub fn resolve<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>, default_element_ns: Option<&str>) -> Test {
        match self {
            Test::Name(n) => Test::Name(n.resolve(lookup, default_element_ns)),
            Test::Ext(e) => Test::Ext(ExtTest {
                name: e.name.as_ref().map(|n| n.resolve(lookup, default_element_ns)),
                ..e.clone()
            }),
            other => other.clone(),
        }
    }

    /// Local-name-only variant of a fully qualified element test in the
    /// namespace `global_ns`; `None` when the test is not of that shape.
    pub fn narrow_to_local(&self, global_ns: &str) -> Option<Test> {
        match self {
            Test::Name(n)
                if n.kind == NodeKind::Element
                    && n.mode == NameMode::Full
                    && n.uri.as_deref().unwrap_or_default() == global_ns =>
            {
                Some(Test::Name(NameTest { mode: NameMode::Local, uri: None, prefix: None, ..n.clone() }))
            }
            _ => None,
        }
    }

    /// Test matching exactly the nodes both tests match.
    ///
    /// `Ok(None)` means no node can pass both. Inverted-document tests only
    /// combine with `node()` and with each other; other combinations are
    /// rejected with an error.
    pub fn intersect(&self, other: &Test) -> Result<Option<Test>, Error> {
        use Test::*;
        match (self, other) {
            (InvDoc(a), InvDoc(b)) => {
                let pres: Vec<usize> = a.pres.iter().copied().filter(|p| b.contains(*p)).collect();
                Ok((!pres.is_empty()).then(|| InvDoc(InvDocTest { pres })))
            }
            (InvDoc(_), Kind(KindTest::AnyNode)) => Ok(Some(self.clone())),
            (Kind(KindTest::AnyNode), InvDoc(_)) => Ok(Some(other.clone())),
            (InvDoc(_), t) | (t, InvDoc(_)) => {
                Err(Error::unsupported(&format!("intersection of a node set with {t}")))
            }
            (Kind(KindTest::AnyNode), t) | (t, Kind(KindTest::AnyNode)) => Ok(Some(t.clone())),
            (Kind(a), Kind(b)) => Ok(match (a, b) {
                (KindTest::ProcessingInstruction(x), KindTest::ProcessingInstruction(y)) => match (x, y) {
                    (Some(x), Some(y)) => (x == y).then(|| self.clone()),
                    (Some(_), None) => Some(self.clone()),
                    (None, _) => Some(other.clone()),
                },
                _ => (a == b).then(|| self.clone()),
            }),
            (Kind(k), Name(n)) | (Name(n), Kind(k)) => Ok((k.node_kind() == Some(n.kind)).then(|| Name(n.clone()))),
            (Kind(k), Ext(e)) | (Ext(e), Kind(k)) => Ok((k.node_kind() == Some(e.kind)).then(|| Ext(e.clone()))),
            (Name(a), Name(b)) => Ok(a.intersect(b)?.map(Name)),
            (Name(n), Ext(e)) | (Ext(e), Name(n)) => {
                if n.kind != e.kind {
                    return Ok(None);
                }
                let name = match &e.name {
                    Some(en) => match n.intersect(en)? {
                        Some(merged) => merged,
                        None => return Ok(None),
                    },
                    None => n.clone(),
                };
                Ok(Some(Ext(ExtTest { name: Some(name), ..e.clone() })))
            }
            (Ext(a), Ext(b)) => {
                if a.kind != b.kind || !a.type_matches() || !b.type_matches() {
                    return Ok(None);
                }
                let name = match (&a.name, &b.name) {
                    (Some(x), Some(y)) => match x.intersect(y)? {
                        Some(m) => Some(m),
                        None => return Ok(None),
                    },
                    (x, y) => x.clone().or_else(|| y.clone()),
                };
                let type_name = a.type_name.clone().or_else(|| b.type_name.clone());
                Ok(Some(Ext(ExtTest { kind: a.kind, name, type_name })))
            }
        }
    }
}

/// Error raised when a step with an unresolved prefix is evaluated.
pub(crate) fn unresolved(prefix: &str) -> Error {
    Error::from_code(ErrorCode::XPST0081, format!("no namespace is bound to prefix '{prefix}'"))
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Kind(k) => match k {
                KindTest::AnyNode => f.write_str("node()"),
                KindTest::Document => f.write_str("document-node()"),
                KindTest::Element => f.write_str("element()"),
                KindTest::Attribute => f.write_str("attribute()"),
                KindTest::Text => f.write_str("text()"),
                KindTest::Comment => f.write_str("comment()"),
                KindTest::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
                KindTest::ProcessingInstruction(Some(t)) => write!(f, "processing-instruction({t})"),
            },
            Test::Name(n) => write!(f, "{n}"),
            Test::Ext(e) => write!(f, "{e}"),
            Test::InvDoc(d) => {
                f.write_str("nodes(")?;
                for (i, p) in d.pres.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_store::{attr, elem, text};

    #[test]
    fn name_modes() {
        let s = elem("a").ns("urn:x").attr(attr("id", "1")).child(elem("b")).child(text("t")).build();
        assert!(Test::Name(NameTest::qualified(NodeKind::Element, "urn:x", "a")).matches(&s, 1));
        assert!(!Test::element("a").matches(&s, 1));
        assert!(Test::Name(NameTest::local_name(NodeKind::Element, "a")).matches(&s, 1));
        assert!(Test::Name(NameTest::namespace(NodeKind::Element, "urn:x")).matches(&s, 1));
        assert!(!Test::Name(NameTest::namespace(NodeKind::Element, "urn:x")).matches(&s, 3));
        assert!(Test::element("b").matches(&s, 3));
        assert!(Test::attribute("id").matches(&s, 2));
        assert!(!Test::element("id").matches(&s, 2));
        assert!(Test::text().matches(&s, 4));
    }

    #[test]
    fn narrowing_keeps_the_local_name() {
        let t = Test::Name(NameTest::qualified(NodeKind::Element, "urn:x", "a"));
        let n = t.narrow_to_local("urn:x").expect("narrowed");
        assert_eq!(n.to_string(), "*:a");
        assert!(t.narrow_to_local("urn:y").is_none());
    }

    #[test]
    fn inverted_document_test_rejects_name_tests() {
        let d = Test::InvDoc(InvDocTest::new(vec![3, 1]));
        assert_eq!(d.intersect(&Test::node()).unwrap(), Some(d.clone()));
        assert!(d.intersect(&Test::element("a")).is_err());
        let e = Test::InvDoc(InvDocTest::new(vec![2]));
        assert_eq!(d.intersect(&e).unwrap(), None);
    }

    #[test]
    fn unresolved_prefix_is_reported() {
        let t = Test::Name(NameTest::prefixed(NodeKind::Element, "p", "a"));
        assert_eq!(t.unresolved_prefix(), Some("p"));
        let r = t.resolve(|p| (p == "p").then_some("urn:p"), None);
        assert_eq!(r.unresolved_prefix(), None);
        assert_eq!(r.to_string(), "p:a");
    }
}
