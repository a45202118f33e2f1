use compact_str::CompactString;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// Kinds that never have children or attributes.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Attribute | NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    pub prefix: Option<CompactString>,
    pub local: CompactString,
    pub ns_uri: Option<CompactString>,
}

impl QName {
    pub fn local(local: &str) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }

    pub fn with_ns(ns_uri: &str, local: &str) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: Some(ns_uri.into()) }
    }

    pub fn prefixed(prefix: &str, ns_uri: &str, local: &str) -> Self {
        Self { prefix: Some(prefix.into()), local: local.into(), ns_uri: Some(ns_uri.into()) }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.prefix, &self.ns_uri) {
            (Some(p), _) => write!(f, "{p}:{}", self.local),
            (None, Some(ns)) if !ns.is_empty() => write!(f, "Q{{{ns}}}{}", self.local),
            _ => f.write_str(&self.local),
        }
    }
}

/// Handle of a node inside a [`NodeStore`].
///
/// `pre` is the document-order position of the node. The optional `score` is a
/// relevance value attached by full-text predicates; it takes no part in node
/// identity, so equality, hashing and ordering only look at `pre`.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef {
    pub pre: usize,
    pub score: Option<f64>,
}

impl NodeRef {
    pub fn new(pre: usize) -> Self {
        Self { pre, score: None }
    }

    pub fn with_score(self, score: Option<f64>) -> Self {
        Self { pre: self.pre, score: score.or(self.score) }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.pre == other.pre
    }
}
impl Eq for NodeRef {}
impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pre.hash(state);
    }
}
impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pre.cmp(&other.pre)
    }
}

/// Read-only access to a pre-order node table.
///
/// Nodes are addressed by their pre value. Attributes of an element occupy
/// the positions directly following it, and `size` counts a node together
/// with its attributes and all descendants. Several documents may share one
/// store; each of them starts with a document node.
///
/// The store must not change structurally while a path evaluation runs;
/// `generation` has to change whenever it does.
pub trait NodeStore {
    fn kind(&self, pre: usize) -> NodeKind;
    fn parent(&self, pre: usize) -> Option<usize>;
    /// Number of nodes in the subtree rooted at `pre`, including itself and attributes.
    fn size(&self, pre: usize) -> usize;
    /// Local name of elements, attributes and processing instructions.
    fn name(&self, pre: usize) -> Option<&str>;
    /// Namespace URI of elements and attributes; `None` for no namespace.
    fn namespace(&self, pre: usize) -> Option<&str>;
    /// Stored value of attributes, text, comment and processing-instruction nodes.
    fn value(&self, pre: usize) -> Option<&str>;
    /// Total number of nodes in the store.
    fn document_size(&self) -> usize;

    /// Number of attributes plus one.
    fn attr_size(&self, pre: usize) -> usize {
        if self.kind(pre) != NodeKind::Element {
            return 1;
        }
        let end = pre + self.size(pre);
        let mut p = pre + 1;
        while p < end && self.kind(p) == NodeKind::Attribute {
            p += 1;
        }
        p - pre
    }

    /// Pre values of all document nodes, in document order.
    fn documents(&self) -> Vec<usize> {
        let mut docs = Vec::new();
        let mut p = 0;
        let n = self.document_size();
        while p < n {
            docs.push(p);
            p += self.size(p);
        }
        docs
    }

    /// Counter that changes whenever the stored tree changes.
    fn generation(&self) -> u64 {
        0
    }

    fn string_value(&self, pre: usize) -> String {
        match self.kind(pre) {
            NodeKind::Document | NodeKind::Element => {
                let mut out = String::new();
                let end = pre + self.size(pre);
                for p in pre + 1..end {
                    if self.kind(p) == NodeKind::Text {
                        out.push_str(self.value(p).unwrap_or_default());
                    }
                }
                out
            }
            _ => self.value(pre).unwrap_or_default().to_string(),
        }
    }

    /// Root of the tree containing `pre`.
    fn root_of(&self, pre: usize) -> usize {
        let mut cur = pre;
        while let Some(p) = self.parent(cur) {
            cur = p;
        }
        cur
    }

    /// Distance from the tree root (the root has level 0).
    fn level(&self, pre: usize) -> usize {
        let mut level = 0;
        let mut cur = pre;
        while let Some(p) = self.parent(cur) {
            level += 1;
            cur = p;
        }
        level
    }
}

impl<S: NodeStore + ?Sized> NodeStore for &S {
    fn kind(&self, pre: usize) -> NodeKind {
        (**self).kind(pre)
    }
    fn parent(&self, pre: usize) -> Option<usize> {
        (**self).parent(pre)
    }
    fn size(&self, pre: usize) -> usize {
        (**self).size(pre)
    }
    fn name(&self, pre: usize) -> Option<&str> {
        (**self).name(pre)
    }
    fn namespace(&self, pre: usize) -> Option<&str> {
        (**self).namespace(pre)
    }
    fn value(&self, pre: usize) -> Option<&str> {
        (**self).value(pre)
    }
    fn document_size(&self) -> usize {
        (**self).document_size()
    }
    fn attr_size(&self, pre: usize) -> usize {
        (**self).attr_size(pre)
    }
    fn generation(&self) -> u64 {
        (**self).generation()
    }
}
