//! Simple in-memory [`NodeStore`] used in tests, benches and quick prototypes.
//!
//! Focus:
//! - Ergonomic builder for quick test tree creation
//! - Flat pre-order table, attributes directly after their element
//! - Several documents per store (a collection)
//!
//! Example:
//! ```
//! use locpath::simple_store::{doc, elem, text, attr};
//! use locpath::{NodeKind, NodeStore};
//!
//! // <root id="r"><child>Hello</child><child/></root>
//! let store = doc()
//!     .child(
//!         elem("root")
//!             .attr(attr("id", "r"))
//!             .child(elem("child").child(text("Hello")))
//!             .child(elem("child")),
//!     )
//!     .build();
//!
//! assert_eq!(store.kind(0), NodeKind::Document);
//! assert_eq!(store.name(1), Some("root"));
//! assert_eq!(store.kind(2), NodeKind::Attribute);
//! assert_eq!(store.string_value(1), "Hello");
//! ```
use compact_str::CompactString;

use crate::model::{NodeKind, NodeStore};

#[derive(Debug, Clone)]
struct Record {
    kind: NodeKind,
    name: Option<CompactString>,
    ns: Option<CompactString>,
    value: Option<CompactString>,
    parent: Option<usize>,
    size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SimpleStore {
    nodes: Vec<Record>,
    generation: u64,
}

impl SimpleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding several documents, in the given order.
    pub fn collection<I: IntoIterator<Item = SimpleNodeBuilder>>(docs: I) -> Self {
        let mut store = Self::new();
        for d in docs {
            store.push_document(d);
        }
        store
    }

    /// Append a document. Builders that are not document nodes are wrapped in one.
    pub fn push_document(&mut self, builder: SimpleNodeBuilder) -> usize {
        let builder = if builder.kind == NodeKind::Document { builder } else { doc().child(builder) };
        let pre = self.nodes.len();
        self.flatten(builder, None);
        self.generation += 1;
        pre
    }

    /// Signal a modification of the stored data.
    pub fn touch(&mut self) {
        self.generation += 1;
    }

    /// Pre values of all elements with the given local name, in document order.
    pub fn elements(&self, local: &str) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.kind == NodeKind::Element && r.name.as_deref() == Some(local))
            .map(|(i, _)| i)
            .collect()
    }

    fn flatten(&mut self, b: SimpleNodeBuilder, parent: Option<usize>) -> usize {
        let pre = self.nodes.len();
        self.nodes.push(Record { kind: b.kind, name: b.name, ns: b.ns, value: b.value, parent, size: 1 });
        for a in b.attrs {
            self.nodes.push(Record { kind: NodeKind::Attribute, name: a.name, ns: a.ns, value: a.value, parent: Some(pre), size: 1 });
        }
        for c in b.children {
            self.flatten(c, Some(pre));
        }
        self.nodes[pre].size = self.nodes.len() - pre;
        pre
    }
}

impl NodeStore for SimpleStore {
    fn kind(&self, pre: usize) -> NodeKind {
        self.nodes[pre].kind
    }
    fn parent(&self, pre: usize) -> Option<usize> {
        self.nodes[pre].parent
    }
    fn size(&self, pre: usize) -> usize {
        self.nodes[pre].size
    }
    fn name(&self, pre: usize) -> Option<&str> {
        self.nodes[pre].name.as_deref()
    }
    fn namespace(&self, pre: usize) -> Option<&str> {
        self.nodes[pre].ns.as_deref()
    }
    fn value(&self, pre: usize) -> Option<&str> {
        self.nodes[pre].value.as_deref()
    }
    fn document_size(&self) -> usize {
        self.nodes.len()
    }
    fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<CompactString>,
    ns: Option<CompactString>,
    value: Option<CompactString>,
    attrs: Vec<SimpleNodeBuilder>,
    children: Vec<SimpleNodeBuilder>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<&str>, value: Option<&str>) -> Self {
        Self {
            kind,
            name: name.map(CompactString::from),
            ns: None,
            value: value.map(CompactString::from),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: SimpleNodeBuilder) -> Self {
        debug_assert!(child.kind != NodeKind::Attribute && child.kind != NodeKind::Document);
        self.children.push(child);
        self
    }
    pub fn children<I: IntoIterator<Item = SimpleNodeBuilder>>(mut self, it: I) -> Self {
        for c in it {
            self = self.child(c);
        }
        self
    }
    pub fn attr(mut self, attr: SimpleNodeBuilder) -> Self {
        debug_assert!(attr.kind == NodeKind::Attribute && self.kind == NodeKind::Element);
        self.attrs.push(attr);
        self
    }
    /// Place this element or attribute into a namespace.
    pub fn ns(mut self, uri: &str) -> Self {
        self.ns = Some(uri.into());
        self
    }
    pub fn build(self) -> SimpleStore {
        SimpleStore::collection([self])
    }
}

// Convenience helper functions for concise test code
pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Document, None, None)
}
pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(name), None)
}
pub fn attr(name: &str, v: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Attribute, Some(name), Some(v))
}
pub fn text(v: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Text, None, Some(v))
}
pub fn comment(v: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Comment, None, Some(v))
}
pub fn pi(target: &str, data: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::ProcessingInstruction, Some(target), Some(data))
}
