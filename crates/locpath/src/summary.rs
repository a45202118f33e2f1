//! Structural summary: one node per distinct (parent shape, kind, name).
use compact_str::CompactString;
use std::collections::HashMap;

use crate::model::{NodeKind, NodeStore};

pub type SummaryId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryNode {
    pub name: Option<CompactString>,
    pub ns: Option<CompactString>,
    pub kind: NodeKind,
    pub level: usize,
    /// Number of store nodes with this shape.
    pub count: usize,
    pub parent: Option<SummaryId>,
    pub children: Vec<SummaryId>,
}

/// Read-only synopsis of a store used for cost estimates and rewrite proofs.
pub trait StructuralSummary {
    /// `false` once the store changed after the summary was built; path
    /// rewrites relying on the summary are skipped then.
    fn is_up_to_date(&self) -> bool;
    /// Summary nodes of the document roots.
    fn root(&self) -> Vec<SummaryId>;
    fn node(&self, id: SummaryId) -> &SummaryNode;
    /// All summary nodes of the given kind and (if given) local name, in creation order.
    fn descendants(&self, name: Option<&str>, kind: NodeKind) -> Vec<SummaryId>;
    /// Distinct parents of the given nodes.
    fn parents(&self, nodes: &[SummaryId]) -> Vec<SummaryId>;
    /// Children (or with `desc` all descendants) of the given nodes.
    fn children(&self, nodes: &[SummaryId], desc: bool) -> Vec<SummaryId>;
    /// Namespace URI shared by all elements (`""` for none), if there is exactly one.
    fn global_namespace(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Default)]
pub struct PathSummary {
    nodes: Vec<SummaryNode>,
    roots: Vec<SummaryId>,
    global_ns: Option<CompactString>,
    stale: bool,
}

impl PathSummary {
    pub fn build<S: NodeStore + ?Sized>(store: &S) -> Self {
        let mut sum = PathSummary::default();
        let mut index: HashMap<(Option<SummaryId>, NodeKind, Option<CompactString>), SummaryId> = HashMap::new();
        let mut namespaces: Vec<CompactString> = Vec::new();
        // summary id of each open ancestor, indexed by level
        let mut stack: Vec<(usize, SummaryId)> = Vec::new();
        for pre in 0..store.document_size() {
            let kind = store.kind(pre);
            let parent = store.parent(pre);
            while let Some(&(p, _)) = stack.last() {
                if Some(p) == parent {
                    break;
                }
                stack.pop();
            }
            let parent_id = stack.last().map(|&(_, id)| id);
            let name = match kind {
                NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction => {
                    store.name(pre).map(CompactString::from)
                }
                _ => None,
            };
            if kind == NodeKind::Element {
                let ns = CompactString::from(store.namespace(pre).unwrap_or_default());
                if !namespaces.contains(&ns) {
                    namespaces.push(ns);
                }
            }
            let key = (parent_id, kind, name.clone());
            let id = match index.get(&key) {
                Some(&id) => id,
                None => {
                    let id = sum.nodes.len();
                    sum.nodes.push(SummaryNode {
                        name,
                        ns: store.namespace(pre).map(CompactString::from),
                        kind,
                        level: stack.len(),
                        count: 0,
                        parent: parent_id,
                        children: Vec::new(),
                    });
                    match parent_id {
                        Some(p) => sum.nodes[p].children.push(id),
                        None => sum.roots.push(id),
                    }
                    index.insert(key, id);
                    id
                }
            };
            sum.nodes[id].count += 1;
            if !kind.is_leaf() {
                stack.push((pre, id));
            }
        }
        if namespaces.len() == 1 {
            sum.global_ns = namespaces.pop();
        }
        sum
    }

    /// Declare the summary out of date.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl StructuralSummary for PathSummary {
    fn is_up_to_date(&self) -> bool {
        !self.stale
    }

    fn root(&self) -> Vec<SummaryId> {
        self.roots.clone()
    }

    fn node(&self, id: SummaryId) -> &SummaryNode {
        &self.nodes[id]
    }

    fn descendants(&self, name: Option<&str>, kind: NodeKind) -> Vec<SummaryId> {
        (0..self.nodes.len())
            .filter(|&i| {
                let n = &self.nodes[i];
                n.kind == kind && name.is_none_or(|nm| n.name.as_deref() == Some(nm))
            })
            .collect()
    }

    fn parents(&self, nodes: &[SummaryId]) -> Vec<SummaryId> {
        let mut out: Vec<SummaryId> = Vec::new();
        for &n in nodes {
            if let Some(p) = self.nodes[n].parent
                && !out.contains(&p)
            {
                out.push(p);
            }
        }
        out
    }

    fn children(&self, nodes: &[SummaryId], desc: bool) -> Vec<SummaryId> {
        let mut out = Vec::new();
        let mut todo: Vec<SummaryId> = nodes.iter().rev().copied().collect();
        while let Some(n) = todo.pop() {
            for &c in self.nodes[n].children.iter().rev() {
                if desc {
                    todo.push(c);
                }
            }
            out.extend(self.nodes[n].children.iter().copied());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn global_namespace(&self) -> Option<&str> {
        self.global_ns.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_store::{attr, doc, elem};

    #[test]
    fn shapes_are_aggregated() {
        // <a><b id=""/><b/><c><b/></c></a>
        let s = doc()
            .child(elem("a").child(elem("b").attr(attr("id", "1"))).child(elem("b")).child(elem("c").child(elem("b"))))
            .build();
        let sum = PathSummary::build(&s);
        let bs = sum.descendants(Some("b"), NodeKind::Element);
        assert_eq!(bs.len(), 2);
        assert_eq!(sum.node(bs[0]).count, 2);
        assert_eq!(sum.node(bs[0]).level, 2);
        assert_eq!(sum.node(bs[1]).level, 3);
        assert_eq!(sum.global_namespace(), Some(""));
        let parents = sum.parents(&bs);
        let names: Vec<_> = parents.iter().map(|&p| sum.node(p).name.clone().unwrap_or_default()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(sum.children(&sum.root(), true).len(), 5);
    }
}
