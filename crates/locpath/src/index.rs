use compact_str::CompactString;
use std::collections::HashMap;

use crate::axis::Axis;
use crate::expr::{CompareOp, Expr, Item};
use crate::model::{NodeKind, NodeRef, NodeStore};
use crate::step::Step;
use crate::test::{KindTest, Test};

/// Estimated cost of answering one predicate from an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostRecord {
    /// Expected number of hits.
    pub cardinality: usize,
    /// Hits are already the nodes the steps up to the indexed one select, in
    /// document order; the path continues from them without checking the
    /// steps before. Negated hits are always applied as a membership filter.
    pub sequential: bool,
    /// The predicate is a negation; hits are the nodes the negated operand selects.
    pub negated: bool,
}

/// A predicate of a path step offered to an [`IndexOracle`].
#[derive(Debug, Clone, Copy)]
pub struct IndexContext<'a> {
    pub step: &'a Step,
    pub pred: &'a Expr,
}

/// Nodes of the indexed step for which the (non-negated) predicate holds,
/// in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexResult {
    pub nodes: Vec<NodeRef>,
}

pub trait IndexOracle {
    fn is_index_accessible(&self, ictx: &IndexContext<'_>) -> Option<CostRecord>;
    fn materialize(&self, ictx: &IndexContext<'_>, cost: &CostRecord) -> IndexResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    // text() = v: parents of matching text nodes
    TextChild(CompactString),
    // @n = v: owners of matching attributes
    Attribute(CompactString, CompactString),
    // . = v on a text or attribute step
    SelfValue(CompactString),
}

/// Value index over text and attribute nodes of one store.
pub struct ValueIndex<'s, S: ?Sized> {
    store: &'s S,
    texts: HashMap<CompactString, Vec<usize>>,
    attributes: HashMap<(CompactString, CompactString), Vec<usize>>,
}

impl<'s, S: NodeStore + ?Sized> ValueIndex<'s, S> {
    pub fn build(store: &'s S) -> Self {
        let mut texts: HashMap<CompactString, Vec<usize>> = HashMap::new();
        let mut attributes: HashMap<(CompactString, CompactString), Vec<usize>> = HashMap::new();
        for pre in 0..store.document_size() {
            match store.kind(pre) {
                NodeKind::Text => {
                    texts.entry(store.value(pre).unwrap_or_default().into()).or_default().push(pre);
                }
                NodeKind::Attribute => {
                    let key = (
                        CompactString::from(store.name(pre).unwrap_or_default()),
                        CompactString::from(store.value(pre).unwrap_or_default()),
                    );
                    attributes.entry(key).or_default().push(pre);
                }
                _ => {}
            }
        }
        Self { store, texts, attributes }
    }

    fn lookup_of(step: &Step, pred: &Expr) -> Option<(Lookup, bool)> {
        if let Expr::Not(inner) = pred {
            return Self::lookup_of(step, inner).filter(|(_, neg)| !neg).map(|(l, _)| (l, true));
        }
        let Expr::Compare(CompareOp::Eq, l, r) = pred else { return None };
        let (operand, value) = match (l.as_ref(), r.as_ref()) {
            (e, Expr::Literal(Item::Str(v))) | (Expr::Literal(Item::Str(v)), e) => (e, v.clone()),
            _ => return None,
        };
        if let Expr::Context = operand {
            return match &step.test {
                Test::Kind(KindTest::Text) => Some((Lookup::SelfValue(value), false)),
                t if t.is_single_attribute() => Some((Lookup::SelfValue(value), false)),
                _ => None,
            };
        }
        let inner = single_step(operand)?;
        if !inner.preds.is_empty() {
            return None;
        }
        match (inner.axis, &inner.test) {
            (Axis::Child, Test::Kind(KindTest::Text)) => Some((Lookup::TextChild(value), false)),
            (Axis::Attribute, t) if t.is_single_attribute() && t.unresolved_prefix().is_none() => {
                let name = t.local_name()?;
                Some((Lookup::Attribute(name.into(), value), false))
            }
            _ => None,
        }
    }

    fn hits(&self, step: &Step, lookup: &Lookup) -> Vec<NodeRef> {
        let attrs = |n: &str, v: &CompactString| {
            self.attributes.get(&(CompactString::from(n), v.clone())).cloned().unwrap_or_default()
        };
        let texts = |v: &CompactString| self.texts.get(v).cloned().unwrap_or_default();
        let owners = |pres: Vec<usize>| pres.into_iter().filter_map(|p| self.store.parent(p)).collect::<Vec<_>>();
        let mut out = match lookup {
            Lookup::TextChild(v) => owners(texts(v)),
            Lookup::Attribute(n, v) => owners(attrs(n, v)),
            Lookup::SelfValue(v) => match step.test.local_name() {
                Some(n) if step.test.is_single_attribute() => attrs(n, v),
                _ => texts(v),
            },
        };
        out.retain(|&p| step.test.matches(self.store, p));
        out.sort_unstable();
        out.dedup();
        out.into_iter().map(NodeRef::new).collect()
    }
}

/// The one axis step of a relative single-step path operand.
fn single_step(e: &Expr) -> Option<&Step> {
    match e {
        Expr::Path(p) if p.root.is_none() && p.steps.len() == 1 => p.steps[0].as_axis(),
        Expr::Compiled(c) => c.single_step(),
        _ => None,
    }
}

impl<S: NodeStore + ?Sized> IndexOracle for ValueIndex<'_, S> {
    fn is_index_accessible(&self, ictx: &IndexContext<'_>) -> Option<CostRecord> {
        let (lookup, negated) = Self::lookup_of(ictx.step, ictx.pred)?;
        let cardinality = self.hits(ictx.step, &lookup).len();
        Some(CostRecord { cardinality, sequential: negated, negated })
    }

    fn materialize(&self, ictx: &IndexContext<'_>, _cost: &CostRecord) -> IndexResult {
        match Self::lookup_of(ictx.step, ictx.pred) {
            Some((lookup, _)) => IndexResult { nodes: self.hits(ictx.step, &lookup) },
            None => IndexResult::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::PathExpr;
    use crate::simple_store::{attr, elem, text};

    #[test]
    fn text_and_attribute_lookups() {
        // doc a b(@id=x) "v" b "w"
        let s = elem("a")
            .child(elem("b").attr(attr("id", "x")).child(text("v")))
            .child(elem("b").child(text("w")))
            .build();
        let idx = ValueIndex::build(&s);
        let step = Step::child("b");
        let by_text = Expr::compare(
            CompareOp::Eq,
            Expr::path(PathExpr::relative([Step::new(Axis::Child, Test::text())])),
            Expr::str("w"),
        );
        let ictx = IndexContext { step: &step, pred: &by_text };
        let cost = idx.is_index_accessible(&ictx).unwrap();
        assert_eq!(cost, CostRecord { cardinality: 1, sequential: false, negated: false });
        assert_eq!(idx.materialize(&ictx, &cost).nodes, vec![NodeRef::new(5)]);

        let by_attr = Expr::not(Expr::compare(
            CompareOp::Eq,
            Expr::path(PathExpr::relative([Step::attribute("id")])),
            Expr::str("x"),
        ));
        let ictx = IndexContext { step: &step, pred: &by_attr };
        let cost = idx.is_index_accessible(&ictx).unwrap();
        assert!(cost.sequential && cost.negated);
        assert_eq!(idx.materialize(&ictx, &cost).nodes, vec![NodeRef::new(2)]);
    }
}
