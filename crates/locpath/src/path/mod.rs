//! Compiled location paths and the iterators that evaluate them.
//!
//! A path is compiled into exactly one [`CompiledPath`] variant:
//!
//! - `Empty`: statically known to select nothing; the store is never touched.
//! - `Cached`: nested depth-first evaluation into one buffer which is then
//!   sorted and deduplicated. Works for every path of axis steps.
//! - `Iter`: the staircase join, a stack of step iterators that streams
//!   results in document order. Only chosen for paths that pass
//!   [`AxisPath::is_iterative`].
//! - `Map`: stages that may produce non-node items (`/expr`, `!expr`);
//!   results are neither sorted nor deduplicated.
//!
//! Evaluation returns a [`PathIter`] that yields `Result<Item, Error>`.
mod cached;
mod map;
mod staircase;

use core::fmt;

pub use cached::CachedPath;
pub use map::{MapIter, MapPath};
pub use staircase::StaircaseIter;

use crate::axis::Axis;
use crate::error::{Error, ErrorCode};
use crate::eval::{self, EvalContext, Focus};
use crate::expr::{Expr, Item, PathExpr, PathStep};
use crate::model::{NodeKind, NodeRef, NodeStore};
use crate::step::Step;
use crate::summary::StructuralSummary;

/// Optional root plus axis steps.
#[derive(Debug, Clone)]
pub struct AxisPath {
    pub root: Option<Expr>,
    pub steps: Vec<Step>,
    /// The root yields the document nodes of the store.
    pub documents: bool,
}

impl AxisPath {
    pub fn new(root: Option<Expr>, steps: Vec<Step>) -> Self {
        Self { root, steps, documents: false }
    }

    /// Whether the staircase join yields this path in document order and
    /// without duplicates.
    ///
    /// The root is one node (or the documents of a store), no reverse axis
    /// occurs, and the axes whose results overlap between context nodes
    /// (descendant, descendant-or-self, following, following-sibling) are
    /// only used on the last step or right before a closing attribute step.
    /// Every other context level then consists of nodes on one depth, in
    /// document order.
    pub fn is_iterative(&self) -> bool {
        let single_root = match &self.root {
            None | Some(Expr::Root) => true,
            Some(Expr::Nodes(n)) => n.len() <= 1 || self.documents,
            _ => false,
        };
        if !single_root {
            return false;
        }
        let n = self.steps.len();
        for (s, step) in self.steps.iter().enumerate() {
            match step.axis {
                Axis::Ancestor | Axis::AncestorOrSelf | Axis::Preceding | Axis::PrecedingSibling => return false,
                Axis::Descendant | Axis::DescendantOrSelf | Axis::Following | Axis::FollowingSibling => {
                    return s + 1 == n || (s + 2 == n && self.steps[s + 1].axis == Axis::Attribute);
                }
                Axis::Child | Axis::Attribute | Axis::Parent | Axis::SelfAxis => {}
            }
        }
        true
    }
}

impl fmt::Display for AxisPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_path(f, self.root.as_ref(), self.steps.iter().map(|s| PathStep::Axis(s.clone())))
    }
}

fn fmt_path(f: &mut fmt::Formatter<'_>, root: Option<&Expr>, stages: impl Iterator<Item = PathStep>) -> fmt::Result {
    let p = PathExpr { root: root.cloned(), steps: stages.collect() };
    write!(f, "{p}")
}

#[derive(Debug)]
pub enum CompiledPath {
    Empty,
    Cached(CachedPath),
    Iter(AxisPath),
    Map(MapPath),
}

impl CompiledPath {
    /// Plain translation without any rewrite, used for paths evaluated before compilation.
    pub fn unoptimized(path: &PathExpr) -> CompiledPath {
        let root = path.root.clone().filter(|r| !matches!(r, Expr::Context));
        let steps: Option<Vec<Step>> = path.steps.iter().map(|s| s.as_axis().cloned()).collect();
        match steps {
            Some(steps) => CompiledPath::Cached(CachedPath::new(AxisPath::new(root, steps), None)),
            None => CompiledPath::Map(MapPath::new(root, path.steps.clone())),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CompiledPath::Empty)
    }

    pub fn root(&self) -> Option<&Expr> {
        match self {
            CompiledPath::Empty => None,
            CompiledPath::Cached(c) => c.path.root.as_ref(),
            CompiledPath::Iter(p) => p.root.as_ref(),
            CompiledPath::Map(m) => m.root.as_ref(),
        }
    }

    /// Axis steps of `Cached` and `Iter` paths.
    pub fn steps(&self) -> &[Step] {
        match self {
            CompiledPath::Cached(c) => &c.path.steps,
            CompiledPath::Iter(p) => &p.steps,
            _ => &[],
        }
    }

    /// The step of a relative path consisting of exactly one axis step.
    pub fn single_step(&self) -> Option<&Step> {
        match self.steps() {
            [s] if self.root().is_none() => Some(s),
            _ => None,
        }
    }

    pub fn uses_focus(&self) -> bool {
        match self {
            CompiledPath::Empty => false,
            _ => self.root().is_none_or(Expr::uses_focus),
        }
    }

    /// Reads a variable binding anywhere in the root, the predicates or the stages.
    pub fn uses_vars(&self) -> bool {
        let root = self.root().is_some_and(Expr::uses_vars);
        match self {
            CompiledPath::Empty => false,
            CompiledPath::Map(m) => root || m.stages.iter().any(PathStep::uses_vars),
            _ => root || self.steps().iter().any(|s| s.preds.iter().any(Expr::uses_vars)),
        }
    }

    /// Expected number of results, from the summary's occurrence counts.
    ///
    /// Only known for document-rooted paths of predicate-free child and
    /// descendant element name steps.
    pub fn estimated_len(&self, summary: &dyn StructuralSummary) -> Option<usize> {
        let path = match self {
            CompiledPath::Empty => return Some(0),
            CompiledPath::Cached(c) => &c.path,
            CompiledPath::Iter(p) => p,
            CompiledPath::Map(_) => return None,
        };
        if !path.documents || !summary.is_up_to_date() {
            return None;
        }
        let mut nodes = summary.root();
        for step in &path.steps {
            let name = step.simple_name()?;
            if step.test.node_kind() != Some(NodeKind::Element) {
                return None;
            }
            let desc = step.axis == Axis::Descendant;
            nodes = summary
                .children(&nodes, desc)
                .into_iter()
                .filter(|&id| {
                    let n = summary.node(id);
                    n.kind == NodeKind::Element && n.name.as_deref() == Some(name)
                })
                .collect();
        }
        Some(nodes.iter().map(|&id| summary.node(id).count).sum())
    }

    /// Evaluate against the context item of `ctx`.
    pub fn evaluate<'a, S: NodeStore + ?Sized>(&'a self, ctx: &'a EvalContext<'a, S>) -> Result<PathIter<'a, S>, Error> {
        self.evaluate_with(ctx, ctx.context_item().cloned())
    }

    pub fn evaluate_with<'a, S: NodeStore + ?Sized>(
        &'a self,
        ctx: &'a EvalContext<'a, S>,
        context: Option<Item>,
    ) -> Result<PathIter<'a, S>, Error> {
        tracing::trace!(path = %self, "evaluating path");
        Ok(match self {
            CompiledPath::Empty => PathIter::Empty,
            CompiledPath::Cached(c) => PathIter::Nodes { nodes: c.evaluate(ctx, context)?, pos: 0 },
            CompiledPath::Iter(p) => {
                let roots = root_nodes(p.root.as_ref(), ctx, context)?;
                PathIter::Staircase(StaircaseIter::new(p, ctx, roots))
            }
            CompiledPath::Map(m) => m.evaluate(ctx, context)?,
        })
    }

    /// Evaluate and collect all nodes; non-node results are a type error.
    pub fn nodes<'a, S: NodeStore + ?Sized>(
        &'a self,
        ctx: &'a EvalContext<'a, S>,
        context: Option<Item>,
    ) -> Result<Vec<NodeRef>, Error> {
        self.evaluate_with(ctx, context)?
            .map(|r| r.and_then(|it| it.as_node().ok_or_else(|| Error::not_a_node(&it))))
            .collect()
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledPath::Empty => f.write_str("()"),
            CompiledPath::Cached(c) => write!(f, "{}", c.path),
            CompiledPath::Iter(p) => write!(f, "{p}"),
            CompiledPath::Map(m) => fmt_path(f, m.root.as_ref(), m.stages.iter().cloned()),
        }
    }
}

/// Lazy result sequence of a compiled path.
pub enum PathIter<'a, S: NodeStore + ?Sized> {
    Empty,
    Nodes { nodes: Vec<NodeRef>, pos: usize },
    Items { items: Vec<Item>, pos: usize },
    Staircase(StaircaseIter<'a, S>),
    Map(MapIter<'a, S>),
}

impl<S: NodeStore + ?Sized> PathIter<'_, S> {
    /// Restart the sequence from its first item, reusing all iterator state.
    pub fn reset(&mut self) {
        match self {
            PathIter::Empty => {}
            PathIter::Nodes { pos, .. } | PathIter::Items { pos, .. } => *pos = 0,
            PathIter::Staircase(s) => s.reset(),
            PathIter::Map(m) => m.reset(),
        }
    }
}

impl<S: NodeStore + ?Sized> Iterator for PathIter<'_, S> {
    type Item = Result<Item, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            PathIter::Empty => None,
            PathIter::Nodes { nodes, pos } => {
                let n = nodes.get(*pos).copied()?;
                *pos += 1;
                Some(Ok(Item::Node(n)))
            }
            PathIter::Items { items, pos } => {
                let it = items.get(*pos).cloned()?;
                *pos += 1;
                Some(Ok(it))
            }
            PathIter::Staircase(s) => s.next(),
            PathIter::Map(m) => m.next(),
        }
    }
}

/// Items the root yields, or the context item for relative paths.
pub(crate) fn root_items<S: NodeStore + ?Sized>(
    root: Option<&Expr>,
    ctx: &EvalContext<'_, S>,
    context: Option<Item>,
) -> Result<Vec<Item>, Error> {
    match root {
        None => context.map(|c| vec![c]).ok_or_else(Error::no_context),
        Some(e) => {
            let focus = context.map(Focus::new);
            eval::eval(e, ctx, focus.as_ref()).map_err(|err| err.with_context(e))
        }
    }
}

pub(crate) fn root_nodes<S: NodeStore + ?Sized>(
    root: Option<&Expr>,
    ctx: &EvalContext<'_, S>,
    context: Option<Item>,
) -> Result<Vec<NodeRef>, Error> {
    root_items(root, ctx, context)?
        .into_iter()
        .map(|it| match it {
            Item::Node(n) => Ok(n),
            other if root.is_none() => Err(Error::from_code(
                ErrorCode::XPTY0020,
                format!("context item {other} of an axis step is not a node"),
            )),
            other => Err(Error::not_a_node(&other)),
        })
        .collect()
}
