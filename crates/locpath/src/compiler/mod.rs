//! Path compiler.
//!
//! [`Compiler::compile`] turns a parsed [`PathExpr`] into a [`CompiledPath`]:
//!
//! 1. the root is normalized and nested paths are spliced into one chain,
//!    predicate paths are compiled recursively;
//! 2. steps that can never select anything turn the whole path into
//!    [`CompiledPath::Empty`];
//! 3. local step rewrites (descendant merging, self-step merging, namespace
//!    narrowing);
//! 4. index rewrite, if an [`IndexOracle`] is attached;
//! 5. descendant-to-child rewrite, if a [`StructuralSummary`] is attached;
//! 6. the evaluation strategy is chosen.
//!
//! Every rewrite is reported as a [`Diagnostic`].
mod invert;
mod options;

use std::collections::VecDeque;
use std::sync::Arc;

use compact_str::CompactString;

pub use invert::invert;
pub use options::{CompileOptions, CompileOptionsBuilder};

use crate::axis::Axis;
use crate::diagnostics::Diagnostic;
use crate::error::Error;
use crate::expr::{Expr, PathExpr, PathStep};
use crate::index::{CostRecord, IndexContext, IndexOracle};
use crate::model::{NodeKind, NodeRef, NodeStore};
use crate::path::{AxisPath, CachedPath, CompiledPath, MapPath};
use crate::step::{Occurrence, Step};
use crate::summary::{StructuralSummary, SummaryId};
use crate::test::{InvDocTest, NameMode, NameTest, Test};

type CResult<T> = Result<T, Error>;

/// What is known at compile time about the nodes a path starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StaticFocus {
    #[default]
    Unknown,
    /// Document nodes of one store; `all` when these are all of its documents.
    Documents { pres: Vec<usize>, all: bool },
}

/// Path with normalized root, before the strategy is chosen.
struct Draft {
    root: Option<Expr>,
    stages: Vec<PathStep>,
    documents: bool,
}

impl Draft {
    fn into_axis_path(self) -> Result<AxisPath, Draft> {
        if !self.stages.iter().all(|s| s.as_axis().is_some()) {
            return Err(self);
        }
        let steps = self
            .stages
            .into_iter()
            .filter_map(|s| match s {
                PathStep::Axis(step) => Some(step),
                _ => None,
            })
            .collect();
        Ok(AxisPath { root: self.root, steps, documents: self.documents })
    }
}

pub struct Compiler<'a> {
    options: CompileOptions,
    focus: StaticFocus,
    summary: Option<&'a dyn StructuralSummary>,
    index: Option<&'a dyn IndexOracle>,
    document_size: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Compiler<'a> {
    /// Compiler without any knowledge about the input.
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            focus: StaticFocus::Unknown,
            summary: None,
            index: None,
            document_size: usize::MAX,
            diagnostics: Vec::new(),
        }
    }

    /// Compiler for paths evaluated against all documents of `store`.
    ///
    /// Absolute paths are rooted at the documents. Relative paths keep
    /// starting from the context item they are evaluated with.
    pub fn for_store<S: NodeStore + ?Sized>(store: &S, options: CompileOptions) -> Self {
        Self {
            focus: StaticFocus::Documents { pres: store.documents(), all: true },
            document_size: store.document_size(),
            ..Self::new(options)
        }
    }

    /// Restrict the focus to some documents of the store.
    pub fn with_documents(mut self, pres: Vec<usize>) -> Self {
        self.focus = StaticFocus::Documents { pres, all: false };
        self
    }

    pub fn with_summary(mut self, summary: &'a dyn StructuralSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_index(mut self, index: &'a dyn IndexOracle) -> Self {
        self.index = Some(index);
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn note(&mut self, d: Diagnostic) {
        tracing::debug!(kind = d.kind(), "{d}");
        self.diagnostics.push(d);
    }

    /// Summary usable for rewrites: attached and up to date.
    fn fresh_summary(&self) -> Option<&'a dyn StructuralSummary> {
        self.summary.filter(|s| s.is_up_to_date())
    }

    pub fn compile(&mut self, path: PathExpr) -> CResult<CompiledPath> {
        let Some(draft) = self.prepare(path)? else {
            return Ok(CompiledPath::Empty);
        };
        if let Some(step) = find_void(&draft) {
            self.note(Diagnostic::VoidStep { step });
            return Ok(CompiledPath::Empty);
        }
        let draft = self.rewrite_local(draft);
        let mut path = match draft.into_axis_path() {
            Ok(p) => p,
            Err(d) => {
                let map = MapPath::new(d.root, d.stages);
                tracing::trace!(positional = map.is_positional(), "map pipeline");
                return Ok(CompiledPath::Map(map));
            }
        };

        let stale = self.summary.is_some_and(|s| !s.is_up_to_date());
        if stale {
            tracing::trace!("summary out of date, skipping index and children rewrites");
        }
        if let Some(oracle) = self.index
            && self.options.index_rewrite
            && path.documents
            && !stale
        {
            match self.index_rewrite(oracle, path) {
                Some(p) => path = p,
                None => return Ok(CompiledPath::Empty),
            }
        }
        if let Some(summary) = self.fresh_summary()
            && self.options.children_rewrite
            && path.documents
        {
            match self.children_rewrite(summary, path) {
                Some(p) => path = p,
                None => return Ok(CompiledPath::Empty),
            }
        }

        Ok(if self.options.streaming && path.is_iterative() {
            tracing::trace!(path = %path, "staircase join");
            CompiledPath::Iter(path)
        } else {
            tracing::trace!(path = %path, "cached evaluation");
            CompiledPath::Cached(CachedPath::new(path, self.options.memo_capacity))
        })
    }

    /// Compile a path that is evaluated with a focus of its own.
    fn compile_nested(&mut self, path: PathExpr) -> CResult<CompiledPath> {
        let outer = std::mem::take(&mut self.focus);
        let res = self.compile(path);
        self.focus = outer;
        res
    }

    /// Replace every raw path inside `e` by its compiled form.
    fn compile_expr(&mut self, e: Expr) -> CResult<Expr> {
        Ok(match e {
            Expr::Path(p) => Expr::Compiled(Arc::new(self.compile_nested(*p)?)),
            Expr::Compare(op, l, r) => Expr::Compare(op, self.compile_boxed(l)?, self.compile_boxed(r)?),
            Expr::Arith(op, l, r) => Expr::Arith(op, self.compile_boxed(l)?, self.compile_boxed(r)?),
            Expr::And(l, r) => Expr::And(self.compile_boxed(l)?, self.compile_boxed(r)?),
            Expr::Or(l, r) => Expr::Or(self.compile_boxed(l)?, self.compile_boxed(r)?),
            Expr::Not(e) => Expr::Not(self.compile_boxed(e)?),
            Expr::Contains(e, token) => Expr::Contains(self.compile_boxed(e)?, token),
            Expr::Call(f, args) => Expr::Call(f, self.compile_all(args)?),
            Expr::Sequence(items) => Expr::Sequence(self.compile_all(items)?),
            other => other,
        })
    }

    fn compile_boxed(&mut self, e: Box<Expr>) -> CResult<Box<Expr>> {
        self.compile_expr(*e).map(Box::new)
    }

    fn compile_all(&mut self, exprs: Vec<Expr>) -> CResult<Vec<Expr>> {
        exprs.into_iter().map(|e| self.compile_expr(e)).collect()
    }

    fn prepare_step(&mut self, step: Step) -> CResult<Step> {
        let preds = self.compile_all(step.preds.clone())?;
        let opts = &self.options;
        let test = step.test.resolve(|p| opts.namespace(p), opts.default_element_ns.as_deref());
        Ok(step.with_test(test).with_preds(preds))
    }

    /// Root normalization and nested-path merge. `None` if a spliced root
    /// is statically empty.
    fn prepare(&mut self, path: PathExpr) -> CResult<Option<Draft>> {
        let PathExpr { mut root, steps: mut stages } = path;
        loop {
            match root {
                Some(Expr::Path(p)) => {
                    let p = *p;
                    stages = p.steps.into_iter().chain(stages).collect();
                    root = p.root;
                }
                Some(Expr::Compiled(c)) => {
                    let head: Vec<PathStep> = match &*c {
                        CompiledPath::Empty => return Ok(None),
                        CompiledPath::Map(m) => m.stages.clone(),
                        _ => c.steps().iter().cloned().map(PathStep::Axis).collect(),
                    };
                    stages = head.into_iter().chain(stages).collect();
                    root = c.root().cloned();
                }
                other => {
                    root = other;
                    break;
                }
            }
        }

        let (root, documents) = match root {
            // the context item is only known at evaluation time
            None | Some(Expr::Context) => (None, false),
            Some(Expr::Root) => match &self.focus {
                StaticFocus::Documents { pres, .. } => (Some(document_nodes(pres)), true),
                StaticFocus::Unknown => (Some(Expr::Root), false),
            },
            Some(other) => {
                let outer = std::mem::take(&mut self.focus);
                let r = self.compile_expr(other);
                self.focus = outer;
                (Some(r?), false)
            }
        };

        let mut out: Vec<PathStep> = Vec::with_capacity(stages.len());
        let mut queue: VecDeque<PathStep> = stages.into();
        while let Some(stage) = queue.pop_front() {
            match stage {
                PathStep::Slash(Expr::Path(p)) if p.root.is_none() && p.steps.iter().all(|s| s.as_axis().is_some()) => {
                    for s in p.steps.into_iter().rev() {
                        queue.push_front(s);
                    }
                }
                PathStep::Slash(Expr::Context) => queue.push_front(Step::new(Axis::SelfAxis, Test::node()).into()),
                PathStep::Axis(step) => {
                    let step = self.prepare_step(step)?;
                    let redundant = step.axis == Axis::SelfAxis && step.test.is_any_node() && step.preds.is_empty();
                    let between_nodes = matches!(out.last(), Some(PathStep::Axis(_)))
                        || matches!(queue.front(), Some(PathStep::Axis(_)));
                    if !(redundant && between_nodes) {
                        out.push(PathStep::Axis(step));
                    }
                }
                PathStep::Slash(e) => {
                    let outer = std::mem::take(&mut self.focus);
                    let e = self.compile_expr(e);
                    self.focus = outer;
                    out.push(PathStep::Slash(e?));
                }
                PathStep::Bang(e) => {
                    let outer = std::mem::take(&mut self.focus);
                    let e = self.compile_expr(e);
                    self.focus = outer;
                    out.push(PathStep::Bang(e?));
                }
            }
        }
        Ok(Some(Draft { root, stages: out, documents }))
    }

    fn rewrite_local(&mut self, draft: Draft) -> Draft {
        let Draft { root, stages, documents } = draft;
        let mut out: Vec<PathStep> = Vec::with_capacity(stages.len());
        let mut it = stages.into_iter().peekable();
        while let Some(stage) = it.next() {
            let step = match stage {
                PathStep::Axis(step) => step,
                other => {
                    out.push(other);
                    continue;
                }
            };
            if is_any_descendant_or_self(&step) {
                match it.peek() {
                    // descendant-or-self::node()/child::X -> descendant::X
                    Some(PathStep::Axis(next)) if next.axis == Axis::Child && !next.is_positional() => {
                        let merged = next.with_axis(Axis::Descendant);
                        self.note(Diagnostic::MergedDescendant { from: format!("{step}/{next}"), to: merged.to_string() });
                        it.next();
                        out.push(merged.into());
                        continue;
                    }
                    // descendant-or-self::node()/@X -> descendant-or-self::element()/@X
                    Some(PathStep::Axis(next)) if next.axis == Axis::Attribute => {
                        let narrowed = step.with_test(Test::any_element());
                        self.note(Diagnostic::MergedDescendant { from: step.to_string(), to: narrowed.to_string() });
                        out.push(narrowed.into());
                        continue;
                    }
                    _ => {}
                }
            }
            if step.axis == Axis::SelfAxis
                && step.preds.is_empty()
                && let Some(PathStep::Axis(prev)) = out.last()
                && !prev.is_positional()
                && let Ok(Some(test)) = prev.test.intersect(&step.test)
            {
                let merged = prev.with_test(test);
                self.note(Diagnostic::SelfStepMerged { step: step.to_string() });
                if let Some(last) = out.last_mut() {
                    *last = merged.into();
                }
                continue;
            }
            out.push(self.narrow_namespace(step).into());
        }

        if root.is_none()
            && let [PathStep::Axis(step)] = out.as_mut_slice()
            && step.axis == Axis::Attribute
            && step.test.is_single_attribute()
        {
            *step = step.with_occurrence(Occurrence::ZeroOrOne);
            let d = Diagnostic::AttributeSingleton { step: step.to_string() };
            self.note(d);
        }
        Draft { root, stages: out, documents }
    }

    fn narrow_namespace(&mut self, step: Step) -> Step {
        let Some(global) = self.fresh_summary().and_then(|s| s.global_namespace()) else {
            return step;
        };
        if self.options.default_element_ns.as_deref().unwrap_or_default() != global {
            return step;
        }
        match step.test.narrow_to_local(global) {
            Some(test) => {
                self.note(Diagnostic::NamespaceNarrowed { test: step.test.to_string() });
                step.with_test(test)
            }
            None => step,
        }
    }

    /// Index rewrite over the leading run of down-axis steps. `None` when
    /// the index proves the path empty.
    fn index_rewrite(&mut self, oracle: &dyn IndexOracle, mut path: AxisPath) -> Option<AxisPath> {
        let mut best: Option<(usize, usize, CostRecord)> = None;
        let mut s = 0;
        while s < path.steps.len() {
            if !path.steps[s].axis.is_down() || path.steps[s].is_positional() {
                break;
            }
            let mut p = 0;
            while p < path.steps[s].preds.len() {
                let step = &path.steps[s];
                let pred = &step.preds[p];
                let Some(cost) = oracle.is_index_accessible(&IndexContext { step, pred }) else {
                    p += 1;
                    continue;
                };
                if cost.cardinality == 0 {
                    if cost.negated {
                        self.note(Diagnostic::NegationSimplified { pred: pred.to_string() });
                        let mut preds = step.preds.clone();
                        preds.remove(p);
                        let simplified = step.with_preds(preds);
                        path.steps[s] = simplified;
                        continue;
                    }
                    self.note(Diagnostic::NoIndexResults { pred: pred.to_string() });
                    return None;
                }
                if best.is_none_or(|(_, _, b)| cost.cardinality < b.cardinality) {
                    best = Some((s, p, cost));
                }
                p += 1;
            }
            s += 1;
        }

        let Some((s, p, cost)) = best else { return Some(path) };
        let step = &path.steps[s];
        let pred = &step.preds[p];
        if cost.cardinality >= self.document_size {
            self.note(Diagnostic::IndexRejected { pred: pred.to_string(), cardinality: cost.cardinality });
            return Some(path);
        }
        self.note(Diagnostic::IndexUsed { pred: pred.to_string(), cardinality: cost.cardinality });
        let hits = oracle.materialize(&IndexContext { step, pred }, &cost).nodes;

        if cost.negated {
            let mut preds = step.preds.clone();
            preds[p] = Expr::not(membership(&hits));
            let filtered = step.with_preds(preds);
            path.steps[s] = filtered;
            return Some(path);
        }

        // root at the hits; unless they are sequential, check the way back
        // with the inverted chain
        let mut preds = Vec::new();
        if !cost.sequential && self.needs_inverted_chain(&path.steps, s) {
            let chain = invert(&path.steps[..=s], self.inverted_root_test(path.steps[0].axis));
            if !chain.is_empty() {
                let chain = AxisPath::new(None, chain);
                preds.push(Expr::Compiled(Arc::new(CompiledPath::Cached(CachedPath::new(chain, None)))));
            }
        }
        preds.extend(step.preds.iter().enumerate().filter(|&(i, _)| i != p).map(|(_, e)| e.clone()));
        let mut steps = Vec::with_capacity(path.steps.len() - s);
        if !preds.is_empty() {
            steps.push(Step::new(Axis::SelfAxis, Test::node()).with_preds(preds));
        }
        steps.extend(path.steps[s + 1..].iter().cloned());
        Some(AxisPath::new(Some(Expr::Nodes(hits)), steps))
    }

    /// Test for the last step of an inverted chain. Every node has a
    /// document ancestor, so that step is left out for a full collection.
    fn inverted_root_test(&self, first: Axis) -> Option<Test> {
        match &self.focus {
            StaticFocus::Documents { all: true, .. }
                if matches!(first.invert(), Axis::Ancestor | Axis::AncestorOrSelf) =>
            {
                None
            }
            StaticFocus::Documents { all: true, .. } => Some(Test::document()),
            StaticFocus::Documents { pres, all: false } => Some(Test::InvDoc(InvDocTest::new(pres.clone()))),
            StaticFocus::Unknown => Some(Test::document()),
        }
    }

    /// Whether hits of step `s` must be checked against the steps before it.
    ///
    /// Not needed when the summary shows that every step up to `s` is a
    /// predicate-free child step whose name occurs exactly once, at the
    /// depth of that step.
    fn needs_inverted_chain(&self, steps: &[Step], s: usize) -> bool {
        let (Some(summary), StaticFocus::Documents { all: true, .. }) = (self.fresh_summary(), &self.focus) else {
            return true;
        };
        let global = summary.global_namespace();
        for (i, step) in steps[..=s].iter().enumerate().rev() {
            if i != s && !step.preds.is_empty() {
                return true;
            }
            if i != s && matches!(&step.test, Test::Name(NameTest { mode: NameMode::Wildcard, .. })) {
                continue;
            }
            let Some(name) = summary_name(&step.test, global) else { return true };
            if step.axis != Axis::Child {
                return true;
            }
            let nodes = summary.descendants(Some(name), NodeKind::Element);
            if nodes.len() != 1 || summary.node(nodes[0]).level != i + 1 {
                return true;
            }
        }
        false
    }

    /// Descendant-to-child rewrite. `None` when the summary proves the path empty.
    fn children_rewrite(&mut self, summary: &dyn StructuralSummary, path: AxisPath) -> Option<AxisPath> {
        let AxisPath { root, mut steps, documents } = path;
        let global = summary.global_namespace();
        for s in 0..steps.len() {
            if s > 0 && !steps[s - 1].preds.is_empty() {
                break;
            }
            let curr = &steps[s];
            if curr.axis != Axis::Descendant || curr.is_positional() {
                continue;
            }
            let Some(global) = global else {
                self.reject_children(curr, "several namespaces in use");
                break;
            };
            let nodes = match level_nodes(summary, &steps[..=s], global) {
                Ok(nodes) => nodes,
                Err(reason) => {
                    self.reject_children(curr, reason);
                    continue;
                }
            };
            let chain = match child_chain(summary, nodes) {
                Ok(chain) => chain,
                Err(reason) => {
                    self.reject_children(curr, reason);
                    break;
                }
            };
            let mut rewritten: Vec<Step> = chain
                .iter()
                .map(|name| {
                    let test = match name {
                        Some(n) => NameTest::local_name(NodeKind::Element, n),
                        None => NameTest::wildcard(NodeKind::Element),
                    };
                    Step::new(Axis::Child, Test::Name(test))
                })
                .collect();
            if let Some(last) = rewritten.last_mut() {
                *last = last.with_preds(curr.preds.clone());
            }
            rewritten.extend(steps[s + 1..].iter().cloned());
            let from = AxisPath { root: root.clone(), steps, documents };
            let to = AxisPath { root: root.clone(), steps: rewritten, documents };
            self.note(Diagnostic::ChildrenRewrite { from: from.to_string(), to: to.to_string() });
            steps = to.steps;
            break;
        }

        let path = AxisPath { root, steps, documents };
        if let Some(global) = global
            && proves_empty(summary, &path.steps, global)
        {
            self.note(Diagnostic::EmptySummaryPath { path: path.to_string() });
            return None;
        }
        Some(path)
    }

    fn reject_children(&mut self, step: &Step, reason: &'static str) {
        self.note(Diagnostic::ChildrenRejected { step: step.to_string(), reason });
    }
}

fn document_nodes(pres: &[usize]) -> Expr {
    Expr::Nodes(pres.iter().copied().map(NodeRef::new).collect())
}

/// `self::nodes(...)`: true for exactly the given nodes.
fn membership(nodes: &[NodeRef]) -> Expr {
    let test = Test::InvDoc(InvDocTest::new(nodes.iter().map(|n| n.pre).collect()));
    let path = AxisPath::new(None, vec![Step::new(Axis::SelfAxis, test)]);
    Expr::Compiled(Arc::new(CompiledPath::Iter(path)))
}

fn is_any_descendant_or_self(step: &Step) -> bool {
    step.axis == Axis::DescendantOrSelf && step.test.is_any_node() && step.preds.is_empty()
}

fn is_leaf_kind(kind: Option<NodeKind>) -> bool {
    matches!(kind, Some(NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction))
}

/// First step of a path that can never select a node, rendered for the diagnostic.
fn find_void(draft: &Draft) -> Option<String> {
    let from_document = draft.documents || matches!(draft.root, Some(Expr::Root));
    let mut prev: Option<&Step> = None;
    for (i, stage) in draft.stages.iter().enumerate() {
        let PathStep::Axis(step) = stage else {
            prev = None;
            continue;
        };
        let void = void_alone(step)
            || match prev {
                Some(p) => void_after(p, step),
                None => i == 0 && from_document && void_from_document(step),
            };
        if void {
            return Some(step.to_string());
        }
        prev = Some(step);
    }
    None
}

fn void_alone(step: &Step) -> bool {
    if step.preds.iter().any(|p| p.constant_truth() == Some(false) || matches!(p, Expr::Compiled(c) if c.is_empty())) {
        return true;
    }
    let kind = step.test.node_kind();
    match step.axis {
        Axis::Attribute => !step.test.may_match(NodeKind::Attribute),
        Axis::Child | Axis::Descendant => matches!(kind, Some(NodeKind::Attribute | NodeKind::Document)),
        Axis::Parent | Axis::Ancestor => kind == Some(NodeKind::Attribute) || is_leaf_kind(kind),
        Axis::Following | Axis::FollowingSibling | Axis::Preceding | Axis::PrecedingSibling => {
            matches!(kind, Some(NodeKind::Attribute | NodeKind::Document))
        }
        _ => false,
    }
}

fn void_from_document(step: &Step) -> bool {
    let kind = step.test.node_kind();
    match step.axis {
        Axis::SelfAxis | Axis::AncestorOrSelf => !(step.test.is_any_node() || step.test.is_document()),
        Axis::Child | Axis::Descendant => matches!(kind, Some(NodeKind::Document | NodeKind::Attribute)),
        Axis::DescendantOrSelf => kind == Some(NodeKind::Attribute),
        _ => true,
    }
}

fn void_after(prev: &Step, step: &Step) -> bool {
    let prev_kind = prev.test.node_kind();
    match step.axis {
        Axis::SelfAxis | Axis::DescendantOrSelf => {
            if step.test.is_any_node() {
                return false;
            }
            if prev.axis == Axis::Attribute && !step.test.may_match(NodeKind::Attribute) {
                return true;
            }
            if let Some(k) = prev_kind
                && k.is_leaf()
                && !step.test.may_match(k)
            {
                return true;
            }
            step.axis == Axis::SelfAxis && matches!(prev.test.intersect(&step.test), Ok(None))
        }
        Axis::FollowingSibling | Axis::PrecedingSibling => prev.axis == Axis::Attribute,
        Axis::Descendant | Axis::Child | Axis::Attribute => prev.axis == Axis::Attribute || is_leaf_kind(prev_kind),
        Axis::Parent | Axis::Ancestor => prev.test.is_document(),
        _ => false,
    }
}

/// Element name the summary can look up for `test`.
fn summary_name<'t>(test: &'t Test, global: Option<&str>) -> Option<&'t str> {
    let Test::Name(n) = test else { return None };
    if n.kind != NodeKind::Element {
        return None;
    }
    match n.mode {
        NameMode::Local => n.local.as_deref(),
        NameMode::Full
            if n.unresolved_prefix().is_none()
                && global.is_some_and(|g| n.uri.as_deref().unwrap_or_default() == g) =>
        {
            n.local.as_deref()
        }
        _ => None,
    }
}

fn is_named(summary: &dyn StructuralSummary, id: SummaryId, name: &str) -> bool {
    let n = summary.node(id);
    n.kind == NodeKind::Element && n.name.as_deref() == Some(name)
}

/// Summary nodes selected by a chain of child and descendant name steps,
/// all on one level.
fn level_nodes(summary: &dyn StructuralSummary, steps: &[Step], global: &str) -> Result<Vec<SummaryId>, &'static str> {
    let mut nodes = summary.root();
    for step in steps {
        let desc = match step.axis {
            Axis::Child => false,
            Axis::Descendant => true,
            _ => return Err("preceded by a step other than child or descendant"),
        };
        let name = summary_name(&step.test, Some(global)).ok_or("not an element name test")?;
        let mut found: Vec<SummaryId> = Vec::new();
        for id in summary.children(&nodes, desc) {
            if !is_named(summary, id, name) {
                continue;
            }
            if let Some(&first) = found.first()
                && summary.node(first).level != summary.node(id).level
            {
                return Err("name occurs at several depths");
            }
            found.push(id);
        }
        if found.is_empty() {
            return Err("name does not occur");
        }
        nodes = found;
    }
    Ok(nodes)
}

/// Names from the first level down to `nodes`; `None` where names differ.
fn child_chain(summary: &dyn StructuralSummary, mut nodes: Vec<SummaryId>) -> Result<Vec<Option<CompactString>>, &'static str> {
    let mut chain = Vec::new();
    while let Some(&first) = nodes.first()
        && summary.node(first).parent.is_some()
    {
        let name = summary.node(first).name.clone();
        if name.as_deref().is_some_and(|n| n.contains(':')) {
            return Err("prefixed name in the child chain");
        }
        let same = nodes.iter().all(|&id| summary.node(id).name == name);
        chain.push(name.filter(|_| same));
        nodes = summary.parents(&nodes);
    }
    chain.reverse();
    // every substituted step must find elements on its level
    for (depth, name) in chain.iter().enumerate() {
        let level_ok = summary
            .descendants(name.as_deref(), NodeKind::Element)
            .into_iter()
            .any(|id| summary.node(id).level == depth + 1);
        if !level_ok {
            return Err("level check failed");
        }
    }
    if chain.is_empty() {
        return Err("level check failed");
    }
    Ok(chain)
}

/// The summary shows that some prefix of the path selects nothing.
fn proves_empty(summary: &dyn StructuralSummary, steps: &[Step], global: &str) -> bool {
    let mut nodes = summary.root();
    for step in steps {
        let desc = match step.axis {
            Axis::Child => false,
            Axis::Descendant => true,
            _ => return false,
        };
        let Some(name) = summary_name(&step.test, Some(global)) else { return false };
        nodes = summary.children(&nodes, desc).into_iter().filter(|&id| is_named(summary, id, name)).collect();
        if nodes.is_empty() {
            return true;
        }
    }
    false
}
