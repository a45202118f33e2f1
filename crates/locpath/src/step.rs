use compact_str::CompactString;
use core::fmt;
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::axis::{Axis, AxisCursor};
use crate::error::Error;
use crate::eval::{self, EvalContext, Focus};
use crate::expr::{CompareOp, Expr, Item};
use crate::model::{NodeKind, NodeRef, NodeStore};
use crate::test::{self, Test};

/// Execution strategy of a step, fixed by the static shape of its predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// No predicate depends on position or size.
    Plain,
    /// Position ranges and a trailing `[last()]` only.
    Positional,
    /// Everything else: materialize, then filter with the full (position, size).
    Buffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    ZeroOrOne,
    ZeroOrMore,
}

/// Inclusive range of accepted context positions. `max < min` accepts nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosRange {
    pub min: u64,
    pub max: u64,
}

impl PosRange {
    const EMPTY: PosRange = PosRange { min: 1, max: 0 };

    /// Recognizes `[N]` and `[position() op N]` (either operand order).
    pub fn of(pred: &Expr) -> Option<PosRange> {
        match pred {
            Expr::Literal(Item::Num(n)) => Some(Self::equal(*n)),
            Expr::Compare(op, l, r) => match (l.as_ref(), r.as_ref()) {
                (Expr::Position, Expr::Literal(Item::Num(n))) => Self::compare(*op, *n),
                (Expr::Literal(Item::Num(n)), Expr::Position) => Self::compare(op.swap(), *n),
                _ => None,
            },
            _ => None,
        }
    }

    fn equal(n: f64) -> PosRange {
        if n >= 1.0 && n.fract() == 0.0 { PosRange { min: n as u64, max: n as u64 } } else { Self::EMPTY }
    }

    fn compare(op: CompareOp, n: f64) -> Option<PosRange> {
        if n.is_nan() {
            return Some(Self::EMPTY);
        }
        let upper = |m: f64| if m < 1.0 { Self::EMPTY } else { PosRange { min: 1, max: m.min(u64::MAX as f64) as u64 } };
        let lower = |m: f64| PosRange { min: m.max(1.0) as u64, max: u64::MAX };
        Some(match op {
            CompareOp::Eq => Self::equal(n),
            CompareOp::Le => upper(n.floor()),
            CompareOp::Lt => upper(n.ceil() - 1.0),
            CompareOp::Ge => lower(n.ceil()),
            CompareOp::Gt => lower(n.floor() + 1.0),
            CompareOp::Ne => return None,
        })
    }

    pub fn contains(&self, pos: u64) -> bool {
        self.min <= pos && pos <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredKind {
    Plain,
    Range(PosRange),
    Last,
}

fn is_last(pred: &Expr) -> bool {
    match pred {
        Expr::Last => true,
        Expr::Compare(CompareOp::Eq, l, r) => {
            matches!((l.as_ref(), r.as_ref()), (Expr::Position, Expr::Last) | (Expr::Last, Expr::Position))
        }
        _ => false,
    }
}

fn classify(preds: &[Expr]) -> (StepMode, SmallVec<[PredKind; 2]>) {
    let mut kinds = SmallVec::new();
    let mut mode = StepMode::Plain;
    for (i, p) in preds.iter().enumerate() {
        if p.has_score() {
            mode = StepMode::Buffered;
        }
        let positional = p.uses_position() || p.uses_last() || p.may_be_number();
        let kind = if !positional {
            PredKind::Plain
        } else if let Some(r) = PosRange::of(p) {
            PredKind::Range(r)
        } else if is_last(p) && i + 1 == preds.len() {
            PredKind::Last
        } else {
            mode = StepMode::Buffered;
            PredKind::Plain
        };
        if kind != PredKind::Plain && mode == StepMode::Plain {
            mode = StepMode::Positional;
        }
        kinds.push(kind);
    }
    (mode, kinds)
}

/// One axis step: `axis::test[pred]...`.
///
/// Steps are values; every rewrite returns a new step and reclassifies its mode.
#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub test: Test,
    pub preds: Vec<Expr>,
    pub occurrence: Occurrence,
    mode: StepMode,
    kinds: SmallVec<[PredKind; 2]>,
}

impl Step {
    pub fn new(axis: Axis, test: Test) -> Self {
        // a name test on the attribute axis selects attributes
        let test = match (axis, test) {
            (Axis::Attribute, Test::Name(mut n)) => {
                n.kind = NodeKind::Attribute;
                Test::Name(n)
            }
            (_, t) => t,
        };
        Self { axis, test, preds: Vec::new(), occurrence: Occurrence::ZeroOrMore, mode: StepMode::Plain, kinds: SmallVec::new() }
    }

    pub fn child(local: &str) -> Self {
        Self::new(Axis::Child, Test::element(local))
    }

    pub fn descendant(local: &str) -> Self {
        Self::new(Axis::Descendant, Test::element(local))
    }

    pub fn attribute(local: &str) -> Self {
        Self::new(Axis::Attribute, Test::attribute(local))
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    pub fn with_axis(&self, axis: Axis) -> Step {
        Step { axis, ..self.clone() }
    }

    pub fn with_test(&self, test: Test) -> Step {
        Step { test, ..self.clone() }
    }

    pub fn with_preds(&self, preds: Vec<Expr>) -> Step {
        let (mode, kinds) = classify(&preds);
        Step { preds, mode, kinds, ..self.clone() }
    }

    pub fn add_preds<I: IntoIterator<Item = Expr>>(&self, extra: I) -> Step {
        let mut preds = self.preds.clone();
        preds.extend(extra);
        self.with_preds(preds)
    }

    pub fn with_occurrence(&self, occurrence: Occurrence) -> Step {
        Step { occurrence, ..self.clone() }
    }

    /// Some predicate depends on the context position or size.
    pub fn is_positional(&self) -> bool {
        self.preds.iter().any(|p| p.uses_position() || p.uses_last() || p.may_be_number())
    }

    /// Name test on the child or descendant axis without predicates.
    pub fn simple_name(&self) -> Option<&str> {
        match self.axis {
            Axis::Child | Axis::Descendant if self.preds.is_empty() => self.test.local_name(),
            _ => None,
        }
    }

    pub fn inline(&self, env: &HashMap<CompactString, Expr>) -> Step {
        self.with_preds(self.preds.iter().map(|p| p.inline(env)).collect())
    }

    /// All nodes this step selects from `pre`, in axis order.
    pub fn select<S: NodeStore + ?Sized>(&self, ctx: &EvalContext<'_, S>, pre: usize) -> Result<Vec<NodeRef>, Error> {
        let mut it = StepIter::new();
        it.reset(self, ctx.store(), pre);
        let mut out = Vec::new();
        while let Some(n) = it.next(self, ctx)? {
            out.push(n);
        }
        Ok(out)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.axis, self.test)?;
        for p in &self.preds {
            write!(f, "[{p}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    NotStarted,
    Started,
    Exhausted,
}

/// Reusable evaluation state of one step activation.
///
/// The step itself is passed on every call, so the same state can be re-seeded
/// with [`StepIter::reset`] for the next context node without allocating.
#[derive(Debug, Clone)]
pub struct StepIter {
    cursor: AxisCursor,
    state: IterState,
    counters: SmallVec<[u64; 4]>,
    stopped: bool,
    held: Option<NodeRef>,
    buf: Vec<NodeRef>,
    buf_pos: usize,
    pulled: usize,
}

impl Default for StepIter {
    fn default() -> Self {
        Self::new()
    }
}

impl StepIter {
    pub fn new() -> Self {
        Self {
            cursor: AxisCursor::Done,
            state: IterState::Exhausted,
            counters: SmallVec::new(),
            stopped: false,
            held: None,
            buf: Vec::new(),
            buf_pos: 0,
            pulled: 0,
        }
    }

    pub fn reset<S: NodeStore + ?Sized>(&mut self, step: &Step, store: &S, pre: usize) {
        self.cursor.reset(step.axis, store, pre);
        self.state = IterState::NotStarted;
        self.counters.clear();
        self.counters.resize(step.preds.len(), 0);
        self.stopped = false;
        self.held = None;
        self.buf.clear();
        self.buf_pos = 0;
        self.pulled = 0;
    }

    /// Number of nodes taken from the axis since the last reset.
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    pub fn next<S: NodeStore + ?Sized>(&mut self, step: &Step, ctx: &EvalContext<'_, S>) -> Result<Option<NodeRef>, Error> {
        ctx.check_cancel()?;
        match self.state {
            IterState::Exhausted => return Ok(None),
            IterState::NotStarted => {
                if let Some(p) = step.test.unresolved_prefix() {
                    self.state = IterState::Exhausted;
                    return Err(test::unresolved(p).with_context(step));
                }
                self.state = IterState::Started;
            }
            IterState::Started => {}
        }
        let res = match step.mode {
            StepMode::Plain => self.next_plain(step, ctx),
            StepMode::Positional => self.next_positional(step, ctx),
            StepMode::Buffered => self.next_buffered(step, ctx),
        };
        match res {
            Ok(None) | Err(_) => self.state = IterState::Exhausted,
            Ok(Some(_)) => {}
        }
        res.map_err(|e| e.with_context(step))
    }

    fn pull<S: NodeStore + ?Sized>(&mut self, step: &Step, store: &S) -> Option<usize> {
        loop {
            let pre = self.cursor.next(store)?;
            self.pulled += 1;
            if step.test.matches(store, pre) {
                return Some(pre);
            }
        }
    }

    fn next_plain<S: NodeStore + ?Sized>(&mut self, step: &Step, ctx: &EvalContext<'_, S>) -> Result<Option<NodeRef>, Error> {
        'nodes: while let Some(pre) = self.pull(step, ctx.store()) {
            let mut node = NodeRef::new(pre);
            for p in &step.preds {
                let (ok, score) = eval::predicate(p, ctx, &Focus::new(Item::Node(node)))?;
                if !ok {
                    continue 'nodes;
                }
                node = node.with_score(score);
            }
            return Ok(Some(node));
        }
        Ok(None)
    }

    fn next_positional<S: NodeStore + ?Sized>(
        &mut self,
        step: &Step,
        ctx: &EvalContext<'_, S>,
    ) -> Result<Option<NodeRef>, Error> {
        'nodes: loop {
            if self.stopped {
                return Ok(self.held.take());
            }
            let Some(pre) = self.pull(step, ctx.store()) else {
                return Ok(self.held.take());
            };
            let mut node = NodeRef::new(pre);
            for (i, p) in step.preds.iter().enumerate() {
                match step.kinds[i] {
                    PredKind::Range(r) => {
                        self.counters[i] += 1;
                        let c = self.counters[i];
                        if c >= r.max {
                            self.stopped = true;
                        }
                        if !r.contains(c) {
                            continue 'nodes;
                        }
                    }
                    PredKind::Last => {
                        self.held = Some(node);
                        continue 'nodes;
                    }
                    PredKind::Plain => {
                        let (ok, score) = eval::predicate(p, ctx, &Focus::new(Item::Node(node)))?;
                        if !ok {
                            continue 'nodes;
                        }
                        node = node.with_score(score);
                    }
                }
            }
            return Ok(Some(node));
        }
    }

    fn next_buffered<S: NodeStore + ?Sized>(
        &mut self,
        step: &Step,
        ctx: &EvalContext<'_, S>,
    ) -> Result<Option<NodeRef>, Error> {
        if self.buf_pos == 0 && self.buf.is_empty() {
            while let Some(pre) = self.pull(step, ctx.store()) {
                ctx.check_cancel()?;
                self.buf.push(NodeRef::new(pre));
            }
            for p in &step.preds {
                let size = self.buf.len();
                let mut w = 0;
                for r in 0..size {
                    ctx.check_cancel()?;
                    let node = self.buf[r];
                    let (ok, score) = eval::predicate(p, ctx, &Focus::at(Item::Node(node), r + 1, size))?;
                    if ok {
                        self.buf[w] = node.with_score(score);
                        w += 1;
                    }
                }
                self.buf.truncate(w);
            }
        }
        let out = self.buf.get(self.buf_pos).copied();
        self.buf_pos += 1;
        Ok(out)
    }
}
