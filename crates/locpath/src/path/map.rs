use smallvec::SmallVec;

use super::{PathIter, root_items};
use crate::error::Error;
use crate::eval::{self, EvalContext, Focus};
use crate::expr::{Expr, Item, PathStep};
use crate::model::{NodeRef, NodeStore};
use crate::step::StepIter;

/// Stages that may yield arbitrary items. Results keep their production
/// order and are never deduplicated.
#[derive(Debug, Clone)]
pub struct MapPath {
    pub root: Option<Expr>,
    pub stages: Vec<PathStep>,
    /// Some stage expression reads `position()` or `last()`.
    positional: bool,
}

impl MapPath {
    pub fn new(root: Option<Expr>, stages: Vec<PathStep>) -> Self {
        let positional = stages.iter().any(|s| match s {
            PathStep::Axis(_) => false,
            PathStep::Slash(e) | PathStep::Bang(e) => e.uses_position() || e.uses_last(),
        });
        Self { root, stages, positional }
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    pub(super) fn evaluate<'a, S: NodeStore + ?Sized>(
        &'a self,
        ctx: &'a EvalContext<'a, S>,
        context: Option<Item>,
    ) -> Result<PathIter<'a, S>, Error> {
        let roots = root_items(self.root.as_ref(), ctx, context)?;
        if !self.positional {
            return Ok(PathIter::Map(MapIter::new(self, ctx, roots)));
        }
        // every stage sees the full (position, size) of its input
        let mut items = roots;
        for stage in &self.stages {
            let size = items.len();
            let mut next = Vec::new();
            for (i, it) in items.into_iter().enumerate() {
                ctx.check_cancel()?;
                apply(stage, ctx, &Focus::at(it, i + 1, size), &mut next)?;
            }
            let mut seen = None;
            for it in &next {
                check_mixed(stage, it, &mut seen)?;
            }
            items = next;
        }
        Ok(PathIter::Items { items, pos: 0 })
    }
}

fn input_node(stage: &PathStep, item: &Item) -> Result<NodeRef, Error> {
    item.as_node().ok_or_else(|| Error::not_a_node(item).with_context(stage))
}

/// Results of one stage for one input item, in document order for axis stages.
fn apply<S: NodeStore + ?Sized>(
    stage: &PathStep,
    ctx: &EvalContext<'_, S>,
    focus: &Focus,
    out: &mut Vec<Item>,
) -> Result<(), Error> {
    match stage {
        PathStep::Axis(step) => {
            let n = input_node(stage, &focus.item)?;
            let mut nodes = step.select(ctx, n.pre)?;
            if step.axis.is_reverse() {
                nodes.reverse();
            }
            out.extend(nodes.into_iter().map(Item::Node));
        }
        PathStep::Slash(e) => {
            input_node(stage, &focus.item)?;
            out.extend(eval::eval(e, ctx, Some(focus)).map_err(|err| err.with_context(stage))?);
        }
        PathStep::Bang(e) => {
            out.extend(eval::eval(e, ctx, Some(focus)).map_err(|err| err.with_context(stage))?);
        }
    }
    Ok(())
}

// Bang stages may mix nodes and atomic values, the others may not.
fn check_mixed(stage: &PathStep, item: &Item, seen: &mut Option<bool>) -> Result<(), Error> {
    if matches!(stage, PathStep::Bang(_)) {
        return Ok(());
    }
    match *seen {
        None => *seen = Some(item.is_node()),
        Some(nodes) if nodes != item.is_node() => return Err(Error::mixed_path().with_context(stage)),
        Some(_) => {}
    }
    Ok(())
}

enum StageState {
    Axis(StepIter),
    Items { items: Vec<Item>, pos: usize },
}

/// Lazy form of the map pipeline: one state per stage, pushed and popped
/// like the staircase join but without duplicate elimination.
pub struct MapIter<'a, S: NodeStore + ?Sized> {
    path: &'a MapPath,
    ctx: &'a EvalContext<'a, S>,
    roots: Vec<Item>,
    next_root: usize,
    levels: Vec<StageState>,
    seen: SmallVec<[Option<bool>; 4]>,
    p: usize,
    active: bool,
    done: bool,
}

impl<'a, S: NodeStore + ?Sized> MapIter<'a, S> {
    fn new(path: &'a MapPath, ctx: &'a EvalContext<'a, S>, roots: Vec<Item>) -> Self {
        let levels = path
            .stages
            .iter()
            .map(|s| match s {
                // reverse axes are collected so they can be emitted in document order
                PathStep::Axis(step) if !step.axis.is_reverse() => StageState::Axis(StepIter::new()),
                _ => StageState::Items { items: Vec::new(), pos: 0 },
            })
            .collect();
        let seen = path.stages.iter().map(|_| None).collect();
        Self { path, ctx, roots, next_root: 0, levels, seen, p: 0, active: false, done: false }
    }

    pub fn reset(&mut self) {
        self.next_root = 0;
        self.p = 0;
        self.active = false;
        self.done = false;
        self.seen.iter_mut().for_each(|s| *s = None);
    }

    fn open(&mut self, level: usize, item: Item) -> Result<(), Error> {
        let path = self.path;
        let stage = &path.stages[level];
        match (stage, &mut self.levels[level]) {
            (PathStep::Axis(step), StageState::Axis(it)) => {
                let n = input_node(stage, &item)?;
                it.reset(step, self.ctx.store(), n.pre);
            }
            (_, StageState::Items { items, pos }) => {
                items.clear();
                *pos = 0;
                apply(stage, self.ctx, &Focus::new(item), items)?;
            }
            (_, StageState::Axis(_)) => unreachable!("axis state is only created for axis stages"),
        }
        Ok(())
    }

    fn pull(&mut self, level: usize) -> Result<Option<Item>, Error> {
        let path = self.path;
        let stage = &path.stages[level];
        let item = match (stage, &mut self.levels[level]) {
            (PathStep::Axis(step), StageState::Axis(it)) => it.next(step, self.ctx)?.map(Item::Node),
            (_, StageState::Items { items, pos }) => {
                self.ctx.check_cancel()?;
                let it = items.get(*pos).cloned();
                *pos += 1;
                it
            }
            (_, StageState::Axis(_)) => unreachable!("axis state is only created for axis stages"),
        };
        if let Some(it) = &item {
            check_mixed(stage, it, &mut self.seen[level])?;
        }
        Ok(item)
    }

    fn advance(&mut self) -> Result<Option<Item>, Error> {
        let n = self.path.stages.len();
        if n == 0 {
            let root = self.roots.get(self.next_root).cloned();
            self.next_root += 1;
            return Ok(root);
        }
        loop {
            if !self.active {
                let Some(root) = self.roots.get(self.next_root).cloned() else { return Ok(None) };
                self.next_root += 1;
                self.p = 0;
                self.open(0, root)?;
                self.active = true;
            }
            let p = self.p;
            match self.pull(p)? {
                None if p == 0 => self.active = false,
                None => self.p -= 1,
                Some(it) if p + 1 == n => return Ok(Some(it)),
                Some(it) => {
                    self.open(p + 1, it)?;
                    self.p += 1;
                }
            }
        }
    }
}

impl<S: NodeStore + ?Sized> Iterator for MapIter<'_, S> {
    type Item = Result<Item, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(it)) => Some(Ok(it)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
