use smallvec::SmallVec;

use super::AxisPath;
use crate::error::Error;
use crate::eval::EvalContext;
use crate::expr::Item;
use crate::model::{NodeRef, NodeStore};
use crate::step::StepIter;

/// Streaming evaluation of a chain of steps.
///
/// One [`StepIter`] per level is allocated up front. `p` is the active level:
/// a hit on an inner level pushes the next level seeded with that node, an
/// exhausted level pops back to its parent.
///
/// For iterative paths every node at or before the last emitted one is a
/// duplicate and skipped. Other paths only skip adjacent duplicates and
/// keep the order in which the levels produce nodes.
pub struct StaircaseIter<'a, S: NodeStore + ?Sized> {
    path: &'a AxisPath,
    ctx: &'a EvalContext<'a, S>,
    roots: Vec<NodeRef>,
    next_root: usize,
    levels: SmallVec<[StepIter; 4]>,
    p: usize,
    active: bool,
    last: Option<usize>,
    monotone: bool,
    done: bool,
}

impl<'a, S: NodeStore + ?Sized> StaircaseIter<'a, S> {
    pub(super) fn new(path: &'a AxisPath, ctx: &'a EvalContext<'a, S>, roots: Vec<NodeRef>) -> Self {
        let levels = path.steps.iter().map(|_| StepIter::new()).collect();
        let monotone = path.is_iterative();
        Self { path, ctx, roots, next_root: 0, levels, p: 0, active: false, last: None, monotone, done: false }
    }

    /// Back to the first root; the per-level state is kept and re-seeded.
    pub fn reset(&mut self) {
        self.next_root = 0;
        self.p = 0;
        self.active = false;
        self.last = None;
        self.done = false;
    }

    fn advance(&mut self) -> Result<Option<NodeRef>, Error> {
        let path = self.path;
        let steps = &path.steps;
        if steps.is_empty() {
            let root = self.roots.get(self.next_root).copied();
            self.next_root += 1;
            return Ok(root);
        }
        let store = self.ctx.store();
        loop {
            if !self.active {
                let Some(root) = self.roots.get(self.next_root).copied() else { return Ok(None) };
                self.next_root += 1;
                self.p = 0;
                self.levels[0].reset(&steps[0], store, root.pre);
                self.active = true;
            }
            let p = self.p;
            match self.levels[p].next(&steps[p], self.ctx)? {
                None if p == 0 => self.active = false,
                None => self.p -= 1,
                Some(n) if p + 1 == steps.len() => {
                    let seen = match self.last {
                        Some(last) if self.monotone => n.pre <= last,
                        Some(last) => n.pre == last,
                        None => false,
                    };
                    if seen {
                        continue;
                    }
                    self.last = Some(n.pre);
                    return Ok(Some(n));
                }
                Some(n) => {
                    self.p += 1;
                    self.levels[p + 1].reset(&steps[p + 1], store, n.pre);
                }
            }
        }
    }
}

impl<S: NodeStore + ?Sized> Iterator for StaircaseIter<'_, S> {
    type Item = Result<Item, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(n)) => Some(Ok(Item::Node(n))),
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
