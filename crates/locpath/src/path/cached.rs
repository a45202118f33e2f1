use itertools::Itertools;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use super::{AxisPath, root_nodes};
use crate::error::Error;
use crate::eval::EvalContext;
use crate::expr::{Expr, Item};
use crate::model::{NodeRef, NodeStore};
use crate::step::{Step, StepIter};

// (store address, store generation)
type MemoKey = (usize, u64);

/// Materializing evaluation: depth-first over every root, then sort and dedup.
///
/// When the path is invariant the sorted result is kept per store generation.
#[derive(Debug)]
pub struct CachedPath {
    pub path: AxisPath,
    memo: Option<Mutex<LruCache<MemoKey, Arc<[NodeRef]>>>>,
}

impl CachedPath {
    /// `memo` is the number of results to keep; only used when the root is
    /// constant and no predicate reads a variable.
    pub fn new(path: AxisPath, memo: Option<NonZeroUsize>) -> Self {
        let frozen = path.root.as_ref().is_some_and(Expr::is_constant)
            && !path.steps.iter().any(|s| s.preds.iter().any(Expr::uses_vars));
        let memo = memo.filter(|_| frozen).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { path, memo }
    }

    pub fn is_memoized(&self) -> bool {
        self.memo.is_some()
    }

    pub(super) fn evaluate<S: NodeStore + ?Sized>(
        &self,
        ctx: &EvalContext<'_, S>,
        context: Option<Item>,
    ) -> Result<Vec<NodeRef>, Error> {
        let store = ctx.store();
        let key: MemoKey = (store as *const S as *const () as usize, store.generation());
        if let Some(memo) = &self.memo
            && let Ok(mut m) = memo.lock()
            && let Some(hit) = m.get(&key)
        {
            tracing::trace!(generation = key.1, "memoized path result");
            return Ok(hit.to_vec());
        }

        let roots = root_nodes(self.path.root.as_ref(), ctx, context)?;
        let mut iters: Vec<StepIter> = (0..self.path.steps.len()).map(|_| StepIter::new()).collect();
        let mut out = Vec::new();
        for root in roots {
            collect(&self.path.steps, &mut iters, ctx, root, &mut out)?;
        }
        let out: Vec<NodeRef> = out.into_iter().sorted_by_key(|n| n.pre).dedup().collect();

        if let Some(memo) = &self.memo
            && let Ok(mut m) = memo.lock()
        {
            m.put(key, Arc::from(out.as_slice()));
        }
        Ok(out)
    }
}

fn collect<S: NodeStore + ?Sized>(
    steps: &[Step],
    iters: &mut [StepIter],
    ctx: &EvalContext<'_, S>,
    node: NodeRef,
    out: &mut Vec<NodeRef>,
) -> Result<(), Error> {
    let (Some((step, rest)), Some((it, deeper))) = (steps.split_first(), iters.split_first_mut()) else {
        out.push(node);
        return Ok(());
    };
    it.reset(step, ctx.store(), node.pre);
    while let Some(n) = it.next(step, ctx)? {
        if rest.is_empty() {
            out.push(n);
        } else {
            collect(rest, deeper, ctx, n, out)?;
        }
    }
    Ok(())
}
