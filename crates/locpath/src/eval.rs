//! Evaluation of the expressions that appear inside predicates and map stages.
//!
//! This is deliberately small: general comparisons, a few arithmetic
//! operators, boolean connectives, full-text containment with a relevance
//! score and a handful of builtin functions. Nested paths are delegated to
//! [`CompiledPath`].
use compact_str::CompactString;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, ErrorCode};
use crate::expr::{ArithOp, Builtin, CompareOp, Expr, Item};
use crate::model::{NodeKind, NodeStore};
use crate::path::CompiledPath;

/// Context item together with its position and the size of the sequence it was taken from.
#[derive(Debug, Clone)]
pub struct Focus {
    pub item: Item,
    pub pos: usize,
    pub size: usize,
}

impl Focus {
    pub fn new(item: Item) -> Self {
        Self { item, pos: 1, size: 1 }
    }

    pub fn at(item: Item, pos: usize, size: usize) -> Self {
        Self { item, pos, size }
    }
}

/// Dynamic configuration of one evaluation.
pub struct EvalContext<'a, S: ?Sized> {
    store: &'a S,
    context_item: Option<Item>,
    variables: HashMap<CompactString, Vec<Item>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, S: NodeStore + ?Sized> EvalContext<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store, context_item: None, variables: HashMap::new(), cancel: None }
    }

    pub fn builder(store: &'a S) -> EvalContextBuilder<'a, S> {
        EvalContextBuilder::new(store)
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn context_item(&self) -> Option<&Item> {
        self.context_item.as_ref()
    }

    pub fn variable(&self, name: &str) -> Option<&[Item]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    /// Cooperative cancellation point.
    #[inline]
    pub fn check_cancel(&self) -> Result<(), Error> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

pub struct EvalContextBuilder<'a, S: ?Sized> {
    ctx: EvalContext<'a, S>,
}

impl<'a, S: NodeStore + ?Sized> EvalContextBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { ctx: EvalContext::new(store) }
    }

    pub fn with_context_item(mut self, item: impl Into<Item>) -> Self {
        self.ctx.context_item = Some(item.into());
        self
    }

    pub fn with_variable(mut self, name: &str, value: Vec<Item>) -> Self {
        self.ctx.variables.insert(name.into(), value);
        self
    }

    /// Abort the evaluation with [`Error::Cancelled`] once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.ctx.cancel = Some(flag);
        self
    }

    pub fn build(self) -> EvalContext<'a, S> {
        self.ctx
    }
}

pub fn eval<S: NodeStore + ?Sized>(
    expr: &Expr,
    ctx: &EvalContext<'_, S>,
    focus: Option<&Focus>,
) -> Result<Vec<Item>, Error> {
    let focus_item = || focus.map(|f| &f.item).ok_or_else(Error::no_context);
    Ok(match expr {
        Expr::Context => vec![focus_item()?.clone()],
        Expr::Root => match focus_item()? {
            Item::Node(n) => vec![Item::node(ctx.store().root_of(n.pre))],
            other => return Err(context_not_node(other)),
        },
        Expr::Literal(i) => vec![i.clone()],
        Expr::Nodes(nodes) => nodes.iter().copied().map(Item::Node).collect(),
        Expr::Var(name) => ctx
            .variable(name)
            .ok_or_else(|| Error::from_code(ErrorCode::XPST0008, format!("undeclared variable ${name}")))?
            .to_vec(),
        Expr::Position => vec![Item::Num(focus.ok_or_else(Error::no_context)?.pos as f64)],
        Expr::Last => vec![Item::Num(focus.ok_or_else(Error::no_context)?.size as f64)],
        Expr::Path(p) => {
            let compiled = CompiledPath::unoptimized(p);
            compiled.evaluate_with(ctx, focus.map(|f| f.item.clone()))?.collect::<Result<_, _>>()?
        }
        Expr::Compiled(c) => c.evaluate_with(ctx, focus.map(|f| f.item.clone()))?.collect::<Result<_, _>>()?,
        Expr::Compare(op, l, r) => {
            let l = atomize(ctx, eval(l, ctx, focus)?);
            let r = atomize(ctx, eval(r, ctx, focus)?);
            vec![Item::Bool(general_compare(*op, &l, &r))]
        }
        Expr::Arith(op, l, r) => {
            let l = single_number(ctx, eval(l, ctx, focus)?)?;
            let r = single_number(ctx, eval(r, ctx, focus)?)?;
            match (l, r) {
                (Some(l), Some(r)) => vec![Item::Num(arith(*op, l, r))],
                _ => Vec::new(),
            }
        }
        Expr::And(..) | Expr::Or(..) | Expr::Not(_) | Expr::Contains(..) => {
            vec![Item::Bool(scored(expr, ctx, focus)?.0)]
        }
        Expr::Call(f, args) => call(*f, args, ctx, focus)?,
        Expr::Sequence(items) => {
            let mut out = Vec::new();
            for e in items {
                out.extend(eval(e, ctx, focus)?);
            }
            out
        }
    })
}

/// Truth of a predicate for the given focus, plus the relevance score it assigns.
///
/// A single numeric result is compared with the context position; anything
/// else goes through the effective boolean value.
pub fn predicate<S: NodeStore + ?Sized>(
    expr: &Expr,
    ctx: &EvalContext<'_, S>,
    focus: &Focus,
) -> Result<(bool, Option<f64>), Error> {
    if expr.has_score() || matches!(expr, Expr::Not(_)) {
        return scored(expr, ctx, Some(focus));
    }
    let items = eval(expr, ctx, Some(focus))?;
    if let [Item::Num(n)] = items.as_slice() {
        return Ok((*n == focus.pos as f64, None));
    }
    Ok((ebv(&items)?, None))
}

fn scored<S: NodeStore + ?Sized>(
    expr: &Expr,
    ctx: &EvalContext<'_, S>,
    focus: Option<&Focus>,
) -> Result<(bool, Option<f64>), Error> {
    match expr {
        Expr::Contains(e, token) => {
            let items = eval(e, ctx, focus)?;
            let mut best: Option<f64> = None;
            for it in atomize(ctx, items) {
                if let Some(s) = text_score(&string_of(&it), token) {
                    best = Some(best.map_or(s, |b| b.max(s)));
                }
            }
            Ok((best.is_some(), best))
        }
        Expr::And(l, r) => {
            let (a, sa) = scored(l, ctx, focus)?;
            if !a {
                return Ok((false, None));
            }
            let (b, sb) = scored(r, ctx, focus)?;
            let score = match (sa, sb) {
                (Some(x), Some(y)) => Some((x + y) / 2.0),
                (x, y) => x.or(y),
            };
            Ok((b, score.filter(|_| b)))
        }
        Expr::Or(l, r) => {
            let (a, sa) = scored(l, ctx, focus)?;
            let (b, sb) = if a && sa.is_none() { (false, None) } else { scored(r, ctx, focus)? };
            let score = match (sa, sb) {
                (Some(x), Some(y)) => Some(x.max(y)),
                (x, y) => x.or(y),
            };
            Ok((a || b, score))
        }
        Expr::Not(e) => Ok((!scored(e, ctx, focus)?.0, None)),
        other => Ok((ebv(&eval(other, ctx, focus)?)?, None)),
    }
}

/// Effective boolean value.
pub fn ebv(items: &[Item]) -> Result<bool, Error> {
    match items {
        [] => Ok(false),
        [Item::Node(_), ..] => Ok(true),
        [Item::Bool(b)] => Ok(*b),
        [Item::Str(s)] => Ok(!s.is_empty()),
        [Item::Num(n)] => Ok(*n != 0.0 && !n.is_nan()),
        _ => Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a sequence of several atomic values",
        )),
    }
}

fn context_not_node(item: &Item) -> Error {
    Error::from_code(ErrorCode::XPTY0020, format!("context item {item} is not a node"))
}

fn atomize<S: NodeStore + ?Sized>(ctx: &EvalContext<'_, S>, items: Vec<Item>) -> Vec<Item> {
    items
        .into_iter()
        .map(|it| match it {
            Item::Node(n) => Item::Str(ctx.store().string_value(n.pre).into()),
            other => other,
        })
        .collect()
}

fn string_of(item: &Item) -> CompactString {
    match item {
        Item::Str(s) => s.clone(),
        Item::Num(n) => format_number(*n).into(),
        Item::Bool(b) => CompactString::from(if *b { "true" } else { "false" }),
        Item::Node(n) => n.pre.to_string().into(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() { format!("{}", n as i64) } else { n.to_string() }
}

fn number_of(item: &Item) -> f64 {
    match item {
        Item::Num(n) => *n,
        Item::Bool(b) => f64::from(u8::from(*b)),
        Item::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        Item::Node(_) => f64::NAN,
    }
}

fn single_number<S: NodeStore + ?Sized>(ctx: &EvalContext<'_, S>, items: Vec<Item>) -> Result<Option<f64>, Error> {
    match atomize(ctx, items).as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(number_of(one))),
        _ => Err(Error::from_code(ErrorCode::XPTY0004, "arithmetic operand is a sequence of several items")),
    }
}

fn arith(op: ArithOp, l: f64, r: f64) -> f64 {
    match op {
        ArithOp::Add => l + r,
        ArithOp::Sub => l - r,
        ArithOp::Mul => l * r,
        ArithOp::Div => l / r,
        ArithOp::Mod => l % r,
    }
}

fn general_compare(op: CompareOp, l: &[Item], r: &[Item]) -> bool {
    l.iter().any(|a| r.iter().any(|b| compare_atomic(op, a, b)))
}

fn compare_atomic(op: CompareOp, a: &Item, b: &Item) -> bool {
    use core::cmp::Ordering as O;
    let ord = match (a, b) {
        (Item::Bool(_), _) | (_, Item::Bool(_)) => {
            let x = ebv(core::slice::from_ref(a)).unwrap_or(false);
            let y = ebv(core::slice::from_ref(b)).unwrap_or(false);
            Some(x.cmp(&y))
        }
        (Item::Num(_), _) | (_, Item::Num(_)) => number_of(a).partial_cmp(&number_of(b)),
        _ => Some(string_of(a).cmp(&string_of(b))),
    };
    match ord {
        None => op == CompareOp::Ne,
        Some(o) => match op {
            CompareOp::Eq => o == O::Equal,
            CompareOp::Ne => o != O::Equal,
            CompareOp::Lt => o == O::Less,
            CompareOp::Le => o != O::Greater,
            CompareOp::Gt => o == O::Greater,
            CompareOp::Ge => o != O::Less,
        },
    }
}

/// Share of the words in `text` equal to `token`, ignoring case.
fn text_score(text: &str, token: &str) -> Option<f64> {
    let token = token.to_lowercase();
    let mut words = 0usize;
    let mut hits = 0usize;
    for w in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        words += 1;
        if w.to_lowercase() == token {
            hits += 1;
        }
    }
    (hits > 0).then(|| hits as f64 / words as f64)
}

fn call<S: NodeStore + ?Sized>(
    f: Builtin,
    args: &[Expr],
    ctx: &EvalContext<'_, S>,
    focus: Option<&Focus>,
) -> Result<Vec<Item>, Error> {
    // Zero-argument forms operate on the context item
    let arg = |i: usize| -> Result<Vec<Item>, Error> {
        match args.get(i) {
            Some(e) => eval(e, ctx, focus),
            None => Ok(vec![focus.ok_or_else(Error::no_context)?.item.clone()]),
        }
    };
    Ok(match f {
        Builtin::True => vec![Item::Bool(true)],
        Builtin::False => vec![Item::Bool(false)],
        Builtin::Boolean => vec![Item::Bool(ebv(&arg(0)?)?)],
        Builtin::Count => vec![Item::Num(arg(0)?.len() as f64)],
        Builtin::String => {
            let s = atomize(ctx, arg(0)?).first().map(string_of).unwrap_or_default();
            vec![Item::Str(s)]
        }
        Builtin::Name | Builtin::LocalName => {
            let items = arg(0)?;
            let name = match items.first() {
                None => "",
                Some(Item::Node(n)) => match ctx.store().kind(n.pre) {
                    NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction => {
                        ctx.store().name(n.pre).unwrap_or_default()
                    }
                    _ => "",
                },
                Some(other) => {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        format!("{}() expects a node, found {other}", f.name()),
                    ));
                }
            };
            vec![Item::Str(name.into())]
        }
    })
}
