use compact_str::CompactString;
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::NodeRef;
use crate::path::CompiledPath;
use crate::step::Step;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(NodeRef),
    Str(CompactString),
    Num(f64),
    Bool(bool),
}

impl Item {
    pub fn node(pre: usize) -> Self {
        Item::Node(NodeRef::new(pre))
    }

    pub fn as_node(&self) -> Option<NodeRef> {
        match self {
            Item::Node(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }
}

impl From<NodeRef> for Item {
    fn from(n: NodeRef) -> Self {
        Item::Node(n)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Node(n) => write!(f, "node#{}", n.pre),
            Item::Str(s) => write!(f, "\"{s}\""),
            Item::Num(n) => write!(f, "{n}"),
            Item::Bool(b) => write!(f, "{b}()"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Operator with swapped operands (`a < b` is `b > a`).
    pub fn swap(self) -> CompareOp {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    String,
    Count,
    Name,
    LocalName,
    Boolean,
    True,
    False,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::String => "string",
            Builtin::Count => "count",
            Builtin::Name => "name",
            Builtin::LocalName => "local-name",
            Builtin::Boolean => "boolean",
            Builtin::True => "true",
            Builtin::False => "false",
        }
    }
}

/// Expressions that may appear as path roots, predicates and map stages.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `.`
    Context,
    /// `/`: root of the tree holding the context node.
    Root,
    Literal(Item),
    /// Constant node sequence in document order.
    Nodes(Vec<NodeRef>),
    Var(CompactString),
    Position,
    Last,
    Path(Box<PathExpr>),
    Compiled(Arc<CompiledPath>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Full-text containment: `expr contains text "token"`; yields a relevance score.
    Contains(Box<Expr>, CompactString),
    Call(Builtin, Vec<Expr>),
    Sequence(Vec<Expr>),
}

impl Expr {
    pub fn num(n: f64) -> Self {
        Expr::Literal(Item::Num(n))
    }
    pub fn str(s: &str) -> Self {
        Expr::Literal(Item::Str(s.into()))
    }
    pub fn boolean(b: bool) -> Self {
        Expr::Literal(Item::Bool(b))
    }
    pub fn var(name: &str) -> Self {
        Expr::Var(name.into())
    }
    pub fn path(path: PathExpr) -> Self {
        Expr::Path(Box::new(path))
    }
    pub fn compare(op: CompareOp, l: Expr, r: Expr) -> Self {
        Expr::Compare(op, Box::new(l), Box::new(r))
    }
    pub fn not(e: Expr) -> Self {
        Expr::Not(Box::new(e))
    }
    pub fn contains(e: Expr, token: &str) -> Self {
        Expr::Contains(Box::new(e), token.into())
    }
    /// `position() op n`
    pub fn position_cmp(op: CompareOp, n: f64) -> Self {
        Expr::compare(op, Expr::Position, Expr::num(n))
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Compare(_, l, r) | Expr::Arith(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                vec![l.as_ref(), r.as_ref()]
            }
            Expr::Not(e) | Expr::Contains(e, _) => vec![e.as_ref()],
            Expr::Call(_, args) | Expr::Sequence(args) => args.iter().collect(),
            Expr::Path(p) => p.root.iter().chain(p.steps.iter().filter_map(PathStep::expr)).collect(),
            _ => Vec::new(),
        }
    }

    /// Reads `position()` of the current focus.
    pub fn uses_position(&self) -> bool {
        match self {
            Expr::Position => true,
            // stages of a nested path get their own focus
            Expr::Path(p) => p.root.as_ref().is_some_and(Expr::uses_position),
            _ => self.children().into_iter().any(Expr::uses_position),
        }
    }

    /// Reads `last()` of the current focus.
    pub fn uses_last(&self) -> bool {
        match self {
            Expr::Last => true,
            Expr::Path(p) => p.root.as_ref().is_some_and(Expr::uses_last),
            _ => self.children().into_iter().any(Expr::uses_last),
        }
    }

    /// Depends on the focus in any way.
    pub fn uses_focus(&self) -> bool {
        match self {
            Expr::Context | Expr::Root | Expr::Position | Expr::Last => true,
            Expr::Path(p) => p.root.as_ref().is_none_or(Expr::uses_focus),
            Expr::Compiled(c) => c.uses_focus(),
            Expr::Call(Builtin::String | Builtin::Name | Builtin::LocalName, args) if args.is_empty() => true,
            _ => self.children().into_iter().any(Expr::uses_focus),
        }
    }

    /// Reads a variable binding of the dynamic context, here or in a nested path.
    pub fn uses_vars(&self) -> bool {
        match self {
            Expr::Var(_) => true,
            Expr::Path(p) => p.uses_vars(),
            Expr::Compiled(c) => c.uses_vars(),
            _ => self.children().into_iter().any(Expr::uses_vars),
        }
    }

    /// The value might be numeric, which turns a predicate into a position test.
    pub fn may_be_number(&self) -> bool {
        match self {
            Expr::Literal(Item::Num(_)) | Expr::Position | Expr::Last | Expr::Arith(..) | Expr::Var(_) => true,
            Expr::Call(Builtin::Count, _) => true,
            Expr::Sequence(items) => items.len() == 1 && items[0].may_be_number(),
            _ => false,
        }
    }

    /// Produces a full-text relevance score.
    pub fn has_score(&self) -> bool {
        match self {
            Expr::Contains(..) => true,
            Expr::And(l, r) | Expr::Or(l, r) => l.has_score() || r.has_score(),
            _ => false,
        }
    }

    /// Yields the same value on every evaluation.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Nodes(_) => true,
            Expr::Call(Builtin::True | Builtin::False, _) => true,
            Expr::Sequence(items) => items.iter().all(Expr::is_constant),
            _ => false,
        }
    }

    /// Constant value of this predicate, if statically known.
    pub fn constant_truth(&self) -> Option<bool> {
        match self {
            Expr::Literal(Item::Bool(b)) => Some(*b),
            Expr::Literal(Item::Str(s)) => Some(!s.is_empty()),
            Expr::Call(Builtin::True, _) => Some(true),
            Expr::Call(Builtin::False, _) => Some(false),
            Expr::Nodes(n) => Some(!n.is_empty()),
            Expr::Sequence(items) if items.is_empty() => Some(false),
            Expr::Not(e) => e.constant_truth().map(|b| !b),
            _ => None,
        }
    }

    /// Copy of this expression with variables replaced by the bound expressions.
    ///
    /// Compiled sub-paths are shared, not copied; inline before compiling.
    pub fn inline(&self, env: &HashMap<CompactString, Expr>) -> Expr {
        let bx = |e: &Expr| Box::new(e.inline(env));
        match self {
            Expr::Var(name) => env.get(name).cloned().unwrap_or_else(|| self.clone()),
            Expr::Path(p) => Expr::Path(Box::new(p.inline(env))),
            Expr::Compare(op, l, r) => Expr::Compare(*op, bx(l), bx(r)),
            Expr::Arith(op, l, r) => Expr::Arith(*op, bx(l), bx(r)),
            Expr::And(l, r) => Expr::And(bx(l), bx(r)),
            Expr::Or(l, r) => Expr::Or(bx(l), bx(r)),
            Expr::Not(e) => Expr::Not(bx(e)),
            Expr::Contains(e, t) => Expr::Contains(bx(e), t.clone()),
            Expr::Call(f, args) => Expr::Call(*f, args.iter().map(|a| a.inline(env)).collect()),
            Expr::Sequence(items) => Expr::Sequence(items.iter().map(|a| a.inline(env)).collect()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Context => f.write_str("."),
            Expr::Root => f.write_str("/"),
            Expr::Literal(i) => write!(f, "{i}"),
            Expr::Nodes(n) => write!(f, "nodes({})", n.len()),
            Expr::Var(v) => write!(f, "${v}"),
            Expr::Position => f.write_str("position()"),
            Expr::Last => f.write_str("last()"),
            Expr::Path(p) => write!(f, "{p}"),
            Expr::Compiled(c) => write!(f, "{c}"),
            Expr::Compare(op, l, r) => write!(f, "{l} {} {r}", op.symbol()),
            Expr::Arith(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::And(l, r) => write!(f, "({l} and {r})"),
            Expr::Or(l, r) => write!(f, "({l} or {r})"),
            Expr::Not(e) => write!(f, "not({e})"),
            Expr::Contains(e, t) => write!(f, "{e} contains text \"{t}\""),
            Expr::Call(b, args) => {
                write!(f, "{}(", b.name())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Expr::Sequence(items) => {
                f.write_str("(")?;
                for (i, a) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One stage of a location path.
#[derive(Debug, Clone)]
pub enum PathStep {
    Axis(Step),
    /// `/expr`: expression evaluated with each node as context.
    Slash(Expr),
    /// `!expr`: simple map stage; items need not be nodes.
    Bang(Expr),
}

impl PathStep {
    pub fn as_axis(&self) -> Option<&Step> {
        match self {
            PathStep::Axis(s) => Some(s),
            _ => None,
        }
    }

    fn expr(&self) -> Option<&Expr> {
        match self {
            PathStep::Axis(_) => None,
            PathStep::Slash(e) | PathStep::Bang(e) => Some(e),
        }
    }

    pub fn uses_vars(&self) -> bool {
        match self {
            PathStep::Axis(step) => step.preds.iter().any(Expr::uses_vars),
            PathStep::Slash(e) | PathStep::Bang(e) => e.uses_vars(),
        }
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Axis(s) => write!(f, "{s}"),
            PathStep::Slash(e) => write!(f, "{e}"),
            PathStep::Bang(e) => write!(f, "! {e}"),
        }
    }
}

impl From<Step> for PathStep {
    fn from(s: Step) -> Self {
        PathStep::Axis(s)
    }
}

/// Parsed location path: an optional root expression and its stages.
#[derive(Debug, Clone, Default)]
pub struct PathExpr {
    pub root: Option<Expr>,
    pub steps: Vec<PathStep>,
}

impl PathExpr {
    /// Relative path of axis steps.
    pub fn relative<I: IntoIterator<Item = Step>>(steps: I) -> Self {
        Self { root: None, steps: steps.into_iter().map(PathStep::Axis).collect() }
    }

    /// Path rooted at `/`.
    pub fn absolute<I: IntoIterator<Item = Step>>(steps: I) -> Self {
        Self { root: Some(Expr::Root), ..Self::relative(steps) }
    }

    pub fn with_root(mut self, root: Expr) -> Self {
        self.root = Some(root);
        self
    }

    pub fn then(mut self, stage: PathStep) -> Self {
        self.steps.push(stage);
        self
    }

    pub fn uses_vars(&self) -> bool {
        self.root.as_ref().is_some_and(Expr::uses_vars) || self.steps.iter().any(PathStep::uses_vars)
    }

    pub fn inline(&self, env: &HashMap<CompactString, Expr>) -> PathExpr {
        PathExpr {
            root: self.root.as_ref().map(|r| r.inline(env)),
            steps: self
                .steps
                .iter()
                .map(|s| match s {
                    PathStep::Axis(st) => PathStep::Axis(st.inline(env)),
                    PathStep::Slash(e) => PathStep::Slash(e.inline(env)),
                    PathStep::Bang(e) => PathStep::Bang(e.inline(env)),
                })
                .collect(),
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        match &self.root {
            Some(Expr::Root) => {
                f.write_str("/")?;
            }
            Some(r) => {
                write!(f, "{r}")?;
                first = false;
            }
            None => {}
        }
        for s in &self.steps {
            match s {
                PathStep::Axis(st) => {
                    if !first {
                        f.write_str("/")?;
                    }
                    write!(f, "{st}")?;
                }
                PathStep::Slash(e) => {
                    if !first {
                        f.write_str("/")?;
                    }
                    write!(f, "{e}")?;
                }
                PathStep::Bang(e) => write!(f, " ! {e}")?,
            }
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use crate::test::Test;

    #[test]
    fn inline_replaces_variables_inside_predicates() {
        let step = Step::new(Axis::Child, Test::element("b"))
            .with_preds(vec![Expr::compare(CompareOp::Eq, Expr::Context, Expr::var("v"))]);
        let path = PathExpr::relative([step]);
        let env = HashMap::from([(CompactString::from("v"), Expr::str("x"))]);
        let inlined = path.inline(&env);
        assert_eq!(inlined.to_string(), "child::b[. = \"x\"]");
        assert_eq!(path.to_string(), "child::b[. = $v]");
    }

    #[test]
    fn focus_classification() {
        assert!(Expr::Position.uses_position());
        assert!(!Expr::path(PathExpr::relative([Step::new(Axis::Child, Test::node())
            .with_preds(vec![Expr::Last])]))
        .uses_last());
        assert!(Expr::Call(Builtin::String, vec![]).uses_focus());
        assert!(Expr::num(2.0).may_be_number());
        assert_eq!(Expr::not(Expr::Call(Builtin::True, vec![])).constant_truth(), Some(false));
    }

    #[test]
    fn variables_are_found_in_nested_predicates() {
        let inner = Step::new(Axis::Attribute, Test::attribute("k"))
            .with_preds(vec![Expr::compare(CompareOp::Eq, Expr::Context, Expr::var("x"))]);
        let pred = Expr::path(PathExpr::relative([inner]));
        assert!(pred.uses_vars());
        assert!(Expr::not(Expr::var("x")).uses_vars());
        assert!(!Expr::path(PathExpr::relative([Step::new(Axis::Child, Test::node())])).uses_vars());
    }
}
