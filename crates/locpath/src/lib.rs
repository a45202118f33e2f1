//! Location-path compilation and evaluation for a pre-order XML node store.
//!
//! A parsed [`PathExpr`] is compiled by a [`Compiler`] into a
//! [`CompiledPath`], which is evaluated lazily against an [`EvalContext`]:
//!
//! ```
//! use locpath::simple_store::{doc, elem};
//! use locpath::{CompileOptions, Compiler, EvalContext, PathExpr, Step};
//!
//! let store = doc().child(elem("a").child(elem("b")).child(elem("b"))).build();
//! let mut compiler = Compiler::for_store(&store, CompileOptions::default());
//! let path = compiler.compile(PathExpr::absolute([Step::child("a"), Step::child("b")])).unwrap();
//! let ctx = EvalContext::new(&store);
//! let pres: Vec<usize> = path.nodes(&ctx, None).unwrap().iter().map(|n| n.pre).collect();
//! assert_eq!(pres, vec![2, 3]);
//! ```
pub mod axis;
pub mod compiler;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod expr;
pub mod index;
pub mod model;
pub mod path;
pub mod simple_store;
pub mod step;
pub mod summary;
pub mod test;

pub use axis::Axis;
pub use compiler::{CompileOptions, CompileOptionsBuilder, Compiler, StaticFocus, invert};
pub use diagnostics::Diagnostic;
pub use error::{Error, ErrorCode};
pub use eval::{EvalContext, EvalContextBuilder};
pub use expr::{Expr, Item, PathExpr, PathStep};
pub use index::{CostRecord, IndexContext, IndexOracle, IndexResult, ValueIndex};
pub use model::{NodeKind, NodeRef, NodeStore, QName};
pub use path::{CompiledPath, PathIter};
pub use simple_store::{SimpleNodeBuilder, SimpleStore};
pub use step::{Occurrence, Step, StepMode};
pub use summary::{PathSummary, StructuralSummary, SummaryNode};
pub use test::{NameMode, NameTest, Test};

/// Compile with default options and no knowledge about the input.
pub fn compile(path: PathExpr) -> Result<CompiledPath, Error> {
    Compiler::new(CompileOptions::default()).compile(path)
}
