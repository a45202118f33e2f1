use core::fmt;

/// Informational event posted by the compiler. Diagnostics never change
/// the result of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    VoidStep { step: String },
    MergedDescendant { from: String, to: String },
    SelfStepMerged { step: String },
    NamespaceNarrowed { test: String },
    AttributeSingleton { step: String },
    IndexUsed { pred: String, cardinality: usize },
    IndexRejected { pred: String, cardinality: usize },
    NoIndexResults { pred: String },
    NegationSimplified { pred: String },
    ChildrenRewrite { from: String, to: String },
    ChildrenRejected { step: String, reason: &'static str },
    EmptySummaryPath { path: String },
}

impl Diagnostic {
    /// Short machine-readable tag, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::VoidStep { .. } => "void-step",
            Diagnostic::MergedDescendant { .. } => "merge-descendant",
            Diagnostic::SelfStepMerged { .. } => "merge-self",
            Diagnostic::NamespaceNarrowed { .. } => "narrow-namespace",
            Diagnostic::AttributeSingleton { .. } => "single-attribute",
            Diagnostic::IndexUsed { .. } => "index",
            Diagnostic::IndexRejected { .. } => "index-rejected",
            Diagnostic::NoIndexResults { .. } => "index-empty",
            Diagnostic::NegationSimplified { .. } => "negation",
            Diagnostic::ChildrenRewrite { .. } => "children",
            Diagnostic::ChildrenRejected { .. } => "children-rejected",
            Diagnostic::EmptySummaryPath { .. } => "summary-empty",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::VoidStep { step } => write!(f, "removing path with empty step: {step}"),
            Diagnostic::MergedDescendant { from, to } => write!(f, "merging descendant steps: {from} -> {to}"),
            Diagnostic::SelfStepMerged { step } => write!(f, "merging self step: {step}"),
            Diagnostic::NamespaceNarrowed { test } => write!(f, "ignoring namespace of {test}"),
            Diagnostic::AttributeSingleton { step } => write!(f, "single attribute: {step}"),
            Diagnostic::IndexUsed { pred, cardinality } => {
                write!(f, "applying index to [{pred}] (~{cardinality} results)")
            }
            Diagnostic::IndexRejected { pred, cardinality } => {
                write!(f, "index not profitable for [{pred}] (~{cardinality} results)")
            }
            Diagnostic::NoIndexResults { pred } => write!(f, "no index results for [{pred}]"),
            Diagnostic::NegationSimplified { pred } => write!(f, "removing predicate always true: [{pred}]"),
            Diagnostic::ChildrenRewrite { from, to } => write!(f, "converting descendant steps: {from} -> {to}"),
            Diagnostic::ChildrenRejected { step, reason } => write!(f, "keeping {step}: {reason}"),
            Diagnostic::EmptySummaryPath { path } => write!(f, "path yields no results: {path}"),
        }
    }
}
