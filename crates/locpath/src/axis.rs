use core::fmt;
use smallvec::SmallVec;

use crate::model::{NodeKind, NodeStore};

/// The XPath axes (the namespace axis is not supported by the store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    pub const ALL: [Axis; 12] = [
        Axis::Ancestor,
        Axis::AncestorOrSelf,
        Axis::Attribute,
        Axis::Child,
        Axis::Descendant,
        Axis::DescendantOrSelf,
        Axis::Following,
        Axis::FollowingSibling,
        Axis::Parent,
        Axis::Preceding,
        Axis::PrecedingSibling,
        Axis::SelfAxis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Attribute => "attribute",
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Following => "following",
            Axis::FollowingSibling => "following-sibling",
            Axis::Parent => "parent",
            Axis::Preceding => "preceding",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::SelfAxis => "self",
        }
    }

    /// Axes that only walk into the subtree of the context node.
    pub fn is_down(self) -> bool {
        matches!(
            self,
            Axis::Child | Axis::Descendant | Axis::DescendantOrSelf | Axis::Attribute | Axis::SelfAxis
        )
    }

    /// Axes that deliver their nodes in reverse document order.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Ancestor | Axis::AncestorOrSelf | Axis::Preceding | Axis::PrecedingSibling
        )
    }

    /// Axis that walks the same edge in the opposite direction.
    ///
    /// Child and attribute both invert to parent, so this is not an involution
    /// for those two.
    pub fn invert(self) -> Axis {
        match self {
            Axis::Ancestor => Axis::Descendant,
            Axis::AncestorOrSelf => Axis::DescendantOrSelf,
            Axis::Attribute | Axis::Child => Axis::Parent,
            Axis::Descendant => Axis::Ancestor,
            Axis::DescendantOrSelf => Axis::AncestorOrSelf,
            Axis::Following => Axis::Preceding,
            Axis::FollowingSibling => Axis::PrecedingSibling,
            Axis::Parent => Axis::Child,
            Axis::Preceding => Axis::Following,
            Axis::PrecedingSibling => Axis::FollowingSibling,
            Axis::SelfAxis => Axis::SelfAxis,
        }
    }

    pub fn iter<S: NodeStore>(self, store: &S, pre: usize) -> AxisIter<'_, S> {
        AxisIter { store, cursor: AxisCursor::open(self, store, pre) }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Traversal state of one axis walk.
///
/// The cursor holds no reference to the store; it is advanced by passing the
/// store to [`AxisCursor::next`]. This lets step iterators own their cursors
/// and re-seed them with [`AxisCursor::reset`] without allocating.
#[derive(Debug, Clone, Default)]
pub enum AxisCursor {
    #[default]
    Done,
    Once(usize),
    // Subtree roots between `next` and `end`, hopping over whole subtrees
    Children { next: usize, end: usize },
    // Every non-attribute node between `next` and `end`, in pre order
    Descendants { next: usize, end: usize },
    Attributes { next: usize, end: usize },
    Ancestors { next: Option<usize> },
    Following { next: usize, end: usize },
    // Walks backwards; `anc` is the next ancestor to skip
    Preceding { next: usize, root: usize, anc: Option<usize> },
    // Pre-collected nodes, popped from the back
    Reverse(SmallVec<[usize; 8]>),
}

impl AxisCursor {
    pub fn open<S: NodeStore + ?Sized>(axis: Axis, store: &S, pre: usize) -> Self {
        let mut c = AxisCursor::Done;
        c.reset(axis, store, pre);
        c
    }

    /// Re-seed the cursor for `axis` starting at `pre`.
    pub fn reset<S: NodeStore + ?Sized>(&mut self, axis: Axis, store: &S, pre: usize) {
        let is_attr = store.kind(pre) == NodeKind::Attribute;
        *self = match axis {
            Axis::SelfAxis => AxisCursor::Once(pre),
            Axis::Child => AxisCursor::Children { next: pre + store.attr_size(pre), end: pre + store.size(pre) },
            Axis::Attribute => AxisCursor::Attributes { next: pre + 1, end: pre + store.attr_size(pre) },
            Axis::Descendant => {
                AxisCursor::Descendants { next: pre + store.attr_size(pre), end: pre + store.size(pre) }
            }
            Axis::DescendantOrSelf => AxisCursor::Descendants { next: pre, end: pre + store.size(pre) },
            Axis::Parent => match store.parent(pre) {
                Some(p) => AxisCursor::Once(p),
                None => AxisCursor::Done,
            },
            Axis::Ancestor => AxisCursor::Ancestors { next: store.parent(pre) },
            Axis::AncestorOrSelf => AxisCursor::Ancestors { next: Some(pre) },
            Axis::FollowingSibling => match store.parent(pre) {
                Some(p) if !is_attr => AxisCursor::Children { next: pre + store.size(pre), end: p + store.size(p) },
                _ => AxisCursor::Done,
            },
            Axis::PrecedingSibling => match store.parent(pre) {
                Some(p) if !is_attr => {
                    let mut buf = match core::mem::take(self) {
                        AxisCursor::Reverse(mut b) => {
                            b.clear();
                            b
                        }
                        _ => SmallVec::new(),
                    };
                    let mut c = p + store.attr_size(p);
                    while c < pre {
                        buf.push(c);
                        c += store.size(c);
                    }
                    AxisCursor::Reverse(buf)
                }
                _ => AxisCursor::Done,
            },
            Axis::Following => {
                let root = store.root_of(pre);
                AxisCursor::Following { next: pre + store.size(pre), end: root + store.size(root) }
            }
            Axis::Preceding => {
                let root = store.root_of(pre);
                AxisCursor::Preceding { next: pre, root, anc: store.parent(pre) }
            }
        };
    }

    pub fn next<S: NodeStore + ?Sized>(&mut self, store: &S) -> Option<usize> {
        match self {
            AxisCursor::Done => None,
            AxisCursor::Once(pre) => {
                let pre = *pre;
                *self = AxisCursor::Done;
                Some(pre)
            }
            AxisCursor::Children { next, end } => {
                if *next >= *end {
                    return None;
                }
                let cur = *next;
                *next += store.size(cur);
                Some(cur)
            }
            AxisCursor::Descendants { next, end } => {
                if *next >= *end {
                    return None;
                }
                let cur = *next;
                *next += store.attr_size(cur);
                Some(cur)
            }
            AxisCursor::Attributes { next, end } => {
                if *next >= *end {
                    return None;
                }
                let cur = *next;
                *next += 1;
                Some(cur)
            }
            AxisCursor::Ancestors { next } => {
                let cur = (*next)?;
                *next = store.parent(cur);
                Some(cur)
            }
            AxisCursor::Following { next, end } => {
                while *next < *end {
                    let cur = *next;
                    *next += 1;
                    if store.kind(cur) != NodeKind::Attribute {
                        return Some(cur);
                    }
                }
                None
            }
            AxisCursor::Preceding { next, root, anc } => {
                while *next > *root {
                    *next -= 1;
                    let cur = *next;
                    if Some(cur) == *anc {
                        *anc = store.parent(cur);
                        continue;
                    }
                    if store.kind(cur) != NodeKind::Attribute {
                        return Some(cur);
                    }
                }
                None
            }
            AxisCursor::Reverse(buf) => buf.pop(),
        }
    }
}

/// Lazy axis walk bound to a store.
pub struct AxisIter<'s, S: ?Sized> {
    store: &'s S,
    cursor: AxisCursor,
}

impl<S: NodeStore + ?Sized> Iterator for AxisIter<'_, S> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.cursor.next(self.store)
    }
}
