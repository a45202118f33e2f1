use crate::step::Step;
use crate::test::Test;

/// Reverse of the forward chain `steps`, starting from the nodes the last
/// step selects.
///
/// Step `i` contributes its inverted axis together with the test and
/// predicates of step `i - 1`; the first step pairs its inverted axis with
/// `root_test`. Without a root test that final step is left out, which is
/// only sound when every candidate is known to have such an ancestor.
pub fn invert(steps: &[Step], root_test: Option<Test>) -> Vec<Step> {
    let mut out = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate().rev() {
        let axis = step.axis.invert();
        match i.checked_sub(1).map(|p| &steps[p]) {
            Some(prev) => out.push(Step::new(axis, prev.test.clone()).with_preds(prev.preds.clone())),
            None => {
                if let Some(t) = &root_test {
                    out.push(Step::new(axis, t.clone()));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use crate::eval::EvalContext;
    use crate::expr::{CompareOp, Expr};
    use crate::model::NodeRef;
    use crate::simple_store::{doc, elem};

    fn display(steps: &[Step]) -> Vec<String> {
        steps.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn child_step_becomes_parent_of_root_test() {
        // doc0 a1 b2 b3 c4 b5
        let s = doc().child(elem("a").child(elem("b")).child(elem("b")).child(elem("c").child(elem("b")))).build();
        let ctx = EvalContext::new(&s);
        let inv = invert(&[Step::child("b")], Some(Test::element("a")));
        assert_eq!(display(&inv), vec!["parent::a"]);
        let parent_a = Step::new(Axis::Parent, Test::element("a"));
        for b in [2, 3, 5] {
            assert_eq!(inv[0].select(&ctx, b).unwrap(), parent_a.select(&ctx, b).unwrap());
        }
        assert_eq!(inv[0].select(&ctx, 2).unwrap(), vec![NodeRef::new(1)]);
        assert!(inv[0].select(&ctx, 5).unwrap().is_empty());
    }

    #[test]
    fn predecessor_tests_and_predicates_move_back() {
        let a = Step::descendant("a").with_preds(vec![Expr::compare(CompareOp::Eq, Expr::Context, Expr::str("x"))]);
        let steps = [a, Step::child("b"), Step::attribute("id")];
        let inv = invert(&steps, Some(Test::document()));
        assert_eq!(display(&inv), vec!["parent::b", "parent::a[. = \"x\"]", "ancestor::document-node()"]);
        assert_eq!(invert(&steps, None).len(), 2);
    }
}
