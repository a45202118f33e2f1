use locpath::simple_store::{attr, doc, elem};
use locpath::test::{ExtTest, InvDocTest, KindTest};
use locpath::{Axis, NameTest, NodeKind, QName, SimpleStore, Test};
use rstest::{fixture, rstest};

// doc0 a1 @id2 b3 b4 c5 b6
#[fixture]
fn tree() -> SimpleStore {
    doc()
        .child(elem("a").attr(attr("id", "1")).child(elem("b")).child(elem("b")).child(elem("c").child(elem("b"))))
        .build()
}

#[rstest]
fn inversion_round_trips_except_child_and_attribute() {
    for axis in Axis::ALL {
        match axis {
            Axis::Child | Axis::Attribute => assert_eq!(axis.invert(), Axis::Parent),
            _ => assert_eq!(axis.invert().invert(), axis, "{axis}"),
        }
    }
    assert_eq!(Axis::Parent.invert(), Axis::Child);
}

#[rstest]
fn reverse_axes_are_exactly_the_inverted_forward_ones() {
    for axis in Axis::ALL {
        if axis.is_reverse() {
            assert!(!axis.invert().is_reverse());
            assert!(!axis.is_down());
        }
    }
}

#[rstest]
#[case(Axis::Child, 1, vec![3, 4, 5])]
#[case(Axis::Attribute, 1, vec![2])]
#[case(Axis::Descendant, 1, vec![3, 4, 5, 6])]
#[case(Axis::DescendantOrSelf, 1, vec![1, 3, 4, 5, 6])]
#[case(Axis::Parent, 2, vec![1])]
#[case(Axis::Ancestor, 6, vec![5, 1, 0])]
#[case(Axis::AncestorOrSelf, 6, vec![6, 5, 1, 0])]
#[case(Axis::Following, 3, vec![4, 5, 6])]
#[case(Axis::FollowingSibling, 3, vec![4, 5])]
#[case(Axis::FollowingSibling, 2, vec![])]
#[case(Axis::Preceding, 6, vec![4, 3])]
#[case(Axis::PrecedingSibling, 5, vec![4, 3])]
#[case(Axis::SelfAxis, 4, vec![4])]
fn axis_walks_in_axis_order(tree: SimpleStore, #[case] axis: Axis, #[case] from: usize, #[case] expected: Vec<usize>) {
    let got: Vec<usize> = axis.iter(&tree, from).collect();
    assert_eq!(got, expected);
}

fn pool() -> Vec<Test> {
    let untyped = QName::prefixed("xs", "http://www.w3.org/2001/XMLSchema", "untyped");
    let integer = QName::prefixed("xs", "http://www.w3.org/2001/XMLSchema", "integer");
    vec![
        Test::node(),
        Test::document(),
        Test::text(),
        Test::any_element(),
        Test::Kind(KindTest::Attribute),
        Test::Kind(KindTest::Comment),
        Test::Kind(KindTest::ProcessingInstruction(None)),
        Test::Kind(KindTest::ProcessingInstruction(Some("x".into()))),
        Test::element("a"),
        Test::element("b"),
        Test::attribute("a"),
        Test::Name(NameTest::wildcard(NodeKind::Element)),
        Test::Name(NameTest::local_name(NodeKind::Element, "a")),
        Test::Name(NameTest::namespace(NodeKind::Element, "urn:x")),
        Test::Name(NameTest::qualified(NodeKind::Element, "urn:x", "a")),
        Test::Name(NameTest::prefixed(NodeKind::Element, "p", "a")),
        Test::Ext(ExtTest { kind: NodeKind::Element, name: None, type_name: None }),
        Test::Ext(ExtTest {
            kind: NodeKind::Element,
            name: Some(NameTest::full(NodeKind::Element, "a")),
            type_name: Some(untyped),
        }),
        Test::Ext(ExtTest { kind: NodeKind::Element, name: None, type_name: Some(integer) }),
        Test::Ext(ExtTest { kind: NodeKind::Attribute, name: None, type_name: None }),
        Test::InvDoc(InvDocTest::new(vec![0, 4])),
        Test::InvDoc(InvDocTest::new(vec![4, 9])),
    ]
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Merged,
    Empty,
    Rejected,
}

fn outcome(a: &Test, b: &Test) -> Outcome {
    match a.intersect(b) {
        Ok(Some(_)) => Outcome::Merged,
        Ok(None) => Outcome::Empty,
        Err(_) => Outcome::Rejected,
    }
}

#[rstest]
fn intersection_outcome_is_commutative() {
    let tests = pool();
    for a in &tests {
        for b in &tests {
            assert_eq!(outcome(a, b), outcome(b, a), "{a} vs {b}");
        }
    }
}

#[rstest]
#[case(Test::element("a"), Test::Name(NameTest::local_name(NodeKind::Element, "a")), Some("a"))]
#[case(Test::any_element(), Test::element("b"), Some("b"))]
#[case(Test::element("a"), Test::element("b"), None)]
#[case(Test::attribute("a"), Test::element("a"), None)]
#[case(Test::text(), Test::any_element(), None)]
fn intersection_keeps_the_narrower_name(#[case] a: Test, #[case] b: Test, #[case] expected: Option<&str>) {
    let merged = a.intersect(&b).unwrap();
    assert_eq!(merged.as_ref().and_then(Test::local_name), expected);
}

#[rstest]
fn intersected_test_matches_what_both_match(tree: SimpleStore) {
    let tests = pool();
    for a in &tests {
        for b in &tests {
            let Ok(Some(m)) = a.intersect(b) else { continue };
            for pre in 0..7 {
                assert_eq!(m.matches(&tree, pre), a.matches(&tree, pre) && b.matches(&tree, pre), "{a} and {b} at {pre}");
            }
        }
    }
}
