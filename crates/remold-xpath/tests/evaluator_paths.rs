use std::rc::Rc;

use remold_xpath::simple_node::{SimpleCursor, SimpleNode};
use remold_xpath::{AtomicValue, StaticContext, XdmItem, evaluate, parse_xpath};
use rstest::rstest;

/// <root>
///   <item id="1">alpha</item>
///   <item id="2">beta</item>
///   <other>gamma</other>
/// </root>
fn sample() -> Rc<SimpleNode> {
    let doc = SimpleNode::document();
    let root = SimpleNode::element("root");
    SimpleNode::append(&doc, Rc::clone(&root));
    for (id, text) in [("1", "alpha"), ("2", "beta")] {
        let item = SimpleNode::element("item");
        SimpleNode::append_attribute(&item, SimpleNode::attribute("id", id));
        SimpleNode::append(&item, SimpleNode::text(text));
        SimpleNode::append(&root, item);
    }
    let other = SimpleNode::element("other");
    SimpleNode::append(&other, SimpleNode::text("gamma"));
    SimpleNode::append(&root, other);
    doc
}

fn select(doc: &Rc<SimpleNode>, expr: &str) -> Vec<String> {
    let parsed = parse_xpath(expr).expect(expr);
    let seq = evaluate(&parsed, &doc.cursor(), &StaticContext::default()).expect(expr);
    seq.into_iter()
        .map(|item| match item {
            XdmItem::Node(n) => {
                use remold_xpath::DocumentCursor;
                n.string_value()
            }
            XdmItem::Atomic(a) => a.as_string(),
        })
        .collect()
}

fn atomic(doc: &Rc<SimpleNode>, expr: &str) -> AtomicValue {
    let parsed = parse_xpath(expr).expect(expr);
    let seq = evaluate(&parsed, &doc.cursor(), &StaticContext::default()).expect(expr);
    match seq.as_slice() {
        [XdmItem::Atomic(a)] => a.clone(),
        other => panic!("expected one atomic for {expr}, got {other:?}"),
    }
}

#[rstest]
#[case("/root/item", vec!["alpha", "beta"])]
#[case("/root/*", vec!["alpha", "beta", "gamma"])]
#[case("/root/item/@id", vec!["1", "2"])]
#[case("/root/item[2]", vec!["beta"])]
#[case("/root/item[@id = '2']", vec!["beta"])]
#[case("//item", vec!["alpha", "beta"])]
#[case("/root/item/text()", vec!["alpha", "beta"])]
#[case("/root/item[1]/..", vec!["alphabetagamma"])]
#[case("/root/item[position() = last()]", vec!["beta"])]
#[case("/root/item[. != 'alpha']", vec!["beta"])]
#[case("/root/missing", vec![])]
fn path_selection(#[case] expr: &str, #[case] expected: Vec<&str>) {
    let doc = sample();
    assert_eq!(select(&doc, expr), expected);
}

#[test]
fn relative_path_starts_at_context_node() {
    let doc = sample();
    let parsed = parse_xpath("item[1]").unwrap();
    let mut cursor = doc.cursor();
    use remold_xpath::DocumentCursor;
    assert!(cursor.move_to_first_child());
    let seq = evaluate(&parsed, &cursor, &StaticContext::default()).unwrap();
    assert_eq!(seq.len(), 1);
}

#[test]
fn self_step_selects_the_context_node() {
    let doc = sample();
    let parsed = parse_xpath(".").unwrap();
    let seq = evaluate(&parsed, &doc.cursor(), &StaticContext::default()).unwrap();
    assert_eq!(seq, vec![XdmItem::Node(doc.cursor())]);
}

#[rstest]
#[case("count(/root/item)", AtomicValue::Number(2.0))]
#[case("count(/root/missing)", AtomicValue::Number(0.0))]
#[case("not(/root/missing)", AtomicValue::Boolean(true))]
#[case("boolean(/root/item)", AtomicValue::Boolean(true))]
#[case("string(/root/item)", AtomicValue::String("alpha".into()))]
#[case("number('12.5')", AtomicValue::Number(12.5))]
#[case("contains('abcdef', 'cde')", AtomicValue::Boolean(true))]
#[case("starts-with('abcdef', 'abc')", AtomicValue::Boolean(true))]
#[case("normalize-space('  a   b ')", AtomicValue::String("a b".into()))]
#[case("string-length('abc')", AtomicValue::Number(3.0))]
#[case("1 + 2 * 3", AtomicValue::Number(7.0))]
#[case("10 mod 3", AtomicValue::Number(1.0))]
#[case("-(2 + 3)", AtomicValue::Number(-5.0))]
#[case("true() and false()", AtomicValue::Boolean(false))]
#[case("true() or false()", AtomicValue::Boolean(true))]
#[case("/root/item = 'beta'", AtomicValue::Boolean(true))]
#[case("/root/item = 'delta'", AtomicValue::Boolean(false))]
#[case("/root/item/@id > 1", AtomicValue::Boolean(true))]
fn atomics(#[case] expr: &str, #[case] expected: AtomicValue) {
    let doc = sample();
    assert_eq!(atomic(&doc, expr), expected);
}

#[test]
fn name_function_reports_the_context_element() {
    let doc = sample();
    assert_eq!(select(&doc, "/root/*[name() = 'other']"), vec!["gamma"]);
}

#[test]
fn prefixed_name_test_resolves_through_the_static_context() {
    let doc = SimpleNode::document();
    let root = SimpleNode::element("root");
    SimpleNode::append(&doc, Rc::clone(&root));
    let child = SimpleNode::element_ns("a", "entry", "urn:example:one");
    SimpleNode::append(&child, SimpleNode::text("hit"));
    SimpleNode::append(&root, child);

    let ctx = StaticContext::default().with_namespace("ex", "urn:example:one");
    let parsed = parse_xpath("/root/ex:entry").unwrap();
    let seq = evaluate(&parsed, &doc.cursor(), &ctx).unwrap();
    assert_eq!(seq.len(), 1);

    // An unbound prefix falls back to literal prefix comparison.
    let parsed = parse_xpath("/root/a:entry").unwrap();
    let seq = evaluate(&parsed, &doc.cursor(), &StaticContext::default()).unwrap();
    assert_eq!(seq.len(), 1);
}

#[test]
fn unprefixed_name_test_ignores_namespaces() {
    let doc = SimpleNode::document();
    let root = SimpleNode::element("root");
    SimpleNode::append(&doc, Rc::clone(&root));
    SimpleNode::append(&root, SimpleNode::element_ns("a", "entry", "urn:example:one"));
    let seq = evaluate(
        &parse_xpath("/root/entry").unwrap(),
        &doc.cursor(),
        &StaticContext::default(),
    )
    .unwrap();
    assert_eq!(seq.len(), 1);
}

#[test]
fn numeric_predicate_with_fraction_matches_nothing() {
    let doc = sample();
    assert_eq!(select(&doc, "/root/item[1.5]"), Vec::<String>::new());
}

#[test]
fn descendant_or_self_does_not_duplicate_nodes() {
    let doc = sample();
    let cursor: SimpleCursor = doc.cursor();
    let seq = evaluate(&parse_xpath("//*").unwrap(), &cursor, &StaticContext::default()).unwrap();
    assert_eq!(seq.len(), 4);
}
