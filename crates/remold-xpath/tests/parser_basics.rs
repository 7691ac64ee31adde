use remold_xpath::parser::ast::{Axis, Expr, NodeTest, PathStart};
use remold_xpath::{XPathError, parse_xpath};
use rstest::rstest;

#[rstest]
#[case("/")]
#[case("/root")]
#[case("/root/item")]
#[case("//item")]
#[case("/root//item")]
#[case("item/sub")]
#[case(".")]
#[case("..")]
#[case("./item")]
#[case("/root/@id")]
#[case("/root/@*")]
#[case("/root/*")]
#[case("/root/text()")]
#[case("/root/node()")]
#[case("/ns:root/ns:item")]
#[case("/root/item[1]")]
#[case("/root/item[@id = '7'][2]")]
#[case("/root/item[sub/leaf = 'x']")]
#[case("count(/root/item) > 2")]
#[case("contains(., 'abc') and position() != last()")]
#[case("1 + 2 * 3 - 4 div 5 mod 6")]
#[case("-1")]
#[case("--1")]
#[case("'single'")]
#[case("\"double\"")]
#[case("normalize-space('  x  ')")]
fn accepts(#[case] input: &str) {
    parse_xpath(input).unwrap_or_else(|e| panic!("{input}: {e}"));
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("/root/")]
#[case("/root[")]
#[case("/root/item[]")]
#[case("foo(")]
#[case("1 +")]
#[case("@")]
#[case("= 3")]
#[case("/root/item[1")]
fn rejects(#[case] input: &str) {
    let err = parse_xpath(input).unwrap_err();
    assert!(matches!(err, XPathError::Parse(_)), "{input}: {err:?}");
}

#[test]
fn absolute_and_relative_starts_are_distinguished() {
    let Expr::Path(p) = parse_xpath("/root").unwrap() else { panic!("not a path") };
    assert_eq!(p.start, PathStart::Root);
    let Expr::Path(p) = parse_xpath("root").unwrap() else { panic!("not a path") };
    assert_eq!(p.start, PathStart::Relative);
}

#[test]
fn double_slash_inserts_a_descendant_step() {
    let Expr::Path(p) = parse_xpath("//item").unwrap() else { panic!("not a path") };
    assert_eq!(p.steps.len(), 2);
    assert_eq!(p.steps[0].axis, Axis::DescendantOrSelf);
    assert_eq!(p.steps[0].test, NodeTest::AnyKind);
    assert_eq!(p.steps[1].axis, Axis::Child);
}

#[test]
fn attribute_step_uses_the_attribute_axis() {
    let Expr::Path(p) = parse_xpath("/e/@id").unwrap() else { panic!("not a path") };
    assert_eq!(p.steps.last().unwrap().axis, Axis::Attribute);
}

#[test]
fn prefixed_name_test_keeps_the_prefix() {
    let Expr::Path(p) = parse_xpath("/ns:root").unwrap() else { panic!("not a path") };
    let NodeTest::Name(name) = &p.steps[0].test else { panic!("not a name test") };
    assert_eq!(name.prefix.as_deref(), Some("ns"));
    assert_eq!(name.local, "root");
}

#[test]
fn predicates_attach_to_their_step() {
    let Expr::Path(p) = parse_xpath("/a[1]/b[2][3]").unwrap() else { panic!("not a path") };
    assert_eq!(p.steps[0].predicates.len(), 1);
    assert_eq!(p.steps[1].predicates.len(), 2);
}

#[test]
fn without_trailing_predicates_only_strips_the_last_step() {
    let expr = parse_xpath("/a[1]/b[2][3]").unwrap();
    let Expr::Path(p) = expr.without_trailing_predicates() else { panic!("not a path") };
    assert_eq!(p.steps[0].predicates.len(), 1);
    assert!(p.steps[1].predicates.is_empty());
}
