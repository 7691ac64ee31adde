use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::Arc;

use remold_xpath::simple_node::{SimpleCursor, SimpleNode};
use remold_xpath::{CompiledPath, DocumentCursor, PathCache, StaticContext, XPathError};

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
    doc
}

fn compile(text: &str) -> CompiledPath {
    CompiledPath::compile(text, Arc::new(StaticContext::default())).unwrap()
}

#[test]
fn match_all_returns_document_order() {
    let doc = sample();
    let nodes = compile("/root/item").match_all(&doc.cursor()).unwrap();
    let values: Vec<String> = nodes.iter().map(SimpleCursor::string_value).collect();
    assert_eq!(values, ["alpha", "beta"]);
}

#[test]
fn match_all_rejects_atomic_results() {
    let doc = sample();
    let err = compile("count(/root/item)").match_all(&doc.cursor()).unwrap_err();
    assert!(matches!(err, XPathError::Eval(_)));
}

#[test]
fn match_single_flags_ambiguity() {
    let doc = sample();
    let err = compile("/root/item").match_single(&doc.cursor()).unwrap_err();
    assert_eq!(err, XPathError::AmbiguousMatch);
    let one = compile("/root/item[@id = '2']").match_single(&doc.cursor()).unwrap();
    assert_eq!(one.unwrap().string_value(), "beta");
    assert!(compile("/root/missing").match_single(&doc.cursor()).unwrap().is_none());
}

#[test]
fn selects_is_a_membership_test() {
    let doc = sample();
    let path = compile("/root/item[@id = '2']");
    let items = compile("/root/item").match_all(&doc.cursor()).unwrap();
    assert!(!path.selects(&doc.cursor(), &items[0]).unwrap());
    assert!(path.selects(&doc.cursor(), &items[1]).unwrap());
}

#[test]
fn stripped_path_admits_nodes_the_full_path_rejects() {
    let doc = sample();
    let full = compile("/root/item[@id = '2']");
    let stripped = full.without_trailing_predicates();
    let items = compile("/root/item").match_all(&doc.cursor()).unwrap();
    assert!(stripped.selects(&doc.cursor(), &items[0]).unwrap());
    assert!(!full.selects(&doc.cursor(), &items[0]).unwrap());
}

#[test]
fn cache_compiles_once_per_expression() {
    let cache = PathCache::with_default_capacity(StaticContext::default());
    assert!(cache.is_empty());
    let first = cache.get("/root/item").unwrap();
    let second = cache.get("/root/item").unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(first.text(), second.text());
    cache.get("/root/other").unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn cache_capacity_evicts_least_recently_used() {
    let cache = PathCache::new(NonZeroUsize::new(2).unwrap(), StaticContext::default());
    cache.get("/a").unwrap();
    cache.get("/b").unwrap();
    cache.get("/c").unwrap();
    assert_eq!(cache.len(), 2);
}

#[test]
fn compile_uncached_bypasses_the_cache() {
    let cache = PathCache::with_default_capacity(StaticContext::default());
    cache.compile_uncached("/a/b").unwrap();
    assert!(cache.is_empty());
}

#[test]
fn invalid_expression_is_reported_not_cached() {
    let cache = PathCache::with_default_capacity(StaticContext::default());
    assert!(cache.get("/root[").is_err());
    assert!(cache.is_empty());
}
