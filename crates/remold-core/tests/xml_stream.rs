use remold_core::reader::{RecordReader, XmlReader};
use remold_core::{NodeId, ReaderError};
use remold_xpath::{PathCache, StaticContext};

fn reader(xml: &'static str, record_path: &str) -> XmlReader<&'static [u8]> {
    let cache = PathCache::with_default_capacity(StaticContext::default());
    XmlReader::new(xml.as_bytes(), "test.xml", record_path, &cache).unwrap()
}

fn text_of<R: std::io::BufRead>(r: &XmlReader<R>, id: NodeId) -> String {
    r.arena().inner_text(id)
}

#[test]
fn yields_each_record_in_order() {
    let mut r = reader("<root><x>1</x><x>2</x></root>", "/root/x");
    let first = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, first), "1");
    let second = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, second), "2");
    assert!(r.read().unwrap().is_none());
    assert!(r.read().unwrap().is_none());
}

#[test]
fn previous_record_is_released_on_next_read() {
    let mut r = reader("<root><x>1</x><x>2</x></root>", "/root/x");
    let first = r.read().unwrap().unwrap();
    assert!(r.arena().contains(first));
    let _second = r.read().unwrap().unwrap();
    assert!(!r.arena().contains(first));
}

#[test]
fn explicit_release_removes_the_subtree() {
    let mut r = reader("<root><x>1</x></root>", "/root/x");
    let rec = r.read().unwrap().unwrap();
    r.release();
    assert!(!r.arena().contains(rec));
}

#[test]
fn trailing_predicate_filters_completed_candidates() {
    let xml = r#"<root>
        <item keep="n">a</item>
        <item keep="y">b</item>
        <item keep="n">c</item>
        <item keep="y">d</item>
    </root>"#;
    let mut r = reader(xml, "/root/item[@keep = 'y']");
    let mut seen = Vec::new();
    while let Some(rec) = r.read().unwrap() {
        seen.push(text_of(&r, rec));
    }
    assert_eq!(seen, ["b", "d"]);
}

#[test]
fn memory_stays_bounded_by_one_record() {
    let mut xml = String::from("<root>");
    for i in 0..500 {
        xml.push_str(&format!("<x a=\"{i}\"><sub>{i}</sub></x>"));
    }
    xml.push_str("</root>");
    let cache = PathCache::with_default_capacity(StaticContext::default());
    let mut r = XmlReader::new(xml.as_bytes(), "big.xml", "/root/x", &cache).unwrap();
    let mut count = 0;
    while r.read().unwrap().is_some() {
        assert!(r.arena().live_nodes() < 20, "arena grew to {}", r.arena().live_nodes());
        count += 1;
    }
    assert_eq!(count, 500);
    assert!(r.arena().live_nodes() < 5);
}

#[test]
fn memory_stays_bounded_on_pretty_printed_input() {
    let mut xml = String::from("<root>\n");
    for i in 0..500 {
        xml.push_str(&format!("  <x>{i}</x>\n"));
    }
    xml.push_str("</root>");
    let cache = PathCache::with_default_capacity(StaticContext::default());
    let mut r = XmlReader::new(xml.as_bytes(), "pretty.xml", "/root/x", &cache).unwrap();
    let mut count = 0;
    while r.read().unwrap().is_some() {
        assert!(r.arena().live_nodes() < 20, "arena grew to {}", r.arena().live_nodes());
        count += 1;
    }
    assert_eq!(count, 500);
}

#[test]
fn rejected_candidates_are_reclaimed() {
    let mut xml = String::from("<root>");
    for _ in 0..200 {
        xml.push_str("<x keep=\"n\">skip</x>");
    }
    xml.push_str("<x keep=\"y\">hit</x></root>");
    let cache = PathCache::with_default_capacity(StaticContext::default());
    let mut r = XmlReader::new(xml.as_bytes(), "big.xml", "/root/x[@keep = 'y']", &cache).unwrap();
    let rec = r.read().unwrap().unwrap();
    assert_eq!(r.arena().inner_text(rec), "hit");
    assert!(r.arena().live_nodes() < 10);
}

#[test]
fn attributes_are_reachable_but_not_part_of_inner_text() {
    let mut r = reader("<root><x id=\"7\">body</x></root>", "/root/x[@id = '7']");
    let rec = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, rec), "body");
}

#[test]
fn empty_element_forms_are_equivalent() {
    let mut r = reader("<root><x/><x></x></root>", "/root/x");
    let first = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, first), "");
    let second = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, second), "");
    assert!(r.read().unwrap().is_none());
}

#[test]
fn prolog_and_comments_are_skipped() {
    let mut r = reader(
        "<?xml version=\"1.0\"?>\n<!-- preamble -->\n<root><x>1</x></root>",
        "/root/x",
    );
    let rec = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, rec), "1");
}

#[test]
fn cdata_contributes_to_inner_text() {
    let mut r = reader("<root><x><![CDATA[a < b]]></x></root>", "/root/x");
    let rec = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, rec), "a < b");
}

#[test]
fn undeclared_prefix_is_a_terminal_error() {
    let mut r = reader("<root><p:x>1</p:x></root>", "/root/x");
    let err = r.read().unwrap_err();
    assert!(matches!(err, ReaderError::UndeclaredNamespace { ref prefix, .. } if prefix == "p"));
    // Sticky: the same error repeats.
    assert_eq!(r.read().unwrap_err(), err);
}

#[test]
fn namespaced_elements_match_through_the_static_context() {
    let ctx = StaticContext::default().with_namespace("ex", "urn:example:items");
    let cache = PathCache::with_default_capacity(ctx);
    let xml = "<root xmlns:p=\"urn:example:items\"><p:x>1</p:x></root>";
    let mut r = XmlReader::new(xml.as_bytes(), "ns.xml", "/root/ex:x", &cache).unwrap();
    let rec = r.read().unwrap().unwrap();
    assert_eq!(r.arena().inner_text(rec), "1");
}

#[test]
fn malformed_markup_is_terminal_and_reports_a_line() {
    let mut r = reader("<root>\n<x>1</x>\n</wrong>", "/root/x");
    let rec = r.read().unwrap().unwrap();
    assert_eq!(text_of(&r, rec), "1");
    let err = r.read().unwrap_err();
    match err {
        ReaderError::Malformed { line, .. } => assert!(line >= 2, "line was {line}"),
        other => panic!("expected Malformed, got {other:?}"),
    }
    assert!(r.read().is_err());
}

#[test]
fn truncated_input_is_malformed() {
    let mut r = reader("<root><x>1", "/root/x");
    assert!(matches!(r.read(), Err(ReaderError::Malformed { .. })));
}

#[test]
fn invalid_record_path_is_rejected_at_construction() {
    let cache = PathCache::with_default_capacity(StaticContext::default());
    let Err(err) = XmlReader::new("<root/>".as_bytes(), "x.xml", "/root[", &cache) else {
        panic!("expected construction to fail");
    };
    assert!(matches!(err, ReaderError::InvalidPath { .. }));
}
