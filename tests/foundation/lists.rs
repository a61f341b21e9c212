//! List parsing.

use cubescript_foundation::{ListParser, explode_list, list_includes, list_len, parse_list};

#[test]
fn elements_are_words_strings_and_groups() {
    let items = explode_list("a \"b c\" [d e] (f)", None);
    assert_eq!(items, vec!["a", "b c", "d e", "f"]);
    assert_eq!(list_len("a \"b c\" [d e] (f)"), 4);
}

#[test]
fn explode_respects_limit() {
    assert_eq!(explode_list("1 2 3 4", Some(2)), vec!["1", "2"]);
}

#[test]
fn quoted_spans_include_delimiters() {
    let items: Vec<_> = parse_list("x \"y^\"z\" [w]").collect();
    assert_eq!(items[0].quoted(), "x");
    assert_eq!(items[1].raw(), "y^\"z");
    assert_eq!(items[1].value(), "y\"z");
    assert!(items[1].is_string());
    assert_eq!(items[2].quoted(), "[w]");
    assert_eq!(items[2].raw(), "w");
}

#[test]
fn comments_and_semicolons_separate() {
    assert_eq!(explode_list("a; b // c d\n e", None), vec!["a", "b", "e"]);
}

#[test]
fn closing_bracket_ends_list() {
    assert_eq!(explode_list("a b ] c", None), vec!["a", "b"]);
}

#[test]
fn includes_matches_raw_text() {
    assert_eq!(list_includes("a b c", "b"), Some(1));
    assert_eq!(list_includes("a \"b\" c", "b"), Some(1));
    assert_eq!(list_includes("a b c", "d"), None);
}

#[test]
fn parser_tracks_position() {
    let mut parser = ListParser::new("one two");
    assert_eq!(parser.next().map(|i| i.raw()), Some("one"));
    assert_eq!(parser.remainder(), "two");
    assert_eq!(parser.offset(), 4);
}
