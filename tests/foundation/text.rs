//! Escapes, word scanning and block validation.

use cubescript_foundation::{
    escape_id, escape_string, parse_string, parse_word, skip_comments, unescape_string,
    validate_block,
};
use proptest::prelude::*;

#[test]
fn escapes_use_carets() {
    assert_eq!(escape_string("a\"b"), "\"a^\"b\"");
    assert_eq!(escape_string("line\nnext\t^"), "\"line^nnext^t^^\"");
    assert_eq!(unescape_string("^n^t^f^q"), "\n\t\x0cq");
    assert_eq!(unescape_string("trailing^"), "trailing");
}

#[test]
fn identifiers_are_quoted_only_when_needed() {
    assert_eq!(escape_id("plain"), "plain");
    assert_eq!(escape_id("has space"), "\"has space\"");
    assert_eq!(escape_id("semi;colon"), "\"semi;colon\"");
}

#[test]
fn words_keep_balanced_brackets() {
    assert_eq!(parse_word("abc def"), 3);
    assert_eq!(parse_word("a[b]c d"), 5);
    assert_eq!(parse_word("a[b c]"), 3);
    assert_eq!(parse_word("abc]"), 3);
    assert_eq!(parse_word("x//comment"), 1);
}

#[test]
fn strings_end_at_quotes_or_newlines() {
    assert_eq!(parse_string("abc\" rest"), 3);
    assert_eq!(parse_string("a^\"b\""), 4);
    assert_eq!(parse_string("open\nnext"), 4);
}

#[test]
fn comments_are_skipped_up_to_newline() {
    assert_eq!(skip_comments("  // note\nx"), 9);
    assert_eq!(skip_comments("\tx"), 1);
}

#[test]
fn blocks_validate_for_writeback() {
    assert!(validate_block("echo [a (b)] \"c]\""));
    assert!(!validate_block("a]b"));
    assert!(!validate_block("[open"));
    assert!(!validate_block("x // comment"));
    assert!(!validate_block("@x"));
    assert!(!validate_block("\"unterminated"));
}

proptest! {
    #[test]
    fn escape_round_trips(s in "\\PC{0,40}") {
        let quoted = escape_string(&s);
        let body = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(unescape_string(body), s);
    }
}
