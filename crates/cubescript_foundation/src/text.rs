//! Lexical helpers shared by the compiler, the list commands, and the config
//! writer: word and string scanning, `^` escapes, and block validation.
//!
//! Scanners work on bytes and only ever stop on ASCII delimiters, so every
//! returned offset is a valid `str` boundary.

use std::borrow::Cow;

/// Deepest bracket nesting a single word may contain.
pub const MAX_BRACKET_DEPTH: usize = 100;

/// Characters that force an identifier to be quoted when written back out.
const ID_SPECIALS: &[u8] = b"\"/;()[]@ \x0c\t\r\n";

/// Returns the offset at which a quoted string body ends: the first
/// unescaped `"`, a line break, or the end of input.
#[must_use]
pub fn parse_string(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() {
        match b[i] {
            b'\r' | b'\n' | b'"' => return i,
            b'^' => {
                i += 1;
                if i >= b.len() {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

/// Returns the offset at which a bare word ends.
///
/// Words stop at whitespace, `;`, `"`, a `//` comment, or a closing bracket
/// that does not match an opening one inside the word.
#[must_use]
pub fn parse_word(s: &str) -> usize {
    let b = s.as_bytes();
    let mut brackets: Vec<u8> = Vec::new();
    let mut i = 0;
    loop {
        while i < b.len()
            && !matches!(
                b[i],
                b'"' | b'/' | b';' | b'(' | b')' | b'[' | b']' | b' ' | b'\t' | b'\r' | b'\n'
            )
        {
            i += 1;
        }
        let Some(&c) = b.get(i) else {
            return i;
        };
        match c {
            b'/' => {
                if b.get(i + 1) == Some(&b'/') {
                    return i;
                }
            }
            b'[' | b'(' => {
                if brackets.len() >= MAX_BRACKET_DEPTH {
                    return i;
                }
                brackets.push(c);
            }
            b']' => {
                if brackets.pop() != Some(b'[') {
                    return i;
                }
            }
            b')' => {
                if brackets.pop() != Some(b'(') {
                    return i;
                }
            }
            _ => return i,
        }
        i += 1;
    }
}

/// Returns the number of bytes of blanks (` `, `\t`, `\r`) and `//` comments
/// at the start of `s`. Newlines are left in place.
#[must_use]
pub fn skip_comments(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    loop {
        while matches!(b.get(i), Some(b' ' | b'\t' | b'\r')) {
            i += 1;
        }
        if b.get(i) != Some(&b'/') || b.get(i + 1) != Some(&b'/') {
            return i;
        }
        while i < b.len() && b[i] != b'\n' {
            i += 1;
        }
    }
}

/// Expands `^` escapes: `^n`, `^t`, `^f` become control characters and any
/// other `^x` becomes `x`. A trailing lone `^` is dropped.
#[must_use]
pub fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '^' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\x0c'),
            Some(e) => out.push(e),
            None => break,
        }
    }
    out
}

/// Quotes `s` as a string literal, escaping control characters, quotes and
/// carets so that [`unescape_string`] restores the original text.
#[must_use]
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("^n"),
            '\t' => out.push_str("^t"),
            '\x0c' => out.push_str("^f"),
            '"' => out.push_str("^\""),
            '^' => out.push_str("^^"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Returns `name` unchanged if it can be written as a bare word, otherwise
/// its quoted form.
#[must_use]
pub fn escape_id(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| ID_SPECIALS.contains(&b)) {
        Cow::Owned(escape_string(name))
    } else {
        Cow::Borrowed(name)
    }
}

/// Returns true if `s` can be written back inside `[...]` unchanged:
/// brackets balance, strings terminate, and there are no comments, `@`
/// escapes or form feeds.
#[must_use]
pub fn validate_block(s: &str) -> bool {
    let b = s.as_bytes();
    let mut brackets: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < b.len() {
        match b[i] {
            c @ (b'[' | b'(') => {
                if brackets.len() >= MAX_BRACKET_DEPTH {
                    return false;
                }
                brackets.push(c);
            }
            b']' => {
                if brackets.pop() != Some(b'[') {
                    return false;
                }
            }
            b')' => {
                if brackets.pop() != Some(b'(') {
                    return false;
                }
            }
            b'"' => {
                i += 1 + parse_string(&s[i + 1..]);
                if b.get(i) != Some(&b'"') {
                    return false;
                }
            }
            b'/' => {
                if b.get(i + 1) == Some(&b'/') {
                    return false;
                }
            }
            b'@' | b'\x0c' => return false,
            _ => {}
        }
        i += 1;
    }
    brackets.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_word_stops_at_separator() {
        let src = "test; test2";
        assert_eq!(&src[parse_word(src)..], "; test2");
    }

    #[test]
    fn parse_word_keeps_balanced_brackets() {
        assert_eq!(parse_word("a[b]c d"), 5);
        assert_eq!(parse_word("a[b c]"), 3);
        assert_eq!(parse_word("f(x)] y"), 4);
        assert_eq!(parse_word("]]]]"), 0);
    }

    #[test]
    fn parse_word_bracket_depth_is_bounded() {
        let src = "[".repeat(MAX_BRACKET_DEPTH + 8);
        assert_eq!(parse_word(&src), MAX_BRACKET_DEPTH);
    }

    #[test]
    fn parse_word_stops_at_comment() {
        assert_eq!(parse_word("abc//rest"), 3);
        assert_eq!(parse_word("a/b c"), 3);
    }

    #[test]
    fn parse_string_handles_escapes() {
        assert_eq!(parse_string("ab^\"cd\" tail"), 6);
        assert_eq!(parse_string("abc\nmore"), 3);
        assert_eq!(parse_string("abc^"), 4);
    }

    #[test]
    fn skip_comments_leaves_newline() {
        assert_eq!(skip_comments("  // note\nnext"), 9);
        assert_eq!(skip_comments("\t x"), 2);
    }

    #[test]
    fn escape_string_output() {
        assert_eq!(
            escape_string("escapestring output: \n \x0c \t"),
            "\"escapestring output: ^n ^f ^t\""
        );
        assert_eq!(escape_string("say \"hi\" ^"), "\"say ^\"hi^\" ^^\"");
    }

    #[test]
    fn unescape_inverts_escape() {
        let original = "line one\nline \"two\"\tend ^";
        let escaped = escape_string(original);
        assert_eq!(unescape_string(&escaped[1..escaped.len() - 1]), original);
        assert_eq!(unescape_string("^q^"), "q");
    }

    #[test]
    fn escape_id_only_quotes_when_needed() {
        assert_eq!(escape_id("plain"), "plain");
        assert_eq!(escape_id(""), "");
        assert_eq!(
            escape_id("escapeid output: \n \x0c \t"),
            "\"escapeid output: ^n ^f ^t\""
        );
    }

    #[test]
    fn validate_block_cases() {
        assert!(!validate_block("[[["));
        assert!(!validate_block("]]]"));
        assert!(validate_block("[[[]]]"));
        assert!(!validate_block("[[[]]]]["));
        assert!(!validate_block("((("));
        assert!(validate_block("((()))"));
        assert!(!validate_block("((())))("));
        assert!(!validate_block("\""));
        assert!(validate_block("\"\""));
        assert!(!validate_block("@"));
        assert!(!validate_block("\x0c"));
        assert!(validate_block("/"));
        assert!(!validate_block("//"));
        let deep = format!("{}{}", "[".repeat(101), "]".repeat(101));
        assert!(!validate_block(&deep));
    }
}
