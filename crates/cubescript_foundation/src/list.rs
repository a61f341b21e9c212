//! Whitespace-separated list parsing.
//!
//! Lists are plain strings. Elements are bare words, `"quoted strings"`, or
//! bracketed groups (`[a b]`, `(a b)`) that count as a single element. `;`
//! and `//` comments between elements are ignored, and an unmatched closing
//! bracket ends the list.

use std::borrow::Cow;

use crate::text::{parse_string, parse_word, unescape_string};

/// One element of a list, with byte spans into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListItem<'a> {
    source: &'a str,
    /// Start of the element body (inside any quotes or brackets).
    pub start: usize,
    /// End of the element body.
    pub end: usize,
    /// Start of the element including its opening delimiter.
    pub quote_start: usize,
    /// End of the element including its closing delimiter.
    pub quote_end: usize,
}

impl<'a> ListItem<'a> {
    /// The element body exactly as written.
    #[must_use]
    pub fn raw(&self) -> &'a str {
        &self.source[self.start..self.end]
    }

    /// The element including its delimiters.
    #[must_use]
    pub fn quoted(&self) -> &'a str {
        &self.source[self.quote_start..self.quote_end]
    }

    /// Returns true if the element was written as a quoted string.
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.source.as_bytes().get(self.quote_start) == Some(&b'"')
    }

    /// The element value: quoted strings are unescaped, everything else is
    /// the raw body.
    #[must_use]
    pub fn value(&self) -> Cow<'a, str> {
        if self.is_string() {
            Cow::Owned(unescape_string(self.raw()))
        } else {
            Cow::Borrowed(self.raw())
        }
    }
}

/// Iterator over the elements of a list string.
#[derive(Debug, Clone)]
pub struct ListParser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> ListParser<'a> {
    /// Creates a parser positioned at the start of `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Current byte offset into the source.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// The unparsed remainder of the source.
    #[must_use]
    pub fn remainder(&self) -> &'a str {
        &self.source[self.pos..]
    }

    /// Skips whitespace and `//` comments.
    pub fn skip_whitespace(&mut self) {
        let b = self.source.as_bytes();
        loop {
            while matches!(b.get(self.pos), Some(b' ' | b'\t' | b'\r' | b'\n')) {
                self.pos += 1;
            }
            if b.get(self.pos) != Some(&b'/') || b.get(self.pos + 1) != Some(&b'/') {
                return;
            }
            while self.pos < b.len() && b[self.pos] != b'\n' {
                self.pos += 1;
            }
        }
    }

    fn parse_group(&mut self) -> Option<(usize, usize)> {
        let b = self.source.as_bytes();
        let bracket = b[self.pos];
        self.pos += 1;
        let mut depth = 1;
        loop {
            while self.pos < b.len()
                && !matches!(b[self.pos], b'"' | b'/' | b';' | b'(' | b')' | b'[' | b']')
            {
                self.pos += 1;
            }
            let Some(&c) = b.get(self.pos) else {
                return None;
            };
            self.pos += 1;
            match c {
                b'"' => {
                    self.pos += parse_string(&self.source[self.pos..]);
                    if b.get(self.pos) == Some(&b'"') {
                        self.pos += 1;
                    }
                }
                b'/' => {
                    if b.get(self.pos) == Some(&b'/') {
                        while self.pos < b.len() && b[self.pos] != b'\n' {
                            self.pos += 1;
                        }
                    }
                }
                b'(' | b'[' => {
                    if c == bracket {
                        depth += 1;
                    }
                }
                b')' | b']' => {
                    let opener = if c == b')' { b'(' } else { b'[' };
                    if bracket == opener {
                        depth -= 1;
                        if depth <= 0 {
                            return Some((self.pos - 1, self.pos));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl<'a> Iterator for ListParser<'a> {
    type Item = ListItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let b = self.source.as_bytes();
        let quote_start = self.pos;
        let (start, end, quote_end) = match b.get(self.pos)? {
            b'"' => {
                self.pos += 1;
                let start = self.pos;
                self.pos += parse_string(&self.source[self.pos..]);
                let end = self.pos;
                if b.get(self.pos) == Some(&b'"') {
                    self.pos += 1;
                }
                (start, end, self.pos)
            }
            b'(' | b'[' => {
                let start = self.pos + 1;
                match self.parse_group() {
                    Some((end, quote_end)) => (start, end, quote_end),
                    // unterminated group runs to the end without a trailing separator
                    None => {
                        return Some(ListItem {
                            source: self.source,
                            start,
                            end: self.pos,
                            quote_start,
                            quote_end: self.pos,
                        });
                    }
                }
            }
            b')' | b']' => return None,
            _ => {
                self.pos += parse_word(&self.source[self.pos..]);
                (quote_start, self.pos, self.pos)
            }
        };
        self.skip_whitespace();
        if b.get(self.pos) == Some(&b';') {
            self.pos += 1;
        }
        Some(ListItem {
            source: self.source,
            start,
            end,
            quote_start,
            quote_end,
        })
    }
}

/// Iterates over the elements of `list`.
#[must_use]
pub fn parse_list(list: &str) -> ListParser<'_> {
    ListParser::new(list)
}

/// Counts the elements of `list`.
#[must_use]
pub fn list_len(list: &str) -> usize {
    parse_list(list).count()
}

/// Splits `list` into element values, up to `limit` elements.
#[must_use]
pub fn explode_list(list: &str, limit: Option<usize>) -> Vec<String> {
    parse_list(list)
        .take(limit.unwrap_or(usize::MAX))
        .map(|item| item.value().into_owned())
        .collect()
}

/// Returns the position of the first element whose raw body equals `needle`.
#[must_use]
pub fn list_includes(list: &str, needle: &str) -> Option<usize> {
    parse_list(list).position(|item| item.raw() == needle)
}
