//! Syntax highlighting for the REPL.

use std::borrow::Cow;

const RESET: &str = "\x1b[0m";
const COMMENT: &str = "\x1b[2;3m";
const STRING: &str = "\x1b[33m";
const NUMBER: &str = "\x1b[35m";
const LOOKUP: &str = "\x1b[34m";
const BRACKET: &str = "\x1b[1m";
const COMMAND: &str = "\x1b[32m";

/// Highlighter for cubescript source.
///
/// Statement heads (the word a command is looked up by) are green, `$name`
/// and `@name` references blue, numbers magenta and strings yellow.
#[derive(Debug, Default)]
pub struct CubescriptHighlighter;

impl CubescriptHighlighter {
    /// Creates a new highlighter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Highlights a line of input.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.is_empty() {
            return Cow::Borrowed(line);
        }
        let mut out = String::with_capacity(line.len() * 2);
        let mut chars = line.char_indices().peekable();
        let mut at_statement_start = true;

        while let Some((i, c)) = chars.next() {
            match c {
                '/' if line[i..].starts_with("//") => {
                    let end = line[i..].find('\n').map_or(line.len(), |n| i + n);
                    paint(&mut out, COMMENT, &line[i..end]);
                    while chars.peek().is_some_and(|&(j, _)| j < end) {
                        chars.next();
                    }
                }
                '"' => {
                    let mut end = line.len();
                    let mut newline = false;
                    while let Some((j, d)) = chars.next() {
                        match d {
                            '^' => {
                                chars.next();
                            }
                            '"' => {
                                end = j + 1;
                                break;
                            }
                            '\n' => {
                                end = j;
                                newline = true;
                                break;
                            }
                            _ => {}
                        }
                    }
                    paint(&mut out, STRING, &line[i..end]);
                    if newline {
                        out.push('\n');
                    }
                    at_statement_start = newline;
                }
                '[' | ']' | '(' | ')' => {
                    paint(&mut out, BRACKET, &line[i..i + 1]);
                    at_statement_start = c == '[' || c == '(';
                }
                ';' | '\n' => {
                    out.push(c);
                    at_statement_start = true;
                }
                c if c.is_whitespace() => out.push(c),
                _ => {
                    let end = word_end(line, i);
                    while chars.peek().is_some_and(|&(j, _)| j < end) {
                        chars.next();
                    }
                    let word = &line[i..end];
                    let color = if word.starts_with(['$', '@']) {
                        LOOKUP
                    } else if looks_numeric(word) {
                        NUMBER
                    } else if at_statement_start {
                        COMMAND
                    } else {
                        ""
                    };
                    paint(&mut out, color, word);
                    at_statement_start = false;
                }
            }
        }
        Cow::Owned(out)
    }
}

fn paint(out: &mut String, color: &str, text: &str) {
    if color.is_empty() {
        out.push_str(text);
    } else {
        out.push_str(color);
        out.push_str(text);
        out.push_str(RESET);
    }
}

fn word_end(line: &str, start: usize) -> usize {
    line[start..]
        .find(|c: char| c.is_whitespace() || matches!(c, '"' | ';' | '[' | ']' | '(' | ')'))
        .map_or(line.len(), |n| start + n)
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix(['-', '+']).unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit())
        || (digits.starts_with('.') && digits[1..].starts_with(|c: char| c.is_ascii_digit()))
}
