//! Shared building blocks for the cubescript language.
//!
//! This crate provides:
//! - [`Error`] - Rich error types with context, used for diagnostics
//! - Number parsing and formatting with C conventions ([`parse_int`], [`format_float`])
//! - Word, string and escape scanning ([`parse_word`], [`escape_string`])
//! - Whitespace-separated list parsing ([`ListParser`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod list;
pub mod number;
pub mod text;

pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use list::{ListItem, ListParser, explode_list, list_includes, list_len, parse_list};
pub use number::{
    check_number, format_float, format_general, format_int, parse_float, parse_float_prefix,
    parse_int, parse_int_prefix, str_truthy,
};
pub use text::{
    MAX_BRACKET_DEPTH, escape_id, escape_string, parse_string, parse_word, skip_comments,
    unescape_string, validate_block,
};
