//! Integration tests for Layer 0: Foundation
//!
//! Tests for number parsing and formatting, string escapes, list parsing and
//! error rendering.

mod errors;
mod lists;
mod numbers;
mod text;
