//! Integration tests for Layer 1: Language
//!
//! Tests for the embedding API, value coercion, and compiler/VM scenarios.

mod embedding;
mod scenarios;
mod values;
