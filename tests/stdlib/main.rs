//! Integration tests for Layer 2: Standard library
//!
//! Whole scripts over the registered command tables.

mod commands;
mod scripts;
