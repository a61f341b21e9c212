//! Integration tests for Layer 3: Runtime
//!
//! Persistence round trips and scripted REPL sessions.

mod persistence;
mod repl;
