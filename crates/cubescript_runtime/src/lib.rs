//! REPL, CLI, and state persistence for cubescript.
//!
//! This crate provides:
//! - [`Repl`] - Interactive read-eval-print loop
//! - [`LineEditor`] - The editor seam, with a rustyline implementation
//! - [`Snapshot`] - Binary save and restore of persistent state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod editor;
pub mod highlight;
pub mod repl;
pub mod snapshot;

pub use editor::{LineEditor, ReadResult, RustylineEditor, is_complete};
pub use highlight::CubescriptHighlighter;
pub use repl::Repl;
pub use snapshot::{Snapshot, VarValue, load_from_file, save_to_file};
