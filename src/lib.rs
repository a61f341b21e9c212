//! cubescript - Embeddable console command language
//!
//! This crate re-exports all layers of the cubescript system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: cubescript_runtime    - REPL, CLI, snapshots
//! Layer 2: cubescript_stdlib     - Standard library commands
//! Layer 1: cubescript_language   - Registry, compiler, bytecode VM
//! Layer 0: cubescript_foundation - Errors, numbers, strings, lists
//! ```

pub use cubescript_foundation as foundation;
pub use cubescript_language as language;
pub use cubescript_runtime as runtime;
pub use cubescript_stdlib as stdlib;
