//! Identifier registry, compiler, and bytecode VM for cubescript.
//!
//! This crate provides:
//! - [`Value`] - The dynamically typed value scripts pass around
//! - [`Registry`] - Commands, variables and aliases by name and slot
//! - [`Compiler`] - Single-pass compilation of source text to [`Code`]
//! - [`Vm`] - The interpreter, with alias scoping and the engine builtins

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod compiler;
pub mod ident;
pub mod opcode;
pub mod signature;
pub mod value;
pub mod vm;


/// Number of argument aliases (`arg1`..`arg25`), and the most arguments a
/// command or alias call can take.
pub const MAX_ARGS: usize = 25;

/// Extra stack slots a statement may use for results it discards.
pub const MAX_RESULTS: usize = 7;

/// Default nesting limit for alias calls and blocks.
pub const MAX_RUN_DEPTH: usize = 255;

pub use compiler::{Compiled, Compiler, compile};
pub use ident::{
    Alias, ChangeFn, Command, CommandFn, FloatStorage, Form, Ident, IdentFlags, IdentId,
    IdentKind, IntStorage, Registry, StrStorage,
};
pub use opcode::{Code, Opcode, Ret};
pub use signature::{ArgKind, Signature};
pub use value::Value;
pub use vm::{MAX_TRIGGERS, Vm, VmConfig};
