//! Standard library commands for cubescript.
//!
//! This crate registers the commands scripts expect on top of the engine
//! builtins, organized by category:
//! - [`math`] - Integer, float and bitwise arithmetic, comparisons, trigonometry
//! - [`control`] - Conditionals, loops, random numbers
//! - [`string`] - String comparison and manipulation, `echo`, `format`
//! - [`list`] - Whitespace-separated list queries, iteration and set operations
//! - [`io`] - `exec`, `writecfg` and `changedvars`
//!
//! Call [`register_all`] once on a fresh [`Vm`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod control;
pub mod io;
mod iter;
pub mod list;
pub mod math;
pub mod string;

use cubescript_foundation::Result;
use cubescript_language::{Value, Vm};

pub use io::{DEFAULT_CONFIG, config_text, exec_config, exec_file, write_config};

/// Registers every standard library command.
///
/// # Errors
/// Returns the first registration failure, which means a command table
/// holds a malformed signature.
pub fn register_all(vm: &mut Vm) -> Result<()> {
    math::register(vm)?;
    control::register(vm)?;
    string::register(vm)?;
    list::register(vm)?;
    io::register(vm)?;
    log::debug!("standard library registered");
    Ok(())
}

/// Returns a [`Vm`] with the standard library registered.
///
/// # Errors
/// See [`register_all`].
pub fn standard_vm() -> Result<Vm> {
    let mut vm = Vm::new();
    register_all(&mut vm)?;
    Ok(vm)
}

/// The `i`-th argument, or null.
pub(crate) fn arg(args: &[Value], i: usize) -> &Value {
    const NULL: &Value = &Value::Null;
    args.get(i).unwrap_or(NULL)
}
