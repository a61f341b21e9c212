//! Script files and saved configuration.
//!
//! `writecfg` saves every persistent variable and persistent alias as a
//! script that restores them when executed:
//!
//! ```text
//! // automatically written on exit, DO NOT MODIFY
//! ...
//! sensitivity 3.5
//! name "player"
//!
//! greet = [echo hello]
//! ```
//!
//! Overridden aliases and empty aliases are skipped. Alias text that would
//! not survive a round trip inside `[...]` is written as a quoted string.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use cubescript_foundation::{
    Error, ErrorKind, Result, escape_id, escape_string, format_float, validate_block,
};
use cubescript_language::{IdentFlags, IdentKind, Value, Vm};
use log::{debug, info};

use crate::arg;

/// File written by `writecfg` without an argument.
pub const DEFAULT_CONFIG: &str = "config.cfg";

const HEADER: &str = "\
// automatically written on exit, DO NOT MODIFY
// delete this file to have defaults overwrite these settings
// modify settings in game, or put settings in autoexec to override anything
";

/// Runs the script file at `path`. Returns false if it could not be read;
/// with `report_missing` a diagnostic is recorded too.
pub fn exec_file(vm: &mut Vm, path: impl AsRef<Path>, report_missing: bool) -> bool {
    let path = path.as_ref();
    let name = path.display().to_string();
    match fs::read_to_string(path) {
        Ok(text) => {
            info!("executing {name}");
            vm.execute_source(&name, &text);
            true
        }
        Err(err) => {
            debug!("cannot read {name}: {err}");
            if report_missing {
                vm.report(Error::new(ErrorKind::FileNotFound(name)));
            }
            false
        }
    }
}

/// Runs a saved configuration. Aliases it defines are persistent, so a
/// later `writecfg` writes them out again.
pub fn exec_config(vm: &mut Vm, path: impl AsRef<Path>) -> bool {
    let flags = vm.ident_flags();
    vm.set_ident_flags(flags | IdentFlags::PERSIST);
    let found = exec_file(vm, path, false);
    vm.set_ident_flags(flags);
    found
}

/// Renders the persistent state of `vm` in the `writecfg` format.
#[must_use]
pub fn config_text(vm: &Vm) -> String {
    let mut idents: Vec<_> = vm
        .registry()
        .iter()
        .filter(|ident| ident.has(IdentFlags::PERSIST))
        .collect();
    idents.sort_by(|a, b| a.name().cmp(b.name()));

    let mut out = String::from(HEADER);
    out.push('\n');
    for ident in &idents {
        let name = escape_id(ident.name());
        let _ = match &ident.kind {
            IdentKind::Int(v) => writeln!(out, "{name} {}", v.storage.get()),
            IdentKind::Float(v) => writeln!(out, "{name} {}", format_float(v.storage.get())),
            IdentKind::Str(v) => writeln!(out, "{name} {}", escape_string(&v.storage.borrow())),
            _ => Ok(()),
        };
    }
    out.push('\n');
    for ident in &idents {
        let IdentKind::Alias(alias) = &ident.kind else {
            continue;
        };
        if ident.has(IdentFlags::OVERRIDDEN) {
            continue;
        }
        let text = alias.value.get_str();
        if text.is_empty() {
            continue;
        }
        let name = escape_id(ident.name());
        let _ = if validate_block(&text) {
            writeln!(out, "{name} = [{text}]")
        } else {
            writeln!(out, "{name} = {}", escape_string(&text))
        };
    }
    out
}

/// Writes [`config_text`] to `path`.
///
/// # Errors
/// Returns an I/O error if the file cannot be written.
pub fn write_config(vm: &Vm, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, config_text(vm)).map_err(|err| Error::io(path.display().to_string(), &err))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Registers `exec`, `writecfg` and `changedvars`.
///
/// # Errors
/// Fails only on a malformed signature.
pub fn register(vm: &mut Vm) -> Result<()> {
    vm.register_command("exec", "sb", |vm, args| {
        let path = arg(args, 0).get_str().into_owned();
        let report = arg(args, 1).get_int() != 0;
        Value::from(exec_file(vm, path, report))
    })?;
    vm.register_command("writecfg", "s", |vm, args| {
        let name = arg(args, 0).get_str();
        let path = if name.is_empty() { DEFAULT_CONFIG } else { &*name };
        if let Err(err) = write_config(vm, path) {
            vm.report(err);
        }
        Value::Null
    })?;
    vm.register_command("changedvars", "", |vm, _| {
        let mut changed: Vec<_> = vm
            .registry()
            .iter()
            .filter(|ident| ident.has(IdentFlags::OVERRIDDEN))
            .map(|ident| (ident.name().to_string(), ident.id()))
            .collect();
        changed.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, id) in changed {
            vm.print_var(id);
        }
        Value::Null
    })?;
    Ok(())
}
