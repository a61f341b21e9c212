//! Binary snapshots of persistent state using `MessagePack`.
//!
//! A [`Snapshot`] holds the same state `writecfg` writes (persistent
//! variables and persistent aliases) but restores it without compiling
//! any script text.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use cubescript_foundation::{Error, ErrorKind, Result};
use cubescript_language::{IdentFlags, IdentKind, Value, Vm};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The saved value of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    /// Integer variable.
    Int(i64),
    /// Float variable.
    Float(f64),
    /// String variable.
    Str(String),
}

/// Persistent variables and aliases of a VM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// Persistent variables by name, sorted.
    pub vars: Vec<(String, VarValue)>,
    /// Persistent alias bodies by name, sorted.
    pub aliases: Vec<(String, String)>,
}

impl Snapshot {
    /// Captures the persistent state of `vm`.
    ///
    /// Overridden aliases and empty aliases are left out, as in `writecfg`.
    #[must_use]
    pub fn capture(vm: &Vm) -> Self {
        let mut snapshot = Self {
            version: SNAPSHOT_VERSION,
            ..Self::default()
        };
        for ident in vm.registry().iter() {
            if !ident.has(IdentFlags::PERSIST) {
                continue;
            }
            let name = ident.name().to_string();
            match &ident.kind {
                IdentKind::Int(v) => snapshot.vars.push((name, VarValue::Int(v.storage.get()))),
                IdentKind::Float(v) => {
                    snapshot.vars.push((name, VarValue::Float(v.storage.get())));
                }
                IdentKind::Str(v) => {
                    snapshot.vars.push((name, VarValue::Str(v.storage.borrow().clone())));
                }
                IdentKind::Alias(alias) if !ident.has(IdentFlags::OVERRIDDEN) => {
                    let text = alias.value.get_str();
                    if !text.is_empty() {
                        snapshot.aliases.push((name, text.into_owned()));
                    }
                }
                _ => {}
            }
        }
        snapshot.vars.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot.aliases.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Restores this snapshot into `vm`.
    ///
    /// Variables must already be defined; values are clamped to their
    /// ranges and change callbacks run. Variables that no longer exist, or
    /// changed type, are skipped. Aliases are created persistent.
    pub fn apply(&self, vm: &mut Vm) {
        for (name, value) in &self.vars {
            let kind = vm.registry().get_by_name(name).map(|ident| &ident.kind);
            match (kind, value) {
                (Some(IdentKind::Int(_)), VarValue::Int(v)) => vm.set_var(name, *v, true, true),
                (Some(IdentKind::Float(_)), VarValue::Float(v)) => {
                    vm.set_fvar(name, *v, true, true);
                }
                (Some(IdentKind::Str(_)), VarValue::Str(v)) => vm.set_svar(name, v, true),
                _ => debug!("snapshot variable {name} skipped"),
            }
        }

        let flags = vm.ident_flags();
        vm.set_ident_flags(IdentFlags::PERSIST);
        for (name, body) in &self.aliases {
            vm.set_alias(name, Value::str(body));
        }
        vm.set_ident_flags(flags);
    }
}

/// Serializes a snapshot to bytes using `MessagePack` format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(snapshot)
        .map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))
}

/// Deserializes a snapshot from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a snapshot, or were written by a
/// newer format version.
pub fn from_bytes(bytes: &[u8]) -> Result<Snapshot> {
    let snapshot: Snapshot = rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(Error::new(ErrorKind::Serialization(format!(
            "unsupported snapshot version {}",
            snapshot.version
        ))));
    }
    Ok(snapshot)
}

/// Captures `vm` and saves the snapshot to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to,
/// or if serialization fails.
pub fn save_to_file<P: AsRef<Path>>(vm: &Vm, path: P) -> Result<()> {
    let path = path.as_ref();
    let io_error = |e: std::io::Error| Error::io(path.display().to_string(), &e);

    let bytes = to_bytes(&Snapshot::capture(vm))?;
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    writer.write_all(&bytes).map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    debug!("saved snapshot to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Loads a snapshot from a file and applies it to `vm`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or if deserialization fails.
pub fn load_from_file<P: AsRef<Path>>(vm: &mut Vm, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path.display().to_string(), &e))?;

    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| Error::io(path.display().to_string(), &e))?;

    let snapshot = from_bytes(&bytes).inspect_err(|e| warn!("{}: {e}", path.display()))?;
    snapshot.apply(vm);
    Ok(())
}
