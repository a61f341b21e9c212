//! Identifier registry.
//!
//! Every name a script can mention lives here: native commands, host
//! variables, aliases, and the numbered argument aliases `arg1`..`arg25`.
//! Identifiers are never removed, so an [`IdentId`] stays valid for the life
//! of the registry.
//!
//! The registry starts out buffering: definitions are queued and get no slot.
//! [`Registry::open`] allocates the argument aliases and the dummy identifier
//! first, so they always occupy the lowest indices, then flushes the queue.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::rc::Rc;

use cubescript_foundation::{Error, ErrorKind, Result, check_number};
use log::debug;

use crate::MAX_ARGS;
use crate::opcode::Code;
use crate::signature::Signature;
use crate::value::Value;
use crate::vm::Vm;

/// Name of the identifier that stands in for invalid names.
pub const DUMMY_NAME: &str = "//dummy";

/// Index of an identifier in its registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentId(u32);

impl IdentId {
    /// Creates an id from a raw slot index.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// The slot index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true for the numbered argument aliases.
    #[must_use]
    pub fn is_arg(self) -> bool {
        self.index() < MAX_ARGS
    }

    /// Bit of this argument alias in a call's used-argument mask.
    #[must_use]
    pub(crate) fn arg_bit(self) -> u32 {
        1 << self.0
    }
}

/// Identifier flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IdentFlags(u16);

impl IdentFlags {
    /// Saved by `writecfg`.
    pub const PERSIST: Self = Self(1 << 0);
    /// Writes from scripts shadow the value instead of replacing it.
    pub const OVERRIDE: Self = Self(1 << 1);
    /// Printed in hexadecimal; accepts `r g b` triples.
    pub const HEX: Self = Self(1 << 2);
    /// Scripts cannot write it.
    pub const READ_ONLY: Self = Self(1 << 3);
    /// Currently holds an override value.
    pub const OVERRIDDEN: Self = Self(1 << 4);
    /// Implicitly created by a reference; not yet assigned.
    pub const UNKNOWN: Self = Self(1 << 5);
    /// One of the numbered argument aliases.
    pub const ARG: Self = Self(1 << 6);

    /// No flags.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any flag in `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Sets the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the flags in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for IdentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for IdentFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for IdentFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for IdentFlags {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for IdentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(IdentFlags, &str); 7] = [
            (IdentFlags::PERSIST, "PERSIST"),
            (IdentFlags::OVERRIDE, "OVERRIDE"),
            (IdentFlags::HEX, "HEX"),
            (IdentFlags::READ_ONLY, "READ_ONLY"),
            (IdentFlags::OVERRIDDEN, "OVERRIDDEN"),
            (IdentFlags::UNKNOWN, "UNKNOWN"),
            (IdentFlags::ARG, "ARG"),
        ];
        let set: Vec<_> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "IdentFlags({})", set.join(" | "))
    }
}

/// Native command implementation. Receives the VM and the coerced argument
/// slice, and returns the command's result.
pub type CommandFn = Rc<dyn Fn(&mut Vm, &[Value]) -> Value>;

/// Called after a host variable changes.
pub type ChangeFn = Rc<dyn Fn(&mut Vm)>;

/// Host storage for an integer variable.
pub type IntStorage = Rc<Cell<i64>>;
/// Host storage for a float variable.
pub type FloatStorage = Rc<Cell<f64>>;
/// Host storage for a string variable.
pub type StrStorage = Rc<RefCell<String>>;

/// Keyword forms the compiler lowers to dedicated instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Form {
    /// Ordinary native command.
    Plain,
    /// `local`
    Local,
    /// `do`
    Do,
    /// `doargs`
    DoArgs,
    /// `if`
    If,
    /// `result`
    Result,
    /// `!`
    Not,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// A native command.
#[derive(Clone)]
pub struct Command {
    /// How the compiler lowers calls.
    pub form: Form,
    /// Parsed argument signature.
    pub signature: Rc<Signature>,
    pub(crate) func: Option<CommandFn>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("form", &self.form)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// An integer host variable.
#[derive(Clone)]
pub struct IntVar {
    /// Lower bound.
    pub min: i64,
    /// Upper bound.
    pub max: i64,
    /// Shared storage.
    pub storage: IntStorage,
    pub(crate) on_change: Option<ChangeFn>,
    pub(crate) saved: i64,
}

/// A float host variable.
#[derive(Clone)]
pub struct FloatVar {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Shared storage.
    pub storage: FloatStorage,
    pub(crate) on_change: Option<ChangeFn>,
    pub(crate) saved: f64,
}

/// A string host variable.
#[derive(Clone)]
pub struct StrVar {
    /// Shared storage.
    pub storage: StrStorage,
    pub(crate) on_change: Option<ChangeFn>,
    pub(crate) saved: String,
}

/// A script alias.
#[derive(Clone, Debug, Default)]
pub struct Alias {
    /// Current value.
    pub value: Value,
    pub(crate) stack: Vec<Value>,
    pub(crate) code: Option<Code>,
}

impl Alias {
    /// Number of saved bindings below the current value.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Payload of an identifier.
#[derive(Clone)]
pub enum IdentKind {
    /// Integer variable.
    Int(IntVar),
    /// Float variable.
    Float(FloatVar),
    /// String variable.
    Str(StrVar),
    /// Native command or keyword.
    Command(Command),
    /// Script alias.
    Alias(Alias),
}

impl fmt::Debug for IdentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "Int({}..{} = {})", v.min, v.max, v.storage.get()),
            Self::Float(v) => write!(f, "Float({}..{} = {})", v.min, v.max, v.storage.get()),
            Self::Str(v) => write!(f, "Str({:?})", v.storage.borrow()),
            Self::Command(c) => c.fmt(f),
            Self::Alias(a) => a.fmt(f),
        }
    }
}

impl IdentKind {
    /// Returns true if both payloads are the same kind of identifier.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A named entry in the registry.
#[derive(Clone, Debug)]
pub struct Ident {
    name: Rc<str>,
    /// Flags.
    pub flags: IdentFlags,
    index: usize,
    /// Kind-specific payload.
    pub kind: IdentKind,
}

impl Ident {
    /// Creates an unregistered identifier.
    #[must_use]
    pub fn new(name: &str, flags: IdentFlags, kind: IdentKind) -> Self {
        Self {
            name: Rc::from(name),
            flags,
            index: 0,
            kind,
        }
    }

    /// Creates an alias.
    #[must_use]
    pub fn alias(name: &str, value: Value, flags: IdentFlags) -> Self {
        Self::new(
            name,
            flags,
            IdentKind::Alias(Alias {
                value,
                ..Alias::default()
            }),
        )
    }

    /// The identifier's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the name.
    #[must_use]
    pub fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    /// The identifier's slot.
    #[must_use]
    pub fn id(&self) -> IdentId {
        IdentId::from_index(self.index)
    }

    /// Returns true if the identifier has `flag`.
    #[must_use]
    pub fn has(&self, flag: IdentFlags) -> bool {
        self.flags.contains(flag)
    }

    /// An alias that scripts have mentioned but never assigned or bound.
    pub(crate) fn is_placeholder(&self) -> bool {
        self.has(IdentFlags::UNKNOWN)
            && !self.name.starts_with("//")
            && self.as_alias().is_some_and(|a| a.stack.is_empty())
    }

    /// The alias payload, if this is an alias.
    #[must_use]
    pub fn as_alias(&self) -> Option<&Alias> {
        match &self.kind {
            IdentKind::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    pub(crate) fn as_alias_mut(&mut self) -> Option<&mut Alias> {
        match &mut self.kind {
            IdentKind::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    /// The command payload, if this is a command or keyword.
    #[must_use]
    pub fn as_command(&self) -> Option<&Command> {
        match &self.kind {
            IdentKind::Command(command) => Some(command),
            _ => None,
        }
    }

    /// Returns true for host variables of any type.
    #[must_use]
    pub fn is_var(&self) -> bool {
        matches!(
            self.kind,
            IdentKind::Int(_) | IdentKind::Float(_) | IdentKind::Str(_)
        )
    }

    /// Reads a variable or alias as text.
    #[must_use]
    pub fn value_str(&self) -> String {
        match &self.kind {
            IdentKind::Int(v) => v.storage.get().to_string(),
            IdentKind::Float(v) => cubescript_foundation::format_float(v.storage.get()),
            IdentKind::Str(v) => v.storage.borrow().clone(),
            IdentKind::Alias(a) => a.value.get_str().into_owned(),
            IdentKind::Command(_) => String::new(),
        }
    }
}

fn redefinition(ident: &Ident) -> Error {
    let name = ident.name.to_string();
    match ident.kind {
        IdentKind::Command(_) => Error::new(ErrorKind::RedefineCommand(name)),
        _ => Error::new(ErrorKind::RedefineVariable(name)),
    }
}

/// Lifecycle of the registry.
#[derive(Debug, Default)]
enum State {
    #[default]
    Buffering,
    Open,
}

/// The name table.
#[derive(Debug, Default)]
pub struct Registry {
    idents: Vec<Ident>,
    names: HashMap<Rc<str>, IdentId>,
    pending: Vec<Ident>,
    state: State,
}

impl Registry {
    /// Creates a buffering registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`Registry::open`] has run.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open)
    }

    /// Allocates `arg1`..`arg25` and the dummy identifier, then registers
    /// everything that was defined while buffering. Opening twice is a no-op.
    pub fn open(&mut self) {
        if self.is_open() {
            return;
        }
        self.state = State::Open;
        for i in 1..=MAX_ARGS {
            self.insert(Ident::alias(&format!("arg{i}"), Value::Null, IdentFlags::ARG));
        }
        self.insert(Ident::alias(DUMMY_NAME, Value::Null, IdentFlags::UNKNOWN));
        let pending = std::mem::take(&mut self.pending);
        debug!("opening registry with {} queued definitions", pending.len());
        for ident in pending {
            self.insert(ident);
        }
    }

    fn insert(&mut self, mut ident: Ident) -> IdentId {
        if let Some(&id) = self.names.get(&ident.name) {
            return id;
        }
        let id = IdentId::from_index(self.idents.len());
        ident.index = self.idents.len();
        self.names.insert(ident.name.clone(), id);
        self.idents.push(ident);
        id
    }

    /// Registers `ident`. Returns the existing id if the name is already
    /// taken by the same kind, and `None` while buffering. An alias that
    /// scripts have only mentioned (still flagged `UNKNOWN`) is replaced in
    /// place and keeps its slot.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidIdentifier`] for numeric-looking names;
    /// [`ErrorKind::RedefineVariable`] or [`ErrorKind::RedefineCommand`]
    /// when the name belongs to a different kind of identifier.
    pub fn define(&mut self, ident: Ident) -> Result<Option<IdentId>> {
        if check_number(&ident.name) {
            return Err(Error::new(ErrorKind::InvalidIdentifier(
                ident.name.to_string(),
            )));
        }
        match self.state {
            State::Open => {
                let Some(id) = self.lookup(&ident.name) else {
                    return Ok(Some(self.insert(ident)));
                };
                let existing = &self.idents[id.index()];
                if existing.kind.same_kind(&ident.kind) {
                    return Ok(Some(id));
                }
                if !existing.is_placeholder() {
                    return Err(redefinition(&ident));
                }
                debug!("upgrading placeholder alias {} in place", ident.name);
                self.replace(id, ident);
                Ok(Some(id))
            }
            State::Buffering => {
                if let Some(queued) = self.pending.iter().find(|p| p.name == ident.name) {
                    if !queued.kind.same_kind(&ident.kind) {
                        return Err(redefinition(&ident));
                    }
                    return Ok(None);
                }
                self.pending.push(ident);
                Ok(None)
            }
        }
    }

    /// Swaps a placeholder alias for `ident`. Cached alias bodies may have
    /// been compiled against the placeholder, so they are dropped.
    fn replace(&mut self, id: IdentId, mut ident: Ident) {
        ident.index = id.index();
        self.idents[id.index()] = ident;
        for other in &mut self.idents {
            if let IdentKind::Alias(alias) = &mut other.kind {
                alias.code = None;
            }
        }
    }

    /// Registers a native command.
    ///
    /// # Errors
    /// Signature errors, or [`ErrorKind::InvalidIdentifier`].
    pub fn bind_command(
        &mut self,
        name: &str,
        signature: &str,
        func: CommandFn,
    ) -> Result<Option<IdentId>> {
        self.bind_form(name, signature, Form::Plain, Some(func))
    }

    pub(crate) fn bind_form(
        &mut self,
        name: &str,
        signature: &str,
        form: Form,
        func: Option<CommandFn>,
    ) -> Result<Option<IdentId>> {
        let signature = Rc::new(Signature::parse(name, signature)?);
        self.define(Ident::new(
            name,
            IdentFlags::empty(),
            IdentKind::Command(Command {
                form,
                signature,
                func,
            }),
        ))
    }

    /// Registers an integer variable over host storage. A variable with
    /// `min > max` is read-only.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidIdentifier`] for numeric-looking names.
    pub fn bind_int_var(
        &mut self,
        name: &str,
        (min, max): (i64, i64),
        storage: IntStorage,
        on_change: Option<ChangeFn>,
        mut flags: IdentFlags,
    ) -> Result<Option<IdentId>> {
        if min > max {
            flags |= IdentFlags::READ_ONLY;
        }
        let saved = storage.get();
        self.define(Ident::new(
            name,
            flags,
            IdentKind::Int(IntVar {
                min,
                max,
                storage,
                on_change,
                saved,
            }),
        ))
    }

    /// Registers a float variable over host storage.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidIdentifier`] for numeric-looking names.
    pub fn bind_float_var(
        &mut self,
        name: &str,
        (min, max): (f64, f64),
        storage: FloatStorage,
        on_change: Option<ChangeFn>,
        mut flags: IdentFlags,
    ) -> Result<Option<IdentId>> {
        if min > max {
            flags |= IdentFlags::READ_ONLY;
        }
        let saved = storage.get();
        self.define(Ident::new(
            name,
            flags,
            IdentKind::Float(FloatVar {
                min,
                max,
                storage,
                on_change,
                saved,
            }),
        ))
    }

    /// Registers a string variable over host storage.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidIdentifier`] for numeric-looking names.
    pub fn bind_string_var(
        &mut self,
        name: &str,
        storage: StrStorage,
        on_change: Option<ChangeFn>,
        flags: IdentFlags,
    ) -> Result<Option<IdentId>> {
        let saved = storage.borrow().clone();
        self.define(Ident::new(
            name,
            flags,
            IdentKind::Str(StrVar {
                storage,
                on_change,
                saved,
            }),
        ))
    }

    /// Looks up a name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<IdentId> {
        self.names.get(name).copied()
    }

    /// Looks up a name, creating an alias with `flags` if it is missing.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidIdentifier`] for numeric-looking names, and
    /// [`ErrorKind::Internal`] while the registry is still buffering.
    pub fn new_ident(&mut self, name: &str, flags: IdentFlags) -> Result<IdentId> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        if check_number(name) {
            return Err(Error::new(ErrorKind::InvalidIdentifier(name.to_string())));
        }
        if !self.is_open() {
            return Err(Error::new(ErrorKind::Internal(
                "registry is not open".to_string(),
            )));
        }
        Ok(self.insert(Ident::alias(name, Value::Null, flags)))
    }

    /// The dummy identifier.
    #[must_use]
    pub fn dummy(&self) -> IdentId {
        IdentId::from_index(MAX_ARGS)
    }

    /// Returns the identifier for `id`.
    ///
    /// # Panics
    /// Panics if `id` did not come from this registry.
    #[must_use]
    pub fn ident(&self, id: IdentId) -> &Ident {
        &self.idents[id.index()]
    }

    pub(crate) fn ident_mut(&mut self, id: IdentId) -> &mut Ident {
        &mut self.idents[id.index()]
    }

    /// Installs the change callback of the variable `id`.
    pub(crate) fn set_on_change(&mut self, id: IdentId, change: ChangeFn) {
        match &mut self.ident_mut(id).kind {
            IdentKind::Int(v) => v.on_change = Some(change),
            IdentKind::Float(v) => v.on_change = Some(change),
            IdentKind::Str(v) => v.on_change = Some(change),
            IdentKind::Command(_) | IdentKind::Alias(_) => {}
        }
    }

    /// Returns the identifier for `id`, if it exists.
    #[must_use]
    pub fn get(&self, id: IdentId) -> Option<&Ident> {
        self.idents.get(id.index())
    }

    /// Returns the identifier called `name`.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Ident> {
        self.lookup(name).map(|id| self.ident(id))
    }

    /// The argument alias for slot `i` (`arg{i+1}`).
    #[must_use]
    pub fn arg(i: usize) -> IdentId {
        IdentId::from_index(i)
    }

    /// Number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idents.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }

    /// Number of definitions waiting for [`Registry::open`].
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Iterates over registered identifiers in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Ident> {
        self.idents.iter()
    }

    /// Names starting with `prefix`, sorted, skipping the argument aliases
    /// and internal names.
    #[must_use]
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .idents
            .iter()
            .filter(|id| !id.has(IdentFlags::ARG) && !id.name.starts_with("//"))
            .map(Ident::name)
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> CommandFn {
        Rc::new(|_, _| Value::Null)
    }

    #[test]
    fn open_allocates_args_then_dummy() {
        let mut reg = Registry::new();
        reg.open();
        assert_eq!(reg.lookup("arg1"), Some(IdentId::from_index(0)));
        assert_eq!(reg.lookup("arg25"), Some(IdentId::from_index(24)));
        assert_eq!(reg.lookup(DUMMY_NAME), Some(reg.dummy()));
        assert!(reg.ident(reg.dummy()).has(IdentFlags::UNKNOWN));
        assert!(reg.ident(Registry::arg(3)).has(IdentFlags::ARG));
    }

    #[test]
    fn buffered_definitions_follow_builtin_slots() {
        let mut reg = Registry::new();
        assert_eq!(reg.bind_command("first", "", noop()).unwrap(), None);
        assert_eq!(reg.bind_command("second", "i", noop()).unwrap(), None);
        assert_eq!(reg.pending(), 2);
        assert_eq!(reg.lookup("first"), None);

        reg.open();
        assert_eq!(reg.pending(), 0);
        assert_eq!(reg.lookup("first"), Some(IdentId::from_index(MAX_ARGS + 1)));
        assert_eq!(reg.lookup("second"), Some(IdentId::from_index(MAX_ARGS + 2)));
    }

    #[test]
    fn define_is_idempotent() {
        let mut reg = Registry::new();
        reg.open();
        let a = reg.bind_command("cmd", "s", noop()).unwrap();
        let len = reg.len();
        let b = reg.bind_command("cmd", "s", noop()).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), len);
    }

    #[test]
    fn define_rejects_a_different_kind() {
        let mut reg = Registry::new();
        reg.open();
        reg.bind_command("cmd", "s", noop()).unwrap();
        let err = reg
            .bind_int_var("cmd", (0, 1), Rc::new(Cell::new(0)), None, IdentFlags::empty())
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot redefine cmd as a variable");

        reg.bind_string_var("text", Rc::new(RefCell::new(String::new())), None, IdentFlags::empty())
            .unwrap();
        let err = reg.bind_command("text", "", noop()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RedefineCommand("text".to_string()));
    }

    #[test]
    fn buffered_define_rejects_a_different_kind() {
        let mut reg = Registry::new();
        reg.bind_command("queued", "", noop()).unwrap();
        assert_eq!(reg.bind_command("queued", "", noop()).unwrap(), None);
        assert!(
            reg.bind_float_var("queued", (0.0, 1.0), Rc::new(Cell::new(0.0)), None, IdentFlags::empty())
                .is_err()
        );
        assert_eq!(reg.pending(), 1);
    }

    #[test]
    fn placeholder_alias_is_upgraded_in_place() {
        let mut reg = Registry::new();
        reg.open();
        let id = reg.new_ident("later", IdentFlags::UNKNOWN).unwrap();
        let len = reg.len();
        let bound = reg
            .bind_int_var("later", (0, 9), Rc::new(Cell::new(4)), None, IdentFlags::PERSIST)
            .unwrap();
        assert_eq!(bound, Some(id));
        assert_eq!(reg.len(), len);
        let ident = reg.ident(id);
        assert!(matches!(ident.kind, IdentKind::Int(_)));
        assert_eq!(ident.id(), id);
        assert!(ident.has(IdentFlags::PERSIST));
        assert!(!ident.has(IdentFlags::UNKNOWN));
    }

    #[test]
    fn numeric_names_are_rejected() {
        let mut reg = Registry::new();
        reg.open();
        let err = reg.new_ident("5x", IdentFlags::UNKNOWN).unwrap_err();
        assert_eq!(err.to_string(), "number 5x is not a valid identifier name");
        assert!(reg.bind_command("-1", "", noop()).is_err());
    }

    #[test]
    fn new_ident_creates_unknown_alias() {
        let mut reg = Registry::new();
        reg.open();
        let id = reg.new_ident("fresh", IdentFlags::UNKNOWN).unwrap();
        let ident = reg.ident(id);
        assert!(ident.has(IdentFlags::UNKNOWN));
        assert!(ident.as_alias().is_some());
        assert_eq!(reg.new_ident("fresh", IdentFlags::empty()).unwrap(), id);
    }

    #[test]
    fn new_ident_requires_open_registry() {
        let mut reg = Registry::new();
        assert!(reg.new_ident("early", IdentFlags::empty()).is_err());
    }

    #[test]
    fn inverted_bounds_are_read_only() {
        let mut reg = Registry::new();
        reg.open();
        let storage = Rc::new(Cell::new(3));
        let id = reg
            .bind_int_var("fixed", (10, 0), storage, None, IdentFlags::empty())
            .unwrap()
            .unwrap();
        assert!(reg.ident(id).has(IdentFlags::READ_ONLY));
    }

    #[test]
    fn flags_operations() {
        let mut flags = IdentFlags::PERSIST | IdentFlags::HEX;
        assert!(flags.contains(IdentFlags::HEX));
        assert!(!flags.contains(IdentFlags::HEX | IdentFlags::ARG));
        flags.remove(IdentFlags::HEX);
        assert_eq!(flags, IdentFlags::PERSIST);
        assert!((flags & IdentFlags::OVERRIDDEN).is_empty());
    }

    #[test]
    fn completion_names_skip_internal_idents() {
        let mut reg = Registry::new();
        reg.open();
        reg.bind_command("echo", "C", noop()).unwrap();
        reg.bind_command("escape", "s", noop()).unwrap();
        assert_eq!(reg.names_with_prefix("e"), vec!["echo", "escape"]);
        assert!(reg.names_with_prefix("arg").is_empty());
    }
}
