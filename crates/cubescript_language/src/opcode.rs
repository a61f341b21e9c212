//! Bytecode instruction set for the cubescript VM.
//!
//! Code is a flat instruction list. Each invocation of the VM keeps its own
//! argument stack: most instructions push arguments, and calls consume the
//! top `n` of them. Every compiled program starts with [`Opcode::Start`] and
//! every block ends with an [`Opcode::Exit`].

#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

use std::fmt;
use std::rc::Rc;

use crate::ident::IdentId;

/// Result type an instruction coerces its output to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Ret {
    /// Leave the value as it is.
    #[default]
    Null,
    /// Coerce to an integer.
    Int,
    /// Coerce to a float.
    Float,
    /// Coerce to a string.
    Str,
}

/// What the compiler wants an argument to become. The order matters: every
/// kind from `Any` on is a "wide" kind that keeps strings as strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum WordType {
    Int,
    Float,
    Str,
    Any,
    Code,
    Ident,
    CStr,
    CAny,
    Word,
    Pop,
    Cond,
}

impl WordType {
    /// The result type for this word type, with `default` standing in for
    /// wide kinds other than `CStr`.
    pub(crate) fn ret_or(self, default: Ret) -> Ret {
        match self {
            Self::Int => Ret::Int,
            Self::Float => Ret::Float,
            Self::Str => Ret::Str,
            Self::CStr => Ret::Str,
            _ => default,
        }
    }

    pub(crate) fn ret_any(self) -> Ret {
        self.ret_or(Ret::Null)
    }

    pub(crate) fn ret_int(self) -> Ret {
        self.ret_or(Ret::Int)
    }

    pub(crate) fn ret_float(self) -> Ret {
        self.ret_or(Ret::Float)
    }

    /// Wide kinds read as strings.
    pub(crate) fn ret_string(self) -> Ret {
        if self >= Self::Any {
            Ret::Str
        } else {
            self.ret_any()
        }
    }
}

/// A string of at most three bytes stored inside the instruction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortStr {
    len: u8,
    bytes: [u8; 3],
}

impl ShortStr {
    /// Maximum length in bytes.
    pub const MAX_LEN: usize = 3;

    /// Packs `s`, or returns `None` when it is too long.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        if s.len() > Self::MAX_LEN {
            return None;
        }
        let mut bytes = [0; 3];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Some(Self {
            len: s.len() as u8,
            bytes,
        })
    }

    /// The packed text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or_default()
    }
}

impl fmt::Debug for ShortStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Literal small enough to live inside the instruction (`ValI`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Inline {
    /// Null.
    Null,
    /// Integer in `-0x800000..=0x7FFFFF`.
    Int(i32),
    /// Integral float in the same range.
    Float(i32),
    /// String of at most three bytes.
    Str(ShortStr),
}

/// Literal stored out of line (`Val`).
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// Any integer.
    Int(i64),
    /// Any float.
    Float(f64),
    /// Any string.
    Str(Rc<str>),
}

/// Smallest integer an inline literal holds.
pub const INLINE_MIN: i64 = -0x80_0000;
/// Largest integer an inline literal holds.
pub const INLINE_MAX: i64 = 0x7F_FFFF;

/// A single bytecode instruction.
///
/// Jump lengths are relative to the instruction after the jump. `argc`
/// counts arguments on the invocation's argument stack.
#[derive(Clone, Debug, PartialEq)]
pub enum Opcode {
    // === Framing ===
    /// First instruction of a compiled program.
    Start,
    /// Follows a [`Opcode::Block`]; the block's code starts after it.
    Offset,
    /// Push a code value for the following block, then skip `len` instructions.
    Block(usize),
    /// Push an empty code value.
    Empty(Ret),
    /// Run the following code in a nested invocation and push its result.
    Enter,
    /// Run the following code in a nested invocation into the result.
    EnterResult,
    /// End the current invocation, coercing the result.
    Exit(Ret),

    // === Results ===
    /// Set the result to the zero value of a type.
    Null(Ret),
    /// Set the result to true.
    True(Ret),
    /// Set the result to false.
    False(Ret),
    /// Pop an argument and set the result to its negation.
    Not(Ret),
    /// Pop an argument into the result.
    Result(Ret),
    /// Push the result as an argument and clear it.
    ResultArg(Ret),

    // === Arguments ===
    /// Pop and discard an argument.
    Pop,
    /// Push an out-of-line literal.
    Val(Literal),
    /// Push an inline literal.
    ValI(Inline),
    /// Push a macro fragment.
    Macro(Rc<str>),
    /// Push a coerced copy of the top argument.
    Dup(Ret),
    /// Coerce the top argument in place.
    Force(Ret),
    /// Compile the top argument into code.
    Compile,
    /// Compile the top argument into code if it is non-empty text.
    Cond,

    // === Identifiers ===
    /// Push an identifier.
    Ident(IdentId),
    /// Push an argument identifier, binding it to null if it is unbound.
    IdentArg(IdentId),
    /// Replace the top argument (a name) with the identifier it names.
    IdentU,

    // === Lookups ===
    /// Push an alias value.
    Lookup(IdentId, Ret),
    /// Push an argument alias value, or the zero value if unbound.
    LookupArg(IdentId, Ret),
    /// Replace the top argument (a name) with the value it names.
    LookupU(Ret),
    /// Push an alias value as a macro fragment.
    LookupM(IdentId, Ret),
    /// Push an argument alias value as a macro fragment.
    LookupMArg(IdentId, Ret),
    /// Like [`Opcode::LookupU`], keeping text as macro fragments.
    LookupMU(Ret),

    // === Variables ===
    /// Push a string variable.
    StrVar(IdentId, Ret),
    /// Push a string variable as a macro fragment.
    StrVarM(IdentId),
    /// Pop an argument into a string variable.
    StrVar1(IdentId),
    /// Push an integer variable.
    IntVar(IdentId, Ret),
    /// Pop an argument into an integer variable.
    IntVar1(IdentId),
    /// Pop two arguments into a hex variable as `(r << 16) | (g << 8)`.
    IntVar2(IdentId),
    /// Pop three arguments into a hex variable as `(r << 16) | (g << 8) | b`.
    IntVar3(IdentId),
    /// Push a float variable.
    FloatVar(IdentId, Ret),
    /// Pop an argument into a float variable.
    FloatVar1(IdentId),
    /// Print a variable.
    Print(IdentId),

    // === Calls ===
    /// Call a command with exactly its declared arguments.
    Com(IdentId, Ret),
    /// Call a command whose last argument is the release flag.
    ComD(IdentId, Ret),
    /// Call a command with its arguments joined by spaces.
    ComC {
        /// The command.
        id: IdentId,
        /// Argument count.
        argc: usize,
        /// Result type.
        ret: Ret,
    },
    /// Call a variadic command.
    ComV {
        /// The command.
        id: IdentId,
        /// Argument count.
        argc: usize,
        /// Result type.
        ret: Ret,
    },
    /// Join the top `n` arguments with spaces.
    ConC(usize, Ret),
    /// Join the top `n` arguments without separators.
    ConCW(usize, Ret),
    /// Join the top `n` arguments without separators into the result.
    ConCM(usize, Ret),
    /// Pop an argument into an alias.
    Alias(IdentId),
    /// Pop an argument into an argument alias.
    AliasArg(IdentId),
    /// Pop a name and a value, and assign by name.
    AliasU,
    /// Call an alias.
    Call {
        /// The alias.
        id: IdentId,
        /// Argument count.
        argc: usize,
    },
    /// Call an argument alias if it is bound.
    CallArg {
        /// The argument alias.
        id: IdentId,
        /// Argument count.
        argc: usize,
    },
    /// Call whatever the argument below the top `argc` names.
    CallU(usize),
    /// Bind the top `n` identifiers as locals for the rest of the block.
    Local(usize),
    /// Pop and run a code argument.
    Do(Ret),
    /// Pop and run a code argument with the caller's arguments visible.
    DoArgs(Ret),

    // === Control Flow ===
    /// Skip `len` instructions.
    Jump(usize),
    /// Pop an argument; skip `len` instructions if it is true.
    JumpTrue(usize),
    /// Pop an argument; skip `len` instructions if it is false.
    JumpFalse(usize),
    /// Pop an argument into the result (running it if it is code); skip if true.
    JumpResultTrue(usize),
    /// Pop an argument into the result (running it if it is code); skip if false.
    JumpResultFalse(usize),
}

/// Shared, immutable compiled code plus the index it starts at.
///
/// Blocks nested inside a program share the program's buffer.
#[derive(Clone)]
pub struct Code {
    ops: Rc<[Opcode]>,
    start: usize,
}

impl Code {
    /// Wraps an instruction buffer.
    #[must_use]
    pub fn new(ops: Rc<[Opcode]>, start: usize) -> Self {
        Self { ops, start }
    }

    /// Code that does nothing and returns the zero value of `ret`'s kind.
    #[must_use]
    pub fn empty(ret: Ret) -> Self {
        Self::new(Rc::from(vec![Opcode::Start, Opcode::Exit(ret)]), 1)
    }

    /// The whole shared buffer.
    #[must_use]
    pub fn ops(&self) -> &Rc<[Opcode]> {
        &self.ops
    }

    /// Index of the first instruction to run.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Instructions from the start onwards.
    #[must_use]
    pub fn instructions(&self) -> &[Opcode] {
        &self.ops[self.start..]
    }

    /// Returns true if the code exits straight away.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self.instructions().first(), Some(Opcode::Exit(_)))
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.ops, &other.ops) && self.start == other.start
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("start", &self.start)
            .field("len", &self.ops.len())
            .finish()
    }
}

/// A sequence of bytecode instructions under construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bytecode {
    /// The instructions.
    pub ops: Vec<Opcode>,
}

impl Bytecode {
    /// Creates an empty bytecode sequence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: Vec::with_capacity(64),
        }
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, op: Opcode) -> usize {
        let idx = self.ops.len();
        self.ops.push(op);
        idx
    }

    /// Returns the current instruction count (next instruction index).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if there are no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Removes the last instruction.
    pub fn pop(&mut self) -> Option<Opcode> {
        self.ops.pop()
    }

    /// Drops every instruction from `len` on.
    pub fn truncate(&mut self, len: usize) {
        self.ops.truncate(len);
    }

    /// Returns the length of the block starting at `idx`, if a block starts there.
    #[must_use]
    pub fn block_len(&self, idx: usize) -> Option<usize> {
        match self.ops.get(idx) {
            Some(Opcode::Block(len)) => Some(*len),
            _ => None,
        }
    }

    /// Patches a jump instruction at the given index with a new length.
    ///
    /// # Panics
    /// Panics if the instruction at `idx` is not a jump or block instruction.
    pub fn patch_jump(&mut self, idx: usize, len: usize) {
        match &mut self.ops[idx] {
            Opcode::Block(l)
            | Opcode::Jump(l)
            | Opcode::JumpTrue(l)
            | Opcode::JumpFalse(l)
            | Opcode::JumpResultTrue(l)
            | Opcode::JumpResultFalse(l) => *l = len,
            other => panic!("Cannot patch non-jump instruction: {other:?}"),
        }
    }

    /// Changes the result type of the `Exit` at `idx`.
    ///
    /// # Panics
    /// Panics if the instruction at `idx` is not an `Exit`.
    pub fn retarget_exit(&mut self, idx: usize, ret: Ret) {
        match &mut self.ops[idx] {
            Opcode::Exit(r) => *r = ret,
            other => panic!("Cannot retarget non-exit instruction: {other:?}"),
        }
    }

    /// Freezes the instructions into shareable code starting at `start`.
    #[must_use]
    pub fn finish(self, start: usize) -> Code {
        Code::new(Rc::from(self.ops), start)
    }
}
