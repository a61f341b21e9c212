//! Bytecode virtual machine for cubescript.
//!
//! The VM owns the identifier [`Registry`] and executes [`Code`] produced by
//! the compiler. Each invocation of the interpreter loop keeps its own
//! argument stack; nested blocks and alias calls recurse into the loop with
//! a fresh one, bounded by [`VmConfig::max_depth`].
//!
//! # Diagnostics
//!
//! Script errors never abort execution. They are collected with
//! [`Vm::report`], logged, and can be drained with [`Vm::take_diagnostics`].
//! While `debugalias` is positive, every diagnostic carries a trace of the
//! alias calls that were active when it was raised.
//!
//! # Output
//!
//! Printed lines (`echo`, variable printing) are buffered and drained with
//! [`Vm::take_output`].

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]

mod builtins;
mod call;
mod scope;
mod vars;

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use cubescript_foundation::{Error, ErrorKind, Result, check_number};
use log::{trace, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::compiler::{Compiled, Compiler};
use crate::ident::{Form, IdentFlags, IdentId, IdentKind, IntStorage, Registry};
use crate::opcode::{Code, Inline, Literal, Opcode, Ret};
use crate::value::Value;
use crate::{MAX_ARGS, MAX_RESULTS, MAX_RUN_DEPTH};

use scope::CallLink;

/// Most variable-change triggers kept before the oldest are dropped.
pub const MAX_TRIGGERS: usize = 128;

/// Tuning knobs for a [`Vm`].
#[derive(Clone, Debug, PartialEq)]
pub struct VmConfig {
    /// Nesting limit for blocks and alias calls.
    pub max_depth: usize,
    /// Initial value of `debugalias`: how many alias frames a diagnostic
    /// trace shows. Zero disables traces.
    pub debug_alias: i64,
    /// Seed for the script random number generator.
    pub seed: u64,
    /// Lets scripts write override variables without override mode.
    pub allow_editing: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_RUN_DEPTH,
            debug_alias: 4,
            seed: 0,
            allow_editing: false,
        }
    }
}

impl VmConfig {
    /// Sets the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the initial trace depth.
    #[must_use]
    pub fn with_debug_alias(mut self, frames: i64) -> Self {
        self.debug_alias = frames;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables editing mode.
    #[must_use]
    pub fn with_editing(mut self, allow: bool) -> Self {
        self.allow_editing = allow;
        self
    }
}

/// The cubescript interpreter.
pub struct Vm {
    registry: Registry,
    config: VmConfig,
    /// Active alias calls, innermost last. The first entry is the top level.
    links: Vec<CallLink>,
    depth: usize,
    /// Flags applied to aliases the script creates or assigns.
    ident_flags: IdentFlags,
    nodebug: usize,
    numargs: IntStorage,
    debug_alias: IntStorage,
    diagnostics: Vec<Error>,
    output: Vec<String>,
    triggers: VecDeque<IdentId>,
    rng: ChaCha8Rng,
    empty: [Code; 4],
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("idents", &self.registry.len())
            .field("depth", &self.depth)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Vm {
    /// Creates a VM with the engine builtins and the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates a VM with the engine builtins.
    #[must_use]
    pub fn with_config(config: VmConfig) -> Self {
        Self::with_registry(config, Registry::new())
    }

    /// Creates a VM over a registry the host has already filled.
    ///
    /// Definitions queued in a buffering registry are registered after the
    /// argument aliases and the engine builtins, when the registry is opened.
    #[must_use]
    pub fn with_registry(config: VmConfig, registry: Registry) -> Self {
        let mut vm = Self {
            registry,
            links: vec![CallLink::top_level()],
            depth: 0,
            ident_flags: IdentFlags::empty(),
            nodebug: 0,
            numargs: Rc::new(Cell::new(0)),
            debug_alias: Rc::new(Cell::new(config.debug_alias)),
            diagnostics: Vec::new(),
            output: Vec::new(),
            triggers: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            empty: [Ret::Null, Ret::Int, Ret::Float, Ret::Str].map(Code::empty),
            config,
        };
        if let Err(err) = builtins::register(&mut vm) {
            warn!("failed to register engine builtins: {err}");
        }
        vm.registry.open();
        vm
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The identifier table.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The identifier table, mutably. Host code uses this to bind commands
    /// and variables.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The configuration the VM was created with.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The script random number generator.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of arguments passed to the innermost alias call.
    #[must_use]
    pub fn numargs(&self) -> i64 {
        self.numargs.get()
    }

    /// Flags applied to aliases the script defines.
    #[must_use]
    pub fn ident_flags(&self) -> IdentFlags {
        self.ident_flags
    }

    /// Replaces the flags applied to aliases the script defines. Setting
    /// [`IdentFlags::OVERRIDDEN`] turns on override mode.
    pub fn set_ident_flags(&mut self, flags: IdentFlags) {
        self.ident_flags = flags;
    }

    /// Registers a native command.
    ///
    /// # Errors
    /// Signature errors, or an invalid name.
    pub fn register_command(
        &mut self,
        name: &str,
        signature: &str,
        func: impl Fn(&mut Vm, &[Value]) -> Value + 'static,
    ) -> Result<Option<IdentId>> {
        self.registry.bind_command(name, signature, Rc::new(func))
    }

    // =========================================================================
    // Diagnostics and output
    // =========================================================================

    /// Records a diagnostic, unless `nodebug` is active. The current alias
    /// trace is attached.
    pub fn report(&mut self, err: Error) {
        if self.nodebug > 0 {
            return;
        }
        let err = self.with_trace(err);
        warn!("{}", err.report());
        self.diagnostics.push(err);
    }

    /// Diagnostics collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    /// Drains the collected diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Appends a line to the output buffer.
    pub fn print(&mut self, line: impl Into<String>) {
        let line = line.into();
        trace!("output: {line}");
        self.output.push(line);
    }

    /// Lines printed so far.
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Drains the output buffer.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Discards buffered output.
    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// Runs `f` with diagnostics suppressed.
    pub fn quietly<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.nodebug += 1;
        let out = f(self);
        self.nodebug -= 1;
        out
    }

    fn with_trace(&self, mut err: Error) -> Error {
        let frames = self.alias_trace();
        if frames.is_empty() {
            return err;
        }
        let mut ctx = err.context.take().unwrap_or_default();
        for frame in frames {
            ctx = ctx.with_frame(frame);
        }
        err.with_context(ctx)
    }

    /// Lines describing the active alias calls, innermost first, limited by
    /// `debugalias`.
    fn alias_trace(&self) -> Vec<String> {
        let limit = usize::try_from(self.debug_alias.get()).unwrap_or(0);
        if limit == 0 {
            return Vec::new();
        }
        let calls = &self.links[1..];
        let total = calls.len();
        let mut frames = Vec::new();
        for (depth, link) in calls.iter().rev().enumerate() {
            let name = link.id.map_or("", |id| self.registry.ident(id).name());
            let n = total - depth;
            if depth < limit {
                frames.push(format!("  {n}) {name}"));
            } else if n == 1 {
                let dots = if depth == limit { "" } else { ".." };
                frames.push(format!("  {dots}{n}) {name}"));
            }
        }
        frames
    }

    // =========================================================================
    // Compiling
    // =========================================================================

    /// Compiles `text` into a program, reporting syntax diagnostics.
    pub fn compile(&mut self, text: &str) -> Code {
        self.compile_named(None, text, Ret::Null)
    }

    fn compile_named(&mut self, source: Option<&str>, text: &str, ret: Ret) -> Code {
        let Compiled { code, diagnostics } = Compiler::new(&mut self.registry)
            .with_source(source)
            .compile(text, ret);
        for err in diagnostics {
            self.report(err);
        }
        code
    }

    /// Compiles the text of a value into code. Code values are returned as
    /// they are; numbers become code returning the number.
    pub fn compile_value(&mut self, value: &Value) -> Code {
        match value {
            Value::Code(code) => code.clone(),
            Value::Int(i) => literal_code(Opcode::Val(Literal::Int(*i))),
            Value::Float(f) => literal_code(Opcode::Val(Literal::Float(*f))),
            Value::Str(s) | Value::Macro(s) => self.compile(s),
            _ => literal_code(Opcode::ValI(Inline::Null)),
        }
    }

    /// An empty block returning the zero value of `ret`.
    #[must_use]
    pub fn empty_code(&self, ret: Ret) -> Code {
        let slot = match ret {
            Ret::Null => 0,
            Ret::Int => 1,
            Ret::Float => 2,
            Ret::Str => 3,
        };
        self.empty[slot].clone()
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs compiled code and returns its result.
    pub fn execute_code(&mut self, code: &Code) -> Value {
        let mut result = Value::Null;
        self.run(code.ops(), code.start(), &mut result);
        result
    }

    /// Compiles and runs `text`.
    pub fn execute(&mut self, text: &str) -> Value {
        let code = self.compile(text);
        self.execute_code(&code)
    }

    /// Compiles and runs `text` from a named source; diagnostics carry the
    /// source name and line.
    pub fn execute_source(&mut self, source: &str, text: &str) -> Value {
        let code = self.compile_named(Some(source), text, Ret::Null);
        self.execute_code(&code)
    }

    /// Runs a code argument: code values run, anything else is compiled
    /// first.
    pub fn run_value(&mut self, value: &Value) -> Value {
        match value {
            Value::Code(code) => self.execute_code(code),
            Value::Null => Value::Null,
            other => {
                let code = self.compile_value(other);
                self.execute_code(&code)
            }
        }
    }

    /// Evaluates a condition argument: code runs and its result is tested,
    /// other values are tested directly.
    pub fn run_cond(&mut self, value: &Value) -> bool {
        match value {
            Value::Code(code) => self.execute_code(code).get_bool(),
            other => other.get_bool(),
        }
    }

    /// Compiles and runs `text`, returning the result as text, or `None` for
    /// a null result.
    pub fn execute_string(&mut self, text: &str) -> Option<String> {
        string_result(self.execute(text))
    }

    /// Compiles and runs `text`, returning the result as an integer.
    pub fn execute_int(&mut self, text: &str) -> i64 {
        self.execute(text).get_int()
    }

    /// Compiles and runs `text`, returning the result as a float.
    pub fn execute_float(&mut self, text: &str) -> f64 {
        self.execute(text).get_float()
    }

    /// Compiles and runs `text`, returning the truth of the result.
    pub fn execute_bool(&mut self, text: &str) -> bool {
        self.execute(text).get_bool()
    }

    /// Runs code, returning the result as text.
    pub fn execute_code_string(&mut self, code: &Code) -> Option<String> {
        string_result(self.execute_code(code))
    }

    /// Runs code, returning the result as an integer.
    pub fn execute_code_int(&mut self, code: &Code) -> i64 {
        self.execute_code(code).get_int()
    }

    /// Runs code, returning the result as a float.
    pub fn execute_code_float(&mut self, code: &Code) -> f64 {
        self.execute_code(code).get_float()
    }

    /// Runs code, returning the truth of the result.
    pub fn execute_code_bool(&mut self, code: &Code) -> bool {
        self.execute_code(code).get_bool()
    }

    /// Calls the identifier `name` with `args`. Missing identifiers yield
    /// null.
    pub fn execute_ident(&mut self, name: &str, args: &[Value], lookup: bool) -> Value {
        match self.registry.lookup(name) {
            Some(id) => self.call_ident(id, args.to_vec(), lookup),
            None => Value::Null,
        }
    }

    /// Calls `name` and returns the result as text, or `None` for a null
    /// result.
    pub fn execute_ident_string(&mut self, name: &str, args: &[Value], lookup: bool) -> Option<String> {
        string_result(self.execute_ident(name, args, lookup))
    }

    /// Calls `name` and returns the result as an integer.
    pub fn execute_ident_int(&mut self, name: &str, args: &[Value], lookup: bool) -> i64 {
        self.execute_ident(name, args, lookup).get_int()
    }

    /// Calls `name` and returns the result as a float.
    pub fn execute_ident_float(&mut self, name: &str, args: &[Value], lookup: bool) -> f64 {
        self.execute_ident(name, args, lookup).get_float()
    }

    /// Calls `name` and returns the truth of the result.
    pub fn execute_ident_bool(&mut self, name: &str, args: &[Value], lookup: bool) -> bool {
        self.execute_ident(name, args, lookup).get_bool()
    }

    /// Calls `name` without arguments; `None` when it is missing or returns
    /// null.
    pub fn exec_ident_string(&mut self, name: &str, lookup: bool) -> Option<String> {
        self.execute_ident_string(name, &[], lookup)
    }

    /// Calls `name` without arguments, or returns `default` when it is
    /// missing.
    pub fn exec_ident_int(&mut self, name: &str, default: i64, lookup: bool) -> i64 {
        match self.registry.lookup(name) {
            Some(id) => self.call_ident(id, Vec::new(), lookup).get_int(),
            None => default,
        }
    }

    /// Calls `name` without arguments, or returns `default` when it is
    /// missing.
    pub fn exec_ident_float(&mut self, name: &str, default: f64, lookup: bool) -> f64 {
        match self.registry.lookup(name) {
            Some(id) => self.call_ident(id, Vec::new(), lookup).get_float(),
            None => default,
        }
    }

    /// Calls `name` without arguments, or returns `default` when it is
    /// missing.
    pub fn exec_ident_bool(&mut self, name: &str, default: bool, lookup: bool) -> bool {
        match self.registry.lookup(name) {
            Some(id) => self.call_ident(id, Vec::new(), lookup).get_bool(),
            None => default,
        }
    }

    // =========================================================================
    // Interpreter loop
    // =========================================================================

    /// Runs `ops` from `pc` until the matching `Exit`, leaving the result in
    /// `result`. Returns the index after that `Exit`.
    pub(crate) fn run(&mut self, ops: &Rc<[Opcode]>, mut pc: usize, result: &mut Value) -> usize {
        *result = Value::Null;
        if self.depth >= self.config.max_depth {
            self.report(Error::new(ErrorKind::RecursionLimit));
            return skip_code(ops, pc, Some(result));
        }
        self.depth += 1;
        let mut args: Vec<Value> = Vec::with_capacity(MAX_ARGS + MAX_RESULTS);

        while let Some(op) = ops.get(pc) {
            pc += 1;
            match op {
                Opcode::Start | Opcode::Offset => {}

                Opcode::Null(ret) => *result = Value::zero(*ret),
                Opcode::True(ret) => *result = Value::boolean(true, *ret),
                Opcode::False(ret) => *result = Value::boolean(false, *ret),
                Opcode::Not(ret) => {
                    let v = args.pop().unwrap_or_default();
                    *result = Value::boolean(!v.get_bool(), *ret);
                }
                Opcode::Pop => {
                    args.pop();
                }

                Opcode::Enter => {
                    let mut v = Value::Null;
                    pc = self.run(ops, pc, &mut v);
                    args.push(v);
                }
                Opcode::EnterResult => pc = self.run(ops, pc, result),
                Opcode::Exit(ret) => {
                    result.force(*ret);
                    break;
                }
                Opcode::ResultArg(ret) => {
                    result.force(*ret);
                    args.push(std::mem::take(result));
                }
                Opcode::Print(id) => self.print_var(*id),

                Opcode::Local(n) => {
                    let offset = args.len().saturating_sub(*n);
                    let locals = self.bind_locals(&args[offset..]);
                    pc = self.run(ops, pc, result);
                    self.unbind_locals(&locals);
                    break;
                }

                Opcode::DoArgs(ret) => {
                    let code = args.pop().unwrap_or_default();
                    let suspended = self.suspend_call_args();
                    *result = self.run_value(&code).forced(*ret);
                    self.resume_call_args(suspended);
                }
                Opcode::Do(ret) => {
                    let code = args.pop().unwrap_or_default();
                    *result = self.run_value(&code).forced(*ret);
                }

                Opcode::Jump(len) => pc += len,
                Opcode::JumpTrue(len) => {
                    if args.pop().is_some_and(|v| v.get_bool()) {
                        pc += len;
                    }
                }
                Opcode::JumpFalse(len) => {
                    if !args.pop().is_some_and(|v| v.get_bool()) {
                        pc += len;
                    }
                }
                Opcode::JumpResultTrue(len) | Opcode::JumpResultFalse(len) => {
                    let v = args.pop().unwrap_or_default();
                    *result = match v {
                        Value::Code(code) => self.execute_code(&code),
                        other => other,
                    };
                    if result.get_bool() == matches!(op, Opcode::JumpResultTrue(_)) {
                        pc += len;
                    }
                }

                Opcode::Macro(s) => args.push(Value::Macro(s.clone())),
                Opcode::Val(lit) => args.push(match lit {
                    Literal::Int(i) => Value::Int(*i),
                    Literal::Float(f) => Value::Float(*f),
                    Literal::Str(s) => Value::Str(s.clone()),
                }),
                Opcode::ValI(inline) => args.push(match inline {
                    Inline::Null => Value::Null,
                    Inline::Int(i) => Value::Int(i64::from(*i)),
                    Inline::Float(i) => Value::Float(f64::from(*i)),
                    Inline::Str(s) => Value::str(s.as_str()),
                }),
                Opcode::Dup(ret) => {
                    let top = args.last().cloned().unwrap_or_default();
                    args.push(match ret {
                        Ret::Null => top.get_val(),
                        _ => top.forced(*ret),
                    });
                }
                Opcode::Force(ret) => {
                    if let Some(top) = args.last_mut() {
                        top.force(*ret);
                    }
                }
                Opcode::Result(ret) => *result = args.pop().unwrap_or_default().forced(*ret),
                Opcode::Empty(ret) => args.push(Value::Code(self.empty_code(*ret))),
                Opcode::Block(len) => {
                    args.push(Value::Code(Code::new(ops.clone(), pc + 1)));
                    pc += len;
                }
                Opcode::Compile => {
                    let top = args.pop().unwrap_or_default();
                    let code = self.compile_value(&top);
                    args.push(Value::Code(code));
                }
                Opcode::Cond => {
                    if args.last().is_some_and(Value::is_string) {
                        let text = args.pop().unwrap_or_default();
                        args.push(if text.get_str().is_empty() {
                            Value::Null
                        } else {
                            Value::Code(self.compile_value(&text))
                        });
                    }
                }

                Opcode::Ident(id) => args.push(Value::Ident(*id)),
                Opcode::IdentArg(id) => {
                    self.bind_unused_arg(*id);
                    args.push(Value::Ident(*id));
                }
                Opcode::IdentU => {
                    let name = args.pop().unwrap_or_default();
                    let id = match name.as_str() {
                        Some(name) => self.write_ident(name),
                        None => self.registry.dummy(),
                    };
                    args.push(Value::Ident(id));
                }

                Opcode::Lookup(id, ret) | Opcode::LookupM(id, ret) => {
                    let fragment = matches!(op, Opcode::LookupM(..));
                    let ident = self.registry.ident(*id);
                    if ident.as_alias().is_none() {
                        // Compiled against an alias that has since become a variable.
                        let name = ident.name().to_string();
                        args.push(self.lookup_by_name(&name, *ret, fragment));
                    } else {
                        if ident.has(IdentFlags::UNKNOWN) {
                            let name = ident.name().to_string();
                            self.report(Error::unknown_alias(name));
                        }
                        args.push(coerce_lookup(&self.alias_value(*id), *ret, fragment));
                    }
                }
                Opcode::LookupArg(id, ret) | Opcode::LookupMArg(id, ret) => {
                    let fragment = matches!(op, Opcode::LookupMArg(..));
                    let raw = if self.is_bound(*id) {
                        self.alias_value(*id)
                    } else {
                        Value::Null
                    };
                    args.push(coerce_lookup(&raw, *ret, fragment));
                }
                Opcode::LookupU(ret) | Opcode::LookupMU(ret) => {
                    if args.last().is_some_and(Value::is_string) {
                        let name = args.pop().unwrap_or_default();
                        let fragment = matches!(op, Opcode::LookupMU(_));
                        let v = self.lookup_by_name(&name.get_str(), *ret, fragment);
                        args.push(v);
                    }
                }

                Opcode::StrVar(id, ret) => {
                    let raw = Value::str(&self.str_var(*id));
                    args.push(coerce_lookup(&raw, *ret, false));
                }
                Opcode::StrVarM(id) => {
                    args.push(Value::Macro(Rc::from(self.str_var(*id).as_str())));
                }
                Opcode::StrVar1(id) => {
                    let v = args.pop().unwrap_or_default();
                    self.set_str_checked(*id, &v.get_str());
                }
                Opcode::IntVar(id, ret) => {
                    let raw = Value::Int(self.int_var(*id));
                    args.push(coerce_lookup(&raw, *ret, false));
                }
                Opcode::IntVar1(id) => {
                    let v = args.pop().unwrap_or_default();
                    self.set_int_checked(*id, v.get_int());
                }
                Opcode::IntVar2(id) | Opcode::IntVar3(id) => {
                    let n = if matches!(op, Opcode::IntVar3(_)) { 3 } else { 2 };
                    let offset = args.len().saturating_sub(n);
                    let packed = pack_rgb(&args[offset..]);
                    args.truncate(offset);
                    self.set_int_checked(*id, packed);
                }
                Opcode::FloatVar(id, ret) => {
                    let raw = Value::Float(self.float_var(*id));
                    args.push(coerce_lookup(&raw, *ret, false));
                }
                Opcode::FloatVar1(id) => {
                    let v = args.pop().unwrap_or_default();
                    self.set_float_checked(*id, v.get_float());
                }

                Opcode::Com(id, ret) | Opcode::ComD(id, ret) => {
                    let arity = self.command_arity(*id);
                    let offset = if matches!(op, Opcode::ComD(..)) {
                        let offset = args.len().saturating_sub(arity.saturating_sub(1));
                        args.push(Value::Int(0));
                        offset
                    } else {
                        args.len().saturating_sub(arity)
                    };
                    *result = self.invoke(*id, &args[offset..]).forced(*ret);
                    args.truncate(offset);
                }
                Opcode::ComV { id, argc, ret } => {
                    let offset = args.len().saturating_sub(*argc);
                    *result = self.invoke(*id, &args[offset..]).forced(*ret);
                    args.truncate(offset);
                }
                Opcode::ComC { id, argc, ret } => {
                    let offset = args.len().saturating_sub(*argc);
                    let joined = Value::from(concat(&args[offset..], true));
                    args.truncate(offset);
                    *result = self.invoke(*id, &[joined]).forced(*ret);
                }
                Opcode::ConC(n, ret) | Opcode::ConCW(n, ret) => {
                    let offset = args.len().saturating_sub(*n);
                    let joined = concat(&args[offset..], matches!(op, Opcode::ConC(..)));
                    args.truncate(offset);
                    args.push(Value::from(joined).forced(*ret));
                }
                Opcode::ConCM(n, ret) => {
                    let offset = args.len().saturating_sub(*n);
                    let joined = concat(&args[offset..], false);
                    args.truncate(offset);
                    *result = Value::from(joined).forced(*ret);
                }

                Opcode::Alias(id) => {
                    let v = args.pop().unwrap_or_default();
                    self.assign_alias(*id, v);
                }
                Opcode::AliasArg(id) => {
                    let v = args.pop().unwrap_or_default();
                    self.set_arg(*id, v);
                }
                Opcode::AliasU => {
                    let v = args.pop().unwrap_or_default();
                    let name = args.pop().unwrap_or_default();
                    self.set_alias(&name.get_str(), v);
                }

                Opcode::Call { id, argc } | Opcode::CallArg { id, argc } => {
                    let offset = args.len().saturating_sub(*argc);
                    let skip = if matches!(op, Opcode::CallArg { .. }) {
                        !self.is_bound(*id)
                    } else {
                        self.registry.ident(*id).has(IdentFlags::UNKNOWN)
                    };
                    if skip {
                        if matches!(op, Opcode::Call { .. }) {
                            let name = self.registry.ident(*id).name().to_string();
                            self.report(Error::unknown_command(name));
                        }
                        args.truncate(offset);
                        *result = Value::Null;
                    } else {
                        let call_args: Vec<Value> = args.drain(offset..).collect();
                        *result = self.call_alias(*id, call_args);
                    }
                }
                Opcode::CallU(argc) => {
                    let offset = args.len().saturating_sub(*argc);
                    let call_args: Vec<Value> = args.drain(offset..).collect();
                    let target = args.pop().unwrap_or_default();
                    match self.resolve_call(&target) {
                        Callee::Value(v) => *result = v,
                        Callee::Local => {
                            let locals = self.bind_locals(&call_args);
                            pc = self.run(ops, pc, result);
                            self.unbind_locals(&locals);
                            break;
                        }
                        Callee::Ident(id) => *result = self.call_resolved(id, call_args),
                    }
                }
            }
        }

        self.depth -= 1;
        pc
    }
}

/// Target of a call whose name is only known at run time.
enum Callee {
    /// Nothing to call; the statement evaluates to this value.
    Value(Value),
    /// The `local` keyword.
    Local,
    /// A command, variable or alias.
    Ident(IdentId),
}

impl Vm {
    fn resolve_call(&mut self, target: &Value) -> Callee {
        let Some(name) = target.as_str() else {
            return Callee::Value(target.clone());
        };
        let Some(id) = self.registry.lookup(name) else {
            return self.no_ident(name);
        };
        let ident = self.registry.ident(id);
        match &ident.kind {
            IdentKind::Command(cmd) if cmd.form == Form::Local => Callee::Local,
            IdentKind::Alias(alias) => {
                if id.is_arg() && !self.is_bound(id) {
                    Callee::Value(Value::Null)
                } else if alias.value.is_null() {
                    self.no_ident(name)
                } else {
                    Callee::Ident(id)
                }
            }
            _ => Callee::Ident(id),
        }
    }

    /// A statement word that names nothing: numbers evaluate to themselves,
    /// anything else is an unknown command.
    fn no_ident(&mut self, name: &str) -> Callee {
        if check_number(name) {
            Callee::Value(Value::str(name))
        } else {
            self.report(Error::unknown_command(name));
            Callee::Value(Value::Null)
        }
    }
}

/// Advances past the code starting at `pc` without running it, returning
/// the index after its matching `Exit`.
pub(crate) fn skip_code(ops: &[Opcode], mut pc: usize, result: Option<&mut Value>) -> usize {
    let mut depth = 0usize;
    while let Some(op) = ops.get(pc) {
        pc += 1;
        match op {
            Opcode::Block(len)
            | Opcode::Jump(len)
            | Opcode::JumpTrue(len)
            | Opcode::JumpFalse(len)
            | Opcode::JumpResultTrue(len)
            | Opcode::JumpResultFalse(len) => pc += len,
            Opcode::Enter | Opcode::EnterResult => depth += 1,
            Opcode::Exit(ret) => {
                if depth == 0 {
                    if let Some(result) = result {
                        result.force(*ret);
                    }
                    return pc;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    pc
}

/// Code that pushes one literal and returns it.
fn literal_code(op: Opcode) -> Code {
    let ops = vec![Opcode::Start, op, Opcode::Result(Ret::Null), Opcode::Exit(Ret::Null)];
    Code::new(Rc::from(ops), 1)
}

/// Converts a looked-up value to the form an instruction asked for.
/// Fragment lookups keep text as macro values.
fn coerce_lookup(raw: &Value, ret: Ret, fragment: bool) -> Value {
    match (ret, fragment) {
        (Ret::Null, false) => raw.get_val(),
        (Ret::Null, true) => raw.get_cval(),
        (Ret::Str, false) => Value::str(&raw.get_str()),
        (Ret::Str, true) => raw.get_cstr(),
        (Ret::Int, _) => Value::Int(raw.get_int()),
        (Ret::Float, _) => Value::Float(raw.get_float()),
    }
}

/// Joins values as text, with or without a space between them.
pub(crate) fn concat(values: &[Value], space: bool) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if space && i > 0 {
            out.push(' ');
        }
        out.push_str(&v.get_str());
    }
    out
}

/// Packs `r g` or `r g b` arguments into a hex color.
pub(crate) fn pack_rgb(args: &[Value]) -> i64 {
    let channel = |i: usize| args.get(i).map_or(0, Value::get_int);
    let mut packed = (channel(0) << 16) | (channel(1) << 8);
    if args.len() > 2 {
        packed |= channel(2);
    }
    packed
}

fn string_result(v: Value) -> Option<String> {
    if v.is_null() {
        None
    } else {
        Some(v.get_str().into_owned())
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    #[test]
    fn skip_code_stops_at_matching_exit() {
        let ops = [
            Opcode::Enter,
            Opcode::ValI(Inline::Int(1)),
            Opcode::Exit(Ret::Null),
            Opcode::Jump(1),
            Opcode::Exit(Ret::Null),
            Opcode::Exit(Ret::Int),
            Opcode::Pop,
        ];
        let mut result = Value::str("7");
        assert_eq!(skip_code(&ops, 0, Some(&mut result)), 6);
        assert_eq!(result, Value::Int(7));
    }

    #[test]
    fn lookup_coercions() {
        let s = Value::str("12");
        assert_eq!(coerce_lookup(&s, Ret::Int, false), Value::Int(12));
        assert_eq!(coerce_lookup(&s, Ret::Null, true), Value::Macro(Rc::from("12")));
        assert_eq!(coerce_lookup(&Value::Null, Ret::Str, true), Value::Macro(Rc::from("")));
        assert_eq!(coerce_lookup(&Value::Int(3), Ret::Str, true), Value::str("3"));
    }

    #[test]
    fn concat_joins() {
        let vals = [Value::Int(1), Value::str("a"), Value::Float(2.5)];
        assert_eq!(concat(&vals, true), "1 a 2.5");
        assert_eq!(concat(&vals, false), "1a2.5");
    }

    #[test]
    fn rgb_packing() {
        assert_eq!(pack_rgb(&[Value::Int(255), Value::Int(128)]), 0xFF8000);
        assert_eq!(
            pack_rgb(&[Value::Int(1), Value::Int(2), Value::Int(3)]),
            0x01_0203
        );
    }
}
