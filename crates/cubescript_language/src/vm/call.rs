//! Command and alias invocation.

use std::rc::Rc;

use cubescript_foundation::{Error, ErrorKind};

use crate::MAX_ARGS;
use crate::ident::{IdentFlags, IdentId, IdentKind, Registry};
use crate::opcode::Ret;
use crate::signature::ArgKind;
use crate::value::Value;

use super::{Vm, concat, pack_rgb};

impl Vm {
    /// Number of argument slots a compiled call to `id` pushes.
    pub(crate) fn command_arity(&self, id: IdentId) -> usize {
        self.registry
            .ident(id)
            .as_command()
            .map_or(0, |cmd| cmd.signature.arity())
    }

    /// Calls the native function of `id` with already coerced arguments.
    pub(crate) fn invoke(&mut self, id: IdentId, args: &[Value]) -> Value {
        let func = self
            .registry
            .ident(id)
            .as_command()
            .and_then(|cmd| cmd.func.clone());
        match func {
            Some(func) => func(self, args),
            None => Value::Null,
        }
    }

    /// Calls a command with arguments that were not shaped by the compiler:
    /// each argument is coerced to its signature letter, and missing ones get
    /// their defaults. `lookup` marks a call made by a `$name` lookup.
    pub(crate) fn call_command(&mut self, id: IdentId, mut args: Vec<Value>, lookup: bool) -> Value {
        let Some(signature) = self
            .registry
            .ident(id)
            .as_command()
            .map(|cmd| Rc::clone(&cmd.signature))
        else {
            return Value::Null;
        };
        let numargs = args.len();
        let kinds = signature.kinds();
        let mut fakeargs = 0usize;
        let mut rep = false;
        let mut i = 0usize;
        let mut k = 0usize;

        while k < kinds.len() {
            let kind = kinds[k];
            k += 1;
            match kind {
                ArgKind::Concat => {
                    let n = i.max(numargs);
                    args.resize(n, Value::Null);
                    let joined = Value::from(concat(&args, true));
                    return self.invoke(id, &[joined]);
                }
                ArgKind::Variadic => {
                    let n = i.max(numargs);
                    args.resize(n, Value::Null);
                    return self.invoke(id, &args);
                }
                ArgKind::Repeat(n) => {
                    if i < numargs {
                        k -= n + 1;
                        rep = true;
                    }
                }
                ArgKind::SelfIdent => {
                    set_slot(&mut args, i, Value::Ident(id));
                    i += 1;
                }
                ArgKind::Count => {
                    let count = if lookup { -1 } else { (i - fakeargs) as i64 };
                    set_slot(&mut args, i, Value::Int(count));
                    i += 1;
                }
                ArgKind::Release => {
                    set_slot(&mut args, i, Value::Int(0));
                    fakeargs += 1;
                    i += 1;
                }
                kind => {
                    if i < numargs {
                        let v = std::mem::take(&mut args[i]);
                        args[i] = self.coerce_arg(kind, v);
                    } else if !rep {
                        let v = self.default_arg(kind, &args, i, id);
                        set_slot(&mut args, i, v);
                        fakeargs += 1;
                    }
                    i += 1;
                }
            }
        }
        args.resize(i, Value::Null);
        self.invoke(id, &args)
    }

    fn coerce_arg(&mut self, kind: ArgKind, mut v: Value) -> Value {
        match kind {
            ArgKind::Int | ArgKind::OptionalInt => Value::Int(v.force_int()),
            ArgKind::Float | ArgKind::FloatOrPrevious => Value::Float(v.force_float()),
            ArgKind::Str | ArgKind::CStr => Value::Str(v.force_str()),
            ArgKind::Cond => match v.as_str().map(str::is_empty) {
                Some(true) => Value::Int(0),
                Some(false) => Value::Code(self.compile_value(&v)),
                None => v,
            },
            ArgKind::Code => match v {
                Value::Code(_) => v,
                other => {
                    let text = Value::str(&other.get_str());
                    Value::Code(self.compile_value(&text))
                }
            },
            ArgKind::Ident => Value::Ident(self.force_ident(&v)),
            _ => v,
        }
    }

    fn default_arg(&self, kind: ArgKind, args: &[Value], i: usize, id: IdentId) -> Value {
        match kind {
            ArgKind::Int => Value::Int(0),
            ArgKind::OptionalInt => Value::Int(i64::MIN),
            ArgKind::Float => Value::Float(0.0),
            ArgKind::FloatOrPrevious => Value::Float(
                i.checked_sub(1)
                    .and_then(|p| args.get(p))
                    .map_or(0.0, Value::get_float),
            ),
            ArgKind::Str => Value::empty_str(),
            ArgKind::CStr => Value::Macro(Rc::from("")),
            ArgKind::Code => Value::Code(self.empty_code(Ret::Null)),
            ArgKind::Ident => Value::Ident(self.registry.dummy()),
            ArgKind::SelfIdent => Value::Ident(id),
            _ => Value::Null,
        }
    }

    /// Runs an alias body with `args` bound to `arg1`.. and returns its
    /// result. The body is compiled on first use and cached.
    pub(crate) fn call_alias(&mut self, id: IdentId, args: Vec<Value>) -> Value {
        let argc = args.len().min(MAX_ARGS);
        for (i, v) in args.into_iter().take(argc).enumerate() {
            self.push_binding(Registry::arg(i), v);
        }
        let old_numargs = self.numargs.replace(argc as i64);
        let old_flags = self.ident_flags;
        let ident = self.registry.ident(id);
        let cached = ident.as_alias().and_then(|a| a.code.clone());
        self.ident_flags |= ident.flags & IdentFlags::OVERRIDDEN;
        self.enter_call(id, argc);

        let code = match cached {
            Some(code) => code,
            None => {
                let text = self.alias_value(id).get_str().into_owned();
                let code = self.compile(&text);
                if let Some(alias) = self.registry.ident_mut(id).as_alias_mut() {
                    alias.code = Some(code.clone());
                }
                code
            }
        };
        let result = self.execute_code(&code);

        self.leave_call();
        self.ident_flags = old_flags;
        self.numargs.set(old_numargs);
        result
    }

    /// Calls or reads any identifier the way a statement naming it does.
    pub(crate) fn call_resolved(&mut self, id: IdentId, args: Vec<Value>) -> Value {
        self.dispatch(id, args, false)
    }

    /// Calls an identifier from host code, counting towards the nesting
    /// limit.
    pub(crate) fn call_ident(&mut self, id: IdentId, args: Vec<Value>, lookup: bool) -> Value {
        if self.depth >= self.config.max_depth {
            self.report(Error::new(ErrorKind::RecursionLimit));
            return Value::Null;
        }
        self.depth += 1;
        let result = self.dispatch(id, args, lookup);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, id: IdentId, args: Vec<Value>, lookup: bool) -> Value {
        let ident = self.registry.ident(id);
        match &ident.kind {
            IdentKind::Command(_) => self.call_command(id, args, lookup),
            IdentKind::Int(_) => {
                if args.is_empty() {
                    self.print_var(id);
                } else if ident.has(IdentFlags::HEX) && args.len() > 1 {
                    self.set_int_checked(id, pack_rgb(&args));
                } else {
                    self.set_int_checked(id, args[0].get_int());
                }
                Value::Null
            }
            IdentKind::Float(_) => {
                match args.first() {
                    None => self.print_var(id),
                    Some(v) => self.set_float_checked(id, v.get_float()),
                }
                Value::Null
            }
            IdentKind::Str(_) => {
                match args.first() {
                    None => self.print_var(id),
                    Some(v) => self.set_str_checked(id, &v.get_str()),
                }
                Value::Null
            }
            IdentKind::Alias(alias) => {
                if (id.is_arg() && !self.is_bound(id)) || alias.value.is_null() {
                    Value::Null
                } else {
                    self.call_alias(id, args)
                }
            }
        }
    }
}

/// Writes `v` at slot `i`, growing the argument list with nulls.
fn set_slot(args: &mut Vec<Value>, i: usize, v: Value) {
    if args.len() <= i {
        args.resize(i + 1, Value::Null);
    }
    args[i] = v;
}
