//! Commands the VM registers for itself: keywords, alias and variable
//! management.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cubescript_foundation::{Error, ErrorKind, Result};

use crate::ident::{ChangeFn, CommandFn, Form, IdentFlags, IdentId, Registry};
use crate::value::Value;

use super::Vm;

fn command(f: impl Fn(&mut Vm, &[Value]) -> Value + 'static) -> CommandFn {
    Rc::new(f)
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

pub(super) fn register(vm: &mut Vm) -> Result<()> {
    register_keywords(&mut vm.registry)?;
    register_aliases(&mut vm.registry)?;
    register_definitions(&mut vm.registry)?;
    register_queries(&mut vm.registry)?;

    let numargs = Rc::clone(&vm.numargs);
    vm.registry
        .bind_int_var("numargs", (25, 0), numargs, None, IdentFlags::empty())?;
    let debug_alias = Rc::clone(&vm.debug_alias);
    vm.registry
        .bind_int_var("debugalias", (0, 1000), debug_alias, None, IdentFlags::empty())?;
    Ok(())
}

fn register_keywords(reg: &mut Registry) -> Result<()> {
    reg.bind_form("local", "", Form::Local, None)?;
    reg.bind_form(
        "do",
        "e",
        Form::Do,
        Some(command(|vm, args| vm.run_value(&arg(args, 0)))),
    )?;
    reg.bind_form(
        "doargs",
        "e",
        Form::DoArgs,
        Some(command(|vm, args| {
            let suspended = vm.suspend_call_args();
            let result = vm.run_value(&arg(args, 0));
            vm.resume_call_args(suspended);
            result
        })),
    )?;
    reg.bind_form(
        "if",
        "tee",
        Form::If,
        Some(command(|vm, args| {
            let branch = if arg(args, 0).get_bool() { 1 } else { 2 };
            vm.run_value(&arg(args, branch))
        })),
    )?;
    reg.bind_form(
        "result",
        "T",
        Form::Result,
        Some(command(|_, args| arg(args, 0))),
    )?;
    reg.bind_form(
        "!",
        "t",
        Form::Not,
        Some(command(|_, args| Value::from(!arg(args, 0).get_bool()))),
    )?;
    reg.bind_form(
        "&&",
        "E1V",
        Form::And,
        Some(command(|vm, args| {
            let mut result = Value::Int(1);
            for cond in args {
                result = eval_cond(vm, cond);
                if !result.get_bool() {
                    break;
                }
            }
            result
        })),
    )?;
    reg.bind_form(
        "||",
        "E1V",
        Form::Or,
        Some(command(|vm, args| {
            let mut result = Value::Int(0);
            for cond in args {
                result = eval_cond(vm, cond);
                if result.get_bool() {
                    break;
                }
            }
            result
        })),
    )?;
    Ok(())
}

/// The value of a condition argument: code runs, anything else is used as
/// it is.
fn eval_cond(vm: &mut Vm, cond: &Value) -> Value {
    match cond {
        Value::Code(code) => vm.execute_code(code),
        other => other.clone(),
    }
}

fn register_aliases(reg: &mut Registry) -> Result<()> {
    reg.bind_command(
        "alias",
        "sT",
        command(|vm, args| {
            vm.set_alias(&arg(args, 0).get_str(), arg(args, 1));
            Value::Null
        }),
    )?;
    reg.bind_command(
        "push",
        "rTe",
        command(|vm, args| {
            let Some(id) = arg(args, 0).as_ident() else {
                return Value::Null;
            };
            let ident = vm.registry.ident(id);
            if ident.as_alias().is_none() || id.is_arg() {
                return Value::Null;
            }
            vm.push_binding(id, arg(args, 1));
            let result = vm.run_value(&arg(args, 2));
            vm.pop_binding(id);
            result
        }),
    )?;
    reg.bind_command(
        "resetvar",
        "s",
        command(|vm, args| {
            vm.reset_var(&arg(args, 0).get_str());
            Value::Null
        }),
    )?;
    reg.bind_command(
        "nodebug",
        "e",
        command(|vm, args| vm.quietly(|vm| vm.run_value(&arg(args, 0)))),
    )?;
    reg.bind_command(
        "persistidents",
        "b",
        command(|vm, args| {
            let on = arg(args, 0).get_int();
            if on != i64::MIN {
                let mut flags = vm.ident_flags;
                if on != 0 {
                    flags.insert(IdentFlags::PERSIST);
                } else {
                    flags.remove(IdentFlags::PERSIST);
                }
                vm.ident_flags = flags;
            }
            Value::from(vm.ident_flags.contains(IdentFlags::PERSIST))
        }),
    )?;
    Ok(())
}

/// Builds the change callback of a script-defined variable.
/// Compiles the change body once the variable exists, so that references
/// to the variable inside it resolve to the variable itself.
fn attach_on_change(vm: &mut Vm, bound: Result<Option<IdentId>>, body: &str) {
    match bound {
        Ok(Some(id)) if !body.is_empty() => {
            let code = vm.compile(body);
            let change: ChangeFn = Rc::new(move |vm: &mut Vm| {
                vm.execute_code(&code);
            });
            vm.registry.set_on_change(id, change);
        }
        Ok(_) => {}
        Err(err) => vm.report(err),
    }
}

/// Refuses to define a variable over an existing name. Names that scripts
/// have only mentioned are taken over.
fn check_new(vm: &mut Vm, name: &str) -> bool {
    let taken = vm
        .registry
        .get_by_name(name)
        .is_some_and(|ident| !ident.is_placeholder());
    if taken {
        vm.report(Error::new(ErrorKind::RedefineVariable(name.to_string())));
        return false;
    }
    true
}

fn register_definitions(reg: &mut Registry) -> Result<()> {
    for (name, flags) in [
        ("defvar", IdentFlags::empty()),
        ("defvarp", IdentFlags::PERSIST),
    ] {
        reg.bind_command(
            name,
            "siiis",
            command(move |vm, args| {
                let name = arg(args, 0).get_str().into_owned();
                if !check_new(vm, &name) {
                    return Value::Null;
                }
                let (min, cur, max) = (
                    arg(args, 1).get_int(),
                    arg(args, 2).get_int(),
                    arg(args, 3).get_int(),
                );
                let storage = Rc::new(Cell::new(cur));
                let bound = vm.registry.bind_int_var(&name, (min, max), storage, None, flags);
                attach_on_change(vm, bound, &arg(args, 4).get_str());
                Value::Null
            }),
        )?;
    }
    for (name, flags) in [
        ("deffvar", IdentFlags::empty()),
        ("deffvarp", IdentFlags::PERSIST),
    ] {
        reg.bind_command(
            name,
            "sfffs",
            command(move |vm, args| {
                let name = arg(args, 0).get_str().into_owned();
                if !check_new(vm, &name) {
                    return Value::Null;
                }
                let (min, cur, max) = (
                    arg(args, 1).get_float(),
                    arg(args, 2).get_float(),
                    arg(args, 3).get_float(),
                );
                let storage = Rc::new(Cell::new(cur));
                let bound = vm.registry.bind_float_var(&name, (min, max), storage, None, flags);
                attach_on_change(vm, bound, &arg(args, 4).get_str());
                Value::Null
            }),
        )?;
    }
    for (name, flags) in [
        ("defsvar", IdentFlags::empty()),
        ("defsvarp", IdentFlags::PERSIST),
    ] {
        reg.bind_command(
            name,
            "sss",
            command(move |vm, args| {
                let name = arg(args, 0).get_str().into_owned();
                if !check_new(vm, &name) {
                    return Value::Null;
                }
                let cur = arg(args, 1).get_str().into_owned();
                let storage = Rc::new(RefCell::new(cur));
                let bound = vm.registry.bind_string_var(&name, storage, None, flags);
                attach_on_change(vm, bound, &arg(args, 2).get_str());
                Value::Null
            }),
        )?;
    }
    Ok(())
}

fn register_queries(reg: &mut Registry) -> Result<()> {
    reg.bind_command(
        "getvarmin",
        "s",
        command(|vm, args| Value::Int(vm.get_var_min(&arg(args, 0).get_str()))),
    )?;
    reg.bind_command(
        "getvarmax",
        "s",
        command(|vm, args| Value::Int(vm.get_var_max(&arg(args, 0).get_str()))),
    )?;
    reg.bind_command(
        "getfvarmin",
        "s",
        command(|vm, args| Value::Float(vm.get_fvar_min(&arg(args, 0).get_str()))),
    )?;
    reg.bind_command(
        "getfvarmax",
        "s",
        command(|vm, args| Value::Float(vm.get_fvar_max(&arg(args, 0).get_str()))),
    )?;
    reg.bind_command(
        "identexists",
        "s",
        command(|vm, args| Value::from(vm.ident_exists(&arg(args, 0).get_str()))),
    )?;
    reg.bind_command(
        "getalias",
        "s",
        command(|vm, args| Value::from(vm.get_alias(&arg(args, 0).get_str()))),
    )?;
    Ok(())
}
