//! Host embedding: commands, host variables, registry lifecycle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cubescript_foundation::ErrorKind;
use cubescript_language::{IdentFlags, Registry, Value, Vm, VmConfig};

fn messages(vm: &mut Vm) -> Vec<String> {
    vm.take_diagnostics().iter().map(ToString::to_string).collect()
}

#[test]
fn string_parameter_defaults_to_empty() {
    let mut vm = Vm::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    vm.register_command("take", "s", move |_, args| {
        sink.borrow_mut().push(args.to_vec());
        Value::Null
    })
    .unwrap();
    vm.execute("take");
    let seen = seen.borrow();
    assert_eq!(seen[0].len(), 1);
    assert!(seen[0][0].is_string());
    assert_eq!(seen[0][0].get_str(), "");
}

#[test]
fn typed_parameters_are_coerced() {
    let mut vm = Vm::new();
    vm.register_command("describe", "ifsN", |_, args| {
        Value::from(format!(
            "{} {} {} {}",
            args[0].get_int(),
            args[1].get_float(),
            args[2].get_str(),
            args[3].get_int()
        ))
    })
    .unwrap();
    assert_eq!(
        vm.execute_string("describe 0x10 2 word"),
        Some("16 2 word 3".to_string())
    );
    assert_eq!(vm.execute_string("describe"), Some("0 0  0".to_string()));
}

#[test]
fn invalid_signatures_are_rejected() {
    let mut vm = Vm::new();
    let err = vm.register_command("bad", "iz", |_, _| Value::Null).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidSignature { .. }));
    assert!(vm.register_command("5five", "", |_, _| Value::Null).is_err());
}

#[test]
fn redefinition_keeps_first_slot() {
    let mut vm = Vm::new();
    let first = vm.register_command("twice", "i", |_, _| Value::Int(1)).unwrap();
    let second = vm.register_command("twice", "i", |_, _| Value::Int(2)).unwrap();
    assert_eq!(first, second);
    assert_eq!(vm.execute_int("twice"), 1);
}

#[test]
fn buffered_definitions_follow_engine_slots() {
    let mut registry = Registry::new();
    let storage = Rc::new(Cell::new(3));
    let queued = registry
        .bind_int_var("early", (0, 10), Rc::clone(&storage), None, IdentFlags::empty())
        .unwrap();
    assert_eq!(queued, None);
    assert!(!registry.is_open());

    let mut vm = Vm::with_registry(VmConfig::default(), registry);
    assert!(vm.registry().is_open());
    assert_eq!(vm.execute("early"), Value::Null);
    assert_eq!(vm.take_output(), vec!["early = 3".to_string()]);
    vm.execute("early 7");
    assert_eq!(storage.get(), 7);
}

#[test]
fn host_variables_share_storage() {
    let mut vm = Vm::new();
    let int = Rc::new(Cell::new(1));
    let float = Rc::new(Cell::new(0.5));
    let text = Rc::new(RefCell::new(String::from("start")));
    let registry = vm.registry_mut();
    registry
        .bind_int_var("hits", (0, 100), Rc::clone(&int), None, IdentFlags::empty())
        .unwrap();
    registry
        .bind_float_var("scale", (0.0, 1.0), Rc::clone(&float), None, IdentFlags::empty())
        .unwrap();
    registry
        .bind_string_var("label", Rc::clone(&text), None, IdentFlags::empty())
        .unwrap();

    vm.execute("hits 42; scale 2; label [new text]");
    assert_eq!(int.get(), 42);
    assert!((float.get() - 1.0).abs() < f64::EPSILON);
    assert_eq!(*text.borrow(), "new text");
    assert_eq!(messages(&mut vm), vec!["valid range for scale is 0.0..1.0"]);

    int.set(9);
    assert_eq!(vm.execute_int("result $hits"), 9);
}

#[test]
fn read_only_host_variables() {
    let mut vm = Vm::new();
    let storage = Rc::new(Cell::new(4));
    vm.registry_mut()
        .bind_int_var("fixed", (1, 0), Rc::clone(&storage), None, IdentFlags::empty())
        .unwrap();
    vm.execute("fixed 8");
    assert_eq!(storage.get(), 4);
    assert_eq!(messages(&mut vm), vec!["variable fixed is read-only"]);
}

#[test]
fn change_callbacks_see_new_values() {
    let mut vm = Vm::new();
    let storage = Rc::new(Cell::new(0));
    let observed = Rc::new(Cell::new(-1));
    let (watch, sink) = (Rc::clone(&storage), Rc::clone(&observed));
    let on_change: cubescript_language::ChangeFn = Rc::new(move |_: &mut Vm| sink.set(watch.get()));
    vm.registry_mut()
        .bind_int_var("level", (0, 9), storage, Some(on_change), IdentFlags::empty())
        .unwrap();
    vm.execute("level 5");
    assert_eq!(observed.get(), 5);
}

#[test]
fn execute_ident_passes_prebuilt_arguments() {
    let mut vm = Vm::new();
    vm.register_command("join", "V", |_, args| {
        Value::from(args.iter().map(|a| a.get_str().into_owned()).collect::<String>())
    })
    .unwrap();
    vm.execute("pair = [result (join $arg1 - $arg2)]");
    let out = vm.execute_ident_string("pair", &[Value::Int(1), Value::str("b")], false);
    assert_eq!(out.as_deref(), Some("1-b"));
    assert!(vm.execute_ident("missing", &[], false).is_null());
    assert_eq!(vm.exec_ident_int("missing", 11, false), 11);
}

#[test]
fn independent_vms_do_not_share_state() {
    let mut a = Vm::new();
    let mut b = Vm::new();
    a.execute("shared = 1");
    assert!(a.ident_exists("shared"));
    assert!(!b.ident_exists("shared"));
    b.execute("shared = 2");
    assert_eq!(a.get_alias("shared"), "1");
}

#[test]
fn host_variable_replaces_a_mentioned_name() {
    let mut vm = Vm::new();
    vm.execute("peek = [result $volume]");
    assert_eq!(vm.execute_int("peek"), 0);
    vm.take_diagnostics();

    let storage = Rc::new(Cell::new(6));
    let bound = vm
        .registry_mut()
        .bind_int_var("volume", (0, 10), Rc::clone(&storage), None, IdentFlags::empty())
        .unwrap();
    assert_eq!(bound, vm.registry().lookup("volume"));
    assert_eq!(vm.execute_int("peek"), 6);
    vm.execute("volume 2");
    assert_eq!(storage.get(), 2);
    assert!(messages(&mut vm).is_empty());
}

#[test]
fn host_cannot_turn_a_command_into_a_variable() {
    let mut vm = Vm::new();
    vm.register_command("ping", "", |_, _| Value::from("pong")).unwrap();
    let err = vm
        .registry_mut()
        .bind_int_var("ping", (0, 1), Rc::new(Cell::new(0)), None, IdentFlags::empty())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RedefineVariable("ping".to_string()));
    assert_eq!(vm.execute_string("ping"), Some("pong".to_string()));
}
