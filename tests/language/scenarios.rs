//! End-to-end compiler and VM scenarios.

use cubescript_foundation::ErrorKind;
use cubescript_language::{IdentFlags, Value, Vm, VmConfig};
use proptest::prelude::*;

fn vm() -> Vm {
    let mut vm = Vm::new();
    vm.register_command("+", "i1V", |_, args| {
        Value::Int(args.iter().map(Value::get_int).sum())
    })
    .unwrap();
    vm.register_command("echo", "C", |vm, args| {
        let line = args.first().map(|a| a.get_str().into_owned()).unwrap_or_default();
        vm.print(line);
        Value::Null
    })
    .unwrap();
    vm
}

fn messages(vm: &mut Vm) -> Vec<String> {
    vm.take_diagnostics().iter().map(ToString::to_string).collect()
}

#[test]
fn alias_arithmetic() {
    let mut vm = vm();
    assert_eq!(vm.execute_int("alias x 5; alias y [+ $x 2]; result (y)"), 7);
    // `x + 2` calls x, so y yields "5" and `$(y)` looks up an alias named 5.
    assert_eq!(vm.execute_int("alias x 5; alias y [x + 2]; result $(y)"), 0);
    assert_eq!(messages(&mut vm), vec!["unknown alias lookup: 5"]);
}

#[test]
fn defvar_clamps_out_of_range_writes() {
    let mut vm = vm();
    vm.execute("defvar foo 0 5 10; foo 12");
    assert_eq!(vm.get_var("foo"), Some(10));
    assert_eq!(messages(&mut vm), vec!["valid range for foo is 0..10"]);
}

#[test]
fn assignment_round_trips_escaped_text() {
    let mut vm = vm();
    for text in ["plain", "two words", "quote \" inside", "caret ^ and\ttab", "[bracket"] {
        let escaped = cubescript_foundation::escape_string(text);
        vm.execute(&format!("stored = {escaped}"));
        assert_eq!(vm.get_alias("stored"), text);
    }
    assert!(vm.diagnostics().is_empty());
}

#[test]
fn multi_line_script_with_comments() {
    let mut vm = vm();
    let script = "\
// setup
total = 0
add = [
    total = (+ $total $arg1) // accumulate
]
add 3; add 4
add (+ 1 1)
";
    vm.execute_source("script.cfg", script);
    assert_eq!(vm.get_alias("total"), "9");
    assert!(vm.take_diagnostics().is_empty());
}

#[test]
fn nested_blocks_splice_at_depth() {
    let mut vm = vm();
    vm.execute("word = outer");
    assert_eq!(
        vm.execute_string("result [a [b @@word] @word]"),
        Some("a [b outer] outer".to_string())
    );
}

#[test]
fn lookup_forms() {
    let mut vm = vm();
    vm.execute("inner = 4; name = inner; computed = [result inner]");
    assert_eq!(vm.execute_int("result $$name"), 4);
    assert_eq!(vm.execute_int("result $(computed)"), 4);
    assert_eq!(vm.execute_int("result $[inner]"), 4);
}

#[test]
fn self_recursion_terminates_with_diagnostic() {
    let mut vm = Vm::with_config(VmConfig::default().with_max_depth(32));
    vm.execute("loop = [loop]");
    assert!(vm.execute("loop").is_null());
    assert_eq!(messages(&mut vm), vec!["exceeded recursion limit"]);
    assert_eq!(vm.depth(), 0);
}

#[test]
fn diagnostics_do_not_stop_execution() {
    let mut vm = vm();
    vm.execute("echo before; nosuch; echo after");
    assert_eq!(vm.take_output(), vec!["before", "after"]);
    assert_eq!(messages(&mut vm), vec!["unknown command: nosuch"]);
}

#[test]
fn compile_errors_carry_source_and_line() {
    let mut vm = vm();
    vm.execute_source("bad.cfg", "echo fine\n\necho (unclosed");
    let diagnostics = vm.take_diagnostics();
    assert_eq!(diagnostics[0].report(), "bad.cfg:3: missing \")\"");
    // The unclosed expression is still closed and run.
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[1].kind, ErrorKind::UnknownCommand("unclosed".to_string()));
}

#[test]
fn override_mode_restores_on_reset() {
    let mut vm = vm();
    vm.execute("defvar speed 0 5 10");
    vm.set_ident_flags(IdentFlags::OVERRIDDEN);
    vm.execute("speed 9");
    vm.set_ident_flags(IdentFlags::empty());
    assert_eq!(vm.get_var("speed"), Some(9));
    vm.execute("resetvar speed");
    assert_eq!(vm.get_var("speed"), Some(5));
}

proptest! {
    /// Bindings restore in strict LIFO order.
    #[test]
    fn bindings_are_lifo(values in proptest::collection::vec(-1000i64..1000, 1..20)) {
        let mut vm = vm();
        vm.execute("slot = base");
        let id = vm.registry().lookup("slot").unwrap();
        for v in &values {
            vm.push_binding(id, Value::Int(*v));
        }
        for v in values.iter().rev() {
            prop_assert_eq!(vm.get_alias("slot"), v.to_string());
            vm.pop_binding(id);
        }
        prop_assert_eq!(vm.get_alias("slot"), "base");
    }
}
