//! Multi-command programs.

use cubescript_language::{Vm, VmConfig};
use cubescript_stdlib::{register_all, standard_vm};

#[test]
fn fizzbuzz() {
    let mut vm = standard_vm().unwrap();
    vm.execute(
        "out = \"\"
        loop i 15 [
            n = (+ $i 1)
            append out (cond [= (mod $n 15) 0] [result FizzBuzz] [= (mod $n 3) 0] [result Fizz] [= (mod $n 5) 0] [result Buzz] [result $n])
        ]",
    );
    assert_eq!(
        vm.get_alias("out"),
        "1 2 Fizz 4 Buzz Fizz 7 8 Fizz Buzz 11 Fizz 13 14 FizzBuzz"
    );
    assert!(vm.take_diagnostics().is_empty());
}

#[test]
fn recursive_factorial() {
    let mut vm = standard_vm().unwrap();
    vm.execute("fact = [if (<= $arg1 1) [result 1] [* $arg1 (fact (- $arg1 1))]]");
    assert_eq!(vm.execute_int("fact 10"), 3_628_800);
}

#[test]
fn list_pipeline() {
    let mut vm = standard_vm().unwrap();
    vm.execute(
        "nums = \"5 3 8 1\"
        sorted = (sortlist $nums a b [< $a $b])
        sum = 0
        looplist x $sorted [sum = (+ $sum $x)]
        count = (listcount x $sorted [> $x 2])",
    );
    assert_eq!(vm.get_alias("sorted"), "1 3 5 8");
    assert_eq!(vm.get_alias("sum"), "17");
    assert_eq!(vm.get_alias("count"), "3");
    assert!(vm.take_diagnostics().is_empty());
}

#[test]
fn while_loop_counts() {
    let mut vm = standard_vm().unwrap();
    vm.execute("i = 0; steps = \"\"; while [< $i 4] [i = (+ $i 1); appendword steps $i]");
    assert_eq!(vm.get_alias("i"), "4");
    assert_eq!(vm.get_alias("steps"), "1234");
}

#[test]
fn echo_goes_to_output() {
    let mut vm = standard_vm().unwrap();
    vm.execute("loop i 3 [echo line $i]");
    assert_eq!(vm.take_output(), vec!["line 0", "line 1", "line 2"]);
}

#[test]
fn error_command_reports() {
    let mut vm = standard_vm().unwrap();
    vm.execute("check = [if (< $arg1 0) [error negative value $arg1]]; check -3");
    let diags = vm.take_diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].to_string(), "negative value -3");
}

#[test]
fn seeded_random_is_reproducible() {
    let run = |seed| {
        let mut vm = Vm::with_config(VmConfig::default().with_seed(seed));
        register_all(&mut vm).unwrap();
        vm.execute_string("loopconcat i 8 [rnd 100]").unwrap_or_default()
    };
    assert_eq!(run(7), run(7));
    for n in run(7).split(' ') {
        let n: i64 = n.parse().unwrap();
        assert!((0..100).contains(&n));
    }
}
