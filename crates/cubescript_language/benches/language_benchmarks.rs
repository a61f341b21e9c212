//! Benchmarks for the cubescript compiler and VM.
//!
//! Run with: `cargo bench --package cubescript_language`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use cubescript_language::{Registry, Value, Vm, compile};

fn bench_vm() -> Vm {
    let mut vm = Vm::new();
    vm.register_command("+", "i1V", |_, args| {
        Value::Int(args.iter().map(Value::get_int).sum())
    })
    .unwrap();
    vm.register_command("echo", "C", |_, _| Value::Null).unwrap();
    vm
}

// =============================================================================
// Compiler Benchmarks
// =============================================================================

fn bench_compiler(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler");

    let cases = [
        ("statement", "echo hello world"),
        ("assignment", "x = [a b c]"),
        ("nested", "echo (+ 1 (+ 2 (+ 3 4)))"),
        ("interpolation", "f = [echo [@x @@y] $arg1]"),
        (
            "config",
            "bind W [forward]\nbind S [backward]\nname = \"player\"\nsens = 3.5 // mouse\n",
        ),
    ];

    for (name, source) in cases {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, source.len()), source, |b, s| {
            let mut reg = Registry::new();
            reg.open();
            b.iter(|| compile(&mut reg, black_box(s)));
        });
    }

    group.finish();
}

// =============================================================================
// Execution Benchmarks
// =============================================================================

fn bench_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution");

    let mut vm = bench_vm();
    let literal = vm.compile("result 42");
    group.bench_function("literal", |b| {
        b.iter(|| vm.execute_code(black_box(&literal)));
    });

    let sum = vm.compile("+ 1 2 3 4 5 6 7 8");
    group.bench_function("command", |b| {
        b.iter(|| vm.execute_code(black_box(&sum)));
    });

    vm.execute("x = 5");
    let lookup = vm.compile("+ $x $x");
    group.bench_function("lookup", |b| {
        b.iter(|| vm.execute_code(black_box(&lookup)));
    });

    group.finish();
}

fn bench_alias_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_calls");

    let mut vm = bench_vm();
    vm.execute("add2 = [+ $arg1 $arg2]; wrap = [add2 $arg1 1]; scoped = [local t; t = $arg1; result $t]");

    let call = vm.compile("add2 3 4");
    group.bench_function("two_args", |b| {
        b.iter(|| vm.execute_code(black_box(&call)));
    });

    let nested = vm.compile("wrap 3");
    group.bench_function("nested", |b| {
        b.iter(|| vm.execute_code(black_box(&nested)));
    });

    let local = vm.compile("scoped 9");
    group.bench_function("local", |b| {
        b.iter(|| vm.execute_code(black_box(&local)));
    });

    let doargs = {
        vm.execute("inner = [doargs [result $arg1]]; outer = [inner x]");
        vm.compile("outer y")
    };
    group.bench_function("doargs", |b| {
        b.iter(|| vm.execute_code(black_box(&doargs)));
    });

    group.finish();
}

fn bench_recursion(c: &mut Criterion) {
    let mut group = c.benchmark_group("recursion");

    for depth in [8, 32, 100] {
        let mut vm = bench_vm();
        vm.execute("down = [if $arg1 [down (+ $arg1 -1)] [result 0]]");
        let code = vm.compile(&format!("down {depth}"));
        group.throughput(Throughput::Elements(depth));
        group.bench_with_input(BenchmarkId::new("countdown", depth), &code, |b, code| {
            b.iter(|| vm.execute_code(black_box(code)));
        });
    }

    group.finish();
}

// =============================================================================
// End-to-End Benchmarks
// =============================================================================

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");

    let source = "f = [+ $arg1 1]; g = [f (f $arg1)]; g 5";
    group.bench_function("compile_and_run", |b| {
        let mut vm = bench_vm();
        b.iter(|| vm.execute(black_box(source)));
    });

    group.bench_function("fresh_vm", |b| {
        b.iter(|| {
            let mut vm = bench_vm();
            vm.execute(black_box(source))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_compiler,
    bench_execution,
    bench_alias_calls,
    bench_recursion,
    bench_end_to_end,
);

criterion_main!(benches);
