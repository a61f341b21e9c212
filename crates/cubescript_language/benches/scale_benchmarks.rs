//! Large-scale benchmarks for the cubescript language layer.
//!
//! Run with: `cargo bench --package cubescript_language --bench scale_benchmarks`
//!
//! Benchmark groups:
//! - scale_compile: Compiling large generated scripts
//! - scale_registry: Execution with many registered identifiers
//! - scale_blocks: Deeply nested and heavily interpolated blocks

use std::fmt::Write;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use cubescript_language::{Registry, Value, Vm, compile};

fn generated_config(lines: usize) -> String {
    let mut out = String::new();
    for i in 0..lines {
        let _ = writeln!(out, "alias setting{i} [echo value {i} $arg1]");
    }
    out
}

// =============================================================================
// Compiling At Scale
// =============================================================================

fn bench_scale_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_compile");
    group.sample_size(20);

    for lines in [100, 1_000, 10_000] {
        let source = generated_config(lines);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("config_lines", lines), &source, |b, s| {
            let mut reg = Registry::new();
            reg.open();
            b.iter(|| black_box(compile(&mut reg, s)));
        });
    }

    group.finish();
}

// =============================================================================
// Large Registries
// =============================================================================

fn bench_scale_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_registry");
    group.sample_size(20);

    for count in [1_000, 10_000, 50_000] {
        let mut vm = Vm::new();
        vm.register_command("echo", "C", |_, _| Value::Null).unwrap();
        vm.execute(&generated_config(count));
        let code = vm.compile(&format!("setting{} x", count / 2));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("call_among", count), &code, |b, code| {
            b.iter(|| vm.execute_code(black_box(code)));
        });
    }

    group.finish();
}

// =============================================================================
// Blocks
// =============================================================================

fn bench_scale_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("scale_blocks");

    for depth in [8, 32, 64] {
        let open = "[".repeat(depth);
        let close = "]".repeat(depth);
        let source = format!("result {open}x{close}");
        group.bench_with_input(BenchmarkId::new("nested", depth), &source, |b, s| {
            let mut vm = Vm::new();
            b.iter(|| vm.execute(black_box(s)));
        });
    }

    for words in [10, 100, 1_000] {
        let body: Vec<String> = (0..words).map(|_| "@x".to_string()).collect();
        let source = format!("result [{}]", body.join(" "));
        group.throughput(Throughput::Elements(words as u64));
        group.bench_with_input(BenchmarkId::new("interpolated", words), &source, |b, s| {
            let mut vm = Vm::new();
            vm.execute("x = word");
            b.iter(|| vm.execute(black_box(s)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_scale_compile,
    bench_scale_registry,
    bench_scale_blocks,
);

criterion_main!(benches);
