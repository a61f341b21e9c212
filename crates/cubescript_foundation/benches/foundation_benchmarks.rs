//! Benchmarks for the cubescript foundation layer.
//!
//! Run with: `cargo bench --package cubescript_foundation`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use cubescript_foundation::{
    escape_string, explode_list, format_float, list_len, parse_float, parse_int, parse_word,
    str_truthy, unescape_string, validate_block,
};

// =============================================================================
// Number Benchmarks
// =============================================================================

fn bench_number_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("number/parse");

    group.bench_function("int_decimal", |b| b.iter(|| black_box(parse_int(black_box("123456")))));
    group.bench_function("int_hex", |b| b.iter(|| black_box(parse_int(black_box("0xFF00FF")))));
    group.bench_function("float_plain", |b| {
        b.iter(|| black_box(parse_float(black_box("3.14159"))))
    });
    group.bench_function("float_exponent", |b| {
        b.iter(|| black_box(parse_float(black_box("-1.5e-7"))))
    });

    group.finish();
}

fn bench_number_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("number/format");

    group.bench_function("float_integral", |b| b.iter(|| black_box(format_float(black_box(42.0)))));
    group.bench_function("float_fraction", |b| {
        b.iter(|| black_box(format_float(black_box(1.0 / 3.0))))
    });
    group.bench_function("float_tiny", |b| {
        b.iter(|| black_box(format_float(black_box(0.000_012_5))))
    });

    group.finish();
}

fn bench_truthiness(c: &mut Criterion) {
    let mut group = c.benchmark_group("number/truthy");

    for text in ["", "0", "0x0", "0.0", "-0.5", "abc", "+0"] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{text:?}")), text, |b, s| {
            b.iter(|| black_box(str_truthy(black_box(s))))
        });
    }

    group.finish();
}

// =============================================================================
// Text Benchmarks
// =============================================================================

fn bench_escaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("text/escape");

    let plain = "the quick brown fox jumps over the lazy dog".repeat(8);
    let noisy = "say \"hi\"\n\tthen ^ leave\x0c".repeat(8);

    group.bench_function("escape_plain", |b| b.iter(|| black_box(escape_string(&plain))));
    group.bench_function("escape_noisy", |b| b.iter(|| black_box(escape_string(&noisy))));

    let escaped = escape_string(&noisy);
    let body = &escaped[1..escaped.len() - 1];
    group.bench_function("unescape_noisy", |b| b.iter(|| black_box(unescape_string(body))));

    group.finish();
}

fn bench_scanning(c: &mut Criterion) {
    let mut group = c.benchmark_group("text/scan");

    group.bench_function("word_simple", |b| {
        b.iter(|| black_box(parse_word(black_box("identifier rest"))))
    });
    group.bench_function("word_brackets", |b| {
        b.iter(|| black_box(parse_word(black_box("a[b(c)d]e rest"))))
    });

    let block = "if (> $x 0) [echo [positive @x]] [echo \"not ^\"positive^\"\"]".repeat(16);
    group.bench_function("validate_block", |b| b.iter(|| black_box(validate_block(&block))));

    group.finish();
}

// =============================================================================
// List Benchmarks
// =============================================================================

fn bench_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");

    for size in [10, 100, 1000] {
        let list: String = (0..size)
            .map(|i| {
                if i % 3 == 0 {
                    format!("[item {i}]")
                } else if i % 3 == 1 {
                    format!("\"item {i}\"")
                } else {
                    format!("item{i}")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("len", size), &list, |b, list| {
            b.iter(|| black_box(list_len(list)))
        });
        group.bench_with_input(BenchmarkId::new("explode", size), &list, |b, list| {
            b.iter(|| black_box(explode_list(list, None)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_number_parsing,
    bench_number_formatting,
    bench_truthiness,
    bench_escaping,
    bench_scanning,
    bench_lists,
);

criterion_main!(benches);
