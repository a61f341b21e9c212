//! Arithmetic, bitwise and comparison commands.
//!
//! Integer and float operators are variadic and fold left to right. With a
//! single argument the folding operators return it unchanged, except `-`
//! (negation) and `^`/`~` (bitwise not). Comparisons chain: `< 1 2 3` is
//! true when every neighbouring pair compares true, and a lone argument is
//! compared against zero.
//!
//! Integer arithmetic wraps. Division or remainder by zero yields zero.
//! Trigonometry works in degrees.

use cubescript_foundation::Result;
use cubescript_language::{Value, Vm};

use crate::arg;

type IntOp = fn(i64, i64) -> i64;
type FloatOp = fn(f64, f64) -> f64;

fn fold_int(args: &[Value], op: IntOp, unary: fn(i64) -> i64) -> Value {
    let mut iter = args.iter().map(Value::get_int);
    let first = iter.next().unwrap_or(0);
    if args.len() < 2 {
        return Value::Int(unary(first));
    }
    Value::Int(iter.fold(first, op))
}

fn fold_float(args: &[Value], op: FloatOp, unary: fn(f64) -> f64) -> Value {
    let mut iter = args.iter().map(Value::get_float);
    let first = iter.next().unwrap_or(0.0);
    if args.len() < 2 {
        return Value::Float(unary(first));
    }
    Value::Float(iter.fold(first, op))
}

pub(crate) fn chain<T: Default>(values: &[T], op: fn(&T, &T) -> bool) -> Value {
    let holds = match values {
        [] => op(&T::default(), &T::default()),
        [only] => op(only, &T::default()),
        _ => values.windows(2).all(|pair| op(&pair[0], &pair[1])),
    };
    Value::from(holds)
}

fn compare_int(args: &[Value], op: fn(&i64, &i64) -> bool) -> Value {
    let values: Vec<i64> = args.iter().map(Value::get_int).collect();
    chain(&values, op)
}

fn compare_float(args: &[Value], op: fn(&f64, &f64) -> bool) -> Value {
    let values: Vec<f64> = args.iter().map(Value::get_float).collect();
    chain(&values, op)
}

fn same<T>(v: T) -> T {
    v
}

fn shift_left(a: i64, b: i64) -> i64 {
    if b < 64 { a << b.max(0) } else { 0 }
}

fn shift_right(a: i64, b: i64) -> i64 {
    a >> b.clamp(0, 63)
}

fn int_div(a: i64, b: i64) -> i64 {
    if b == 0 { 0 } else { a.wrapping_div(b) }
}

fn int_mod(a: i64, b: i64) -> i64 {
    if b == 0 { 0 } else { a.wrapping_rem(b) }
}

#[allow(clippy::float_cmp)]
fn float_div(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

#[allow(clippy::float_cmp)]
fn float_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a % b }
}

/// Rounds `n` to the nearest multiple of `step`, or to the nearest integer
/// when `step` is not positive. Halves round away from zero.
#[must_use]
pub fn round_to(n: f64, step: f64) -> f64 {
    if step > 0.0 {
        let r = n + step * if n < 0.0 { -0.5 } else { 0.5 };
        r - r % step
    } else if n < 0.0 {
        (n - 0.5).ceil()
    } else {
        (n + 0.5).floor()
    }
}

/// Index of the lowest set bit, or -1 for zero.
#[must_use]
pub fn bitscan(n: i64) -> i64 {
    if n == 0 { -1 } else { i64::from(n.trailing_zeros()) }
}

const INT_OPS: &[(&str, IntOp, fn(i64) -> i64)] = &[
    ("+", i64::wrapping_add, same),
    ("*", i64::wrapping_mul, same),
    ("-", i64::wrapping_sub, i64::wrapping_neg),
    ("^", |a, b| a ^ b, |a| !a),
    ("~", |a, b| a ^ b, |a| !a),
    ("&", |a, b| a & b, same),
    ("|", |a, b| a | b, same),
    ("^~", |a, b| a ^ !b, same),
    ("&~", |a, b| a & !b, same),
    ("|~", |a, b| a | !b, same),
    ("<<", shift_left, same),
    (">>", shift_right, same),
    ("div", int_div, same),
    ("mod", int_mod, same),
];

const FLOAT_OPS: &[(&str, FloatOp, fn(f64) -> f64)] = &[
    ("+f", |a, b| a + b, same),
    ("*f", |a, b| a * b, same),
    ("-f", |a, b| a - b, |a| -a),
    ("divf", float_div, same),
    ("modf", float_mod, same),
    ("pow", f64::powf, same),
];

const INT_COMPARISONS: &[(&str, fn(&i64, &i64) -> bool)] = &[
    ("=", i64::eq),
    ("!=", i64::ne),
    ("<", i64::lt),
    (">", i64::gt),
    ("<=", i64::le),
    (">=", i64::ge),
];

const FLOAT_COMPARISONS: &[(&str, fn(&f64, &f64) -> bool)] = &[
    ("=f", f64::eq),
    ("!=f", f64::ne),
    ("<f", f64::lt),
    (">f", f64::gt),
    ("<=f", f64::le),
    (">=f", f64::ge),
];

const FLOAT_FUNCTIONS: &[(&str, fn(f64) -> f64)] = &[
    ("sin", |a| a.to_radians().sin()),
    ("cos", |a| a.to_radians().cos()),
    ("tan", |a| a.to_radians().tan()),
    ("asin", |a| a.asin().to_degrees()),
    ("acos", |a| a.acos().to_degrees()),
    ("atan", |a| a.atan().to_degrees()),
    ("sqrt", f64::sqrt),
    ("loge", f64::ln),
    ("log2", f64::log2),
    ("log10", f64::log10),
    ("exp", f64::exp),
    ("absf", f64::abs),
    ("floor", f64::floor),
    ("ceil", f64::ceil),
];

/// Registers the math commands.
///
/// # Errors
/// Fails only on a malformed signature.
pub fn register(vm: &mut Vm) -> Result<()> {
    for &(name, op, unary) in INT_OPS {
        vm.register_command(name, "i1V", move |_, args| fold_int(args, op, unary))?;
    }
    for &(name, op, unary) in FLOAT_OPS {
        vm.register_command(name, "f1V", move |_, args| fold_float(args, op, unary))?;
    }
    for &(name, op) in INT_COMPARISONS {
        vm.register_command(name, "i1V", move |_, args| compare_int(args, op))?;
    }
    for &(name, op) in FLOAT_COMPARISONS {
        vm.register_command(name, "f1V", move |_, args| compare_float(args, op))?;
    }
    for &(name, f) in FLOAT_FUNCTIONS {
        vm.register_command(name, "f", move |_, args| Value::Float(f(arg(args, 0).get_float())))?;
    }

    vm.register_command("atan2", "ff", |_, args| {
        let (y, x) = (arg(args, 0).get_float(), arg(args, 1).get_float());
        Value::Float(y.atan2(x).to_degrees())
    })?;
    vm.register_command("min", "i1V", |_, args| {
        Value::Int(args.iter().map(Value::get_int).min().unwrap_or(0))
    })?;
    vm.register_command("max", "i1V", |_, args| {
        Value::Int(args.iter().map(Value::get_int).max().unwrap_or(0))
    })?;
    vm.register_command("minf", "f1V", |_, args| {
        Value::Float(args.iter().map(Value::get_float).reduce(f64::min).unwrap_or(0.0))
    })?;
    vm.register_command("maxf", "f1V", |_, args| {
        Value::Float(args.iter().map(Value::get_float).reduce(f64::max).unwrap_or(0.0))
    })?;
    vm.register_command("bitscan", "i", |_, args| Value::Int(bitscan(arg(args, 0).get_int())))?;
    vm.register_command("abs", "i", |_, args| Value::Int(arg(args, 0).get_int().wrapping_abs()))?;
    vm.register_command("round", "ff", |_, args| {
        Value::Float(round_to(arg(args, 0).get_float(), arg(args, 1).get_float()))
    })?;
    Ok(())
}
