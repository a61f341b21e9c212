//! Conditionals, loops and random numbers.

use cubescript_foundation::Result;
use cubescript_language::{Value, Vm};
use rand::Rng;

use crate::arg;
use crate::iter::LoopVar;

/// Counter parameters of the `loop` family: `loop+` adds an offset, `loop*`
/// a step, `loop+*` both.
#[derive(Clone, Copy)]
struct Shape {
    suffix: &'static str,
    offset: bool,
    step: bool,
}

const SHAPES: [Shape; 4] = [
    Shape { suffix: "", offset: false, step: false },
    Shape { suffix: "+", offset: true, step: false },
    Shape { suffix: "*", offset: false, step: true },
    Shape { suffix: "+*", offset: true, step: true },
];

impl Shape {
    fn signature(self, tail: &str) -> String {
        let mut sig = String::from("r");
        if self.offset {
            sig.push('i');
        }
        if self.step {
            sig.push('i');
        }
        sig.push('i');
        sig.push_str(tail);
        sig
    }

    /// Reads `(offset, step, count)` and returns the index of the first
    /// argument after them.
    fn counter(self, args: &[Value]) -> (Counter, usize) {
        let mut next = 1;
        let mut take = |present: bool, default: i64| {
            if present {
                next += 1;
                arg(args, next - 1).get_int()
            } else {
                default
            }
        };
        let offset = take(self.offset, 0);
        let step = take(self.step, 1);
        let count = take(true, 0);
        (Counter { offset, step, count }, next)
    }
}

#[derive(Clone, Copy)]
struct Counter {
    offset: i64,
    step: i64,
    count: i64,
}

impl Counter {
    fn values(self) -> impl Iterator<Item = i64> {
        (0..self.count.max(0)).map(move |i| self.offset.wrapping_add(i.wrapping_mul(self.step)))
    }
}

fn run_loop(vm: &mut Vm, var: &Value, counter: Counter, cond: Option<&Value>, body: &Value) {
    if counter.count <= 0 {
        return;
    }
    let Some(mut var) = LoopVar::new(vm, var) else {
        return;
    };
    for i in counter.values() {
        var.set(vm, Value::Int(i));
        if cond.is_some_and(|c| !vm.run_cond(c)) {
            break;
        }
        vm.run_value(body);
    }
    var.finish(vm);
}

fn run_concat(vm: &mut Vm, var: &Value, counter: Counter, body: &Value, space: bool) -> Value {
    if counter.count <= 0 {
        return Value::Null;
    }
    let Some(mut var) = LoopVar::new(vm, var) else {
        return Value::Null;
    };
    let mut out = String::new();
    for (n, i) in counter.values().enumerate() {
        var.set(vm, Value::Int(i));
        let piece = vm.run_value(body);
        if space && n > 0 {
            out.push(' ');
        }
        out.push_str(&piece.get_str());
    }
    var.finish(vm);
    Value::from(out)
}

/// `0x` followed by at least `digits` uppercase hex digits.
#[must_use]
pub fn to_hex(value: i64, digits: i64) -> String {
    let width = usize::try_from(digits.clamp(1, 16)).unwrap_or(1);
    format!("0x{value:0width$X}")
}

/// Registers the control commands.
///
/// # Errors
/// Fails only on a malformed signature.
pub fn register(vm: &mut Vm) -> Result<()> {
    register_conditionals(vm)?;
    register_loops(vm)?;
    register_random(vm)
}

#[allow(clippy::float_cmp)]
fn register_conditionals(vm: &mut Vm) -> Result<()> {
    vm.register_command("cond", "ee2V", |vm, args| {
        for pair in args.chunks(2) {
            match pair {
                [test, body] => {
                    if vm.run_cond(test) {
                        return vm.run_value(body);
                    }
                }
                [otherwise] => return vm.run_value(otherwise),
                _ => {}
            }
        }
        Value::Null
    })?;
    vm.register_command("case", "ite2V", |vm, args| {
        let key = arg(args, 0).get_int();
        run_case(vm, args, |v| v.get_int() == key)
    })?;
    vm.register_command("casef", "fte2V", |vm, args| {
        let key = arg(args, 0).get_float();
        run_case(vm, args, |v| v.get_float() == key)
    })?;
    vm.register_command("cases", "ste2V", |vm, args| {
        let key = arg(args, 0).get_str().into_owned();
        run_case(vm, args, |v| v.get_str() == key)
    })?;
    vm.register_command("?", "tTT", |_, args| {
        if arg(args, 0).get_bool() { arg(args, 1).clone() } else { arg(args, 2).clone() }
    })?;
    vm.register_command("pushif", "rTe", |vm, args| {
        let Some(id) = arg(args, 0).as_ident() else {
            return Value::Null;
        };
        if id.is_arg() || vm.registry().ident(id).as_alias().is_none() {
            return Value::Null;
        }
        let value = arg(args, 1);
        if !value.get_bool() {
            return Value::Null;
        }
        vm.push_binding(id, value.clone());
        let result = vm.run_value(arg(args, 2));
        vm.pop_binding(id);
        result
    })?;
    vm.register_command("while", "ee", |vm, args| {
        while vm.run_cond(arg(args, 0)) {
            vm.run_value(arg(args, 1));
        }
        Value::Null
    })?;
    Ok(())
}

/// Runs the body after the first key that matches. A null key matches
/// anything.
fn run_case(vm: &mut Vm, args: &[Value], matches: impl Fn(&Value) -> bool) -> Value {
    for pair in args[1.min(args.len())..].chunks_exact(2) {
        if pair[0].is_null() || matches(&pair[0]) {
            return vm.run_value(&pair[1]);
        }
    }
    Value::Null
}

fn register_loops(vm: &mut Vm) -> Result<()> {
    for shape in SHAPES {
        vm.register_command(&format!("loop{}", shape.suffix), &shape.signature("e"), move |vm, args| {
            let (counter, next) = shape.counter(args);
            run_loop(vm, arg(args, 0), counter, None, arg(args, next));
            Value::Null
        })?;
        vm.register_command(
            &format!("loopwhile{}", shape.suffix),
            &shape.signature("ee"),
            move |vm, args| {
                let (counter, next) = shape.counter(args);
                run_loop(vm, arg(args, 0), counter, Some(arg(args, next)), arg(args, next + 1));
                Value::Null
            },
        )?;
        for (word, space) in [("loopconcat", true), ("loopconcatword", false)] {
            vm.register_command(&format!("{word}{}", shape.suffix), &shape.signature("e"), move |vm, args| {
                let (counter, next) = shape.counter(args);
                run_concat(vm, arg(args, 0), counter, arg(args, next), space)
            })?;
        }
    }
    Ok(())
}

fn register_random(vm: &mut Vm) -> Result<()> {
    vm.register_command("rnd", "ii", |vm, args| {
        let (hi, lo) = (arg(args, 0).get_int(), arg(args, 1).get_int());
        let span = hi.wrapping_sub(lo);
        if span > 0 {
            Value::Int(vm.rng().gen_range(0..span) + lo)
        } else {
            Value::Int(lo)
        }
    })?;
    vm.register_command("rndstr", "i", |vm, args| {
        let len = arg(args, 0).get_int().clamp(0, 10_000);
        let rng = vm.rng();
        let text: String = (0..len).map(|_| char::from(rng.gen_range(33u8..=126))).collect();
        Value::from(text)
    })?;
    vm.register_command("tohex", "ii", |_, args| {
        Value::from(to_hex(arg(args, 0).get_int(), arg(args, 1).get_int()))
    })?;
    Ok(())
}
