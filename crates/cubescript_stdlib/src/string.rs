//! String commands.
//!
//! Offsets and lengths are byte counts, as scripts see them. A range that
//! covers part of a character covers all of it: starts move back and ends
//! move forward to the nearest boundary.

use cubescript_foundation::{Error, Result, escape_string, unescape_string};
use cubescript_language::{Value, Vm};

use crate::arg;
use crate::math::chain;

const STRING_COMPARISONS: &[(&str, fn(&String, &String) -> bool)] = &[
    ("strcmp", |a, b| a == b),
    ("=s", |a, b| a == b),
    ("!=s", |a, b| a != b),
    ("<s", |a, b| a < b),
    (">s", |a, b| a > b),
    ("<=s", |a, b| a <= b),
    (">=s", |a, b| a >= b),
];

fn floor_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Clamps a script offset into `s`.
fn offset(s: &str, i: i64) -> usize {
    floor_boundary(s, usize::try_from(i).unwrap_or(0))
}

/// Replaces `count` bytes of `s` starting at `skip` with `insert`.
#[must_use]
pub fn splice(s: &str, insert: &str, skip: i64, count: i64) -> String {
    let start = offset(s, skip);
    let end = ceil_boundary(s, start.saturating_add(usize::try_from(count).unwrap_or(0)));
    let mut out = String::with_capacity(s.len() + insert.len());
    out.push_str(&s[..start]);
    out.push_str(insert);
    out.push_str(&s[end..]);
    out
}

/// Replaces every occurrence of `old`, alternating between `new` and
/// `new2` starting with `new`.
#[must_use]
pub fn replace_alternating(s: &str, old: &str, new: &str, new2: &str) -> String {
    if old.is_empty() {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut n = 0;
    while let Some(found) = rest.find(old) {
        out.push_str(&rest[..found]);
        out.push_str(if n % 2 == 0 { new } else { new2 });
        rest = &rest[found + old.len()..];
        n += 1;
    }
    out.push_str(rest);
    out
}

/// Removes `\f` color codes: the form feed and the character after it.
#[must_use]
pub fn strip_colors(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x0c' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// Expands `%1` to `%9` with the matching entry of `subs` (`%1` is
/// `subs[0]`). Any other `%x` becomes `x`.
#[must_use]
pub fn format_text(template: &str, subs: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(d @ '1'..='9') => {
                let i = d as usize - '1' as usize;
                if let Some(sub) = subs.get(i) {
                    out.push_str(&sub.get_str());
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn join(args: &[Value], sep: &str) -> Value {
    let parts: Vec<_> = args.iter().map(Value::get_str).collect();
    Value::from(parts.join(sep))
}

/// Appends `value` to the alias named by `target`.
fn append(vm: &mut Vm, target: &Value, value: &Value, space: bool) {
    let Some(id) = target.as_ident() else { return };
    if value.is_null() {
        return;
    }
    let ident = vm.registry().ident(id);
    let Some(alias) = ident.as_alias() else { return };
    let name = ident.name().to_string();
    let prefix = alias.value.get_str();
    let joined = if prefix.is_empty() {
        value.clone()
    } else {
        let sep = if space { " " } else { "" };
        Value::from(format!("{prefix}{sep}{}", value.get_str()))
    };
    vm.set_alias(&name, joined);
}

/// Registers the string commands.
///
/// # Errors
/// Fails only on a malformed signature.
pub fn register(vm: &mut Vm) -> Result<()> {
    for &(name, op) in STRING_COMPARISONS {
        vm.register_command(name, "s1V", move |_, args| {
            let values: Vec<String> = args.iter().map(|v| v.get_str().into_owned()).collect();
            chain(&values, op)
        })?;
    }

    vm.register_command("echo", "C", |vm, args| {
        vm.print(arg(args, 0).get_str());
        Value::Null
    })?;
    vm.register_command("error", "C", |vm, args| {
        vm.report(Error::script(arg(args, 0).get_str()));
        Value::Null
    })?;

    vm.register_command("strstr", "ss", |_, args| {
        let (hay, needle) = (arg(args, 0).get_str(), arg(args, 1).get_str());
        Value::Int(hay.find(&*needle).map_or(-1, |i| i64::try_from(i).unwrap_or(-1)))
    })?;
    vm.register_command("strlen", "s", |_, args| Value::from(arg(args, 0).get_str().len()))?;
    vm.register_command("strlower", "s", |_, args| {
        Value::from(arg(args, 0).get_str().to_lowercase())
    })?;
    vm.register_command("strupper", "s", |_, args| {
        Value::from(arg(args, 0).get_str().to_uppercase())
    })?;
    vm.register_command("strsplice", "ssii", |_, args| {
        Value::from(splice(
            &arg(args, 0).get_str(),
            &arg(args, 1).get_str(),
            arg(args, 2).get_int(),
            arg(args, 3).get_int(),
        ))
    })?;
    vm.register_command("strreplace", "ssss", |_, args| {
        let new = arg(args, 2).get_str();
        let new2 = arg(args, 3).get_str();
        let new2 = if new2.is_empty() { &new } else { &new2 };
        Value::from(replace_alternating(&arg(args, 0).get_str(), &arg(args, 1).get_str(), &new, new2))
    })?;
    vm.register_command("substr", "siiN", |_, args| {
        let s = arg(args, 0).get_str();
        let start = offset(&s, arg(args, 1).get_int());
        let end = if arg(args, 3).get_int() >= 3 {
            let count = usize::try_from(arg(args, 2).get_int()).unwrap_or(0);
            ceil_boundary(&s, start.saturating_add(count))
        } else {
            s.len()
        };
        Value::str(&s[start..end])
    })?;
    vm.register_command("stripcolors", "s", |_, args| {
        Value::from(strip_colors(&arg(args, 0).get_str()))
    })?;

    vm.register_command("append", "rt", |vm, args| {
        append(vm, arg(args, 0), arg(args, 1), true);
        Value::Null
    })?;
    vm.register_command("appendword", "rt", |vm, args| {
        append(vm, arg(args, 0), arg(args, 1), false);
        Value::Null
    })?;
    vm.register_command("concat", "V", |_, args| join(args, " "))?;
    vm.register_command("concatword", "V", |_, args| join(args, ""))?;
    vm.register_command("format", "V", |_, args| {
        let template = arg(args, 0).get_str();
        Value::from(format_text(&template, args.get(1..).unwrap_or_default()))
    })?;
    vm.register_command("escape", "s", |_, args| {
        Value::from(escape_string(&arg(args, 0).get_str()))
    })?;
    vm.register_command("unescape", "s", |_, args| {
        Value::from(unescape_string(&arg(args, 0).get_str()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> Vm {
        let mut vm = Vm::new();
        register(&mut vm).unwrap();
        vm
    }

    fn run(vm: &mut Vm, text: &str) -> String {
        vm.execute_string(text).unwrap_or_default()
    }

    #[test]
    fn comparisons_chain() {
        let mut vm = vm();
        assert_eq!(vm.execute_int("=s abc abc abc"), 1);
        assert_eq!(vm.execute_int("<s a b c"), 1);
        assert_eq!(vm.execute_int("<s a c b"), 0);
        assert_eq!(vm.execute_int("strcmp x y"), 0);
        assert_eq!(vm.execute_int("=s \"\""), 1);
        assert_eq!(vm.execute_int("!=s x"), 1);
    }

    #[test]
    fn echo_and_error() {
        let mut vm = vm();
        vm.execute("echo hello  world; error oops");
        assert_eq!(vm.take_output(), vec!["hello world".to_string()]);
        let diags = vm.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("oops"));
    }

    #[test]
    fn searching_and_measuring() {
        let mut vm = vm();
        assert_eq!(vm.execute_int("strstr abcdef cd"), 2);
        assert_eq!(vm.execute_int("strstr abcdef x"), -1);
        assert_eq!(vm.execute_int("strlen hello"), 5);
        assert_eq!(run(&mut vm, "strupper abC"), "ABC");
        assert_eq!(run(&mut vm, "strlower AbC"), "abc");
    }

    #[test]
    fn substrings() {
        let mut vm = vm();
        assert_eq!(run(&mut vm, "substr abcdef 2"), "cdef");
        assert_eq!(run(&mut vm, "substr abcdef 2 2"), "cd");
        assert_eq!(run(&mut vm, "substr abcdef 10 2"), "");
        assert_eq!(run(&mut vm, "substr abcdef -3 2"), "ab");
        assert_eq!(run(&mut vm, "strsplice abcdef XY 1 2"), "aXYdef");
        assert_eq!(splice("héllo", "-", 2, 1), "h-llo");
        assert_eq!(splice("héllo", "-", 1, 1), "h-llo");
        assert_eq!(run(&mut vm, "substr héllo 2 1"), "é");
        assert_eq!(run(&mut vm, "substr héllo 1 0"), "");
    }

    #[test]
    fn replacement_alternates() {
        let mut vm = vm();
        assert_eq!(run(&mut vm, "strreplace a.b.c . -"), "a-b-c");
        assert_eq!(run(&mut vm, "strreplace a.b.c.d . < >"), "a<b>c<d");
        assert_eq!(replace_alternating("abc", "", "x", "x"), "abc");
    }

    #[test]
    fn colors_are_stripped() {
        assert_eq!(strip_colors("\x0c3red\x0c~ plain"), "red plain");
    }

    #[test]
    fn append_builds_aliases() {
        let mut vm = vm();
        vm.execute("append list a; append list b; appendword word x; appendword word y");
        assert_eq!(vm.get_alias("list"), "a b");
        assert_eq!(vm.get_alias("word"), "xy");
    }

    #[test]
    fn concatenation_and_format() {
        let mut vm = vm();
        assert_eq!(run(&mut vm, "concat a b 3"), "a b 3");
        assert_eq!(run(&mut vm, "concatword a b 3"), "ab3");
        assert_eq!(run(&mut vm, "format \"%1 + %2 = %3%%\" 1 2 3"), "1 + 2 = 3%");
        assert_eq!(run(&mut vm, "format \"[%4]\" a"), "[]");
    }

    #[test]
    fn escaping() {
        let mut vm = vm();
        assert_eq!(run(&mut vm, "escape [say \"hi\"]"), "\"say ^\"hi^\"\"");
        assert_eq!(run(&mut vm, "unescape \"a^tb\""), "a\tb");
    }

    proptest::proptest! {
        #[test]
        fn splice_keeps_outside_text(s in "\\PC{0,20}", insert in "[a-z]{0,5}", skip in 0i64..30, count in 0i64..30) {
            let out = splice(&s, &insert, skip, count);
            proptest::prop_assert!(out.contains(&insert));
            proptest::prop_assert!(out.len() <= s.len() + insert.len());
        }
    }
}
