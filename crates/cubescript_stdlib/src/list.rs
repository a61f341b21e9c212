//! List commands.
//!
//! A list is a string of whitespace-separated elements; see
//! [`cubescript_foundation::list`] for the element grammar. Commands that
//! bind elements to a loop variable bind the element value (quoted strings
//! unescaped). Commands that build new lists copy elements as written,
//! quotes and brackets included.

use cubescript_foundation::{
    ListItem, Result, list_includes, list_len, parse_float, parse_int, parse_list, unescape_string,
};
use cubescript_language::{Value, Vm};

use crate::arg;
use crate::iter::LoopVar;

fn index_or_missing(found: Option<usize>) -> Value {
    Value::Int(found.map_or(-1, |i| i64::try_from(i).unwrap_or(-1)))
}

fn count_arg(value: &Value) -> usize {
    usize::try_from(value.get_int()).unwrap_or(0)
}

/// Walks nested lists: each index selects an element of the previous
/// element. Out of range indexes give an empty string.
#[must_use]
pub fn list_at(list: &str, indexes: &[i64]) -> String {
    let mut body = list.to_string();
    let mut quoted = false;
    for &index in indexes {
        let pick = usize::try_from(index).unwrap_or(0);
        match parse_list(&body).nth(pick) {
            Some(item) => {
                quoted = item.is_string();
                body = item.raw().to_string();
            }
            None => return String::new(),
        }
    }
    if quoted {
        unescape_string(&body)
    } else {
        body
    }
}

/// The elements from `skip` on, up to `count` of them, as written. Without
/// a count the rest of the list is returned.
#[must_use]
pub fn sublist(list: &str, skip: usize, count: Option<usize>) -> &str {
    let mut parser = parse_list(list);
    for _ in 0..skip {
        if parser.next().is_none() {
            break;
        }
    }
    let Some(count) = count else {
        if skip > 0 {
            parser.skip_whitespace();
        }
        return parser.remainder();
    };
    let items: Vec<ListItem<'_>> = parser.take(count).collect();
    match (items.first(), items.last()) {
        (Some(first), Some(last)) => &list[first.quote_start..last.quote_end],
        _ => "",
    }
}

/// Joins the elements with commas and `conj` before the last one:
/// `a, b, and c`, or `a and b` for two elements.
#[must_use]
pub fn pretty_list(list: &str, conj: &str) -> String {
    let len = list_len(list);
    let mut out = String::new();
    for (n, item) in parse_list(list).enumerate() {
        out.push_str(&item.value());
        if n + 1 < len {
            if len > 2 || conj.is_empty() {
                out.push(',');
            }
            if n + 2 == len && !conj.is_empty() {
                out.push(' ');
                out.push_str(conj);
            }
            out.push(' ');
        }
    }
    out
}

/// Elements of `list` kept or dropped by membership in `filter`, joined
/// with spaces.
fn filter_list(list: &str, filter: &str, keep_members: bool) -> String {
    let kept: Vec<&str> = parse_list(list)
        .filter(|item| list_includes(filter, item.raw()).is_some() == keep_members)
        .map(|item| item.quoted())
        .collect();
    kept.join(" ")
}

/// `list` followed by the elements of `elems` it does not already contain.
#[must_use]
pub fn list_union(list: &str, elems: &str) -> String {
    let mut out = list.to_string();
    for item in parse_list(elems) {
        if list_includes(list, item.raw()).is_none() {
            push_word(&mut out, item.quoted());
        }
    }
    out
}

fn push_word(out: &mut String, text: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(text);
}

/// Replaces `count` elements starting at `skip` with `vals`.
#[must_use]
pub fn list_splice(list: &str, vals: &str, skip: usize, count: usize) -> String {
    let mut parser = parse_list(list);
    let mut head_end = 0;
    for _ in 0..skip {
        match parser.next() {
            Some(item) => head_end = item.quote_end,
            None => break,
        }
    }
    let mut out = list[..head_end].to_string();
    if !vals.is_empty() {
        push_word(&mut out, vals);
    }
    for _ in 0..count {
        if parser.next().is_none() {
            break;
        }
    }
    parser.skip_whitespace();
    let rest = parser.remainder();
    if !rest.is_empty() && !rest.starts_with([')', ']']) {
        push_word(&mut out, rest);
    }
    out
}

/// Binds each element to the loop variables in turn, `vars.len()` elements
/// per round, and calls `each` after every binding. Missing trailing
/// elements bind as empty strings.
fn for_each_group(vm: &mut Vm, vars: &[&Value], list: &str, mut each: impl FnMut(&mut Vm) -> bool) {
    let mut loop_vars = Vec::with_capacity(vars.len());
    for var in vars {
        match LoopVar::new(vm, var) {
            Some(v) => loop_vars.push(v),
            None => return,
        }
    }
    let mut items = parse_list(list);
    'outer: while let Some(first) = items.next() {
        for (i, var) in loop_vars.iter_mut().enumerate() {
            let value = if i == 0 {
                first.value().into_owned()
            } else {
                items.next().map(|item| item.value().into_owned()).unwrap_or_default()
            };
            var.set(vm, Value::from(value));
        }
        if !each(vm) {
            break 'outer;
        }
    }
    for var in loop_vars {
        var.finish(vm);
    }
}

fn loop_list_concat(vm: &mut Vm, args: &[Value], space: bool) -> Value {
    let list = arg(args, 1).get_str().into_owned();
    let body = arg(args, 2).clone();
    let mut out = String::new();
    let mut first = true;
    for_each_group(vm, &[arg(args, 0)], &list, |vm| {
        let piece = vm.run_value(&body);
        if space && !first {
            out.push(' ');
        }
        first = false;
        out.push_str(&piece.get_str());
        true
    });
    Value::from(out)
}

/// Registers the list commands.
///
/// # Errors
/// Fails only on a malformed signature.
pub fn register(vm: &mut Vm) -> Result<()> {
    register_queries(vm)?;
    register_searches(vm)?;
    register_iteration(vm)?;
    register_builders(vm)?;
    register_sorting(vm)
}

fn register_queries(vm: &mut Vm) -> Result<()> {
    vm.register_command("listlen", "s", |_, args| Value::from(list_len(&arg(args, 0).get_str())))?;
    vm.register_command("at", "si1V", |_, args| {
        let indexes: Vec<i64> = args.iter().skip(1).map(Value::get_int).collect();
        Value::from(list_at(&arg(args, 0).get_str(), &indexes))
    })?;
    vm.register_command("sublist", "siiN", |_, args| {
        let list = arg(args, 0).get_str();
        let count = (arg(args, 3).get_int() >= 3).then(|| count_arg(arg(args, 2)));
        Value::str(sublist(&list, count_arg(arg(args, 1)), count))
    })?;
    vm.register_command("indexof", "ss", |_, args| {
        index_or_missing(list_includes(&arg(args, 0).get_str(), &arg(args, 1).get_str()))
    })?;
    vm.register_command("prettylist", "ss", |_, args| {
        Value::from(pretty_list(&arg(args, 0).get_str(), &arg(args, 1).get_str()))
    })?;
    Ok(())
}

/// Position of the first element matching `matches`, looking only at every
/// `skip + 1`th element.
fn find_in_list(list: &str, skip: usize, matches: impl Fn(&str) -> bool) -> Option<usize> {
    parse_list(list)
        .enumerate()
        .step_by(skip.saturating_add(1))
        .find(|(_, item)| matches(item.raw()))
        .map(|(n, _)| n)
}

/// Value of the element after the first key matching `matches`, in a list
/// of key/value pairs.
fn assoc_in_list(list: &str, matches: impl Fn(&str) -> bool) -> Value {
    let mut items = parse_list(list);
    while let Some(key) = items.next() {
        if matches(key.raw()) {
            return items.next().map_or(Value::Null, |v| Value::from(v.value().into_owned()));
        }
        if items.next().is_none() {
            break;
        }
    }
    Value::Null
}

#[allow(clippy::float_cmp)]
fn register_searches(vm: &mut Vm) -> Result<()> {
    vm.register_command("listfind=", "sii", |_, args| {
        let needle = arg(args, 1).get_int();
        index_or_missing(find_in_list(&arg(args, 0).get_str(), count_arg(arg(args, 2)), |s| {
            parse_int(s) == needle
        }))
    })?;
    vm.register_command("listfind=f", "sfi", |_, args| {
        let needle = arg(args, 1).get_float();
        index_or_missing(find_in_list(&arg(args, 0).get_str(), count_arg(arg(args, 2)), |s| {
            parse_float(s) == needle
        }))
    })?;
    vm.register_command("listfind=s", "ssi", |_, args| {
        let needle = arg(args, 1).get_str();
        index_or_missing(find_in_list(&arg(args, 0).get_str(), count_arg(arg(args, 2)), |s| {
            s == needle
        }))
    })?;
    vm.register_command("listassoc=", "si", |_, args| {
        let needle = arg(args, 1).get_int();
        assoc_in_list(&arg(args, 0).get_str(), |s| parse_int(s) == needle)
    })?;
    vm.register_command("listassoc=f", "sf", |_, args| {
        let needle = arg(args, 1).get_float();
        assoc_in_list(&arg(args, 0).get_str(), |s| parse_float(s) == needle)
    })?;
    vm.register_command("listassoc=s", "ss", |_, args| {
        let needle = arg(args, 1).get_str();
        assoc_in_list(&arg(args, 0).get_str(), |s| s == needle)
    })?;
    Ok(())
}

fn register_iteration(vm: &mut Vm) -> Result<()> {
    vm.register_command("looplist", "rse", |vm, args| {
        let list = arg(args, 1).get_str().into_owned();
        for_each_group(vm, &[arg(args, 0)], &list, |vm| {
            vm.run_value(arg(args, 2));
            true
        });
        Value::Null
    })?;
    vm.register_command("looplist2", "rrse", |vm, args| {
        let list = arg(args, 2).get_str().into_owned();
        for_each_group(vm, &[arg(args, 0), arg(args, 1)], &list, |vm| {
            vm.run_value(arg(args, 3));
            true
        });
        Value::Null
    })?;
    vm.register_command("looplist3", "rrrse", |vm, args| {
        let list = arg(args, 3).get_str().into_owned();
        for_each_group(vm, &[arg(args, 0), arg(args, 1), arg(args, 2)], &list, |vm| {
            vm.run_value(arg(args, 4));
            true
        });
        Value::Null
    })?;
    vm.register_command("looplistconcat", "rse", |vm, args| loop_list_concat(vm, args, true))?;
    vm.register_command("looplistconcatword", "rse", |vm, args| {
        loop_list_concat(vm, args, false)
    })?;
    vm.register_command("listcount", "rse", |vm, args| {
        let list = arg(args, 1).get_str().into_owned();
        let mut n = 0;
        for_each_group(vm, &[arg(args, 0)], &list, |vm| {
            if vm.run_cond(arg(args, 2)) {
                n += 1;
            }
            true
        });
        Value::Int(n)
    })?;
    vm.register_command("listfind", "rse", |vm, args| {
        let list = arg(args, 1).get_str().into_owned();
        let mut n = 0;
        let mut found = None;
        for_each_group(vm, &[arg(args, 0)], &list, |vm| {
            if vm.run_cond(arg(args, 2)) {
                found = Some(n);
                return false;
            }
            n += 1;
            true
        });
        index_or_missing(found)
    })?;
    vm.register_command("listassoc", "rse", |vm, args| {
        let list = arg(args, 1).get_str().into_owned();
        let Some(mut var) = LoopVar::new(vm, arg(args, 0)) else {
            return Value::Null;
        };
        let mut items = parse_list(&list);
        let mut found = None;
        while let Some(key) = items.next() {
            var.set(vm, Value::from(key.value().into_owned()));
            let value = items.next();
            if vm.run_cond(arg(args, 2)) {
                found = Some(value.map_or(Value::Null, |v| Value::from(v.value().into_owned())));
                break;
            }
            if value.is_none() {
                break;
            }
        }
        var.finish(vm);
        found.unwrap_or(Value::Null)
    })?;
    Ok(())
}

fn register_builders(vm: &mut Vm) -> Result<()> {
    vm.register_command("listdel", "ss", |_, args| {
        Value::from(filter_list(&arg(args, 0).get_str(), &arg(args, 1).get_str(), false))
    })?;
    vm.register_command("listintersect", "ss", |_, args| {
        Value::from(filter_list(&arg(args, 0).get_str(), &arg(args, 1).get_str(), true))
    })?;
    vm.register_command("listunion", "ss", |_, args| {
        Value::from(list_union(&arg(args, 0).get_str(), &arg(args, 1).get_str()))
    })?;
    vm.register_command("listsplice", "ssii", |_, args| {
        Value::from(list_splice(
            &arg(args, 0).get_str(),
            &arg(args, 1).get_str(),
            count_arg(arg(args, 2)),
            count_arg(arg(args, 3)),
        ))
    })?;
    Ok(())
}

/// An element being sorted: its value and its text as written.
struct SortItem<'a> {
    value: Value,
    quoted: &'a str,
}

/// Binds `a` and `b` to the two comparison variables and runs `body`.
fn compare_items(vm: &mut Vm, vars: (&Value, &Value), a: &SortItem<'_>, b: &SortItem<'_>, body: &Value) -> bool {
    if let (Some(x), Some(y)) = (vars.0.as_ident(), vars.1.as_ident()) {
        vm.set_binding(x, a.value.clone());
        vm.set_binding(y, b.value.clone());
    }
    vm.run_cond(body)
}

/// Sorts `list` with `less` (true when its `x` element sorts before `y`)
/// and drops elements `unique` reports equal to an earlier one. Either
/// body may be empty: an empty `less` keeps the original order.
fn sort_list(vm: &mut Vm, list: &str, x: &Value, y: &Value, less: &Value, unique: &Value) -> Value {
    let (Some(xid), Some(yid)) = (x.as_ident(), y.as_ident()) else {
        return Value::Null;
    };
    let is_alias = |id| vm.registry().ident(id).as_alias().is_some();
    if xid == yid || !is_alias(xid) || !is_alias(yid) {
        return Value::Null;
    }
    let mut items: Vec<SortItem<'_>> = parse_list(list)
        .map(|item| SortItem { value: Value::from(item.value().into_owned()), quoted: item.quoted() })
        .collect();
    if items.is_empty() {
        return Value::str(list);
    }

    vm.push_binding(xid, Value::Null);
    vm.push_binding(yid, Value::Null);
    let sorts = less.as_code().is_some_and(|c| !c.is_noop());
    let dedups = unique.as_code().is_some_and(|c| !c.is_noop());

    if sorts {
        // insertion sort keeps the comparison count predictable for script bodies
        for i in 1..items.len() {
            let mut j = i;
            while j > 0 && compare_items(vm, (x, y), &items[j], &items[j - 1], less) {
                items.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    let mut kept: Vec<usize> = Vec::with_capacity(items.len());
    for i in 0..items.len() {
        let duplicate = dedups
            && if sorts {
                kept.last().is_some_and(|&k| compare_items(vm, (x, y), &items[k], &items[i], unique))
            } else {
                kept.iter().any(|&k| compare_items(vm, (x, y), &items[i], &items[k], unique))
            };
        if !duplicate {
            kept.push(i);
        }
    }

    vm.pop_binding(yid);
    vm.pop_binding(xid);
    let out: Vec<&str> = kept.iter().map(|&i| items[i].quoted).collect();
    Value::from(out.join(" "))
}

fn register_sorting(vm: &mut Vm) -> Result<()> {
    vm.register_command("sortlist", "srree", |vm, args| {
        let list = arg(args, 0).get_str().into_owned();
        sort_list(vm, &list, arg(args, 1), arg(args, 2), arg(args, 3), arg(args, 4))
    })?;
    vm.register_command("uniquelist", "srre", |vm, args| {
        let list = arg(args, 0).get_str().into_owned();
        sort_list(vm, &list, arg(args, 1), arg(args, 2), &Value::Null, arg(args, 3))
    })?;
    Ok(())
}
