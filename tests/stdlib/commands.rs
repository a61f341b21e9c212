//! Spot checks across the command tables.

use cubescript_stdlib::standard_vm;

fn eval(script: &str) -> String {
    let mut vm = standard_vm().unwrap();
    let out = vm.execute_string(script).unwrap_or_default();
    assert!(vm.take_diagnostics().is_empty(), "diagnostics from {script:?}");
    out
}

#[test]
fn integer_math() {
    for (script, expected) in [
        ("+ 1 2 3", "6"),
        ("- 5", "-5"),
        ("- 10 3 2", "5"),
        ("* 2 3 4", "24"),
        ("div 7 2", "3"),
        ("div 7 0", "0"),
        ("mod 7 0", "0"),
        ("& 12 10", "8"),
        ("| 12 10", "14"),
        ("^ 5", "-6"),
        ("<< 1 4", "16"),
        ("<< 1 70", "0"),
        ("min 3 1 2", "1"),
        ("max 3 1 2", "3"),
        ("abs -4", "4"),
        ("bitscan 8", "3"),
    ] {
        assert_eq!(eval(script), expected, "{script}");
    }
}

#[test]
fn float_math() {
    for (script, expected) in [
        ("+f 1 2", "3.0"),
        ("divf 1 4", "0.25"),
        ("pow 2 10", "1024.0"),
        ("maxf 1.5 2.5", "2.5"),
        ("sqrt 16", "4.0"),
        ("floor 2.7", "2.0"),
        ("ceil 2.1", "3.0"),
        ("absf -1.5", "1.5"),
    ] {
        assert_eq!(eval(script), expected, "{script}");
    }
    let sin = eval("sin 90").parse::<f64>().unwrap();
    assert!((sin - 1.0).abs() < 1e-9);
}

#[test]
fn comparisons_chain() {
    assert_eq!(eval("< 1 2 3"), "1");
    assert_eq!(eval("< 1 3 2"), "0");
    assert_eq!(eval("=f 0.5 0.5"), "1");
    assert_eq!(eval("=s abc abc"), "1");
    assert_eq!(eval("strcmp abc abd"), "0");
    assert_eq!(eval("<s abc abd"), "1");
}

#[test]
fn string_commands() {
    assert_eq!(eval("concat a b c"), "a b c");
    assert_eq!(eval("concatword a b c"), "abc");
    assert_eq!(eval("format \"%1-%2 %%\" x y"), "x-y %");
    assert_eq!(eval("strlen hello"), "5");
    assert_eq!(eval("strupper MiXed"), "MIXED");
    assert_eq!(eval("substr \"Hello World\" 6 5"), "World");
    assert_eq!(eval("strstr \"Hello World\" World"), "6");
    assert_eq!(eval("strstr abc z"), "-1");
    assert_eq!(eval("strreplace \"Hello World\" o 0"), "Hell0 W0rld");
    assert_eq!(eval("escape \"a^\"b\""), "\"a^\"b\"");
    assert_eq!(eval("unescape [x^ty]"), "x\ty");
}

#[test]
fn list_commands() {
    assert_eq!(eval("listlen [a b c]"), "3");
    assert_eq!(eval("at [a b c] 1"), "b");
    assert_eq!(eval("listdel [a b c] b"), "a c");
    assert_eq!(eval("listintersect [a b c] [c a z]"), "a c");
    assert_eq!(eval("listunion [a b] [b c]"), "a b c");
    assert_eq!(eval("prettylist [1 3 5] and"), "1, 3, and 5");
    assert_eq!(eval("sortlist [5 3 8 1] a b [< $a $b]"), "1 3 5 8");
}

#[test]
fn control_commands() {
    assert_eq!(eval("case 2 1 [result one] 2 [result two]"), "two");
    assert_eq!(eval("cases b a [result A] b [result B]"), "B");
    assert_eq!(eval("? 0 yes no"), "no");
    assert_eq!(eval("cond [= 1 0] [result x] [= 1 1] [result y]"), "y");
    assert_eq!(eval("tohex 255 4"), "0x00FF");
    assert_eq!(eval("loopconcat i 3 [result $i]"), "0 1 2");
}
