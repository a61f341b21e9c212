//! Value coercion and truthiness.

use cubescript_language::{Ret, Value};

#[test]
fn truthiness_table() {
    for (text, expected) in [
        ("0", false),
        ("0x0", false),
        ("0.0", false),
        ("-0.5", true),
        ("", false),
        ("abc", true),
        ("+0", false),
        ("1", true),
    ] {
        assert_eq!(Value::str(text).get_bool(), expected, "{text:?}");
    }
    assert!(!Value::Int(0).get_bool());
    assert!(!Value::Float(0.0).get_bool());
    assert!(Value::Float(0.5).get_bool());
    assert!(!Value::Null.get_bool());
}

#[test]
fn coercions_between_types() {
    assert_eq!(Value::str("0x20").get_int(), 32);
    assert!((Value::str("2.5").get_float() - 2.5).abs() < f64::EPSILON);
    assert_eq!(Value::Float(3.9).get_int(), 3);
    assert_eq!(Value::Int(7).get_str(), "7");
    assert_eq!(Value::Float(2.0).get_str(), "2.0");
    assert_eq!(Value::Null.get_str(), "");
    assert_eq!(Value::Null.get_int(), 0);
}

#[test]
fn forcing_is_idempotent() {
    for ret in [Ret::Int, Ret::Float, Ret::Str, Ret::Null] {
        let once = Value::str("12.5").forced(ret);
        let twice = once.clone().forced(ret);
        assert_eq!(once, twice);
    }
    let mut v = Value::str("12.5");
    assert_eq!(v.force_int(), 12);
    assert_eq!(v, Value::Int(12));
}

#[test]
fn conversions_from_host_types() {
    assert_eq!(Value::from(true), Value::Int(1));
    assert_eq!(Value::from(5usize), Value::Int(5));
    assert_eq!(Value::from("hi").get_str(), "hi");
    assert!(Value::from(None::<String>).is_null());
}
