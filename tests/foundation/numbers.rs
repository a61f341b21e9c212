//! Number parsing and formatting.

use cubescript_foundation::{
    check_number, format_float, parse_float, parse_float_prefix, parse_int, parse_int_prefix,
    str_truthy,
};

#[test]
fn integers_follow_c_prefixes() {
    assert_eq!(parse_int("42"), 42);
    assert_eq!(parse_int("-17"), -17);
    assert_eq!(parse_int("0x1F"), 31);
    assert_eq!(parse_int("010"), 8);
    assert_eq!(parse_int("  7 apples"), 7);
    assert_eq!(parse_int("apples"), 0);
}

#[test]
fn integer_prefix_reports_consumed_bytes() {
    assert_eq!(parse_int_prefix("123abc"), (123, 3));
    assert_eq!(parse_int_prefix("abc"), (0, 0));
    assert_eq!(parse_int_prefix("0xZ").1, 1);
}

#[test]
fn floats_accept_decimal_and_exponent_forms() {
    assert!((parse_float("1.5") - 1.5).abs() < f64::EPSILON);
    assert!((parse_float(".25") - 0.25).abs() < f64::EPSILON);
    assert!((parse_float("2e3") - 2000.0).abs() < f64::EPSILON);
    assert!((parse_float("0x10") - 16.0).abs() < f64::EPSILON);
    assert_eq!(parse_float_prefix("3.5kg"), (3.5, 3));
    assert!(parse_float("-inf").is_infinite());
}

#[test]
fn floats_format_like_the_console() {
    assert_eq!(format_float(3.0), "3.0");
    assert_eq!(format_float(-2.0), "-2.0");
    assert_eq!(format_float(0.5), "0.5");
    assert_eq!(format_float(1.0 / 3.0), "0.3333333");
}

#[test]
fn numeric_names_are_detected() {
    assert!(check_number("5x"));
    assert!(check_number("-1"));
    assert!(check_number(".5"));
    assert!(!check_number("-"));
    assert!(!check_number("x5"));
}

#[test]
fn string_truthiness() {
    assert!(!str_truthy(""));
    assert!(!str_truthy("0"));
    assert!(!str_truthy("0.0"));
    assert!(!str_truthy("-0"));
    assert!(str_truthy("1"));
    assert!(str_truthy("false"));
    assert!(str_truthy("-"));
}
