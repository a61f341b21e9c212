//! Number parsing, formatting, and string truthiness.
//!
//! Parsing follows C conventions: integers accept an optional sign, `0x`
//! hexadecimal and leading-zero octal prefixes; floats accept decimal and
//! exponent forms and fall back to integer parsing for hex text. Both stop at
//! the first character that does not belong to the number.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

/// Significant digits used when a float is not integral.
const FLOAT_PRECISION: usize = 7;

fn is_c_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

/// Parses an integer prefix of `s`, returning the value and the number of
/// bytes consumed (0 if no digits were found).
///
/// Overflow saturates to all bits set and a leading `-` negates with
/// wrap-around, matching unsigned C parsing.
#[must_use]
pub fn parse_int_prefix(s: &str) -> (i64, usize) {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && is_c_space(b[i]) {
        i += 1;
    }
    let mut negative = false;
    if let Some(&sign @ (b'+' | b'-')) = b.get(i) {
        negative = sign == b'-';
        i += 1;
    }

    let hex = b.get(i) == Some(&b'0')
        && matches!(b.get(i + 1), Some(b'x' | b'X'))
        && b.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
    let (radix, start) = if hex {
        (16, i + 2)
    } else if b.get(i) == Some(&b'0') {
        (8, i)
    } else {
        (10, i)
    };

    let mut end = start;
    let mut acc: u64 = 0;
    let mut overflow = false;
    while let Some(digit) = b.get(end).and_then(|&c| char::from(c).to_digit(radix)) {
        match acc
            .checked_mul(u64::from(radix))
            .and_then(|v| v.checked_add(u64::from(digit)))
        {
            Some(v) => acc = v,
            None => overflow = true,
        }
        end += 1;
    }
    if end == start {
        return (0, 0);
    }
    let value = if overflow {
        u64::MAX
    } else if negative {
        acc.wrapping_neg()
    } else {
        acc
    };
    (value as i64, end)
}

/// Parses the integer prefix of `s`, or 0.
#[must_use]
pub fn parse_int(s: &str) -> i64 {
    parse_int_prefix(s).0
}

/// Parses a float prefix of `s`, returning the value and bytes consumed.
#[must_use]
pub fn parse_float_prefix(s: &str) -> (f64, usize) {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && is_c_space(b[i]) {
        i += 1;
    }
    let number_start = i;
    if matches!(b.get(i), Some(b'+' | b'-')) {
        i += 1;
    }

    if let Some(len) = special_float_len(&s[i..]) {
        let end = i + len;
        return (s[number_start..end].parse().unwrap_or(0.0), end);
    }

    let int_start = i;
    while b.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let mut digits = i - int_start;
    if b.get(i) == Some(&b'.') {
        let frac_start = i + 1;
        let mut j = frac_start;
        while b.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return (0.0, 0);
    }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(b.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while b.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    let value: f64 = s[number_start..i].parse().unwrap_or(0.0);
    if value == 0.0 && matches!(b.get(i), Some(b'x' | b'X')) {
        let (int, consumed) = parse_int_prefix(s);
        return (int as f64, consumed);
    }
    (value, i)
}

fn special_float_len(s: &str) -> Option<usize> {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    if lower.starts_with("infinity") {
        Some(8)
    } else if lower.starts_with("inf") || lower.starts_with("nan") {
        Some(3)
    } else {
        None
    }
}

/// Parses the float prefix of `s`, or 0.0.
#[must_use]
pub fn parse_float(s: &str) -> f64 {
    parse_float_prefix(s).0
}

/// Formats an integer the way scripts see it.
#[must_use]
pub fn format_int(v: i64) -> String {
    v.to_string()
}

/// Formats a float the way scripts see it: integral values keep one decimal
/// (`3.0`), everything else uses seven significant digits (`0.3333333`).
#[must_use]
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 9.2e18 {
        format!("{v:.1}")
    } else {
        format_general(v, FLOAT_PRECISION)
    }
}

/// `%g`-style formatting with `precision` significant digits.
#[must_use]
pub fn format_general(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return if v.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{v:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Returns true if `s` starts like a number, which makes it unusable as an
/// identifier name.
#[must_use]
pub fn check_number(s: &str) -> bool {
    let b = s.as_bytes();
    let digit_at = |i: usize| b.get(i).is_some_and(u8::is_ascii_digit);
    match b.first() {
        Some(c) if c.is_ascii_digit() => true,
        Some(b'+' | b'-') => digit_at(1) || (b.get(1) == Some(&b'.') && digit_at(2)),
        Some(b'.') => digit_at(1),
        _ => false,
    }
}

/// Script truthiness of a string.
///
/// Empty strings and text that parses to a numeric zero are false; any other
/// text is true. Words that merely start with a sign or a dot are true unless
/// they actually parse as zero.
#[must_use]
pub fn str_truthy(s: &str) -> bool {
    let b = s.as_bytes();
    let digit_at = |i: usize| b.get(i).is_some_and(u8::is_ascii_digit);
    match b.first() {
        None => false,
        Some(b'+' | b'-') => match b.get(1) {
            Some(b'0') => zero_prefixed_truthy(s),
            Some(b'.') => !digit_at(2) || parse_float(s) != 0.0,
            _ => true,
        },
        Some(b'0') => zero_prefixed_truthy(s),
        Some(b'.') => !digit_at(1) || parse_float(s) != 0.0,
        Some(_) => true,
    }
}

fn zero_prefixed_truthy(s: &str) -> bool {
    let (value, end) = parse_int_prefix(s);
    if value != 0 {
        return true;
    }
    match s.as_bytes().get(end) {
        Some(b'e' | b'.') => parse_float(s) != 0.0,
        _ => false,
    }
}
