//! Runtime values.
//!
//! Scripts are stringly typed at the edges, so every value can be read as an
//! integer, a float, a string or a truth value. The `force_*` family converts
//! a value in place; the `get_*` family reads it without changing it.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use cubescript_foundation::{format_float, format_int, parse_float, parse_int, str_truthy};

use crate::ident::IdentId;
use crate::opcode::{Code, Ret};

/// A tagged script value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Owned string.
    Str(Rc<str>),
    /// String fragment taken from source text or another value without copying.
    Macro(Rc<str>),
    /// Reference to an identifier.
    Ident(IdentId),
    /// Compiled code.
    Code(Code),
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    /// The empty string.
    #[must_use]
    pub fn empty_str() -> Self {
        Self::Str(Rc::from(""))
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for string and macro values.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::Str(_) | Self::Macro(_))
    }

    /// Borrows the text of a string or macro value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Macro(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the identifier of an ident value.
    #[must_use]
    pub fn as_ident(&self) -> Option<IdentId> {
        match self {
            Self::Ident(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the code of a code value.
    #[must_use]
    pub fn as_code(&self) -> Option<&Code> {
        match self {
            Self::Code(code) => Some(code),
            _ => None,
        }
    }

    /// Reads the value as an integer. Floats truncate, strings parse with C
    /// rules, everything else is 0.
    #[must_use]
    pub fn get_int(&self) -> i64 {
        match self {
            Self::Int(i) => *i,
            Self::Float(f) => *f as i64,
            Self::Str(s) | Self::Macro(s) => parse_int(s),
            _ => 0,
        }
    }

    /// Reads the value as a float.
    #[must_use]
    pub fn get_float(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Str(s) | Self::Macro(s) => parse_float(s),
            _ => 0.0,
        }
    }

    /// Reads the value as text. Numbers are formatted, non-text values are
    /// empty.
    #[must_use]
    pub fn get_str(&self) -> Cow<'_, str> {
        match self {
            Self::Str(s) | Self::Macro(s) => Cow::Borrowed(s),
            Self::Int(i) => Cow::Owned(format_int(*i)),
            Self::Float(f) => Cow::Owned(format_float(*f)),
            _ => Cow::Borrowed(""),
        }
    }

    /// Script truthiness.
    #[must_use]
    pub fn get_bool(&self) -> bool {
        match self {
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) | Self::Macro(s) => str_truthy(s),
            _ => false,
        }
    }

    /// A detached copy: text becomes an owned string, numbers are kept and
    /// anything else is null.
    #[must_use]
    pub fn get_val(&self) -> Value {
        match self {
            Self::Str(s) | Self::Macro(s) => Self::Str(s.clone()),
            Self::Int(i) => Self::Int(*i),
            Self::Float(f) => Self::Float(*f),
            _ => Self::Null,
        }
    }

    /// Like [`Value::get_val`], but text stays a macro fragment.
    #[must_use]
    pub fn get_cval(&self) -> Value {
        match self {
            Self::Str(s) | Self::Macro(s) => Self::Macro(s.clone()),
            Self::Int(i) => Self::Int(*i),
            Self::Float(f) => Self::Float(*f),
            _ => Self::Null,
        }
    }

    /// The value as text: macro fragments for strings, formatted numbers for
    /// numeric values, and an empty fragment otherwise.
    #[must_use]
    pub fn get_cstr(&self) -> Value {
        match self {
            Self::Str(s) | Self::Macro(s) => Self::Macro(s.clone()),
            Self::Int(_) | Self::Float(_) => Self::Str(Rc::from(self.get_str().as_ref())),
            _ => Self::Macro(Rc::from("")),
        }
    }

    /// Converts to an integer in place and returns it.
    pub fn force_int(&mut self) -> i64 {
        let i = self.get_int();
        *self = Self::Int(i);
        i
    }

    /// Converts to a float in place and returns it.
    pub fn force_float(&mut self) -> f64 {
        let f = self.get_float();
        *self = Self::Float(f);
        f
    }

    /// Converts to an owned string in place and returns it.
    pub fn force_str(&mut self) -> Rc<str> {
        let s = match &*self {
            Self::Str(s) => return s.clone(),
            Self::Macro(s) => s.clone(),
            _ => Rc::from(self.get_str().as_ref()),
        };
        *self = Self::Str(s.clone());
        s
    }

    /// Replaces the value with null.
    pub fn force_null(&mut self) {
        *self = Self::Null;
    }

    /// Coerces to the requested result type, leaving values that already
    /// have that type untouched. [`Ret::Null`] keeps any value.
    pub fn force(&mut self, ret: Ret) {
        match ret {
            Ret::Null => {}
            Ret::Int => {
                if !matches!(self, Self::Int(_)) {
                    self.force_int();
                }
            }
            Ret::Float => {
                if !matches!(self, Self::Float(_)) {
                    self.force_float();
                }
            }
            Ret::Str => {
                if !matches!(self, Self::Str(_)) {
                    self.force_str();
                }
            }
        }
    }

    /// Returns this value coerced to `ret`.
    #[must_use]
    pub fn forced(mut self, ret: Ret) -> Self {
        self.force(ret);
        self
    }

    /// The zero value of a result type: null, `""`, 0 or 0.0.
    #[must_use]
    pub fn zero(ret: Ret) -> Self {
        match ret {
            Ret::Null => Self::Null,
            Ret::Int => Self::Int(0),
            Ret::Float => Self::Float(0.0),
            Ret::Str => Self::empty_str(),
        }
    }

    /// A boolean in the representation of a result type: `"0"`/`"1"` for
    /// strings, 0.0/1.0 for floats, and integers otherwise.
    #[must_use]
    pub fn boolean(b: bool, ret: Ret) -> Self {
        match ret {
            Ret::Str => Self::str(if b { "1" } else { "0" }),
            Ret::Float => Self::Float(if b { 1.0 } else { 0.0 }),
            Ret::Null | Ret::Int => Self::Int(i64::from(b)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits() || a == b,
            (Self::Str(a), Self::Str(b)) | (Self::Macro(a), Self::Macro(b)) => a == b,
            (Self::Ident(a), Self::Ident(b)) => a == b,
            (Self::Code(a), Self::Code(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_str())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Int(i64::from(b))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Null, Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_coercions() {
        assert_eq!(Value::Float(3.9).get_int(), 3);
        assert_eq!(Value::Float(-3.9).get_int(), -3);
        assert_eq!(Value::str("0x10").get_int(), 16);
        assert_eq!(Value::str("12abc").get_int(), 12);
        assert_eq!(Value::Null.get_int(), 0);
        assert_eq!(Value::Ident(IdentId::from_index(3)).get_int(), 0);
    }

    #[test]
    fn float_coercions() {
        assert_eq!(Value::Int(2).get_float(), 2.0);
        assert_eq!(Value::str("1.5").get_float(), 1.5);
        assert_eq!(Value::Null.get_float(), 0.0);
    }

    #[test]
    fn string_coercions() {
        assert_eq!(Value::Int(-4).get_str(), "-4");
        assert_eq!(Value::Float(2.0).get_str(), "2.0");
        assert_eq!(Value::Float(0.5).get_str(), "0.5");
        assert_eq!(Value::Null.get_str(), "");
    }

    #[test]
    fn force_replaces_in_place() {
        let mut v = Value::str("42");
        assert_eq!(v.force_int(), 42);
        assert_eq!(v, Value::Int(42));

        let mut v = Value::Macro(Rc::from("abc"));
        v.force(Ret::Str);
        assert_eq!(v, Value::str("abc"));

        let mut v = Value::Int(7);
        v.force(Ret::Null);
        assert_eq!(v, Value::Int(7));
    }

    #[test]
    fn force_str_converts_numbers() {
        let mut v = Value::Int(-12);
        assert_eq!(&*v.force_str(), "-12");
        assert_eq!(v, Value::str("-12"));

        let mut v = Value::Null;
        assert_eq!(&*v.force_str(), "");
        assert_eq!(v, Value::str(""));

        let mut v = Value::Macro(Rc::from("m"));
        assert_eq!(&*v.force_str(), "m");
        assert_eq!(v, Value::str("m"));
    }

    #[test]
    fn force_is_idempotent() {
        for ret in [Ret::Int, Ret::Float, Ret::Str] {
            let once = Value::str("3.5").forced(ret);
            let twice = once.clone().forced(ret);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Int(0).get_bool());
        assert!(!Value::Float(0.0).get_bool());
        assert!(Value::Float(-0.5).get_bool());
        assert!(!Value::str("0").get_bool());
        assert!(!Value::str("0x0").get_bool());
        assert!(!Value::str("0.0").get_bool());
        assert!(Value::str("-0.5").get_bool());
        assert!(!Value::str("").get_bool());
        assert!(Value::str("abc").get_bool());
        assert!(!Value::str("+0").get_bool());
        assert!(!Value::Null.get_bool());
    }

    #[test]
    fn copies_keep_numbers() {
        assert_eq!(Value::Macro(Rc::from("x")).get_val(), Value::str("x"));
        assert_eq!(Value::str("x").get_cval(), Value::Macro(Rc::from("x")));
        assert_eq!(Value::Int(5).get_cstr(), Value::str("5"));
        assert_eq!(Value::Null.get_cstr(), Value::Macro(Rc::from("")));
        assert_eq!(Value::Null.get_val(), Value::Null);
    }

    #[test]
    fn boolean_representation() {
        assert_eq!(Value::boolean(true, Ret::Str), Value::str("1"));
        assert_eq!(Value::boolean(false, Ret::Float), Value::Float(0.0));
        assert_eq!(Value::boolean(true, Ret::Null), Value::Int(1));
        assert_eq!(Value::zero(Ret::Str), Value::str(""));
    }
}
