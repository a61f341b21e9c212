//! Command argument signatures.
//!
//! A signature is a string with one letter per argument:
//!
//! | code | argument |
//! |------|----------|
//! | `i`  | integer, default 0 |
//! | `b`  | integer, default `i64::MIN` |
//! | `f`  | float, default 0.0 |
//! | `F`  | float, default the previous float |
//! | `S`  | string, default `""` |
//! | `s`  | string fragment, default `""` |
//! | `T`  | any value, default null |
//! | `t`  | any value kept as a fragment, default null |
//! | `E`  | condition (code or value), default null |
//! | `e`  | code block, default empty block |
//! | `r`  | identifier, default the dummy identifier |
//! | `$`  | the command's own identifier |
//! | `N`  | number of arguments actually given |
//! | `D`  | release flag (always 0) |
//! | `C`  | all arguments joined with spaces |
//! | `V`  | all arguments as a slice |
//! | `1`-`4` | repeat the previous n letters while arguments remain |

use std::fmt;

use cubescript_foundation::{Error, ErrorKind, Result};

use crate::MAX_ARGS;

/// Most positional arguments a non-variadic command may declare.
pub const MAX_COMMAND_ARGS: usize = 12;

/// One letter of a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// `i`
    Int,
    /// `b`
    OptionalInt,
    /// `f`
    Float,
    /// `F`
    FloatOrPrevious,
    /// `S`
    Str,
    /// `s`
    CStr,
    /// `T`
    Any,
    /// `t`
    CAny,
    /// `E`
    Cond,
    /// `e`
    Code,
    /// `r`
    Ident,
    /// `$`
    SelfIdent,
    /// `N`
    Count,
    /// `D`
    Release,
    /// `C`
    Concat,
    /// `V`
    Variadic,
    /// `1`-`4`
    Repeat(usize),
}

impl ArgKind {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'i' => Self::Int,
            'b' => Self::OptionalInt,
            'f' => Self::Float,
            'F' => Self::FloatOrPrevious,
            'S' => Self::Str,
            's' => Self::CStr,
            'T' => Self::Any,
            't' => Self::CAny,
            'E' => Self::Cond,
            'e' => Self::Code,
            'r' => Self::Ident,
            '$' => Self::SelfIdent,
            'N' => Self::Count,
            'D' => Self::Release,
            'C' => Self::Concat,
            'V' => Self::Variadic,
            '1'..='4' => Self::Repeat(c as usize - '0' as usize),
            _ => return None,
        })
    }

    /// Returns true for letters that occupy an argument slot.
    #[must_use]
    pub fn is_positional(self) -> bool {
        !matches!(self, Self::Concat | Self::Variadic | Self::Repeat(_))
    }
}

/// A parsed command signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    text: String,
    kinds: Vec<ArgKind>,
    arity: usize,
    variadic: bool,
}

impl Signature {
    /// Parses `text` as the signature of `command`.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidSignature`] for unknown letters or a repeat group
    /// with nothing to repeat, and [`ErrorKind::TooManyParameters`] when a
    /// non-variadic command declares more than [`MAX_COMMAND_ARGS`].
    pub fn parse(command: &str, text: &str) -> Result<Self> {
        let invalid = || {
            Error::new(ErrorKind::InvalidSignature {
                command: command.to_string(),
                signature: text.to_string(),
            })
        };

        let mut kinds = Vec::with_capacity(text.len());
        for c in text.chars() {
            let kind = ArgKind::from_char(c).ok_or_else(invalid)?;
            if let ArgKind::Repeat(n) = kind {
                let group = kinds.len().checked_sub(n).ok_or_else(invalid)?;
                if !kinds[group..].iter().any(|k: &ArgKind| k.is_positional()) {
                    return Err(invalid());
                }
            }
            kinds.push(kind);
        }

        let variadic = kinds
            .iter()
            .any(|k| matches!(k, ArgKind::Concat | ArgKind::Variadic));
        let arity = count_slots(&kinds);
        if !variadic && arity > MAX_COMMAND_ARGS {
            return Err(Error::new(ErrorKind::TooManyParameters {
                command: command.to_string(),
                count: arity,
            }));
        }

        Ok(Self {
            text: text.to_string(),
            kinds,
            arity,
            variadic,
        })
    }

    /// The signature as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The parsed letters.
    #[must_use]
    pub fn kinds(&self) -> &[ArgKind] {
        &self.kinds
    }

    /// Number of argument slots a fixed-arity call passes.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns true if the signature ends in `C` or `V`.
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

/// Counts slots the way repeat groups expand: a group repeats until the
/// argument limit is reached.
fn count_slots(kinds: &[ArgKind]) -> usize {
    let mut slots = 0;
    let mut i = 0;
    while i < kinds.len() {
        match kinds[i] {
            ArgKind::Repeat(n) if slots < MAX_ARGS => {
                i -= n;
                continue;
            }
            kind if kind.is_positional() && slots < MAX_ARGS => slots += 1,
            _ => {}
        }
        i += 1;
    }
    slots
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?})", self.text)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_letters() {
        let sig = Signature::parse("test", "sie").unwrap();
        assert_eq!(sig.kinds(), &[ArgKind::CStr, ArgKind::Int, ArgKind::Code]);
        assert_eq!(sig.arity(), 3);
        assert!(!sig.is_variadic());
        assert_eq!(sig.as_str(), "sie");
    }

    #[test]
    fn empty_signature() {
        let sig = Signature::parse("quit", "").unwrap();
        assert_eq!(sig.arity(), 0);
        assert!(sig.kinds().is_empty());
    }

    #[test]
    fn variadic_signatures() {
        assert!(Signature::parse("echo", "C").unwrap().is_variadic());
        let sig = Signature::parse("+", "i1V").unwrap();
        assert!(sig.is_variadic());
        assert_eq!(sig.arity(), MAX_ARGS);
    }

    #[test]
    fn rejects_unknown_letters() {
        let err = Signature::parse("bad", "ix").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidSignature { .. }));
        assert_eq!(
            err.to_string(),
            "builtin bad declared with illegal type: ix"
        );
    }

    #[test]
    fn rejects_empty_repeat_group() {
        assert!(Signature::parse("bad", "2i").is_err());
        assert!(Signature::parse("bad", "V1").is_err());
    }

    #[test]
    fn rejects_too_many_parameters() {
        let err = Signature::parse("wide", "iiiiiiiiiiiii").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::TooManyParameters { count: 13, .. }
        ));
        assert!(Signature::parse("wide", "iiiiiiiiiiii").is_ok());
    }

    #[test]
    fn repeat_without_variadic_exceeds_limit() {
        assert!(Signature::parse("rep", "ss1").is_err());
    }
}
