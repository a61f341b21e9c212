//! Error types for the cubescript system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Script-level problems are not propagated as `Err` through the VM; they are
//! recorded as diagnostics (plain [`Error`] values) while execution continues
//! with a null or default result.

use std::fmt;

use thiserror::Error;

/// The main error type for cubescript operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an unknown command error.
    #[must_use]
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownCommand(name.into()))
    }

    /// Creates an unknown alias lookup error.
    #[must_use]
    pub fn unknown_alias(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownAlias(name.into()))
    }

    /// Creates a read-only variable error.
    #[must_use]
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReadOnly(name.into()))
    }

    /// Creates a script error carrying a free-form message.
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Script(message.into()))
    }

    /// Creates an I/O error for the given path.
    #[must_use]
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::Io {
            path: path.into(),
            message: err.to_string(),
        })
    }

    /// Returns the line number this error was reported at, if known.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.context.as_ref().and_then(|ctx| ctx.line)
    }

    /// Renders the error the way the console prints it: an optional
    /// `file:line: ` prefix, the message, then one line per traced alias.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some(ctx) = &self.context {
            match (&ctx.source, ctx.line) {
                (Some(source), Some(line)) => out.push_str(&format!("{source}:{line}: ")),
                (None, Some(line)) => out.push_str(&format!("{line}: ")),
                _ => {}
            }
        }
        out.push_str(&self.kind.to_string());
        if let Some(ctx) = &self.context {
            for frame in &ctx.stack {
                out.push('\n');
                out.push_str(frame);
            }
        }
        out
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    /// A statement named something that is neither a command nor an alias.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A `$name` lookup found nothing bound.
    #[error("unknown alias lookup: {0}")]
    UnknownAlias(String),

    /// A numeric-looking word was used where an identifier name is needed.
    #[error("number {0} is not a valid identifier name")]
    InvalidIdentifier(String),

    /// Assignment to a numeric-looking name.
    #[error("cannot alias number {0}")]
    AliasNumber(String),

    /// Assignment to a command or keyword name.
    #[error("cannot redefine builtin {0} with an alias")]
    RedefineBuiltin(String),

    /// Registering a command over an identifier of another kind.
    #[error("cannot redefine {0} as a command")]
    RedefineCommand(String),

    /// `defvar` and friends on a name that already exists.
    #[error("cannot redefine {0} as a variable")]
    RedefineVariable(String),

    /// Write to a read-only variable.
    #[error("variable {0} is read-only")]
    ReadOnly(String),

    /// A variable assignment was clamped to its bounds.
    #[error("valid range for {name} is {min}..{max}")]
    OutOfRange {
        /// The variable name.
        name: String,
        /// The formatted lower bound.
        min: String,
        /// The formatted upper bound.
        max: String,
    },

    /// Override-mode write to a persistent variable.
    #[error("cannot override persistent variable {0}")]
    PersistentOverride(String),

    /// Nesting of blocks and calls went past the configured depth.
    #[error("exceeded recursion limit")]
    RecursionLimit,

    /// Brackets or parentheses nested deeper than the compiler follows.
    #[error("too many nested blocks")]
    NestingTooDeep,

    /// A block or sub-expression was not closed.
    #[error("missing \"{0}\"")]
    MissingDelimiter(char),

    /// A closing bracket that matches nothing.
    #[error("unexpected \"{0}\"")]
    UnexpectedDelimiter(char),

    /// More `@` escapes than enclosing blocks.
    #[error("too many @s")]
    TooManyEscapes,

    /// A command signature used an unsupported argument code.
    #[error("builtin {command} declared with illegal type: {signature}")]
    InvalidSignature {
        /// The command name.
        command: String,
        /// The offending signature text.
        signature: String,
    },

    /// A command signature declares more positional arguments than supported.
    #[error("builtin {command} declared with too many args: {count}")]
    TooManyParameters {
        /// The command name.
        command: String,
        /// The declared count.
        count: usize,
    },

    /// A script file could not be read.
    #[error("could not read \"{0}\"")]
    FileNotFound(String),

    /// I/O failure while reading or writing state.
    #[error("i/o error on {path}: {message}")]
    Io {
        /// The file involved.
        path: String,
        /// The underlying error text.
        message: String,
    },

    /// Failure encoding or decoding a state snapshot.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Message raised by a script or by a native command.
    #[error("{0}")]
    Script(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Source file being executed.
    pub source: Option<String>,
    /// Line number in source.
    pub line: Option<usize>,
    /// Column number in source.
    pub column: Option<usize>,
    /// Trace of active alias invocations, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the line number.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Sets the line and column.
    #[must_use]
    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }

    /// Returns true if the context carries no information.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.line.is_none() && self.stack.is_empty()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
            match (self.line, self.column) {
                (Some(line), Some(col)) => write!(f, ":{line}:{col}")?,
                (Some(line), None) => write!(f, ":{line}")?,
                _ => {}
            }
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "{frame}")?;
            }
        }
        Ok(())
    }
}

/// Result type alias using the cubescript [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_unknown_command() {
        let err = Error::unknown_command("frobnicate");
        assert!(matches!(err.kind, ErrorKind::UnknownCommand(_)));
        assert_eq!(err.to_string(), "unknown command: frobnicate");
    }

    #[test]
    fn error_with_context() {
        let err = Error::new(ErrorKind::MissingDelimiter(']')).with_context(
            ErrorContext::new()
                .with_source("autoexec.cfg")
                .with_position(10, 5),
        );

        assert_eq!(err.line(), Some(10));
        let ctx = err.context.unwrap();
        assert_eq!(ctx.source, Some("autoexec.cfg".to_string()));
        assert_eq!(ctx.column, Some(5));
    }

    #[test]
    fn out_of_range_message() {
        let err = Error::new(ErrorKind::OutOfRange {
            name: "fov".to_string(),
            min: "10".to_string(),
            max: "150".to_string(),
        });
        assert_eq!(err.to_string(), "valid range for fov is 10..150");
    }

    #[test]
    fn report_includes_line_and_trace() {
        let err = Error::unknown_command("nope").with_context(
            ErrorContext::new()
                .with_source("game.cfg")
                .with_line(3)
                .with_frame("  2) inner")
                .with_frame("  1) outer"),
        );
        assert_eq!(
            err.report(),
            "game.cfg:3: unknown command: nope\n  2) inner\n  1) outer"
        );
    }

    #[test]
    fn report_without_source_uses_bare_line() {
        let err =
            Error::new(ErrorKind::UnexpectedDelimiter(')')).with_context(ErrorContext::new().with_line(7));
        assert_eq!(err.report(), "7: unexpected \")\"");
    }

    #[test]
    fn delimiter_messages_quote_the_character() {
        assert_eq!(
            Error::new(ErrorKind::MissingDelimiter(']')).to_string(),
            "missing \"]\""
        );
        assert_eq!(Error::new(ErrorKind::TooManyEscapes).to_string(), "too many @s");
    }
}
