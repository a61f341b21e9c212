//! Error kinds and console rendering.

use cubescript_foundation::{Error, ErrorContext, ErrorKind};

#[test]
fn messages_match_console_text() {
    assert_eq!(Error::unknown_command("foo").to_string(), "unknown command: foo");
    assert_eq!(Error::read_only("numargs").to_string(), "variable numargs is read-only");
    assert_eq!(
        Error::new(ErrorKind::FileNotFound("a.cfg".into())).to_string(),
        "could not read \"a.cfg\""
    );
    assert_eq!(Error::new(ErrorKind::MissingDelimiter(']')).to_string(), "missing \"]\"");
    assert_eq!(Error::script("custom").to_string(), "custom");
}

#[test]
fn report_includes_location_and_trace() {
    let err = Error::new(ErrorKind::UnknownAlias("x".into())).with_context(
        ErrorContext::new()
            .with_source("init.cfg")
            .with_line(3)
            .with_frame("  1) inner")
            .with_frame("  2) outer"),
    );
    assert_eq!(err.line(), Some(3));
    assert_eq!(
        err.report(),
        "init.cfg:3: unknown alias lookup: x\n  1) inner\n  2) outer"
    );
}

#[test]
fn report_without_context_is_message() {
    let err = Error::new(ErrorKind::RecursionLimit);
    assert_eq!(err.report(), "exceeded recursion limit");
    assert!(ErrorContext::new().is_empty());
}

#[test]
fn io_errors_name_the_path() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = Error::io("save.cfg", &io);
    assert!(matches!(err.kind, ErrorKind::Io { ref path, .. } if path == "save.cfg"));
    assert!(err.to_string().starts_with("i/o error on save.cfg"));
}
