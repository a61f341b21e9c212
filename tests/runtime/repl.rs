//! Scripted REPL sessions through the editor seam.

use std::collections::VecDeque;

use cubescript_foundation::Result;
use cubescript_runtime::{LineEditor, ReadResult, Repl};

struct Script {
    lines: VecDeque<String>,
}

impl Script {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| (*l).to_string()).collect(),
        }
    }
}

impl LineEditor for Script {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadResult> {
        Ok(self.lines.pop_front().map_or(ReadResult::Eof, ReadResult::Line))
    }

    fn add_history(&mut self, _line: &str) {}

    fn set_completions(&mut self, _names: Vec<String>) {}
}

#[test]
fn session_defines_and_uses_aliases() {
    let mut repl = Repl::with_editor(Script::new(&[
        "defvarp level 1 1 9",
        "bump = [",
        "    level (+ $level 1)",
        "]",
        "bump; bump",
    ]))
    .unwrap()
    .without_banner();
    repl.run().unwrap();
    assert_eq!(repl.vm().get_var("level"), Some(3));
}

#[test]
fn unterminated_input_at_eof_still_runs() {
    let mut repl = Repl::with_editor(Script::new(&["x = 1; y = [never closed"]))
        .unwrap()
        .without_banner();
    repl.run().unwrap();
    assert_eq!(repl.vm().get_alias("x"), "1");
}

#[test]
fn eval_returns_values_for_printing() {
    let mut repl = Repl::with_editor(Script::new(&[])).unwrap();
    assert_eq!(repl.eval("concatword a b").get_str(), "ab");
    assert!(repl.eval("echo quiet").is_null());
}
