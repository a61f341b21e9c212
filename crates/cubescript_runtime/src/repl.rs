//! The main REPL implementation.

use std::fs;
use std::path::Path;

use cubescript_foundation::{Error, ErrorKind, Result};
use cubescript_language::{Value, Vm};
use cubescript_stdlib::standard_vm;
use log::info;

use crate::editor::{LineEditor, ReadResult, RustylineEditor, is_complete};

/// Source name attached to diagnostics from interactive input.
const STDIN_SOURCE: &str = "<stdin>";

/// The interactive REPL.
pub struct Repl<E: LineEditor = RustylineEditor> {
    /// The line editor for input.
    editor: E,

    /// The interpreter with the standard library registered.
    vm: Vm,

    /// Whether to show the welcome banner.
    show_banner: bool,

    /// Primary prompt.
    prompt: String,

    /// Continuation prompt (for multi-line input).
    continuation_prompt: String,
}

impl Repl<RustylineEditor> {
    /// Creates a new REPL with the default rustyline editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor fails to initialize.
    pub fn new() -> Result<Self> {
        let editor = RustylineEditor::new()?;
        Self::with_editor(editor)
    }
}

impl<E: LineEditor> Repl<E> {
    /// Creates a new REPL with the given editor and a standard VM.
    ///
    /// # Errors
    ///
    /// Returns an error if the standard library fails to register.
    pub fn with_editor(editor: E) -> Result<Self> {
        Ok(Self::with_vm(editor, standard_vm()?))
    }

    /// Creates a new REPL around an existing VM.
    pub fn with_vm(editor: E, vm: Vm) -> Self {
        let mut repl = Self {
            editor,
            vm,
            show_banner: true,
            prompt: "> ".to_string(),
            continuation_prompt: ".. ".to_string(),
        };
        repl.refresh_completions();
        repl
    }

    /// Disables the welcome banner.
    #[must_use]
    pub const fn without_banner(mut self) -> Self {
        self.show_banner = false;
        self
    }

    /// Sets the primary prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Returns a reference to the VM.
    #[must_use]
    pub const fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Returns a mutable reference to the VM.
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Consumes the REPL and returns its VM.
    #[must_use]
    pub fn into_vm(self) -> Vm {
        self.vm
    }

    /// Runs the REPL loop until end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input fails.
    pub fn run(&mut self) -> Result<()> {
        if self.show_banner {
            print_banner();
        }

        while let Some(input) = self.read_input()? {
            if input.trim().is_empty() {
                continue;
            }
            self.editor.add_history(&input);

            let value = self.eval(&input);
            if !value.is_null() {
                println!("{}", value.get_str());
            }
        }

        println!();
        Ok(())
    }

    /// Reads a potentially multi-line input. `None` means end of input.
    fn read_input(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let mut first_line = true;

        loop {
            let prompt = if first_line {
                &self.prompt
            } else {
                &self.continuation_prompt
            };

            match self.editor.read_line(prompt)? {
                ReadResult::Line(line) => {
                    if !first_line {
                        input.push('\n');
                    }
                    input.push_str(&line);
                    if is_complete(&input) {
                        return Ok(Some(input));
                    }
                    first_line = false;
                }
                ReadResult::Interrupted => {
                    if !first_line {
                        println!("input cancelled");
                    }
                    return Ok(Some(String::new()));
                }
                ReadResult::Eof if first_line => return Ok(None),
                // Run what was typed; the compiler reports the open bracket.
                ReadResult::Eof => return Ok(Some(input)),
            }
        }
    }

    /// Evaluates input, prints what it echoed and any diagnostics, and
    /// returns the result.
    pub fn eval(&mut self, input: &str) -> Value {
        let value = self.vm.execute_source(STDIN_SOURCE, input);
        self.flush();
        self.refresh_completions();
        value
    }

    /// Runs a script file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read. Script errors are
    /// diagnostics and are printed rather than returned.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::new(ErrorKind::FileNotFound(path.display().to_string()))
            }
            _ => Error::io(path.display().to_string(), &e),
        })?;
        info!("executing {}", path.display());
        self.vm.execute_source(&path.display().to_string(), &text);
        self.flush();
        self.refresh_completions();
        Ok(())
    }

    /// Prints buffered script output to stdout and diagnostics to stderr.
    pub fn flush(&mut self) {
        for line in self.vm.take_output() {
            println!("{line}");
        }
        for err in self.vm.take_diagnostics() {
            eprintln!("\x1b[31m{}\x1b[0m", err.report());
        }
    }

    fn refresh_completions(&mut self) {
        let names = self
            .vm
            .registry()
            .names_with_prefix("")
            .into_iter()
            .map(String::from)
            .collect();
        self.editor.set_completions(names);
    }
}

fn print_banner() {
    println!(
        "\x1b[1mcubescript\x1b[0m {}\n\
         Type commands; brackets continue across lines. Ctrl+D exits.\n",
        env!("CARGO_PKG_VERSION")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Mock editor for testing.
    #[derive(Default)]
    struct MockEditor {
        inputs: VecDeque<ReadResult>,
        history: Vec<String>,
        prompts: Vec<String>,
        completions: Vec<String>,
    }

    impl MockEditor {
        fn with_lines(lines: &[&str]) -> Self {
            Self {
                inputs: lines
                    .iter()
                    .map(|line| ReadResult::Line((*line).to_string()))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl LineEditor for MockEditor {
        fn read_line(&mut self, prompt: &str) -> Result<ReadResult> {
            self.prompts.push(prompt.to_string());
            Ok(self.inputs.pop_front().unwrap_or(ReadResult::Eof))
        }

        fn add_history(&mut self, line: &str) {
            self.history.push(line.to_string());
        }

        fn set_completions(&mut self, names: Vec<String>) {
            self.completions = names;
        }
    }

    fn repl(lines: &[&str]) -> Repl<MockEditor> {
        Repl::with_editor(MockEditor::with_lines(lines))
            .unwrap()
            .without_banner()
    }

    #[test]
    fn eval_returns_result() {
        let mut repl = repl(&[]);
        assert_eq!(repl.eval("+ 1 2").get_int(), 3);
        assert!(repl.eval("").is_null());
    }

    #[test]
    fn state_persists_between_inputs() {
        let mut repl = repl(&["x = 5", "", "y = (* $x 2)"]);
        repl.run().unwrap();
        assert_eq!(repl.vm().get_alias("y"), "10");
        assert_eq!(repl.editor.history, vec!["x = 5", "y = (* $x 2)"]);
    }

    #[test]
    fn multi_line_input_continues_until_balanced() {
        let mut repl = repl(&["f = [", "result 7", "]", "g = (f)"]);
        repl.run().unwrap();
        assert_eq!(repl.vm().get_alias("g"), "7");
        assert_eq!(repl.editor.prompts[..3], ["> ", ".. ", ".. "]);
        assert_eq!(repl.editor.history[0], "f = [\nresult 7\n]");
    }

    #[test]
    fn interrupt_discards_partial_input() {
        let mut editor = MockEditor::with_lines(&["f = [", "echo lost"]);
        editor.inputs.insert(2, ReadResult::Interrupted);
        editor.inputs.push_back(ReadResult::Line("z = 1".to_string()));
        let mut repl = Repl::with_editor(editor).unwrap().without_banner();
        repl.run().unwrap();
        assert!(!repl.vm().ident_exists("f"));
        assert_eq!(repl.vm().get_alias("z"), "1");
    }

    #[test]
    fn completions_follow_new_aliases() {
        let mut repl = repl(&[]);
        assert!(repl.editor.completions.iter().any(|n| n == "echo"));
        assert!(!repl.editor.completions.iter().any(|n| n == "greeting"));
        repl.eval("greeting = hello");
        assert!(repl.editor.completions.iter().any(|n| n == "greeting"));
    }

    #[test]
    fn flush_drains_output_and_diagnostics() {
        let mut repl = repl(&[]);
        repl.vm_mut().execute("echo hi; nosuchcommand");
        repl.flush();
        assert!(repl.vm().output().is_empty());
        assert!(repl.vm().diagnostics().is_empty());
    }

    #[test]
    fn eval_file_runs_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.cfg");
        fs::write(&path, "counter = 0\nloop i 4 [counter = (+ $counter $i)]\n").unwrap();
        let mut repl = repl(&[]);
        repl.eval_file(&path).unwrap();
        assert_eq!(repl.vm().get_alias("counter"), "6");

        let err = repl.eval_file(dir.path().join("missing.cfg")).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::FileNotFound(_)));
    }
}
