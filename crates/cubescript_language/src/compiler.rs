//! Single-pass compiler from script text to bytecode.
//!
//! There is no syntax tree: the compiler scans the text once and emits
//! instructions as it goes, consulting the [`Registry`] to decide how each
//! statement is lowered. Commands are compiled against their signature,
//! aliases become calls, variables become loads and stores, and the keyword
//! forms (`if`, `&&`, `||`, `do`, `local`, ...) are folded into jumps when
//! their arguments are literal blocks.
//!
//! Words that name nothing yet are created as unknown aliases on first
//! mention. Problems found while scanning are collected as diagnostics and
//! compilation always produces runnable code.

#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

use std::rc::Rc;

use cubescript_foundation::{
    Error, ErrorContext, ErrorKind, check_number, parse_float, parse_int, parse_int_prefix,
    parse_string, parse_word, skip_comments, unescape_string,
};

use crate::ident::{Form, IdentFlags, IdentId, IdentKind, Registry};
use crate::opcode::{
    Bytecode, Code, INLINE_MAX, INLINE_MIN, Inline, Literal, Opcode, Ret, ShortStr, WordType,
};
use crate::signature::{ArgKind, Signature};
use crate::{MAX_ARGS, MAX_RESULTS, MAX_RUN_DEPTH};

/// Output of a compilation.
#[derive(Debug)]
pub struct Compiled {
    /// The program.
    pub code: Code,
    /// Problems found in the text. The program is runnable regardless.
    pub diagnostics: Vec<Error>,
}

/// Compiles `text` with no source name and no line numbers.
pub fn compile(registry: &mut Registry, text: &str) -> Compiled {
    Compiler::new(registry).compile(text, Ret::Null)
}

/// Position in the text being compiled.
struct Cursor<'t> {
    text: &'t str,
    pos: usize,
    /// Whether positions in this text map to source lines.
    lines: bool,
}

impl<'t> Cursor<'t> {
    fn new(text: &'t str, lines: bool) -> Self {
        Self {
            text,
            pos: 0,
            lines,
        }
    }

    fn at(&self, n: usize) -> u8 {
        self.text.as_bytes().get(self.pos + n).copied().unwrap_or(0)
    }

    fn peek(&self) -> u8 {
        self.at(0)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn rest(&self) -> &'t str {
        &self.text[self.pos..]
    }

    /// Advances to the next byte in `set`, or to the end.
    fn skip_until(&mut self, set: &[u8]) {
        let rest = self.rest().as_bytes();
        self.pos += rest.iter().position(|b| set.contains(b)).unwrap_or(rest.len());
    }

    fn line_at(&self, pos: usize) -> Option<usize> {
        let before = &self.text.as_bytes()[..pos.min(self.text.len())];
        self.lines
            .then(|| 1 + before.iter().filter(|&&b| b == b'\n').count())
    }

    /// Consumes a quoted string at the cursor and returns it unescaped.
    fn cut_string(&mut self) -> String {
        self.bump();
        let len = parse_string(self.rest());
        let s = unescape_string(&self.rest()[..len]);
        self.pos += len;
        if self.peek() == b'"' {
            self.bump();
        }
        s
    }

    /// Consumes a bare word at the cursor.
    fn cut_word(&mut self) -> &'t str {
        let len = parse_word(self.rest());
        let word = &self.rest()[..len];
        self.pos += len;
        word
    }
}

/// What the compiler needs to know about an identifier to lower a mention.
enum Target {
    Alias,
    Int { hex: bool },
    Float,
    Str,
    Command(Form, Rc<Signature>),
}

/// Bookkeeping while compiling the arguments of a command call.
struct CallArgs {
    numargs: usize,
    fakeargs: usize,
    more: bool,
    rep: bool,
}

/// Compiles script text against a registry.
pub struct Compiler<'r> {
    registry: &'r mut Registry,
    code: Bytecode,
    diagnostics: Vec<Error>,
    source: Option<String>,
    lines: bool,
    depth: usize,
    too_deep: bool,
}

impl<'r> Compiler<'r> {
    /// Creates a compiler. Words that name nothing are added to `registry`
    /// as unknown aliases.
    pub fn new(registry: &'r mut Registry) -> Self {
        Self {
            registry,
            code: Bytecode::new(),
            diagnostics: Vec::new(),
            source: None,
            lines: false,
            depth: 0,
            too_deep: false,
        }
    }

    /// Reports diagnostics with line numbers, prefixed with `name` if given.
    #[must_use]
    pub fn with_source(mut self, name: Option<&str>) -> Self {
        self.lines = true;
        self.source = name.map(str::to_string);
        self
    }

    /// Compiles a whole program whose result is coerced to `ret`.
    pub fn compile(mut self, text: &str, ret: Ret) -> Compiled {
        let mut cur = Cursor::new(text, self.lines);
        self.code.emit(Opcode::Start);
        self.compile_statements(&mut cur, WordType::Any, 0, 0);
        self.code.emit(Opcode::Exit(ret));
        Compiled {
            code: self.code.finish(1),
            diagnostics: self.diagnostics,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn report(&mut self, cur: &Cursor<'_>, pos: usize, kind: ErrorKind) {
        let mut err = Error::new(kind);
        if let Some(line) = cur.line_at(pos) {
            let mut ctx = ErrorContext::new().with_line(line);
            if let Some(source) = &self.source {
                ctx = ctx.with_source(source.as_str());
            }
            err = err.with_context(ctx);
        }
        self.diagnostics.push(err);
    }

    fn skip_comments(cur: &mut Cursor<'_>) {
        cur.pos += skip_comments(cur.rest());
    }

    /// Runs `f` one nesting level deeper. Past [`MAX_RUN_DEPTH`] levels the
    /// rest of the text is dropped with a single diagnostic and `false` is
    /// returned.
    fn nested<'t>(&mut self, cur: &mut Cursor<'t>, f: impl FnOnce(&mut Self, &mut Cursor<'t>)) -> bool {
        if self.depth >= MAX_RUN_DEPTH {
            if !self.too_deep {
                self.too_deep = true;
                self.report(cur, cur.pos, ErrorKind::NestingTooDeep);
            }
            cur.pos = cur.text.len();
            return false;
        }
        self.depth += 1;
        f(self, cur);
        self.depth -= 1;
        true
    }

    fn emit(&mut self, op: Opcode) -> usize {
        self.code.emit(op)
    }

    /// Looks up `name`, creating an unknown alias. Numeric names resolve to
    /// the dummy identifier.
    fn ident_or_dummy(&mut self, name: &str) -> IdentId {
        match self.registry.new_ident(name, IdentFlags::UNKNOWN) {
            Ok(id) => id,
            Err(err) => {
                self.diagnostics.push(err);
                self.registry.dummy()
            }
        }
    }

    fn target(&self, id: IdentId) -> Target {
        let ident = self.registry.ident(id);
        match &ident.kind {
            IdentKind::Alias(_) => Target::Alias,
            IdentKind::Int(_) => Target::Int {
                hex: ident.has(IdentFlags::HEX),
            },
            IdentKind::Float(_) => Target::Float,
            IdentKind::Str(_) => Target::Str,
            IdentKind::Command(c) => Target::Command(c.form, c.signature.clone()),
        }
    }

    // =========================================================================
    // Literals
    // =========================================================================

    fn compile_str(&mut self, word: &str, is_macro: bool) {
        if !is_macro {
            if let Some(short) = ShortStr::new(word) {
                self.emit(Opcode::ValI(Inline::Str(short)));
                return;
            }
        }
        self.emit_text(word, is_macro);
    }

    /// Emits text out of line regardless of its length.
    fn emit_text(&mut self, text: &str, is_macro: bool) {
        let text: Rc<str> = Rc::from(text);
        self.emit(if is_macro {
            Opcode::Macro(text)
        } else {
            Opcode::Val(Literal::Str(text))
        });
    }

    fn compile_empty_str(&mut self) {
        self.compile_str("", false);
    }

    fn compile_int(&mut self, i: i64) {
        if (INLINE_MIN..=INLINE_MAX).contains(&i) {
            self.emit(Opcode::ValI(Inline::Int(i as i32)));
        } else {
            self.emit(Opcode::Val(Literal::Int(i)));
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn compile_float(&mut self, f: f64) {
        let inline = f == f.trunc() && f >= INLINE_MIN as f64 && f <= INLINE_MAX as f64;
        if inline {
            self.emit(Opcode::ValI(Inline::Float(f as i32)));
        } else {
            self.emit(Opcode::Val(Literal::Float(f)));
        }
    }

    fn compile_null(&mut self) {
        self.emit(Opcode::ValI(Inline::Null));
    }

    fn compile_ident(&mut self, id: IdentId) {
        self.emit(if id.is_arg() {
            Opcode::IdentArg(id)
        } else {
            Opcode::Ident(id)
        });
    }

    fn compile_ident_named(&mut self, name: &str) {
        let id = self.ident_or_dummy(name);
        self.compile_ident(id);
    }

    /// Compiles `word` as a literal of the requested kind.
    fn compile_val(&mut self, wordtype: WordType, word: &str) {
        match wordtype {
            WordType::CAny if word.is_empty() => self.compile_null(),
            WordType::CAny | WordType::CStr => self.compile_str(word, true),
            WordType::Any if word.is_empty() => self.compile_null(),
            WordType::Any | WordType::Str => self.compile_str(word, false),
            WordType::Float => self.compile_float(parse_float(word)),
            WordType::Int => self.compile_int(parse_int(word)),
            WordType::Cond if word.is_empty() => self.compile_null(),
            WordType::Cond | WordType::Code => self.compile_block_text(word, Ret::Null),
            WordType::Ident => self.compile_ident_named(word),
            WordType::Word | WordType::Pop => {}
        }
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Compiles statements up to `brak` into a literal block. A block with
    /// no statements becomes [`Opcode::Empty`].
    fn compile_block_at(&mut self, cur: &mut Cursor<'_>, ret: Ret, brak: u8) {
        let start = self.emit(Opcode::Block(0));
        self.emit(Opcode::Offset);
        self.compile_statements(cur, WordType::Any, brak, 0);
        if self.code.len() > start + 2 {
            self.emit(Opcode::Exit(ret));
            let len = self.code.len() - (start + 1);
            self.code.patch_jump(start, len);
        } else {
            self.code.truncate(start);
            self.emit(Opcode::Empty(ret));
        }
    }

    /// Compiles a standalone piece of text into a literal block.
    fn compile_block_text(&mut self, text: &str, ret: Ret) {
        let mut cur = Cursor::new(text, false);
        self.compile_block_at(&mut cur, ret, 0);
    }

    /// Emits the literal text of a `[...]` block between substitutions.
    /// Carriage returns are dropped, and `//` comments too unless the
    /// comment marker is followed by punctuation.
    fn compile_block_str(&mut self, text: &str, is_macro: bool) {
        let b = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < b.len() {
            let run = b[i..]
                .iter()
                .position(|c| matches!(c, b'\r' | b'/' | b'"' | b'@' | b']'))
                .unwrap_or(b.len() - i);
            out.push_str(&text[i..i + run]);
            i += run;
            if i >= b.len() {
                break;
            }
            match b[i] {
                b'\r' => i += 1,
                b'"' => {
                    let start = i;
                    i += 1 + parse_string(&text[i + 1..]);
                    if b.get(i) == Some(&b'"') {
                        i += 1;
                    }
                    out.push_str(&text[start..i]);
                }
                b'/' if b.get(i + 1) == Some(&b'/') => {
                    let comment = b[i..].iter().position(|&c| c == b'\n').unwrap_or(b.len() - i);
                    if b.get(i + 2).is_some_and(u8::is_ascii_punctuation) {
                        out.push_str(&text[i..i + comment]);
                    }
                    i += comment;
                }
                c => {
                    out.push(char::from(c));
                    i += 1;
                }
            }
        }
        self.emit_text(&out, is_macro);
    }

    /// Compiles what follows an `@` inside a block. Returns false when
    /// nothing substitutable follows.
    fn compile_block_sub(&mut self, cur: &mut Cursor<'_>, prevargs: usize) -> bool {
        match cur.peek() {
            b'(' => self.compile_arg(cur, WordType::CAny, prevargs, None),
            b'[' => {
                if !self.compile_arg(cur, WordType::CStr, prevargs, None) {
                    return false;
                }
                self.emit(Opcode::LookupMU(Ret::Null));
                true
            }
            b'"' => {
                let name = cur.cut_string();
                self.block_sub_lookup(&name);
                true
            }
            _ => {
                let start = cur.pos;
                while cur.peek().is_ascii_alphanumeric() || cur.peek() == b'_' {
                    cur.bump();
                }
                if cur.pos == start {
                    return false;
                }
                let name = &cur.text[start..cur.pos];
                self.block_sub_lookup(name);
                true
            }
        }
    }

    fn block_sub_lookup(&mut self, name: &str) {
        let id = self.ident_or_dummy(name);
        match self.target(id) {
            Target::Int { .. } => {
                self.emit(Opcode::IntVar(id, Ret::Null));
            }
            Target::Float => {
                self.emit(Opcode::FloatVar(id, Ret::Null));
            }
            Target::Str => {
                self.emit(Opcode::StrVarM(id));
            }
            Target::Alias => {
                self.emit(if id.is_arg() {
                    Opcode::LookupMArg(id, Ret::Null)
                } else {
                    Opcode::LookupM(id, Ret::Null)
                });
            }
            Target::Command(..) => {
                self.compile_str(name, true);
                self.emit(Opcode::LookupMU(Ret::Null));
            }
        }
    }

    /// Compiles a `[...]` block; the cursor is just past the `[`.
    ///
    /// Without `@` substitutions the block is either compiled as code or
    /// kept as text, depending on what the caller wants. With them, the text
    /// runs and the substituted values are concatenated at run time.
    fn compile_block_main(&mut self, cur: &mut Cursor<'_>, wordtype: WordType, prevargs: usize) {
        let line = cur.pos;
        let mut start = cur.pos;
        let mut concs = 0usize;
        let mut brak = 1usize;
        let mut closed = true;
        while brak > 0 {
            cur.skip_until(b"@\"/[]");
            if cur.at_end() {
                if !self.too_deep {
                    self.report(cur, line, ErrorKind::MissingDelimiter(']'));
                }
                closed = false;
                break;
            }
            let c = cur.peek();
            cur.bump();
            match c {
                b'"' => {
                    cur.pos += parse_string(cur.rest());
                    if cur.peek() == b'"' {
                        cur.bump();
                    }
                }
                b'/' => {
                    if cur.peek() == b'/' {
                        cur.skip_until(b"\n");
                    }
                }
                b'[' => brak += 1,
                b']' => brak -= 1,
                _ => {
                    let esc = cur.pos;
                    while cur.peek() == b'@' {
                        cur.bump();
                    }
                    let level = cur.pos - (esc - 1);
                    if brak > level {
                        continue;
                    } else if brak < level {
                        self.report(cur, line, ErrorKind::TooManyEscapes);
                    }
                    if concs == 0 && prevargs >= MAX_RESULTS {
                        self.emit(Opcode::Enter);
                    }
                    if concs + 2 > MAX_ARGS {
                        self.emit(Opcode::ConCW(concs, Ret::Str));
                        concs = 1;
                    }
                    self.compile_block_str(&cur.text[start..esc - 1], true);
                    concs += 1;
                    if self.compile_block_sub(cur, prevargs + concs) {
                        concs += 1;
                    }
                    start = cur.pos;
                }
            }
        }

        let end = if closed { cur.pos - 1 } else { cur.pos };
        if end > start {
            if concs == 0 {
                match wordtype {
                    WordType::Pop => return,
                    WordType::Code | WordType::Cond => {
                        cur.pos = start;
                        self.compile_block_at(cur, Ret::Null, b']');
                        return;
                    }
                    WordType::Ident => {
                        self.compile_ident_named(&cur.text[start..end]);
                        return;
                    }
                    _ => {}
                }
            }
            let is_macro = concs > 0
                || matches!(
                    wordtype,
                    WordType::CStr
                        | WordType::Code
                        | WordType::Ident
                        | WordType::CAny
                        | WordType::Cond
                );
            self.compile_block_str(&cur.text[start..end], is_macro);
            if concs > 0 {
                concs += 1;
            }
        }

        if concs > 0 {
            if prevargs >= MAX_RESULTS {
                self.emit(Opcode::ConCM(concs, wordtype.ret_any()));
                self.emit(Opcode::Exit(wordtype.ret_any()));
            } else {
                self.emit(Opcode::ConCW(concs, wordtype.ret_any()));
            }
        }

        let empty = concs == 0 && end <= start;
        match wordtype {
            WordType::Pop => {
                if concs > 0 || end > start {
                    self.emit(Opcode::Pop);
                }
            }
            WordType::Cond => {
                if empty {
                    self.compile_null();
                } else {
                    self.emit(Opcode::Cond);
                }
            }
            WordType::Code => {
                if empty {
                    self.emit(Opcode::Empty(Ret::Null));
                } else {
                    self.emit(Opcode::Compile);
                }
            }
            WordType::Ident => {
                if empty {
                    let dummy = self.registry.dummy();
                    self.compile_ident(dummy);
                } else {
                    self.emit(Opcode::IdentU);
                }
            }
            WordType::CStr | WordType::CAny => {
                if empty {
                    self.compile_str("", true);
                }
            }
            WordType::Str | WordType::Any | WordType::Word => {
                if empty {
                    self.compile_empty_str();
                }
            }
            WordType::Int | WordType::Float => {
                if concs == 0 {
                    if end <= start {
                        self.compile_val(wordtype, "");
                    } else {
                        self.emit(Opcode::Force(wordtype.ret_any()));
                    }
                }
            }
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Compiles a `$name` lookup; the cursor is on the `$`.
    fn compile_lookup(&mut self, cur: &mut Cursor<'_>, ltype: WordType, prevargs: usize) {
        cur.bump();
        match cur.peek() {
            b'(' | b'[' => {
                if !self.compile_arg(cur, WordType::CStr, prevargs, None) {
                    self.lookup_invalid(ltype);
                    return;
                }
            }
            b'$' => {
                let inner = |this: &mut Self, cur: &mut Cursor<'_>| {
                    this.compile_lookup(cur, WordType::CStr, prevargs);
                };
                if !self.nested(cur, inner) {
                    self.lookup_invalid(ltype);
                    return;
                }
            }
            b'"' => {
                let name = cur.cut_string();
                self.lookup_named(&name, ltype, prevargs);
                return;
            }
            _ => {
                let name = cur.cut_word();
                if name.is_empty() {
                    self.lookup_invalid(ltype);
                } else {
                    self.lookup_named(name, ltype, prevargs);
                }
                return;
            }
        }
        self.emit(match ltype {
            WordType::CAny | WordType::Cond => Opcode::LookupMU(Ret::Null),
            WordType::CStr | WordType::Code | WordType::Ident => Opcode::LookupMU(Ret::Str),
            _ => Opcode::LookupU(ltype.ret_any()),
        });
        self.lookup_suffix(ltype);
    }

    fn lookup_invalid(&mut self, ltype: WordType) {
        match ltype {
            WordType::Pop => {}
            WordType::Any
            | WordType::CAny
            | WordType::Word
            | WordType::Cond => self.compile_null(),
            _ => self.compile_val(ltype, ""),
        }
    }

    /// Converts a looked-up value into what the argument slot wants.
    fn lookup_suffix(&mut self, ltype: WordType) {
        match ltype {
            WordType::Pop => {
                self.emit(Opcode::Pop);
            }
            WordType::Code => {
                self.emit(Opcode::Compile);
            }
            WordType::Cond => {
                self.emit(Opcode::Cond);
            }
            WordType::Ident => {
                self.emit(Opcode::IdentU);
            }
            _ => {}
        }
    }

    fn lookup_named(&mut self, name: &str, ltype: WordType, prevargs: usize) {
        let id = self.ident_or_dummy(name);
        match self.target(id) {
            Target::Int { .. } => {
                self.var_lookup(Opcode::IntVar(id, ltype.ret_int()), ltype);
                return;
            }
            Target::Float => {
                self.var_lookup(Opcode::FloatVar(id, ltype.ret_float()), ltype);
                return;
            }
            Target::Str => match ltype {
                WordType::Pop => return,
                WordType::CAny
                | WordType::CStr
                | WordType::Code
                | WordType::Ident
                | WordType::Cond => {
                    self.emit(Opcode::StrVarM(id));
                }
                _ => {
                    self.emit(Opcode::StrVar(id, ltype.ret_string()));
                }
            },
            Target::Alias => {
                let arg = id.is_arg();
                let op = match ltype {
                    WordType::Pop => return,
                    WordType::CAny | WordType::Cond if arg => Opcode::LookupMArg(id, Ret::Null),
                    WordType::CAny | WordType::Cond => Opcode::LookupM(id, Ret::Null),
                    WordType::CStr | WordType::Code | WordType::Ident if arg => {
                        Opcode::LookupMArg(id, Ret::Str)
                    }
                    WordType::CStr | WordType::Code | WordType::Ident => {
                        Opcode::LookupM(id, Ret::Str)
                    }
                    _ if arg => Opcode::LookupArg(id, ltype.ret_string()),
                    _ => Opcode::Lookup(id, ltype.ret_string()),
                };
                self.emit(op);
            }
            Target::Command(_, signature) => {
                self.lookup_command(id, &signature, ltype, prevargs);
            }
        }
        self.lookup_suffix(ltype);
    }

    /// Variables skip the condition suffix: a number is never code.
    fn var_lookup(&mut self, op: Opcode, ltype: WordType) {
        self.emit(op);
        match ltype {
            WordType::Pop => {
                self.code.pop();
            }
            WordType::Code => {
                self.emit(Opcode::Compile);
            }
            WordType::Ident => {
                self.emit(Opcode::IdentU);
            }
            _ => {}
        }
    }

    /// `$command` runs the command with default arguments and uses its result.
    fn lookup_command(
        &mut self,
        id: IdentId,
        signature: &Signature,
        ltype: WordType,
        prevargs: usize,
    ) {
        let ret = ltype.ret_any();
        let nested = prevargs >= MAX_RESULTS;
        if nested {
            self.emit(Opcode::Enter);
        }
        let finish = |c: &mut Self| {
            c.emit(if nested {
                Opcode::Exit(ret)
            } else {
                Opcode::ResultArg(ret)
            });
        };
        let mut release = false;
        let mut numargs = 0;
        for kind in signature.kinds() {
            match kind {
                ArgKind::Str => self.compile_empty_str(),
                ArgKind::CStr => self.compile_str("", true),
                ArgKind::Int => self.compile_int(0),
                ArgKind::OptionalInt => self.compile_int(i64::MIN),
                ArgKind::Float => self.compile_float(0.0),
                ArgKind::FloatOrPrevious => {
                    self.emit(Opcode::Dup(Ret::Float));
                }
                ArgKind::Any | ArgKind::CAny | ArgKind::Cond => self.compile_null(),
                ArgKind::Code => {
                    self.emit(Opcode::Empty(Ret::Null));
                }
                ArgKind::Ident => {
                    let dummy = self.registry.dummy();
                    self.compile_ident(dummy);
                }
                ArgKind::SelfIdent => self.compile_ident(id),
                ArgKind::Count => self.compile_int(-1),
                ArgKind::Release => {
                    release = true;
                    numargs += 1;
                    continue;
                }
                ArgKind::Concat => {
                    self.emit(Opcode::ComC { id, argc: numargs, ret });
                    finish(self);
                    return;
                }
                ArgKind::Variadic => {
                    self.emit(Opcode::ComV { id, argc: numargs, ret });
                    finish(self);
                    return;
                }
                ArgKind::Repeat(_) => continue,
            }
            numargs += 1;
        }
        self.emit(if release {
            Opcode::ComD(id, ret)
        } else {
            Opcode::Com(id, ret)
        });
        finish(self);
    }

    // =========================================================================
    // Arguments
    // =========================================================================

    /// Compiles one argument. Returns false at the end of the statement.
    ///
    /// For [`WordType::Word`], a plain or quoted word is returned through
    /// `word` instead of being compiled.
    fn compile_arg(
        &mut self,
        cur: &mut Cursor<'_>,
        wordtype: WordType,
        prevargs: usize,
        word: Option<&mut Option<String>>,
    ) -> bool {
        Self::skip_comments(cur);
        match cur.peek() {
            b'"' => {
                match wordtype {
                    WordType::Pop => {
                        cur.bump();
                        cur.pos += parse_string(cur.rest());
                        if cur.peek() == b'"' {
                            cur.bump();
                        }
                    }
                    WordType::Cond => {
                        let s = cur.cut_string();
                        if s.is_empty() {
                            self.compile_null();
                        } else {
                            self.compile_block_text(&s, Ret::Null);
                        }
                    }
                    WordType::Code => {
                        let s = cur.cut_string();
                        self.compile_block_text(&s, Ret::Null);
                    }
                    WordType::Word => {
                        let s = cur.cut_string();
                        if let Some(word) = word {
                            *word = Some(s);
                        }
                    }
                    WordType::Any | WordType::Str => {
                        let s = cur.cut_string();
                        self.emit_text(&s, false);
                    }
                    WordType::CAny | WordType::CStr => {
                        let s = cur.cut_string();
                        self.emit_text(&s, true);
                    }
                    _ => {
                        let s = cur.cut_string();
                        self.compile_val(wordtype, &s);
                    }
                }
                true
            }
            b'$' => {
                self.compile_lookup(cur, wordtype, prevargs);
                true
            }
            b'(' => {
                cur.bump();
                let inner = if wordtype > WordType::Any {
                    WordType::CAny
                } else {
                    WordType::Any
                };
                if prevargs >= MAX_RESULTS {
                    self.emit(Opcode::Enter);
                    self.compile_statements(cur, inner, b')', 0);
                    self.emit(Opcode::Exit(wordtype.ret_any()));
                } else {
                    let start = self.code.len();
                    self.compile_statements(cur, inner, b')', prevargs);
                    if self.code.len() > start {
                        self.emit(Opcode::ResultArg(wordtype.ret_any()));
                    } else {
                        self.compile_val(wordtype, "");
                        return true;
                    }
                }
                match wordtype {
                    WordType::Pop => {
                        self.emit(Opcode::Pop);
                    }
                    WordType::Cond => {
                        self.emit(Opcode::Cond);
                    }
                    WordType::Code => {
                        self.emit(Opcode::Compile);
                    }
                    WordType::Ident => {
                        self.emit(Opcode::IdentU);
                    }
                    _ => {}
                }
                true
            }
            b'[' => {
                cur.bump();
                let block = |this: &mut Self, cur: &mut Cursor<'_>| {
                    this.compile_block_main(cur, wordtype, prevargs);
                };
                if !self.nested(cur, block) {
                    if matches!(wordtype, WordType::Word) {
                        self.compile_empty_str();
                    } else {
                        self.compile_val(wordtype, "");
                    }
                }
                true
            }
            _ => match wordtype {
                WordType::Pop => {
                    let len = parse_word(cur.rest());
                    cur.pos += len;
                    len != 0
                }
                WordType::Cond | WordType::Code => {
                    let s = cur.cut_word();
                    if s.is_empty() {
                        return false;
                    }
                    self.compile_block_text(s, Ret::Null);
                    true
                }
                WordType::Word => {
                    let s = cur.cut_word();
                    if let Some(word) = word {
                        *word = Some(s.to_string());
                    }
                    !s.is_empty()
                }
                _ => {
                    let s = cur.cut_word();
                    if s.is_empty() {
                        return false;
                    }
                    self.compile_val(wordtype, s);
                    true
                }
            },
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Compiles statements until `brak` (or the end of text when `brak` is 0).
    fn compile_statements(
        &mut self,
        cur: &mut Cursor<'_>,
        rettype: WordType,
        brak: u8,
        prevargs: usize,
    ) {
        self.nested(cur, |this, cur| {
            this.compile_nested_statements(cur, rettype, brak, prevargs);
        });
    }

    fn compile_nested_statements(
        &mut self,
        cur: &mut Cursor<'_>,
        rettype: WordType,
        brak: u8,
        prevargs: usize,
    ) {
        let line = cur.pos;
        loop {
            Self::skip_comments(cur);
            let mut idname = None;
            let mut more = self.compile_arg(cur, WordType::Word, prevargs, Some(&mut idname));
            if more {
                Self::skip_comments(cur);
                if Self::at_assignment(cur) {
                    cur.bump();
                    more = self.compile_assignment(cur, idname.as_deref(), prevargs);
                } else {
                    more = self.compile_call(cur, idname, rettype, prevargs);
                }
            }

            loop {
                if more {
                    while self.compile_arg(cur, WordType::Pop, MAX_RESULTS, None) {}
                }
                cur.skip_until(b")];/\n");
                if cur.at_end() {
                    if brak != 0 && !self.too_deep {
                        self.report(cur, line, ErrorKind::MissingDelimiter(char::from(brak)));
                    }
                    return;
                }
                let c = cur.peek();
                cur.bump();
                match c {
                    b')' | b']' => {
                        if c == brak {
                            return;
                        }
                        self.report(cur, line, ErrorKind::UnexpectedDelimiter(char::from(c)));
                        break;
                    }
                    b'/' => {
                        if cur.peek() == b'/' {
                            cur.skip_until(b"\n");
                        }
                    }
                    _ => break,
                }
            }
        }
    }

    fn at_assignment(cur: &Cursor<'_>) -> bool {
        cur.peek() == b'='
            && match cur.at(1) {
                b'/' => cur.at(2) == b'/',
                b';' | b' ' | b'\t' | b'\r' | b'\n' | 0 => true,
                _ => false,
            }
    }

    /// Compiles `name = value`; the cursor is just past the `=`.
    fn compile_assignment(
        &mut self,
        cur: &mut Cursor<'_>,
        name: Option<&str>,
        prevargs: usize,
    ) -> bool {
        if let Some(name) = name {
            let id = self.ident_or_dummy(name);
            match self.target(id) {
                Target::Alias => {
                    let more = self.compile_arg(cur, WordType::Any, prevargs, None);
                    if !more {
                        self.compile_empty_str();
                    }
                    self.emit(if id.is_arg() {
                        Opcode::AliasArg(id)
                    } else {
                        Opcode::Alias(id)
                    });
                    return more;
                }
                Target::Int { .. } => {
                    let more = self.compile_arg(cur, WordType::Int, prevargs, None);
                    if !more {
                        self.compile_int(0);
                    }
                    self.emit(Opcode::IntVar1(id));
                    return more;
                }
                Target::Float => {
                    let more = self.compile_arg(cur, WordType::Float, prevargs, None);
                    if !more {
                        self.compile_float(0.0);
                    }
                    self.emit(Opcode::FloatVar1(id));
                    return more;
                }
                Target::Str => {
                    let more = self.compile_arg(cur, WordType::CStr, prevargs, None);
                    if !more {
                        self.compile_empty_str();
                    }
                    self.emit(Opcode::StrVar1(id));
                    return more;
                }
                Target::Command(..) => {}
            }
            self.compile_str(name, true);
        }
        let more = self.compile_arg(cur, WordType::Any, MAX_RESULTS, None);
        if !more {
            self.compile_empty_str();
        }
        self.emit(Opcode::AliasU);
        more
    }

    /// Compiles the rest of a statement whose first word was `idname`.
    fn compile_call(
        &mut self,
        cur: &mut Cursor<'_>,
        idname: Option<String>,
        rettype: WordType,
        prevargs: usize,
    ) -> bool {
        let Some(name) = idname else {
            return self.compile_unknown_call(cur, prevargs);
        };
        let Some(id) = self.registry.lookup(&name) else {
            if !check_number(&name) {
                self.compile_str(&name, true);
                return self.compile_unknown_call(cur, prevargs);
            }
            match rettype {
                WordType::Any | WordType::CAny => {
                    let (value, consumed) = parse_int_prefix(&name);
                    if consumed < name.len() {
                        self.compile_str(&name, rettype == WordType::CAny);
                    } else {
                        self.compile_int(value);
                    }
                }
                _ => self.compile_val(rettype, &name),
            }
            self.emit(Opcode::Result(Ret::Null));
            return true;
        };

        let ret = rettype.ret_any();
        match self.target(id) {
            Target::Alias => {
                let (numargs, more) = self.compile_rest(cur, WordType::Any, prevargs, 0);
                self.emit(if id.is_arg() {
                    Opcode::CallArg { id, argc: numargs }
                } else {
                    Opcode::Call { id, argc: numargs }
                });
                more
            }
            Target::Int { hex } => {
                if !self.compile_arg(cur, WordType::Int, prevargs, None) {
                    self.emit(Opcode::Print(id));
                    return false;
                }
                if !hex || !self.compile_arg(cur, WordType::Int, prevargs + 1, None) {
                    self.emit(Opcode::IntVar1(id));
                    return !hex;
                }
                if !self.compile_arg(cur, WordType::Int, prevargs + 2, None) {
                    self.emit(Opcode::IntVar2(id));
                    return false;
                }
                self.emit(Opcode::IntVar3(id));
                true
            }
            Target::Float => {
                let more = self.compile_arg(cur, WordType::Float, prevargs, None);
                self.emit(if more {
                    Opcode::FloatVar1(id)
                } else {
                    Opcode::Print(id)
                });
                more
            }
            Target::Str => {
                if !self.compile_arg(cur, WordType::CStr, prevargs, None) {
                    self.emit(Opcode::Print(id));
                    return false;
                }
                let (numargs, more) = self.compile_rest(cur, WordType::CAny, prevargs, 1);
                if numargs > 1 {
                    self.emit(Opcode::ConC(numargs, Ret::Str));
                }
                self.emit(Opcode::StrVar1(id));
                more
            }
            Target::Command(Form::Plain, signature) => {
                self.compile_command(cur, id, &signature, ret, prevargs)
            }
            Target::Command(Form::Local, _) => {
                let (numargs, more) = self.compile_rest(cur, WordType::Ident, prevargs, 0);
                if more {
                    while self.compile_arg(cur, WordType::Pop, MAX_RESULTS, None) {}
                }
                self.emit(Opcode::Local(numargs));
                false
            }
            Target::Command(form @ (Form::Do | Form::DoArgs), _) => {
                let more = self.compile_arg(cur, WordType::Code, prevargs, None);
                self.emit(match (more, form) {
                    (false, _) => Opcode::Null(ret),
                    (true, Form::DoArgs) => Opcode::DoArgs(ret),
                    (true, _) => Opcode::Do(ret),
                });
                more
            }
            Target::Command(Form::If, _) => self.compile_if(cur, id, ret, prevargs),
            Target::Command(Form::Result, _) => {
                let more = self.compile_arg(cur, WordType::Any, prevargs, None);
                self.emit(if more {
                    Opcode::Result(ret)
                } else {
                    Opcode::Null(ret)
                });
                more
            }
            Target::Command(Form::Not, _) => {
                let more = self.compile_arg(cur, WordType::CAny, prevargs, None);
                self.emit(if more {
                    Opcode::Not(ret)
                } else {
                    Opcode::True(ret)
                });
                more
            }
            Target::Command(form @ (Form::And | Form::Or), _) => {
                self.compile_and_or(cur, id, form == Form::And, ret, prevargs)
            }
        }
    }

    /// Compiles up to [`MAX_ARGS`] arguments, starting the count at
    /// `numargs`. Returns the final count and whether arguments remain.
    fn compile_rest(
        &mut self,
        cur: &mut Cursor<'_>,
        wordtype: WordType,
        prevargs: usize,
        mut numargs: usize,
    ) -> (usize, bool) {
        let mut more = true;
        while numargs < MAX_ARGS {
            more = self.compile_arg(cur, wordtype, prevargs + numargs, None);
            if !more {
                break;
            }
            numargs += 1;
        }
        (numargs, more)
    }

    /// A statement whose head is computed or names nothing: the head value is
    /// already on the stack and is resolved at run time.
    fn compile_unknown_call(&mut self, cur: &mut Cursor<'_>, prevargs: usize) -> bool {
        let (numargs, more) = self.compile_rest(cur, WordType::CAny, prevargs, 0);
        self.emit(Opcode::CallU(numargs));
        more
    }

    fn command_arg(
        &mut self,
        cur: &mut Cursor<'_>,
        args: &mut CallArgs,
        wordtype: WordType,
        prevargs: usize,
        default: fn(&mut Self),
    ) {
        if args.more {
            args.more = self.compile_arg(cur, wordtype, prevargs + args.numargs, None);
        }
        if !args.more {
            if args.rep {
                return;
            }
            default(self);
            args.fakeargs += 1;
        }
        args.numargs += 1;
    }

    fn compile_command(
        &mut self,
        cur: &mut Cursor<'_>,
        id: IdentId,
        signature: &Signature,
        ret: Ret,
        prevargs: usize,
    ) -> bool {
        let kinds = signature.kinds();
        let mut args = CallArgs {
            numargs: 0,
            fakeargs: 0,
            more: true,
            rep: false,
        };
        let mut release = false;
        let mut i = 0;
        while i < kinds.len() {
            match kinds[i] {
                kind @ (ArgKind::Str | ArgKind::CStr) => {
                    let cstr = kind == ArgKind::CStr;
                    let wordtype = if cstr { WordType::CStr } else { WordType::Str };
                    if args.more {
                        args.more =
                            self.compile_arg(cur, wordtype, prevargs + args.numargs, None);
                    }
                    if !args.more {
                        if args.rep {
                            i += 1;
                            continue;
                        }
                        self.compile_str("", cstr);
                        args.fakeargs += 1;
                    } else if i + 1 == kinds.len() {
                        let mut numconc = 1;
                        while args.numargs + numconc < MAX_ARGS {
                            args.more = self.compile_arg(
                                cur,
                                WordType::CStr,
                                prevargs + args.numargs + numconc,
                                None,
                            );
                            if !args.more {
                                break;
                            }
                            numconc += 1;
                        }
                        if numconc > 1 {
                            self.emit(Opcode::ConC(numconc, Ret::Str));
                        }
                    }
                    args.numargs += 1;
                }
                ArgKind::Int => {
                    self.command_arg(cur, &mut args, WordType::Int, prevargs, |c| c.compile_int(0));
                }
                ArgKind::OptionalInt => {
                    self.command_arg(cur, &mut args, WordType::Int, prevargs, |c| {
                        c.compile_int(i64::MIN);
                    });
                }
                ArgKind::Float => {
                    self.command_arg(cur, &mut args, WordType::Float, prevargs, |c| {
                        c.compile_float(0.0);
                    });
                }
                ArgKind::FloatOrPrevious => {
                    self.command_arg(cur, &mut args, WordType::Float, prevargs, |c| {
                        c.emit(Opcode::Dup(Ret::Float));
                    });
                }
                ArgKind::Any => {
                    self.command_arg(cur, &mut args, WordType::Any, prevargs, Self::compile_null);
                }
                ArgKind::CAny => {
                    self.command_arg(cur, &mut args, WordType::CAny, prevargs, Self::compile_null);
                }
                ArgKind::Cond => {
                    self.command_arg(cur, &mut args, WordType::Cond, prevargs, Self::compile_null);
                }
                ArgKind::Code => {
                    self.command_arg(cur, &mut args, WordType::Code, prevargs, |c| {
                        c.emit(Opcode::Empty(Ret::Null));
                    });
                }
                ArgKind::Ident => {
                    self.command_arg(cur, &mut args, WordType::Ident, prevargs, |c| {
                        let dummy = c.registry.dummy();
                        c.compile_ident(dummy);
                    });
                }
                ArgKind::SelfIdent => {
                    self.compile_ident(id);
                    args.numargs += 1;
                }
                ArgKind::Count => {
                    let given = args.numargs - args.fakeargs;
                    self.compile_int(i64::try_from(given).unwrap_or(0));
                    args.numargs += 1;
                }
                ArgKind::Release => {
                    release = true;
                    args.numargs += 1;
                }
                kind @ (ArgKind::Concat | ArgKind::Variadic) => {
                    if args.more {
                        let (numargs, more) =
                            self.compile_rest(cur, WordType::CAny, prevargs, args.numargs);
                        args.numargs = numargs;
                        args.more = more;
                    }
                    let argc = args.numargs;
                    self.emit(if kind == ArgKind::Concat {
                        Opcode::ComC { id, argc, ret }
                    } else {
                        Opcode::ComV { id, argc, ret }
                    });
                    return args.more;
                }
                ArgKind::Repeat(n) => {
                    if args.more && args.numargs < MAX_ARGS {
                        i -= n;
                        args.rep = true;
                        continue;
                    }
                    while args.numargs > MAX_ARGS {
                        self.emit(Opcode::Pop);
                        args.numargs -= 1;
                    }
                }
            }
            i += 1;
        }
        self.emit(if release {
            Opcode::ComD(id, ret)
        } else {
            Opcode::Com(id, ret)
        });
        args.more
    }

    /// `if cond [then] [else]`. Literal blocks are inlined behind jumps;
    /// anything else falls back to calling the `if` command.
    fn compile_if(&mut self, cur: &mut Cursor<'_>, id: IdentId, ret: Ret, prevargs: usize) -> bool {
        if !self.compile_arg(cur, WordType::CAny, prevargs, None) {
            self.emit(Opcode::Null(ret));
            return false;
        }
        let start1 = self.code.len();
        if !self.compile_arg(cur, WordType::Code, prevargs + 1, None) {
            self.emit(Opcode::Pop);
            self.emit(Opcode::Null(ret));
            return false;
        }
        let start2 = self.code.len();
        let more = self.compile_arg(cur, WordType::Code, prevargs + 2, None);
        let len1 = start2 - (start1 + 1);
        let block1 = self.code.block_len(start1) == Some(len1);
        if more {
            let len2 = self.code.len() - (start2 + 1);
            if self.code.block_len(start2) == Some(len2) {
                if block1 {
                    self.inline_block(start1, Opcode::JumpFalse(start2 - start1), len1, ret);
                    self.inline_block(start2, Opcode::Jump(len2), len2, ret);
                    return more;
                }
                if len1 == 0 && matches!(self.code.ops[start1], Opcode::Empty(_)) {
                    self.code.ops[start1] = Opcode::Null(Ret::Null);
                    self.inline_block(start2, Opcode::JumpTrue(len2), len2, ret);
                    return more;
                }
            }
        } else {
            if block1 {
                self.inline_block(start1, Opcode::JumpFalse(len1), len1, ret);
                return more;
            }
            self.emit(Opcode::Empty(Ret::Null));
        }
        self.emit(Opcode::Com(id, ret));
        more
    }

    /// Turns the literal block at `start` into `jump` followed by the block
    /// body run straight into the result.
    fn inline_block(&mut self, start: usize, jump: Opcode, len: usize, ret: Ret) {
        self.code.ops[start] = jump;
        self.code.ops[start + 1] = Opcode::EnterResult;
        self.code.retarget_exit(start + len, ret);
    }

    /// `&&` and `||`. When every argument is a literal block they become a
    /// chain of short-circuit jumps; otherwise the command is called with
    /// all conditions.
    fn compile_and_or(
        &mut self,
        cur: &mut Cursor<'_>,
        id: IdentId,
        and: bool,
        ret: Ret,
        prevargs: usize,
    ) -> bool {
        let mut more = self.compile_arg(cur, WordType::Cond, prevargs, None);
        if !more {
            self.emit(if and { Opcode::True(ret) } else { Opcode::False(ret) });
            return false;
        }
        let mut numargs = 1;
        let mut start = self.code.len();
        let mut end = start;
        while numargs < MAX_ARGS {
            more = self.compile_arg(cur, WordType::Cond, prevargs + numargs, None);
            if !more {
                break;
            }
            numargs += 1;
            if self.code.block_len(end) != Some(self.code.len() - (end + 1)) {
                break;
            }
            end = self.code.len();
        }
        if more {
            let (argc, more) = self.compile_rest(cur, WordType::Cond, prevargs, numargs);
            self.emit(Opcode::ComV { id, argc, ret });
            return more;
        }

        let jump = |len| {
            if and {
                Opcode::JumpResultFalse(len)
            } else {
                Opcode::JumpResultTrue(len)
            }
        };
        self.emit(jump(0));
        let end = self.code.len();
        while start + 1 < end {
            let Some(len) = self.code.block_len(start) else {
                break;
            };
            self.code.ops[start] = jump(end - (start + 1));
            self.code.ops[start + 1] = Opcode::Enter;
            self.code.retarget_exit(start + len, ret);
            start += len + 1;
        }
        more
    }
}
