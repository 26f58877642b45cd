//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// `ForthRuntime` is the interpreter's embedding surface: it owns the
/// dictionary/heap/stacks (`Dictionary`, in `kernel.rs`), the compiler's
/// control-flow bookkeeping, and the handful of pieces of session state
/// (radix, compile-mode flag, the BYE request) that don't belong on the
/// heap itself. Everything a host program needs is one of `add_primitive`,
/// `compile_op`, `interpret`, or the token-pull helpers below.
///
use crate::errors::ForthError;
use crate::internals::messages::Msg;
use crate::kernel::{BuiltinCode, Cell, Dictionary, Opcode};
use crate::tokenizer::Tokenizer;

pub const TRUE: i64 = -1; // Forth convention for true/false
pub const FALSE: i64 = 0;

/// Compile-time bookkeeping for one open control structure. Pushed and
/// popped by the immediate words in `internals/compiler.rs` as `IF`,
/// `BEGIN`, `DO` and friends are compiled; `;` fails if any are still
/// open, matching the "control-stack empty" invariant.
#[derive(Debug)]
pub enum ControlMarker {
    /// `IF`: heap index of the `ZBranch` to patch at `ELSE`/`THEN`.
    If(usize),
    /// `ELSE`: heap index of the unconditional `Branch` to patch at `THEN`.
    Else(usize),
    /// `BEGIN`: heap index to branch back to.
    Begin(usize),
    /// `WHILE`: heap index of the `ZBranch` to patch once `REPEAT` knows
    /// where the loop exits to. The matching `BEGIN` stays on the control
    /// stack underneath until `REPEAT` removes it, so a single loop may
    /// carry more than one `WHILE` exit.
    While { zbranch_at: usize },
    /// `DO`: heap index of the loop body (where `LOOP`/`+LOOP` branch
    /// back to) plus every `LEAVE`'s forward branch, patched to the loop
    /// exit once `LOOP`/`+LOOP` is compiled.
    Do {
        body: usize,
        leave_fixups: Vec<usize>,
    },
}

pub struct ForthRuntime {
    pub dict: Dictionary,
    pub msg: Msg,
    pub compiling: bool,
    pub base: i64,
    pub control_stack: Vec<ControlMarker>,
    pub show_stack: bool,
    /// Set by `:`, cleared by `;`: the new word's code-field cell index
    /// and the heap index its compiled body starts at.
    pub pending_definition: Option<(usize, usize)>,
    /// Header address of the most recent `CREATE`d word, consulted by
    /// `InstallDoes` at runtime. One of the embedding surface's exposed
    /// mutable fields per spec §6.
    pub runtime_created_header: Option<usize>,
    input: Option<Tokenizer>,
}

impl ForthRuntime {
    pub fn new() -> ForthRuntime {
        ForthRuntime {
            dict: Dictionary::new(),
            msg: Msg::new(),
            compiling: false,
            base: 10,
            control_stack: Vec::new(),
            show_stack: false,
            pending_definition: None,
            runtime_created_header: None,
            input: None,
        }
    }

    /// Installs the builtin word set and the compiler's immediate words,
    /// then (unless `no_core` is set) compiles the Forth-source comfort
    /// words from `internals::corelib`. Mirrors the teacher's own
    /// `cold_start`: builtins first, then higher-level words defined in
    /// terms of them.
    pub fn cold_start(&mut self, no_core: bool) {
        crate::internals::builtin::install(self);
        crate::internals::compiler::install(self);
        crate::internals::files::install(self);
        self.compiling = false;
        self.base = 10;
        if !no_core {
            if let Err(e) = crate::internals::corelib::load(self) {
                self.msg.error("cold_start", "failed to compile core words", Some(e.to_string()));
            }
        }
    }

    pub fn here(&self) -> usize {
        self.dict.here()
    }

    pub fn get_compile_mode(&self) -> bool {
        self.compiling
    }

    pub fn set_compile_mode(&mut self, compiling: bool) {
        self.compiling = compiling;
    }

    /// Registers a new primitive word. This, `compile_op`, `interpret`,
    /// and the token-pull helpers are the embedding API external
    /// collaborators (the REPL, the file loader, hardware extensions)
    /// reach the core through.
    pub fn add_primitive(&mut self, name: &str, immediate: bool, doc: &'static str, code: BuiltinCode) -> usize {
        self.dict.add_builtin(name, immediate, doc, code)
    }

    /// Appends one compiled cell to the current definition, returning its
    /// heap index so the caller (typically a control-flow immediate word)
    /// can come back and patch a branch target into it later.
    pub fn compile_op(&mut self, op: Opcode) -> usize {
        self.dict.push_cell(Cell::Op(op))
    }

    pub fn patch_branch_target(&mut self, at: usize, target: usize) {
        match self.dict.heap.get_mut(at) {
            Some(Cell::Op(Opcode::Branch(t))) => *t = target,
            Some(Cell::Op(Opcode::ZBranch(t))) => *t = target,
            _ => self.msg.error("patch_branch_target", "cell is not a branch", Some(at)),
        }
    }

    pub fn next_token(&mut self) -> Option<String> {
        self.input.as_mut().and_then(|t| t.next_token())
    }

    pub fn parse_to(&mut self, delim: char) -> String {
        self.input.as_mut().map(|t| t.parse_to(delim)).unwrap_or_default()
    }

    pub fn rest_of_line(&mut self) -> String {
        self.input.as_mut().map(|t| t.rest_of_line()).unwrap_or_default()
    }

    pub fn input_exhausted(&self) -> bool {
        self.input.as_ref().map(|t| t.at_end()).unwrap_or(true)
    }

    /// Runs one token through the outer interpreter: execute it now, or
    /// compile a call to it, or (if it isn't a dictionary word) try to
    /// parse it as a number in the current radix.
    fn interpret_token(&mut self, token: &str) -> Result<(), ForthError> {
        if let Some((xt, immediate)) = self.dict.find(token) {
            if self.compiling && !immediate {
                self.compile_op(Opcode::Call(xt));
                Ok(())
            } else {
                self.execute(xt)
            }
        } else if let Some(n) = parse_number(token, self.base) {
            if self.compiling {
                self.compile_op(Opcode::Lit(n));
            } else {
                self.dict.push_data(n);
            }
            Ok(())
        } else {
            Err(ForthError::UnknownWord(token.to_string()))
        }
    }

    /// The outer interpreter: tokenizes `line` and interprets/compiles
    /// each token in turn. A fresh `Tokenizer` is built for the call so
    /// there is no cross-call cursor state, per the reentrancy note in
    /// the design notes. `ForthError::ExitFrame` (a typed `EXIT` run
    /// outside any definition) and `ForthError::Halt` (`BYE`) both stop
    /// the rest of the line and propagate to the caller rather than being
    /// swallowed here — the REPL boundary treats `ExitFrame` as "done with
    /// this line" and `Halt` as "end the session", while `LOAD` treats
    /// `ExitFrame` as "stop reading this file"; only those callers know
    /// which applies, and neither runs `_panic`/`abort` the way every
    /// other error does.
    pub fn interpret(&mut self, line: &str) -> Result<(), ForthError> {
        self.input = Some(Tokenizer::new(line));
        let result = loop {
            let token = match self.next_token() {
                Some(t) => t,
                None => break Ok(()),
            };
            match self.interpret_token(&token) {
                Ok(()) => {}
                Err(e) => break Err(e),
            }
        };
        self.input = None;
        result
    }

    /// Executes the word whose code field is at `xt`, dispatching on the
    /// cell found there (see `internals::inner`).
    pub fn execute(&mut self, xt: usize) -> Result<(), ForthError> {
        crate::internals::inner::execute(self, xt)
    }

    /// Resets both stacks and any open control structures — the `_panic`
    /// recovery spec §7 describes: unwind, don't abort the process. If a
    /// definition was mid-compile, its half-built header is unlinked
    /// (not freed): `latest` rewinds to the word before it, leaving the
    /// reserved heap cells allocated but unreachable by name.
    pub fn abort(&mut self) {
        if self.compiling {
            self.dict.latest = match self.dict.get(self.dict.latest) {
                Cell::Int(link) => *link as usize,
                _ => 0,
            };
        }
        self.dict.reset_stacks();
        self.control_stack.clear();
        self.compiling = false;
        self.pending_definition = None;
        self.runtime_created_header = None;
    }
}

impl Default for ForthRuntime {
    fn default() -> ForthRuntime {
        ForthRuntime::new()
    }
}

/// Parses a token as a signed integer in the given radix. A leading `-`
/// is recognized in any base; anything that doesn't fully parse is not a
/// number (and so is reported as an unknown word upstream).
pub fn parse_number(token: &str, base: i64) -> Option<i64> {
    if token.is_empty() {
        return None;
    }
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, token),
    };
    i64::from_str_radix(digits, base as u32)
        .ok()
        .map(|v| if negative { -v } else { v })
}
