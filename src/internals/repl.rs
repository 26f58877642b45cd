//! REPL surface and cold-boot loader, per spec §6.
//!
//! A line is read, stripped, and handed to `ForthRuntime::interpret`; the
//! prompt is literally `ok> ` (space included). This is the only piece of
//! the crate allowed to talk to stdin/stdout directly as a line source —
//! everything else reaches the core through `interpret`/`add_primitive`.
use std::path::Path;

use crate::errors::ForthError;
use crate::internals::files::{self, FileHandle};
use crate::runtime::ForthRuntime;

pub const PROMPT: &str = "ok> ";

/// If `0.txt` exists in the working directory, silently `LOAD`s it.
/// Any error (including a missing file raised after the existence check
/// races) is swallowed — this is a convenience boot step, not a load a
/// user asked for.
pub fn auto_boot(rt: &mut ForthRuntime) {
    if Path::new("0.txt").exists() {
        let _ = files::load_file(rt, "0.txt");
    }
}

/// Runs the interactive read-eval-print loop until `BYE` or EOF (Ctrl-D).
/// Per spec §6: an empty line re-prompts without interpreting anything; a
/// line that is literally `BYE` (any case) ends the session without going
/// through `interpret` at all — the common case, short-circuited here as
/// the spec's REPL surface describes. `BYE` reached any other way (inside
/// a colon definition, or via a loaded file) instead surfaces as
/// `ForthError::Halt` out of `interpret`, caught below without the
/// `ERR:`/`_panic` treatment every other error gets. Anything else is
/// handed to `interpret`, with `ERR: <message>` printed and the runtime
/// reset on failure.
pub fn run(rt: &mut ForthRuntime) {
    let mut input = FileHandle::stdin();
    loop {
        print!("{}", PROMPT);
        use std::io::Write;
        std::io::stdout().flush().ok();

        let line = match input.get_line() {
            Some(l) => l,
            None => break, // EOF / Ctrl-D
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("BYE") {
            break;
        }

        match rt.interpret(line) {
            Ok(()) => {}
            Err(ForthError::ExitFrame) => {}
            Err(ForthError::Halt) => break,
            Err(e) => {
                println!("ERR: {}", e);
                rt.abort();
            }
        }
    }
}
