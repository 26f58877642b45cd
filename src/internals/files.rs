//! File-backed input sources and the `LOAD` word.
//!
//! `FileHandle` is a thin wrapper over stdin or a buffered file reader
//! that yields one line at a time; `LOAD` is the core's one file-system
//! touching word, built on top of it exactly the way the REPL's own line
//! source is — both just feed lines to `ForthRuntime::interpret`.
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use crate::errors::ForthError;
use crate::runtime::ForthRuntime;

pub enum FType {
    Stdin,
    BReader(BufReader<File>),
}

pub struct FileHandle {
    source: FType,
}

impl FileHandle {
    pub fn stdin() -> FileHandle {
        FileHandle { source: FType::Stdin }
    }

    pub fn open(path: &str) -> io::Result<FileHandle> {
        let file = File::open(path)?;
        Ok(FileHandle {
            source: FType::BReader(BufReader::new(file)),
        })
    }

    /// Reads one line, trimming the trailing newline. `None` means EOF
    /// (or, for stdin, Ctrl-D/a read error) — there is no more input.
    pub fn get_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let result = match &mut self.source {
            FType::Stdin => {
                io::stdout().flush().ok();
                io::stdin().read_line(&mut line)
            }
            FType::BReader(br) => br.read_line(&mut line),
        };
        match result {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(_) => None,
        }
    }
}

/// Feeds `path` to `rt` one line at a time, per the `LOAD` protocol in
/// spec §6: a mid-file error prints `ERR in <file>:<lineno>: <message>`
/// and resets the runtime (unlinking any half-built word) but does not
/// propagate — the file simply stops loading. `EXIT` at file top level
/// stops the load cleanly, with no error message. A missing file and a
/// `BYE` (`ForthError::Halt`) both propagate instead: the former as
/// `ForthError::LoaderMissing`, the latter unchanged, so the session ends
/// rather than just this one file's reading.
pub fn load_file(rt: &mut ForthRuntime, path: &str) -> Result<(), ForthError> {
    let mut handle = FileHandle::open(path).map_err(|_| ForthError::LoaderMissing(path.to_string()))?;
    let mut lineno = 0usize;
    while let Some(line) = handle.get_line() {
        lineno += 1;
        match rt.interpret(&line) {
            Ok(()) => {}
            Err(ForthError::ExitFrame) => break,
            Err(ForthError::Halt) => return Err(ForthError::Halt),
            Err(e) => {
                println!("ERR in {}:{}: {}", path, lineno, e);
                rt.abort();
                break;
            }
        }
    }
    Ok(())
}

pub fn install(rt: &mut ForthRuntime) {
    rt.add_primitive("LOAD", false, "( n -- ) loads and interprets the file <n>.txt", |rt| {
        let n = rt.dict.pop_data()?;
        load_file(rt, &format!("{}.txt", n))
    });
}
