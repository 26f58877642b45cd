//! Typed errors for the interpreter core.
//!
//! Control flow inside the VM is expressed with `Result<T, ForthError>`
//! rather than panics, so a `_panic`-style recovery (unwind the return
//! stack, clear the data stack, drop back to the outer interpreter) can
//! actually happen instead of aborting the process.

#[derive(Debug, thiserror::Error)]
pub enum ForthError {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("Unknown word: {0}")]
    UnknownWord(String),

    #[error("{0} is compile-only")]
    CompileOnly(String),

    #[error("unmatched control structure word: {0}")]
    ControlMismatch(String),

    #[error("{0} requires a name")]
    NameMissing(String),

    #[error("name too long (max 63 characters): {0}")]
    NameTooLong(String),

    #[error("{0} out of range")]
    RangeError(String),

    #[error("corrupt opcode at cell {0}")]
    BadOpcode(usize),

    #[error("unable to load {0}")]
    LoaderMissing(String),

    #[error("bye")]
    Halt,

    #[error("exit")]
    ExitFrame,
}
