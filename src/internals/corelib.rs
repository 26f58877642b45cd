//! Forth-source "comfort words" compiled once at `cold_start`.
//!
//! Everything here could be a Rust primitive, but the original
//! `_install_highlevel` writes them in Forth itself once the kernel words
//! exist, and that split is worth keeping: it is both shorter and doubles
//! as a smoke test that `:`, `IF/THEN`, and the return-stack words work
//! before the REPL ever sees a prompt.
use crate::errors::ForthError;
use crate::runtime::ForthRuntime;

const CORE_WORDS: &[&str] = &[
    ": 1+ 1 + ;",
    ": 1- 1 - ;",
    ": 2* DUP + ;",
    ": 2/ 2 / ;",
    ": NEGATE 0 SWAP - ;",
    ": 2DUP OVER OVER ;",
    ": 2DROP DROP DROP ;",
    ": ROT >R SWAP R> SWAP ;",
    ": -ROT SWAP >R SWAP R> ;",
    ": NIP SWAP DROP ;",
    ": TUCK SWAP OVER ;",
    ": SPACE 32 EMIT ;",
    ": .CR . CR ;",
    ": ? @ . ;",
    ": TRUE -1 ;",
    ": FALSE 0 ;",
    ": NOT 0 = ;",
    ": ABS DUP 0 < IF NEGATE THEN ;",
    ": MIN 2DUP > IF SWAP THEN DROP ;",
    ": MAX 2DUP < IF SWAP THEN DROP ;",
];

/// Compiles every comfort word above into the dictionary, in order (later
/// words may depend on earlier ones, e.g. `MIN`/`MAX` on `2DUP`). Bails
/// out on the first failure so a typo here is loud rather than silently
/// missing a word.
pub fn load(rt: &mut ForthRuntime) -> Result<(), ForthError> {
    for line in CORE_WORDS {
        rt.interpret(line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt_with_core() -> ForthRuntime {
        let mut rt = ForthRuntime::new();
        crate::internals::builtin::install(&mut rt);
        crate::internals::compiler::install(&mut rt);
        load(&mut rt).unwrap();
        rt
    }

    #[test]
    fn negate_and_abs() {
        let mut rt = rt_with_core();
        rt.interpret("-7 ABS").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 7);
        rt.interpret("7 NEGATE").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), -7);
    }

    #[test]
    fn rot_and_minus_rot_are_inverses() {
        let mut rt = rt_with_core();
        rt.interpret("1 2 3 ROT").unwrap();
        assert_eq!(rt.dict.data_stack, vec![2, 3, 1]);
        rt.dict.data_stack.clear();
        rt.interpret("1 2 3 -ROT").unwrap();
        assert_eq!(rt.dict.data_stack, vec![3, 1, 2]);
    }

    #[test]
    fn min_and_max() {
        let mut rt = rt_with_core();
        rt.interpret("3 7 MIN").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 3);
        rt.interpret("3 7 MAX").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 7);
    }

    #[test]
    fn not_is_forth_boolean_not_bitwise() {
        let mut rt = rt_with_core();
        rt.interpret("0 NOT").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), crate::runtime::TRUE);
        rt.interpret("5 NOT").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), crate::runtime::FALSE);
    }

    #[test]
    fn stack_doublers_and_droppers() {
        let mut rt = rt_with_core();
        rt.interpret("1 2 2DUP").unwrap();
        assert_eq!(rt.dict.data_stack, vec![1, 2, 1, 2]);
        rt.interpret("2DROP 2DROP").unwrap();
        assert!(rt.dict.data_stack.is_empty());
    }
}
