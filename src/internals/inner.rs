/// Inner interpreter
///
/// Executes one word given its execution token (the heap index of its
/// code field), dispatching on the `Cell` found there. Calls to other
/// defined words recurse through `execute`/`run_thread` rather than
/// manually threading a program counter through a return stack — the
/// host language's own call stack already gives us that, so the
/// Forth-visible return stack (`Dictionary::return_stack`) stays free for
/// what Forth code itself needs it for: `>R`/`R>`/`R@` and the
/// loop-index bookkeeping `DO`/`LOOP`/`+LOOP` do in `internals/compiler.rs`.
use crate::errors::ForthError;
use crate::kernel::{Cell, Opcode};
use crate::runtime::ForthRuntime;

/// Executes the word whose code field lives at heap index `xt`.
pub fn execute(rt: &mut ForthRuntime, xt: usize) -> Result<(), ForthError> {
    match rt.dict.get(xt).clone() {
        Cell::Prim(idx) => call_builtin(rt, idx),
        Cell::Thread { start, .. } => run_thread(rt, start),
        Cell::Op(Opcode::Variable) => {
            rt.dict.push_data((xt + 1) as i64);
            Ok(())
        }
        Cell::Op(Opcode::Constant(v)) => {
            rt.dict.push_data(v);
            Ok(())
        }
        Cell::Op(Opcode::DoesBody(body_start)) => {
            rt.dict.push_data((xt + 1) as i64);
            run_thread(rt, body_start)
        }
        _ => Err(ForthError::BadOpcode(xt)),
    }
}

fn call_builtin(rt: &mut ForthRuntime, idx: usize) -> Result<(), ForthError> {
    let code = rt
        .dict
        .builtins
        .get(idx)
        .map(|b| b.code)
        .ok_or(ForthError::BadOpcode(idx))?;
    code(rt)
}

/// Steps through a compiled thread (a colon-definition body, or a
/// `DOES>`-installed body) cell by cell until `Exit` or `InstallDoes`
/// returns control to the caller.
fn run_thread(rt: &mut ForthRuntime, start: usize) -> Result<(), ForthError> {
    let mut pc = start;
    loop {
        let cell = rt.dict.get(pc).clone();
        match cell {
            Cell::Op(Opcode::Lit(n)) => {
                rt.dict.push_data(n);
                pc += 1;
            }
            Cell::Op(Opcode::PrintString(s)) => {
                print!("{}", s);
                pc += 1;
            }
            Cell::Op(Opcode::Prim(idx)) => {
                call_builtin(rt, idx)?;
                pc += 1;
            }
            Cell::Op(Opcode::Call(target)) => {
                execute(rt, target)?;
                pc += 1;
            }
            Cell::Op(Opcode::Branch(target)) => {
                pc = target;
            }
            Cell::Op(Opcode::ZBranch(target)) => {
                if rt.dict.pop_data()? == 0 {
                    pc = target;
                } else {
                    pc += 1;
                }
            }
            Cell::Op(Opcode::Exit) => return Ok(()),
            Cell::Op(Opcode::InstallDoes) => {
                let created = rt.runtime_created_header.ok_or(ForthError::BadOpcode(pc))?;
                let cfa = rt.dict.code_field(created);
                let body_start = pc + 1;
                rt.dict.heap[cfa] = Cell::Op(Opcode::DoesBody(body_start));
                return Ok(());
            }
            _ => return Err(ForthError::BadOpcode(pc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Cell;

    #[test]
    fn runs_a_literal_then_exits() {
        let mut rt = ForthRuntime::new();
        let start = rt.here();
        rt.compile_op(Opcode::Lit(7));
        rt.compile_op(Opcode::Exit);
        run_thread(&mut rt, start).unwrap();
        assert_eq!(rt.dict.data_stack, vec![7]);
    }

    #[test]
    fn branch_skips_the_intervening_literal() {
        let mut rt = ForthRuntime::new();
        let start = rt.here();
        let branch_at = rt.compile_op(Opcode::Branch(0));
        rt.compile_op(Opcode::Lit(999)); // skipped
        let target = rt.here();
        rt.compile_op(Opcode::Lit(1));
        rt.compile_op(Opcode::Exit);
        rt.patch_branch_target(branch_at, target);
        run_thread(&mut rt, start).unwrap();
        assert_eq!(rt.dict.data_stack, vec![1]);
    }

    #[test]
    fn zbranch_falls_through_when_top_is_nonzero() {
        let mut rt = ForthRuntime::new();
        let start = rt.here();
        rt.compile_op(Opcode::Lit(1)); // condition: true
        let zbranch_at = rt.compile_op(Opcode::ZBranch(0));
        rt.compile_op(Opcode::Lit(42));
        let after = rt.here();
        rt.compile_op(Opcode::Exit);
        rt.patch_branch_target(zbranch_at, after);
        run_thread(&mut rt, start).unwrap();
        assert_eq!(rt.dict.data_stack, vec![42]);
    }

    #[test]
    fn calling_an_undefined_cell_is_a_bad_opcode_error() {
        let mut rt = ForthRuntime::new();
        let at = rt.dict.push_cell(Cell::Int(5));
        assert!(matches!(execute(&mut rt, at), Err(ForthError::BadOpcode(_))));
    }
}
