/// Compiler: defining words and control-flow immediates.
///
/// `:`/`;`, `CREATE`/`DOES>`, and every control structure are ordinary
/// builtins marked `IMMEDIATE`: they run the moment the outer interpreter
/// sees them (even while compiling) and do their work by pushing/popping
/// `ControlMarker`s and emitting/patching opcodes through
/// `ForthRuntime::compile_op`/`patch_branch_target`. There is no separate
/// compiler state machine; the outer interpreter in `runtime.rs` already
/// knows to run an `IMMEDIATE` word instead of compiling a call to it.
use crate::errors::ForthError;
use crate::kernel::{Cell, Opcode};
use crate::runtime::{ControlMarker, ForthRuntime};

/// Control-flow immediates only make sense while compiling a definition;
/// run at the interpret prompt they'd manipulate a nonexistent compile
/// buffer, so they refuse instead (spec §7's `CompileOnly`).
fn require_compiling(rt: &ForthRuntime, name: &str) -> Result<(), ForthError> {
    if rt.compiling {
        Ok(())
    } else {
        Err(ForthError::CompileOnly(name.to_string()))
    }
}

/// A header's `flags|namelen` cell packs the name length into 6 bits, so
/// `allocate_header` can only ever store 0..=63 characters; every definer
/// checks this before reserving a header so a too-long name fails
/// compilation cleanly instead of silently truncating or corrupting the
/// packed length.
const MAX_NAME_LEN: usize = 63;

fn check_name_len(name: &str) -> Result<(), ForthError> {
    if name.chars().count() > MAX_NAME_LEN {
        Err(ForthError::NameTooLong(name.to_string()))
    } else {
        Ok(())
    }
}

pub fn install(rt: &mut ForthRuntime) {
    rt.add_primitive(":", false, "( \"name\" -- ) begins a new definition", |rt| {
        let name = rt.next_token().ok_or_else(|| ForthError::NameMissing(":".to_string()))?;
        check_name_len(&name)?;
        let cfa = rt.dict.allocate_header(&name, false);
        rt.dict.push_cell(Cell::Thread { start: 0, count: 0 });
        let body_start = rt.here();
        rt.pending_definition = Some((cfa, body_start));
        rt.compiling = true;
        Ok(())
    });

    rt.add_primitive(";", true, "( -- ) ends the current definition", |rt| {
        if !rt.control_stack.is_empty() {
            return Err(ForthError::ControlMismatch(";".to_string()));
        }
        rt.compile_op(Opcode::Exit);
        let (cfa, body_start) = rt
            .pending_definition
            .take()
            .ok_or_else(|| ForthError::NameMissing(";".to_string()))?;
        let count = rt.here() - body_start;
        rt.dict.heap[cfa] = Cell::Thread { start: body_start, count };
        rt.compiling = false;
        Ok(())
    });

    rt.add_primitive("IMMEDIATE", false, "( -- ) marks the most recent word IMMEDIATE", |rt| {
        let latest = rt.dict.latest;
        if let Some(Cell::Int(packed)) = rt.dict.heap.get(latest + 1).cloned() {
            rt.dict.heap[latest + 1] = Cell::Int(packed | (1 << 32));
        }
        Ok(())
    });

    // --- CREATE / DOES> ---------------------------------------------

    rt.add_primitive("CREATE", false, "( \"name\" -- ) defines a word that pushes its own parameter field address", |rt| {
        let name = rt.next_token().ok_or_else(|| ForthError::NameMissing("CREATE".to_string()))?;
        check_name_len(&name)?;
        rt.dict.allocate_header(&name, false);
        rt.dict.push_cell(Cell::Op(Opcode::Variable));
        rt.runtime_created_header = Some(rt.dict.latest);
        Ok(())
    });

    rt.add_primitive(
        "DOES>",
        true,
        "( -- ) installs the rest of the current definition as the DOES> body of the most recently CREATEd word",
        |rt| {
            require_compiling(rt, "DOES>")?;
            rt.compile_op(Opcode::InstallDoes);
            Ok(())
        },
    );

    rt.add_primitive("CONSTANT", false, "( n \"name\" -- ) defines a word that pushes n", |rt| {
        let n = rt.dict.pop_data()?;
        let name = rt.next_token().ok_or_else(|| ForthError::NameMissing("CONSTANT".to_string()))?;
        check_name_len(&name)?;
        rt.dict.allocate_header(&name, false);
        rt.dict.push_cell(Cell::Op(Opcode::Constant(n)));
        Ok(())
    });

    rt.add_primitive("VARIABLE", false, "( \"name\" -- ) defines a word with one cell of storage, initially 0", |rt| {
        let name = rt.next_token().ok_or_else(|| ForthError::NameMissing("VARIABLE".to_string()))?;
        check_name_len(&name)?;
        rt.dict.allocate_header(&name, false);
        rt.dict.push_cell(Cell::Op(Opcode::Variable));
        rt.dict.push_cell(Cell::Int(0));
        Ok(())
    });

    // --- string/comment words ----------------------------------------

    rt.add_primitive(".\"", true, "( -- ) compiles or prints a string literal, followed by one space, up to the closing quote", |rt| {
        let text = rt.parse_to('"') + " ";
        if rt.compiling {
            rt.compile_op(Opcode::PrintString(text));
        } else {
            print!("{}", text);
        }
        Ok(())
    });

    rt.add_primitive("(", true, "( -- ) a comment, up to the closing paren", |rt| {
        rt.parse_to(')');
        Ok(())
    });

    rt.add_primitive("\\", true, "( -- ) a comment to the end of the line", |rt| {
        rt.rest_of_line();
        Ok(())
    });

    // --- IF / ELSE / THEN ---------------------------------------------

    rt.add_primitive("IF", true, "( flag -- ) compile-time: opens a conditional", |rt| {
        require_compiling(rt, "IF")?;
        let at = rt.compile_op(Opcode::ZBranch(0));
        rt.control_stack.push(ControlMarker::If(at));
        Ok(())
    });

    rt.add_primitive("ELSE", true, "( -- ) compile-time: the alternate branch of IF", |rt| {
        require_compiling(rt, "ELSE")?;
        let if_at = match rt.control_stack.pop() {
            Some(ControlMarker::If(at)) => at,
            _ => return Err(ForthError::ControlMismatch("ELSE".to_string())),
        };
        let branch_at = rt.compile_op(Opcode::Branch(0));
        rt.patch_branch_target(if_at, rt.here());
        rt.control_stack.push(ControlMarker::Else(branch_at));
        Ok(())
    });

    rt.add_primitive("THEN", true, "( -- ) compile-time: closes IF/ELSE", |rt| {
        require_compiling(rt, "THEN")?;
        match rt.control_stack.pop() {
            Some(ControlMarker::If(at)) | Some(ControlMarker::Else(at)) => {
                rt.patch_branch_target(at, rt.here());
                Ok(())
            }
            _ => Err(ForthError::ControlMismatch("THEN".to_string())),
        }
    });

    // --- BEGIN / AGAIN / UNTIL / WHILE / REPEAT -----------------------

    rt.add_primitive("BEGIN", true, "( -- ) compile-time: marks a loop head", |rt| {
        require_compiling(rt, "BEGIN")?;
        rt.control_stack.push(ControlMarker::Begin(rt.here()));
        Ok(())
    });

    rt.add_primitive("AGAIN", true, "( -- ) compile-time: unconditional jump back to BEGIN", |rt| {
        require_compiling(rt, "AGAIN")?;
        match rt.control_stack.pop() {
            Some(ControlMarker::Begin(at)) => {
                rt.compile_op(Opcode::Branch(at));
                Ok(())
            }
            _ => Err(ForthError::ControlMismatch("AGAIN".to_string())),
        }
    });

    rt.add_primitive("UNTIL", true, "( flag -- ) compile-time: jump back to BEGIN while false", |rt| {
        require_compiling(rt, "UNTIL")?;
        match rt.control_stack.pop() {
            Some(ControlMarker::Begin(at)) => {
                rt.compile_op(Opcode::ZBranch(at));
                Ok(())
            }
            _ => Err(ForthError::ControlMismatch("UNTIL".to_string())),
        }
    });

    rt.add_primitive("WHILE", true, "( flag -- ) compile-time: conditional exit inside BEGIN...REPEAT", |rt| {
        require_compiling(rt, "WHILE")?;
        // The matching BEGIN is found by scanning, not popping: a single
        // BEGIN...REPEAT may carry more than one WHILE exit, and each one
        // needs to leave the others' frames (and the BEGIN itself) intact.
        let has_begin = rt
            .control_stack
            .iter()
            .rev()
            .any(|m| matches!(m, ControlMarker::Begin(_)));
        if !has_begin {
            return Err(ForthError::ControlMismatch("WHILE".to_string()));
        }
        let zbranch_at = rt.compile_op(Opcode::ZBranch(0));
        rt.control_stack.push(ControlMarker::While { zbranch_at });
        Ok(())
    });

    rt.add_primitive("REPEAT", true, "( -- ) compile-time: closes BEGIN...WHILE...REPEAT", |rt| {
        require_compiling(rt, "REPEAT")?;
        // Pop every WHILE exit stacked on top of the matching BEGIN, then
        // the BEGIN itself, patching each ZBRANCH to land just past the
        // BRANCH emitted below.
        let mut zbranches = Vec::new();
        let begin = loop {
            match rt.control_stack.pop() {
                Some(ControlMarker::While { zbranch_at }) => zbranches.push(zbranch_at),
                Some(ControlMarker::Begin(at)) => break at,
                _ => return Err(ForthError::ControlMismatch("REPEAT".to_string())),
            }
        };
        rt.compile_op(Opcode::Branch(begin));
        let exit_at = rt.here();
        for at in zbranches {
            rt.patch_branch_target(at, exit_at);
        }
        Ok(())
    });

    // --- DO / LOOP / +LOOP / LEAVE / I / J -----------------------------

    rt.add_primitive("DO", true, "( limit start -- ) compile-time: opens a counted loop", |rt| {
        require_compiling(rt, "DO")?;
        rt.compile_op(Opcode::Prim(loop_enter_idx(rt)));
        rt.control_stack.push(ControlMarker::Do {
            body: rt.here(),
            leave_fixups: Vec::new(),
        });
        Ok(())
    });

    rt.add_primitive("LOOP", true, "( -- ) compile-time: closes DO, stepping the index by 1", |rt| {
        require_compiling(rt, "LOOP")?;
        close_do_loop(rt, loop_step_const_idx(rt))
    });

    rt.add_primitive("+LOOP", true, "( n -- ) compile-time: closes DO, stepping the index by n", |rt| {
        require_compiling(rt, "+LOOP")?;
        close_do_loop(rt, loop_step_var_idx(rt))
    });

    rt.add_primitive("LEAVE", true, "( -- ) compile-time: exits the innermost DO loop early", |rt| {
        require_compiling(rt, "LEAVE")?;
        rt.compile_op(Opcode::Prim(loop_leave_idx(rt)));
        let branch_at = rt.compile_op(Opcode::Branch(0));
        // LEAVE is almost always written as `IF LEAVE THEN`, so the nearest
        // enclosing Do frame may have an open If/Else/While above it on the
        // control stack; scan down to it instead of assuming it's on top.
        match rt
            .control_stack
            .iter_mut()
            .rev()
            .find_map(|m| match m {
                ControlMarker::Do { leave_fixups, .. } => Some(leave_fixups),
                _ => None,
            }) {
            Some(leave_fixups) => {
                leave_fixups.push(branch_at);
                Ok(())
            }
            None => Err(ForthError::ControlMismatch("LEAVE".to_string())),
        }
    });

    rt.add_primitive("I", false, "( -- n ) the innermost loop's current index", |rt| {
        let i = *rt.dict.return_stack.last().ok_or(ForthError::StackUnderflow)?;
        rt.dict.push_data(i);
        Ok(())
    });

    rt.add_primitive("J", false, "( -- n ) the next-outer loop's current index", |rt| {
        let len = rt.dict.return_stack.len();
        let j = *rt
            .dict
            .return_stack
            .get(len.wrapping_sub(3))
            .ok_or(ForthError::StackUnderflow)?;
        rt.dict.push_data(j);
        Ok(())
    });

    install_loop_helpers(rt);
}

fn close_do_loop(rt: &mut ForthRuntime, step_idx: usize) -> Result<(), ForthError> {
    match rt.control_stack.pop() {
        Some(ControlMarker::Do { body, leave_fixups }) => {
            rt.compile_op(Opcode::Prim(step_idx));
            rt.compile_op(Opcode::ZBranch(body));
            let exit_at = rt.here();
            for at in leave_fixups {
                rt.patch_branch_target(at, exit_at);
            }
            Ok(())
        }
        _ => Err(ForthError::ControlMismatch("LOOP".to_string())),
    }
}

/// Registers the hidden runtime helpers `LOOP`/`+LOOP`/`DO`/`LEAVE` compile
/// calls to, and remembers their builtin-table indices so the compile-time
/// words above can reference them without a name lookup. These do the
/// return-stack bookkeeping: `(do)` pushes `limit`/`index`, `(loop)`/
/// `(+loop)` step the index and report whether to branch back, `(leave)`
/// drops the current loop frame before an early exit.
fn install_loop_helpers(rt: &mut ForthRuntime) {
    rt.add_primitive("(do)", false, "( limit start -- ) (R: -- limit index )", |rt| {
        let start = rt.dict.pop_data()?;
        let limit = rt.dict.pop_data()?;
        rt.dict.push_return(limit);
        rt.dict.push_return(start);
        Ok(())
    });
    rt.add_primitive("(loop)", false, "( -- flag ) (R: limit index -- limit index | )", |rt| {
        let index = rt.dict.pop_return()?;
        let limit = rt.dict.pop_return()?;
        let next = index + 1;
        if next < limit {
            rt.dict.push_return(limit);
            rt.dict.push_return(next);
            rt.dict.push_data(0); // continue: ZBranch(0) jumps back to the loop body
        } else {
            rt.dict.push_data(1); // done: fall through past the loop
        }
        Ok(())
    });
    rt.add_primitive("(+loop)", false, "( n -- flag ) (R: limit index -- limit index | )", |rt| {
        let increment = rt.dict.pop_data()?;
        let index = rt.dict.pop_return()?;
        let limit = rt.dict.pop_return()?;
        let next = index + increment;
        let done = if increment >= 0 { next >= limit } else { next <= limit };
        if !done {
            rt.dict.push_return(limit);
            rt.dict.push_return(next);
            rt.dict.push_data(0);
        } else {
            rt.dict.push_data(1);
        }
        Ok(())
    });
    rt.add_primitive("(leave)", false, "( -- ) (R: limit index -- ) drops the current loop frame", |rt| {
        rt.dict.pop_return()?;
        rt.dict.pop_return()?;
        Ok(())
    });
}

fn builtin_index(rt: &ForthRuntime, name: &str) -> usize {
    rt.dict
        .builtins
        .iter()
        .position(|b| b.name == name)
        .unwrap_or_else(|| panic!("internal loop helper {} missing", name))
}

fn loop_enter_idx(rt: &ForthRuntime) -> usize {
    builtin_index(rt, "(do)")
}
fn loop_step_const_idx(rt: &ForthRuntime) -> usize {
    builtin_index(rt, "(loop)")
}
fn loop_step_var_idx(rt: &ForthRuntime) -> usize {
    builtin_index(rt, "(+loop)")
}
fn loop_leave_idx(rt: &ForthRuntime) -> usize {
    builtin_index(rt, "(leave)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt_with_core() -> ForthRuntime {
        let mut rt = ForthRuntime::new();
        crate::internals::builtin::install(&mut rt);
        install(&mut rt);
        rt
    }

    #[test]
    fn colon_definition_runs_its_body() {
        let mut rt = rt_with_core();
        rt.interpret(": SQUARE DUP * ;").unwrap();
        rt.interpret("5 SQUARE").unwrap();
        assert_eq!(rt.dict.data_stack, vec![25]);
    }

    #[test]
    fn if_then_without_else() {
        let mut rt = rt_with_core();
        rt.interpret(": CHECK 0 > IF 111 THEN ;").unwrap();
        rt.interpret("5 CHECK").unwrap();
        assert_eq!(rt.dict.data_stack, vec![111]);
        rt.dict.data_stack.clear();
        rt.interpret("-5 CHECK").unwrap();
        assert!(rt.dict.data_stack.is_empty());
    }

    #[test]
    fn if_else_then() {
        let mut rt = rt_with_core();
        rt.interpret(": SIGN DUP 0 < IF DROP -1 ELSE DROP 1 THEN ;").unwrap();
        rt.interpret("-9 SIGN").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), -1);
        rt.interpret("9 SIGN").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 1);
    }

    #[test]
    fn begin_until_counts_down() {
        let mut rt = rt_with_core();
        rt.interpret(": COUNTDOWN BEGIN DUP 1 - DUP 0 = UNTIL ;").unwrap();
        rt.interpret("3 COUNTDOWN").unwrap();
        assert_eq!(rt.dict.data_stack, vec![3, 2, 1, 0]);
    }

    #[test]
    fn begin_while_repeat_counts_up() {
        let mut rt = rt_with_core();
        rt.interpret(": UPTO5 0 BEGIN DUP 5 < WHILE DUP 1 + REPEAT ;").unwrap();
        rt.interpret("UPTO5").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn two_whiles_in_one_loop_both_exit_to_repeat() {
        let mut rt = rt_with_core();
        rt.interpret(": BOTH BEGIN DUP 10 < WHILE DUP 3 = IF 1 ELSE 0 THEN 0 = WHILE DUP 1 + REPEAT ;")
            .unwrap();
        rt.interpret("0 BOTH").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0, 1, 2, 3]);
    }

    #[test]
    fn do_loop_sums_the_index() {
        let mut rt = rt_with_core();
        rt.interpret(": SUM5 0 5 0 DO I + LOOP ;").unwrap();
        rt.interpret("SUM5").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0 + 1 + 2 + 3 + 4]);
    }

    #[test]
    fn plus_loop_steps_by_two() {
        let mut rt = rt_with_core();
        rt.interpret(": EVENS 10 0 DO I 2 +LOOP ;").unwrap();
        rt.interpret("EVENS").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn leave_exits_the_loop_early() {
        let mut rt = rt_with_core();
        rt.interpret(": FIRSTTHREE 10 0 DO I DUP 3 = IF LEAVE THEN LOOP ;").unwrap();
        rt.interpret("FIRSTTHREE").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0, 1, 2, 3]);
    }

    #[test]
    fn nested_loops_expose_i_and_j() {
        let mut rt = rt_with_core();
        rt.interpret(": PAIRS 2 0 DO 2 0 DO J I LOOP LOOP ;").unwrap();
        rt.interpret("PAIRS").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0, 0, 0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn create_does_installs_a_runtime_body() {
        let mut rt = rt_with_core();
        rt.interpret(": DOUBLER CREATE , DOES> @ 2 * ;").unwrap();
        rt.interpret("21 DOUBLER ANSWER").unwrap();
        rt.interpret("ANSWER").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 42);
    }

    #[test]
    fn constant_pushes_its_value() {
        let mut rt = rt_with_core();
        rt.interpret("99 CONSTANT LIFE").unwrap();
        rt.interpret("LIFE").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 99);
    }

    #[test]
    fn variable_stores_and_fetches() {
        let mut rt = rt_with_core();
        rt.interpret("VARIABLE V").unwrap();
        rt.interpret("5 V !").unwrap();
        rt.interpret("V @").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), 5);
    }

    #[test]
    fn unmatched_then_is_a_control_mismatch() {
        let mut rt = rt_with_core();
        let err = rt.interpret(": BAD THEN ;").unwrap_err();
        assert!(matches!(err, ForthError::ControlMismatch(w) if w == "THEN"));
    }

    #[test]
    fn dot_quote_compiles_a_string_literal() {
        let mut rt = rt_with_core();
        rt.interpret(": GREET .\" hi\" ;").unwrap();
        rt.interpret("GREET").unwrap();
    }

    #[test]
    fn control_flow_words_refuse_outside_a_definition() {
        let mut rt = rt_with_core();
        let err = rt.interpret("IF").unwrap_err();
        assert!(matches!(err, ForthError::CompileOnly(w) if w == "IF"));
        let err = rt.interpret("LOOP").unwrap_err();
        assert!(matches!(err, ForthError::CompileOnly(w) if w == "LOOP"));
        let err = rt.interpret("DOES>").unwrap_err();
        assert!(matches!(err, ForthError::CompileOnly(w) if w == "DOES>"));
    }

    #[test]
    fn name_over_63_characters_fails_compilation() {
        let mut rt = rt_with_core();
        let long_name = "A".repeat(64);
        let err = rt.interpret(&format!(": {} ;", long_name)).unwrap_err();
        assert!(matches!(err, ForthError::NameTooLong(_)));
        let err = rt.interpret(&format!("CREATE {}", long_name)).unwrap_err();
        assert!(matches!(err, ForthError::NameTooLong(_)));
        // exactly 63 is still fine
        let ok_name = "B".repeat(63);
        rt.interpret(&format!(": {} ;", ok_name)).unwrap();
    }

    #[test]
    fn exit_returns_from_only_the_calling_word_not_its_caller() {
        let mut rt = rt_with_core();
        rt.interpret(": INNER 1 EXIT 2 ;").unwrap();
        rt.interpret(": OUTER INNER 3 ;").unwrap();
        rt.interpret("OUTER").unwrap();
        assert_eq!(rt.dict.data_stack, vec![1, 3]);
    }

    #[test]
    fn leave_inside_if_reaches_the_enclosing_do_loop() {
        let mut rt = rt_with_core();
        rt.interpret(": FIRSTTWO 10 0 DO I DUP 2 = IF LEAVE THEN LOOP ;").unwrap();
        rt.interpret("FIRSTTWO").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0, 1, 2]);
    }
}
