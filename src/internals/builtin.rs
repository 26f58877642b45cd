/// Core primitive words.
///
/// Arithmetic, stack shuffling, comparisons, memory, the return stack,
/// and plain I/O. Everything that can instead be defined in terms of
/// these in Forth itself (`ROT`, `NEGATE`, `ABS`, ...) lives in
/// `internals::corelib` instead, matching the split the original
/// kernel/high-level divide used.
use crate::errors::ForthError;
use crate::kernel::Cell;
use crate::runtime::ForthRuntime;

macro_rules! pop {
    ($rt:expr) => {
        $rt.dict.pop_data()?
    };
}

macro_rules! push {
    ($rt:expr, $v:expr) => {
        $rt.dict.push_data($v)
    };
}

fn cell_to_int(rt: &ForthRuntime, addr: usize) -> Result<i64, ForthError> {
    match rt.dict.get(addr) {
        Cell::Int(v) => Ok(*v),
        _ => Err(ForthError::RangeError(format!("@ at non-data cell {}", addr))),
    }
}

pub fn install(rt: &mut ForthRuntime) {
    rt.add_primitive("+", false, "( a b -- a+b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, b + a);
        Ok(())
    });
    rt.add_primitive("-", false, "( a b -- a-b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, b - a);
        Ok(())
    });
    rt.add_primitive("*", false, "( a b -- a*b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, b * a);
        Ok(())
    });
    rt.add_primitive("/", false, "( a b -- a/b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        if a == 0 {
            return Err(ForthError::RangeError("/ by zero".to_string()));
        }
        push!(rt, b / a);
        Ok(())
    });
    rt.add_primitive("MOD", false, "( a b -- a mod b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        if a == 0 {
            return Err(ForthError::RangeError("MOD by zero".to_string()));
        }
        push!(rt, b % a);
        Ok(())
    });
    rt.add_primitive("/MOD", false, "( a b -- rem quot )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        if a == 0 {
            return Err(ForthError::RangeError("/MOD by zero".to_string()));
        }
        push!(rt, b % a);
        push!(rt, b / a);
        Ok(())
    });

    rt.add_primitive("=", false, "( a b -- flag )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, if a == b { crate::runtime::TRUE } else { crate::runtime::FALSE });
        Ok(())
    });
    rt.add_primitive("<", false, "( a b -- flag )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, if b < a { crate::runtime::TRUE } else { crate::runtime::FALSE });
        Ok(())
    });
    rt.add_primitive(">", false, "( a b -- flag )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, if b > a { crate::runtime::TRUE } else { crate::runtime::FALSE });
        Ok(())
    });
    rt.add_primitive("0=", false, "( n -- flag )", |rt| {
        let n = pop!(rt);
        push!(rt, if n == 0 { crate::runtime::TRUE } else { crate::runtime::FALSE });
        Ok(())
    });
    rt.add_primitive("0<", false, "( n -- flag )", |rt| {
        let n = pop!(rt);
        push!(rt, if n < 0 { crate::runtime::TRUE } else { crate::runtime::FALSE });
        Ok(())
    });
    rt.add_primitive("AND", false, "( a b -- a&b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, b & a);
        Ok(())
    });
    rt.add_primitive("OR", false, "( a b -- a|b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, b | a);
        Ok(())
    });
    rt.add_primitive("XOR", false, "( a b -- a^b )", |rt| {
        let a = pop!(rt);
        let b = pop!(rt);
        push!(rt, b ^ a);
        Ok(())
    });

    rt.add_primitive("DUP", false, "( a -- a a )", |rt| {
        let a = pop!(rt);
        push!(rt, a);
        push!(rt, a);
        Ok(())
    });
    rt.add_primitive("DROP", false, "( a -- )", |rt| {
        pop!(rt);
        Ok(())
    });
    rt.add_primitive("SWAP", false, "( a b -- b a )", |rt| {
        let b = pop!(rt);
        let a = pop!(rt);
        push!(rt, b);
        push!(rt, a);
        Ok(())
    });
    rt.add_primitive("OVER", false, "( a b -- a b a )", |rt| {
        let b = pop!(rt);
        let a = pop!(rt);
        push!(rt, a);
        push!(rt, b);
        push!(rt, a);
        Ok(())
    });
    rt.add_primitive("PICK", false, "( xn ... x0 n -- xn ... x0 xn )", |rt| {
        let n = pop!(rt) as usize;
        let len = rt.dict.data_stack.len();
        let v = *rt
            .dict
            .data_stack
            .get(len.wrapping_sub(n + 1))
            .ok_or(ForthError::StackUnderflow)?;
        push!(rt, v);
        Ok(())
    });
    rt.add_primitive("ROLL", false, "( xu ... x0 u -- xu-1 ... x0 xu )", |rt| {
        let n = pop!(rt) as usize;
        let len = rt.dict.data_stack.len();
        let at = len
            .checked_sub(n + 1)
            .ok_or_else(|| ForthError::RangeError("ROLL".to_string()))?;
        let v = rt.dict.data_stack.remove(at);
        push!(rt, v);
        Ok(())
    });
    rt.add_primitive("?DUP", false, "( n -- n n | 0 ) duplicates only a nonzero top", |rt| {
        let n = rt.dict.top_data()?;
        if n != 0 {
            push!(rt, n);
        }
        Ok(())
    });
    rt.add_primitive("CLEAR", false, "( ... -- ) empties the data stack", |rt| {
        rt.dict.data_stack.clear();
        Ok(())
    });

    rt.add_primitive(">R", false, "( n -- ) (R: -- n )", |rt| {
        let n = pop!(rt);
        rt.dict.push_return(n);
        Ok(())
    });
    rt.add_primitive("R>", false, "( -- n ) (R: n -- )", |rt| {
        let n = rt.dict.pop_return()?;
        push!(rt, n);
        Ok(())
    });
    rt.add_primitive("R@", false, "( -- n ) (R: n -- n )", |rt| {
        let n = *rt.dict.return_stack.last().ok_or(ForthError::StackUnderflow)?;
        push!(rt, n);
        Ok(())
    });

    rt.add_primitive("@", false, "( addr -- n )", |rt| {
        let addr = pop!(rt) as usize;
        push!(rt, cell_to_int(rt, addr)?);
        Ok(())
    });
    rt.add_primitive("!", false, "( n addr -- )", |rt| {
        let addr = pop!(rt) as usize;
        let n = pop!(rt);
        if addr >= rt.dict.heap.len() {
            return Err(ForthError::RangeError(format!("! out of range {}", addr)));
        }
        rt.dict.heap[addr] = Cell::Int(n);
        Ok(())
    });
    rt.add_primitive("C@", false, "( addr -- byte )", |rt| {
        let addr = pop!(rt) as usize;
        push!(rt, cell_to_int(rt, addr)?);
        Ok(())
    });
    rt.add_primitive("C!", false, "( byte addr -- )", |rt| {
        let addr = pop!(rt) as usize;
        let n = pop!(rt);
        if addr >= rt.dict.heap.len() {
            return Err(ForthError::RangeError(format!("C! out of range {}", addr)));
        }
        rt.dict.heap[addr] = Cell::Int(n & 0xFF);
        Ok(())
    });
    rt.add_primitive(",", false, "( n -- )", |rt| {
        let n = pop!(rt);
        rt.dict.push_cell(Cell::Int(n));
        Ok(())
    });
    rt.add_primitive("HERE", false, "( -- addr )", |rt| {
        push!(rt, rt.here() as i64);
        Ok(())
    });
    rt.add_primitive("ALLOT", false, "( n -- )", |rt| {
        let n = pop!(rt);
        if n > 0 {
            for _ in 0..n {
                rt.dict.push_cell(Cell::Int(0));
            }
        } else if n < 0 {
            let new_len = rt.dict.heap.len().saturating_sub((-n) as usize).max(1);
            rt.dict.heap.truncate(new_len);
        }
        Ok(())
    });

    rt.add_primitive(".", false, "( n -- )", |rt| {
        let n = pop!(rt);
        print!("{} ", radix_string(n, rt.base));
        Ok(())
    });
    rt.add_primitive("EMIT", false, "( c -- ) emits the low byte of c as a character", |rt| {
        let c = pop!(rt);
        print!("{}", (c & 0xFF) as u8 as char);
        Ok(())
    });
    rt.add_primitive("CR", false, "( -- )", |rt| {
        println!();
        Ok(())
    });
    rt.add_primitive("DEPTH", false, "( -- n )", |rt| {
        push!(rt, rt.dict.data_stack.len() as i64);
        Ok(())
    });
    rt.add_primitive(".S", false, "( -- ) prints the stack non-destructively", |rt| {
        print!("<{}> ", rt.dict.data_stack.len());
        for v in &rt.dict.data_stack {
            print!("{} ", v);
        }
        Ok(())
    });

    rt.add_primitive("WORDS", false, "( -- ) lists every defined word", |rt| {
        for name in rt.dict.all_names() {
            print!("{} ", name);
        }
        println!();
        Ok(())
    });

    rt.add_primitive("DECIMAL", false, "( -- ) sets the number radix to 10", |rt| {
        rt.base = 10;
        Ok(())
    });
    rt.add_primitive("HEX", false, "( -- ) sets the number radix to 16", |rt| {
        rt.base = 16;
        Ok(())
    });
    rt.add_primitive("BASE", false, "( -- n ) the current number radix", |rt| {
        push!(rt, rt.base);
        Ok(())
    });

    rt.add_primitive("SLEEP", false, "( n -- ) blocks for n seconds", |rt| {
        let n = pop!(rt);
        if n > 0 {
            std::thread::sleep(std::time::Duration::from_secs(n as u64));
        }
        Ok(())
    });
    rt.add_primitive("MS", false, "( n -- ) blocks for n milliseconds", |rt| {
        let n = pop!(rt);
        if n > 0 {
            std::thread::sleep(std::time::Duration::from_millis(n as u64));
        }
        Ok(())
    });

    rt.add_primitive("BYE", false, "( -- ) ends the session", |_rt| Err(ForthError::Halt));
    rt.add_primitive("EXIT", true, "( -- ) returns early from the current definition, or the prompt", |rt| {
        if rt.compiling {
            rt.compile_op(crate::kernel::Opcode::Exit);
            Ok(())
        } else {
            Err(ForthError::ExitFrame)
        }
    });

    rt.add_primitive("DBG", false, "( n -- ) sets the diagnostic level: 0=error 1=warning 2=info 3=debug", |rt| {
        use crate::internals::messages::DebugLevel;
        let n = pop!(rt);
        rt.msg.set_level(match n {
            0 => DebugLevel::Error,
            1 => DebugLevel::Warning,
            2 => DebugLevel::Info,
            _ => DebugLevel::Debug,
        });
        Ok(())
    });
}

fn radix_string(n: i64, base: i64) -> String {
    if base == 10 {
        return n.to_string();
    }
    let negative = n < 0;
    let mut n = n.unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }
    let digits = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut out = Vec::new();
    let base = base as u64;
    while n > 0 {
        out.push(digits[(n % base) as usize]);
        n /= base;
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt_with_builtins() -> ForthRuntime {
        let mut rt = ForthRuntime::new();
        install(&mut rt);
        rt
    }

    #[test]
    fn arithmetic_follows_first_pushed_first_operand_order() {
        let mut rt = rt_with_builtins();
        rt.interpret("10 3 -").unwrap();
        assert_eq!(rt.dict.data_stack, vec![7]);
    }

    #[test]
    fn comparison_pop_order_matches_the_recorded_decision() {
        let mut rt = rt_with_builtins();
        rt.interpret("3 10 <").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), crate::runtime::TRUE);
        rt.interpret("10 3 <").unwrap();
        assert_eq!(rt.dict.pop_data().unwrap(), crate::runtime::FALSE);
    }

    #[test]
    fn stack_shuffling_words_behave() {
        let mut rt = rt_with_builtins();
        rt.interpret("1 2 SWAP").unwrap();
        assert_eq!(rt.dict.data_stack, vec![2, 1]);
        rt.interpret("OVER").unwrap();
        assert_eq!(rt.dict.data_stack, vec![2, 1, 2]);
    }

    #[test]
    fn fetch_and_store_roundtrip_through_comma() {
        let mut rt = rt_with_builtins();
        rt.interpret("HERE 99 , @").unwrap();
        assert_eq!(rt.dict.data_stack, vec![99]);
    }

    #[test]
    fn division_by_zero_is_a_range_error_not_a_panic() {
        let mut rt = rt_with_builtins();
        let err = rt.interpret("1 0 /").unwrap_err();
        assert!(matches!(err, ForthError::RangeError(_)));
    }

    #[test]
    fn bye_is_a_distinguished_halt_error() {
        let mut rt = rt_with_builtins();
        let err = rt.interpret("BYE").unwrap_err();
        assert!(matches!(err, ForthError::Halt));
    }

    #[test]
    fn hex_radix_prints_uppercase_digits() {
        assert_eq!(radix_string(255, 16), "FF");
        assert_eq!(radix_string(-255, 16), "-FF");
        assert_eq!(radix_string(0, 16), "0");
    }

    #[test]
    fn q_dup_duplicates_only_when_nonzero() {
        let mut rt = rt_with_builtins();
        rt.interpret("5 ?DUP").unwrap();
        assert_eq!(rt.dict.data_stack, vec![5, 5]);
        rt.interpret("CLEAR 0 ?DUP").unwrap();
        assert_eq!(rt.dict.data_stack, vec![0]);
    }

    #[test]
    fn clear_empties_the_data_stack() {
        let mut rt = rt_with_builtins();
        rt.interpret("1 2 3 CLEAR").unwrap();
        assert!(rt.dict.data_stack.is_empty());
    }

    #[test]
    fn roll_moves_the_nth_item_to_top() {
        let mut rt = rt_with_builtins();
        rt.interpret("1 2 3 2 ROLL").unwrap();
        assert_eq!(rt.dict.data_stack, vec![2, 3, 1]);
    }

    #[test]
    fn emit_masks_its_argument_to_one_byte() {
        let mut rt = rt_with_builtins();
        // 321 mod 256 == 65 == 'A', and should not panic the way an
        // out-of-range char::from_u32 conversion would.
        rt.interpret("321 EMIT").unwrap();
        assert!(rt.dict.data_stack.is_empty());
    }
}
