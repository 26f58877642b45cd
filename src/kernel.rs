//////////////////////////////////////////////////////////////
/// Forth Interpreter Kernel
///
/// Lower-level data structures shared by the rest of the runtime: the
/// heap (a growable vector of tagged cells), the linked-list dictionary
/// threaded through it, the data and return stacks, and the builtin
/// function table. Higher-level behavior (compiling, the outer
/// interpreter, the dispatch loop) lives in `runtime.rs` and
/// `internals/`; this module only knows how to lay cells out and find
/// them again.
use crate::errors::ForthError;
use crate::runtime::ForthRuntime;

/// Every definable Forth value the heap can hold. `Prim` and `Thread`
/// point elsewhere rather than embedding a closure, so `Cell` stays
/// `Clone` and the heap stays a plain `Vec`.
#[derive(Debug, Clone)]
pub enum Cell {
    Int(i64),
    Prim(usize),
    Thread { start: usize, count: usize },
    Op(Opcode),
    Null,
}

/// The code-field marker or body instruction at one heap cell.
/// `Branch`/`ZBranch` carry the absolute target cell index, patched in by
/// the compiler once the target is known (see `internals/compiler.rs`).
#[derive(Debug, Clone)]
pub enum Opcode {
    Lit(i64),
    Call(usize),
    Branch(usize),
    ZBranch(usize),
    PrintString(String),
    Prim(usize),
    Exit,
    /// Code-field marker for a plain `CREATE`d word: executing it pushes
    /// the address of the parameter field (the cell right after this one).
    Variable,
    /// Code-field marker for a word defined by `CONSTANT`.
    Constant(i64),
    /// Code-field marker for a word whose `DOES>` clause has been
    /// installed: push the parameter field address, then run the thread
    /// starting at this index.
    DoesBody(usize),
    /// Compiled in place of `DOES>` inside a defining word: at runtime,
    /// patches the most recently `CREATE`d word's code field to
    /// `DoesBody(<the cell right after this one>)`, then returns from the
    /// thread exactly as `Exit` would. The two-stage install spec calls
    /// for: build-time behavior runs up to here, runtime behavior is
    /// whatever follows in the source.
    InstallDoes,
}

pub type BuiltinCode = fn(&mut ForthRuntime) -> Result<(), ForthError>;

/// One entry in the builtin table: the function pointer plus enough
/// metadata to register a dictionary header for it and to print a `SEE`
/// description.
#[derive(Clone)]
pub struct BuiltinFn {
    pub name: String,
    pub immediate: bool,
    pub doc: &'static str,
    pub code: BuiltinCode,
}

impl std::fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinFn({})", self.name)
    }
}

/// The heap, dictionary, stacks, and builtin table. Index 0 of the heap
/// is always a `Cell::Null` sentinel so a header `link` of 0 unambiguously
/// means "no earlier word".
pub struct Dictionary {
    pub heap: Vec<Cell>,
    pub latest: usize,
    pub data_stack: Vec<i64>,
    pub return_stack: Vec<i64>,
    pub builtins: Vec<BuiltinFn>,
}

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary {
            heap: vec![Cell::Null],
            latest: 0,
            data_stack: Vec::new(),
            return_stack: Vec::new(),
            builtins: Vec::new(),
        }
    }

    pub fn reset_stacks(&mut self) {
        self.data_stack.clear();
        self.return_stack.clear();
    }

    pub fn here(&self) -> usize {
        self.heap.len()
    }

    pub fn push_cell(&mut self, cell: Cell) -> usize {
        let at = self.heap.len();
        self.heap.push(cell);
        at
    }

    pub fn get(&self, addr: usize) -> &Cell {
        self.heap.get(addr).unwrap_or(&Cell::Null)
    }

    pub fn push_data(&mut self, v: i64) {
        self.data_stack.push(v);
    }

    pub fn pop_data(&mut self) -> Result<i64, ForthError> {
        self.data_stack.pop().ok_or(ForthError::StackUnderflow)
    }

    pub fn top_data(&self) -> Result<i64, ForthError> {
        self.data_stack.last().copied().ok_or(ForthError::StackUnderflow)
    }

    pub fn push_return(&mut self, v: i64) {
        self.return_stack.push(v);
    }

    pub fn pop_return(&mut self) -> Result<i64, ForthError> {
        self.return_stack.pop().ok_or(ForthError::StackUnderflow)
    }

    /// Begins a word header: `link`, `flags_len`, then one cell per name
    /// code point. Returns the heap index of the (not-yet-written) code
    /// field, i.e. the execution token callers should `Call`/store.
    pub fn allocate_header(&mut self, name: &str, immediate: bool) -> usize {
        let link = self.latest;
        let header_start = self.heap.len();
        self.push_cell(Cell::Int(link as i64));
        let flags: i64 = if immediate { 1 } else { 0 };
        let len = name.chars().count() as i64;
        self.push_cell(Cell::Int((flags << 32) | len));
        for ch in name.chars() {
            self.push_cell(Cell::Int(ch as i64));
        }
        self.latest = header_start;
        self.heap.len()
    }

    fn header_len(&self, header_start: usize) -> usize {
        match self.get(header_start + 1) {
            Cell::Int(packed) => (*packed & 0xFFFFFFFF) as usize,
            _ => 0,
        }
    }

    fn header_immediate(&self, header_start: usize) -> bool {
        match self.get(header_start + 1) {
            Cell::Int(packed) => (*packed >> 32) & 1 == 1,
            _ => false,
        }
    }

    pub fn header_name(&self, header_start: usize) -> String {
        let len = self.header_len(header_start);
        (0..len)
            .map(|i| match self.get(header_start + 2 + i) {
                Cell::Int(c) => char::from_u32(*c as u32).unwrap_or('?'),
                _ => '?',
            })
            .collect()
    }

    pub fn code_field(&self, header_start: usize) -> usize {
        header_start + 2 + self.header_len(header_start)
    }

    /// Walks the dictionary newest-first looking for `name`, compared
    /// case-insensitively (names are stored exactly as typed). Returns
    /// the word's execution token (the heap index of its code field) and
    /// whether it is `IMMEDIATE`.
    pub fn find(&self, name: &str) -> Option<(usize, bool)> {
        let mut link = self.latest;
        while link != 0 {
            if self.header_name(link).eq_ignore_ascii_case(name) {
                return Some((self.code_field(link), self.header_immediate(link)));
            }
            link = match self.get(link) {
                Cell::Int(p) => *p as usize,
                _ => 0,
            };
        }
        None
    }

    /// Every defined name, oldest first, for `WORDS`.
    pub fn all_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut link = self.latest;
        while link != 0 {
            names.push(self.header_name(link));
            link = match self.get(link) {
                Cell::Int(p) => *p as usize,
                _ => 0,
            };
        }
        names.reverse();
        names
    }

    pub fn add_builtin(&mut self, name: &str, immediate: bool, doc: &'static str, code: BuiltinCode) -> usize {
        let idx = self.builtins.len();
        self.builtins.push(BuiltinFn {
            name: name.to_string(),
            immediate,
            doc,
            code,
        });
        let cfa = self.allocate_header(name, immediate);
        self.push_cell(Cell::Prim(idx));
        cfa
    }
}

impl Default for Dictionary {
    fn default() -> Dictionary {
        Dictionary::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_dictionary_has_sentinel_cell() {
        let dict = Dictionary::new();
        assert_eq!(dict.heap.len(), 1);
        assert_eq!(dict.latest, 0);
    }

    #[test]
    fn header_roundtrips_name_and_immediate_flag() {
        let mut dict = Dictionary::new();
        let cfa = dict.allocate_header("DUP", false);
        dict.push_cell(Cell::Prim(0));
        assert_eq!(dict.header_name(dict.latest), "DUP");
        assert!(!dict.header_immediate(dict.latest));
        assert_eq!(dict.code_field(dict.latest), cfa);
    }

    #[test]
    fn find_walks_newest_first() {
        let mut dict = Dictionary::new();
        dict.allocate_header("DUP", false);
        dict.push_cell(Cell::Prim(0));
        dict.allocate_header("DUP", false);
        dict.push_cell(Cell::Prim(1));
        let (cfa, immediate) = dict.find("dup").expect("should find DUP case-insensitively");
        assert!(!immediate);
        match dict.get(cfa) {
            Cell::Prim(1) => {}
            other => panic!("expected the most recent DUP, got {:?}", other),
        }
    }

    #[test]
    fn find_misses_unknown_word() {
        let dict = Dictionary::new();
        assert!(dict.find("NOPE").is_none());
    }

    #[test]
    fn stack_underflow_is_an_error_not_a_panic() {
        let mut dict = Dictionary::new();
        assert!(matches!(dict.pop_data(), Err(ForthError::StackUnderflow)));
        dict.push_data(42);
        assert_eq!(dict.pop_data().unwrap(), 42);
    }

    #[test]
    fn all_names_lists_oldest_first() {
        let mut dict = Dictionary::new();
        dict.allocate_header("A", false);
        dict.push_cell(Cell::Prim(0));
        dict.allocate_header("B", false);
        dict.push_cell(Cell::Prim(0));
        assert_eq!(dict.all_names(), vec!["A".to_string(), "B".to_string()]);
    }
}
