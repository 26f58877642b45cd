// tforth — a threaded-code Forth interpreter.

mod config;
mod errors;
mod internals;
mod kernel;
mod runtime;
mod tokenizer;

use config::Config;
use errors::ForthError;
use internals::{files, repl};
use runtime::ForthRuntime;

fn main() {
    let config = Config::parse();

    let mut rt = ForthRuntime::new();
    rt.msg.set_level(config.debug_level);
    rt.cold_start(config.no_core);

    if let Some(path) = &config.file {
        match files::load_file(&mut rt, path) {
            Ok(()) => {}
            Err(ForthError::Halt) => return,
            Err(e) => println!("ERR: {}", e),
        }
    }

    repl::auto_boot(&mut rt);
    repl::run(&mut rt);
}
