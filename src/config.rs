//! Command-line argument processing.

use clap::{arg, Command};

use crate::internals::messages::DebugLevel;

pub const VERSION: &str = "0.1.0";

pub struct Config {
    pub debug_level: DebugLevel,
    pub file: Option<String>,
    pub no_core: bool,
}

impl Config {
    pub fn new() -> Config {
        Config {
            debug_level: DebugLevel::Warning,
            file: None,
            no_core: false,
        }
    }

    /// Parses `std::env::args`, following the teacher's own `clap`-based
    /// `process_args`: `--debuglevel` sets the diagnostic threshold,
    /// `-f/--file` auto-`LOAD`s a file before the REPL starts, and
    /// `-n/--nocore` skips compiling the comfort-word library.
    pub fn parse() -> Config {
        let mut config = Config::new();

        let matches = Command::new("tforth")
            .version(VERSION)
            .author("tforth contributors")
            .about("A threaded-code Forth interpreter")
            .arg(
                arg!(--debuglevel <VALUE>)
                    .required(false)
                    .value_parser(["error", "warning", "info", "debug"]),
            )
            .arg(arg!(-f --file <VALUE>).required(false))
            .arg(arg!(-n --nocore).required(false))
            .get_matches();

        if let Some(level) = matches.get_one::<String>("debuglevel") {
            config.debug_level = match level.as_str() {
                "error" => DebugLevel::Error,
                "info" => DebugLevel::Info,
                "debug" => DebugLevel::Debug,
                _ => DebugLevel::Warning,
            };
        }
        if let Some(file) = matches.get_one::<String>("file") {
            config.file = Some(file.clone());
        }
        if matches.get_flag("nocore") {
            config.no_core = true;
        }
        config
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
