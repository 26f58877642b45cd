//! Leveled diagnostics reporter.
///
/// Small, dependency-free message sink used throughout the runtime for
/// `error`/`warning`/`info`/`debug` reports. Severity below the current
/// `DebugLevel` is dropped; everything at or above prints to stderr with
/// the calling function's name so messages can be traced back to source.
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Debug, Clone)]
pub struct Msg {
    level: DebugLevel,
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Warning,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    pub fn error<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.report(DebugLevel::Error, caller, text, detail);
    }

    pub fn warning<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.report(DebugLevel::Warning, caller, text, detail);
    }

    pub fn info<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.report(DebugLevel::Info, caller, text, detail);
    }

    pub fn debug<T: Debug>(&self, caller: &str, text: &str, detail: Option<T>) {
        self.report(DebugLevel::Debug, caller, text, detail);
    }

    fn report<T: Debug>(&self, level: DebugLevel, caller: &str, text: &str, detail: Option<T>) {
        if level > self.level {
            return;
        }
        match detail {
            Some(d) => eprintln!("[{:?}] {}: {} ({:?})", level, caller, text, d),
            None => eprintln!("[{:?}] {}: {}", level, caller, text),
        }
    }
}

impl Default for Msg {
    fn default() -> Msg {
        Msg::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_warning() {
        let msg = Msg::new();
        assert_eq!(msg.get_level(), DebugLevel::Warning);
    }

    #[test]
    fn level_ordering_gates_reports() {
        assert!(DebugLevel::Error < DebugLevel::Warning);
        assert!(DebugLevel::Warning < DebugLevel::Info);
        assert!(DebugLevel::Info < DebugLevel::Debug);
    }

    #[test]
    fn set_and_get_level_roundtrip() {
        let mut msg = Msg::new();
        msg.set_level(DebugLevel::Debug);
        assert_eq!(msg.get_level(), DebugLevel::Debug);
    }
}
