//! Prefixed status logging for long-lived components.
//!
//! Components that outlive a single function call (the shell session, the
//! Helm driver) receive a `LogContext` at construction instead of reaching
//! for a global logger. Output goes to stderr and only when stderr is a
//! terminal, matching the `log_status!` macro used by the command layer.

use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Status,
    Debug,
    Trace,
}

impl Level {
    /// Resolve the level from the `--debug` flag and the `KONFIGURE_LOG`
    /// environment variable (`trace` wins over the flag).
    pub fn from_env(debug: bool) -> Self {
        match std::env::var("KONFIGURE_LOG").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            _ if debug => Level::Debug,
            _ => Level::Status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogContext {
    prefix: String,
    level: Level,
}

impl LogContext {
    pub fn new(prefix: impl Into<String>, debug: bool) -> Self {
        Self {
            prefix: prefix.into(),
            level: Level::from_env(debug),
        }
    }

    pub fn with_level(prefix: impl Into<String>, level: Level) -> Self {
        Self {
            prefix: prefix.into(),
            level,
        }
    }

    /// Derive a context for a sub-component, e.g. `helm` → `helm:nginx/web`.
    pub fn child(&self, suffix: &str) -> Self {
        Self {
            prefix: format!("{}:{}", self.prefix, suffix),
            level: self.level,
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.level >= Level::Debug
    }

    fn emit(&self, message: &str) {
        if std::io::stderr().is_terminal() {
            eprintln!("[{}] {}", self.prefix, message);
        }
    }

    pub fn status(&self, message: &str) {
        self.emit(message);
    }

    /// Blank status line, used to visually separate phases of a run.
    pub fn blank(&self) {
        if std::io::stderr().is_terminal() {
            eprintln!();
        }
    }

    pub fn debug(&self, message: &str) {
        if self.level >= Level::Debug {
            self.emit(message);
        }
    }

    pub fn trace(&self, message: &str) {
        if self.level >= Level::Trace {
            self.emit(message);
        }
    }
}
