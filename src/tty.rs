//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection for interactive-passthrough commands.

use std::io::{self, IsTerminal};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn is_stdout_tty() -> bool {
    io::stdout().is_terminal()
}

pub fn require_tty_for_interactive() -> bool {
    is_stdin_tty() && is_stdout_tty()
}

// log_status! macro is defined in the library root (#[macro_export]) and
// available crate-wide.
