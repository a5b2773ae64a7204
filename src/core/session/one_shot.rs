//! Terminal-attached one-shot command execution.
//!
//! For programs that need genuine interactive control of the terminal (k9s,
//! `$EDITOR`, debug pods) a fresh disposable shell is spawned with all stdio
//! inherited from the parent. No output is captured and no completion
//! trailer is involved; the caller gets the exit code and nothing else.

use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Run `command` through `bash -c` with the parent's terminal attached.
pub fn run_one_shot(command: &str) -> Result<i32> {
    let status = Command::new("bash")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| Error::session_spawn_failed("bash", e.to_string()))?;

    status
        .code()
        .ok_or_else(|| Error::session_killed("interactive command was terminated by a signal"))
}
