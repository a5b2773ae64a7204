//! Persistent interactive shell sessions.
//!
//! A session owns one long-lived `bash` process and executes a serialized
//! sequence of command strings against it. There is no structured channel
//! between konfigure and the shell, so command completion is detected
//! in-band: after each command the session asks the shell to write the
//! command's exit status and a fixed terminator line to stderr, and watches
//! the control channel for that trailer. stdout carries the command's real
//! output and is mirrored to the terminal as it arrives.
//!
//! Commands that need the terminal itself (dashboards, editors) bypass all
//! of this via [`run_one_shot`].

mod listeners;
mod one_shot;
mod process;

pub use listeners::{Channel, Listener, ListenerRegistry};
pub use one_shot::run_one_shot;

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::logging::LogContext;

use process::{ProcessHandle, SessionChunk};

const TERMINATOR: &str = "EOF";
const TERMINATOR_CHUNK: &str = "EOF\n";

/// What a finished command (or a closed session) reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Ready,
    Executing,
    Closing,
    Closed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Shell executable to run the session in.
    pub shell: String,
    /// Mirror data chunks to stdout as they arrive.
    pub mirror_output: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            mirror_output: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Forward the parent's stdin to the shell while the command runs, for
    /// commands that prompt (e.g. MFA token entry).
    pub pipe_input: bool,
}

/// Anything that can execute a command line and report its result.
///
/// The session is the real implementation; tests substitute recorders to
/// assert on the exact command strings konfigure assembles.
pub trait CommandRunner {
    fn run(&mut self, command: &str) -> Result<CommandResult>;

    /// Run with options. Implementations without stdin passthrough fall back
    /// to a plain run.
    fn run_with(&mut self, command: &str, _options: RunOptions) -> Result<CommandResult> {
        self.run(command)
    }
}

enum Completion {
    /// The trailer was observed on the control channel.
    Sentinel(i32),
    /// Both output streams closed before the trailer appeared.
    ProcessExited,
}

pub struct ShellSession {
    process: ProcessHandle,
    listeners: ListenerRegistry,
    transcript: Vec<String>,
    state: SessionState,
    options: SessionOptions,
    log: LogContext,
    close_result: Option<CommandResult>,
}

impl ShellSession {
    pub fn spawn(options: SessionOptions, log: LogContext) -> Result<Self> {
        log.debug("launching session shell...");
        let process = ProcessHandle::spawn_shell(&options.shell)?;
        Ok(Self {
            process,
            listeners: ListenerRegistry::new(),
            transcript: Vec::new(),
            state: SessionState::Ready,
            options,
            log,
            close_result: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Everything the shell has written to stdout since the session started.
    pub fn transcript(&self) -> String {
        self.transcript.concat()
    }

    pub fn run_command(&mut self, command: &str) -> Result<CommandResult> {
        self.run_command_with(command, RunOptions::default())
    }

    pub fn run_command_with(&mut self, command: &str, options: RunOptions) -> Result<CommandResult> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Executing => return Err(Error::session_busy()),
            SessionState::Starting
            | SessionState::Closing
            | SessionState::Closed
            | SessionState::Failed => {
                return Err(Error::session_closed(
                    "cannot run a command on a closed session",
                ))
            }
        }
        self.state = SessionState::Executing;

        let data_buf = Arc::new(Mutex::new(String::new()));
        let outcome: Arc<Mutex<Option<Result<i32>>>> = Arc::new(Mutex::new(None));

        let data_id = {
            let buf = data_buf.clone();
            self.listeners.subscribe(
                Channel::Data,
                Box::new(move |chunk| {
                    if let Ok(mut buf) = buf.lock() {
                        buf.push_str(chunk);
                    }
                }),
            )
        };
        let control_id = {
            let outcome = outcome.clone();
            let mut control_buf = String::new();
            self.listeners.subscribe(
                Channel::Control,
                Box::new(move |chunk| {
                    control_buf.push_str(chunk);
                    if let Some(result) = match_trailer(&control_buf) {
                        if let Ok(mut slot) = outcome.lock() {
                            *slot = Some(result);
                        }
                    }
                }),
            )
        };

        let gate = if options.pipe_input {
            Some(self.process.start_input_passthrough())
        } else {
            None
        };

        self.log.debug(&format!("running: {}", command));
        let written = self
            .process
            .write_line(&format!("{};", command))
            .and_then(|_| self.process.write_line("echo $? >&2;"))
            .and_then(|_| self.process.write_line(&format!("echo \"{}\" >&2;", TERMINATOR)));

        let completion = match written {
            Ok(()) => self.pump_until_complete(&outcome),
            // The shell can exit (e.g. on `exit`) before all three trailer
            // directives land; that is a termination, not an I/O failure.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(Completion::ProcessExited),
            Err(e) => Err(Error::internal_io(
                e.to_string(),
                Some("write session input".to_string()),
            )),
        };

        self.listeners.unsubscribe(data_id);
        self.listeners.unsubscribe(control_id);
        if let Some(gate) = gate {
            gate.store(false, Ordering::SeqCst);
        }

        let output = data_buf
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();

        match completion {
            Ok(Completion::Sentinel(exit_code)) => {
                self.log.debug(&format!("exit code: {}", exit_code));
                self.state = SessionState::Ready;
                Ok(CommandResult { exit_code, output })
            }
            Ok(Completion::ProcessExited) => {
                // The shell died mid-command; resolve with its own status
                // and whatever output made it out.
                let closed = self.shutdown()?;
                Ok(CommandResult {
                    exit_code: closed.exit_code,
                    output,
                })
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// End the session: signal end-of-input, drain remaining output into the
    /// transcript, and wait for the shell to terminate. Idempotent; repeat
    /// calls return the cached result.
    pub fn close(&mut self) -> Result<CommandResult> {
        if let Some(cached) = &self.close_result {
            return Ok(cached.clone());
        }
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<CommandResult> {
        self.state = SessionState::Closing;
        self.process.close_stdin();
        while let Some(chunk) = self.process.recv_event() {
            self.dispatch_chunk(chunk);
        }
        // Subscriptions active at close are discarded; nothing fires after
        // this point.
        self.listeners.clear();
        let exit_code = match self.process.wait() {
            Ok(code) => code,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        let result = CommandResult {
            exit_code,
            output: self.transcript(),
        };
        self.close_result = Some(result.clone());
        self.state = SessionState::Closed;
        Ok(result)
    }

    fn pump_until_complete(&mut self, outcome: &Arc<Mutex<Option<Result<i32>>>>) -> Result<Completion> {
        loop {
            let taken = outcome.lock().ok().and_then(|mut slot| slot.take());
            if let Some(result) = taken {
                // Deliver chunks that were already queued when the trailer
                // was parsed; they were emitted before completion and belong
                // to this command.
                while let Some(chunk) = self.process.try_recv_event() {
                    self.dispatch_chunk(chunk);
                }
                return result.map(Completion::Sentinel);
            }
            match self.process.recv_event() {
                Some(chunk) => self.dispatch_chunk(chunk),
                None => return Ok(Completion::ProcessExited),
            }
        }
    }

    fn dispatch_chunk(&mut self, chunk: SessionChunk) {
        match chunk.channel {
            Channel::Data => {
                self.log.trace(&format!("data chunk ({} bytes)", chunk.text.len()));
                self.transcript.push(chunk.text.clone());
                if self.options.mirror_output {
                    print!("{}", chunk.text);
                    let _ = std::io::stdout().flush();
                }
                self.listeners.dispatch(Channel::Data, &chunk.text);
            }
            Channel::Control => {
                self.log.trace(&format!("control chunk ({} bytes)", chunk.text.len()));
                self.listeners.dispatch(Channel::Control, &chunk.text);
            }
        }
    }
}

impl CommandRunner for ShellSession {
    fn run(&mut self, command: &str) -> Result<CommandResult> {
        self.run_command(command)
    }

    fn run_with(&mut self, command: &str, options: RunOptions) -> Result<CommandResult> {
        self.run_command_with(command, options)
    }
}

/// Scan the control buffer for the command trailer: an exit-status line
/// followed by the terminator line. Returns `None` while the trailer is
/// incomplete, `Some(Ok(code))` once the status parses, and `Some(Err(_))`
/// when the line before the terminator is not an integer.
///
/// Anything the command itself wrote to stderr piles up in the same buffer
/// and is skipped by matching from the tail. A command whose own stderr ends
/// with a line equal to the terminator can complete the trailer early; that
/// ambiguity is inherent to in-band completion markers.
fn match_trailer(buf: &str) -> Option<Result<i32>> {
    let head = buf.strip_suffix(TERMINATOR_CHUNK)?;
    let head = head.strip_suffix('\n')?;
    let status_line = head.rsplit('\n').next().unwrap_or(head);
    match status_line.trim().parse::<i32>() {
        Ok(code) => Some(Ok(code)),
        Err(_) => Some(Err(Error::session_protocol(format!(
            "expected an exit status before the terminator, got '{}'",
            status_line
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::logging::Level;

    fn spawn_test_session() -> ShellSession {
        ShellSession::spawn(
            SessionOptions {
                shell: "bash".to_string(),
                mirror_output: false,
            },
            LogContext::with_level("shell", Level::Status),
        )
        .unwrap()
    }

    #[test]
    fn trailer_matches_simple_status() {
        assert_eq!(match_trailer("0\nEOF\n").unwrap().unwrap(), 0);
        assert_eq!(match_trailer("127\nEOF\n").unwrap().unwrap(), 127);
    }

    #[test]
    fn trailer_skips_command_stderr_noise() {
        let buf = "bash: nope: command not found\n127\nEOF\n";
        assert_eq!(match_trailer(buf).unwrap().unwrap(), 127);
    }

    #[test]
    fn trailer_waits_for_complete_chunks() {
        assert!(match_trailer("0\nEO").is_none());
        assert!(match_trailer("0\nEOF").is_none());
        assert!(match_trailer("EOF\n").is_none());
    }

    #[test]
    fn trailer_rejects_non_integer_status() {
        let err = match_trailer("garbage\nEOF\n").unwrap().unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionProtocol);
    }

    #[test]
    fn echo_resolves_output_and_status() {
        let mut session = spawn_test_session();
        let result = session.run_command("echo hello").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "hello\n");
        session.close().unwrap();
    }

    #[test]
    fn silent_command_resolves_empty_output() {
        let mut session = spawn_test_session();
        let result = session.run_command("true").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "");
        session.close().unwrap();
    }

    #[test]
    fn exit_statuses_round_trip() {
        let mut session = spawn_test_session();
        for code in [0, 1, 17, 126, 255] {
            let result = session.run_command(&format!("(exit {})", code)).unwrap();
            assert_eq!(result.exit_code, code);
        }
        session.close().unwrap();
    }

    #[test]
    fn missing_command_resolves_127() {
        let mut session = spawn_test_session();
        let result = session
            .run_command("definitely-not-a-real-command-xyz")
            .unwrap();
        assert_eq!(result.exit_code, 127);
        session.close().unwrap();
    }

    #[test]
    fn command_stderr_stays_out_of_output() {
        let mut session = spawn_test_session();
        let result = session
            .run_command("echo visible; echo hidden >&2")
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "visible\n");
        session.close().unwrap();
    }

    #[test]
    fn output_concatenates_in_arrival_order() {
        let mut session = spawn_test_session();
        let result = session
            .run_command("printf 'a\\nb\\n'; printf 'c\\n'")
            .unwrap();
        assert_eq!(result.output, "a\nb\nc\n");
        session.close().unwrap();
    }

    #[test]
    fn sequential_commands_do_not_interleave() {
        let mut session = spawn_test_session();
        let first = session.run_command("echo first").unwrap();
        let second = session.run_command("echo second").unwrap();
        assert_eq!(first.output, "first\n");
        assert_eq!(second.output, "second\n");
        session.close().unwrap();
    }

    #[test]
    fn shell_exit_resolves_with_shell_status() {
        let mut session = spawn_test_session();
        let result = session.run_command("exit 7").unwrap();
        assert_eq!(result.exit_code, 7);
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.run_command("echo nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionClosed);

        let closed = session.close().unwrap();
        assert_eq!(closed.exit_code, 7);
    }

    #[test]
    fn close_with_no_commands_reflects_shell_status() {
        let mut session = spawn_test_session();
        let result = session.close().unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "");
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = spawn_test_session();
        session.run_command("echo once").unwrap();
        let first = session.close().unwrap();
        let second = session.close().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn close_returns_full_transcript() {
        let mut session = spawn_test_session();
        session.run_command("echo alpha").unwrap();
        session.run_command("echo beta").unwrap();
        let closed = session.close().unwrap();
        assert_eq!(closed.output, "alpha\nbeta\n");
    }

    #[test]
    fn run_after_close_is_rejected() {
        let mut session = spawn_test_session();
        session.close().unwrap();
        let err = session.run_command("echo nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionClosed);
    }
}
