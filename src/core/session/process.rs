//! Child process ownership and stream pumping for shell sessions.
//!
//! One reader thread per output stream forwards raw chunks into a single
//! event queue; the session drains that queue from one dispatch context, so
//! cross-channel arrival order is preserved and listener maps are only ever
//! touched from one place.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::listeners::Channel;

const READ_BUFFER: usize = 8192;

/// A raw chunk read from one of the child's output streams.
pub(super) struct SessionChunk {
    pub channel: Channel,
    pub text: String,
}

pub(super) struct ProcessHandle {
    child: Child,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    events: Receiver<SessionChunk>,
}

impl ProcessHandle {
    /// Spawn the session shell with fully piped stdio and start one reader
    /// thread per output stream.
    pub(super) fn spawn_shell(program: &str) -> Result<Self> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::session_spawn_failed(program, e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::internal_unexpected("session stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal_unexpected("session stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::internal_unexpected("session stderr was not piped"))?;

        let (tx, rx) = std::sync::mpsc::channel();
        spawn_reader(Channel::Data, stdout, tx.clone());
        spawn_reader(Channel::Control, stderr, tx);

        Ok(Self {
            child,
            stdin: Arc::new(Mutex::new(Some(stdin))),
            events: rx,
        })
    }

    /// Write one line to the child's stdin and flush it.
    ///
    /// A closed or broken pipe surfaces as `ErrorKind::BrokenPipe` so the
    /// caller can distinguish "the shell already exited" from real I/O
    /// failures.
    pub(super) fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self
            .stdin
            .lock()
            .map_err(|_| std::io::Error::new(ErrorKind::Other, "session input lock poisoned"))?;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| std::io::Error::new(ErrorKind::BrokenPipe, "session input closed"))?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()
    }

    /// Signal end-of-input to the child by dropping its stdin handle.
    pub(super) fn close_stdin(&self) {
        if let Ok(mut guard) = self.stdin.lock() {
            guard.take();
        }
    }

    /// Block until the next chunk arrives. `None` means both output streams
    /// reached end-of-file, i.e. the child is gone or going.
    pub(super) fn recv_event(&self) -> Option<SessionChunk> {
        self.events.recv().ok()
    }

    /// Drain any chunks already queued without blocking.
    pub(super) fn try_recv_event(&self) -> Option<SessionChunk> {
        match self.events.try_recv() {
            Ok(chunk) => Some(chunk),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the child to terminate and return its exit code.
    /// A signal-killed child has no code and is reported as an error.
    pub(super) fn wait(&mut self) -> Result<i32> {
        let status = self
            .child
            .wait()
            .map_err(|e| Error::internal_io(e.to_string(), Some("wait for session shell".to_string())))?;
        status
            .code()
            .ok_or_else(|| Error::session_killed("session shell was terminated by a signal"))
    }

    /// Start forwarding the parent's stdin to the child, line by line, until
    /// the returned gate is cleared. The forwarder reads one line at a time,
    /// so at most one line typed after the gate closes is consumed and
    /// discarded.
    pub(super) fn start_input_passthrough(&self) -> Arc<AtomicBool> {
        let active = Arc::new(AtomicBool::new(true));
        let gate = active.clone();
        let stdin = self.stdin.clone();

        std::thread::spawn(move || {
            let mut line = String::new();
            loop {
                line.clear();
                match std::io::stdin().read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if !gate.load(Ordering::SeqCst) {
                            break;
                        }
                        let Ok(mut guard) = stdin.lock() else { break };
                        let Some(writer) = guard.as_mut() else { break };
                        if writer
                            .write_all(line.as_bytes())
                            .and_then(|_| writer.flush())
                            .is_err()
                        {
                            break;
                        }
                    }
                }
                if !gate.load(Ordering::SeqCst) {
                    break;
                }
            }
        });

        active
    }
}

fn spawn_reader(channel: Channel, mut stream: impl Read + Send + 'static, tx: Sender<SessionChunk>) {
    std::thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(SessionChunk { channel, text }).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        // Dropping the sender is the end-of-stream signal; once both readers
        // are gone the session's recv_event returns None.
    });
}
