//! Bounded execution of external programs.
//!
//! Every subprocess the crate starts goes through [`run`], which is the one
//! place spawn failures and timeouts are turned into [`CommandError`] kinds.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CommandError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished program.
#[derive(Debug)]
pub struct Output {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Output {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `command` to completion, feeding it `input` on stdin, and kill it if
/// it outlives `timeout`.
///
/// The deadline also covers reading the child's output, so a grandchild that
/// keeps stdout or stderr open cannot stall the run. A `timeout` too large
/// to represent as a deadline means no deadline.
pub fn run(
    mut command: Command,
    input: Option<&[u8]>,
    timeout: Duration,
) -> Result<Output, CommandError> {
    let program = command.get_program().to_string_lossy().into_owned();

    log::debug!(
        "Executing {} {:?}",
        program,
        command.get_args().collect::<Vec<_>>()
    );

    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| spawn_error(&program, e))?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        let data = input.to_vec();
        // A child that exits early closes the pipe; that shows up in its status.
        thread::spawn(move || {
            let _ = stdin.write_all(&data);
        });
    }

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                log::debug!("{} timed out after {:?}, killing it", program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Timeout { program, timeout });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(CommandError::Io { program, source }),
        }
    };

    let stdout = collect(&stdout, deadline).ok_or_else(|| CommandError::Timeout {
        program: program.clone(),
        timeout,
    })?;
    let stderr =
        collect(&stderr, deadline).ok_or(CommandError::Timeout { program, timeout })?;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Output drained from one pipe, or `None` if the pipe is still open at the
/// deadline.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Option<Instant>) -> Option<Vec<u8>> {
    let Some(deadline) = deadline else {
        return Some(rx.recv().unwrap_or_default());
    };

    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> CommandError {
    let program = program.to_string();
    match err.kind() {
        std::io::ErrorKind::NotFound => CommandError::NotFound { program },
        std::io::ErrorKind::PermissionDenied => CommandError::PermissionDenied { program },
        _ => CommandError::Io {
            program,
            source: err,
        },
    }
}
