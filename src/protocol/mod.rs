//! Line Protocol Engine.
//!
//! Everything here blocks the calling thread and must run off the UI
//! thread. Two dialects are spoken over a [`SerialSession`]:
//!
//! * the friendly REPL: a line is sent with CRLF and the reply is
//!   everything up to the next `>>> ` or `... ` prompt ([`execute`]);
//! * the raw REPL used for file transfer ([`raw`]).
//!
//! Failure detection is a substring heuristic. Firmware gives no error
//! codes, so any captured output containing [`ERROR_MARKER`] counts as a
//! failed command, even when the program printed the word on purpose.

pub mod raw;

pub use raw::execute as execute_raw;

use crate::error::{LinkError, LinkResult};
use crate::session::SerialSession;
use memchr::memmem;
use std::time::Duration;
use tracing::trace;

/// Enter raw / paste mode.
pub const CTRL_A: u8 = 0x01;
/// Leave raw mode.
pub const CTRL_B: u8 = 0x02;
/// Interrupt a running program.
pub const CTRL_C: u8 = 0x03;
/// Execute / end of paste.
pub const CTRL_D: u8 = 0x04;

/// Friendly REPL prompt.
pub const PROMPT: &[u8] = b">>> ";

/// Prompt shown inside an unfinished block.
pub const CONTINUATION: &[u8] = b"... ";

/// Line terminator on the wire.
pub const LINE_END: &[u8] = b"\r\n";

/// Substring that marks captured output as failed.
pub const ERROR_MARKER: &[u8] = b"Error";

const TRACEBACK: &[u8] = b"Traceback (most recent call last)";

const READ_CHUNK: usize = 256;

/// Output captured from one command batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProtocolResult {
    /// True when the device wrote to stderr or the marker appears anywhere.
    pub fn is_error(&self) -> bool {
        !self.stderr.is_empty()
            || contains(&self.stdout, ERROR_MARKER)
            || contains(&self.stderr, ERROR_MARKER)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turn a flagged result into [`LinkError::Protocol`] carrying the raw output.
    pub fn into_result(self) -> LinkResult<Vec<u8>> {
        if self.is_error() {
            let mut output = self.stdout;
            output.extend_from_slice(&self.stderr);
            return Err(LinkError::protocol(&output));
        }
        Ok(self.stdout)
    }
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    memmem::find(haystack, needle).is_some()
}

/// Accumulate bytes until `token` appears in the buffer.
///
/// `timeout` bounds each wait for data, so a chatty device that never
/// sends `token` still fails once it goes quiet.
pub fn read_until(
    link: &mut SerialSession,
    token: &[u8],
    timeout: Duration,
) -> LinkResult<Vec<u8>> {
    read_matching(link, token, timeout, |buffer| contains(buffer, token))
}

/// Read until the buffer ends with either friendly prompt.
fn read_prompt(link: &mut SerialSession, timeout: Duration) -> LinkResult<Vec<u8>> {
    read_matching(link, PROMPT, timeout, |buffer| {
        buffer.ends_with(PROMPT) || buffer.ends_with(CONTINUATION)
    })
}

fn read_matching(
    link: &mut SerialSession,
    token: &[u8],
    timeout: Duration,
    done: impl Fn(&[u8]) -> bool,
) -> LinkResult<Vec<u8>> {
    let port = link.port_mut()?;
    port.set_timeout(timeout)?;

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match port.read_bytes(&mut chunk) {
            Ok(0) => return Err(LinkError::timeout(token, timeout)),
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if done(&buffer) {
                    trace!("read matched {:?} after {} bytes", token, buffer.len());
                    return Ok(buffer);
                }
            }
            Err(e) if e.is_timeout() => return Err(LinkError::timeout(token, timeout)),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Send `commands` one line at a time at the friendly prompt.
///
/// Each line is flushed and its reply read up to the next `>>> ` or
/// `... ` prompt before the following line is sent. Block bodies only run
/// once the board is back at `>>> `, so a batch that stops inside a block
/// gets one extra blank line to close it. A traceback moves the rest of
/// that reply into `stderr`.
pub fn execute<S: AsRef<str>>(
    link: &mut SerialSession,
    commands: &[S],
) -> LinkResult<ProtocolResult> {
    let timeout = link.config().request_timeout();
    let mut result = ProtocolResult::default();
    let mut open_block = false;

    for command in commands {
        open_block = send_line(link, command.as_ref(), timeout, &mut result)?;
    }
    if open_block {
        trace!("closing unfinished block");
        send_line(link, "", timeout, &mut result)?;
    }

    Ok(result)
}

/// Send one line and collect its reply. True when the board answered with
/// the continuation prompt.
fn send_line(
    link: &mut SerialSession,
    line: &str,
    timeout: Duration,
    result: &mut ProtocolResult,
) -> LinkResult<bool> {
    let mut wire = line.as_bytes().to_vec();
    wire.extend_from_slice(LINE_END);
    link.write_all(&wire)?;

    let reply = read_prompt(link, timeout)?;
    let body = strip_reply(&reply, line.as_bytes());

    match memmem::find(body, TRACEBACK) {
        Some(at) => {
            result.stdout.extend_from_slice(&body[..at]);
            result.stderr.extend_from_slice(&body[at..]);
        }
        None => result.stdout.extend_from_slice(body),
    }
    Ok(reply.ends_with(CONTINUATION))
}

/// Drop the echoed command and the trailing prompt from a reply.
fn strip_reply<'a>(reply: &'a [u8], echoed: &[u8]) -> &'a [u8] {
    let end = match reply.strip_suffix(CONTINUATION) {
        Some(rest) => rest.len(),
        None => memmem::rfind(reply, PROMPT).unwrap_or(reply.len()),
    };
    let mut body = &reply[..end];
    if body.starts_with(echoed) {
        body = &body[echoed.len()..];
        for prefix in [&b"\r\n"[..], &b"\n"[..]] {
            if let Some(rest) = body.strip_prefix(prefix) {
                body = rest;
                break;
            }
        }
    }
    body
}
