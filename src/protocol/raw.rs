//! Raw REPL dialect.
//!
//! After Ctrl-A the board stops echoing and answers each Ctrl-D-terminated
//! submission with `OK<stdout>\x04<stderr>\x04>`. File transfer and the
//! configuration commands ride on this because it separates the two
//! output streams.

use super::{read_until, ProtocolResult, CTRL_A, CTRL_B, CTRL_C, CTRL_D};
use crate::error::{LinkError, LinkResult};
use crate::session::SerialSession;
use memchr::memmem;
use tracing::debug;

/// Banner printed on entering raw mode.
pub const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";

/// End of one raw submission's reply.
pub const RAW_END: &[u8] = b"\x04>";

/// Interrupt whatever is running and switch to raw mode.
pub fn enter(link: &mut SerialSession) -> LinkResult<()> {
    link.write_all(&[b'\r', CTRL_C])?;
    link.settle();
    link.write_all(&[CTRL_C])?;
    link.settle();
    link.write_all(&[b'\r', CTRL_A])?;
    let timeout = link.config().request_timeout();
    read_until(link, RAW_BANNER, timeout)?;
    debug!("Entered raw REPL on {}", link.port_path());
    Ok(())
}

/// Return to the friendly REPL.
pub fn exit(link: &mut SerialSession) -> LinkResult<()> {
    link.write_all(&[CTRL_B])
}

/// Submit one command and split its reply.
pub fn submit(link: &mut SerialSession, command: &str) -> LinkResult<ProtocolResult> {
    let chunk_size = link.config().write_chunk_size.max(1);
    for chunk in command.as_bytes().chunks(chunk_size) {
        link.write_all(chunk)?;
        link.settle();
    }
    link.write_all(&[CTRL_D])?;

    let timeout = link.config().request_timeout();
    let reply = read_until(link, RAW_END, timeout)?;
    split_reply(&reply)
}

/// Run `commands` in order inside raw mode, stopping at the first one that
/// writes to stderr. Raw mode is left again even when a command fails.
pub fn execute<S: AsRef<str>>(
    link: &mut SerialSession,
    commands: &[S],
) -> LinkResult<ProtocolResult> {
    enter(link)?;

    let mut result = ProtocolResult::default();
    let mut outcome = Ok(());
    for command in commands {
        match submit(link, command.as_ref()) {
            Ok(reply) => {
                result.stdout.extend_from_slice(&reply.stdout);
                if !reply.stderr.is_empty() {
                    result.stderr = reply.stderr;
                    break;
                }
            }
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    let left = exit(link);
    outcome?;
    left?;
    Ok(result)
}

/// Split `OK<stdout>\x04<stderr>\x04>` into its two streams.
pub fn split_reply(reply: &[u8]) -> LinkResult<ProtocolResult> {
    let start = memmem::find(reply, b"OK").ok_or_else(|| LinkError::protocol(reply))?;
    let end = memmem::rfind(reply, RAW_END).ok_or_else(|| LinkError::protocol(reply))?;
    if end < start + 2 {
        return Err(LinkError::protocol(reply));
    }
    let body = &reply[start + 2..end];

    let (stdout, stderr) = match memchr::memchr(CTRL_D, body) {
        Some(at) => (&body[..at], &body[at + 1..]),
        None => (body, &b""[..]),
    };
    Ok(ProtocolResult {
        stdout: stdout.to_vec(),
        stderr: stderr.to_vec(),
    })
}
