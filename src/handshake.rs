//! Reboot Handshake.
//!
//! A fixed sequence: interrupt, wait for the prompt, paste a soft reset,
//! wait for the board's ready marker. Any failure aborts the sequence and
//! is reported as [`LinkError::Reboot`] naming the step. Nothing is retried
//! and the session is left open for the caller to close.

use crate::error::{HandshakeStep, LinkError, LinkResult};
use crate::protocol::{read_until, CTRL_A, CTRL_C, CTRL_D, PROMPT};
use crate::session::SerialSession;
use tracing::{debug, info};

/// Line that imports the reset function.
pub const IMPORT_MACHINE: &[u8] = b"import machine\r\n";

/// Line that resets the board.
pub const MACHINE_RESET: &[u8] = b"machine.reset()\r\n";

fn step<T>(step: HandshakeStep, result: LinkResult<T>) -> LinkResult<T> {
    result.map_err(|source| {
        debug!("Handshake aborted at '{}': {}", step, source);
        LinkError::Reboot {
            step,
            source: Box::new(source),
        }
    })
}

/// Soft-reset the board and wait until it prints `ready_marker`.
pub fn reboot(link: &mut SerialSession, ready_marker: &[u8]) -> LinkResult<()> {
    let timeout = link.config().request_timeout();

    step(HandshakeStep::Interrupt, link.write_all(&[CTRL_C]))?;
    step(HandshakeStep::AwaitPrompt, read_until(link, PROMPT, timeout))?;

    step(HandshakeStep::EnterPaste, link.write_all(&[CTRL_A]))?;
    step(HandshakeStep::SendReset, link.write_all(IMPORT_MACHINE))?;
    link.settle();
    step(HandshakeStep::SendReset, link.write_all(MACHINE_RESET))?;
    link.settle();
    step(HandshakeStep::EndPaste, link.write_all(&[CTRL_D]))?;

    step(HandshakeStep::AwaitReady, read_until(link, ready_marker, timeout))?;
    info!("Board on {} rebooted", link.port_path());
    Ok(())
}

/// Stop the running program and wait for the prompt, without a reset.
pub fn interrupt(link: &mut SerialSession) -> LinkResult<()> {
    let timeout = link.config().request_timeout();
    step(HandshakeStep::Interrupt, link.write_all(&[CTRL_C]))?;
    step(HandshakeStep::AwaitPrompt, read_until(link, PROMPT, timeout))?;
    Ok(())
}

/// [`reboot`], then interrupt the freshly started script and wait for the
/// prompt so the next command batch can be sent.
pub fn reboot_and_prompt(link: &mut SerialSession, ready_marker: &[u8]) -> LinkResult<()> {
    reboot(link, ready_marker)?;
    interrupt(link)?;
    debug!("Board on {} is at the prompt", link.port_path());
    Ok(())
}
