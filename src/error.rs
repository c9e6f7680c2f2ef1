//! Crate-wide error taxonomy.
//!
//! Device-level failures are recoverable and end up as a titled message in
//! the view; only [`LinkError::UnsupportedPlatform`] has no fallback.

use crate::config::ConfigError;
use crate::port::PortError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type LinkResult<T> = Result<T, LinkError>;

/// Step of the reboot handshake that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Interrupt,
    AwaitPrompt,
    EnterPaste,
    SendReset,
    EndPaste,
    AwaitReady,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Interrupt => "interrupt",
            Self::AwaitPrompt => "await prompt",
            Self::EnterPaste => "enter paste mode",
            Self::SendReset => "send reset",
            Self::EndPaste => "end paste mode",
            Self::AwaitReady => "await ready marker",
        };
        f.write_str(text)
    }
}

/// Errors surfaced by discovery, sessions, the protocol engine and modes.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No port matched the board table.
    #[error("Could not find an attached device.")]
    DeviceNotFound,

    /// The port could not be opened.
    #[error("Cannot connect to device on port {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: PortError,
    },

    /// A `read_until` deadline elapsed before the token showed up.
    #[error("Timed out after {after:?} waiting for {token:?}")]
    Timeout { token: String, after: Duration },

    /// The device reported an error in its captured output.
    #[error("Device reported an error: {output}")]
    Protocol { output: String },

    /// Port paths cannot be derived on this operating system.
    #[error("OS \"{0}\" not supported.")]
    UnsupportedPlatform(String),

    /// The reboot handshake was aborted.
    #[error("Reboot failed at step '{step}': {source}")]
    Reboot {
        step: HandshakeStep,
        #[source]
        source: Box<LinkError>,
    },

    /// Another consumer holds the serial connection.
    #[error("{0}")]
    Busy(String),

    /// A port operation failed after the session was established.
    #[error("Serial port failure: {0}")]
    Port(#[from] PortError),

    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LinkError {
    /// Build a protocol error from raw device bytes.
    pub fn protocol(output: &[u8]) -> Self {
        Self::Protocol {
            output: String::from_utf8_lossy(output).into_owned(),
        }
    }

    /// Build a timeout error for `token`.
    pub fn timeout(token: &[u8], after: Duration) -> Self {
        Self::Timeout {
            token: String::from_utf8_lossy(token).into_owned(),
            after,
        }
    }

    /// True for a timeout, including one wrapped by the reboot handshake.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Reboot { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Title and actionable detail for the view.
    pub fn user_message(&self) -> (String, String) {
        match self {
            Self::DeviceNotFound | Self::Connection { .. } => (
                NOT_FOUND_TITLE.to_string(),
                NOT_FOUND_DETAIL.to_string(),
            ),
            Self::Timeout { .. } | Self::Reboot { .. } => (
                "Reboot Error".to_string(),
                RECONNECT_DETAIL.to_string(),
            ),
            Self::Protocol { output } => ("Device Error".to_string(), output.clone()),
            Self::UnsupportedPlatform(os) => (
                "Unsupported platform".to_string(),
                format!("Serial devices cannot be located on {os}."),
            ),
            Self::Busy(title) => (title.clone(), BUSY_DETAIL.to_string()),
            Self::Port(_) | Self::Io(_) => (
                "Communication Error".to_string(),
                RECONNECT_DETAIL.to_string(),
            ),
            Self::Config(e) => ("Configuration Error".to_string(), e.to_string()),
        }
    }
}

pub(crate) const NOT_FOUND_TITLE: &str = "Could not find an attached device.";

pub(crate) const NOT_FOUND_DETAIL: &str = "Please make sure the device is plugged into this \
computer.\n\nIt must have a version of MicroPython (or CircuitPython) flashed onto it before \
the REPL will work.\n\nFinally, press the device's reset button and wait a few seconds before \
trying again.";

pub(crate) const RECONNECT_DETAIL: &str = "Please connect the USB cable again.";

pub(crate) const BUSY_DETAIL: &str = "The REPL, plotter and file system use the same USB serial \
connection. Only one can be active at any time. Toggle the other one off and try again.";
