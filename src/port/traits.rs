//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets the session and protocol layers drive either a
//! real board or a scripted mock. `PortOpener` is the seam through which
//! sessions are created, so the DTR fallback path can be exercised in tests.

use super::error::PortError;
use std::time::Duration;

/// Baud rate every supported board runs its REPL at.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Parameters used when a port is opened. Framing is always 8N1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// How long a single read may wait for data.
    pub timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(1000),
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Reads block for at most the configured timeout and report
/// [`PortError::Timeout`] when no byte arrived in that window.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Block until everything written so far has left the host buffer.
    fn flush(&mut self) -> Result<(), PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read/write timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Change the baud rate of an open port.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError>;

    /// Drive the DTR control line.
    ///
    /// An error means the assertion could not be confirmed on this host.
    fn set_data_terminal_ready(&mut self, level: bool) -> Result<(), PortError>;

    /// Discard any unread input and unsent output.
    fn clear_buffers(&mut self) -> Result<(), PortError>;
}

/// Factory for open ports.
pub trait PortOpener: Send + Sync + std::fmt::Debug {
    /// Open `path` read-write with the given settings.
    fn open(
        &self,
        path: &str,
        settings: PortSettings,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;

    /// Open `path` through the low-level builder purely to raise DTR, then
    /// close it again.
    fn raise_dtr(&self, path: &str) -> Result<(), PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PortSettings::default();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.timeout, Duration::from_secs(1));
    }
}
