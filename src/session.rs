//! Serial Session.
//!
//! One open connection to a board. Opening asserts DTR and, where the host
//! ignores that request, falls back to raising DTR through a throwaway
//! low-level handle before reopening. The baud rate is applied once DTR is
//! settled, then anything the board printed before we arrived is dropped.
//!
//! A session does not stop a second one being opened on the same port;
//! keeping at most one open per mode is the controller's job.

use crate::config::SerialConfig;
use crate::error::{LinkError, LinkResult};
use crate::port::{PortError, PortOpener, PortSettings, SerialPortAdapter};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An open (or closed) link to one port.
#[derive(Debug)]
pub struct SerialSession {
    port: Option<Box<dyn SerialPortAdapter>>,
    port_path: String,
    config: SerialConfig,
}

impl SerialSession {
    /// Open `port_path` and bring it to the configured baud rate.
    pub fn open(
        opener: &dyn PortOpener,
        port_path: &str,
        config: &SerialConfig,
    ) -> LinkResult<Self> {
        let settings = PortSettings {
            baud_rate: config.baud_rate,
            timeout: config.poll_timeout(),
        };
        let connection_error = |source: PortError| LinkError::Connection {
            port: port_path.to_string(),
            source,
        };

        let mut port = opener.open(port_path, settings).map_err(connection_error)?;

        if let Err(e) = port.set_data_terminal_ready(true) {
            warn!("DTR not asserted on {} ({}); retrying through a raw handle", port_path, e);
            drop(port);
            opener.raise_dtr(port_path).map_err(connection_error)?;
            port = opener.open(port_path, settings).map_err(connection_error)?;
        }

        port.set_baud_rate(config.baud_rate).map_err(connection_error)?;
        port.clear_buffers().map_err(connection_error)?;

        info!("Opened serial link on {} at {} baud", port_path, config.baud_rate);
        Ok(Self {
            port: Some(port),
            port_path: port_path.to_string(),
            config: config.clone(),
        })
    }

    /// Wrap an already-open adapter, skipping the DTR dance.
    pub fn from_adapter(port: Box<dyn SerialPortAdapter>, config: &SerialConfig) -> Self {
        Self {
            port_path: port.name().to_string(),
            port: Some(port),
            config: config.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    /// Timing used by the protocol layer on this link.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Close the link. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial link on {}", self.port_path);
        }
    }

    pub(crate) fn port_mut(&mut self) -> LinkResult<&mut dyn SerialPortAdapter> {
        match self.port.as_mut() {
            Some(port) => Ok(port.as_mut()),
            None => Err(LinkError::Port(PortError::NotOpen)),
        }
    }

    /// Write all of `data` and wait for it to drain.
    pub fn write_all(&mut self, data: &[u8]) -> LinkResult<()> {
        let port = self.port_mut()?;
        let mut sent = 0;
        while sent < data.len() {
            let n = port.write_bytes(&data[sent..])?;
            if n == 0 {
                return Err(LinkError::Port(PortError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "port accepted no bytes",
                ))));
            }
            sent += n;
        }
        port.flush()?;
        Ok(())
    }

    /// Sleep for the configured settle delay.
    pub(crate) fn settle(&self) {
        let delay = self.config.settle_delay();
        if delay > Duration::ZERO {
            std::thread::sleep(delay);
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Close an optional session; `None` is fine.
pub fn close_link(link: &mut Option<SerialSession>) {
    if let Some(mut session) = link.take() {
        session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockPortOpener, MockSerialPort};

    fn config() -> SerialConfig {
        SerialConfig {
            settle_delay_ms: 0,
            ..SerialConfig::default()
        }
    }

    #[test]
    fn test_open_asserts_dtr_and_sets_baud() {
        let port = MockSerialPort::new("ttyACM0");
        let opener = MockPortOpener::new(port.clone());

        let session = SerialSession::open(&opener, "/dev/ttyACM0", &config()).unwrap();

        assert!(session.is_open());
        assert!(port.dtr());
        assert_eq!(port.baud_rate(), 115_200);
        assert!(port.was_cleared());
        assert!(opener.dtr_raises().is_empty());
        assert_eq!(opener.opened_paths().len(), 1);
    }

    #[test]
    fn test_stuck_dtr_falls_back_to_raw_handle() {
        let mut port = MockSerialPort::new("COM4");
        port.set_dtr_stuck(true);
        let opener = MockPortOpener::new(port.clone());

        let session = SerialSession::open(&opener, "COM4", &config()).unwrap();

        assert!(session.is_open());
        assert!(port.dtr());
        assert_eq!(opener.dtr_raises(), vec!["COM4".to_string()]);
        assert_eq!(opener.opened_paths().len(), 2);
        assert_eq!(port.baud_rate(), 115_200);
    }

    #[test]
    fn test_open_failure_carries_port_path() {
        let opener = MockPortOpener::new(MockSerialPort::new("ttyACM0"));
        opener.set_refuse(true);

        match SerialSession::open(&opener, "/dev/ttyACM0", &config()) {
            Err(LinkError::Connection { port, .. }) => assert_eq!(port, "/dev/ttyACM0"),
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let opener = MockPortOpener::new(MockSerialPort::new("ttyACM0"));
        let mut session = SerialSession::open(&opener, "/dev/ttyACM0", &config()).unwrap();

        session.close();
        session.close();
        assert!(!session.is_open());
        assert!(matches!(
            session.write_all(b"x"),
            Err(LinkError::Port(PortError::NotOpen))
        ));

        let mut none: Option<SerialSession> = None;
        close_link(&mut none);
    }
}
