//! Device Locator.
//!
//! Enumerates serial ports, matches their USB identity against a board
//! table and turns the first hit into a platform-specific port path. When
//! several boards are attached the first one in enumeration order wins.

pub mod boards;

pub use boards::{BoardDescriptor, MICROPYTHON_BOARDS, STUDUINOBIT_BOARDS};

use crate::error::{LinkError, LinkResult};
use crate::port::PortError;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// A port as reported by the host. Non-USB ports report 0 for both ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Bare port name, e.g. `ttyACM0` or `COM3`.
    pub port_name: String,
    pub vid: u16,
    pub pid: u16,
    pub serial_number: Option<String>,
}

impl PortInfo {
    pub fn usb(port_name: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            port_name: port_name.into(),
            vid,
            pid,
            serial_number: None,
        }
    }
}

/// A located board, ready to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub port_path: String,
    pub serial_number: Option<String>,
}

/// Source of the host's serial port list.
pub trait PortScanner: Send + Sync + std::fmt::Debug {
    fn scan(&self) -> Result<Vec<PortInfo>, PortError>;
}

/// Scans through `serialport::available_ports`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortScanner;

impl PortScanner for SystemPortScanner {
    fn scan(&self) -> Result<Vec<PortInfo>, PortError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| {
                let port_name = p
                    .port_name
                    .strip_prefix("/dev/")
                    .map(str::to_string)
                    .unwrap_or(p.port_name);
                match p.port_type {
                    serialport::SerialPortType::UsbPort(usb) => PortInfo {
                        port_name,
                        vid: usb.vid,
                        pid: usb.pid,
                        serial_number: usb.serial_number,
                    },
                    _ => PortInfo {
                        port_name,
                        vid: 0,
                        pid: 0,
                        serial_number: None,
                    },
                }
            })
            .collect())
    }
}

/// Scanner returning a list the caller controls; used to simulate plugging
/// and unplugging boards.
#[derive(Debug, Default)]
pub struct FixedPortScanner {
    ports: Mutex<Vec<PortInfo>>,
}

impl FixedPortScanner {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self {
            ports: Mutex::new(ports),
        }
    }

    pub fn set_ports(&self, ports: Vec<PortInfo>) {
        *self.ports.lock() = ports;
    }
}

impl PortScanner for FixedPortScanner {
    fn scan(&self) -> Result<Vec<PortInfo>, PortError> {
        Ok(self.ports.lock().clone())
    }
}

/// Host family, as far as port naming is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
    Other(&'static str),
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(unix) {
            Self::Posix
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other(std::env::consts::OS)
        }
    }
}

/// Turn a bare port name into something `open` accepts.
pub fn port_path(platform: Platform, port_name: &str) -> LinkResult<String> {
    match platform {
        Platform::Posix => Ok(format!("/dev/{}", port_name)),
        Platform::Windows => Ok(port_name.to_string()),
        Platform::Other(os) => Err(LinkError::UnsupportedPlatform(os.to_string())),
    }
}

/// First port in `ports` whose identity is in `boards`.
pub fn first_match<'a>(boards: &[BoardDescriptor], ports: &'a [PortInfo]) -> Option<&'a PortInfo> {
    ports
        .iter()
        .find(|p| boards.iter().any(|b| b.matches(p.vid, p.pid)))
}

/// Locate the first attached board from `boards`.
///
/// Absence is `Ok(None)`. A failing enumeration is logged and treated as an
/// empty port list.
pub fn find_device(
    boards: &[BoardDescriptor],
    scanner: &dyn PortScanner,
    platform: Platform,
    with_logging: bool,
) -> LinkResult<Option<DeviceHandle>> {
    let ports = scanner.scan().unwrap_or_else(|e| {
        warn!("Could not enumerate serial ports: {}", e);
        Vec::new()
    });

    if let Some(port) = first_match(boards, &ports) {
        if with_logging {
            info!("Found device on port: {}", port.port_name);
            info!("Serial number: {:?}", port.serial_number);
        }
        return Ok(Some(DeviceHandle {
            port_path: port_path(platform, &port.port_name)?,
            serial_number: port.serial_number.clone(),
        }));
    }

    if with_logging {
        warn!("Could not find device.");
        let listing: Vec<String> = ports
            .iter()
            .map(|p| format!("PID:0x{:04x} VID:0x{:04x} PORT:{}", p.pid, p.vid, p.port_name))
            .collect();
        debug!("Available ports: {:?}", listing);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_path_per_platform() {
        assert_eq!(port_path(Platform::Posix, "ttyACM0").unwrap(), "/dev/ttyACM0");
        assert_eq!(port_path(Platform::Windows, "COM3").unwrap(), "COM3");
        assert!(matches!(
            port_path(Platform::Other("plan9"), "eia0"),
            Err(LinkError::UnsupportedPlatform(os)) if os == "plan9"
        ));
    }

    #[test]
    fn test_first_match_skips_unknown_ports() {
        let ports = vec![
            PortInfo::usb("ttyS0", 0, 0),
            PortInfo::usb("ttyUSB0", 0x10C4, 0xEA60),
            PortInfo::usb("ttyACM1", 0x0D28, 0x0204),
        ];
        let hit = first_match(MICROPYTHON_BOARDS, &ports).unwrap();
        assert_eq!(hit.port_name, "ttyACM1");
    }

    #[test]
    fn test_unsupported_platform_fails_loudly() {
        let scanner = FixedPortScanner::new(vec![PortInfo::usb("eia0", 0x20A0, 0x4269)]);
        let result = find_device(STUDUINOBIT_BOARDS, &scanner, Platform::Other("plan9"), false);
        assert!(matches!(result, Err(LinkError::UnsupportedPlatform(_))));
    }

    #[test]
    fn test_serial_number_is_carried() {
        let mut port = PortInfo::usb("ttyACM0", 0x0D28, 0x0204);
        port.serial_number = Some("9900000012345".to_string());
        let scanner = FixedPortScanner::new(vec![port]);

        let handle = find_device(MICROPYTHON_BOARDS, &scanner, Platform::Posix, true)
            .unwrap()
            .unwrap();
        assert_eq!(handle.serial_number.as_deref(), Some("9900000012345"));
    }
}
