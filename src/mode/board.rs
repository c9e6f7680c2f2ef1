//! Board capabilities.
//!
//! The controller only talks to boards through [`Board`]; the two concrete
//! boards differ in their USB table, listing shape, ready marker and
//! whether they have script slots.

use crate::config::SerialConfig;
use crate::discovery::{
    self, BoardDescriptor, DeviceHandle, PortScanner, Platform, SystemPortScanner,
    MICROPYTHON_BOARDS, STUDUINOBIT_BOARDS,
};
use crate::error::LinkResult;
use crate::fs::{FileManager, FsEvent, Listing};
use crate::handshake;
use crate::port::{PortOpener, SystemPortOpener};
use crate::session::SerialSession;
use std::ops::RangeInclusive;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Host-facing pieces a board needs: where ports come from and how they open.
#[derive(Debug, Clone)]
pub struct Hardware {
    pub scanner: Arc<dyn PortScanner>,
    pub opener: Arc<dyn PortOpener>,
    pub platform: Platform,
}

impl Hardware {
    /// Real ports on the current host.
    pub fn system() -> Self {
        Self {
            scanner: Arc::new(SystemPortScanner),
            opener: Arc::new(SystemPortOpener),
            platform: Platform::current(),
        }
    }

    pub fn new(
        scanner: Arc<dyn PortScanner>,
        opener: Arc<dyn PortOpener>,
        platform: Platform,
    ) -> Self {
        Self {
            scanner,
            opener,
            platform,
        }
    }
}

/// A family of boards the controller can drive.
pub trait Board: Send + Sync + std::fmt::Debug {
    /// Display name handed to the view.
    fn name(&self) -> &'static str;

    /// USB identities recognised as this board.
    fn valid_boards(&self) -> &'static [BoardDescriptor];

    fn listing(&self) -> Listing;

    /// Text printed once a reset has finished, if the board has one.
    fn ready_marker(&self) -> Option<&'static [u8]> {
        None
    }

    /// Whether the REPL should interrupt the running script on connect.
    fn force_interrupt(&self) -> bool {
        true
    }

    /// Script slots that can be selected as the boot target.
    fn slots(&self) -> Option<RangeInclusive<u8>> {
        None
    }

    fn find_device(
        &self,
        hardware: &Hardware,
        with_logging: bool,
    ) -> LinkResult<Option<DeviceHandle>> {
        discovery::find_device(
            self.valid_boards(),
            hardware.scanner.as_ref(),
            hardware.platform,
            with_logging,
        )
    }

    fn open_session(
        &self,
        hardware: &Hardware,
        port_path: &str,
        config: &SerialConfig,
    ) -> LinkResult<SerialSession> {
        SerialSession::open(hardware.opener.as_ref(), port_path, config)
    }

    /// Bring the board to the prompt, resetting it first when it has a
    /// ready marker.
    fn reboot_handshake(&self, link: &mut SerialSession) -> LinkResult<()> {
        match self.ready_marker() {
            Some(marker) => handshake::reboot_and_prompt(link, marker),
            None => handshake::interrupt(link),
        }
    }

    fn file_manager(
        &self,
        hardware: &Hardware,
        port_path: &str,
        config: &SerialConfig,
        events: Sender<FsEvent>,
    ) -> FileManager {
        FileManager::start(port_path, Arc::clone(&hardware.opener), self.listing(), config, events)
    }
}

/// Generic MicroPython boards (micro:bit, Adafruit M0 family).
#[derive(Debug, Default, Clone, Copy)]
pub struct MicroPythonBoard;

impl Board for MicroPythonBoard {
    fn name(&self) -> &'static str {
        "MicroPython"
    }

    fn valid_boards(&self) -> &'static [BoardDescriptor] {
        MICROPYTHON_BOARDS
    }

    fn listing(&self) -> Listing {
        Listing::Flat
    }
}

/// Marker the Studuino:bit firmware prints after a reset.
pub const STUDUINOBIT_READY: &[u8] = b"Execute last selected script.";

/// Slot reserved for scripts started from the editor's Run action.
pub const RUN_SLOT: u8 = 99;

/// Artec Studuino:bit.
#[derive(Debug, Default, Clone, Copy)]
pub struct StuduinoBit;

impl Board for StuduinoBit {
    fn name(&self) -> &'static str {
        "Studuino:bit MicroPython"
    }

    fn valid_boards(&self) -> &'static [BoardDescriptor] {
        STUDUINOBIT_BOARDS
    }

    fn listing(&self) -> Listing {
        Listing::Tree
    }

    fn ready_marker(&self) -> Option<&'static [u8]> {
        Some(STUDUINOBIT_READY)
    }

    fn slots(&self) -> Option<RangeInclusive<u8>> {
        Some(0..=9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{FixedPortScanner, PortInfo};
    use crate::port::{MockPortOpener, MockSerialPort};

    fn hardware(ports: Vec<PortInfo>) -> Hardware {
        Hardware::new(
            Arc::new(FixedPortScanner::new(ports)),
            Arc::new(MockPortOpener::new(MockSerialPort::new("ttyACM0"))),
            Platform::Posix,
        )
    }

    #[test]
    fn test_boards_only_see_their_own_devices() {
        let hw = hardware(vec![PortInfo::usb("ttyACM0", 0x20A0, 0x4269)]);

        let found = StuduinoBit.find_device(&hw, false).unwrap().unwrap();
        assert_eq!(found.port_path, "/dev/ttyACM0");
        assert!(MicroPythonBoard.find_device(&hw, false).unwrap().is_none());
    }

    #[test]
    fn test_capabilities() {
        assert_eq!(StuduinoBit.listing(), Listing::Tree);
        assert_eq!(StuduinoBit.slots(), Some(0..=9));
        assert_eq!(MicroPythonBoard.listing(), Listing::Flat);
        assert!(MicroPythonBoard.ready_marker().is_none());
        assert!(MicroPythonBoard.slots().is_none());
    }
}
