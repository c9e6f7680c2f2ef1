//! Mu device link library
//!
//! Talks to MicroPython boards over USB serial: finds the board, opens and
//! configures the port, speaks the REPL protocol, resets the board into a
//! known state and moves files without blocking the caller's thread.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `error`: Unified error handling
//! - `logging`: tracing subscriber setup
//! - `port`: Port abstraction layer for serial communication
//! - `discovery`: Locating boards by USB vendor/product id
//! - `session`: Open/close lifecycle of one serial connection
//! - `protocol`: Friendly and raw REPL command exchange
//! - `handshake`: Reboot-and-prompt sequence
//! - `fs`: Device filesystem primitives and the background file manager
//! - `mode`: Board modes, presence polling and script transfer
//! - `wifi`: Wi-Fi station helpers

pub mod config;
pub mod discovery;
pub mod error;
pub mod fs;
pub mod handshake;
pub mod logging;
pub mod mode;
pub mod port;
pub mod protocol;
pub mod session;
pub mod wifi;

// Re-export commonly used types for convenience
pub use discovery::{find_device, BoardDescriptor, DeviceHandle, Platform, PortInfo, PortScanner};
pub use error::{HandshakeStep, LinkError, LinkResult};
pub use fs::{FileEntry, FileManager, FileManagerHandle, FsEvent, FsRequest, Listing};
pub use mode::{Board, Hardware, ModeController, ModeState, View};
pub use port::{MockPortOpener, MockSerialPort, PortError, PortOpener, SerialPortAdapter};
pub use protocol::ProtocolResult;
pub use session::SerialSession;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
