//! Board modes.
//!
//! A [`ModeController`] drives one [`Board`] on behalf of a [`View`]:
//! starting and stopping the REPL, plotter and file system, watching for
//! the board being unplugged, and transferring scripts into slots.
//!
//! ```no_run
//! use mu_link::config::Config;
//! use mu_link::mode::{Hardware, ModeController, StuduinoBit, View};
//! # fn demo<V: View>(view: V) {
//! let mut mode = ModeController::new(
//!     std::sync::Arc::new(StuduinoBit),
//!     Hardware::system(),
//!     Config::default(),
//!     view,
//! );
//! mode.toggle_repl();
//! mode.process_events();
//! # }
//! ```

pub mod board;
pub mod controller;
pub mod flash;
pub mod poll;
pub mod view;

pub use board::{Board, Hardware, MicroPythonBoard, StuduinoBit, RUN_SLOT, STUDUINOBIT_READY};
pub use controller::{ModeController, ModeEvent, ModeState};
pub use flash::{record_slot, save_script, staging_path, FlashOutcome, InitStep, TransferStep};
pub use poll::PresencePoll;
pub use view::{ScriptTab, Tab, View};
