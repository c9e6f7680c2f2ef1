//! Mode Orchestrator.
//!
//! Decides which consumer owns the board's single serial connection. The
//! REPL and plotter share one session held here; the file system runs its
//! own session on the file manager's worker and excludes both.

use super::board::{Board, Hardware};
use super::poll::PresencePoll;
use super::view::View;
use crate::config::Config;
use crate::error::{LinkError, LinkResult, NOT_FOUND_DETAIL, NOT_FOUND_TITLE};
use crate::fs::FileManager;
use crate::session::{close_link, SerialSession};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::{error, info, warn};

const REPL_FS_TITLE: &str = "REPL and file system cannot work at the same time.";
const REPL_FS_DETAIL: &str = "The REPL and file system both use the same USB serial connection. \
Only one can be active at any time. Toggle the file system off and try again.";

const PLOTTER_FS_TITLE: &str = "The plotter and file system cannot work at the same time.";
const PLOTTER_FS_DETAIL: &str = "The plotter and file system both use the same USB serial \
connection. Only one can be active at any time. Toggle the file system off and try again.";

const FS_TITLE: &str = "File system cannot work at the same time as the REPL or plotter.";
const FS_DETAIL: &str = "The file system and the REPL and plotter use the same USB serial \
connection. Toggle the REPL and plotter off and try again.";

const RESET_HINT: &str =
    "Click on the device's reset button, wait a few seconds and then try again.";

const FLOOD_TITLE: &str = "Data Flood Detected!";
const FLOOD_DETAIL: &str = "The plotter is flooded with data which will make Mu unresponsive \
and freeze. As a safeguard, the plotter has been stopped.\n\nFlooding is when chunks of data of \
more than 1024 bytes are repeatedly sent to the plotter.\n\nTo fix this, make sure your code \
prints small tuples of data between calls to 'sleep' for a very short period of time.";

/// Events delivered to the controller from other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Time to check the board is still attached.
    PresenceTick,
    /// The plotter is receiving more than it can draw.
    DataFlood,
}

/// Who holds the serial connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Idle,
    Repl,
    Plotter,
    ReplAndPlotter,
    Filesystem,
}

/// Runs one board's REPL, plotter, file system and transfer actions.
pub struct ModeController<V: View> {
    pub(super) board: Arc<dyn Board>,
    pub(super) hardware: Hardware,
    pub(super) config: Config,
    pub(super) view: V,
    pub(super) link: Option<SerialSession>,
    pub(super) repl: bool,
    pub(super) plotter: bool,
    fs: Option<FileManager>,
    poll: Option<PresencePoll>,
    events_tx: Sender<ModeEvent>,
    events: Receiver<ModeEvent>,
}

impl<V: View> ModeController<V> {
    pub fn new(board: Arc<dyn Board>, hardware: Hardware, config: Config, view: V) -> Self {
        let (events_tx, events) = mpsc::channel();
        Self {
            board,
            hardware,
            config,
            view,
            link: None,
            repl: false,
            plotter: false,
            fs: None,
            poll: None,
            events_tx,
            events,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn board(&self) -> &dyn Board {
        self.board.as_ref()
    }

    pub fn state(&self) -> ModeState {
        match (self.fs.is_some(), self.repl, self.plotter) {
            (true, _, _) => ModeState::Filesystem,
            (false, true, true) => ModeState::ReplAndPlotter,
            (false, true, false) => ModeState::Repl,
            (false, false, true) => ModeState::Plotter,
            (false, false, false) => ModeState::Idle,
        }
    }

    /// The session shared by the REPL and plotter, while either is active.
    pub fn link_mut(&mut self) -> Option<&mut SerialSession> {
        self.link.as_mut()
    }

    /// Sender for events raised outside the controller, e.g. a plotter flood.
    pub fn events(&self) -> Sender<ModeEvent> {
        self.events_tx.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().map_or(false, PresencePoll::is_running)
    }

    /// Handle every queued event. Call from the UI loop.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            match event {
                ModeEvent::PresenceTick => self.check_presence(),
                ModeEvent::DataFlood => self.on_data_flood(),
            }
            handled += 1;
        }
        handled
    }

    pub fn toggle_repl(&mut self) {
        if self.fs.is_some() {
            self.view.show_message(REPL_FS_TITLE, REPL_FS_DETAIL);
            return;
        }
        if self.repl {
            self.remove_repl();
            info!("Toggle REPL off.");
        } else {
            self.add_repl();
            info!("Toggle REPL on.");
        }
    }

    pub fn toggle_plotter(&mut self) {
        if self.fs.is_some() {
            self.view.show_message(PLOTTER_FS_TITLE, PLOTTER_FS_DETAIL);
            return;
        }
        if self.plotter {
            self.remove_plotter();
            info!("Toggle plotter off.");
        } else {
            self.add_plotter();
            info!("Toggle plotter on.");
        }
    }

    pub fn toggle_files(&mut self) {
        if self.repl || self.plotter {
            self.view.show_message(FS_TITLE, FS_DETAIL);
            return;
        }
        if self.fs.is_some() {
            self.remove_fs();
            info!("Toggle filesystem off.");
        } else {
            self.add_fs();
            if self.fs.is_some() {
                info!("Toggle filesystem on.");
            }
        }
    }

    fn add_repl(&mut self) {
        let Some(port_path) = self.locate() else {
            return;
        };
        if let Err(e) = self.ensure_link(&port_path) {
            error!("{}", e);
            self.view.show_message(&connect_title(&port_path), RESET_HINT);
            return;
        }
        self.view
            .add_repl(&port_path, self.board.name(), self.board.force_interrupt());
        self.repl = true;
        info!("Started REPL on port: {}", port_path);
        self.start_poll();
    }

    fn remove_repl(&mut self) {
        self.view.remove_repl();
        self.repl = false;
        self.release_link();
    }

    fn add_plotter(&mut self) {
        let Some(port_path) = self.locate() else {
            return;
        };
        if let Err(e) = self.ensure_link(&port_path) {
            error!("{}", e);
            self.view.show_message(&connect_title(&port_path), RESET_HINT);
            return;
        }
        self.view.add_plotter(&port_path, self.board.name());
        self.plotter = true;
        info!("Started plotter");
        self.start_poll();
    }

    fn remove_plotter(&mut self) {
        self.view.remove_plotter();
        self.plotter = false;
        self.release_link();
    }

    fn add_fs(&mut self) {
        let Some(port_path) = self.locate() else {
            return;
        };
        let workspace = self
            .config
            .workspace
            .workspace_dir()
            .unwrap_or_else(|| PathBuf::from(&self.config.workspace.name));

        let (tx, rx) = mpsc::channel();
        let manager = self
            .board
            .file_manager(&self.hardware, &port_path, &self.config.serial, tx);
        self.view.add_filesystem(&workspace, manager.handle(), rx);
        self.fs = Some(manager);
    }

    fn remove_fs(&mut self) {
        self.view.remove_filesystem();
        if let Some(mut manager) = self.fs.take() {
            manager.stop();
        }
    }

    /// Re-run discovery; drop the REPL and plotter when the board is gone.
    pub fn check_presence(&mut self) {
        if !(self.repl || self.plotter) {
            self.stop_poll();
            return;
        }
        if let Ok(Some(_)) = self.board.find_device(&self.hardware, false) {
            return;
        }

        warn!("Device no longer attached");
        self.stop_poll();
        if self.repl {
            self.remove_repl();
        }
        if self.plotter {
            self.remove_plotter();
        }
        close_link(&mut self.link);
        self.view.show_message(NOT_FOUND_TITLE, NOT_FOUND_DETAIL);
    }

    /// Stop the REPL and plotter after the plotter reports a flood.
    pub fn on_data_flood(&mut self) {
        if !self.plotter {
            return;
        }
        error!("Plotting data flood detected.");
        if self.repl {
            self.view.remove_repl();
            self.repl = false;
        }
        self.view.remove_plotter();
        self.plotter = false;
        self.release_link();
        self.view.show_message(FLOOD_TITLE, FLOOD_DETAIL);
    }

    /// Tear everything down.
    pub fn shutdown(&mut self) {
        if self.fs.is_some() {
            self.remove_fs();
        }
        if self.repl {
            self.remove_repl();
        }
        if self.plotter {
            self.remove_plotter();
        }
        self.stop_poll();
        close_link(&mut self.link);
    }

    pub(super) fn is_busy(&self) -> bool {
        self.repl || self.plotter || self.fs.is_some()
    }

    /// Port path of the attached board, or tell the user why there is none.
    pub(super) fn locate(&mut self) -> Option<String> {
        match self.board.find_device(&self.hardware, true) {
            Ok(Some(handle)) => Some(handle.port_path),
            Ok(None) => {
                self.view.show_message(NOT_FOUND_TITLE, NOT_FOUND_DETAIL);
                None
            }
            Err(e) => {
                let (title, detail) = e.user_message();
                self.view.show_message(&title, &detail);
                None
            }
        }
    }

    /// Find the board and open a fresh session on it.
    pub(super) fn open_device(&self) -> LinkResult<SerialSession> {
        let handle = self
            .board
            .find_device(&self.hardware, true)?
            .ok_or(LinkError::DeviceNotFound)?;
        self.board
            .open_session(&self.hardware, &handle.port_path, &self.config.serial)
    }

    fn ensure_link(&mut self, port_path: &str) -> LinkResult<()> {
        if self.link.as_ref().map_or(false, SerialSession::is_open) {
            return Ok(());
        }
        let link = self
            .board
            .open_session(&self.hardware, port_path, &self.config.serial)?;
        self.link = Some(link);
        Ok(())
    }

    fn release_link(&mut self) {
        if !(self.repl || self.plotter) {
            self.stop_poll();
            close_link(&mut self.link);
        }
    }

    fn start_poll(&mut self) {
        if !self.is_polling() {
            self.poll = Some(PresencePoll::start(
                self.config.presence.interval(),
                self.events_tx.clone(),
            ));
        }
    }

    fn stop_poll(&mut self) {
        if let Some(mut poll) = self.poll.take() {
            poll.stop();
        }
    }
}

impl<V: View> std::fmt::Debug for ModeController<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeController")
            .field("board", &self.board.name())
            .field("state", &self.state())
            .field("polling", &self.is_polling())
            .finish()
    }
}

fn connect_title(port_path: &str) -> String {
    format!("Cannot connect to device on port {}", port_path)
}
