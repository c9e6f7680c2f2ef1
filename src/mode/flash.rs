//! Script transfer to a slot, and run preparation.
//!
//! Both are one-shot sequences on a session of their own. Each step that
//! fails stops the sequence, closes the session and reports a step-specific
//! message. Nothing already written to the board is rolled back.

use super::board::RUN_SLOT;
use super::controller::{ModeController, ModeState};
use super::view::{Tab, View};
use crate::config::WorkspaceConfig;
use crate::error::{
    LinkError, LinkResult, NOT_FOUND_DETAIL, NOT_FOUND_TITLE, RECONNECT_DETAIL,
};
use crate::fs::commands;
use crate::handshake;
use crate::protocol::raw;
use crate::session::SerialSession;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const TRANSFER_BUSY: &str =
    "Transfer cannot run while the REPL, plotter or file system is active.";

const RESTART_DETAIL: &str =
    "Since the transfer is completed, it will work\n if you reconnect the USB cable.";

const NO_TAB_TITLE: &str = "Cannot run anything without any active editor tabs.";
const NO_TAB_DETAIL: &str = "Running transfers the content of the current tab onto the device. \
It seems like you don't have any tabs open.";

/// Step of a transfer that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    Busy,
    Unsupported,
    Open,
    Save,
    Reboot,
    Upload,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashOutcome {
    Transferred { slot: u8, device_path: String },
    Cancelled,
    Failed(TransferStep),
}

/// Step of run preparation that failed; `Display` is the message title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    OpenSerial,
    Reboot,
    Reset,
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenSerial => "Open Serial Error",
            Self::Reboot => "Reboot Error",
            Self::Reset => "Reset Error",
        })
    }
}

/// `<home>/<workspace>/studuinobit/usr<slot>.py`
pub fn staging_path(workspace: &WorkspaceConfig, slot: u8) -> Option<PathBuf> {
    Some(
        workspace
            .workspace_dir()?
            .join("studuinobit")
            .join(format!("usr{}.py", slot)),
    )
}

/// Write `text` to `path` with `newline` line endings, creating parents.
pub fn save_script(path: &Path, text: &str, newline: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let normalised = text.replace("\r\n", "\n");
    let body = if newline == "\n" {
        normalised
    } else {
        normalised.replace('\n', newline)
    };
    std::fs::write(path, body)
}

/// Name a tab in log lines: its file path, or `untitled` when unsaved.
pub fn tab_label(tab: &dyn Tab) -> String {
    tab.path()
        .map_or_else(|| "untitled".to_string(), |path| path.display().to_string())
}

/// Make `slot` the script the board starts after a reset.
pub fn record_slot(link: &mut SerialSession, slot: u8) -> LinkResult<()> {
    let commands = [
        "import machine".to_string(),
        format!("machine.nvs_setint(\"lastSelected\", {})", slot),
    ];
    raw::execute(link, &commands)?.into_result()?;
    Ok(())
}

impl<V: View> ModeController<V> {
    /// Save the current tab into a slot on the board and reboot into it.
    pub fn flash(&mut self) -> FlashOutcome {
        if self.is_busy() {
            let (title, detail) = LinkError::Busy(TRANSFER_BUSY.to_string()).user_message();
            self.view.show_message(&title, &detail);
            return FlashOutcome::Failed(TransferStep::Busy);
        }
        let (Some(slots), Some(marker)) = (self.board.slots(), self.board.ready_marker()) else {
            self.view.show_message(
                "Transfer is not supported by this board.",
                &format!("{} boards have no script slots.", self.board.name()),
            );
            return FlashOutcome::Failed(TransferStep::Unsupported);
        };

        let mut link = match self.open_device() {
            Ok(link) => link,
            Err(e) => {
                error!("Error opening serial in transfer: {}", e);
                self.view.show_message(NOT_FOUND_TITLE, NOT_FOUND_DETAIL);
                return FlashOutcome::Failed(TransferStep::Open);
            }
        };

        let slot = match self.view.select_slot(slots.clone()) {
            Some(slot) if slots.contains(&slot) => slot,
            Some(slot) => {
                error!("Slot {} is outside {:?}", slot, slots);
                link.close();
                return FlashOutcome::Cancelled;
            }
            None => {
                link.close();
                return FlashOutcome::Cancelled;
            }
        };

        let staged = match self.stage_current_tab(slot) {
            Ok(path) => path,
            Err(e) => {
                error!("Error saving script in transfer: {}", e);
                return self.abort(
                    link,
                    TransferStep::Save,
                    "File Save Error.",
                    "Failed to save the file.",
                );
            }
        };

        if let Err(e) = handshake::reboot_and_prompt(&mut link, marker) {
            error!("Error reboot in transfer: {}", e);
            return self.abort(link, TransferStep::Reboot, "Reboot Error", RECONNECT_DETAIL);
        }

        let device_path = format!("usr/usr{}.py", slot);
        let uploaded = std::fs::read(&staged)
            .map_err(LinkError::from)
            .and_then(|data| commands::put(&mut link, &data, &device_path));
        if let Err(e) = uploaded {
            error!("Error upload in transfer: {}", e);
            return self.abort(link, TransferStep::Upload, "Upload Error", RECONNECT_DETAIL);
        }

        let restarted =
            record_slot(&mut link, slot).and_then(|()| handshake::reboot(&mut link, marker));
        if let Err(e) = restarted {
            error!("Error restart in transfer: {}", e);
            return self.abort(link, TransferStep::Restart, "Restart Error", RESTART_DETAIL);
        }

        self.view.show_status("Transfer success");
        link.close();
        info!("Transferred {} to slot {}", staged.display(), slot);
        FlashOutcome::Transferred { slot, device_path }
    }

    /// Reboot the board to the prompt and select the run slot.
    ///
    /// Reuses the plotter's session when one is held, otherwise opens and
    /// closes its own.
    pub fn initialize(&mut self) -> Result<(), InitStep> {
        let (mut link, held) = match self.link.take() {
            Some(link) => (link, true),
            None => match self.open_device() {
                Ok(link) => (link, false),
                Err(e) => {
                    error!("Error opening serial in run: {}", e);
                    return Err(InitStep::OpenSerial);
                }
            },
        };

        let result = self
            .board
            .reboot_handshake(&mut link)
            .map_err(|e| {
                error!("Error reboot in run: {}", e);
                InitStep::Reboot
            })
            .and_then(|()| {
                record_slot(&mut link, RUN_SLOT).map_err(|e| {
                    error!("Error reset slot in run: {}", e);
                    InitStep::Reset
                })
            });

        if held {
            self.link = Some(link);
        } else {
            link.close();
        }
        result
    }

    /// Send the current tab's lines to the REPL, starting it if needed.
    pub fn run(&mut self) -> bool {
        if self.state() == ModeState::Filesystem {
            let (title, detail) = LinkError::Busy(TRANSFER_BUSY.to_string()).user_message();
            self.view.show_message(&title, &detail);
            return false;
        }

        if !self.repl && self.board.slots().is_some() {
            match self.initialize() {
                Ok(()) => {}
                Err(InitStep::OpenSerial) => {
                    self.view.show_message(NOT_FOUND_TITLE, NOT_FOUND_DETAIL);
                    return false;
                }
                Err(step) => {
                    self.view.show_message(&step.to_string(), RECONNECT_DETAIL);
                    return false;
                }
            }
        }

        let Some(tab) = self.view.current_tab() else {
            self.view.show_message(NO_TAB_TITLE, NO_TAB_DETAIL);
            return false;
        };
        info!("Running {}.", tab_label(tab));
        let lines: Vec<String> = tab
            .text()
            .replace("\r\n", "\n")
            .split('\n')
            .map(str::to_string)
            .collect();

        if !self.repl {
            self.toggle_repl();
        }
        if self.repl {
            self.view.send_repl_commands(&lines);
        }
        self.repl
    }

    fn stage_current_tab(&self, slot: u8) -> io::Result<PathBuf> {
        let tab = self
            .view
            .current_tab()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no active editor tab"))?;
        let path = staging_path(&self.config.workspace, slot)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
        save_script(&path, &tab.text(), tab.newline())?;
        info!("Staged {} as {}", tab_label(tab), path.display());
        Ok(path)
    }

    fn abort(
        &mut self,
        mut link: SerialSession,
        step: TransferStep,
        title: &str,
        detail: &str,
    ) -> FlashOutcome {
        link.close();
        self.view.show_message(title, detail);
        FlashOutcome::Failed(step)
    }
}
