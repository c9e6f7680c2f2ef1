//! What the controller needs from the user interface.

use crate::fs::{FileManagerHandle, FsEvent};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

/// Notifications the controller sends to the UI.
///
/// Panes are out of scope here; `add_*`/`remove_*` only tell the UI which
/// consumer currently owns the serial connection.
pub trait View {
    fn show_message(&mut self, title: &str, detail: &str);

    /// Transient status line text.
    fn show_status(&mut self, _text: &str) {}

    fn add_repl(&mut self, port_path: &str, board: &str, force_interrupt: bool);
    fn remove_repl(&mut self);

    fn add_plotter(&mut self, port_path: &str, board: &str);
    fn remove_plotter(&mut self);

    /// Show the file panes. `files` receives every [`FsEvent`] the worker emits.
    fn add_filesystem(
        &mut self,
        workspace: &Path,
        manager: FileManagerHandle,
        files: Receiver<FsEvent>,
    );
    fn remove_filesystem(&mut self);

    /// Type `lines` into the REPL.
    fn send_repl_commands(&mut self, _lines: &[String]) {}

    /// Ask which slot to transfer to; `None` cancels.
    fn select_slot(&mut self, _slots: RangeInclusive<u8>) -> Option<u8> {
        None
    }

    fn current_tab(&self) -> Option<&dyn Tab>;
}

/// The editor tab whose script is transferred or run.
pub trait Tab {
    fn text(&self) -> String;
    fn path(&self) -> Option<&Path>;
    /// Line ending used when the tab is saved.
    fn newline(&self) -> &str;
}

/// A tab backed by a string, used by the CLI and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTab {
    pub text: String,
    pub path: Option<PathBuf>,
    pub newline: String,
}

impl ScriptTab {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            path: None,
            newline: "\n".to_string(),
        }
    }

    /// Load `path`, keeping its line ending.
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        Ok(Self {
            text: text.replace("\r\n", "\n"),
            newline: newline.to_string(),
            path: Some(path),
        })
    }
}

impl Tab for ScriptTab {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn newline(&self) -> &str {
        &self.newline
    }
}
