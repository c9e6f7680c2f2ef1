//! Shared test utilities for mu_link tests.
//!
//! This module provides common test infrastructure including:
//! - Scripted board conversations on top of `MockSerialPort`
//! - A recording `View` implementation
//! - Hardware built from a fixed port list

#![allow(dead_code)]

use mu_link::config::Config;
use mu_link::discovery::{FixedPortScanner, Platform, PortInfo};
use mu_link::fs::{FileManagerHandle, FsEvent};
use mu_link::mode::{Hardware, ScriptTab, Tab, View};
use mu_link::port::{MockPortOpener, MockSerialPort};
use mu_link::protocol::raw::RAW_BANNER;
use mu_link::protocol::{CTRL_A, CTRL_C, CTRL_D};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

pub const PROMPT_REPLY: &[u8] = b"\r\n>>> ";
pub const READY_REPLY: &[u8] =
    b"ets Jun  8 2016 00:22:57\r\nrst:0xc (SW_CPU_RESET)\r\nExecute last selected script.\r\n";

/// Config with no settle delays, a slow presence poll and a workspace
/// under `home`.
pub fn test_config(home: &Path) -> Config {
    let mut config = Config::default();
    config.serial.settle_delay_ms = 0;
    config.serial.write_chunk_size = 256;
    config.presence.interval_ms = 60_000;
    config.workspace.home = Some(home.to_path_buf());
    config
}

pub fn studuinobit_port() -> PortInfo {
    PortInfo::usb("ttyACM0", 0x20A0, 0x4269)
}

/// Hardware over a fixed port list and a single mock port.
pub fn hardware(ports: Vec<PortInfo>, port: &MockSerialPort) -> (Hardware, Arc<FixedPortScanner>) {
    let scanner = Arc::new(FixedPortScanner::new(ports));
    let hardware = Hardware::new(
        scanner.clone(),
        Arc::new(MockPortOpener::new(port.clone())),
        Platform::Posix,
    );
    (hardware, scanner)
}

/// A raw REPL reply with only stdout.
pub fn raw_ok(stdout: &[u8]) -> Vec<u8> {
    let mut reply = b"OK".to_vec();
    reply.extend_from_slice(stdout);
    reply.extend_from_slice(b"\x04\x04>");
    reply
}

/// A raw REPL reply with stderr.
pub fn raw_err(stderr: &[u8]) -> Vec<u8> {
    let mut reply = b"OK\x04".to_vec();
    reply.extend_from_slice(stderr);
    reply.extend_from_slice(b"\x04>");
    reply
}

// Replies are consumed per trigger byte in write order, so each helper
// below must be called in the order the conversation happens.

/// Answer a reboot handshake up to and including the ready marker.
pub fn expect_reboot(port: &mut MockSerialPort) {
    port.reply_to(&[CTRL_C], PROMPT_REPLY);
    port.reply_to(&[CTRL_A], b"");
    port.reply_to(&[CTRL_D], READY_REPLY);
}

/// Answer a bare interrupt.
pub fn expect_interrupt(port: &mut MockSerialPort) {
    port.reply_to(&[CTRL_C], PROMPT_REPLY);
}

/// Answer one raw REPL session with one reply per submitted command.
pub fn expect_raw(port: &mut MockSerialPort, replies: &[Vec<u8>]) {
    port.reply_to(&[CTRL_C], PROMPT_REPLY);
    port.reply_to(&[CTRL_C], PROMPT_REPLY);
    port.reply_to(&[CTRL_A], RAW_BANNER);
    for reply in replies {
        port.reply_to(&[CTRL_D], reply);
    }
}

/// `n` raw commands that all succeed silently.
pub fn oks(n: usize) -> Vec<Vec<u8>> {
    vec![raw_ok(b""); n]
}

/// Wait for the next file manager event.
pub fn next_event(events: &Receiver<FsEvent>) -> FsEvent {
    events
        .recv_timeout(Duration::from_secs(5))
        .expect("file manager did not answer")
}

/// View that records everything it is told.
#[derive(Default)]
pub struct RecordingView {
    pub messages: Vec<(String, String)>,
    pub statuses: Vec<String>,
    pub calls: Vec<String>,
    pub repl_lines: Vec<String>,
    pub slot: Option<u8>,
    pub tab: Option<ScriptTab>,
    pub workspace: Option<PathBuf>,
    pub files: Option<Receiver<FsEvent>>,
    pub fs_handle: Option<FileManagerHandle>,
}

impl RecordingView {
    pub fn with_tab(text: &str) -> Self {
        Self {
            tab: Some(ScriptTab::new(text)),
            ..Self::default()
        }
    }

    pub fn titles(&self) -> Vec<&str> {
        self.messages.iter().map(|(title, _)| title.as_str()).collect()
    }
}

impl View for RecordingView {
    fn show_message(&mut self, title: &str, detail: &str) {
        self.messages.push((title.to_string(), detail.to_string()));
    }

    fn show_status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn add_repl(&mut self, port_path: &str, _board: &str, _force_interrupt: bool) {
        self.calls.push(format!("add_repl {}", port_path));
    }

    fn remove_repl(&mut self) {
        self.calls.push("remove_repl".to_string());
    }

    fn add_plotter(&mut self, port_path: &str, _board: &str) {
        self.calls.push(format!("add_plotter {}", port_path));
    }

    fn remove_plotter(&mut self) {
        self.calls.push("remove_plotter".to_string());
    }

    fn add_filesystem(
        &mut self,
        workspace: &Path,
        manager: FileManagerHandle,
        files: Receiver<FsEvent>,
    ) {
        self.calls.push("add_filesystem".to_string());
        self.workspace = Some(workspace.to_path_buf());
        self.fs_handle = Some(manager);
        self.files = Some(files);
    }

    fn remove_filesystem(&mut self) {
        self.calls.push("remove_filesystem".to_string());
    }

    fn send_repl_commands(&mut self, lines: &[String]) {
        self.repl_lines = lines.to_vec();
    }

    fn select_slot(&mut self, _slots: RangeInclusive<u8>) -> Option<u8> {
        self.slot
    }

    fn current_tab(&self) -> Option<&dyn Tab> {
        self.tab.as_ref().map(|tab| tab as &dyn Tab)
    }
}
