//! Device filesystem access.
//!
//! [`commands`] holds the blocking primitives built on the raw REPL;
//! [`manager`] runs them on a worker thread and reports through a channel.

pub mod commands;
pub mod manager;

pub use commands::{delete, get, ls, put, tree};
pub use manager::{FileManager, FileManagerHandle, FsEvent, FsRequest};

use serde::Serialize;

/// One file or directory on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,

    /// Size in bytes, when the listing reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Directory contents; `None` for plain files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileEntry>>,
}

impl FileEntry {
    pub fn file(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
            children: None,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            children: Some(Vec::new()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }
}

/// Shape of the device's filesystem listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Top-level names only; uploads always land in the root.
    Flat,
    /// Recursive listing with sizes; uploads may target a directory.
    Tree,
}
