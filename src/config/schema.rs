//! Configuration schema definitions.
//!
//! Every section carries `#[serde(default)]`, so a config file only needs
//! the keys it wants to change.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link and protocol timing
    pub serial: SerialConfig,
    /// Device presence polling
    pub presence: PresenceConfig,
    /// Local workspace used for staging scripts
    pub workspace: WorkspaceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the protocol layer cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be non-zero"));
        }
        if self.serial.request_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "serial.request_timeout_ms",
                "must be non-zero",
            ));
        }
        if self.serial.poll_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "serial.poll_timeout_ms",
                "must be non-zero",
            ));
        }
        if self.serial.write_chunk_size == 0 {
            return Err(ConfigError::validation(
                "serial.write_chunk_size",
                "must be non-zero",
            ));
        }
        if self.presence.interval_ms == 0 {
            return Err(ConfigError::validation("presence.interval_ms", "must be non-zero"));
        }
        if self.workspace.name.trim().is_empty() {
            return Err(ConfigError::validation("workspace.name", "must not be empty"));
        }
        Ok(())
    }
}

/// Serial link configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate set once DTR is settled
    pub baud_rate: u32,
    /// `read_until` window for request-level operations
    pub request_timeout_ms: u64,
    /// Read window a freshly opened port starts with
    pub poll_timeout_ms: u64,
    /// Pause between control writes in the handshake and raw REPL
    pub settle_delay_ms: u64,
    /// Largest slice of a command written in one go
    pub write_chunk_size: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            request_timeout_ms: 5000,
            poll_timeout_ms: 1000,
            settle_delay_ms: 10,
            write_chunk_size: 32,
        }
    }
}

impl SerialConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Presence poll section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// How often the locator is re-run while a REPL or plotter is active
    pub interval_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl PresenceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Workspace section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Overrides the user's home directory
    pub home: Option<PathBuf>,
    /// Directory under home holding the user's scripts
    pub name: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            home: None,
            name: "mu_code".to_string(),
        }
    }
}

impl WorkspaceConfig {
    /// `<home>/<name>`, or `None` when no home directory can be found.
    pub fn workspace_dir(&self) -> Option<PathBuf> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => directories::BaseDirs::new()?.home_dir().to_path_buf(),
        };
        Some(home.join(&self.name))
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
