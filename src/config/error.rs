//! Errors raised while loading, validating or saving `mu-link.toml`.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("Could not {action} configuration file '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file '{path}' is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range, e.g. a zero timeout.
    #[error("Invalid value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// A `MU_LINK_*` override could not be parsed.
    #[error("Invalid environment override '{var}': {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io { action, path, source }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_file_and_action() {
        let err = ConfigError::io("read", Path::new("/etc/mu-link.toml"))(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let text = err.to_string();
        assert!(text.starts_with("Could not read configuration file '/etc/mu-link.toml'"));
    }
}
