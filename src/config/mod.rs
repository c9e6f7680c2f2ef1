//! Configuration module for mu-link.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `MU_LINK_CONFIG` environment variable (explicit path)
//! 2. `./mu-link.toml` (current directory)
//! 3. `<config dir>/mu-link/config.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `MU_LINK_<SECTION>_<KEY>`:
//! - `MU_LINK_SERIAL_REQUEST_TIMEOUT_MS=8000`
//! - `MU_LINK_PRESENCE_INTERVAL_MS=2000`
//! - `MU_LINK_WORKSPACE_NAME=mu_code`
//!
//! # Example
//!
//! ```rust,no_run
//! use mu_link::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Request timeout: {:?}", loader.config().serial.request_timeout());
//! # Ok::<(), mu_link::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, LogFormat, LoggingConfig, PresenceConfig, SerialConfig, WorkspaceConfig,
};
