use crate::config::{LogFormat, LoggingConfig};
use std::sync::Once;
use tracing_subscriber::{prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize tracing on stderr, keeping stdout for command output.
///
/// `RUST_LOG` takes precedence over the configured level. Only the first
/// call installs a subscriber, so tests may call this freely.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
        let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        let registry = tracing_subscriber::registry();
        let installed = match config.format {
            LogFormat::Json => registry.with(layer.json().with_filter(filter)).try_init(),
            LogFormat::Compact => registry.with(layer.compact().with_filter(filter)).try_init(),
            LogFormat::Pretty => registry.with(layer.with_filter(filter)).try_init(),
        };

        if let Err(e) = installed {
            eprintln!("Warning: tracing already initialised: {}", e);
        }
    });
}
