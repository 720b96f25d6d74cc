//! Logging bootstrap
//!
//! Installs a `tracing-subscriber` formatter. `RUST_LOG` takes precedence over
//! the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, which happens when
/// several tests or embedders race to initialise logging.
pub fn init(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
