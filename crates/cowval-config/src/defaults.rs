//! Default values for every configuration section.

use crate::schema::{Config, LogFormat, LoggingConfig, ReloaderConfig};

/// Default refresh period in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 1;

/// Default error stream capacity.
pub const DEFAULT_ERROR_CAPACITY: usize = 64;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

impl Default for Config {
    fn default() -> Self {
        Self {
            reloader: ReloaderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ReloaderConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            error_capacity: DEFAULT_ERROR_CAPACITY,
            apply_timeout_secs: None,
            max_pending: None,
            drain_on_shutdown: true,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
