//! Runtime validation of configuration values.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Config, LoggingConfig, ReloaderConfig};

/// Largest accepted error stream capacity.
pub const MAX_ERROR_CAPACITY: usize = 1 << 16;

/// Longest accepted refresh period in seconds (one week).
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

impl Config {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.reloader.validate()?;
        self.logging.validate()
    }
}

impl ReloaderConfig {
    /// Validates reloader settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range periods, capacities or timeouts.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.refresh_interval_secs == 0 || self.refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS
        {
            return Err(ConfigError::invalid(
                "reloader.refresh_interval_secs",
                format!("must be between 1 and {MAX_REFRESH_INTERVAL_SECS}"),
            ));
        }
        if self.error_capacity == 0 || self.error_capacity > MAX_ERROR_CAPACITY {
            return Err(ConfigError::invalid(
                "reloader.error_capacity",
                format!("must be between 1 and {MAX_ERROR_CAPACITY}"),
            ));
        }
        if self.apply_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "reloader.apply_timeout_secs",
                "must be at least 1 when set",
            ));
        }
        if self.max_pending == Some(0) {
            return Err(ConfigError::invalid(
                "reloader.max_pending",
                "must be at least 1 when set",
            ));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "reloader.shutdown_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl LoggingConfig {
    /// Validates logging settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the level is blank.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }
}
