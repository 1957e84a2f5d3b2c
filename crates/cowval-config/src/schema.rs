//! Configuration schema definitions using serde.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reloader configuration.
    pub reloader: ReloaderConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Settings for one copy-on-write reloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloaderConfig {
    /// Seconds between refresh cycles.
    pub refresh_interval_secs: u64,
    /// Number of undelivered cycle errors kept per error stream consumer.
    pub error_capacity: usize,
    /// Upper bound on copy + apply for a single cycle, in seconds.
    pub apply_timeout_secs: Option<u64>,
    /// Maximum number of operations waiting for the next cycle.
    pub max_pending: Option<usize>,
    /// Whether shutdown runs one last cycle for pending operations.
    pub drain_on_shutdown: bool,
    /// Seconds to wait for the background task during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl ReloaderConfig {
    /// Refresh period as a [`Duration`].
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Apply timeout as a [`Duration`], if configured.
    pub fn apply_timeout(&self) -> Option<Duration> {
        self.apply_timeout_secs.map(Duration::from_secs)
    }

    /// Shutdown timeout as a [`Duration`].
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `cowval_reloader=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}
