//! Application-wide error types using thiserror.

use cowval_config::ConfigError;
use cowval_reloader::ReloaderError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum DemoError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reloader start or shutdown error.
    #[error("Reloader error: {0}")]
    Reloader(#[from] ReloaderError),

    /// The log subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),

    /// Background task failure.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for the demo application.
pub type DemoResult<T> = Result<T, DemoError>;
