//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading, validating or saving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file contents could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The config could not be rendered for saving.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    /// The file extension does not name a supported format.
    #[error("Unsupported config format for {0}; expected .toml, .yaml, .yml or .json")]
    UnsupportedFormat(PathBuf),

    /// A field holds a value outside its allowed range.
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for environment variable {var}")]
    EnvOverride {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
