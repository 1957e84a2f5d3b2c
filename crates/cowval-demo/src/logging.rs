//! Structured logging setup driven by [`LoggingConfig`].

use crate::error::{DemoError, DemoResult};
use cowval_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Fails if the filter directives are malformed or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> DemoResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| DemoError::Logging(format!("bad level {:?}: {e}", config.level)))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    installed.map_err(|e| DemoError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_level_rejected() {
        // Only reached when RUST_LOG is unset or itself malformed.
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "cowval=loud".to_string(),
            format: LogFormat::Compact,
        };
        assert!(matches!(init_logging(&config), Err(DemoError::Logging(_))));
    }
}
