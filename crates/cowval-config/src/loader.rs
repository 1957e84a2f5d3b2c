//! Configuration loading and persistence with atomic file operations.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::Config;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Prefix shared by all environment overrides.
pub const ENV_PREFIX: &str = "COWVAL_";

/// On-disk configuration format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yaml` or `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Picks the format matching the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for unknown extensions.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Parses `text` in this format. `path` is only used for error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is malformed.
    pub fn parse(self, text: &str, path: &Path) -> ConfigResult<Config> {
        let parsed = match self {
            Self::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Renders `config` in this format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if the serializer fails.
    pub fn render(self, config: &Config) -> ConfigResult<String> {
        match self {
            Self::Toml => toml::to_string_pretty(config).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
        }
        .map_err(ConfigError::Serialize)
    }
}

/// Configuration loader with atomic file operations.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this loader reads from and writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads configuration from file, applies `COWVAL_*` overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails on I/O, parse, override or validation errors.
    pub async fn load(&self) -> ConfigResult<Config> {
        let format = ConfigFormat::from_path(&self.path)?;
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut config = format.parse(&text, &self.path)?;
        debug!("Parsed configuration from {}", self.path.display());

        apply_env_overrides(&mut config)?;
        config.validate()?;
        info!("Loaded configuration from {}", self.path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), but starts from defaults when the file is missing.
    ///
    /// # Errors
    ///
    /// Fails on parse, override or validation errors, or I/O errors other than not-found.
    pub async fn load_or_default(&self) -> ConfigResult<Config> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => self.load().await,
            Ok(false) => {
                info!(
                    "No configuration at {}, using defaults",
                    self.path.display()
                );
                let mut config = Config::default();
                apply_env_overrides(&mut config)?;
                config.validate()?;
                Ok(config)
            }
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Saves configuration to file atomically.
    ///
    /// The rendered file is written to a temporary file in the same directory
    /// and then renamed over the target.
    ///
    /// # Errors
    ///
    /// Fails on validation, serialization or I/O errors.
    pub async fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate()?;
        let format = ConfigFormat::from_path(&self.path)?;
        let rendered = format.render(config)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, rendered.as_bytes()))
            .await
            .map_err(|e| ConfigError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })??;

        info!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> ConfigResult<()> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Applies `COWVAL_*` process environment overrides to `config`.
///
/// # Errors
///
/// Returns [`ConfigError::EnvOverride`] for values that do not parse.
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides resolved through `lookup`, keyed by full variable name.
///
/// # Errors
///
/// Returns [`ConfigError::EnvOverride`] for values that do not parse.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let reloader = &mut config.reloader;
    if let Some(v) = parsed(&lookup, "REFRESH_INTERVAL_SECS")? {
        reloader.refresh_interval_secs = v;
    }
    if let Some(v) = parsed(&lookup, "ERROR_CAPACITY")? {
        reloader.error_capacity = v;
    }
    if let Some(v) = parsed(&lookup, "APPLY_TIMEOUT_SECS")? {
        reloader.apply_timeout_secs = Some(v);
    }
    if let Some(v) = parsed(&lookup, "MAX_PENDING")? {
        reloader.max_pending = Some(v);
    }
    if let Some(v) = parsed_with(&lookup, "DRAIN_ON_SHUTDOWN", parse_bool)? {
        reloader.drain_on_shutdown = v;
    }
    if let Some(v) = parsed(&lookup, "SHUTDOWN_TIMEOUT_SECS")? {
        reloader.shutdown_timeout_secs = v;
    }
    if let Some(v) = lookup(&format!("{ENV_PREFIX}LOG_LEVEL")) {
        config.logging.level = v;
    }
    if let Some(v) = parsed(&lookup, "LOG_FORMAT")? {
        config.logging.format = v;
    }
    Ok(())
}

fn parsed<F, T>(lookup: &F, suffix: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    parsed_with(lookup, suffix, |raw| raw.trim().parse().ok())
}

fn parsed_with<F, T>(
    lookup: &F,
    suffix: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
{
    let var = format!("{ENV_PREFIX}{suffix}");
    match lookup(&var) {
        None => Ok(None),
        Some(value) => match parse(&value) {
            Some(parsed) => {
                debug!("Applying override {}", var);
                Ok(Some(parsed))
            }
            None => Err(ConfigError::EnvOverride { var, value }),
        },
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
