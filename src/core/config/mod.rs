//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Per-query narrowing (an explicit `range_max` on a [`Query`] can lower
//!    the page ceiling, never raise it)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$TAXII_DATASTORE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/taxii-datastore/config.toml`
//! 3. `~/.taxii-datastore/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use taxii_datastore::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! for warning in &result.warnings {
//!     eprintln!("warning: {}", warning.message);
//! }
//! let config = result.config;
//! println!("Page ceiling: {}", config.range_max());
//! ```
//!
//! [`Query`]: crate::datastore::Query

pub mod schema;

pub use schema::{CatalogConfig, DatastoreConfig, QueryConfig};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::datastore::catalog::MediaTypeDedup;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TAXII_DATASTORE_CONFIG";

/// Default page ceiling (no forced pagination).
pub const DEFAULT_RANGE_MAX: usize = 0;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration.
///
/// Accessor methods apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: DatastoreConfig,
    /// Path the file was loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Wrap an in-memory configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the configuration fails validation.
    pub fn new(file: DatastoreConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self { file, path: None })
    }

    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated. A missing file is not an error (defaults are used).
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        // 1. Check $TAXII_DATASTORE_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok(ConfigLoadResult { config, warnings });
            }
            warnings.push(ConfigWarning {
                message: format!(
                    "{} points to a missing file, falling back to default locations",
                    CONFIG_ENV_VAR
                ),
                path,
            });
        }

        // 2. Check $XDG_CONFIG_HOME/taxii-datastore/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("taxii-datastore/config.toml");
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok(ConfigLoadResult { config, warnings });
            }
        }

        // 3. Check ~/.taxii-datastore/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".taxii-datastore/config.toml");
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok(ConfigLoadResult { config, warnings });
            }
        }

        Ok(ConfigLoadResult {
            config: Config::default(),
            warnings,
        })
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: DatastoreConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        file.validate()?;

        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Get the server page ceiling.
    ///
    /// Defaults to 0 (no forced pagination) if not configured.
    pub fn range_max(&self) -> usize {
        self.file
            .query
            .as_ref()
            .and_then(|q| q.range_max)
            .unwrap_or(DEFAULT_RANGE_MAX)
    }

    /// Check if queries require an enabled collection.
    ///
    /// Defaults to `true` if not configured.
    pub fn enforce_enabled(&self) -> bool {
        self.file
            .query
            .as_ref()
            .and_then(|q| q.enforce_enabled)
            .unwrap_or(true)
    }

    /// Get the media-type deduplication strategy.
    ///
    /// Defaults to [`MediaTypeDedup::Adjacent`] if not configured.
    pub fn media_type_dedup(&self) -> MediaTypeDedup {
        self.file
            .catalog
            .as_ref()
            .and_then(|c| c.media_type_dedup)
            .unwrap_or_default()
    }

    /// Get the path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
