//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing. Unknown keys are rejected so a
//! typo never silently falls back to a default.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::datastore::catalog::MediaTypeDedup;

/// Largest page ceiling accepted from configuration.
pub const MAX_RANGE_MAX: usize = 100_000;

/// Datastore configuration file.
///
/// # Example
///
/// ```toml
/// [query]
/// range_max = 100
/// enforce_enabled = true
///
/// [catalog]
/// media_type_dedup = "adjacent"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatastoreConfig {
    /// Query settings
    pub query: Option<QueryConfig>,

    /// Collection catalog settings
    pub catalog: Option<CatalogConfig>,
}

impl DatastoreConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(query) = &self.query {
            query.validate()?;
        }
        Ok(())
    }
}

/// Query settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Server page ceiling (0 = no forced pagination)
    pub range_max: Option<usize>,

    /// Refuse queries against collections that are not enabled
    pub enforce_enabled: Option<bool>,
}

impl QueryConfig {
    /// Validate the query settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max) = self.range_max {
            if max > MAX_RANGE_MAX {
                return Err(ConfigError::InvalidValue(format!(
                    "range_max {} exceeds the limit of {}",
                    max, MAX_RANGE_MAX
                )));
            }
        }
        Ok(())
    }
}

/// Collection catalog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// How duplicate media types from the joined column are collapsed
    pub media_type_dedup: Option<MediaTypeDedup>,
}
