//! core::filter
//!
//! Query filters and the entry predicate handed to storage engines.
//!
//! # Overview
//!
//! Filters arrive as raw query-string values ([`RawFilters`]). They are
//! parsed and checked by [`EntryPredicate::build`] *before* any storage call,
//! so a malformed combination is reported as a build error and never as an
//! engine failure.
//!
//! | Field | Meaning |
//! |---|---|
//! | `added_after` | rows added strictly after this timestamp |
//! | `match_id` | comma list of stable object IDs |
//! | `match_type` | comma list of object types |
//! | `match_version` | comma list of `first`, `last`, `all` or timestamps |
//! | `match_spec_version` | comma list of spec versions such as `2.1` |
//!
//! # Versions
//!
//! Collections link stable IDs, so every stored version of a linked object
//! is a candidate. Version selection happens per stable ID at query time.
//! Without a `match_version` filter only the latest version is returned.
//! Spec-version filtering is applied before version selection.
//!
//! # Example
//!
//! ```
//! use taxii_datastore::core::filter::{EntryPredicate, RawFilters, VersionSelector};
//! use taxii_datastore::core::types::CollectionId;
//!
//! let collection = CollectionId::new("intel").unwrap();
//! let raw = RawFilters {
//!     match_type: Some("indicator,malware".into()),
//!     match_version: Some("first,last".into()),
//!     ..Default::default()
//! };
//!
//! let predicate = EntryPredicate::build(&collection, &raw).unwrap();
//! assert_eq!(predicate.types, vec!["indicator", "malware"]);
//! assert_eq!(predicate.versions, vec![VersionSelector::First, VersionSelector::Last]);
//!
//! let bad = RawFilters {
//!     match_version: Some("all,last".into()),
//!     ..Default::default()
//! };
//! assert!(EntryPredicate::build(&collection, &bad).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{is_valid_object_type, CollectionId, ObjectId, Timestamp};

/// Errors from building a predicate out of raw filter values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid added_after value: {0}")]
    InvalidAddedAfter(String),

    #[error("invalid match[id] value: {0}")]
    InvalidId(String),

    #[error("invalid match[type] value: {0}")]
    InvalidType(String),

    #[error("invalid match[version] value: {0}")]
    InvalidVersion(String),

    #[error("match[version] 'all' cannot be combined with other values: {0}")]
    ConflictingVersions(String),

    #[error("invalid match[spec_version] value: {0}")]
    InvalidSpecVersion(String),

    #[error("empty value in {0} filter")]
    EmptyValue(&'static str),
}

/// Filter values exactly as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawFilters {
    pub added_after: Option<String>,
    pub match_id: Option<String>,
    pub match_type: Option<String>,
    pub match_version: Option<String>,
    pub match_spec_version: Option<String>,
}

impl RawFilters {
    /// Check whether no filter is set.
    pub fn is_empty(&self) -> bool {
        self.added_after.is_none()
            && self.match_id.is_none()
            && self.match_type.is_none()
            && self.match_version.is_none()
            && self.match_spec_version.is_none()
    }
}

/// One `match[version]` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// The earliest version of each object.
    First,
    /// The latest version of each object.
    Last,
    /// Every version.
    All,
    /// The version with exactly this modification timestamp.
    At(Timestamp),
}

impl VersionSelector {
    fn parse(token: &str) -> Result<Self, FilterError> {
        match token {
            "first" => Ok(VersionSelector::First),
            "last" => Ok(VersionSelector::Last),
            "all" => Ok(VersionSelector::All),
            other => Timestamp::parse(other)
                .map(VersionSelector::At)
                .map_err(|e| FilterError::InvalidVersion(e.to_string())),
        }
    }
}

/// A validated predicate over a collection's linked objects.
///
/// Storage engines evaluate this predicate; the `admits_*` and
/// [`selects_version`](EntryPredicate::selects_version) helpers give every
/// engine the same semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPredicate {
    /// Collection whose records are queried.
    pub collection_id: CollectionId,
    /// Keep rows added strictly after this time.
    pub added_after: Option<Timestamp>,
    /// Keep only these stable IDs (empty = any).
    pub ids: Vec<ObjectId>,
    /// Keep only these object types (empty = any).
    pub types: Vec<String>,
    /// Version selectors, never empty.
    pub versions: Vec<VersionSelector>,
    /// Keep only these spec versions (empty = any).
    pub spec_versions: Vec<String>,
}

impl EntryPredicate {
    /// Build a predicate for a collection from raw filter values.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] describing the first malformed value or
    /// conflicting combination.
    pub fn build(collection_id: &CollectionId, raw: &RawFilters) -> Result<Self, FilterError> {
        let added_after = match raw.added_after.as_deref() {
            Some(value) => Some(
                Timestamp::parse(value.trim())
                    .map_err(|e| FilterError::InvalidAddedAfter(e.to_string()))?,
            ),
            None => None,
        };

        let ids = split_list(raw.match_id.as_deref(), "match[id]")?
            .into_iter()
            .map(|id| ObjectId::new(id).map_err(|e| FilterError::InvalidId(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let types = split_list(raw.match_type.as_deref(), "match[type]")?
            .into_iter()
            .map(|t| {
                if is_valid_object_type(t) {
                    Ok(t.to_string())
                } else {
                    Err(FilterError::InvalidType(t.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut versions = split_list(raw.match_version.as_deref(), "match[version]")?
            .into_iter()
            .map(VersionSelector::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if versions.len() > 1 && versions.contains(&VersionSelector::All) {
            return Err(FilterError::ConflictingVersions(
                raw.match_version.clone().unwrap_or_default(),
            ));
        }
        if versions.is_empty() {
            versions.push(VersionSelector::Last);
        }

        let spec_versions = split_list(raw.match_spec_version.as_deref(), "match[spec_version]")?
            .into_iter()
            .map(|v| {
                if is_spec_version(v) {
                    Ok(v.to_string())
                } else {
                    Err(FilterError::InvalidSpecVersion(v.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            collection_id: collection_id.clone(),
            added_after,
            ids,
            types,
            versions,
            spec_versions,
        })
    }

    /// A predicate with no filters: latest version of every linked object.
    pub fn unfiltered(collection_id: &CollectionId) -> Self {
        Self {
            collection_id: collection_id.clone(),
            added_after: None,
            ids: Vec::new(),
            types: Vec::new(),
            versions: vec![VersionSelector::Last],
            spec_versions: Vec::new(),
        }
    }

    /// Check the ID and type filters against a stable ID.
    pub fn admits_object(&self, id: &ObjectId) -> bool {
        (self.ids.is_empty() || self.ids.contains(id))
            && (self.types.is_empty() || self.types.iter().any(|t| t == id.object_type()))
    }

    /// Check the `added_after` filter against a record's added time.
    pub fn admits_added(&self, date_added: &Timestamp) -> bool {
        self.added_after.map_or(true, |after| *date_added > after)
    }

    /// Check the spec-version filter.
    pub fn admits_spec_version(&self, spec_version: &str) -> bool {
        self.spec_versions.is_empty() || self.spec_versions.iter().any(|v| v == spec_version)
    }

    /// Check whether a version is selected.
    ///
    /// `earliest` and `latest` are the bounds over the versions of the same
    /// stable ID that passed the spec-version filter.
    pub fn selects_version(
        &self,
        version: &Timestamp,
        earliest: &Timestamp,
        latest: &Timestamp,
    ) -> bool {
        self.versions.iter().any(|selector| match selector {
            VersionSelector::All => true,
            VersionSelector::First => version == earliest,
            VersionSelector::Last => version == latest,
            VersionSelector::At(at) => version == at,
        })
    }
}

/// Split a comma list, rejecting empty items.
fn split_list<'a>(value: Option<&'a str>, field: &'static str) -> Result<Vec<&'a str>, FilterError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .map(|item| {
            if item.is_empty() {
                Err(FilterError::EmptyValue(field))
            } else {
                Ok(item)
            }
        })
        .collect()
}

/// `major.minor`, both numeric.
fn is_spec_version(value: &str) -> bool {
    match value.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
