//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`CollectionId`] - Opaque, non-empty collection identifier
//! - [`ObjectId`] - Stable object identifier (`<type>--<uuid>`)
//! - [`Timestamp`] - UTC timestamp with microsecond precision
//!
//! # Validation
//!
//! These types enforce validity at construction time. Rows read back from a
//! storage engine are decoded through them, so a malformed column surfaces as
//! a decode error instead of leaking into a response.
//!
//! # Examples
//!
//! ```
//! use taxii_datastore::core::types::{ObjectId, Timestamp};
//!
//! let id = ObjectId::new("indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f").unwrap();
//! assert_eq!(id.object_type(), "indicator");
//!
//! let ts = Timestamp::parse("2016-04-06T20:03:48Z").unwrap();
//! assert_eq!(ts.to_string(), "2016-04-06T20:03:48.000000Z");
//!
//! assert!(ObjectId::new("not-an-id").is_err());
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output format for every timestamp this crate renders.
///
/// RFC 3339, always UTC, always six fractional digits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Separator between the type prefix and the UUID of an object ID.
const OBJECT_ID_SEPARATOR: &str = "--";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid collection id: {0}")]
    InvalidCollectionId(String),

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid object type: {0}")]
    InvalidObjectType(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// A collection identifier.
///
/// Collection IDs are opaque to this crate. The only rule is that they are
/// not empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

impl CollectionId {
    /// Create a new collection ID.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCollectionId` if the ID is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::InvalidCollectionId(
                "collection id cannot be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CollectionId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

impl AsRef<str> for CollectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check whether a string is a valid object type name.
///
/// Type names are 3 to 250 characters of lowercase ASCII letters, digits and
/// single hyphens, and may not start or end with a hyphen.
///
/// # Example
///
/// ```
/// use taxii_datastore::core::types::is_valid_object_type;
///
/// assert!(is_valid_object_type("attack-pattern"));
/// assert!(is_valid_object_type("x-acme-widget"));
/// assert!(!is_valid_object_type("ab"));
/// assert!(!is_valid_object_type("Indicator"));
/// assert!(!is_valid_object_type("bad--type"));
/// ```
pub fn is_valid_object_type(name: &str) -> bool {
    let len = name.len();
    if !(3..=250).contains(&len) {
        return false;
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains(OBJECT_ID_SEPARATOR) {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// A stable object identifier.
///
/// The ID names an object across all of its versions. It has the form
/// `<type>--<uuid>`, for example
/// `report--84e4d88f-44ea-4bcd-bbf3-b2c1c320bcb3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a new validated object ID.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidObjectId` if the separator is missing, the
    /// type prefix is invalid, or the suffix is not a UUID.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        let Some((object_type, uuid)) = id.split_once(OBJECT_ID_SEPARATOR) else {
            return Err(TypeError::InvalidObjectId(format!(
                "'{}' is missing the '--' separator",
                id
            )));
        };

        if !is_valid_object_type(object_type) {
            return Err(TypeError::InvalidObjectId(format!(
                "'{}' has an invalid type prefix",
                id
            )));
        }

        if uuid::Uuid::parse_str(uuid).is_err() {
            return Err(TypeError::InvalidObjectId(format!(
                "'{}' does not end in a valid uuid",
                id
            )));
        }

        Ok(Self(id))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the object type prefix (the part before `--`).
    pub fn object_type(&self) -> &str {
        self.0
            .split_once(OBJECT_ID_SEPARATOR)
            .map(|(t, _)| t)
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A UTC timestamp with microsecond precision.
///
/// Used for added-timestamps, object versions and collection creation
/// times. Finer precision is truncated on construction so that a value
/// survives a render/parse cycle unchanged.
///
/// # Example
///
/// ```
/// use taxii_datastore::core::types::Timestamp;
///
/// let a = Timestamp::parse("2017-01-01T12:34:56.123456789+02:00").unwrap();
/// assert_eq!(a.to_string(), "2017-01-01T10:34:56.123456Z");
///
/// let b = Timestamp::parse(&a.to_string()).unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Create a timestamp from a chrono DateTime, truncating to microseconds.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    /// Parse an RFC 3339 timestamp in any offset.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTimestamp` if the string is not RFC 3339.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self::from_datetime(dt.with_timezone(&Utc)))
            .map_err(|e| TypeError::InvalidTimestamp(format!("'{}': {}", value, e)))
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_string()
    }
}
