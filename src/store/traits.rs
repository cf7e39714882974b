//! store::traits
//!
//! Storage engine and object store trait definitions.
//!
//! # Design
//!
//! The datastore never talks to a database directly. It goes through two
//! narrow traits:
//!
//! - [`StorageEngine`] executes predicate queries and inserts over the
//!   collection, media-type and collection-record tables
//! - [`ObjectStore`] fetches a full object payload by stable ID and version
//!
//! Rows come back as raw column text. Decoding (timestamps, IDs) happens in
//! the datastore so that a malformed row is reported as a decode failure and
//! not as an engine failure.
//!
//! Engines are borrowed for the duration of one request. The datastore keeps
//! no state across requests and performs no locking; isolation between
//! concurrent readers and writers is the engine's responsibility.
//!
//! # Cursors
//!
//! Queries return a [`RowCursor`]. Dropping the cursor releases whatever
//! engine resource backs it, so an early return on a decode error never
//! leaks a handle.
//!
//! # Example
//!
//! ```
//! use taxii_datastore::store::{MemoryStore, StorageEngine, StoreError, VisibilityMode};
//!
//! fn count_visible(engine: &dyn StorageEngine) -> Result<usize, StoreError> {
//!     let mut count = 0;
//!     for row in engine.select_collections(VisibilityMode::EnabledVisible)? {
//!         row?;
//!         count += 1;
//!     }
//!     Ok(count)
//! }
//!
//! assert_eq!(count_visible(&MemoryStore::new()).unwrap(), 0);
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::core::filter::EntryPredicate;
use crate::core::types::{ObjectId, Timestamp};

/// Errors from storage engine and object store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The engine failed to execute a statement.
    #[error("engine error: {0}")]
    Execution(String),

    /// A constraint (e.g. a primary key) rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The requested row or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Which collections an enumeration returns.
///
/// Visibility has two axes: `enabled` decides whether a collection is served
/// at all, `hidden` decides whether it shows up in client enumeration while
/// staying reachable by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisibilityMode {
    /// Every collection, disabled and hidden ones included (administration).
    All,
    /// Enabled collections, hidden ones included (routing setup).
    AllEnabled,
    /// Enabled and not hidden (what clients see).
    EnabledVisible,
}

impl VisibilityMode {
    /// Check whether a collection with these flags belongs to this mode.
    pub fn admits(&self, enabled: bool, hidden: bool) -> bool {
        match self {
            VisibilityMode::All => true,
            VisibilityMode::AllEnabled => enabled,
            VisibilityMode::EnabledVisible => enabled && !hidden,
        }
    }

    /// The mode's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityMode::All => "all",
            VisibilityMode::AllEnabled => "allEnabled",
            VisibilityMode::EnabledVisible => "enabledVisible",
        }
    }
}

impl std::fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VisibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(VisibilityMode::All),
            "allEnabled" => Ok(VisibilityMode::AllEnabled),
            "enabledVisible" => Ok(VisibilityMode::EnabledVisible),
            other => Err(format!(
                "unknown visibility mode '{}' (valid: all, allEnabled, enabledVisible)",
                other
            )),
        }
    }
}

/// A collection row as returned by an enumeration.
///
/// `media_types` is the comma-joined media-type column produced by joining
/// the media-type table. It may contain duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRow {
    pub date_added: String,
    pub enabled: bool,
    pub hidden: bool,
    pub id: String,
    pub title: String,
    pub description: String,
    pub can_read: bool,
    pub can_write: bool,
    pub media_types: String,
}

/// A new collection row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollectionRow {
    pub date_added: Timestamp,
    pub id: String,
    pub title: String,
    pub description: String,
    pub enabled: bool,
    pub hidden: bool,
    pub can_read: bool,
    pub can_write: bool,
}

/// One matching (record, object version) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    /// When the stable ID was linked to the collection
    pub date_added: String,
    /// Stable object ID
    pub id: String,
    /// Version (modification timestamp)
    pub version: String,
    /// Spec version tag
    pub spec_version: String,
}

/// A scoped row cursor.
///
/// Each item is one row or the engine error that interrupted iteration.
pub type RowCursor<'a, T> = Box<dyn Iterator<Item = Result<T, StoreError>> + 'a>;

/// Storage engine over the collection tables.
///
/// # Ordering
///
/// [`select_entries`](StorageEngine::select_entries) must yield rows ordered
/// by `date_added` ascending. No other ordering is assumed.
pub trait StorageEngine {
    /// Enumerate collections admitted by `mode`.
    fn select_collections(
        &self,
        mode: VisibilityMode,
    ) -> Result<RowCursor<'_, CollectionRow>, StoreError>;

    /// Look up one collection by ID, whatever its flags.
    ///
    /// Returns `Ok(None)` if no collection has this ID.
    fn select_collection(&self, id: &str) -> Result<Option<CollectionRow>, StoreError>;

    /// Insert a collection row.
    fn insert_collection(&self, row: &NewCollectionRow) -> Result<(), StoreError>;

    /// Insert one accepted media type for a collection.
    fn insert_collection_media_type(
        &self,
        collection_id: &str,
        media_type: &str,
    ) -> Result<(), StoreError>;

    /// Insert a collection record linking a stable object ID.
    ///
    /// Duplicate records are allowed.
    fn insert_collection_record(
        &self,
        date_added: &Timestamp,
        collection_id: &str,
        object_id: &str,
    ) -> Result<(), StoreError>;

    /// Execute an entry predicate against the collection records.
    fn select_entries(
        &self,
        predicate: &EntryPredicate,
    ) -> Result<RowCursor<'_, EntryRow>, StoreError>;
}

/// Store of full object payloads.
pub trait ObjectStore {
    /// Fetch one version of an object.
    ///
    /// Returns `StoreError::NotFound` if that version does not exist.
    fn fetch(&self, id: &ObjectId, version: &Timestamp) -> Result<serde_json::Value, StoreError>;
}
