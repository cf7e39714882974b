//! datastore::catalog
//!
//! Collection enumeration and creation.
//!
//! # Visibility
//!
//! | Mode | Returns |
//! |---|---|
//! | `All` | every collection |
//! | `AllEnabled` | enabled collections, hidden ones included |
//! | `EnabledVisible` | enabled collections that are not hidden |
//!
//! # Media types
//!
//! Engines hand back a collection's media types as one comma-joined column,
//! which can repeat values when the underlying join fans out. The catalog
//! splits the column and collapses repeats according to [`MediaTypeDedup`].
//! The default, [`MediaTypeDedup::Adjacent`], only drops a value equal to
//! the one right before it:
//!
//! ```
//! use taxii_datastore::datastore::catalog::{parse_media_types, MediaTypeDedup};
//!
//! assert_eq!(parse_media_types("a,a,b", MediaTypeDedup::Adjacent), vec!["a", "b"]);
//! assert_eq!(parse_media_types("a,b,a", MediaTypeDedup::Adjacent), vec!["a", "b", "a"]);
//! assert_eq!(parse_media_types("a,b,a", MediaTypeDedup::Full), vec!["a", "b"]);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::error::DatastoreError;
use crate::core::types::{CollectionId, Timestamp};
use crate::resources::{Collection, Collections};
use crate::store::{CollectionRow, NewCollectionRow, StorageEngine, VisibilityMode};

/// How repeated media types in the joined column are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeDedup {
    /// Drop a value equal to its predecessor.
    #[default]
    Adjacent,
    /// Keep only the first occurrence of each value.
    Full,
}

/// Split a comma-joined media-type column.
///
/// An empty column yields no media types.
pub fn parse_media_types(joined: &str, strategy: MediaTypeDedup) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }

    let mut media_types: Vec<String> = Vec::new();
    for media_type in joined.split(',') {
        let seen = match strategy {
            MediaTypeDedup::Adjacent => media_types.last().map(String::as_str) == Some(media_type),
            MediaTypeDedup::Full => media_types.iter().any(|m| m == media_type),
        };
        if !seen {
            media_types.push(media_type.to_string());
        }
    }
    media_types
}

/// Collection catalog over a borrowed storage engine.
pub struct CollectionCatalog<'a> {
    engine: &'a dyn StorageEngine,
    dedup: MediaTypeDedup,
}

impl<'a> CollectionCatalog<'a> {
    /// Create a catalog with adjacent media-type deduplication.
    pub fn new(engine: &'a dyn StorageEngine) -> Self {
        Self {
            engine,
            dedup: MediaTypeDedup::default(),
        }
    }

    /// Use a different media-type deduplication strategy.
    pub fn with_dedup(mut self, dedup: MediaTypeDedup) -> Self {
        self.dedup = dedup;
        self
    }

    /// Enumerate collections admitted by `mode`, in engine order.
    ///
    /// # Errors
    ///
    /// - `StoreExecution` if the engine fails
    /// - `Scan` if a row cannot be decoded; nothing is returned in that case
    #[instrument(skip(self, mode), fields(mode = %mode))]
    pub fn list(&self, mode: VisibilityMode) -> Result<Collections, DatastoreError> {
        let rows = self
            .engine
            .select_collections(mode)
            .map_err(|e| DatastoreError::store("select collections", e))?;

        let mut collections = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatastoreError::store("select collections", e))?;
            collections.push(self.decode(row)?);
        }

        debug!(count = collections.len(), "Enumerated collections");
        Ok(Collections::from(collections))
    }

    /// Every collection, for administration.
    pub fn all(&self) -> Result<Collections, DatastoreError> {
        self.list(VisibilityMode::All)
    }

    /// Enabled collections, hidden ones included.
    pub fn all_enabled(&self) -> Result<Collections, DatastoreError> {
        self.list(VisibilityMode::AllEnabled)
    }

    /// Enabled, non-hidden collections, as shown to clients.
    pub fn enabled_visible(&self) -> Result<Collections, DatastoreError> {
        self.list(VisibilityMode::EnabledVisible)
    }

    /// Find an enabled collection by ID, whether hidden or not.
    ///
    /// Only the matching row is read, so a malformed row elsewhere in the
    /// catalog does not affect the lookup.
    ///
    /// # Errors
    ///
    /// - `StoreExecution` if the engine fails
    /// - `Scan` if the matching row cannot be decoded
    #[instrument(skip(self, id), fields(collection = %id))]
    pub fn find_enabled(&self, id: &CollectionId) -> Result<Option<Collection>, DatastoreError> {
        let row = self
            .engine
            .select_collection(id.as_str())
            .map_err(|e| DatastoreError::store("select collection", e))?;

        match row {
            Some(row) if row.enabled => self.decode(row).map(Some),
            _ => Ok(None),
        }
    }

    /// Store a new collection and its media types.
    ///
    /// The collection is stamped with the current time, which is returned.
    /// `collection.date_added` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreExecution` if the base row or any media-type row fails.
    /// A media-type failure leaves the base row in place.
    #[instrument(skip(self, collection), fields(collection = %collection.id))]
    pub fn add(&self, collection: &Collection) -> Result<Timestamp, DatastoreError> {
        let date_added = Timestamp::now();
        let row = NewCollectionRow {
            date_added,
            id: collection.id.to_string(),
            title: collection.title.clone(),
            description: collection.description.clone(),
            enabled: collection.enabled,
            hidden: collection.hidden,
            can_read: collection.can_read,
            can_write: collection.can_write,
        };

        self.engine
            .insert_collection(&row)
            .map_err(|e| DatastoreError::store("insert collection", e))?;

        for media_type in &collection.media_types {
            if let Err(e) = self
                .engine
                .insert_collection_media_type(collection.id.as_str(), media_type)
            {
                warn!(
                    media_type = %media_type,
                    error = %e,
                    "Collection stored without all of its media types"
                );
                return Err(DatastoreError::store("insert collection media type", e));
            }
        }

        debug!(media_types = collection.media_types.len(), "Added collection");
        Ok(date_added)
    }

    fn decode(&self, row: CollectionRow) -> Result<Collection, DatastoreError> {
        let id = CollectionId::new(row.id).map_err(|e| DatastoreError::Scan(e.to_string()))?;
        let date_added = Timestamp::parse(&row.date_added).map_err(|e| {
            DatastoreError::Scan(format!("collection {}: {}", id, e))
        })?;

        Ok(Collection {
            id,
            title: row.title,
            description: row.description,
            enabled: row.enabled,
            hidden: row.hidden,
            can_read: row.can_read,
            can_write: row.can_write,
            media_types: parse_media_types(&row.media_types, self.dedup),
            date_added: Some(date_added),
        })
    }
}
