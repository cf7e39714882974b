//! datastore::records
//!
//! Linking objects into collections.
//!
//! A record links a *stable* object ID, so every version stored under that
//! ID, now or later, belongs to the collection. Linking the same object
//! twice stores two records; this module does not deduplicate.

use tracing::{debug, instrument};

use super::error::DatastoreError;
use crate::core::types::{CollectionId, ObjectId, Timestamp};
use crate::store::StorageEngine;

/// A stored collection record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRecord {
    pub collection_id: CollectionId,
    pub object_id: ObjectId,
    pub date_added: Timestamp,
}

/// Appends collection records.
pub struct CollectionRecordWriter<'a> {
    engine: &'a dyn StorageEngine,
}

impl<'a> CollectionRecordWriter<'a> {
    pub fn new(engine: &'a dyn StorageEngine) -> Self {
        Self { engine }
    }

    /// Link an object to a collection, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `StoreExecution` if the engine rejects the insert.
    #[instrument(skip(self, collection_id, object_id), fields(collection = %collection_id, object = %object_id))]
    pub fn link(
        &self,
        collection_id: &CollectionId,
        object_id: &ObjectId,
    ) -> Result<CollectionRecord, DatastoreError> {
        let date_added = Timestamp::now();
        self.engine
            .insert_collection_record(&date_added, collection_id.as_str(), object_id.as_str())
            .map_err(|e| DatastoreError::store("insert collection record", e))?;

        debug!(%date_added, "Linked object");
        Ok(CollectionRecord {
            collection_id: collection_id.clone(),
            object_id: object_id.clone(),
            date_added,
        })
    }
}
