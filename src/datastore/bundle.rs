//! datastore::bundle
//!
//! Bundle assembly from object-list entries.

use tracing::{debug, instrument};

use super::error::DatastoreError;
use super::query::ObjectListEntry;
use crate::resources::Bundle;
use crate::store::{ObjectStore, StoreError};

/// Fetches full payloads for a list of entries.
pub struct BundleAssembler<'a> {
    objects: &'a dyn ObjectStore,
}

impl<'a> BundleAssembler<'a> {
    pub fn new(objects: &'a dyn ObjectStore) -> Self {
        Self { objects }
    }

    /// Fetch every entry's (ID, version) in order and bundle the payloads.
    ///
    /// Bundle order is entry order. The first failed fetch aborts assembly.
    ///
    /// # Errors
    ///
    /// - `NotFound` if a version is missing from the object store
    /// - `StoreExecution` for any other object-store failure
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub fn assemble(&self, entries: &[ObjectListEntry]) -> Result<Bundle, DatastoreError> {
        let mut objects = Vec::with_capacity(entries.len());
        for entry in entries {
            let payload = self
                .objects
                .fetch(&entry.id, &entry.version)
                .map_err(|e| match e {
                    StoreError::NotFound(what) => DatastoreError::NotFound(what),
                    other => DatastoreError::store("fetch object", other),
                })?;
            objects.push(payload);
        }

        let bundle = Bundle::with_objects(objects);
        debug!(bundle = %bundle.id, "Assembled bundle");
        Ok(bundle)
    }
}
