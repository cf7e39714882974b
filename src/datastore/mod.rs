//! datastore
//!
//! Collection catalog and query core.
//!
//! # Architecture
//!
//! [`Datastore`] is a per-request facade over borrowed handles: a
//! [`StorageEngine`], an [`ObjectStore`] and the loaded [`Config`]. It keeps
//! no state of its own, so one is built for each request and dropped with it.
//!
//! Read paths:
//!
//! - Collection enumeration goes through [`CollectionCatalog`]
//! - Object lists and manifests go through [`ObjectIndexQuery`] and
//!   [`ManifestQuery`]
//! - Bundles run an object-list query and hand the window to
//!   [`BundleAssembler`]
//!
//! Query paths first require the collection to be enabled (hidden is fine)
//! unless `query.enforce_enabled` is switched off.
//!
//! Write paths ([`Datastore::add_collection`],
//! [`Datastore::add_object_to_collection`]) are independent ingestion
//! operations.
//!
//! # Modules
//!
//! - [`catalog`]: Collection enumeration and creation
//! - [`query`]: Object-list and manifest queries
//! - [`bundle`]: Bundle assembly
//! - [`records`]: Collection record linkage
//! - [`error`]: Error taxonomy
//!
//! # Example
//!
//! ```
//! use taxii_datastore::core::config::Config;
//! use taxii_datastore::core::types::{CollectionId, ObjectId};
//! use taxii_datastore::datastore::{Datastore, Query};
//! use taxii_datastore::resources::Collection;
//! use taxii_datastore::store::MemoryStore;
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! let config = Config::default();
//! let ds = Datastore::new(&store, &store, &config);
//!
//! let id = CollectionId::new("intel").unwrap();
//! ds.add_collection(&Collection::new(id.clone(), "Intel")).unwrap();
//!
//! let (object, _) = store.put_object(json!({
//!     "id": "indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f",
//!     "modified": "2016-04-06T20:03:48.000Z",
//! })).unwrap();
//! ds.add_object_to_collection(&id, &object).unwrap();
//!
//! let page = ds.bundle(&Query::new(id)).unwrap();
//! assert_eq!(page.body.objects.len(), 1);
//! assert_eq!(page.metadata.size, 1);
//! ```

pub mod bundle;
pub mod catalog;
pub mod error;
pub mod query;
pub mod records;

pub use bundle::BundleAssembler;
pub use catalog::{CollectionCatalog, MediaTypeDedup};
pub use error::{DatastoreError, ErrorKind};
pub use query::{
    ManifestQuery, ObjectIndexQuery, ObjectListEntry, Query, QueryPage, QueryResultMetadata,
};
pub use records::{CollectionRecord, CollectionRecordWriter};

use tracing::instrument;

use crate::core::config::Config;
use crate::core::types::{CollectionId, ObjectId, Timestamp};
use crate::resources::{Bundle, Collection, Collections, Manifest};
use crate::store::{ObjectStore, StorageEngine};

/// Per-request datastore facade.
pub struct Datastore<'a> {
    engine: &'a dyn StorageEngine,
    objects: &'a dyn ObjectStore,
    config: &'a Config,
}

impl<'a> Datastore<'a> {
    pub fn new(
        engine: &'a dyn StorageEngine,
        objects: &'a dyn ObjectStore,
        config: &'a Config,
    ) -> Self {
        Self {
            engine,
            objects,
            config,
        }
    }

    /// A catalog using the configured media-type deduplication.
    pub fn catalog(&self) -> CollectionCatalog<'a> {
        CollectionCatalog::new(self.engine).with_dedup(self.config.media_type_dedup())
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Every collection, disabled and hidden ones included.
    pub fn all_collections(&self) -> Result<Collections, DatastoreError> {
        self.catalog().all()
    }

    /// Enabled collections, hidden ones included.
    pub fn all_enabled_collections(&self) -> Result<Collections, DatastoreError> {
        self.catalog().all_enabled()
    }

    /// Collections shown to clients: enabled and not hidden.
    pub fn collections(&self) -> Result<Collections, DatastoreError> {
        self.catalog().enabled_visible()
    }

    /// Look up one enabled collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionUnavailable` if no enabled collection has this ID.
    pub fn collection(&self, id: &CollectionId) -> Result<Collection, DatastoreError> {
        self.catalog()
            .find_enabled(id)?
            .ok_or_else(|| DatastoreError::CollectionUnavailable(id.to_string()))
    }

    /// Store a new collection. Returns its creation stamp.
    pub fn add_collection(&self, collection: &Collection) -> Result<Timestamp, DatastoreError> {
        self.catalog().add(collection)
    }

    /// Link an object's stable ID to a collection.
    pub fn add_object_to_collection(
        &self,
        collection_id: &CollectionId,
        object_id: &ObjectId,
    ) -> Result<CollectionRecord, DatastoreError> {
        CollectionRecordWriter::new(self.engine).link(collection_id, object_id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Windowed object list for a query.
    pub fn object_list(
        &self,
        query: &Query,
    ) -> Result<QueryPage<Vec<ObjectListEntry>>, DatastoreError> {
        self.ensure_enabled(&query.collection_id)?;
        ObjectIndexQuery::new(self.engine)
            .with_range_max(self.config.range_max())
            .run(query)
    }

    /// Windowed manifest for a query.
    pub fn manifest(&self, query: &Query) -> Result<QueryPage<Manifest>, DatastoreError> {
        self.ensure_enabled(&query.collection_id)?;
        ManifestQuery::new(self.engine)
            .with_range_max(self.config.range_max())
            .run(query)
    }

    /// Windowed bundle of full objects for a query.
    ///
    /// The metadata describes the object-list window the bundle was built
    /// from; bundle order is that window's order.
    #[instrument(skip(self, query), fields(collection = %query.collection_id))]
    pub fn bundle(&self, query: &Query) -> Result<QueryPage<Bundle>, DatastoreError> {
        let page = self.object_list(query)?;
        let body = BundleAssembler::new(self.objects).assemble(&page.body)?;
        Ok(QueryPage {
            body,
            metadata: page.metadata,
        })
    }

    /// Bundle of one object's versions within a collection.
    ///
    /// Any `match_id` filter on the query is replaced by `object_id`; the
    /// other filters (version, spec version, added time) still apply.
    pub fn object(
        &self,
        query: &Query,
        object_id: &ObjectId,
    ) -> Result<QueryPage<Bundle>, DatastoreError> {
        let mut query = query.clone();
        query.filters.match_id = Some(object_id.to_string());
        self.bundle(&query)
    }

    fn ensure_enabled(&self, id: &CollectionId) -> Result<(), DatastoreError> {
        if self.config.enforce_enabled() {
            self.collection(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DatastoreConfig, QueryConfig};
    use crate::core::filter::RawFilters;
    use crate::store::MemoryStore;
    use serde_json::json;

    const OBJ: &str = "indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f";

    fn config(range_max: usize, enforce_enabled: bool) -> Config {
        Config::new(DatastoreConfig {
            query: Some(QueryConfig {
                range_max: Some(range_max),
                enforce_enabled: Some(enforce_enabled),
            }),
            ..Default::default()
        })
        .unwrap()
    }

    fn setup(store: &MemoryStore, enabled: bool) -> CollectionId {
        let id = CollectionId::new("c1").unwrap();
        let config = Config::default();
        let ds = Datastore::new(store, store, &config);
        ds.add_collection(&Collection {
            enabled,
            ..Collection::new(id.clone(), "One")
        })
        .unwrap();

        for modified in ["2020-01-01T00:00:00Z", "2021-01-01T00:00:00Z"] {
            store
                .put_object(json!({"id": OBJ, "spec_version": "2.1", "modified": modified}))
                .unwrap();
        }
        store.put_record_row("2022-01-01T00:00:00Z", "c1", OBJ).unwrap();
        id
    }

    #[test]
    fn disabled_collection_unavailable() {
        let store = MemoryStore::new();
        let id = setup(&store, false);
        let config = config(10, true);
        let ds = Datastore::new(&store, &store, &config);

        let err = ds.object_list(&Query::new(id.clone())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollectionUnavailable);
        let err = ds.manifest(&Query::new(id.clone())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollectionUnavailable);
        let err = ds.collection(&id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollectionUnavailable);
    }

    #[test]
    fn enforcement_can_be_switched_off() {
        let store = MemoryStore::new();
        let id = setup(&store, false);
        let config = config(10, false);
        let ds = Datastore::new(&store, &store, &config);

        let page = ds.object_list(&Query::new(id)).unwrap();
        assert_eq!(page.metadata.size, 1);
    }

    #[test]
    fn unknown_collection_unavailable() {
        let store = MemoryStore::new();
        let config = Config::default();
        let ds = Datastore::new(&store, &store, &config);
        let err = ds
            .manifest(&Query::new(CollectionId::new("nope").unwrap()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollectionUnavailable);
    }

    #[test]
    fn object_returns_requested_versions() {
        let store = MemoryStore::new();
        let id = setup(&store, true);
        let config = config(10, true);
        let ds = Datastore::new(&store, &store, &config);
        let object = ObjectId::new(OBJ).unwrap();

        let latest = ds.object(&Query::new(id.clone()), &object).unwrap();
        assert_eq!(latest.body.objects.len(), 1);
        assert_eq!(latest.body.objects[0]["modified"], "2021-01-01T00:00:00Z");

        let query = Query::new(id).with_filters(RawFilters {
            match_version: Some("all".into()),
            ..Default::default()
        });
        let all = ds.object(&query, &object).unwrap();
        assert_eq!(all.body.objects.len(), 2);
        assert_eq!(all.metadata.size, 2);
    }

    #[test]
    fn catalog_uses_configured_dedup() {
        let store = MemoryStore::new();
        let config = Config::new(
            toml::from_str("[catalog]\nmedia_type_dedup = \"full\"\n").unwrap(),
        )
        .unwrap();
        let ds = Datastore::new(&store, &store, &config);

        let mut c = Collection::new(CollectionId::new("c1").unwrap(), "One");
        c.media_types = vec!["a".into(), "b".into(), "a".into()];
        ds.add_collection(&c).unwrap();

        let listed = ds.collections().unwrap();
        assert_eq!(listed.collections[0].media_types, vec!["a", "b"]);
    }
}
