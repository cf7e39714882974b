//! Integration tests for the datastore.
//!
//! These tests drive the public `Datastore` facade end to end against the
//! in-memory store: collection setup, record linkage, windowed queries and
//! bundle assembly.

use serde_json::{json, Value};
use tempfile::TempDir;

use taxii_datastore::core::config::Config;
use taxii_datastore::core::filter::RawFilters;
use taxii_datastore::core::types::{CollectionId, ObjectId};
use taxii_datastore::datastore::{Datastore, ErrorKind, Query};
use taxii_datastore::resources::Collection;
use taxii_datastore::store::{CollectionRow, FailOn, MemoryStore, MockOperation, StoreError};

// =============================================================================
// Test Helpers
// =============================================================================

/// A store plus the config a server would load.
struct TestServer {
    store: MemoryStore,
    config: Config,
    _dir: TempDir,
}

impl TestServer {
    /// Create a server whose config file holds `toml`.
    fn with_config(toml: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).expect("write config");
        let config = Config::load_from(&path).expect("load config");

        Self {
            store: MemoryStore::new(),
            config,
            _dir: dir,
        }
    }

    fn new() -> Self {
        Self::with_config("")
    }

    fn datastore(&self) -> Datastore<'_> {
        Datastore::new(&self.store, &self.store, &self.config)
    }

    /// Add an enabled, visible collection.
    fn add_collection(&self, id: &str) -> CollectionId {
        let id = CollectionId::new(id).expect("collection id");
        self.datastore()
            .add_collection(&Collection::new(id.clone(), "Test Collection"))
            .expect("add collection");
        id
    }

    /// Store `count` objects and link each with strictly increasing added times.
    fn seed(&self, collection: &CollectionId, count: usize) -> Vec<ObjectId> {
        (0..count)
            .map(|i| {
                let id = format!("indicator--{}", uuid::Uuid::new_v4());
                let (id, _) = self
                    .store
                    .put_object(json!({
                        "type": "indicator",
                        "spec_version": "2.1",
                        "id": id,
                        "created": "2019-01-01T00:00:00Z",
                        "modified": "2019-01-01T00:00:00Z",
                    }))
                    .expect("put object");
                self.store
                    .put_record_row(
                        &format!("2020-01-01T00:00:{:02}.000000Z", i),
                        collection.as_str(),
                        id.as_str(),
                    )
                    .expect("put record");
                id
            })
            .collect()
    }
}

fn object_ids(objects: &[Value]) -> Vec<&str> {
    objects
        .iter()
        .map(|o| o["id"].as_str().expect("id"))
        .collect()
}

// =============================================================================
// Windowing
// =============================================================================

#[test]
fn server_ceiling_pages_unranged_request() {
    let server = TestServer::with_config("[query]\nrange_max = 4\n");
    let c = server.add_collection("c");
    let ids = server.seed(&c, 10);

    let page = server.datastore().object_list(&Query::new(c)).unwrap();

    assert_eq!(page.body.len(), 4);
    let returned: Vec<&ObjectId> = page.body.iter().map(|e| &e.id).collect();
    let earliest: Vec<&ObjectId> = ids.iter().take(4).collect();
    assert_eq!(returned, earliest);

    assert_eq!(page.metadata.size, 10);
    assert_eq!(page.metadata.range_begin, 0);
    assert_eq!(page.metadata.range_end, 3);
    assert_eq!(
        page.metadata.date_added_first.to_string(),
        "2020-01-01T00:00:00.000000Z"
    );
    assert_eq!(
        page.metadata.date_added_last.to_string(),
        "2020-01-01T00:00:03.000000Z"
    );
}

#[test]
fn explicit_range_truncated_by_ceiling() {
    let server = TestServer::with_config("[query]\nrange_max = 3\n");
    let c = server.add_collection("c");
    server.seed(&c, 10);

    let page = server
        .datastore()
        .manifest(&Query::new(c).with_range(2, 9))
        .unwrap();

    assert_eq!(page.body.len(), 3);
    assert_eq!((page.metadata.range_begin, page.metadata.range_end), (2, 4));
    assert_eq!(page.metadata.content_range(), "items 2-4/10");
}

#[test]
fn paging_walks_whole_set() {
    let server = TestServer::with_config("[query]\nrange_max = 4\n");
    let c = server.add_collection("c");
    let ids = server.seed(&c, 10);
    let ds = server.datastore();

    let mut seen = Vec::new();
    let mut first = 0;
    loop {
        let page = ds
            .object_list(&Query::new(c.clone()).with_range(first, first + 3))
            .unwrap();
        seen.extend(page.body.into_iter().map(|e| e.id));
        if !page.metadata.more() {
            break;
        }
        first = page.metadata.range_end as i64 + 1;
    }

    assert_eq!(seen, ids);
}

#[test]
fn start_beyond_set_is_out_of_range() {
    let server = TestServer::new();
    let c = server.add_collection("c");
    server.seed(&c, 3);

    let err = server
        .datastore()
        .object_list(&Query::new(c).with_range(3, 5))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn empty_collection_is_empty_result_even_with_range() {
    let server = TestServer::new();
    let c = server.add_collection("c");

    let err = server
        .datastore()
        .object_list(&Query::new(c).with_range(5, 9))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyResult);
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn client_enumeration_skips_hidden_and_disabled() {
    let server = TestServer::new();
    let ds = server.datastore();
    for (id, enabled, hidden) in [("a", true, false), ("b", true, true), ("c", false, false)] {
        ds.add_collection(&Collection {
            enabled,
            hidden,
            ..Collection::new(CollectionId::new(id).unwrap(), id)
        })
        .unwrap();
    }

    assert_eq!(ds.all_collections().unwrap().len(), 3);
    assert_eq!(ds.all_enabled_collections().unwrap().len(), 2);
    let visible = ds.collections().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible.collections[0].id.as_str(), "a");

    // hidden stays queryable by ID
    let hidden = CollectionId::new("b").unwrap();
    assert!(ds.collection(&hidden).is_ok());
}

#[test]
fn collection_json_shape() {
    let server = TestServer::new();
    let ds = server.datastore();
    let mut c = Collection::new(CollectionId::new("c").unwrap(), "C");
    c.can_write = true;
    c.media_types = vec!["application/stix+json;version=2.1".into()];
    ds.add_collection(&c).unwrap();

    let json = serde_json::to_value(ds.collections().unwrap()).unwrap();
    let first = &json["collections"][0];
    assert_eq!(first["canWrite"], true);
    assert_eq!(first["mediaTypes"][0], "application/stix+json;version=2.1");
    let added = first["dateAdded"].as_str().unwrap();
    assert!(added.ends_with('Z'));
    assert_eq!(added.split('.').nth(1).map(str::len), Some(7));
}

#[test]
fn healthy_collection_queryable_next_to_bad_row() {
    let server = TestServer::new();
    let good = server.add_collection("good");
    server.seed(&good, 1);
    server
        .store
        .put_collection_row(CollectionRow {
            date_added: "garbage".into(),
            enabled: true,
            hidden: false,
            id: "other".into(),
            title: "Other".into(),
            description: String::new(),
            can_read: true,
            can_write: false,
            media_types: String::new(),
        })
        .unwrap();
    let ds = server.datastore();

    assert!(ds.collection(&good).is_ok());
    let page = ds.object_list(&Query::new(good)).unwrap();
    assert_eq!(page.body.len(), 1);

    // the bad row itself still surfaces as a scan error
    let other = CollectionId::new("other").unwrap();
    assert_eq!(ds.collection(&other).unwrap_err().kind(), ErrorKind::Scan);
}

// =============================================================================
// Bundles
// =============================================================================

#[test]
fn bundle_follows_list_order() {
    let server = TestServer::with_config("[query]\nrange_max = 100\n");
    let c = server.add_collection("c");
    let ids = server.seed(&c, 5);
    let ds = server.datastore();

    let list = ds.object_list(&Query::new(c.clone())).unwrap();
    let bundle = ds.bundle(&Query::new(c)).unwrap();

    let expected: Vec<&str> = ids.iter().map(ObjectId::as_str).collect();
    assert_eq!(object_ids(&bundle.body.objects), expected);
    assert_eq!(bundle.metadata, list.metadata);
    assert!(bundle.body.id.starts_with("bundle--"));
}

#[test]
fn bundle_aborts_on_failed_fetch() {
    let server = TestServer::with_config("[query]\nrange_max = 100\n");
    let c = server.add_collection("c");
    let ids = server.seed(&c, 3);

    server.store.fail_on(FailOn::Fetch {
        id: ids[1].to_string(),
        error: StoreError::NotFound(ids[1].to_string()),
    });

    let err = server.datastore().bundle(&Query::new(c)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn new_version_shows_up_through_existing_link() {
    let server = TestServer::with_config("[query]\nrange_max = 100\n");
    let c = server.add_collection("c");
    let ds = server.datastore();

    let (id, _) = server
        .store
        .put_object(json!({"id": "malware--31b940d4-6f7f-459a-80ea-9c1f17b58abc", "modified": "2020-01-01T00:00:00Z"}))
        .unwrap();
    ds.add_object_to_collection(&c, &id).unwrap();
    server
        .store
        .put_object(json!({"id": id.as_str(), "modified": "2021-01-01T00:00:00Z", "name": "v2"}))
        .unwrap();

    let bundle = ds.bundle(&Query::new(c.clone())).unwrap();
    assert_eq!(bundle.body.objects.len(), 1);
    assert_eq!(bundle.body.objects[0]["name"], "v2");

    let first = ds
        .bundle(&Query::new(c).with_filters(RawFilters {
            match_version: Some("first".into()),
            ..Default::default()
        }))
        .unwrap();
    assert!(first.body.objects[0].get("name").is_none());
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn malformed_filter_rejected_before_engine() {
    let server = TestServer::with_config("[query]\nenforce_enabled = false\n");
    let c = CollectionId::new("c").unwrap();
    server.store.clear_operations();

    let err = server
        .datastore()
        .object_list(&Query::new(c).with_filters(RawFilters {
            added_after: Some("not-a-time".into()),
            ..Default::default()
        }))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryBuild);
    assert!(!server
        .store
        .operations()
        .iter()
        .any(|op| matches!(op, MockOperation::SelectEntries { .. })));
}

#[test]
fn interrupted_cursor_returns_nothing_and_releases() {
    let server = TestServer::with_config("[query]\nrange_max = 100\n");
    let c = server.add_collection("c");
    server.seed(&c, 5);
    server.store.fail_on(FailOn::EntryCursorAfter(
        2,
        StoreError::Execution("connection reset".into()),
    ));

    let err = server.datastore().object_list(&Query::new(c)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreExecution);
    assert_eq!(server.store.open_cursors(), 0);
}

#[test]
fn duplicate_links_count_twice() {
    let server = TestServer::with_config("[query]\nrange_max = 100\n");
    let c = server.add_collection("c");
    let ids = server.seed(&c, 1);
    let ds = server.datastore();

    ds.add_object_to_collection(&c, &ids[0]).unwrap();
    let page = ds.object_list(&Query::new(c)).unwrap();
    assert_eq!(page.metadata.size, 2);
    assert_eq!(page.body[0].id, page.body[1].id);
}
