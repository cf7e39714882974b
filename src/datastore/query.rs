//! datastore::query
//!
//! Filtered, windowed queries over a collection's linked objects.
//!
//! # Pipeline
//!
//! [`ObjectIndexQuery`] and [`ManifestQuery`] share one pipeline:
//!
//! 1. Build an [`EntryPredicate`] from the raw filters. A malformed filter
//!    fails here, before the engine is touched.
//! 2. Execute it. Rows arrive ordered by added time.
//! 3. Decode every row. The first bad row aborts the query.
//! 4. An empty set fails with `EmptyResult`; no metadata is computed.
//! 5. Resolve the requested range against the set size.
//! 6. Slice the set to the window and describe the slice.
//!
//! `size` in the metadata counts the whole matching set. The added-time
//! bounds describe the returned slice only.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::DatastoreError;
use crate::core::config::schema::MAX_RANGE_MAX;
use crate::core::filter::{EntryPredicate, RawFilters};
use crate::core::range::resolve;
use crate::core::types::{CollectionId, ObjectId, Timestamp};
use crate::resources::{Manifest, ManifestEntry};
use crate::store::{EntryRow, StorageEngine};

/// A query against one collection.
///
/// `range_begin`/`range_end` are the client's inclusive indices; leaving both
/// at 0 means "no range requested". `range_max` asks for a smaller page
/// than the server ceiling; it can never raise or remove that ceiling (see
/// [`effective_range_max`]).
///
/// # Example
///
/// ```
/// use taxii_datastore::core::types::CollectionId;
/// use taxii_datastore::datastore::Query;
///
/// let query = Query::new(CollectionId::new("intel").unwrap())
///     .with_range(10, 19)
///     .with_range_max(5);
/// assert_eq!((query.range_begin, query.range_end), (10, 19));
/// assert_eq!(query.range_max, Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection_id: CollectionId,
    pub filters: RawFilters,
    pub range_begin: i64,
    pub range_end: i64,
    pub range_max: Option<usize>,
}

impl Query {
    /// A query for everything in the collection, no range requested.
    pub fn new(collection_id: CollectionId) -> Self {
        Self {
            collection_id,
            filters: RawFilters::default(),
            range_begin: 0,
            range_end: 0,
            range_max: None,
        }
    }

    /// Request the inclusive item range `first..=last`.
    pub fn with_range(mut self, first: i64, last: i64) -> Self {
        self.range_begin = first;
        self.range_end = last;
        self
    }

    /// Ask for a page ceiling below the server's.
    pub fn with_range_max(mut self, max: usize) -> Self {
        self.range_max = Some(max);
        self
    }

    /// Apply raw client filters.
    pub fn with_filters(mut self, filters: RawFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// One matching (object, version) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectListEntry {
    pub id: ObjectId,
    pub date_added: Timestamp,
    pub version: Timestamp,
    pub spec_version: String,
}

impl From<ObjectListEntry> for ManifestEntry {
    fn from(entry: ObjectListEntry) -> Self {
        ManifestEntry {
            id: entry.id,
            date_added: entry.date_added,
            version: entry.version,
            spec_version: entry.spec_version,
        }
    }
}

/// Facts about a returned window, for range and pagination headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultMetadata {
    /// Number of matching entries before windowing.
    pub size: usize,
    /// Index of the first returned entry.
    pub range_begin: usize,
    /// Index of the last returned entry (inclusive).
    pub range_end: usize,
    /// Added time of the first returned entry.
    pub date_added_first: Timestamp,
    /// Added time of the last returned entry.
    pub date_added_last: Timestamp,
}

impl QueryResultMetadata {
    /// Render as a `Content-Range` value, e.g. `items 0-3/10`.
    pub fn content_range(&self) -> String {
        format!("items {}-{}/{}", self.range_begin, self.range_end, self.size)
    }

    /// Check whether entries beyond this window matched.
    pub fn more(&self) -> bool {
        self.range_end + 1 < self.size
    }
}

/// A query response body with its window metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<T> {
    pub body: T,
    pub metadata: QueryResultMetadata,
}

/// Object-list query.
pub struct ObjectIndexQuery<'a> {
    engine: &'a dyn StorageEngine,
    range_max: usize,
}

impl<'a> ObjectIndexQuery<'a> {
    /// Create a query runner with no server ceiling.
    pub fn new(engine: &'a dyn StorageEngine) -> Self {
        Self {
            engine,
            range_max: 0,
        }
    }

    /// Set the server ceiling. A query can only narrow it.
    pub fn with_range_max(mut self, range_max: usize) -> Self {
        self.range_max = range_max;
        self
    }

    /// Run a query and return the windowed entries.
    ///
    /// # Errors
    ///
    /// `QueryBuild`, `StoreExecution`, `Scan`, `EmptyResult`, `InvalidRange`
    /// or `OutOfRange`; see the module docs for where each arises.
    pub fn run(&self, query: &Query) -> Result<QueryPage<Vec<ObjectListEntry>>, DatastoreError> {
        let (body, metadata) = windowed_entries(self.engine, query, self.range_max)?;
        Ok(QueryPage { body, metadata })
    }
}

/// Manifest query.
///
/// Same pipeline and metadata as [`ObjectIndexQuery`], materialized as
/// manifest entries.
pub struct ManifestQuery<'a> {
    engine: &'a dyn StorageEngine,
    range_max: usize,
}

impl<'a> ManifestQuery<'a> {
    pub fn new(engine: &'a dyn StorageEngine) -> Self {
        Self {
            engine,
            range_max: 0,
        }
    }

    pub fn with_range_max(mut self, range_max: usize) -> Self {
        self.range_max = range_max;
        self
    }

    pub fn run(&self, query: &Query) -> Result<QueryPage<Manifest>, DatastoreError> {
        let (entries, metadata) = windowed_entries(self.engine, query, self.range_max)?;
        let body = Manifest::from(
            entries
                .into_iter()
                .map(ManifestEntry::from)
                .collect::<Vec<_>>(),
        );
        Ok(QueryPage { body, metadata })
    }
}

#[instrument(
    skip(engine, query, default_max),
    fields(collection = %query.collection_id, first = query.range_begin, last = query.range_end)
)]
fn windowed_entries(
    engine: &dyn StorageEngine,
    query: &Query,
    default_max: usize,
) -> Result<(Vec<ObjectListEntry>, QueryResultMetadata), DatastoreError> {
    let predicate = EntryPredicate::build(&query.collection_id, &query.filters)?;

    let rows = engine
        .select_entries(&predicate)
        .map_err(|e| DatastoreError::store("select entries", e))?;

    let mut entries = Vec::new();
    for row in rows {
        let row = row.map_err(|e| DatastoreError::store("select entries", e))?;
        entries.push(decode_entry(row)?);
    }

    if entries.is_empty() {
        return Err(DatastoreError::EmptyResult {
            collection_id: query.collection_id.to_string(),
        });
    }

    let size = entries.len();
    let max = effective_range_max(query.range_max, default_max);
    let window = resolve(query.range_begin, query.range_end, max, size)?;
    debug!(size, max, start = window.start, end = window.end, "Resolved result window");

    entries.truncate(window.end);
    entries.drain(..window.start);

    let (date_added_first, date_added_last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first.date_added, last.date_added),
        _ => {
            return Err(DatastoreError::EmptyResult {
                collection_id: query.collection_id.to_string(),
            })
        }
    };

    let metadata = QueryResultMetadata {
        size,
        range_begin: window.start,
        range_end: window.last(),
        date_added_first,
        date_added_last,
    };
    Ok((entries, metadata))
}

/// Combine a per-query page ceiling with the server ceiling.
///
/// A query may only narrow the page. `None` or `Some(0)` keeps the server
/// ceiling. With a server ceiling the request is clamped to it; without one
/// the request is clamped to [`MAX_RANGE_MAX`].
///
/// ```
/// use taxii_datastore::datastore::query::effective_range_max;
///
/// assert_eq!(effective_range_max(None, 100), 100);
/// assert_eq!(effective_range_max(Some(0), 100), 100);
/// assert_eq!(effective_range_max(Some(10), 100), 10);
/// assert_eq!(effective_range_max(Some(500), 100), 100);
/// assert_eq!(effective_range_max(Some(500), 0), 500);
/// ```
pub fn effective_range_max(requested: Option<usize>, ceiling: usize) -> usize {
    match requested {
        None | Some(0) => ceiling,
        Some(n) if ceiling == 0 => n.min(MAX_RANGE_MAX),
        Some(n) => n.min(ceiling),
    }
}

fn decode_entry(row: EntryRow) -> Result<ObjectListEntry, DatastoreError> {
    let scan = |e: crate::core::types::TypeError| DatastoreError::Scan(e.to_string());
    Ok(ObjectListEntry {
        id: ObjectId::new(row.id).map_err(scan)?,
        date_added: Timestamp::parse(&row.date_added).map_err(scan)?,
        version: Timestamp::parse(&row.version).map_err(scan)?,
        spec_version: row.spec_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::error::ErrorKind;
    use crate::store::{FailOn, MemoryStore, MockOperation, StoreError};
    use serde_json::json;

    const IDS: [&str; 3] = [
        "indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f",
        "malware--31b940d4-6f7f-459a-80ea-9c1f17b58abc",
        "report--84e4d88f-44ea-4bcd-bbf3-b2c1c320bcb3",
    ];

    fn collection() -> CollectionId {
        CollectionId::new("c1").unwrap()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (i, id) in IDS.iter().enumerate() {
            store
                .put_object(json!({
                    "id": id,
                    "spec_version": "2.1",
                    "modified": format!("2019-0{}-01T00:00:00Z", i + 1),
                }))
                .unwrap();
            store
                .put_record_row(&format!("2020-01-0{}T00:00:00.000000Z", i + 1), "c1", id)
                .unwrap();
        }
        store
    }

    #[test]
    fn whole_set_without_ceiling() {
        let store = seeded();
        let page = ObjectIndexQuery::new(&store).run(&Query::new(collection())).unwrap();

        // (0, 0) without a ceiling is "first record only"
        assert_eq!(page.body.len(), 1);
        assert_eq!(page.metadata.size, 3);
        assert_eq!((page.metadata.range_begin, page.metadata.range_end), (0, 0));
    }

    #[test]
    fn explicit_range() {
        let store = seeded();
        let query = Query::new(collection()).with_range(1, 5);
        let page = ObjectIndexQuery::new(&store).run(&query).unwrap();

        let ids: Vec<&str> = page.body.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![IDS[1], IDS[2]]);
        assert_eq!(page.metadata.range_begin, 1);
        assert_eq!(page.metadata.range_end, 2);
        assert_eq!(
            page.metadata.date_added_first.to_string(),
            "2020-01-02T00:00:00.000000Z"
        );
        assert_eq!(
            page.metadata.date_added_last.to_string(),
            "2020-01-03T00:00:00.000000Z"
        );
        assert!(!page.metadata.more());
    }

    #[test]
    fn query_ceiling_only_narrows() {
        let store = seeded();
        let runner = ObjectIndexQuery::new(&store).with_range_max(2);

        let page = runner.run(&Query::new(collection())).unwrap();
        assert_eq!(page.body.len(), 2);
        assert_eq!(page.metadata.content_range(), "items 0-1/3");

        let page = runner
            .run(&Query::new(collection()).with_range_max(1))
            .unwrap();
        assert_eq!(page.body.len(), 1);
        assert!(page.metadata.more());

        // neither a larger value nor 0 lifts the server ceiling
        for max in [0, 3, usize::MAX] {
            let page = runner
                .run(&Query::new(collection()).with_range_max(max))
                .unwrap();
            assert_eq!(page.body.len(), 2, "range_max {}", max);
        }
    }

    #[test]
    fn effective_range_max_without_server_ceiling() {
        assert_eq!(effective_range_max(None, 0), 0);
        assert_eq!(effective_range_max(Some(0), 0), 0);
        assert_eq!(effective_range_max(Some(7), 0), 7);
        assert_eq!(effective_range_max(Some(usize::MAX), 0), MAX_RANGE_MAX);
    }

    #[test]
    fn empty_set_is_empty_result() {
        let store = MemoryStore::new();
        let err = ObjectIndexQuery::new(&store)
            .run(&Query::new(collection()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn range_errors_propagate() {
        let store = seeded();
        let runner = ObjectIndexQuery::new(&store);

        let err = runner
            .run(&Query::new(collection()).with_range(-1, 2))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);

        let err = runner
            .run(&Query::new(collection()).with_range(3, 4))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn bad_filter_never_reaches_engine() {
        let store = seeded();
        store.clear_operations();
        let query = Query::new(collection()).with_filters(RawFilters {
            match_version: Some("all,first".into()),
            ..Default::default()
        });

        let err = ObjectIndexQuery::new(&store).run(&query).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryBuild);
        assert!(store.operations().is_empty());
    }

    #[test]
    fn filters_narrow_the_set() {
        let store = seeded();
        let query = Query::new(collection())
            .with_range_max(10)
            .with_filters(RawFilters {
                match_type: Some("malware,report".into()),
                ..Default::default()
            });
        let page = ObjectIndexQuery::new(&store).run(&query).unwrap();
        assert_eq!(page.metadata.size, 2);
        assert_eq!(page.body[0].id.as_str(), IDS[1]);
    }

    #[test]
    fn engine_failure_is_store_execution() {
        let store = seeded();
        store.fail_on(FailOn::SelectEntries(StoreError::Execution("locked".into())));
        let err = ObjectIndexQuery::new(&store)
            .run(&Query::new(collection()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreExecution);
    }

    #[test]
    fn bad_row_is_scan_error_and_releases_cursor() {
        let store = seeded();
        store
            .put_record_row("2019-12-31T00:00:00.000000Z", "c1", "note--bad")
            .unwrap();
        store
            .put_object_row("note--bad", "2019-01-01T00:00:00Z", "2.1", json!({}))
            .unwrap();

        let err = ObjectIndexQuery::new(&store)
            .run(&Query::new(collection()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scan);
        assert_eq!(store.open_cursors(), 0);
    }

    #[test]
    fn manifest_matches_object_list() {
        let store = seeded();
        let query = Query::new(collection()).with_range(0, 2);
        let list = ObjectIndexQuery::new(&store).run(&query).unwrap();
        let manifest = ManifestQuery::new(&store).run(&query).unwrap();

        assert_eq!(list.metadata, manifest.metadata);
        assert_eq!(manifest.body.len(), 3);
        for (entry, line) in list.body.iter().zip(&manifest.body.objects) {
            assert_eq!(entry.id, line.id);
            assert_eq!(entry.version, line.version);
            assert_eq!(entry.date_added, line.date_added);
        }
        assert!(store
            .operations()
            .iter()
            .all(|op| matches!(op, MockOperation::SelectEntries { .. })));
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let store = seeded();
        let page = ObjectIndexQuery::new(&store)
            .run(&Query::new(collection()).with_range(0, 1))
            .unwrap();
        let json = serde_json::to_value(page.metadata).unwrap();
        assert_eq!(json["size"], 3);
        assert_eq!(json["rangeBegin"], 0);
        assert_eq!(json["rangeEnd"], 1);
        assert_eq!(json["dateAddedFirst"], "2020-01-01T00:00:00.000000Z");
    }
}
