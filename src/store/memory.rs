//! store::memory
//!
//! In-memory storage engine and object store.
//!
//! # Design
//!
//! `MemoryStore` implements both [`StorageEngine`] and [`ObjectStore`] over
//! four in-memory tables mirroring the relational schema:
//!
//! - collections
//! - collection media types (one row per accepted media type)
//! - collection records (collection ID, stable object ID, added time)
//! - objects (stable ID, version, spec version, payload)
//!
//! Entry queries join records with every stored version of the linked
//! stable ID, apply the predicate, and order by the added-time column. The
//! collection enumeration joins media types into one comma-separated column
//! the way a `GROUP_CONCAT` over the join would.
//!
//! For tests it also records operations, counts open cursors, and can be
//! told to fail a given operation.
//!
//! # Example
//!
//! ```
//! use taxii_datastore::store::{MemoryStore, ObjectStore};
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! let (id, version) = store.put_object(json!({
//!     "type": "indicator",
//!     "spec_version": "2.1",
//!     "id": "indicator--8e2e2d2b-17d4-4cbf-938f-98ee46b3cd3f",
//!     "created": "2016-04-06T20:03:48.000Z",
//!     "modified": "2016-04-06T20:03:48.000Z",
//! })).unwrap();
//!
//! let payload = store.fetch(&id, &version).unwrap();
//! assert_eq!(payload["type"], "indicator");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::traits::{
    CollectionRow, EntryRow, NewCollectionRow, ObjectStore, RowCursor, StorageEngine,
    StoreError, VisibilityMode,
};
use crate::core::filter::EntryPredicate;
use crate::core::types::{ObjectId, Timestamp};

/// Spec version assumed for payloads that do not carry one.
const DEFAULT_SPEC_VERSION: &str = "2.0";

/// In-memory store for tests and embedding.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Tables shared across clones.
    inner: Arc<Mutex<MemoryStoreInner>>,
    /// Number of cursors handed out and not yet dropped.
    open_cursors: Arc<AtomicUsize>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MemoryStoreInner {
    collections: Vec<StoredCollection>,
    media_types: Vec<(String, String)>,
    records: Vec<StoredRecord>,
    objects: Vec<StoredObject>,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone)]
struct StoredCollection {
    date_added: String,
    id: String,
    title: String,
    description: String,
    enabled: bool,
    hidden: bool,
    can_read: bool,
    can_write: bool,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    date_added: String,
    collection_id: String,
    object_id: String,
}

#[derive(Debug, Clone)]
struct StoredObject {
    id: String,
    version: String,
    spec_version: String,
    payload: Value,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail select_collections with the given error.
    SelectCollections(StoreError),
    /// Let select_collections yield this many rows, then the given error.
    CollectionCursorAfter(usize, StoreError),
    /// Fail select_collection with the given error.
    SelectCollection(StoreError),
    /// Fail insert_collection with the given error.
    InsertCollection(StoreError),
    /// Fail insert_collection_media_type with the given error.
    InsertMediaType(StoreError),
    /// Fail insert_collection_record with the given error.
    InsertRecord(StoreError),
    /// Fail select_entries with the given error.
    SelectEntries(StoreError),
    /// Let select_entries yield this many rows, then the given error.
    EntryCursorAfter(usize, StoreError),
    /// Fail fetch for this stable ID with the given error.
    Fetch { id: String, error: StoreError },
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    SelectCollections {
        mode: VisibilityMode,
    },
    SelectCollection {
        id: String,
    },
    InsertCollection {
        id: String,
    },
    InsertMediaType {
        collection_id: String,
        media_type: String,
    },
    InsertRecord {
        collection_id: String,
        object_id: String,
    },
    SelectEntries {
        collection_id: String,
    },
    Fetch {
        id: String,
        version: String,
    },
}

/// A cursor over rows materialized under the store lock.
struct MemoryCursor<T> {
    rows: std::vec::IntoIter<Result<T, StoreError>>,
    open: Arc<AtomicUsize>,
}

impl<T> MemoryCursor<T> {
    fn new(rows: Vec<Result<T, StoreError>>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            rows: rows.into_iter(),
            open,
        }
    }
}

impl<T> Iterator for MemoryCursor<T> {
    type Item = Result<T, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl<T> Drop for MemoryCursor<T> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Execution("memory store lock poisoned".into()))
    }

    /// Make an operation fail until [`clear_failure`](Self::clear_failure).
    pub fn fail_on(&self, fail_on: FailOn) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_on = Some(fail_on);
        }
    }

    /// Stop injecting failures.
    pub fn clear_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_on = None;
        }
    }

    /// Operations performed so far, oldest first.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner
            .lock()
            .map(|inner| inner.operations.clone())
            .unwrap_or_default()
    }

    /// Forget recorded operations.
    pub fn clear_operations(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.operations.clear();
        }
    }

    /// Number of cursors currently alive.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of collection records stored.
    pub fn record_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.records.len()).unwrap_or(0)
    }

    /// Store an object payload.
    ///
    /// The stable ID comes from `id`, the version from `modified` (falling
    /// back to `created`), the spec version from `spec_version` (falling
    /// back to 2.0). Returns the stored (ID, version) pair.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Constraint` if the payload lacks a valid ID or
    /// timestamp, or if that exact version is already stored.
    pub fn put_object(&self, payload: Value) -> Result<(ObjectId, Timestamp), StoreError> {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Constraint("object has no id".into()))
            .and_then(|id| ObjectId::new(id).map_err(|e| StoreError::Constraint(e.to_string())))?;

        let version = payload
            .get("modified")
            .or_else(|| payload.get("created"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::Constraint(format!("object {} has no modified or created time", id))
            })
            .and_then(|v| Timestamp::parse(v).map_err(|e| StoreError::Constraint(e.to_string())))?;

        let spec_version = payload
            .get("spec_version")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SPEC_VERSION)
            .to_string();

        let mut inner = self.lock()?;
        let duplicate = inner.objects.iter().any(|o| {
            o.id == id.as_str() && Timestamp::parse(&o.version).ok() == Some(version)
        });
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "object {} version {} already stored",
                id, version
            )));
        }

        inner.objects.push(StoredObject {
            id: id.to_string(),
            version: version.to_string(),
            spec_version,
            payload,
        });
        Ok((id, version))
    }

    /// Store an object row with raw column values, bypassing validation.
    pub fn put_object_row(
        &self,
        id: &str,
        version: &str,
        spec_version: &str,
        payload: Value,
    ) -> Result<(), StoreError> {
        self.lock()?.objects.push(StoredObject {
            id: id.to_string(),
            version: version.to_string(),
            spec_version: spec_version.to_string(),
            payload,
        });
        Ok(())
    }

    /// Store a collection record with a raw added-time column.
    pub fn put_record_row(
        &self,
        date_added: &str,
        collection_id: &str,
        object_id: &str,
    ) -> Result<(), StoreError> {
        self.lock()?.records.push(StoredRecord {
            date_added: date_added.to_string(),
            collection_id: collection_id.to_string(),
            object_id: object_id.to_string(),
        });
        Ok(())
    }

    /// Store a collection row with raw column values, bypassing validation.
    ///
    /// `row.media_types` is split on commas into media-type rows.
    pub fn put_collection_row(&self, row: CollectionRow) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        for media_type in row.media_types.split(',').filter(|m| !m.is_empty()) {
            inner
                .media_types
                .push((row.id.clone(), media_type.to_string()));
        }
        inner.collections.push(StoredCollection {
            date_added: row.date_added,
            id: row.id,
            title: row.title,
            description: row.description,
            enabled: row.enabled,
            hidden: row.hidden,
            can_read: row.can_read,
            can_write: row.can_write,
        });
        Ok(())
    }
}

impl MemoryStoreInner {
    fn record(&mut self, operation: MockOperation) {
        self.operations.push(operation);
    }

    /// A collection row with its media types joined into one column.
    fn collection_row(&self, c: &StoredCollection) -> CollectionRow {
        let media_types = self
            .media_types
            .iter()
            .filter(|(id, _)| *id == c.id)
            .map(|(_, m)| m.as_str())
            .collect::<Vec<_>>()
            .join(",");
        CollectionRow {
            date_added: c.date_added.clone(),
            enabled: c.enabled,
            hidden: c.hidden,
            id: c.id.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            can_read: c.can_read,
            can_write: c.can_write,
            media_types,
        }
    }

    /// Candidate rows for one record, in version order.
    fn entries_for(&self, record: &StoredRecord, predicate: &EntryPredicate) -> Vec<EntryRow> {
        let mut versions: Vec<(Option<Timestamp>, &StoredObject)> = self
            .objects
            .iter()
            .filter(|o| o.id == record.object_id)
            .filter(|o| predicate.admits_spec_version(&o.spec_version))
            .map(|o| (Timestamp::parse(&o.version).ok(), o))
            .collect();
        versions.sort_by(|a, b| a.0.cmp(&b.0));

        let earliest = versions.iter().find_map(|(v, _)| *v);
        let latest = versions.iter().rev().find_map(|(v, _)| *v);

        versions
            .into_iter()
            .filter(|(version, _)| match (version, earliest, latest) {
                (Some(v), Some(first), Some(last)) => predicate.selects_version(v, &first, &last),
                // Unreadable versions are handed to the caller to reject.
                _ => true,
            })
            .map(|(_, o)| EntryRow {
                date_added: record.date_added.clone(),
                id: o.id.clone(),
                version: o.version.clone(),
                spec_version: o.spec_version.clone(),
            })
            .collect()
    }
}

impl StorageEngine for MemoryStore {
    fn select_collections(
        &self,
        mode: VisibilityMode,
    ) -> Result<RowCursor<'_, CollectionRow>, StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::SelectCollections { mode });
        let cursor_failure = match &inner.fail_on {
            Some(FailOn::SelectCollections(e)) => return Err(e.clone()),
            Some(FailOn::CollectionCursorAfter(n, e)) => Some((*n, e.clone())),
            _ => None,
        };

        let mut rows: Vec<Result<CollectionRow, StoreError>> = inner
            .collections
            .iter()
            .filter(|c| mode.admits(c.enabled, c.hidden))
            .map(|c| Ok(inner.collection_row(c)))
            .collect();

        if let Some((n, e)) = cursor_failure {
            rows.truncate(n);
            rows.push(Err(e));
        }

        Ok(Box::new(MemoryCursor::new(rows, self.open_cursors.clone())))
    }

    fn select_collection(&self, id: &str) -> Result<Option<CollectionRow>, StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::SelectCollection { id: id.to_string() });
        if let Some(FailOn::SelectCollection(e)) = &inner.fail_on {
            return Err(e.clone());
        }

        Ok(inner
            .collections
            .iter()
            .find(|c| c.id == id)
            .map(|c| inner.collection_row(c)))
    }

    fn insert_collection(&self, row: &NewCollectionRow) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::InsertCollection { id: row.id.clone() });
        if let Some(FailOn::InsertCollection(e)) = &inner.fail_on {
            return Err(e.clone());
        }
        if inner.collections.iter().any(|c| c.id == row.id) {
            return Err(StoreError::Constraint(format!(
                "collection {} already exists",
                row.id
            )));
        }

        inner.collections.push(StoredCollection {
            date_added: row.date_added.to_string(),
            id: row.id.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            enabled: row.enabled,
            hidden: row.hidden,
            can_read: row.can_read,
            can_write: row.can_write,
        });
        Ok(())
    }

    fn insert_collection_media_type(
        &self,
        collection_id: &str,
        media_type: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::InsertMediaType {
            collection_id: collection_id.to_string(),
            media_type: media_type.to_string(),
        });
        if let Some(FailOn::InsertMediaType(e)) = &inner.fail_on {
            return Err(e.clone());
        }

        inner
            .media_types
            .push((collection_id.to_string(), media_type.to_string()));
        Ok(())
    }

    fn insert_collection_record(
        &self,
        date_added: &Timestamp,
        collection_id: &str,
        object_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::InsertRecord {
            collection_id: collection_id.to_string(),
            object_id: object_id.to_string(),
        });
        if let Some(FailOn::InsertRecord(e)) = &inner.fail_on {
            return Err(e.clone());
        }

        inner.records.push(StoredRecord {
            date_added: date_added.to_string(),
            collection_id: collection_id.to_string(),
            object_id: object_id.to_string(),
        });
        Ok(())
    }

    fn select_entries(
        &self,
        predicate: &EntryPredicate,
    ) -> Result<RowCursor<'_, EntryRow>, StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::SelectEntries {
            collection_id: predicate.collection_id.to_string(),
        });
        let cursor_failure = match &inner.fail_on {
            Some(FailOn::SelectEntries(e)) => return Err(e.clone()),
            Some(FailOn::EntryCursorAfter(n, e)) => Some((*n, e.clone())),
            _ => None,
        };

        let has_object_filters = !predicate.ids.is_empty() || !predicate.types.is_empty();

        // ORDER BY date_added over the canonical text column
        let mut records: Vec<&StoredRecord> = inner
            .records
            .iter()
            .filter(|r| r.collection_id == predicate.collection_id.as_str())
            .collect();
        records.sort_by(|a, b| a.date_added.cmp(&b.date_added));

        let mut rows: Vec<Result<EntryRow, StoreError>> = Vec::new();
        for record in records {
            match ObjectId::new(record.object_id.as_str()) {
                Ok(id) if !predicate.admits_object(&id) => continue,
                Err(_) if has_object_filters => continue,
                _ => {}
            }
            if let Ok(added) = Timestamp::parse(&record.date_added) {
                if !predicate.admits_added(&added) {
                    continue;
                }
            }
            rows.extend(inner.entries_for(record, predicate).into_iter().map(Ok));
        }

        if let Some((n, e)) = cursor_failure {
            rows.truncate(n);
            rows.push(Err(e));
        }

        Ok(Box::new(MemoryCursor::new(rows, self.open_cursors.clone())))
    }
}

impl ObjectStore for MemoryStore {
    fn fetch(&self, id: &ObjectId, version: &Timestamp) -> Result<Value, StoreError> {
        let mut inner = self.lock()?;
        inner.record(MockOperation::Fetch {
            id: id.to_string(),
            version: version.to_string(),
        });
        if let Some(FailOn::Fetch { id: failing, error }) = &inner.fail_on {
            if failing == id.as_str() {
                return Err(error.clone());
            }
        }

        inner
            .objects
            .iter()
            .find(|o| o.id == id.as_str() && Timestamp::parse(&o.version).ok() == Some(*version))
            .map(|o| o.payload.clone())
            .ok_or_else(|| StoreError::NotFound(format!("{} version {}", id, version)))
    }
}
